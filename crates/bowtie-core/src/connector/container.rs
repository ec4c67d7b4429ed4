//! The `container` connector: attach to an already running, externally
//! managed harness container.
//!
//! Bowtie never starts, stops or removes the container. Closing the
//! connection only detaches.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::info;

use super::engine::ContainerEngine;
use super::process::{ProcessConnection, Teardown};
use super::trait_def::{Connection, Connector};

/// Connector for a pre-existing container, identified by id or name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConnector {
    container: String,
    engine: ContainerEngine,
}

impl ContainerConnector {
    /// Registry name of this connector.
    pub const KIND: &'static str = "container";

    /// Build a connector for the container `container`.
    pub fn new(container: &str) -> Self {
        Self::with_engine(container, ContainerEngine::default())
    }

    /// Like [`ContainerConnector::new`], attaching with `engine`.
    pub fn with_engine(container: &str, engine: ContainerEngine) -> Self {
        Self {
            container: container.to_string(),
            engine,
        }
    }

    /// The container id or name to attach to.
    pub fn container(&self) -> &str {
        &self.container
    }
}

#[async_trait]
impl Connector for ContainerConnector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn argument(&self) -> &str {
        &self.container
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        let engine = &self.engine;

        let running = engine
            .run(&["inspect", "--format", "{{.State.Running}}", self.container.as_str()])
            .await?;
        if running != "true" {
            bail!("container {} is not running", self.container);
        }

        info!(container = %self.container, engine = %engine.binary(), "attaching to harness container");

        let mut command = engine.command();
        command.args(["attach", "--sig-proxy=false", self.container.as_str()]);

        let connection = ProcessConnection::spawn(
            format!("container {}", self.container),
            command,
            Teardown::Detach,
        )?;
        Ok(Arc::new(connection))
    }
}
