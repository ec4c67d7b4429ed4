//! The `image` connector: a harness image whose container Bowtie starts,
//! talks to over stdio, and removes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::engine::ContainerEngine;
use super::process::{ProcessConnection, Teardown};
use super::trait_def::{Connection, Connector};

/// Repository holding Bowtie's own harness images. Image names without a
/// `/` are looked up here.
pub const IMAGE_REPOSITORY: &str = "ghcr.io/bowtie-json-schema";

/// Connector for a container image which Bowtie manages (starts, stops and
/// deletes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConnector {
    /// The image reference exactly as written in the connectable.
    argument: String,
    /// The image reference with the default repository applied.
    image: String,
    engine: ContainerEngine,
}

impl ImageConnector {
    /// Registry name of this connector.
    pub const KIND: &'static str = "image";

    /// Build a connector for `image`, qualifying bare names with
    /// [`IMAGE_REPOSITORY`].
    pub fn new(image: &str) -> Self {
        Self::with_engine(image, ContainerEngine::default())
    }

    /// Like [`ImageConnector::new`], running containers with `engine`.
    pub fn with_engine(image: &str, engine: ContainerEngine) -> Self {
        Self {
            argument: image.to_string(),
            image: qualify(image),
            engine,
        }
    }

    /// The fully qualified image reference that will be run.
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn engine(&self) -> &ContainerEngine {
        &self.engine
    }

    /// A fresh container name for one connection.
    fn container_name() -> String {
        format!("bowtie-{}", Uuid::new_v4().simple())
    }
}

fn qualify(image: &str) -> String {
    if image.contains('/') {
        image.to_string()
    } else {
        format!("{IMAGE_REPOSITORY}/{image}")
    }
}

#[async_trait]
impl Connector for ImageConnector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn argument(&self) -> &str {
        &self.argument
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        let engine = self.engine.clone();
        let name = Self::container_name();

        info!(image = %self.image, container = %name, engine = %engine.binary(), "starting harness container");

        let mut command = engine.command();
        command.args([
            "run",
            "--rm",
            "--interactive",
            "--network",
            "none",
            "--name",
            name.as_str(),
            self.image.as_str(),
        ]);

        let connection = ProcessConnection::spawn(
            format!("image {}", self.image),
            command,
            Teardown::RemoveContainer { engine, name },
        )?;
        Ok(Arc::new(connection))
    }
}
