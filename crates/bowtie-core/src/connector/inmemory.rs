//! The `inmemory` connector: a harness running inside this process with no
//! IPC. The name is reserved; connecting always fails.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::trait_def::{Connection, Connector};

/// Returned when connecting through a connector kind that has no
/// implementation yet.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the {kind:?} connector is not supported yet")]
pub struct UnsupportedConnector {
    pub kind: &'static str,
}

/// Placeholder connector for in-process harnesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryConnector {
    argument: String,
}

impl InMemoryConnector {
    /// Registry name of this connector.
    pub const KIND: &'static str = "inmemory";

    pub fn new(argument: &str) -> Self {
        Self {
            argument: argument.to_string(),
        }
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn argument(&self) -> &str {
        &self.argument
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        Err(UnsupportedConnector { kind: Self::KIND }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_always_fails() {
        let connector = InMemoryConnector::new("python-jsonschema");
        let err = connector.connect().await.err().unwrap();
        assert_eq!(
            err.downcast_ref::<UnsupportedConnector>(),
            Some(&UnsupportedConnector { kind: "inmemory" })
        );
        assert!(err.to_string().contains("not supported"));
    }
}
