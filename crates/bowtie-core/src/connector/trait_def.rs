//! The `Connector` and `Connection` traits -- how a harness is reached.
//!
//! Each connector kind (managed image, external container, ...) implements
//! [`Connector`]. Both traits are object-safe so connectors can be stored
//! as `Arc<dyn Connector>` in a [`super::ConnectorRegistry`] and inside a
//! [`crate::Connectable`].

use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Strategy for acquiring a transport connection to one kind of harness.
///
/// A connector is built from the connector-specific part of a connectable
/// string (an image reference, a container id, ...) and may be connected
/// any number of times; each call to [`Connector::connect`] produces an
/// independent [`Connection`].
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// The registry name of this connector kind (e.g. "image").
    fn kind(&self) -> &'static str;

    /// The connector-specific identifier this connector was built from.
    fn argument(&self) -> &str;

    /// Acquire a live connection to the harness.
    ///
    /// Errors are the connector's own and are propagated uninterpreted.
    /// The caller owns the returned connection and must
    /// [`close`](Connection::close) it.
    async fn connect(&self) -> Result<Arc<dyn Connection>>;
}

/// A live transport to a running harness.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one JSON document and wait for the harness's one-line reply.
    async fn request(&self, message: &Value) -> Result<Value>;

    /// Release the transport. Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: () = {
    fn _assert_object_safe(_: &dyn Connector, _: &dyn Connection) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EchoConnector;

    struct EchoConnection;

    #[async_trait]
    impl Connection for EchoConnection {
        async fn request(&self, message: &Value) -> Result<Value> {
            Ok(message.clone())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for EchoConnector {
        fn kind(&self) -> &'static str {
            "echo"
        }

        fn argument(&self) -> &str {
            ""
        }

        async fn connect(&self) -> Result<Arc<dyn Connection>> {
            Ok(Arc::new(EchoConnection))
        }
    }

    #[tokio::test]
    async fn connector_is_object_safe() {
        let connector: Arc<dyn Connector> = Arc::new(EchoConnector);
        assert_eq!(connector.kind(), "echo");

        let connection = connector.connect().await.unwrap();
        let reply = connection
            .request(&serde_json::json!({"cmd": "start"}))
            .await
            .unwrap();
        assert_eq!(reply["cmd"], "start");
        connection.close().await.unwrap();
    }
}
