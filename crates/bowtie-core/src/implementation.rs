//! The implementation-session seam.
//!
//! A session layers a harness protocol on top of a [`Connection`]. This
//! crate does not speak that protocol; it only starts and stops sessions
//! in the right order (see [`crate::Connectable::connect`]). Callers plug
//! their protocol in through [`ImplementationStarter`].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::connectable::ConnectableId;
use crate::connector::Connection;

/// A running implementation session.
#[async_trait]
pub trait Implementation: Send {
    /// Tear the session down. The underlying connection is closed
    /// separately, after this returns.
    async fn stop(&mut self) -> Result<()>;
}

/// Starts implementation sessions over freshly acquired connections.
///
/// Session parameters (dialect, reporter, ...) live on the starter value.
#[async_trait]
pub trait ImplementationStarter: Send + Sync {
    type Session: Implementation + 'static;

    /// Start a session for `id` over `connection`.
    async fn start(&self, id: &ConnectableId, connection: Arc<dyn Connection>) -> Result<Self::Session>;
}

/// Starter for [`PassthroughSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

/// A protocol-agnostic session that forwards raw JSON requests.
pub struct PassthroughSession {
    id: ConnectableId,
    connection: Arc<dyn Connection>,
}

impl PassthroughSession {
    /// The connectable this session belongs to.
    pub fn id(&self) -> &ConnectableId {
        &self.id
    }

    /// Send `message` and return the harness's reply.
    pub async fn request(&self, message: &Value) -> Result<Value> {
        self.connection.request(message).await
    }
}

#[async_trait]
impl ImplementationStarter for Passthrough {
    type Session = PassthroughSession;

    async fn start(&self, id: &ConnectableId, connection: Arc<dyn Connection>) -> Result<PassthroughSession> {
        Ok(PassthroughSession {
            id: id.clone(),
            connection,
        })
    }
}

#[async_trait]
impl Implementation for PassthroughSession {
    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
