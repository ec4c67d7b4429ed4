//! Nested session scope: connection (outer) and implementation (inner).
//!
//! Acquisition is connection-then-session; teardown is session-then-
//! connection on every exit path. If the caller's future is dropped
//! mid-scope, whatever was acquired is torn down in the background on the
//! current tokio runtime.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Connectable, ConnectableId};
use crate::connector::Connection;
use crate::implementation::{Implementation, ImplementationStarter};

/// Errors from [`Connectable::connect`], by the phase that failed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connector could not acquire a connection. Nothing was started.
    #[error("failed to connect to {id}")]
    Connect {
        id: ConnectableId,
        #[source]
        source: anyhow::Error,
    },

    /// The session could not start. The connection was released first.
    #[error("failed to start implementation {id}")]
    Start {
        id: ConnectableId,
        #[source]
        source: anyhow::Error,
    },

    /// The caller's use of the session failed. Teardown already ran.
    ///
    /// Displays exactly as the caller's own error did.
    #[error(transparent)]
    Failed(SessionFailure),

    /// The caller succeeded but stopping the session or closing the
    /// connection did not.
    #[error("failed to tear down {id}")]
    Teardown {
        id: ConnectableId,
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    /// The connectable whose session failed.
    pub fn id(&self) -> &ConnectableId {
        match self {
            Self::Connect { id, .. }
            | Self::Start { id, .. }
            | Self::Teardown { id, .. } => id,
            Self::Failed(failure) => &failure.id,
        }
    }
}

/// An error returned by the body passed to [`Connectable::connect`],
/// tagged with the connectable it ran against.
///
/// Formatting and `source()` pass straight through to `error`.
#[derive(Debug)]
pub struct SessionFailure {
    pub id: ConnectableId,
    pub error: anyhow::Error,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.error)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl std::error::Error for SessionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Owns what has been acquired so far, innermost last.
struct SessionScope<S: Implementation + 'static> {
    id: ConnectableId,
    connection: Option<Arc<dyn Connection>>,
    implementation: Option<S>,
}

impl<S: Implementation + 'static> SessionScope<S> {
    fn new(id: ConnectableId, connection: Arc<dyn Connection>) -> Self {
        Self {
            id,
            connection: Some(connection),
            implementation: None,
        }
    }

    fn enter(&mut self, implementation: S) -> &mut S {
        self.implementation.insert(implementation)
    }

    /// Stop the session, then close the connection. Both steps always run;
    /// the first failure is returned and later ones are logged.
    ///
    /// Each resource is only forgotten once its release has finished, so a
    /// close interrupted by cancellation is retried by `Drop`.
    async fn close(&mut self) -> anyhow::Result<()> {
        let mut outcome = Ok(());

        if let Some(implementation) = self.implementation.as_mut() {
            let stopped = implementation.stop().await;
            self.implementation = None;
            if let Err(e) = stopped {
                outcome = Err(e.context("failed to stop implementation"));
            }
        }

        if let Some(connection) = self.connection.as_ref() {
            let closed = connection.close().await;
            self.connection = None;
            if let Err(e) = closed {
                let e = e.context("failed to close connection");
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    warn!(id = %self.id, error = %format!("{e:#}"), "connection teardown also failed");
                }
            }
        }

        outcome
    }
}

impl<S: Implementation + 'static> Drop for SessionScope<S> {
    fn drop(&mut self) {
        let implementation = self.implementation.take();
        let connection = self.connection.take();
        if implementation.is_none() && connection.is_none() {
            return;
        }

        let id = self.id.clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, "session scope dropped outside a runtime; harness resources leaked");
            return;
        };

        warn!(id = %id, "session scope cancelled; tearing down in the background");
        runtime.spawn(async move {
            if let Some(mut implementation) = implementation {
                if let Err(e) = implementation.stop().await {
                    warn!(id = %id, error = %format!("{e:#}"), "failed to stop cancelled implementation");
                }
            }
            if let Some(connection) = connection {
                if let Err(e) = connection.close().await {
                    warn!(id = %id, error = %format!("{e:#}"), "failed to close cancelled connection");
                }
            }
        });
    }
}

impl Connectable {
    /// Connect, start an implementation session, and run `body` with it.
    ///
    /// The connection is acquired first and the session started over it.
    /// However `body` finishes, the session is stopped before the
    /// connection is closed. If connecting fails, `starter` is never
    /// called; if starting fails, the connection is closed before the
    /// error is returned.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let reply = connectable
    ///     .connect(&Passthrough, |session| {
    ///         Box::pin(async move { session.request(&json!({"cmd": "start"})).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn connect<S, T, F>(&self, starter: &S, body: F) -> Result<T, SessionError>
    where
        S: ImplementationStarter,
        F: for<'a> FnOnce(&'a mut S::Session) -> BoxFuture<'a, anyhow::Result<T>>,
    {
        let id = self.id.clone();
        debug!(id = %id, connector = self.connector.kind(), "connecting");

        let connection = self
            .connector
            .connect()
            .await
            .map_err(|source| SessionError::Connect {
                id: id.clone(),
                source,
            })?;

        let mut scope = SessionScope::<S::Session>::new(id.clone(), Arc::clone(&connection));

        let session = match starter.start(&id, connection).await {
            Ok(session) => session,
            Err(source) => {
                if let Err(e) = scope.close().await {
                    warn!(id = %id, error = %format!("{e:#}"), "teardown after failed start also failed");
                }
                return Err(SessionError::Start { id, source });
            }
        };

        let outcome = body(scope.enter(session)).await;
        let teardown = scope.close().await;
        debug!(id = %id, "session closed");

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(source)) => Err(SessionError::Teardown { id, source }),
            (Err(error), Ok(())) => Err(SessionError::Failed(SessionFailure { id, error })),
            (Err(error), Err(e)) => {
                warn!(id = %id, error = %format!("{e:#}"), "teardown after failed session also failed");
                Err(SessionError::Failed(SessionFailure { id, error }))
            }
        }
    }
}
