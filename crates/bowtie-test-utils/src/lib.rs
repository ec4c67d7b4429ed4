//! Shared test doubles for bowtie integration tests.
//!
//! Every double writes to a [`Journal`] so tests can assert the exact order
//! in which connections and sessions were acquired and released.
//!
//! - [`RecordingConnector`] / [`RecordingConnection`]: journal `connect`,
//!   `request` and `close`; can be told to fail either phase, or to hang
//!   in the first `close`.
//! - [`RecordingStarter`] / [`RecordingSession`]: journal `start` and
//!   `stop`; can be told to fail either phase, or to never finish `start`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use bowtie_core::{Connectable, ConnectableId, Connection, Connector, Implementation, ImplementationStarter};

/// Ordered log of lifecycle events shared between doubles.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events
            .lock()
            .expect("journal mutex poisoned")
            .push(event.into());
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("journal mutex poisoned").clone()
    }

    /// Number of recorded events equal to `event`.
    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// A connector that never touches a container engine.
#[derive(Debug, Clone)]
pub struct RecordingConnector {
    journal: Journal,
    fail_connect: bool,
    fail_close: bool,
    hang_first_close: bool,
}

impl RecordingConnector {
    pub const KIND: &'static str = "recording";

    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_connect: false,
            fail_close: false,
            hang_first_close: false,
        }
    }

    /// Make `connect` fail.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make `Connection::close` fail (after journaling it).
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Make the first `Connection::close` journal itself and then never
    /// finish; later calls behave normally.
    pub fn hanging_first_close(mut self) -> Self {
        self.hang_first_close = true;
        self
    }

    /// Wrap this connector in a connectable with id `recording:test`.
    pub fn into_connectable(self) -> Connectable {
        Connectable::new("recording:test", Arc::new(self))
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn argument(&self) -> &str {
        "test"
    }

    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        if self.fail_connect {
            self.journal.record("connect failed");
            bail!("recording connector refused to connect");
        }
        self.journal.record("connect");
        Ok(Arc::new(RecordingConnection {
            journal: self.journal.clone(),
            fail_close: self.fail_close,
            hang_next_close: AtomicBool::new(self.hang_first_close),
            closed: Mutex::new(false),
        }))
    }
}

/// Connection handed out by [`RecordingConnector`]. Requests echo back.
#[derive(Debug)]
pub struct RecordingConnection {
    journal: Journal,
    fail_close: bool,
    hang_next_close: AtomicBool,
    closed: Mutex<bool>,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn request(&self, message: &Value) -> Result<Value> {
        if *self.closed.lock().expect("closed mutex poisoned") {
            bail!("recording connection is closed");
        }
        self.journal.record("request");
        Ok(message.clone())
    }

    async fn close(&self) -> Result<()> {
        if *self.closed.lock().expect("closed mutex poisoned") {
            return Ok(());
        }
        self.journal.record("close");
        if self.hang_next_close.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        // Only a finished close counts, so an interrupted one can be retried.
        *self.closed.lock().expect("closed mutex poisoned") = true;
        if self.fail_close {
            bail!("recording connection refused to close");
        }
        Ok(())
    }
}

/// Starter for [`RecordingSession`]s.
#[derive(Debug, Clone)]
pub struct RecordingStarter {
    journal: Journal,
    fail_start: bool,
    hang_start: bool,
    fail_stop: bool,
}

impl RecordingStarter {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_start: false,
            hang_start: false,
            fail_stop: false,
        }
    }

    /// Make `start` fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Make `start` journal `start pending` and then never finish.
    pub fn hanging_start(mut self) -> Self {
        self.hang_start = true;
        self
    }

    /// Make `stop` fail (after journaling it).
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

/// Session started by [`RecordingStarter`].
pub struct RecordingSession {
    pub id: ConnectableId,
    pub connection: Arc<dyn Connection>,
    journal: Journal,
    fail_stop: bool,
}

#[async_trait]
impl ImplementationStarter for RecordingStarter {
    type Session = RecordingSession;

    async fn start(&self, id: &ConnectableId, connection: Arc<dyn Connection>) -> Result<RecordingSession> {
        if self.fail_start {
            self.journal.record("start failed");
            bail!("recording session refused to start");
        }
        if self.hang_start {
            self.journal.record("start pending");
            std::future::pending::<()>().await;
        }
        self.journal.record("start");
        Ok(RecordingSession {
            id: id.clone(),
            connection,
            journal: self.journal.clone(),
            fail_stop: self.fail_stop,
        })
    }
}

#[async_trait]
impl Implementation for RecordingSession {
    async fn stop(&mut self) -> Result<()> {
        self.journal.record("stop");
        if self.fail_stop {
            bail!("recording session refused to stop");
        }
        Ok(())
    }
}
