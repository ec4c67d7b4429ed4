//! Connectables -- a mini-language for naming how to reach a harness.
//!
//! The general form of a connectable string is:
//!
//! ```text
//! [<connector>:]<id>[:<arguments>*]
//! ```
//!
//! where `<connector>` names a kind registered in a
//! [`ConnectorRegistry`] and defaults to `image`. Some examples:
//!
//! - `image:example` -- the image `example` from [`IMAGE_REPOSITORY`]
//! - `example` -- the same image, with the connector left implicit
//! - `image:foo/bar:latest` -- a fully qualified OCI image reference
//! - `container:deadbeef` -- attach to the running container `deadbeef`
//!
//! Image references contain `:` themselves, so an unknown connector token
//! containing `/` (as in `foo/bar:latest`) is read as a whole image
//! reference rather than rejected.

mod session;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::connector::{Connector, ConnectorRegistry, ImageConnector};

pub use crate::connector::IMAGE_REPOSITORY;
pub use session::{SessionError, SessionFailure};

/// Errors produced while resolving a connectable string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectableError {
    /// The connector token is not registered and does not look like part
    /// of an image reference.
    #[error("unknown connector {0:?}")]
    UnknownConnector(String),
}

/// A string identifying one implementation connection. Unique within a
/// run or report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectableId(String);

impl ConnectableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectableId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ConnectableId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved connectable: the id the user wrote plus the connector it
/// selects.
///
/// Immutable and cheap to clone. It can be [connected](Connectable::connect)
/// any number of times; each connection is independent.
#[derive(Clone)]
pub struct Connectable {
    id: ConnectableId,
    connector: Arc<dyn Connector>,
}

impl Connectable {
    /// Pair an id with an already built connector.
    pub fn new(id: impl Into<ConnectableId>, connector: Arc<dyn Connector>) -> Self {
        Self {
            id: id.into(),
            connector,
        }
    }

    /// Resolve `fqid` against an explicit registry.
    ///
    /// 1. Split on the first `:`. With no `:`, the connector is `image`
    ///    and the whole string is its argument.
    /// 2. A registered token builds its connector from the remainder.
    /// 3. An unregistered token containing `/` means the split landed on an
    ///    image tag: the whole string becomes an `image` argument.
    /// 4. Anything else is [`ConnectableError::UnknownConnector`].
    ///
    /// In every successful case the id is `fqid`, unchanged.
    pub fn resolve_with(registry: &ConnectorRegistry, fqid: &str) -> Result<Self, ConnectableError> {
        let (token, argument) = fqid
            .split_once(':')
            .unwrap_or((ImageConnector::KIND, fqid));

        if let Some(connector) = registry.construct(token, argument) {
            return Ok(Self::new(fqid, connector));
        }

        if token.contains('/') {
            if let Some(connector) = registry.construct(ImageConnector::KIND, fqid) {
                debug!(connectable = %fqid, token = %token, "treating unknown connector as image reference");
                return Ok(Self::new(fqid, connector));
            }
        }

        Err(ConnectableError::UnknownConnector(token.to_string()))
    }

    /// The id this connectable was resolved from.
    pub fn id(&self) -> &ConnectableId {
        &self.id
    }

    /// The connector this connectable selects.
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Shorthand for `self.connector().kind()`.
    pub fn kind(&self) -> &'static str {
        self.connector.kind()
    }

    /// The tersest connectable string someone could write for this id.
    pub fn to_terse(&self) -> String {
        let id = self.id.as_str();
        let id = id.strip_prefix("image:").unwrap_or(id);
        id.strip_prefix(IMAGE_REPOSITORY)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(id)
            .to_string()
    }
}

impl FromStr for Connectable {
    type Err = ConnectableError;

    /// Resolve against [`ConnectorRegistry::global`].
    fn from_str(fqid: &str) -> Result<Self, Self::Err> {
        Self::resolve_with(ConnectorRegistry::global(), fqid)
    }
}

impl PartialEq for Connectable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.connector.kind() == other.connector.kind()
            && self.connector.argument() == other.connector.argument()
    }
}

impl Eq for Connectable {}

impl fmt::Debug for Connectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connectable")
            .field("connector", &self.connector)
            .finish()
    }
}

impl fmt::Display for Connectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl Serialize for Connectable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Connectable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fqid = String::deserialize(deserializer)?;
        fqid.parse().map_err(serde::de::Error::custom)
    }
}
