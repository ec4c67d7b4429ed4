//! Resolve connectable strings into live, managed connections to
//! JSON Schema implementation harnesses.
//!
//! ```text
//! "image:foo/bar:latest"
//!     |
//!     v
//! Connectable::from_str --registry.get("image")--> Arc<dyn Connector>
//!     |
//!     v
//! Connectable::connect(starter, body)
//!     |-- Connector::connect()            -> Arc<dyn Connection>   (scope A)
//!     |-- ImplementationStarter::start()  -> Session               (scope B)
//!     |-- body(&mut session)
//!     |-- Implementation::stop()          (B torn down first)
//!     `-- Connection::close()             (then A)
//! ```

pub mod connectable;
pub mod connector;
pub mod implementation;

pub use connectable::{Connectable, ConnectableError, ConnectableId, IMAGE_REPOSITORY, SessionError, SessionFailure};
pub use connector::{Connection, Connector, ConnectorRegistry};
pub use implementation::{Implementation, ImplementationStarter};
