//! Connectors -- the ways Bowtie can reach a harness.
//!
//! This module defines the [`Connector`] and [`Connection`] traits, the
//! built-in connector kinds, and the [`ConnectorRegistry`] that maps
//! connector tokens to constructors.
//!
//! # Architecture
//!
//! ```text
//! ConnectorRegistry --construct("image", "example")--> Arc<dyn Connector>
//!                                                            |
//!     connect() ---------------------------------------------+
//!         |
//!         v
//!     Arc<dyn Connection> (ProcessConnection over engine CLI stdio)
//!         |
//!     request(json) -> json
//!     close()
//! ```

pub mod container;
pub mod engine;
pub mod image;
pub mod inmemory;
pub mod process;
pub mod registry;
pub mod trait_def;

pub use container::ContainerConnector;
pub use engine::ContainerEngine;
pub use image::{IMAGE_REPOSITORY, ImageConnector};
pub use inmemory::{InMemoryConnector, UnsupportedConnector};
pub use process::ProcessConnection;
pub use registry::{ConnectorConstructor, ConnectorRegistry};
pub use trait_def::{Connection, Connector};
