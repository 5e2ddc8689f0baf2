//! Picomesh Node
//!
//! Ties the protocol codec and the routing core to a host-provided
//! transport:
//! - Protocol (addresses, message ids, textual wire frames)
//! - Routing (message log, forwarding decisions, peer selection)
//! - Node (orchestration, collaborator traits, application events)

pub use picomesh_protocol as protocol;
pub use picomesh_routing as routing;

pub mod config;
pub mod error;
pub mod node;
pub mod transport;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::{MeshNode, NodeEvent};
pub use transport::{Discovery, NullWatchdog, SendStatus, Transport, Watchdog};
