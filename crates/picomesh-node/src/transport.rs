//! Collaborator traits for the host environment
//!
//! The radio transport, the environment scan and the supervisory watchdog
//! are thin wrappers around hardware and live outside this crate. The node
//! drives them through these traits; the host invokes the node's handler
//! methods when their asynchronous results arrive, and is assumed to
//! serialize those invocations (no internal locking here).

use async_trait::async_trait;

use crate::error::Result;
use picomesh_protocol::NodeAddress;

/// Completion status the transport reports for a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The transport accepted and transmitted the frame
    Success,
    /// The transport gave up on the frame; no retry happens at this layer
    Failure,
}

/// Link-layer transport
///
/// Exposes the two send primitives and the peer-link table the node
/// mirrors its active peer set into.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit a frame to a single linked peer
    async fn send_unicast(&self, peer: &NodeAddress, bytes: &[u8]) -> Result<()>;

    /// Transmit a frame to every linked peer
    async fn send_broadcast(&self, bytes: &[u8]) -> Result<()>;

    /// Check whether an address is currently linked
    fn link_exists(&self, address: &NodeAddress) -> bool;

    /// Add a peer link
    fn add_link(&mut self, address: NodeAddress) -> Result<()>;

    /// Remove a peer link
    fn remove_link(&mut self, address: &NodeAddress) -> Result<()>;

    /// Snapshot of all linked addresses
    fn links(&self) -> Vec<NodeAddress>;
}

/// Asynchronous peer discovery
///
/// `start_scan` returns immediately; the host delivers the resulting
/// candidate list to [`MeshNode::handle_discovery_complete`] once per
/// invocation.
///
/// [`MeshNode::handle_discovery_complete`]: crate::node::MeshNode::handle_discovery_complete
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Kick off an environment scan
    async fn start_scan(&mut self) -> Result<()>;
}

/// Liveness hook fed during long synchronous stretches, so a supervisory
/// timer does not kill the process mid-callback
pub trait Watchdog: Send + Sync {
    fn feed(&self);
}

/// Watchdog for hosts without a supervisory timer
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatchdog;

impl Watchdog for NullWatchdog {
    fn feed(&self) {}
}
