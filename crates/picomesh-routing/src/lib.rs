//! Picomesh Message Routing
//!
//! The algorithmic core of the mesh:
//! - Bounded, recency-ordered message log (loop prevention + reverse-path
//!   inference)
//! - Forwarding/routing decision logic (deliver locally, unicast to a
//!   relay, or flood)
//! - Affinity-scored greedy top-M peer selection

pub mod message_log;
pub mod peers;
pub mod router;

pub use message_log::{MessageLog, MessageRecord};
pub use peers::{ActivePeerSet, Peer, PeerCandidate, PeerSelector};
pub use router::{Delivery, DropReason, Inbound, Router};

/// Default number of remembered messages
pub const DEFAULT_LOG_CAPACITY: usize = 10;

/// Default bound on the active peer set
pub const DEFAULT_MAX_PEERS: usize = 10;

/// Score bonus per message-log record a candidate appears in
pub const AFFINITY_BONUS: i16 = 20;
