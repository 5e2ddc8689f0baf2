//! Node configuration

use serde::{Deserialize, Serialize};

use picomesh_protocol::NodeAddress;
use picomesh_routing::{DEFAULT_LOG_CAPACITY, DEFAULT_MAX_PEERS};

/// Mesh node configuration
///
/// Nothing here persists across restarts: the message log, the active peer
/// set and the message-id counter all start empty/zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's link-layer address
    pub address: NodeAddress,

    /// Number of messages to remember. Large meshes or high message rates
    /// may need more to keep flooded messages from circulating.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Bound on the active peer set. Any number of nodes may link to us;
    /// this only bounds the links we maintain ourselves.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    /// Beacon-name prefix that identifies mesh members during discovery;
    /// `None` disables the filter. Candidates without a beacon name always
    /// pass.
    #[serde(default = "default_beacon_prefix")]
    pub beacon_prefix: Option<String>,
}

impl NodeConfig {
    /// Configuration with default capacities for the node at `address`
    pub fn new(address: NodeAddress) -> Self {
        NodeConfig {
            address,
            log_capacity: default_log_capacity(),
            max_peers: default_max_peers(),
            beacon_prefix: default_beacon_prefix(),
        }
    }
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

fn default_max_peers() -> usize {
    DEFAULT_MAX_PEERS
}

fn default_beacon_prefix() -> Option<String> {
    Some("PICO_".to_string())
}
