//! Node error types

use thiserror::Error;

/// Errors surfaced by the node layer
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("protocol error: {0}")]
    Protocol(#[from] picomesh_protocol::ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("discovery error: {0}")]
    Discovery(String),
}

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;
