//! Core protocol types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Size of a node address in bytes (mirrors a link-layer MAC address)
pub const ADDRESS_SIZE: usize = 6;

/// A node's link-layer address in the mesh
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeAddress([u8; ADDRESS_SIZE]);

impl NodeAddress {
    /// The all-zero address, used on the wire as the "no target" placeholder
    /// in broadcast frames
    pub const ZERO: NodeAddress = NodeAddress([0u8; ADDRESS_SIZE]);

    /// Create a NodeAddress from a byte array
    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        NodeAddress(bytes)
    }

    /// Get the bytes of this address
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Check whether this is the all-zero placeholder address
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Convert to hex string (no separators)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string, with or without `:` separators
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let stripped: String = s.chars().filter(|c| *c != ':').collect();
        let bytes = hex::decode(&stripped)
            .map_err(|e| ProtocolError::InvalidAddress(e.to_string()))?;

        if bytes.len() != ADDRESS_SIZE {
            return Err(ProtocolError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(NodeAddress(arr))
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress({})", self)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Per-originator message counter
///
/// Wraps at 16 bits and is only unique in combination with the originator
/// address. A fresh node allocates id 1 first (increment before use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct MessageId(u16);

impl MessageId {
    /// Create a message id from a u16
    pub fn from_u16(value: u16) -> Self {
        MessageId(value)
    }

    /// Convert to u16
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// The successor id, wrapping at 16 bits
    pub fn next(self) -> Self {
        MessageId(self.0.wrapping_add(1))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        MessageId(0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameKind {
    /// Flooded to every active peer
    Broadcast = 1,
    /// Addressed to one specific destination node
    Targeted = 2,
}

impl FrameKind {
    /// Create a frame kind from its wire code
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(FrameKind::Broadcast),
            2 => Ok(FrameKind::Targeted),
            other => Err(ProtocolError::InvalidFrameKind(other)),
        }
    }

    /// Convert to the wire code
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}
