//! Textual wire frame and its codec
//!
//! Frames are short comma-separated datagrams, sized for radios that can
//! only move a few dozen bytes at a time. Fields, in order:
//!
//! 1. kind: `1` = Broadcast, `2` = Targeted
//! 2-7. originator address bytes, `0-255` each (decimal)
//! 8-13. target address bytes, `0-255` each (all `0` when kind = Broadcast)
//! 14. message id, `0-65535`
//! 15. payload: any byte sequence without `,`
//!
//! The total encoded length, framing included, may not exceed
//! [`MAX_FRAME_LEN`].

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{FrameKind, MessageId, NodeAddress, ADDRESS_SIZE};

/// Maximum total encoded frame length, framing included
pub const MAX_FRAME_LEN: usize = 65;

/// Field delimiter byte
pub const DELIMITER: u8 = b',';

/// Number of comma-separated fields in a frame
pub const FIELD_COUNT: usize = 15;

/// A decoded mesh frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Broadcast or Targeted
    pub kind: FrameKind,

    /// The node that first created this message
    pub originator: NodeAddress,

    /// Destination node; `None` for broadcast frames
    pub target: Option<NodeAddress>,

    /// Per-originator message counter
    pub id: MessageId,

    /// Application payload (no delimiter bytes)
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a broadcast frame
    pub fn broadcast(originator: NodeAddress, id: MessageId, payload: Vec<u8>) -> Self {
        Frame {
            kind: FrameKind::Broadcast,
            originator,
            target: None,
            id,
            payload,
        }
    }

    /// Create a targeted frame
    pub fn targeted(
        originator: NodeAddress,
        target: NodeAddress,
        id: MessageId,
        payload: Vec<u8>,
    ) -> Self {
        Frame {
            kind: FrameKind::Targeted,
            originator,
            target: Some(target),
            id,
            payload,
        }
    }

    /// Serialize this frame for transmission
    ///
    /// Fails if the payload contains the field delimiter or the encoded
    /// frame would exceed [`MAX_FRAME_LEN`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.contains(&DELIMITER) {
            return Err(ProtocolError::PayloadContainsDelimiter);
        }

        // Broadcast frames carry all-zero target bytes on the wire.
        let target = match self.kind {
            FrameKind::Broadcast => NodeAddress::ZERO,
            FrameKind::Targeted => self.target.unwrap_or(NodeAddress::ZERO),
        };

        let mut out = Vec::with_capacity(MAX_FRAME_LEN);
        out.extend_from_slice(self.kind.to_wire().to_string().as_bytes());
        for byte in self.originator.as_bytes() {
            out.push(DELIMITER);
            out.extend_from_slice(byte.to_string().as_bytes());
        }
        for byte in target.as_bytes() {
            out.push(DELIMITER);
            out.extend_from_slice(byte.to_string().as_bytes());
        }
        out.push(DELIMITER);
        out.extend_from_slice(self.id.as_u16().to_string().as_bytes());
        out.push(DELIMITER);
        out.extend_from_slice(&self.payload);

        if out.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLong {
                len: out.len(),
                max: MAX_FRAME_LEN,
            });
        }

        Ok(out)
    }

    /// Parse a received frame
    ///
    /// Fails if the input exceeds [`MAX_FRAME_LEN`], the token count is not
    /// exactly [`FIELD_COUNT`], or any numeric token is out of range. A
    /// targeted frame with an all-zero target decodes successfully; what to
    /// do with such a degenerate frame is the router's call, not the
    /// codec's.
    pub fn decode(bytes: &[u8]) -> Result<Frame> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLong {
                len: bytes.len(),
                max: MAX_FRAME_LEN,
            });
        }

        let tokens: Vec<&[u8]> = bytes.split(|&b| b == DELIMITER).collect();
        if tokens.len() != FIELD_COUNT {
            return Err(ProtocolError::InvalidTokenCount(tokens.len()));
        }

        let kind = FrameKind::from_wire(parse_u8(tokens[0], 0)?)?;

        let mut originator = [0u8; ADDRESS_SIZE];
        for (i, byte) in originator.iter_mut().enumerate() {
            *byte = parse_u8(tokens[1 + i], 1 + i)?;
        }

        let mut target = [0u8; ADDRESS_SIZE];
        for (i, byte) in target.iter_mut().enumerate() {
            *byte = parse_u8(tokens[7 + i], 7 + i)?;
        }

        let id = MessageId::from_u16(parse_u16(tokens[13], 13)?);
        let payload = tokens[14].to_vec();

        let target = match kind {
            FrameKind::Broadcast => None,
            FrameKind::Targeted => Some(NodeAddress::from_bytes(target)),
        };

        Ok(Frame {
            kind,
            originator: NodeAddress::from_bytes(originator),
            target,
            id,
            payload,
        })
    }
}

fn parse_u8(token: &[u8], index: usize) -> Result<u8> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or(ProtocolError::InvalidFieldValue {
            index,
            expected: "byte",
        })
}

fn parse_u16(token: &[u8], index: usize) -> Result<u16> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or(ProtocolError::InvalidFieldValue {
            index,
            expected: "16-bit integer",
        })
}
