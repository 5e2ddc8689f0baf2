//! Picomesh Protocol Module
//!
//! This module defines the wire-level data types and the textual frame
//! codec for the picomesh network.

pub mod error;
pub mod frame;
pub mod types;

pub use error::{ProtocolError, Result};
pub use frame::{Frame, DELIMITER, FIELD_COUNT, MAX_FRAME_LEN};
pub use types::{FrameKind, MessageId, NodeAddress, ADDRESS_SIZE};
