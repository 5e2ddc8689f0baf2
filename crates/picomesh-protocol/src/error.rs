//! Error types for protocol operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame too long: {len} bytes (max: {max})")]
    FrameTooLong { len: usize, max: usize },

    #[error("payload contains the field delimiter")]
    PayloadContainsDelimiter,

    #[error("invalid token count: {0} (expected 15)")]
    InvalidTokenCount(usize),

    #[error("invalid frame kind: {0}")]
    InvalidFrameKind(u8),

    #[error("field {index} is not a valid {expected}")]
    InvalidFieldValue {
        index: usize,
        expected: &'static str,
    },

    #[error("invalid node address: {0}")]
    InvalidAddress(String),
}
