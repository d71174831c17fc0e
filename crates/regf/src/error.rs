//! Error types for the regf crate.

use thiserror::Error;

/// Hive decoding errors.
#[derive(Debug, Error)]
pub enum HiveError {
    #[error("read error at offset {offset:#x}: {msg}")]
    Read { offset: u64, msg: String },

    #[error("bad {expected} signature at offset {offset:#x}")]
    BadSignature { offset: u64, expected: &'static str },

    #[error("invalid hive header: {0}")]
    InvalidHeader(String),

    #[error("cell offset {offset:#x} (+{length}) exceeds hive length {hive_length:#x}")]
    CellOutOfBounds {
        offset: u32,
        length: usize,
        hive_length: u32,
    },

    #[error("malformed cell at {offset:#x}: {msg}")]
    MalformedCell { offset: u32, msg: String },
}

impl HiveError {
    /// Create a MalformedCell error.
    pub fn malformed(offset: u32, msg: impl Into<String>) -> Self {
        HiveError::MalformedCell {
            offset,
            msg: msg.into(),
        }
    }
}

pub type HiveResult<T> = Result<T, HiveError>;
