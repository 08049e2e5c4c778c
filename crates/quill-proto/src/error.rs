//! Protocol error type.

use thiserror::Error;

/// Errors produced while parsing or constructing DNS data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A label exceeds 63 bytes.
    #[error("label too long: {length} bytes")]
    LabelTooLong {
        /// Offending label length.
        length: usize,
    },

    /// A name exceeds 255 bytes in wire format.
    #[error("name too long: {length} bytes")]
    NameTooLong {
        /// Offending wire length.
        length: usize,
    },

    /// A label contains a character outside the accepted set.
    #[error("invalid character {character:?} in label")]
    InvalidLabelChar {
        /// The rejected character.
        character: char,
    },

    /// Ran off the end of the message.
    #[error("unexpected end of message at offset {offset}")]
    UnexpectedEof {
        /// Offset at which more data was needed.
        offset: usize,
    },

    /// The buffer is smaller than a fixed-size structure requires.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Structurally invalid data.
    #[error("invalid data at offset {offset}: {reason}")]
    InvalidData {
        /// Offset of the problem.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },

    /// Compression pointers formed a loop or chain past the hop limit.
    #[error("compression pointer loop")]
    PointerLoop,
}

impl Error {
    pub(crate) fn invalid(offset: usize, reason: &'static str) -> Self {
        Self::InvalidData { offset, reason }
    }
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
