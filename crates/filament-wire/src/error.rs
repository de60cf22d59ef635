//! Error types shared across the driver.
//!
//! One transport-agnostic error sum for every layer — codec, serializers,
//! connection and façade all funnel here so callers deal with a single
//! `Result` type.

use std::fmt;

/// One exception tuple decoded from a server error payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerException {
    /// Server-side exception class name.
    pub class: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ServerException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Driver error shared across all layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// State-machine violation or socket failure. Carries the decoded
    /// server exception list when the server reported the failure.
    #[error("not connected: {message}")]
    NotConnected {
        message: String,
        exceptions: Vec<ServerException>,
    },

    /// Encode-time missing argument, or decode-time truncated buffer.
    #[error("profile mismatch: {0}")]
    ProfileNotMatch(String),

    /// A value whose declared base is neither vertex nor edge, or a wire
    /// value of the wrong shape for its profile slot.
    #[error("wrong type: {0}")]
    WrongType(String),

    /// Record content that does not parse, or an invalid intra-record
    /// offset, or a class-name lookup failure.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A runtime value that maps to no binary type tag.
    #[error("no binary type for value: {0}")]
    TypeNotFound(String),

    /// Illegal query construction.
    #[error("bad sql command: {0}")]
    SqlCommand(String),

    /// Underlying socket error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `NotConnected` without a server exception list.
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
            exceptions: Vec::new(),
        }
    }

    /// The decoded server exceptions, if this error carries any.
    pub fn exceptions(&self) -> &[ServerException] {
        match self {
            Self::NotConnected { exceptions, .. } => exceptions,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
