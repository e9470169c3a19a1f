//! Error types for the Blockpost library.
//!
//! All fallible operations return [`BlockpostError`]. The variants follow the
//! three failure classes of the codec layer:
//!
//! - **Invariant violations** ([`BlockpostError::Invariant`]) signal a defect in
//!   an encoder implementation or caller misuse. They are never retried.
//! - **Corruption** ([`BlockpostError::Corruption`]) means the bytes of a stream
//!   cannot be trusted. The affected reader must be abandoned.
//! - **I/O** ([`BlockpostError::Io`]) comes from the byte sink or source below
//!   the codec.
//!
//! # Examples
//!
//! ```
//! use blockpost::error::{BlockpostError, Result};
//!
//! fn check_block_size(size: usize) -> Result<()> {
//!     if size == 0 {
//!         return Err(BlockpostError::invalid_argument("block size must be positive"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_block_size(0).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Blockpost operations.
#[derive(Error, Debug)]
pub enum BlockpostError {
    /// I/O errors from the underlying byte sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or truncated stream bytes.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Internal invariant violated by an encoder or by the caller.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// The stream has no more blocks to decode.
    #[error("End of stream")]
    EndOfStream,

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid argument passed by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with BlockpostError.
pub type Result<T> = std::result::Result<T, BlockpostError>;

impl BlockpostError {
    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        BlockpostError::Corruption(msg.into())
    }

    /// Create a new invariant violation error.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        BlockpostError::Invariant(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        BlockpostError::Storage(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        BlockpostError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        BlockpostError::Config(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        BlockpostError::Other(msg.into())
    }

    /// Reinterpret a premature end of input inside a block as corruption.
    ///
    /// Block boundaries are the only places a stream may legally end, so a
    /// decoder hitting `UnexpectedEof` means the stream was truncated.
    pub fn truncated(self) -> Self {
        match self {
            BlockpostError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                BlockpostError::Corruption(format!("truncated block: {e}"))
            }
            other => other,
        }
    }

    /// Whether this error means the stream bytes cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, BlockpostError::Corruption(_))
    }

    /// Whether this error signals a defect rather than bad input.
    pub fn is_invariant(&self) -> bool {
        matches!(self, BlockpostError::Invariant(_))
    }

    /// Whether this error marks the end of a stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, BlockpostError::EndOfStream)
    }
}
