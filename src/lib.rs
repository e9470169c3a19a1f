//! # Blockpost
//!
//! A block-oriented integer stream codec for postings lists, inspired by
//! Lucene's int block codecs.
//!
//! ## Features
//!
//! - Pluggable block encoders, with fixed or codec-chosen block lengths
//! - Encoders that need look-ahead before committing a block
//! - Marks for any logical position, serialized absolutely or as compact
//!   deltas against the previous mark
//! - Lazy seeks resolved on the next read
//! - Pluggable storage backends

pub mod codec;
pub mod error;
pub mod postings;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::codec::config::{CodecConfig, CodecKind};
    pub use crate::codec::factory::IntStreamFactory;
    pub use crate::codec::index::{BlockPosition, IndexEncoding, IndexEntryReader, IndexEntryWriter};
    pub use crate::codec::{IntStreamReader, IntStreamWriter};
    pub use crate::error::{BlockpostError, Result};
    pub use crate::storage::{Storage, StorageConfig, StorageFactory};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
