//! Block-oriented integer stream codec.
//!
//! Streams of non-negative `u32` values (document id deltas, term frequencies,
//! positions) are written in blocks by a pluggable codec, and read back with
//! support for jumping to any previously marked position.
//!
//! # Architecture
//!
//! - [`block`]: the encoder/decoder contract a concrete codec implements
//! - [`fixed`] / [`variable`]: generic stream writers and readers for the two
//!   block policies
//! - [`index`]: compact serialization of marks ([`BlockPosition`])
//! - [`vint`], [`packed`], [`adaptive`]: concrete codecs
//! - [`config`] / [`factory`]: configuration-driven construction against a
//!   [`crate::storage::Storage`]
//!
//! # Example
//!
//! ```
//! use blockpost::codec::{IntStreamReader, IntStreamWriter};
//! use blockpost::codec::fixed::{FixedIntBlockReader, FixedIntBlockWriter};
//! use blockpost::codec::index::{IndexEncoding, IndexEntryWriter};
//! use blockpost::codec::vint::VIntBlockCodec;
//! use blockpost::storage::Storage;
//! use blockpost::storage::memory::MemoryStorage;
//!
//! # fn main() -> blockpost::error::Result<()> {
//! let storage = MemoryStorage::new_default();
//!
//! let mut writer = FixedIntBlockWriter::new(storage.create_output("freq")?, VIntBlockCodec::new(4))?;
//! let mut marks = Vec::new();
//! for value in [5, 7, 2, 9, 1, 3] {
//!     marks.push(writer.mark()?);
//!     writer.write(value)?;
//! }
//! writer.close()?;
//!
//! let mut index = Vec::new();
//! IndexEntryWriter::new().write(&mut index, marks[5], IndexEncoding::Absolute)?;
//!
//! let mut reader = FixedIntBlockReader::open(storage.open_input("freq")?, VIntBlockCodec::new(4))?;
//! let mark = reader.index_reader().read(&mut index.as_slice(), IndexEncoding::Absolute)?;
//! reader.seek(mark)?;
//! assert_eq!(reader.next()?, 3);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;

use crate::codec::index::{BlockPosition, IndexEntryReader, IndexEntryWriter};
use crate::error::{BlockpostError, Result};

pub mod adaptive;
pub mod block;
pub mod config;
pub(crate) mod cursor;
pub mod factory;
pub mod fixed;
pub mod index;
pub mod packed;
pub mod variable;
pub mod vint;

/// Write side of an integer stream, independent of block policy.
pub trait IntStreamWriter: Send + Debug {
    /// Append one value.
    fn write(&mut self, value: u32) -> Result<()>;

    /// Capture the position the next written value will occupy.
    fn mark(&self) -> Result<BlockPosition>;

    /// A serializer for marks taken from this stream.
    fn index_writer(&self) -> IndexEntryWriter {
        IndexEntryWriter::new()
    }

    /// Number of values accepted by [`IntStreamWriter::write`].
    fn values_written(&self) -> u64;

    /// Finish the stream and release the output.
    ///
    /// Buffered values are flushed first unless an earlier write failed. The
    /// output is released on every path; calling close again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Read side of an integer stream, independent of block policy.
pub trait IntStreamReader: Send + Debug {
    /// Return the next value.
    ///
    /// Fails with [`BlockpostError::EndOfStream`] when the stream is exhausted
    /// at a block boundary. A fixed block stream zero-fills its last block,
    /// so padding zeros follow the last written value. Callers must bound
    /// their reads by a value count they track themselves.
    fn next(&mut self) -> Result<u32>;

    /// Jump to a marked position. No I/O happens until the next call to
    /// [`IntStreamReader::next`].
    fn seek(&mut self, pos: BlockPosition) -> Result<()>;

    /// A deserializer for marks taken from this stream's writer.
    fn index_reader(&self) -> IndexEntryReader;

    /// An independent reader over the same bytes at the same position.
    fn clone_reader(&self) -> Result<Box<dyn IntStreamReader>>;

    /// Release the input.
    fn close(&mut self) -> Result<()>;

    /// Fill `buf` with consecutive values.
    ///
    /// Returns fewer than `buf.len()` values only when the stream ends.
    fn read_into(&mut self, buf: &mut [u32]) -> Result<usize> {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.next() {
                Ok(value) => *slot = value,
                Err(BlockpostError::EndOfStream) => return Ok(i),
                Err(e) => return Err(e),
            }
        }
        Ok(buf.len())
    }
}

/// Deferred seek target of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekState {
    Idle,
    Pending(BlockPosition),
}

/// Lifecycle of a stream writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterState {
    Open,
    /// A write failed; the encoder state can no longer be trusted.
    Failed,
    Closed,
}

impl WriterState {
    pub(crate) fn check_writable(self, name: &str) -> Result<()> {
        match self {
            WriterState::Open => Ok(()),
            WriterState::Failed => Err(BlockpostError::invariant(format!(
                "{name} rejected write after an earlier write failed"
            ))),
            WriterState::Closed => Err(BlockpostError::storage(format!("{name} is closed"))),
        }
    }
}
