//! Block encoder/decoder contract.
//!
//! A codec packs one block of integers at a time. The generic stream writers
//! and readers in [`crate::codec::fixed`] and [`crate::codec::variable`] own
//! buffering, cursors and seek resolution; a codec only knows its own bit
//! layout.
//!
//! Two policies exist:
//!
//! - **Fixed**: every block holds exactly `block_size` values. The writer
//!   hands the codec a full block through [`BlockEncoder::flush_block`].
//! - **Variable**: the codec decides where blocks end. Values are submitted
//!   one by one through [`VariableBlockEncoder::add`], which reports how many
//!   earlier values were just finalized. A codec that has to see later values
//!   before it can commit earlier ones (a *non-causal* codec) returns 0 while
//!   it buffers.
//!
//! On the read side both policies share [`BlockDecoder`], whose
//! [`BlockDecoder::read_block`] reports the number of values decoded.

use std::fmt::Debug;
use std::io::{Read, Write};

use crate::error::Result;

/// Writer half of a fixed-size block codec.
pub trait BlockEncoder: Send + Debug {
    /// Number of values in every block.
    fn block_size(&self) -> usize;

    /// Encode exactly `block_size()` values.
    fn flush_block(&mut self, out: &mut dyn Write, block: &[u32]) -> Result<()>;
}

/// Writer half of a variable-size block codec.
pub trait VariableBlockEncoder: Send + Debug {
    /// Longest block the codec writes plus its [`max_look_ahead`]. Written as
    /// the stream header and used to size the reader's decode buffer.
    ///
    /// [`max_look_ahead`]: VariableBlockEncoder::max_look_ahead
    fn max_block_size(&self) -> usize;

    /// Largest number of submitted values the codec may hold back before it
    /// finalizes them.
    fn max_look_ahead(&self) -> usize;

    /// Submit one value.
    ///
    /// Returns how many previously submitted, not yet finalized values were
    /// written to `out` by this call, counting `value` itself if it was
    /// written.
    fn add(&mut self, out: &mut dyn Write, value: u32) -> Result<usize>;
}

/// Reader half of a block codec.
pub trait BlockDecoder: Send + Debug {
    /// Upper bound on the number of values one call to
    /// [`BlockDecoder::read_block`] may produce.
    fn max_block_size(&self) -> usize;

    /// Decode the next block into `buffer` and return the number of values
    /// produced.
    ///
    /// Malformed bytes must be reported as
    /// [`crate::error::BlockpostError::Corruption`]; a decoder must never write
    /// past `buffer.len()`.
    fn read_block(&mut self, input: &mut dyn Read, buffer: &mut [u32]) -> Result<usize>;

    /// Notify the decoder that the input was repositioned to `fp`.
    ///
    /// Decoders that carry state from one block to the next reset it here.
    fn seek(&mut self, _fp: u64) {}
}
