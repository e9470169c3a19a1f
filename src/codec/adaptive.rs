//! Non-causal variable-size varint blocks.
//!
//! The length of a block depends on its first value: `base` values when the
//! first value is at most [`SHORT_BLOCK_MAX_LEAD`], otherwise `2 * base`. The
//! encoder only commits a block once the value *after* it has arrived, so
//! it always holds back at least one value. Streams written with it exercise
//! the writer's drain on close and the reader's seek normalization.

use std::io::{Read, Write};

use crate::codec::block::{BlockDecoder, VariableBlockEncoder};
use crate::error::{BlockpostError, Result};
use crate::util::varint;

/// Largest leading value that selects a short block.
pub const SHORT_BLOCK_MAX_LEAD: u32 = 3;

/// Variable-length block codec whose block length is chosen by the lead value.
#[derive(Debug, Clone)]
pub struct AdaptiveVIntCodec {
    base: usize,
    pending: Vec<u32>,
}

impl AdaptiveVIntCodec {
    pub fn new(base: usize) -> Self {
        AdaptiveVIntCodec {
            base,
            pending: Vec::with_capacity(2 * base + 1),
        }
    }

    /// Length of a block with a lead above [`SHORT_BLOCK_MAX_LEAD`].
    #[inline]
    fn longest_block(&self) -> usize {
        2 * self.base
    }

    /// Number of values in a block that starts with `lead`.
    #[inline]
    pub fn block_len(&self, lead: u32) -> usize {
        if lead <= SHORT_BLOCK_MAX_LEAD {
            self.base
        } else {
            self.longest_block()
        }
    }
}

impl VariableBlockEncoder for AdaptiveVIntCodec {
    fn max_block_size(&self) -> usize {
        self.longest_block() + self.max_look_ahead()
    }

    fn max_look_ahead(&self) -> usize {
        self.longest_block()
    }

    fn add(&mut self, out: &mut dyn Write, value: u32) -> Result<usize> {
        self.pending.push(value);

        let flush_at = self.block_len(self.pending[0]);
        if self.pending.len() <= flush_at {
            return Ok(0);
        }

        for &v in &self.pending[..flush_at] {
            varint::write_u32(out, v)?;
        }
        self.pending.drain(..flush_at);
        Ok(flush_at)
    }
}

impl BlockDecoder for AdaptiveVIntCodec {
    fn max_block_size(&self) -> usize {
        VariableBlockEncoder::max_block_size(self)
    }

    fn read_block(&mut self, input: &mut dyn Read, buffer: &mut [u32]) -> Result<usize> {
        let lead = varint::read_u32(input)?;
        let count = self.block_len(lead);
        if count > buffer.len() {
            return Err(BlockpostError::corruption(format!(
                "block of {count} values does not fit buffer of {}",
                buffer.len()
            )));
        }

        buffer[0] = lead;
        for slot in &mut buffer[1..count] {
            *slot = varint::read_u32(input)?;
        }
        Ok(count)
    }
}
