//! Fixed-size blocks of variable-length integers.
//!
//! The simplest causal codec: each slot of a block is written as a varint.

use std::io::{Read, Write};

use crate::codec::block::{BlockDecoder, BlockEncoder};
use crate::error::{BlockpostError, Result};
use crate::util::varint;

/// Writes every value of a fixed-size block as a varint.
#[derive(Debug, Clone)]
pub struct VIntBlockCodec {
    block_size: usize,
}

impl VIntBlockCodec {
    pub fn new(block_size: usize) -> Self {
        VIntBlockCodec { block_size }
    }
}

impl BlockEncoder for VIntBlockCodec {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn flush_block(&mut self, out: &mut dyn Write, block: &[u32]) -> Result<()> {
        for &value in block {
            varint::write_u32(out, value)?;
        }
        Ok(())
    }
}

impl BlockDecoder for VIntBlockCodec {
    fn max_block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, input: &mut dyn Read, buffer: &mut [u32]) -> Result<usize> {
        let buffer_len = buffer.len();
        let slots = buffer.get_mut(..self.block_size).ok_or_else(|| {
            BlockpostError::invariant(format!(
                "decode buffer of {buffer_len} values cannot hold a block of {}",
                self.block_size
            ))
        })?;

        for slot in slots {
            *slot = varint::read_u32(input)?;
        }
        Ok(self.block_size)
    }
}
