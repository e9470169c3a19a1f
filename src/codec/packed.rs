//! Fixed-size bit-packed blocks.
//!
//! Block layout: one byte holding the bit width needed for the largest value
//! of the block, followed by every value packed little-endian at that width.
//! A block of zeros takes a single byte.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::codec::block::{BlockDecoder, BlockEncoder};
use crate::error::{BlockpostError, Result};

/// Compute the number of bits needed to represent the maximum value
#[inline]
pub fn bits_needed(max_val: u32) -> u8 {
    (32 - max_val.leading_zeros()) as u8
}

/// Bytes occupied by `count` values packed at `bit_width` bits.
#[inline]
pub fn packed_len(count: usize, bit_width: u8) -> usize {
    (count * bit_width as usize).div_ceil(8)
}

/// Frame-of-reference style codec with one bit width per block.
#[derive(Debug, Clone)]
pub struct PackedBlockCodec {
    block_size: usize,
    scratch: Vec<u8>,
}

impl PackedBlockCodec {
    pub fn new(block_size: usize) -> Self {
        PackedBlockCodec {
            block_size,
            scratch: Vec::with_capacity(packed_len(block_size, 32)),
        }
    }
}

fn pack(values: &[u32], bit_width: u8, output: &mut Vec<u8>) {
    output.clear();
    output.resize(packed_len(values.len(), bit_width), 0);
    if bit_width == 0 {
        return;
    }

    let mut acc = 0u64;
    let mut bits = 0u32;
    let mut idx = 0;
    for &value in values {
        acc |= (value as u64) << bits;
        bits += bit_width as u32;
        while bits >= 8 {
            output[idx] = acc as u8;
            idx += 1;
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        output[idx] = acc as u8;
    }
}

fn unpack(input: &[u8], bit_width: u8, output: &mut [u32]) {
    if bit_width == 0 {
        output.fill(0);
        return;
    }

    let mask = if bit_width == 32 {
        u32::MAX as u64
    } else {
        (1u64 << bit_width) - 1
    };
    let mut acc = 0u64;
    let mut bits = 0u32;
    let mut bytes = input.iter();
    for out in output.iter_mut() {
        while bits < bit_width as u32 {
            // `input` is sized by packed_len, so bytes never run out here.
            let byte = bytes.next().copied().unwrap_or(0);
            acc |= (byte as u64) << bits;
            bits += 8;
        }
        *out = (acc & mask) as u32;
        acc >>= bit_width;
        bits -= bit_width as u32;
    }
}

impl BlockEncoder for PackedBlockCodec {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn flush_block(&mut self, out: &mut dyn Write, block: &[u32]) -> Result<()> {
        let max = block.iter().copied().max().unwrap_or(0);
        let bit_width = bits_needed(max);

        pack(block, bit_width, &mut self.scratch);
        out.write_u8(bit_width)?;
        out.write_all(&self.scratch)?;
        Ok(())
    }
}

impl BlockDecoder for PackedBlockCodec {
    fn max_block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, input: &mut dyn Read, buffer: &mut [u32]) -> Result<usize> {
        let bit_width = input.read_u8()?;
        if bit_width > 32 {
            return Err(BlockpostError::corruption(format!(
                "bit width {bit_width} exceeds 32"
            )));
        }

        let buffer_len = buffer.len();
        let slots = buffer.get_mut(..self.block_size).ok_or_else(|| {
            BlockpostError::invariant(format!(
                "decode buffer of {buffer_len} values cannot hold a block of {}",
                self.block_size
            ))
        })?;

        self.scratch.clear();
        self.scratch.resize(packed_len(self.block_size, bit_width), 0);
        input.read_exact(&mut self.scratch)?;
        unpack(&self.scratch, bit_width, slots);
        Ok(self.block_size)
    }
}
