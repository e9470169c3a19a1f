//! Seek index entries.
//!
//! A [`BlockPosition`] names a logical position in an integer stream as the
//! file pointer of a block plus an offset into the values decoded from it.
//! Entries are serialized either absolutely or relative to the previously
//! written entry:
//!
//! ```text
//! absolute:             varint(upto)  varint(fp)
//! relative, same block: varint((upto - last_upto) << 1 | 1)
//! relative, new block:  varint(upto << 1)  zigzag_varint(fp - last_fp)
//! ```
//!
//! Relative entries are only meaningful for positions produced by one forward
//! write pass, where consecutive marks sit in the same or a later block.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{BlockpostError, Result};
use crate::util::varint;

/// A logical position in an integer stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    /// Byte offset of the block holding the position.
    pub fp: u64,
    /// Offset of the position within the values decoded from that block.
    pub upto: u32,
}

impl BlockPosition {
    pub fn new(fp: u64, upto: u32) -> Self {
        BlockPosition { fp, upto }
    }
}

/// How an index entry is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEncoding {
    /// Self-contained entry.
    Absolute,
    /// Delta against the writer's or reader's current baseline.
    Relative,
}

/// Serializes [`BlockPosition`]s against a running baseline.
#[derive(Debug, Clone, Default)]
pub struct IndexEntryWriter {
    last: BlockPosition,
}

impl IndexEntryWriter {
    /// Create a writer whose baseline is the start of the stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry relative encodings are computed against.
    pub fn baseline(&self) -> BlockPosition {
        self.last
    }

    /// Replace the baseline, e.g. to continue from another writer's state.
    pub fn set_baseline(&mut self, pos: BlockPosition) {
        self.last = pos;
    }

    /// Reset the baseline to the start of the stream.
    pub fn reset(&mut self) {
        self.last = BlockPosition::default();
    }

    /// Serialize `pos` without moving the baseline.
    ///
    /// Returns the number of bytes written.
    pub fn write(
        &self,
        out: &mut dyn Write,
        pos: BlockPosition,
        encoding: IndexEncoding,
    ) -> Result<usize> {
        match encoding {
            IndexEncoding::Absolute => {
                let mut written = varint::write_u32(out, pos.upto)?;
                written += varint::write_u64(out, pos.fp)?;
                Ok(written)
            }
            IndexEncoding::Relative if pos.fp == self.last.fp => {
                let delta = pos.upto.checked_sub(self.last.upto).ok_or_else(|| {
                    BlockpostError::invariant(format!(
                        "mark moved backwards within block {}: upto {} after {}",
                        pos.fp, pos.upto, self.last.upto
                    ))
                })?;
                varint::write_u64(out, ((delta as u64) << 1) | 1)
            }
            IndexEncoding::Relative => {
                let fp_delta = pos.fp as i64 - self.last.fp as i64;
                let mut written = varint::write_u64(out, (pos.upto as u64) << 1)?;
                written += varint::write_i64(out, fp_delta)?;
                Ok(written)
            }
        }
    }

    /// Serialize `pos` and make it the new baseline.
    pub fn write_and_promote(
        &mut self,
        out: &mut dyn Write,
        pos: BlockPosition,
        encoding: IndexEncoding,
    ) -> Result<usize> {
        let written = self.write(out, pos, encoding)?;
        self.last = pos;
        Ok(written)
    }
}

/// Deserializes [`BlockPosition`]s, tracking the running position.
#[derive(Debug, Clone, Default)]
pub struct IndexEntryReader {
    current: BlockPosition,
    block_size: Option<usize>,
}

impl IndexEntryReader {
    /// Create a reader for a variable-block stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader for a fixed-block stream; every decoded entry is
    /// checked against `block_size`.
    pub fn with_block_size(block_size: usize) -> Self {
        IndexEntryReader {
            current: BlockPosition::default(),
            block_size: Some(block_size),
        }
    }

    /// The most recently decoded position.
    pub fn position(&self) -> BlockPosition {
        self.current
    }

    /// Replace the running position, e.g. with a term's start position.
    pub fn set_position(&mut self, pos: BlockPosition) {
        self.current = pos;
    }

    /// Decode the next entry and make it the running position.
    pub fn read(&mut self, input: &mut dyn Read, encoding: IndexEncoding) -> Result<BlockPosition> {
        let next = match encoding {
            IndexEncoding::Absolute => {
                let upto = varint::read_u32(input)?;
                let fp = varint::read_u64(input)?;
                BlockPosition { fp, upto }
            }
            IndexEncoding::Relative => {
                let upto_delta = varint::read_u64(input)?;
                let shifted = u32::try_from(upto_delta >> 1).map_err(|_| {
                    BlockpostError::corruption(format!("index entry delta {upto_delta} too large"))
                })?;

                if upto_delta & 1 == 1 {
                    let upto = self.current.upto.checked_add(shifted).ok_or_else(|| {
                        BlockpostError::corruption("index entry upto overflows u32")
                    })?;
                    BlockPosition {
                        fp: self.current.fp,
                        upto,
                    }
                } else {
                    let fp_delta = varint::read_i64(input)?;
                    let fp = self.current.fp.checked_add_signed(fp_delta).ok_or_else(|| {
                        BlockpostError::corruption(format!(
                            "index entry moves file pointer {} by {fp_delta}",
                            self.current.fp
                        ))
                    })?;
                    BlockPosition { fp, upto: shifted }
                }
            }
        };

        if let Some(block_size) = self.block_size
            && next.upto as usize >= block_size
        {
            return Err(BlockpostError::invariant(format!(
                "index entry upto {} outside block of {block_size} values",
                next.upto
            )));
        }

        self.current = next;
        Ok(next)
    }
}
