//! Block-level cursor shared by the fixed and variable stream readers.

use std::io::{Seek, SeekFrom};

use log::trace;

use crate::codec::block::BlockDecoder;
use crate::error::{BlockpostError, Result};
use crate::storage::StorageInput;

/// Owns the input, the decoder and one reusable decode buffer.
///
/// The buffer is allocated once at the stream's maximum block size and
/// overwritten by every block load.
#[derive(Debug)]
pub(crate) struct BlockCursor<D: BlockDecoder> {
    input: Box<dyn StorageInput>,
    decoder: D,
    buffer: Vec<u32>,
    /// Values decoded from the loaded block.
    pub(crate) len: usize,
    /// Read cursor into `buffer`.
    pub(crate) upto: usize,
    /// File pointer of the loaded block, if one is loaded.
    pub(crate) block_fp: Option<u64>,
    /// File pointer the next sequential block load starts at.
    next_fp: u64,
    size: u64,
    /// Every block must decode to exactly this many values.
    fixed_len: Option<usize>,
}

impl<D: BlockDecoder> BlockCursor<D> {
    pub(crate) fn new(
        input: Box<dyn StorageInput>,
        decoder: D,
        capacity: usize,
        data_start: u64,
        fixed_len: Option<usize>,
    ) -> Result<Self> {
        let size = input.size()?;
        Ok(BlockCursor {
            input,
            decoder,
            buffer: vec![0; capacity],
            len: 0,
            upto: 0,
            block_fp: None,
            next_fp: data_start,
            size,
            fixed_len,
        })
    }

    /// Reposition the input to `fp` and decode the block there.
    pub(crate) fn load_at(&mut self, fp: u64) -> Result<()> {
        let result = self.reposition(fp).and_then(|_| self.read_block());
        self.settle(result)
    }

    /// Decode the block that follows the loaded one.
    pub(crate) fn load_next(&mut self) -> Result<()> {
        let result = self.read_block();
        self.settle(result)
    }

    /// Return the value under the cursor and advance past it.
    #[inline]
    pub(crate) fn take(&mut self) -> u32 {
        let value = self.buffer[self.upto];
        self.upto += 1;
        value
    }

    fn reposition(&mut self, fp: u64) -> Result<()> {
        self.input.seek(SeekFrom::Start(fp))?;
        self.decoder.seek(fp);
        self.next_fp = fp;
        Ok(())
    }

    fn read_block(&mut self) -> Result<()> {
        let fp = self.next_fp;
        if fp >= self.size {
            return Err(BlockpostError::EndOfStream);
        }

        let count = self
            .decoder
            .read_block(&mut self.input, &mut self.buffer)
            .map_err(BlockpostError::truncated)?;

        if count == 0 || count > self.buffer.len() {
            return Err(BlockpostError::corruption(format!(
                "block at {fp} decoded {count} values, buffer holds {}",
                self.buffer.len()
            )));
        }
        if let Some(expected) = self.fixed_len
            && count != expected
        {
            return Err(BlockpostError::corruption(format!(
                "block at {fp} decoded {count} values, expected {expected}"
            )));
        }

        self.len = count;
        self.block_fp = Some(fp);
        self.next_fp = self.input.stream_position()?;
        trace!("loaded block at {fp}: {count} values, next block at {}", self.next_fp);
        Ok(())
    }

    /// A failed load leaves no block loaded, so the next access retries from
    /// the input position instead of serving stale values.
    fn settle(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.len = 0;
            self.upto = 0;
            self.block_fp = None;
        }
        result
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

impl<D: BlockDecoder + Clone> BlockCursor<D> {
    /// An independent cursor at the same logical position, with its own input
    /// clone and its own copy of the decode buffer.
    pub(crate) fn try_clone(&self) -> Result<Self> {
        let mut input = self.input.clone_input()?;
        input.seek(SeekFrom::Start(self.next_fp))?;

        Ok(BlockCursor {
            input,
            decoder: self.decoder.clone(),
            buffer: self.buffer.clone(),
            len: self.len,
            upto: self.upto,
            block_fp: self.block_fp,
            next_fp: self.next_fp,
            size: self.size,
            fixed_len: self.fixed_len,
        })
    }
}
