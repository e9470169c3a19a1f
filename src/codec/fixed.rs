//! Fixed-size block streams.
//!
//! Stream layout:
//!
//! ```text
//! varint(block_size)  block  block  ...
//! ```
//!
//! Every block holds exactly `block_size` encoded values. The last block is
//! padded with zeros when the stream length is not a multiple of the block
//! size; padding slots are never distinguished from real values by the
//! stream, so callers bound their reads by their own value counts.

use std::io::{Seek, SeekFrom};

use log::{debug, warn};

use crate::codec::block::{BlockDecoder, BlockEncoder};
use crate::codec::cursor::BlockCursor;
use crate::codec::index::{BlockPosition, IndexEntryReader};
use crate::codec::{IntStreamReader, IntStreamWriter, SeekState, WriterState};
use crate::error::{BlockpostError, Result};
use crate::storage::{StorageInput, StorageOutput};
use crate::util::varint;

/// Writes values in blocks of a fixed size.
#[derive(Debug)]
pub struct FixedIntBlockWriter<E: BlockEncoder> {
    out: Box<dyn StorageOutput>,
    encoder: E,
    buffer: Vec<u32>,
    upto: usize,
    written: u64,
    state: WriterState,
}

impl<E: BlockEncoder> FixedIntBlockWriter<E> {
    /// Start a stream on `out`, writing the block size header.
    pub fn new(mut out: Box<dyn StorageOutput>, encoder: E) -> Result<Self> {
        let block_size = encoder.block_size();
        if block_size == 0 {
            return Err(BlockpostError::invalid_argument("block size must be positive"));
        }

        varint::write_u64(&mut out, block_size as u64)?;
        debug!("opened fixed block stream, block_size={block_size}");

        Ok(FixedIntBlockWriter {
            out,
            encoder,
            buffer: vec![0; block_size],
            upto: 0,
            written: 0,
            state: WriterState::Open,
        })
    }

    /// Number of values in every block.
    pub fn block_size(&self) -> usize {
        self.buffer.len()
    }

    fn flush_block(&mut self) -> Result<()> {
        let result = self.encoder.flush_block(&mut self.out, &self.buffer);
        if result.is_err() {
            self.state = WriterState::Failed;
        }
        result
    }
}

impl<E: BlockEncoder> IntStreamWriter for FixedIntBlockWriter<E> {
    fn write(&mut self, value: u32) -> Result<()> {
        self.state.check_writable("fixed block writer")?;

        self.buffer[self.upto] = value;
        self.upto += 1;
        self.written += 1;

        if self.upto == self.buffer.len() {
            self.flush_block()?;
            self.upto = 0;
        }
        Ok(())
    }

    fn mark(&self) -> Result<BlockPosition> {
        Ok(BlockPosition {
            fp: self.out.position()?,
            upto: self.upto as u32,
        })
    }

    fn values_written(&self) -> u64 {
        self.written
    }

    fn close(&mut self) -> Result<()> {
        let flushed = match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Failed => {
                warn!("closing fixed block stream after a failed write; tail not flushed");
                Ok(())
            }
            WriterState::Open if self.upto > 0 => {
                self.buffer[self.upto..].fill(0);
                self.flush_block()
            }
            WriterState::Open => Ok(()),
        };

        self.state = WriterState::Closed;
        let released = self.out.close();
        debug!(
            "closed fixed block stream: {} values, {} blocks",
            self.written,
            self.written.div_ceil(self.buffer.len() as u64)
        );
        flushed.and(released)
    }
}

impl<E: BlockEncoder> Drop for FixedIntBlockWriter<E> {
    fn drop(&mut self) {
        if self.state != WriterState::Closed {
            warn!("fixed block writer dropped without close; releasing output");
            let _ = self.out.close();
        }
    }
}

/// Reads a fixed-size block stream.
#[derive(Debug)]
pub struct FixedIntBlockReader<D: BlockDecoder> {
    cursor: BlockCursor<D>,
    block_size: usize,
    seek: SeekState,
}

impl<D: BlockDecoder> FixedIntBlockReader<D> {
    /// Open a stream, validating its header against `decoder`.
    pub fn open(mut input: Box<dyn StorageInput>, decoder: D) -> Result<Self> {
        input.seek(SeekFrom::Start(0))?;
        let header = varint::read_u64(&mut input).map_err(BlockpostError::truncated)?;

        let block_size = decoder.max_block_size();
        if header != block_size as u64 {
            return Err(BlockpostError::corruption(format!(
                "stream block size {header} does not match decoder block size {block_size}"
            )));
        }

        let data_start = input.stream_position()?;
        debug!("opened fixed block reader, block_size={block_size}");

        Ok(FixedIntBlockReader {
            cursor: BlockCursor::new(input, decoder, block_size, data_start, Some(block_size))?,
            block_size,
            seek: SeekState::Idle,
        })
    }

    /// Number of values in every block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl<D: BlockDecoder + Clone + 'static> IntStreamReader for FixedIntBlockReader<D> {
    fn next(&mut self) -> Result<u32> {
        match std::mem::replace(&mut self.seek, SeekState::Idle) {
            SeekState::Pending(target) => {
                if self.cursor.block_fp != Some(target.fp) {
                    self.cursor.load_at(target.fp)?;
                }
                self.cursor.upto = target.upto as usize;
            }
            SeekState::Idle => {
                if self.cursor.upto == self.cursor.len {
                    self.cursor.load_next()?;
                    self.cursor.upto = 0;
                }
            }
        }

        Ok(self.cursor.take())
    }

    fn seek(&mut self, pos: BlockPosition) -> Result<()> {
        if pos.upto as usize >= self.block_size {
            return Err(BlockpostError::invariant(format!(
                "seek upto {} outside block of {} values",
                pos.upto, self.block_size
            )));
        }
        self.seek = SeekState::Pending(pos);
        Ok(())
    }

    fn index_reader(&self) -> IndexEntryReader {
        IndexEntryReader::with_block_size(self.block_size)
    }

    fn clone_reader(&self) -> Result<Box<dyn IntStreamReader>> {
        Ok(Box::new(FixedIntBlockReader {
            cursor: self.cursor.try_clone()?,
            block_size: self.block_size,
            seek: self.seek,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.cursor.close()
    }
}
