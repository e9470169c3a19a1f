//! Variable-size block streams.
//!
//! Stream layout:
//!
//! ```text
//! u32_le(max_block_size)  block  block  ...
//! ```
//!
//! The codec alone decides where a block ends, and may hold values back until
//! it has seen enough of the stream to commit them. The writer tracks that
//! backlog as its *look-ahead depth*: a mark taken while values are held back
//! records the file pointer the next block will start at plus the depth, which
//! can reach past the end of that block. The reader normalizes such marks by
//! walking forward block by block once the real block lengths are known.

use std::io::{Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use crate::codec::block::{BlockDecoder, VariableBlockEncoder};
use crate::codec::cursor::BlockCursor;
use crate::codec::index::{BlockPosition, IndexEntryReader};
use crate::codec::{IntStreamReader, IntStreamWriter, SeekState, WriterState};
use crate::error::{BlockpostError, Result};
use crate::storage::{StorageInput, StorageOutput};

/// Writes values through a codec that chooses its own block boundaries.
#[derive(Debug)]
pub struct VariableIntBlockWriter<E: VariableBlockEncoder> {
    out: Box<dyn StorageOutput>,
    encoder: E,
    /// Look-ahead depth: values submitted but not yet written by the codec.
    upto: usize,
    written: u64,
    state: WriterState,
}

impl<E: VariableBlockEncoder> VariableIntBlockWriter<E> {
    /// Start a stream on `out`, writing the maximum block size header.
    pub fn new(mut out: Box<dyn StorageOutput>, encoder: E) -> Result<Self> {
        let max_block_size = encoder.max_block_size();
        let header = u32::try_from(max_block_size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                BlockpostError::invalid_argument(format!(
                    "max block size {max_block_size} must be in 1..=u32::MAX"
                ))
            })?;

        out.write_u32::<LittleEndian>(header)?;
        debug!(
            "opened variable block stream, max_block_size={max_block_size}, max_look_ahead={}",
            encoder.max_look_ahead()
        );

        Ok(VariableIntBlockWriter {
            out,
            encoder,
            upto: 0,
            written: 0,
            state: WriterState::Open,
        })
    }

    /// Values submitted but not yet written by the codec.
    pub fn look_ahead_depth(&self) -> usize {
        self.upto
    }

    /// Submit one value to the codec and account for what it flushed.
    fn submit(&mut self, value: u32) -> Result<()> {
        let flushed = self.encoder.add(&mut self.out, value)?;

        let depth = (self.upto + 1).checked_sub(flushed).ok_or_else(|| {
            BlockpostError::invariant(format!(
                "codec flushed {flushed} values with only {} pending",
                self.upto + 1
            ))
        })?;
        if depth > self.encoder.max_look_ahead() {
            return Err(BlockpostError::invariant(format!(
                "codec holds {depth} values, more than its declared look-ahead {}",
                self.encoder.max_look_ahead()
            )));
        }

        self.upto = depth;
        Ok(())
    }

    /// Feed zeros until every real value has been written.
    ///
    /// Codecs flush in submission order, so once the backlog is no larger than
    /// the number of zeros fed, only zeros remain held back.
    fn drain(&mut self) -> Result<()> {
        let bound = self.encoder.max_look_ahead() + 1;
        let mut stuffed = 0usize;

        while self.upto > stuffed {
            if stuffed >= bound {
                return Err(BlockpostError::invariant(format!(
                    "codec still holds {} values after {stuffed} padding values",
                    self.upto
                )));
            }
            self.submit(0)?;
            stuffed += 1;
        }

        if stuffed > 0 {
            debug!("drained variable block stream with {stuffed} padding values");
        }
        Ok(())
    }
}

impl<E: VariableBlockEncoder> IntStreamWriter for VariableIntBlockWriter<E> {
    fn write(&mut self, value: u32) -> Result<()> {
        self.state.check_writable("variable block writer")?;

        if let Err(e) = self.submit(value) {
            self.state = WriterState::Failed;
            return Err(e);
        }
        self.written += 1;
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
        let drained = match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Failed => {
                warn!(
                    "closing variable block stream after a failed write; {} held values dropped",
                    self.upto
                );
                Ok(())
            }
            WriterState::Open => self.drain(),
        };

        self.state = WriterState::Closed;
        let released = self.out.close();
        debug!("closed variable block stream: {} values", self.written);
        drained.and(released)
    }
}

impl<E: VariableBlockEncoder> Drop for VariableIntBlockWriter<E> {
    fn drop(&mut self) {
        if self.state != WriterState::Closed {
            warn!("variable block writer dropped without close; releasing output");
            let _ = self.out.close();
        }
    }
}

/// Reads a variable-size block stream.
#[derive(Debug)]
pub struct VariableIntBlockReader<D: BlockDecoder> {
    cursor: BlockCursor<D>,
    seek: SeekState,
}

impl<D: BlockDecoder> VariableIntBlockReader<D> {
    /// Open a stream. The decode buffer is sized from the stream header.
    pub fn open(mut input: Box<dyn StorageInput>, decoder: D) -> Result<Self> {
        input.seek(SeekFrom::Start(0))?;
        let header = input
            .read_u32::<LittleEndian>()
            .map_err(|e| BlockpostError::from(e).truncated())? as usize;

        if header == 0 || header > decoder.max_block_size() {
            return Err(BlockpostError::corruption(format!(
                "stream max block size {header} outside 1..={}",
                decoder.max_block_size()
            )));
        }

        let data_start = input.stream_position()?;
        debug!("opened variable block reader, max_block_size={header}");

        Ok(VariableIntBlockReader {
            cursor: BlockCursor::new(input, decoder, header, data_start, None)?,
            seek: SeekState::Idle,
        })
    }

    /// Resolve a pending seek.
    ///
    /// The mark's offset was counted before the writer knew where blocks would
    /// end, so it may lie beyond the block at `target.fp`; skip whole blocks
    /// until it falls inside one.
    fn resolve(&mut self, target: BlockPosition) -> Result<()> {
        if self.cursor.block_fp != Some(target.fp) {
            self.cursor.load_at(target.fp)?;
        }

        let mut upto = target.upto as usize;
        while upto >= self.cursor.len {
            upto -= self.cursor.len;
            self.cursor.load_next()?;
        }
        self.cursor.upto = upto;
        Ok(())
    }
}

impl<D: BlockDecoder + Clone + 'static> IntStreamReader for VariableIntBlockReader<D> {
    fn next(&mut self) -> Result<u32> {
        if let SeekState::Pending(target) = std::mem::replace(&mut self.seek, SeekState::Idle) {
            self.resolve(target)?;
        }

        if self.cursor.upto == self.cursor.len {
            self.cursor.load_next()?;
            self.cursor.upto = 0;
        }

        Ok(self.cursor.take())
    }

    fn seek(&mut self, pos: BlockPosition) -> Result<()> {
        self.seek = SeekState::Pending(pos);
        Ok(())
    }

    fn index_reader(&self) -> IndexEntryReader {
        IndexEntryReader::new()
    }

    fn clone_reader(&self) -> Result<Box<dyn IntStreamReader>> {
        Ok(Box::new(VariableIntBlockReader {
            cursor: self.cursor.try_clone()?,
            seek: self.seek,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.cursor.close()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::codec::adaptive::AdaptiveVIntCodec;
    use crate::storage::Storage;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::testing::ScriptedOutput;
    use crate::util::varint;

    /// Emits every value on its own, immediately.
    #[derive(Debug, Clone, Default)]
    struct CausalCodec;

    impl VariableBlockEncoder for CausalCodec {
        fn max_block_size(&self) -> usize {
            1
        }

        fn max_look_ahead(&self) -> usize {
            0
        }

        fn add(&mut self, out: &mut dyn Write, value: u32) -> Result<usize> {
            varint::write_u32(out, value)?;
            Ok(1)
        }
    }

    impl BlockDecoder for CausalCodec {
        fn max_block_size(&self) -> usize {
            1
        }

        fn read_block(&mut self, input: &mut dyn Read, buffer: &mut [u32]) -> Result<usize> {
            buffer[0] = varint::read_u32(input)?;
            Ok(1)
        }
    }

    /// Claims to flush more values than it was given.
    #[derive(Debug)]
    struct OverflushingCodec;

    impl VariableBlockEncoder for OverflushingCodec {
        fn max_block_size(&self) -> usize {
            4
        }

        fn max_look_ahead(&self) -> usize {
            4
        }

        fn add(&mut self, _out: &mut dyn Write, _value: u32) -> Result<usize> {
            Ok(2)
        }
    }

    /// Buffers forever and never flushes.
    #[derive(Debug)]
    struct HoardingCodec {
        held: usize,
        limit: usize,
    }

    impl VariableBlockEncoder for HoardingCodec {
        fn max_block_size(&self) -> usize {
            8
        }

        fn max_look_ahead(&self) -> usize {
            self.limit
        }

        fn add(&mut self, _out: &mut dyn Write, _value: u32) -> Result<usize> {
            self.held += 1;
            Ok(0)
        }
    }

    /// Fails on a chosen value.
    #[derive(Debug)]
    struct FailingCodec {
        poison: u32,
        calls: usize,
    }

    impl VariableBlockEncoder for FailingCodec {
        fn max_block_size(&self) -> usize {
            4
        }

        fn max_look_ahead(&self) -> usize {
            4
        }

        fn add(&mut self, _out: &mut dyn Write, value: u32) -> Result<usize> {
            self.calls += 1;
            if value == self.poison {
                return Err(BlockpostError::other("encoder failure"));
            }
            Ok(0)
        }
    }

    #[test]
    fn test_causal_round_trip_and_header() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let mut writer = VariableIntBlockWriter::new(output, CausalCodec).unwrap();
        for value in [3, 1, 4, 1, 5] {
            writer.write(value).unwrap();
            assert_eq!(writer.look_ahead_depth(), 0);
        }
        writer.close().unwrap();

        assert_eq!(
            storage.file_bytes("ints").unwrap(),
            vec![1, 0, 0, 0, 3, 1, 4, 1, 5]
        );

        let mut reader =
            VariableIntBlockReader::open(storage.open_input("ints").unwrap(), CausalCodec).unwrap();
        let mut values = [0u32; 8];
        assert_eq!(reader.read_into(&mut values).unwrap(), 5);
        assert_eq!(&values[..5], &[3, 1, 4, 1, 5]);
        assert!(reader.next().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_mark_past_block_end_is_normalized() {
        // First value 9 selects blocks of 2 * base values.
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let mut writer = VariableIntBlockWriter::new(output, AdaptiveVIntCodec::new(2)).unwrap();

        let values = [9, 10, 11, 12, 1, 20, 21, 22, 23];
        let mut marks = Vec::new();
        for &value in &values {
            marks.push(writer.mark().unwrap());
            writer.write(value).unwrap();
        }
        writer.close().unwrap();

        // Nothing was flushed before the fifth value arrived, so the first
        // five marks all point at the first block.
        assert!(marks[..5].iter().all(|m| m.fp == 4));
        assert_eq!(marks[4].upto, 4);

        let mut reader =
            VariableIntBlockReader::open(storage.open_input("ints").unwrap(), AdaptiveVIntCodec::new(2))
                .unwrap();
        for (k, &expected) in values.iter().enumerate() {
            reader.seek(marks[k]).unwrap();
            assert_eq!(reader.next().unwrap(), expected, "position {k}");
        }
    }

    #[test]
    fn test_overflush_is_invariant_violation() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let mut writer = VariableIntBlockWriter::new(output, OverflushingCodec).unwrap();

        assert!(writer.write(1).unwrap_err().is_invariant());
        // The writer is poisoned; close skips draining and still releases.
        assert!(writer.write(2).unwrap_err().is_invariant());
        writer.close().unwrap();
        assert!(storage.file_exists("ints"));
    }

    #[test]
    fn test_look_ahead_beyond_declared_bound_is_rejected() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let codec = HoardingCodec { held: 0, limit: 2 };
        let mut writer = VariableIntBlockWriter::new(output, codec).unwrap();

        writer.write(1).unwrap();
        writer.write(2).unwrap();
        assert!(writer.write(3).unwrap_err().is_invariant());
    }

    #[test]
    fn test_drain_bound_stops_hoarding_codec() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let codec = HoardingCodec { held: 0, limit: 16 };
        let mut writer = VariableIntBlockWriter::new(output, codec).unwrap();

        writer.write(7).unwrap();
        let err = writer.close().unwrap_err();
        assert!(err.is_invariant());
        // Output released despite the failed drain.
        assert!(storage.file_exists("ints"));
        writer.close().unwrap();
    }

    #[test]
    fn test_failed_write_skips_drain() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let codec = FailingCodec {
            poison: 13,
            calls: 0,
        };
        let mut writer = VariableIntBlockWriter::new(output, codec).unwrap();

        writer.write(1).unwrap();
        assert!(writer.write(13).is_err());
        writer.close().unwrap();

        // Two submissions, no padding zeros afterwards.
        assert_eq!(writer.encoder.calls, 2);
        assert_eq!(writer.values_written(), 1);
        assert_eq!(storage.file_bytes("ints").unwrap().len(), 4);
    }

    #[test]
    fn test_header_larger_than_decoder_is_corruption() {
        let storage = MemoryStorage::new_default();
        let output = storage.create_output("ints").unwrap();
        let mut writer = VariableIntBlockWriter::new(output, AdaptiveVIntCodec::new(8)).unwrap();
        writer.write(1).unwrap();
        writer.close().unwrap();

        let err = VariableIntBlockReader::open(
            storage.open_input("ints").unwrap(),
            AdaptiveVIntCodec::new(2),
        )
        .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_truncated_header_is_corruption() {
        let storage = MemoryStorage::new_default();
        storage.put_file("ints", vec![4, 0]).unwrap();

        let err =
            VariableIntBlockReader::open(storage.open_input("ints").unwrap(), CausalCodec).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_failed_drain_still_releases_output_once() {
        // Only the header fits; the drained block cannot be written.
        let (output, log) = ScriptedOutput::new(4, true);
        let mut writer = VariableIntBlockWriter::new(output, AdaptiveVIntCodec::new(2)).unwrap();
        writer.write(1).unwrap();
        assert_eq!(writer.look_ahead_depth(), 1);

        let err = writer.close().unwrap_err();
        assert!(matches!(err, BlockpostError::Io(_)));
        writer.close().unwrap();
        drop(writer);

        let log = log.lock();
        assert_eq!(log.bytes.len(), 4);
        assert_eq!(log.close_calls, 1);
    }
}
