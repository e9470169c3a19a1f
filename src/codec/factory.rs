//! Factory for creating integer streams from a [`CodecConfig`].

use log::debug;

use crate::codec::adaptive::AdaptiveVIntCodec;
use crate::codec::config::{CodecConfig, CodecKind};
use crate::codec::fixed::{FixedIntBlockReader, FixedIntBlockWriter};
use crate::codec::packed::PackedBlockCodec;
use crate::codec::variable::{VariableIntBlockReader, VariableIntBlockWriter};
use crate::codec::vint::VIntBlockCodec;
use crate::codec::{IntStreamReader, IntStreamWriter};
use crate::error::Result;
use crate::storage::Storage;

/// Creates stream writers and readers for one codec configuration.
///
/// Callers hold the results as trait objects, so the postings layer never
/// depends on the block policy in use.
///
/// # Example
///
/// ```
/// use blockpost::codec::{IntStreamReader, IntStreamWriter};
/// use blockpost::codec::config::{CodecConfig, CodecKind};
/// use blockpost::codec::factory::IntStreamFactory;
/// use blockpost::storage::{StorageConfig, StorageFactory};
/// use blockpost::storage::memory::MemoryStorageConfig;
///
/// # fn main() -> blockpost::error::Result<()> {
/// let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))?;
/// let factory = IntStreamFactory::new(CodecConfig {
///     kind: CodecKind::VariableVInt,
///     base_block_size: 4,
///     ..Default::default()
/// })?;
///
/// let mut writer = factory.create_output(storage.as_ref(), "doc.ids")?;
/// for value in 0..10 {
///     writer.write(value)?;
/// }
/// writer.close()?;
///
/// let mut reader = factory.open_input(storage.as_ref(), "doc.ids")?;
/// let mut values = [0u32; 10];
/// reader.read_into(&mut values)?;
/// assert_eq!(values[9], 9);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IntStreamFactory {
    config: CodecConfig,
}

impl IntStreamFactory {
    /// Create a factory. The configuration is validated up front.
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(IntStreamFactory { config })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Create the named file in `storage` and start a stream on it.
    pub fn create_output(&self, storage: &dyn Storage, name: &str) -> Result<Box<dyn IntStreamWriter>> {
        debug!("creating {} stream {name}", self.config.kind.name());
        let out = storage.create_output(name)?;

        let writer: Box<dyn IntStreamWriter> = match self.config.kind {
            CodecKind::FixedVInt => Box::new(FixedIntBlockWriter::new(
                out,
                VIntBlockCodec::new(self.config.block_size),
            )?),
            CodecKind::FixedPacked => Box::new(FixedIntBlockWriter::new(
                out,
                PackedBlockCodec::new(self.config.block_size),
            )?),
            CodecKind::VariableVInt => Box::new(VariableIntBlockWriter::new(
                out,
                AdaptiveVIntCodec::new(self.config.base_block_size),
            )?),
        };
        Ok(writer)
    }

    /// Open the named stream in `storage`.
    pub fn open_input(&self, storage: &dyn Storage, name: &str) -> Result<Box<dyn IntStreamReader>> {
        debug!("opening {} stream {name}", self.config.kind.name());
        let input = storage.open_input(name)?;

        let reader: Box<dyn IntStreamReader> = match self.config.kind {
            CodecKind::FixedVInt => Box::new(FixedIntBlockReader::open(
                input,
                VIntBlockCodec::new(self.config.block_size),
            )?),
            CodecKind::FixedPacked => Box::new(FixedIntBlockReader::open(
                input,
                PackedBlockCodec::new(self.config.block_size),
            )?),
            CodecKind::VariableVInt => Box::new(VariableIntBlockReader::open(
                input,
                AdaptiveVIntCodec::new(self.config.base_block_size),
            )?),
        };
        Ok(reader)
    }
}
