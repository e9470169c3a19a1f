//! Storage abstraction layer for Blockpost.
//!
//! Integer streams are written to and read from named files held by a
//! [`Storage`] backend. Writers see an append-only [`StorageOutput`]; readers
//! see a seekable [`StorageInput`] that can be cloned into independent cursors
//! over the same immutable bytes.
//!
//! # Storage Types
//!
//! ## FileStorage
//! - Disk-based persistent storage
//! - Buffered reads and writes, optional sync on every write
//!
//! ## MemoryStorage
//! - In-memory storage for testing and temporary data
//! - Closed files are shared between all inputs without copying
//!
//! # Example
//!
//! ```
//! use blockpost::storage::{StorageConfig, StorageFactory};
//! use blockpost::storage::memory::MemoryStorageConfig;
//! use std::io::{Read, Write};
//!
//! # fn main() -> blockpost::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))?;
//!
//! let mut output = storage.create_output("doc.ids")?;
//! output.write_all(b"postings")?;
//! output.close()?;
//!
//! let mut input = storage.open_input("doc.ids")?;
//! let mut buffer = Vec::new();
//! input.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"postings");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BlockpostError, Result};

pub mod file;
pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

/// A trait for storage backends that can store and retrieve data.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any previous contents.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Make all closed outputs durable.
    fn sync(&self) -> Result<()>;

    /// Close the storage. Later operations fail with [`StorageError::StorageClosed`].
    fn close(&mut self) -> Result<()>;
}

/// A readable, seekable view of one stored file.
///
/// Every input owns its own position. [`StorageInput::clone_input`] returns a
/// new input over the same bytes whose position is independent of this one.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Total size of the underlying file in bytes.
    fn size(&self) -> Result<u64>;

    /// Create an independent cursor over the same bytes, positioned at 0.
    fn clone_input(&self) -> Result<Box<dyn StorageInput>>;

    /// Release the input.
    fn close(&mut self) -> Result<()>;
}

/// An append-only byte sink for one stored file.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered bytes and make them durable.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Number of bytes written so far.
    fn position(&self) -> Result<u64>;

    /// Flush and release the output. Calling close twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

// Implement StorageOutput for Box<dyn StorageOutput> to allow trait objects
impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> Result<u64> {
        self.as_ref().position()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

// Implement StorageInput for Box<dyn StorageInput> to allow trait objects
impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        self.as_ref().clone_input()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Configuration for the supported storage backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Disk-based storage rooted at a directory.
    File(file::FileStorageConfig),

    /// In-memory storage.
    Memory(memory::MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryStorageConfig::default())
    }
}

/// Helper for constructing storage backends from configuration.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::Memory(mem_config) => {
                let storage = memory::MemoryStorage::new(mem_config);
                Ok(Arc::new(storage))
            }
            StorageConfig::File(file_config) => {
                let path = file_config.path.clone();
                let storage = file::FileStorage::new(&path, file_config)?;
                Ok(Arc::new(storage))
            }
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    FileNotFound(String),

    IoError(String),

    StorageClosed,

    OutputClosed(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::StorageClosed => write!(f, "Storage is closed"),
            StorageError::OutputClosed(name) => write!(f, "Output is closed: {name}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for BlockpostError {
    fn from(err: StorageError) -> Self {
        BlockpostError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::FileStorageConfig;
    use crate::storage::memory::MemoryStorageConfig;

    #[test]
    fn test_storage_config_default() {
        match StorageConfig::default() {
            StorageConfig::Memory(mem_config) => {
                assert_eq!(mem_config.initial_capacity, 16);
            }
            _ => panic!("Expected Memory config"),
        }
    }

    #[test]
    fn test_storage_config_json() {
        let config = StorageConfig::File(FileStorageConfig::new("/tmp/segments"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"File\""));

        let parsed: StorageConfig = serde_json::from_str(&json).unwrap();
        match parsed {
            StorageConfig::File(file_config) => {
                assert_eq!(file_config.path, std::path::PathBuf::from("/tmp/segments"));
                assert_eq!(file_config.buffer_size, 65536);
            }
            _ => panic!("Expected File config"),
        }
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("doc.ids".to_string());
        assert_eq!(err.to_string(), "File not found: doc.ids");

        let err = StorageError::StorageClosed;
        assert_eq!(err.to_string(), "Storage is closed");

        let err: BlockpostError = StorageError::OutputClosed("freq".to_string()).into();
        assert_eq!(err.to_string(), "Storage error: Output is closed: freq");
    }

    #[test]
    fn test_storage_factory_memory() {
        let config = StorageConfig::Memory(MemoryStorageConfig::default());
        let storage = StorageFactory::create(config).unwrap();
        assert!(!storage.file_exists("doc.ids"));
    }

    #[test]
    fn test_storage_factory_file() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::File(FileStorageConfig::new(temp_dir.path()));
        let storage = StorageFactory::create(config).unwrap();

        let mut output = storage.create_output("doc.ids").unwrap();
        output.write_all(b"Hello, Factory!").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("doc.ids").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, b"Hello, Factory!");
    }
}
