//! Storage abstraction layer for claimscope.
//!
//! Persisted artifacts are written through the [`Storage`] trait so the
//! persistence codec does not care whether bytes land on disk or in memory.
//!
//! - [`FileStorage`](file::FileStorage): a directory on the local file system
//! - [`MemoryStorage`](memory::MemoryStorage): an in-process map, for tests
//!
//! # Example
//!
//! ```
//! use claimscope::storage::Storage;
//! use claimscope::storage::memory::MemoryStorage;
//! use std::io::{Read, Write};
//!
//! # fn main() -> claimscope::error::Result<()> {
//! let storage = MemoryStorage::new();
//!
//! let mut output = storage.create_output("flat.index")?;
//! output.write_all(b"test data")?;
//! output.close()?;
//!
//! let mut input = storage.open_input("flat.index")?;
//! let mut buffer = Vec::new();
//! input.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"test data");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

pub mod file;
pub mod memory;

/// A trait for storage backends that can store and retrieve named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any previous content.
    ///
    /// Content becomes visible under `name` once the output is closed.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// Atomically replace `new_name` with `old_name`.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// List all files, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Total size of the underlying file.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered bytes and sync them to the backing medium.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Finish writing. Further writes fail.
    fn close(&mut self) -> Result<()>;
}

/// Where persisted artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File(PathBuf),
    Memory,
}

/// Factory for creating storage instances.
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File(directory) => Ok(Arc::new(file::FileStorage::new(directory)?)),
            StorageConfig::Memory => Ok(Arc::new(memory::MemoryStorage::new())),
        }
    }
}
