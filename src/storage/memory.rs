//! In-memory storage implementation for testing.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ClaimscopeError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};

type FileMap = Arc<Mutex<HashMap<String, Arc<[u8]>>>>;

/// An in-memory storage implementation.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: FileMap,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Overwrite the raw bytes of a file.
    pub fn put(&self, name: &str, data: Vec<u8>) {
        self.files.lock().insert(name.to_string(), data.into());
    }

    /// Raw bytes of a file.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|d| d.to_vec())
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self
            .files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ClaimscopeError::storage(format!("File not found: {name}")))?;
        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(data),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| ClaimscopeError::storage(format!("File not found: {old_name}")))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// A memory-based output; the file appears when closed.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
    closed: bool,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data = std::mem::take(&mut self.buffer);
            self.files.lock().insert(self.name.clone(), data.into());
            self.closed = true;
        }
        Ok(())
    }
}
