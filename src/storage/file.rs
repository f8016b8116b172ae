//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{ClaimscopeError, Result};
use crate::storage::{Storage, StorageInput, StorageOutput};

const BUFFER_SIZE: usize = 64 * 1024;

/// A directory of files on the local file system.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `directory`, creating it if needed.
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                ClaimscopeError::storage(format!(
                    "Failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        if !directory.is_dir() {
            return Err(ClaimscopeError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn not_found(name: &str, e: std::io::Error) -> ClaimscopeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClaimscopeError::storage(format!("File not found: {name}"))
        } else {
            ClaimscopeError::Io(e)
        }
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.file_path(name)).map_err(|e| Self::not_found(name, e))?;
        let size = file.metadata()?.len();
        Ok(Box::new(FileInput {
            reader: BufReader::with_capacity(BUFFER_SIZE, file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(name))?;
        Ok(Box::new(FileOutput {
            writer: Some(BufWriter::with_capacity(BUFFER_SIZE, file)),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| ClaimscopeError::storage(format!("Failed to delete {name}: {e}")))?;
        }
        Ok(())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name)).map_err(|e| {
            ClaimscopeError::storage(format!("Failed to rename {old_name} to {new_name}: {e}"))
        })
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// A buffered reader over a stored file.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A buffered writer over a stored file.
#[derive(Debug)]
pub struct FileOutput {
    writer: Option<BufWriter<File>>,
}

impl FileOutput {
    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("Output is closed"))
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer()?.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        let writer = self.writer()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.writer.is_some() {
            self.flush_and_sync()?;
            self.writer = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_rename() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/index")).unwrap();

        let mut output = storage.create_output("a.tmp").unwrap();
        output.write_all(b"hello").unwrap();
        output.close().unwrap();
        assert!(output.write_all(b"more").is_err());

        storage.rename_file("a.tmp", "a.bin").unwrap();
        assert!(!storage.file_exists("a.tmp"));

        let mut input = storage.open_input("a.bin").unwrap();
        let mut content = String::new();
        input.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
        assert_eq!(storage.list_files().unwrap(), vec!["a.bin".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert!(storage.open_input("nope").is_err());
        assert!(storage.delete_file("nope").is_ok());
    }

    #[test]
    fn test_rejects_file_as_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"x").unwrap();
        assert!(FileStorage::new(&path).is_err());
    }
}
