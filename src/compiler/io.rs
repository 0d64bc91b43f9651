//! The compiler's external collaborators: reading source text and raw
//! asset bytes. Abstracted as traits so the file processor can be unit
//! tested without touching the filesystem.

use std::fs;
use std::io;
use std::path::Path;

/// Returns the text lines of a source file at the given path.
pub trait SourceResolver {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// Returns the raw bytes of an asset blob at the given path.
pub trait BlobReader {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The default [SourceResolver], backed directly by `std::fs`.
pub struct FsSourceResolver;

impl SourceResolver for FsSourceResolver {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let text = fs::read_to_string(path)?;
        Ok(text.lines().map(str::to_string).collect())
    }
}

/// The default [BlobReader], backed directly by `std::fs`.
pub struct FsBlobReader;

impl BlobReader for FsBlobReader {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

#[cfg(test)]
pub struct InMemorySourceResolver {
    pub files: std::collections::HashMap<std::path::PathBuf, Vec<String>>,
}

#[cfg(test)]
impl SourceResolver for InMemorySourceResolver {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}
