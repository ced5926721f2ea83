//! Byte sources backing a layer's compressed content.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens the compressed bytes of a layer.
///
/// Every call must return an independent stream positioned at the start of
/// the content. Implementations are shared between threads, so `open` may be
/// called concurrently.
pub trait ContentSource: Send + Sync {
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

impl<F> ContentSource for F
where
    F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync,
{
    fn open(&self) -> io::Result<Box<dyn Read + Send>> { self() }
}

/// Content stored in a file, re-opened on each access.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }
}

impl ContentSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Content held in memory and shared by every stream opened from it.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self { Self { data: data.into() } }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

impl ContentSource for MemorySource {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_all(source: &dyn ContentSource) -> Vec<u8> {
        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn memory_source_streams_are_independent() {
        let source = MemorySource::new(b"independent".to_vec());

        let mut first = source.open().unwrap();
        let mut head = [0u8; 4];
        first.read_exact(&mut head).unwrap();

        assert_eq!(read_all(&source), b"independent");
        assert_eq!(&head, b"inde");
    }

    #[test]
    fn file_source_reopens_from_start() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"layer bytes").unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(read_all(&source), b"layer bytes");
        assert_eq!(read_all(&source), b"layer bytes");
    }

    #[test]
    fn file_source_missing_file_fails_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("missing"));
        let err = source.open().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn closures_are_sources() {
        let source = || -> io::Result<Box<dyn Read + Send>> { Ok(Box::new(&b"closure"[..])) };
        assert_eq!(read_all(&source), b"closure");
    }
}
