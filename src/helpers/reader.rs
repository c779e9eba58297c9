use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a workbook container comes from
#[derive(Clone, Debug)]
pub enum ArchiveSource {
    /// Workbook file on the local filesystem
    Path(PathBuf),
    /// Workbook already held in memory, shared between worker handles
    Bytes(Arc<[u8]>),
}

impl ArchiveSource {
    /// Human readable name used in logs and in the report
    pub fn display_name(&self) -> String {
        match self {
            ArchiveSource::Path(path) => path.display().to_string(),
            ArchiveSource::Bytes(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }
}

impl From<&Path> for ArchiveSource {
    fn from(path: &Path) -> Self {
        ArchiveSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        ArchiveSource::Path(path)
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(bytes: Vec<u8>) -> Self {
        ArchiveSource::Bytes(Arc::from(bytes))
    }
}

/// A unified reader over either a local file or an in-memory buffer
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Arc<[u8]>>),
}

impl UnifiedReader {
    /// Opens the underlying byte stream of a source
    pub(crate) fn new(source: &ArchiveSource) -> std::io::Result<UnifiedReader> {
        match source {
            ArchiveSource::Path(path) => {
                let file = File::open(path)?;
                Ok(UnifiedReader::Local(BufReader::new(file)))
            }
            ArchiveSource::Bytes(bytes) => Ok(UnifiedReader::Memory(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_local_file() {
        // Cargo.toml always exists at the manifest root
        let source = ArchiveSource::from(Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"));
        let result = UnifiedReader::new(&source);
        assert!(result.is_ok(), "Failed to open local file: {:?}", result.err());

        let source = ArchiveSource::from(PathBuf::from("non_existent_file.xlsx"));
        assert!(UnifiedReader::new(&source).is_err(), "Should fail to open non-existent file");
    }

    #[test]
    fn test_memory_reader_shares_buffer() {
        let source = ArchiveSource::from(b"PK\x03\x04".to_vec());
        let mut first = UnifiedReader::new(&source).expect("memory reader");
        let mut second = UnifiedReader::new(&source).expect("memory reader");
        let mut head = [0u8; 2];
        first.read_exact(&mut head).expect("read");
        assert_eq!(&head, b"PK");
        second.seek(std::io::SeekFrom::Start(2)).expect("seek");
        second.read_exact(&mut head).expect("read");
        assert_eq!(&head, b"\x03\x04");
        assert!(source.display_name().contains("4 bytes"));
    }
}
