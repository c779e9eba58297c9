//! Archive Reader: opens the workbook container and hands out entry streams
use crate::error::ScanError;
use crate::helpers::reader::ArchiveSource;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Signature of OLE compound files, used by encrypted (password protected) workbooks
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Streaming XML reader over one decompressed archive entry
pub(crate) type EntryReader<'a> = XmlReader<BufReader<ZipFile<'a, UnifiedReader>>>;

/// An open workbook container. The underlying file handle is released when the archive is dropped.
pub struct Archive {
    name: String,
    zip: ZipArchive<UnifiedReader>,
}

impl Archive {
    /// Opens the container and reads its central directory
    ///
    /// # Errors
    /// * `ScanError::Open` if the file cannot be opened
    /// * `ScanError::ContainerCorrupt` if the central directory is unreadable or the
    ///   workbook is an encrypted compound file
    pub fn open(source: &ArchiveSource) -> Result<Archive, ScanError> {
        let name = source.display_name();
        let mut reader = UnifiedReader::new(source).map_err(|error| match source {
            ArchiveSource::Path(path) => ScanError::Open {
                path: path.to_owned(),
                source: error,
            },
            ArchiveSource::Bytes(_) => ScanError::ContainerCorrupt(error.to_string()),
        })?;

        let compound = is_compound_file(&mut reader).map_err(|error| ScanError::corrupt_part(&name, error))?;
        if compound {
            return Err(ScanError::ContainerCorrupt(format!(
                "{name}: password protected or legacy binary workbook"
            )));
        }

        let zip = ZipArchive::new(reader).map_err(|error| ScanError::corrupt_part(&name, error))?;
        Ok(Archive { name, zip })
    }

    /// Name of the source the archive was opened from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the archive holds an entry with this name
    pub fn contains(&self, entry: &str) -> bool {
        self.zip.resolve(entry).is_some()
    }

    /// Opens a required entry as a lazy XML stream
    pub(crate) fn entry(&'_ mut self, entry: &str) -> Result<EntryReader<'_>, ScanError> {
        self.optional_entry(entry)?
            .ok_or_else(|| ScanError::EntryNotFound(entry.to_owned()))
    }

    /// Opens an entry that workbooks may legitimately omit
    pub(crate) fn optional_entry(&'_ mut self, entry: &str) -> Result<Option<EntryReader<'_>>, ScanError> {
        self.zip
            .xml_reader(entry)
            .map_err(|error| ScanError::corrupt_part(entry, error))
    }

    /// Opens an entry and reports failures as zip errors, leaving classification to the caller
    pub(crate) fn raw_entry(&'_ mut self, entry: &str) -> Result<Option<EntryReader<'_>>, ZipError> {
        self.zip.xml_reader(entry)
    }
}

/// Checks for the compound file signature and rewinds the reader
fn is_compound_file<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut signature = [0u8; 8];
    let matched = reader.read_exact(&mut signature).is_ok() && signature == CFB_SIGNATURE;
    reader.seek(SeekFrom::Start(0))?;
    Ok(matched)
}
