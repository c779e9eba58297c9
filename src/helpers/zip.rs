//! ZIP archive helper utilities for zipped-XML workbooks
//! Provides convenient methods for accessing entries within ZIP archives

use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Helper trait for ZIP archive lookups that tolerate the naming quirks of workbook writers
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Resolves an entry name (case-insensitive, path separator agnostic) to the stored name
    fn resolve(&self, name: &str) -> Option<String>;

    /// Gets an entry from the ZIP archive by name
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ZipError>;

    /// Creates an XML reader for an entry within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ZipError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn resolve(&self, name: &str) -> Option<String> {
        let pattern = name.replace('\\', "/");
        let pattern = pattern.trim_start_matches('/');
        self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name.replace('\\', "/").as_str()))
            .map(|file_name| file_name.to_owned())
    }

    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ZipError> {
        match self.resolve(name).map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ZipError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}
