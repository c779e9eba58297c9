use std::path::PathBuf;
use thiserror::Error;

/// Fatal scan errors. Anything else that goes wrong while scanning is reported as a finding.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot open workbook '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workbook container is corrupt: {0}")]
    ContainerCorrupt(String),

    #[error("Workbook entry '{0}' not found")]
    EntryNotFound(String),

    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Invalid cell reference '{0}'")]
    InvalidReference(String),
}

impl ScanError {
    /// Builds a corruption error that names the part it was raised for
    pub(crate) fn corrupt_part(entry: &str, error: impl std::fmt::Display) -> Self {
        ScanError::ContainerCorrupt(format!("{entry}: {error}"))
    }
}

impl From<zip::result::ZipError> for ScanError {
    fn from(error: zip::result::ZipError) -> Self {
        ScanError::ContainerCorrupt(error.to_string())
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ScanError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|error| match error {
            ScanError::ContainerCorrupt(reason) => ScanError::ContainerCorrupt(format!("{message}: {reason}")),
            other => other,
        })
    }
}
