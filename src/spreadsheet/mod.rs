//! # Workbook Reading
//!
//! Streaming access to zipped-XML workbooks: the archive container, the workbook
//! manifest with its lookup tables, and a row-by-row sheet parser that never holds
//! more than one row in memory.
pub mod archive;
pub mod cell;
pub mod parser;
pub mod reference;
pub mod row;
pub mod workbook;

use thiserror::Error;

/// A row that could not be decoded. The row is skipped and parsing continues.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed row {} in sheet '{sheet}': {reason}", .row.saturating_add(1))]
pub struct MalformedRowError {
    pub sheet: String,
    /// Row index (0-based); the implied position when the row number itself is unusable
    pub row: usize,
    pub reason: String,
}

/// A sheet whose stream broke off. Rows read before the failure stay valid.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed sheet '{sheet}': {reason}")]
pub struct MalformedSheetError {
    pub sheet: String,
    pub reason: String,
}

/// Errors yielded by the sheet parser
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error(transparent)]
    Row(#[from] MalformedRowError),

    #[error(transparent)]
    Sheet(#[from] MalformedSheetError),
}
