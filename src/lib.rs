//! # Sheet Scanner
//!
//! Streaming scanner for zipped-XML spreadsheet workbooks (`.xlsx`, `.xlsm`) that
//! surfaces structural and data-quality anomalies without loading whole sheets
//! into memory.
//!
//! ## Features
//!
//! - **Streaming parser**: rows are decoded one at a time straight from the compressed entry
//! - **Type inference**: per-column type lattice with bounded samples, quartiles and
//!   cardinality estimates
//! - **Anomaly rules**: type widening, numeric outliers, duplicate rows, empty required
//!   columns, inconsistent date formats, unavailable formula results
//! - **Cross-sheet checks**: key columns of one sheet must exist in another
//! - **Parallel sheets**: independent sheets are scanned on a bounded worker pool,
//!   with cooperative cancellation
//!
//! ## Example
//!
//! ```no_run
//! use sheet_scanner::{RelationshipCheck, ScanConfig, Scanner};
//!
//! let config = ScanConfig {
//!     relationship_checks: vec![RelationshipCheck::new("Orders", "customer", "Customers", "id")],
//!     ..ScanConfig::default()
//! };
//! let report = Scanner::new(config)?.scan_path("book.xlsx")?;
//! for finding in &report.findings {
//!     println!("{} {:?} {}", finding.sheet, finding.reference, finding.message);
//! }
//! # Ok::<(), sheet_scanner::ScanError>(())
//! ```
pub mod cancel;
pub mod config;
pub mod correlator;
pub mod error;
mod helpers;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod schema;
pub mod search;
pub mod spreadsheet;

pub use crate::cancel::CancellationToken;
pub use crate::config::DuplicateMatch;
pub use crate::config::RelationshipCheck;
pub use crate::config::ScanConfig;
pub use crate::error::ScanError;
pub use crate::helpers::reader::ArchiveSource;
pub use crate::report::ScanReport;
pub use crate::report::SheetReport;
pub use crate::report::SheetStatus;
pub use crate::rules::finding::Finding;
pub use crate::rules::finding::Location;
pub use crate::rules::finding::RuleId;
pub use crate::rules::finding::Severity;
pub use crate::scanner::Scanner;
pub use crate::schema::lattice::ValueType;
pub use crate::search::cell_at;
pub use crate::search::find_keyword;
pub use crate::search::read_fields;
pub use crate::search::CellContent;
pub use crate::search::KeywordMatch;
