//! # Anomaly Detection
//!
//! Rules are plain functions over a read-only [`RowView`]: the row, the sheet schema
//! as it stood before the row was observed, and the scan configuration. They are
//! evaluated in [`ROW_RULES`] order and only ever append findings.
pub mod date_format;
pub mod duplicate;
pub mod finding;
pub mod formula;
pub mod outlier;
pub mod required;
pub mod type_widening;

use crate::config::ScanConfig;
use crate::rules::duplicate::DuplicateIndex;
use crate::rules::finding::sort_findings;
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::schema::SheetSchema;
use crate::spreadsheet::row::Row;
use crate::spreadsheet::MalformedRowError;
use crate::spreadsheet::MalformedSheetError;

/// What every row rule gets to see
pub struct RowView<'a> {
    pub sheet: &'a str,
    pub row: &'a Row,
    pub schema: &'a SheetSchema,
    pub config: &'a ScanConfig,
    /// First earlier row with the same content
    pub duplicate_of: Option<usize>,
}

pub type RowRule = fn(&RowView<'_>, &mut Vec<Finding>);

/// Rules evaluated for every data row, in order.
/// Numeric outliers need finalized quartiles and are checked in a second pass.
pub const ROW_RULES: &[(RuleId, RowRule)] = &[
    (RuleId::TypeWidening, type_widening::check as RowRule),
    (RuleId::DuplicateRow, duplicate::check as RowRule),
    (RuleId::EmptyRequired, required::check as RowRule),
    (RuleId::DateFormat, date_format::check as RowRule),
    (RuleId::FormulaUnavailable, formula::check as RowRule),
];

/// Anomaly Detection Engine for one sheet
pub struct AnomalyDetector<'a> {
    sheet: String,
    config: &'a ScanConfig,
    duplicates: DuplicateIndex,
    findings: Vec<Finding>,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(sheet: &str, config: &'a ScanConfig) -> Self {
        AnomalyDetector {
            sheet: sheet.to_owned(),
            config,
            duplicates: DuplicateIndex::new(config.duplicate_match),
            findings: Vec::new(),
        }
    }

    /// Runs every row rule against a data row. `schema` must not include the row yet.
    pub fn inspect(&mut self, row: &Row, schema: &SheetSchema) {
        let view = RowView {
            sheet: &self.sheet,
            row,
            schema,
            config: self.config,
            duplicate_of: self.duplicates.check(row),
        };
        for (_, rule) in ROW_RULES {
            rule(&view, &mut self.findings);
        }
    }

    pub fn malformed_row(&mut self, error: &MalformedRowError) {
        self.findings.push(Finding::new(
            Severity::Structural,
            RuleId::MalformedRow,
            &self.sheet,
            Location::Row { row: error.row },
            format!("Row skipped: {}", error.reason),
        ));
    }

    pub fn malformed_sheet(&mut self, error: &MalformedSheetError) {
        self.findings.push(Finding::new(
            Severity::Structural,
            RuleId::MalformedSheet,
            &self.sheet,
            Location::Sheet,
            format!("Sheet read stopped early: {}", error.reason),
        ));
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    /// Adds the sheet-level checks and returns the findings in report order
    pub fn finish(mut self, schema: &SheetSchema) -> Vec<Finding> {
        let missing = required::missing_columns(&self.sheet, schema, self.config);
        self.findings.extend(missing);
        sort_findings(&mut self.findings);
        self.findings
    }
}
