//! The result of one scan
use crate::rules::finding::Finding;
use crate::rules::finding::RuleId;
use crate::schema::SheetSchema;
use crate::spreadsheet::workbook::SkippedSheet;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetStatus {
    /// Every row was read (or the configured row limit was reached)
    Complete,
    /// The sheet stream broke off; rows before the failure were scanned
    Partial,
}

/// Outcome of one sheet
#[derive(Clone, Debug, Serialize)]
pub struct SheetReport {
    pub name: String,
    pub status: SheetStatus,
    /// Data rows scanned, header excluded
    pub rows_scanned: u64,
    /// Scanning stopped at `max_rows_per_sheet`
    pub truncated: bool,
    pub schema: SheetSchema,
}

/// Findings and per-sheet schemas of one scan, in workbook order
#[derive(Clone, Debug, Serialize)]
pub struct ScanReport {
    pub workbook: String,
    /// The scan was cancelled; only sheets finished before that are reported
    pub cancelled: bool,
    pub sheets: Vec<SheetReport>,
    /// Declared sheets without a cell grid (chartsheets, dialog sheets)
    pub skipped_sheets: Vec<SkippedSheet>,
    /// Per-sheet findings in sheet order, then relationship findings in check order
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn sheet(&self, name: &str) -> Option<&SheetReport> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn findings_for(&self, rule: RuleId) -> impl Iterator<Item = &Finding> + '_ {
        self.findings.iter().filter(move |finding| finding.rule == rule)
    }

    /// Returns true if any sheet was only partially scanned
    pub fn is_partial(&self) -> bool {
        self.sheets.iter().any(|sheet| sheet.status == SheetStatus::Partial)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
