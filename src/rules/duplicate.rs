//! Duplicate rows within a sheet
use crate::config::DuplicateMatch;
use crate::helpers::digest::Fingerprint;
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::rules::RowView;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::row::Row;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Values shown as evidence for a repeated row
const EVIDENCE_CELLS: usize = 8;

/// Fingerprints of the rows seen so far, mapped to the first row that produced them
pub struct DuplicateIndex {
    mode: DuplicateMatch,
    seen: HashMap<u128, usize>,
}

impl DuplicateIndex {
    pub fn new(mode: DuplicateMatch) -> Self {
        DuplicateIndex {
            mode,
            seen: HashMap::new(),
        }
    }

    /// Records the row and returns the first earlier row with the same content.
    /// Trailing empty cells are ignored; blank rows never match.
    pub fn check(&mut self, row: &Row) -> Option<usize> {
        if row.is_blank() {
            return None;
        }
        let width = row.width();
        let mut fingerprint = Fingerprint::new();
        for cell in &row.cells[..width] {
            fingerprint.push(cell.value.kind_tag());
            match (&cell.value, self.mode) {
                (CellValue::String(text), DuplicateMatch::Normalized) => fingerprint.push(&text.trim().to_lowercase()),
                (value, _) => fingerprint.push(&value.canonical_text()),
            }
        }
        match self.seen.entry(fingerprint.finish()) {
            Entry::Occupied(entry) => Some(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(row.index);
                None
            }
        }
    }
}

pub fn check(view: &RowView<'_>, findings: &mut Vec<Finding>) {
    let Some(first) = view.duplicate_of else {
        return;
    };
    let second = view.row.index;
    let evidence = view
        .row
        .cells
        .iter()
        .take(view.row.width().min(EVIDENCE_CELLS))
        .map(|cell| cell.value.canonical_text().into_owned());
    findings.push(
        Finding::new(
            Severity::Warning,
            RuleId::DuplicateRow,
            view.sheet,
            Location::RowPair { first, second },
            format!("Row {} duplicates row {}", second + 1, first + 1),
        )
        .with_evidence(evidence),
    );
}
