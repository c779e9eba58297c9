use crate::spreadsheet::reference::index_to_reference;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The workbook itself could not be read at this location
    Structural,
    /// A cross-sheet relationship does not hold
    Referential,
}

/// Rules in evaluation order. Findings at the same location are ordered by this.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    TypeWidening,
    NumericOutlier,
    DuplicateRow,
    EmptyRequired,
    DateFormat,
    FormulaUnavailable,
    MalformedRow,
    MalformedSheet,
    Referential,
}

/// Where a finding points to. Indexes are 0-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Sheet,
    Row { row: usize },
    Cell { row: usize, col: usize },
    /// A repeated row and the row it repeats
    RowPair { first: usize, second: usize },
}

impl Location {
    /// Sort position: rows in order, cells before row-level findings, sheet-level last
    fn sort_key(&self) -> (usize, usize) {
        match *self {
            Location::Cell { row, col } => (row, col),
            Location::Row { row } => (row, usize::MAX),
            Location::RowPair { second, .. } => (second, usize::MAX),
            Location::Sheet => (usize::MAX, usize::MAX),
        }
    }

    /// Human readable reference: `B7` for cells, `7:7` for rows, `3:3,7:7` for row pairs
    pub fn reference(&self) -> Option<String> {
        match *self {
            Location::Sheet => None,
            Location::Row { row } => Some(format!("{0}:{0}", row.saturating_add(1))),
            Location::Cell { row, col } => Some(index_to_reference(row, col)),
            Location::RowPair { first, second } => Some(format!(
                "{0}:{0},{1}:{1}",
                first.saturating_add(1),
                second.saturating_add(1)
            )),
        }
    }
}

/// One reported anomaly. Never changed once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: RuleId,
    pub sheet: String,
    pub location: Location,
    pub reference: Option<String>,
    pub message: String,
    /// Offending values as written in the workbook
    pub evidence: Vec<String>,
}

impl Finding {
    pub fn new(severity: Severity, rule: RuleId, sheet: &str, location: Location, message: String) -> Self {
        Finding {
            severity,
            rule,
            sheet: sheet.to_owned(),
            location,
            reference: location.reference(),
            message,
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence<I, S>(mut self, evidence: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence.extend(evidence.into_iter().map(Into::into));
        self
    }

    /// Row, then column, then rule
    pub(crate) fn position_cmp(&self, other: &Finding) -> Ordering {
        self.location
            .sort_key()
            .cmp(&other.location.sort_key())
            .then(self.rule.cmp(&other.rule))
    }
}

/// Stable sort into row-then-column-then-rule order
pub(crate) fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(Finding::position_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule: RuleId, location: Location) -> Finding {
        Finding::new(Severity::Warning, rule, "Data", location, String::new())
    }

    #[test]
    fn orders_by_row_column_and_rule() {
        let mut findings = vec![
            finding(RuleId::MalformedSheet, Location::Sheet),
            finding(RuleId::DuplicateRow, Location::RowPair { first: 1, second: 4 }),
            finding(RuleId::FormulaUnavailable, Location::Cell { row: 4, col: 0 }),
            finding(RuleId::TypeWidening, Location::Cell { row: 4, col: 2 }),
            finding(RuleId::EmptyRequired, Location::Cell { row: 4, col: 0 }),
            finding(RuleId::MalformedRow, Location::Row { row: 2 }),
        ];
        sort_findings(&mut findings);
        let order: Vec<RuleId> = findings.iter().map(|finding| finding.rule).collect();
        assert_eq!(
            order,
            vec![
                RuleId::MalformedRow,
                RuleId::EmptyRequired,
                RuleId::FormulaUnavailable,
                RuleId::TypeWidening,
                RuleId::DuplicateRow,
                RuleId::MalformedSheet,
            ]
        );
    }

    #[test]
    fn serializes_locations() {
        let finding = finding(RuleId::DuplicateRow, Location::RowPair { first: 1, second: 4 }).with_evidence(["a", "b"]);
        assert_eq!(finding.reference.as_deref(), Some("2:2,5:5"));
        let json = serde_json::to_value(&finding).expect("json");
        assert_eq!(json["location"]["kind"], "row_pair");
        assert_eq!(json["rule"], "duplicate_row");
        assert_eq!(json["evidence"][1], "b");
    }
}
