//! # Cross-Sheet Correlator
//!
//! Only the key columns named by relationship checks are buffered while sheets are
//! scanned. Once every sheet has finished, each check is evaluated in configured order.
//! A check that cannot be evaluated produces a referential finding instead of an error.
use crate::config::RelationshipCheck;
use crate::config::ScanConfig;
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::schema::SheetSchema;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::row::Row;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// Distinct values of one key column in first-seen order, with the row each first appeared in
#[derive(Clone, Debug, Default)]
pub struct KeyColumn {
    /// Column index (0-based)
    pub col: usize,
    values: Vec<(String, usize)>,
    index: HashSet<String>,
}

impl KeyColumn {
    fn new(col: usize) -> Self {
        KeyColumn {
            col,
            ..KeyColumn::default()
        }
    }

    fn insert(&mut self, value: &CellValue, row: usize) {
        if matches!(value, CellValue::Empty | CellValue::FormulaUnavailable(_)) {
            return;
        }
        let text = value.canonical_text();
        if !self.index.contains(text.as_ref()) {
            self.index.insert(text.to_string());
            self.values.push((text.into_owned(), row));
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Key columns buffered from one scanned sheet
#[derive(Clone, Debug, Default)]
pub struct SheetKeys {
    pub sheet: String,
    /// The sheet stopped early, so its keys may be incomplete
    pub partial: bool,
    columns: BTreeMap<String, KeyColumn>,
}

impl SheetKeys {
    pub fn column(&self, name: &str) -> Option<&KeyColumn> {
        self.columns.get(name)
    }
}

/// Buffers the key columns of one sheet while its rows stream past
pub struct KeyCollector {
    sheet: String,
    names: Vec<String>,
    columns: BTreeMap<String, KeyColumn>,
}

impl KeyCollector {
    pub fn new(sheet: &str, config: &ScanConfig) -> Self {
        KeyCollector {
            sheet: sheet.to_owned(),
            names: config.key_columns(sheet).into_iter().map(str::to_owned).collect(),
            columns: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Buffers the key values of a data row. Columns are matched by exact name.
    pub fn collect(&mut self, row: &Row, schema: &SheetSchema) {
        for name in &self.names {
            if !self.columns.contains_key(name) {
                match schema.find(name) {
                    Some(column) => {
                        self.columns.insert(name.to_owned(), KeyColumn::new(column.index));
                    }
                    None => continue,
                }
            }
            if let Some(column) = self.columns.get_mut(name) {
                column.insert(row.value(column.col), row.index);
            }
        }
    }

    /// Key columns the sheet turned out to have. A named column absent from the
    /// schema is left out, a present one without values is kept empty.
    pub fn finish(mut self, schema: &SheetSchema, partial: bool) -> SheetKeys {
        for name in &self.names {
            if let Some(column) = schema.find(name) {
                self.columns
                    .entry(name.to_owned())
                    .or_insert_with(|| KeyColumn::new(column.index));
            }
        }
        SheetKeys {
            sheet: self.sheet,
            partial,
            columns: self.columns,
        }
    }
}

/// Evaluates the relationship checks against the buffered keys of every scanned sheet
pub fn correlate(checks: &[RelationshipCheck], sheets: &[SheetKeys]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for check in checks {
        evaluate(check, sheets, &mut findings);
    }
    findings
}

fn evaluate(check: &RelationshipCheck, sheets: &[SheetKeys], findings: &mut Vec<Finding>) {
    let description = format!(
        "{}.{} -> {}.{}",
        check.sheet_a, check.key_a, check.sheet_b, check.key_b
    );
    let lookup = |sheet: &str| sheets.iter().find(|keys| keys.sheet == sheet);

    let (Some(sheet_a), Some(sheet_b)) = (lookup(&check.sheet_a), lookup(&check.sheet_b)) else {
        let missing = if lookup(&check.sheet_a).is_none() {
            &check.sheet_a
        } else {
            &check.sheet_b
        };
        findings.push(referential(
            Severity::Referential,
            missing,
            Location::Sheet,
            format!("Relationship {description}: sheet '{missing}' was not scanned"),
        ));
        return;
    };

    let columns = (sheet_a.column(&check.key_a), sheet_b.column(&check.key_b));
    let (Some(key_a), Some(key_b)) = columns else {
        let (sheet, column) = if columns.0.is_none() {
            (&check.sheet_a, &check.key_a)
        } else {
            (&check.sheet_b, &check.key_b)
        };
        findings.push(referential(
            Severity::Referential,
            sheet,
            Location::Sheet,
            format!("Relationship {description}: column '{column}' not found in sheet '{sheet}'"),
        ));
        return;
    };

    for keys in [sheet_a, sheet_b] {
        if keys.partial {
            findings.push(referential(
                Severity::Warning,
                &keys.sheet,
                Location::Sheet,
                format!(
                    "Relationship {description}: sheet '{}' was only partially scanned, results may be incomplete",
                    keys.sheet
                ),
            ));
        }
    }

    for (value, row) in &key_a.values {
        if key_b.contains(value) {
            continue;
        }
        findings.push(
            referential(
                Severity::Referential,
                &check.sheet_a,
                Location::Cell { row: *row, col: key_a.col },
                format!("Relationship {description}: value '{value}' has no match"),
            )
            .with_evidence([value.as_str()]),
        );
    }
}

fn referential(severity: Severity, sheet: &str, location: Location, message: String) -> Finding {
    Finding::new(severity, RuleId::Referential, sheet, location, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeInference;
    use crate::spreadsheet::cell::Cell;

    fn row(index: usize, values: Vec<CellValue>) -> Row {
        let mut row = Row::new(index);
        for (col, value) in values.into_iter().enumerate() {
            row.push(Cell {
                row: index,
                col,
                value,
                style: None,
                formula: None,
            });
        }
        row
    }

    fn text(value: &str) -> CellValue {
        CellValue::String(value.to_string())
    }

    /// Streams a header plus single-column rows of numbers through a collector
    fn keys(sheet: &str, header: &str, values: &[f64], config: &ScanConfig, partial: bool) -> SheetKeys {
        let mut inference = TypeInference::new(sheet, config);
        let mut collector = KeyCollector::new(sheet, config);
        inference.observe_header(&row(0, vec![text(header)]));
        for (index, value) in values.iter().enumerate() {
            let row = row(index + 1, vec![CellValue::Number(*value)]);
            inference.observe(&row);
            collector.collect(&row, inference.schema());
        }
        collector.finish(inference.schema(), partial)
    }

    fn config() -> ScanConfig {
        ScanConfig {
            relationship_checks: vec![RelationshipCheck::new("A", "id", "B", "id")],
            ..ScanConfig::default()
        }
    }

    #[test]
    fn reports_each_missing_value_once() {
        let config = config();
        let sheets = vec![
            keys("A", "id", &[1.0, 2.0, 3.0, 3.0], &config, false),
            keys("B", "id", &[1.0, 2.0], &config, false),
        ];
        let findings = correlate(&config.relationship_checks, &sheets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Referential);
        assert_eq!(findings[0].evidence, vec!["3"]);
        assert_eq!(findings[0].reference.as_deref(), Some("A4"));
    }

    #[test]
    fn missing_sheets_and_columns_are_single_findings() {
        let config = config();
        let only_a = vec![keys("A", "id", &[1.0], &config, false)];
        let findings = correlate(&config.relationship_checks, &only_a);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].sheet, "B");
        assert_eq!(findings[0].location, Location::Sheet);

        let renamed = vec![
            keys("A", "id", &[1.0], &config, false),
            keys("B", "ID", &[1.0], &config, false),
        ];
        let findings = correlate(&config.relationship_checks, &renamed);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("column 'id' not found in sheet 'B'"));
    }

    #[test]
    fn partial_participants_add_a_warning() {
        let config = config();
        let sheets = vec![
            keys("A", "id", &[1.0, 2.0], &config, false),
            keys("B", "id", &[1.0], &config, true),
        ];
        let findings = correlate(&config.relationship_checks, &sheets);
        let severities: Vec<Severity> = findings.iter().map(|finding| finding.severity).collect();
        assert_eq!(severities, vec![Severity::Warning, Severity::Referential]);
    }

    #[test]
    fn buffers_only_named_key_columns() {
        let config = config();
        let collector = KeyCollector::new("Other", &config);
        assert!(collector.is_empty());
        let keys = keys("A", "id", &[5.0, 5.0, 6.0], &config, false);
        assert_eq!(keys.column("id").map(KeyColumn::len), Some(2));
    }
}
