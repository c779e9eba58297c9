//! Dates within one column should be written one way
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::rules::RowView;
use crate::schema::signature::date_signature;

pub fn check(view: &RowView<'_>, findings: &mut Vec<Finding>) {
    for cell in &view.row.cells {
        let Some(signature) = date_signature(&cell.value) else {
            continue;
        };
        let Some(column) = view.schema.column(cell.col) else {
            continue;
        };
        let Some(first) = column.first_date_format.as_deref() else {
            continue;
        };
        if first == signature {
            continue;
        }
        findings.push(
            Finding::new(
                Severity::Warning,
                RuleId::DateFormat,
                view.sheet,
                Location::Cell {
                    row: cell.row,
                    col: cell.col,
                },
                format!(
                    "Date written as '{signature}' in column '{}', which first used '{first}'",
                    column.name
                ),
            )
            .with_evidence([cell.value.canonical_text()]),
        );
    }
}
