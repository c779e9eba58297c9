//! Type widening mid-column: once a column has settled on a type, a value that
//! forces the running join wider is likely a data entry error.
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::rules::RowView;
use crate::schema::lattice::ValueType;

pub fn check(view: &RowView<'_>, findings: &mut Vec<Finding>) {
    for cell in &view.row.cells {
        let Some(observed) = cell.value.observed_type().filter(|observed| *observed != ValueType::Empty) else {
            continue;
        };
        let Some(column) = view.schema.column(cell.col) else {
            continue;
        };
        let Some(baseline) = column.baseline() else {
            continue;
        };
        if column.inferred_type.accepts(observed) {
            continue;
        }

        let widened = column.inferred_type.join(observed);
        let message = format!(
            "{observed} value widens column '{}' from {} to {widened} (baseline {baseline})",
            column.name, column.inferred_type
        );
        findings.push(
            Finding::new(
                Severity::Warning,
                RuleId::TypeWidening,
                view.sheet,
                Location::Cell {
                    row: cell.row,
                    col: cell.col,
                },
                message,
            )
            .with_evidence([cell.value.canonical_text()]),
        );
    }
}
