//! Cells whose value could not be computed: error codes and formulas without a cached result
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::rules::RowView;
use crate::spreadsheet::cell::CellValue;

pub fn check(view: &RowView<'_>, findings: &mut Vec<Finding>) {
    for cell in &view.row.cells {
        let CellValue::FormulaUnavailable(code) = &cell.value else {
            continue;
        };
        let location = Location::Cell {
            row: cell.row,
            col: cell.col,
        };
        let finding = match code {
            Some(code) => Finding::new(
                Severity::Info,
                RuleId::FormulaUnavailable,
                view.sheet,
                location,
                format!("Cell holds the error value {code}"),
            )
            .with_evidence([code.as_str()]),
            None => Finding::new(
                Severity::Info,
                RuleId::FormulaUnavailable,
                view.sheet,
                location,
                "Formula has no cached result".to_string(),
            ),
        };
        findings.push(finding);
    }
}
