//! Required columns must not hold empty cells
use crate::config::ScanConfig;
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::rules::RowView;
use crate::schema::SheetSchema;

pub fn check(view: &RowView<'_>, findings: &mut Vec<Finding>) {
    let Some(required) = view.config.required_for(view.sheet) else {
        return;
    };
    for name in required {
        let Some(column) = view.schema.find(name) else {
            continue;
        };
        if view.row.value(column.index).is_empty() {
            findings.push(Finding::new(
                Severity::Error,
                RuleId::EmptyRequired,
                view.sheet,
                Location::Cell {
                    row: view.row.index,
                    col: column.index,
                },
                format!("Required column '{name}' is empty"),
            ));
        }
    }
}

/// One sheet-level finding per required column the sheet does not have
pub fn missing_columns(sheet: &str, schema: &SheetSchema, config: &ScanConfig) -> Vec<Finding> {
    let Some(required) = config.required_for(sheet) else {
        return Vec::new();
    };
    required
        .iter()
        .filter(|name| schema.find(name).is_none())
        .map(|name| {
            Finding::new(
                Severity::Error,
                RuleId::EmptyRequired,
                sheet,
                Location::Sheet,
                format!("Required column '{name}' is missing"),
            )
        })
        .collect()
}
