//! Numeric outliers by Tukey fences over each column's sampled quartiles.
//!
//! The fences are only known once a column is finalized, so this rule runs over a
//! second pass of the sheet.
use crate::config::ScanConfig;
use crate::rules::finding::Finding;
use crate::rules::finding::Location;
use crate::rules::finding::RuleId;
use crate::rules::finding::Severity;
use crate::schema::SheetSchema;
use crate::spreadsheet::cell::format_number;
use crate::spreadsheet::row::Row;

struct Fence {
    column: String,
    lower: f64,
    upper: f64,
}

/// Outlier fences of every numeric column with enough samples
pub struct OutlierFences {
    sheet: String,
    fences: Vec<Option<Fence>>,
}

impl OutlierFences {
    pub fn new(sheet: &str, schema: &SheetSchema, config: &ScanConfig) -> Self {
        let fences = schema
            .columns
            .iter()
            .map(|column| {
                if !column.is_numeric() || column.sample_len() < config.outlier_min_samples {
                    return None;
                }
                let quartiles = column.quartiles.filter(|quartiles| quartiles.iqr() > 0.0)?;
                let (lower, upper) = quartiles.fences(config.max_outlier_iqr_multiplier);
                Some(Fence {
                    column: column.name.to_owned(),
                    lower,
                    upper,
                })
            })
            .collect();
        OutlierFences {
            sheet: sheet.to_owned(),
            fences,
        }
    }

    /// Returns true when no column can have outliers, so the second pass can be skipped
    pub fn is_empty(&self) -> bool {
        self.fences.iter().all(Option::is_none)
    }

    pub fn check(&self, row: &Row, findings: &mut Vec<Finding>) {
        for cell in &row.cells {
            let Some(Some(fence)) = self.fences.get(cell.col) else {
                continue;
            };
            let Some(value) = cell.value.as_number() else {
                continue;
            };
            if (fence.lower..=fence.upper).contains(&value) {
                continue;
            }
            let message = format!(
                "Value {} in column '{}' is outside [{}, {}]",
                format_number(value),
                fence.column,
                format_number(fence.lower),
                format_number(fence.upper)
            );
            findings.push(
                Finding::new(
                    Severity::Warning,
                    RuleId::NumericOutlier,
                    &self.sheet,
                    Location::Cell {
                        row: cell.row,
                        col: cell.col,
                    },
                    message,
                )
                .with_evidence([format_number(value)]),
            );
        }
    }
}
