//! # Type Inference
//!
//! Per-column type and statistics accumulation for one sheet. Rows are folded in
//! order by the single task that owns the sheet; the finished [`SheetSchema`] is
//! handed over by value once the last row has been seen.
pub mod column;
pub mod lattice;
pub mod sample;
pub mod signature;

use crate::config::ScanConfig;
use crate::helpers::digest::hash64;
use crate::schema::column::ColumnSchema;
use crate::spreadsheet::row::Row;
use serde::Serialize;

/// Column schemas of one sheet, indexed by column position
#[derive(Clone, Debug, Default, Serialize)]
pub struct SheetSchema {
    pub columns: Vec<ColumnSchema>,
}

impl SheetSchema {
    pub fn column(&self, index: usize) -> Option<&ColumnSchema> {
        self.columns.get(index)
    }

    /// First column with exactly this name
    pub fn find(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Type Inference Engine for one sheet
pub struct TypeInference {
    sheet: String,
    sample_capacity: usize,
    widening_window: usize,
    header_pending: bool,
    header: Vec<String>,
    schema: SheetSchema,
}

impl TypeInference {
    pub fn new(sheet: &str, config: &ScanConfig) -> Self {
        TypeInference {
            sheet: sheet.to_owned(),
            sample_capacity: config.sample_capacity,
            widening_window: config.widening_window,
            header_pending: config.has_header,
            header: Vec::new(),
            schema: SheetSchema::default(),
        }
    }

    /// Returns true until the header row has been taken
    pub fn header_pending(&self) -> bool {
        self.header_pending
    }

    /// Names the columns after the cells of the header row
    pub fn observe_header(&mut self, row: &Row) {
        self.header = (0..row.width())
            .map(|col| row.value(col).canonical_text().trim().to_string())
            .collect();
        self.header_pending = false;
        self.ensure_columns(self.header.len());
    }

    /// Creates schemas for columns first seen in this row, without observing its values
    pub fn prepare(&mut self, row: &Row) {
        self.ensure_columns(row.width());
    }

    /// Folds a data row into every known column. Cells past the end of the row are empty.
    pub fn observe(&mut self, row: &Row) {
        self.prepare(row);
        for column in self.schema.columns.iter_mut() {
            column.observe(row.value(column.index), self.widening_window);
        }
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    /// Finalizes every column and releases the schema
    pub fn finish(mut self) -> SheetSchema {
        for column in self.schema.columns.iter_mut() {
            column.finalize();
        }
        self.schema
    }

    fn ensure_columns(&mut self, width: usize) {
        while self.schema.columns.len() < width {
            let index = self.schema.columns.len();
            let name = self
                .header
                .get(index)
                .filter(|name| !name.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("column{}", index + 1));
            let seed = hash64(&format!("{}\u{1f}{index}", self.sheet));
            self.schema
                .columns
                .push(ColumnSchema::new(index, name, self.sample_capacity, seed));
        }
    }
}
