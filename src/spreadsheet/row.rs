use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// One parsed worksheet row. Cells are dense: position `i` holds column `i`, gaps are empty cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// Row index (0-based)
    pub index: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Row {
            index,
            cells: Vec::new(),
        }
    }

    /// Places a cell at its column, padding any gap with empty cells
    pub(crate) fn push(&mut self, cell: Cell) {
        while self.cells.len() < cell.col {
            self.cells.push(Cell::empty(self.index, self.cells.len()));
        }
        self.cells.push(cell);
    }

    pub fn get(&self, col: usize) -> Option<&Cell> {
        self.cells.get(col)
    }

    /// Value at a column; columns past the end of the row are empty
    pub fn value(&self, col: usize) -> &CellValue {
        self.cells.get(col).map(|cell| &cell.value).unwrap_or(&EMPTY)
    }

    /// Number of columns up to and including the last non-empty cell
    pub fn width(&self) -> usize {
        self.cells
            .iter()
            .rposition(|cell| !cell.value.is_empty())
            .map(|position| position + 1)
            .unwrap_or(0)
    }

    /// Returns true if the row holds no value at all
    pub fn is_blank(&self) -> bool {
        self.width() == 0
    }
}
