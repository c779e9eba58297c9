//! Cell lookups: locate the cells whose text matches a keyword, or read cells by position
use crate::config::SheetFilter;
use crate::error::ResultMessage;
use crate::error::ScanError;
use crate::helpers::reader::ArchiveSource;
use crate::spreadsheet::archive::Archive;
use crate::spreadsheet::parser::EntryParser;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::workbook::SharedTables;
use crate::spreadsheet::workbook::Workbook;
use crate::spreadsheet::RowError;
use log::debug;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

/// A cell whose text matched the keyword
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
    pub sheet: String,
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    pub reference: String,
}

impl KeywordMatch {
    /// Position as `R{row}C{col}` with 1-based numbers
    pub fn position(&self) -> String {
        format!("R{}C{}", self.row + 1, self.col + 1)
    }
}

/// Text compared by the search: trimmed and lower-cased
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Streams every selected sheet and returns the matching cells in sheet, row and column order.
/// With `exact` the cell text must equal the keyword, otherwise contain it.
/// Unreadable rows are skipped and a broken sheet ends that sheet only.
pub fn find_keyword(
    source: &ArchiveSource,
    keyword: &str,
    exact: bool,
    sheet_patterns: &[String],
) -> Result<Vec<KeywordMatch>, ScanError> {
    let filter = SheetFilter::new(sheet_patterns)?;
    let needle = normalize(keyword);
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let mut archive = Archive::open(source)?;
    let name = archive.name().to_owned();
    let workbook = Workbook::load(&mut archive).with_prefix(&name)?;
    let tables = SharedTables::load(&mut archive, workbook.date1904).with_prefix(&name)?;

    let mut matches = Vec::new();
    for sheet in workbook.sheets.iter().filter(|sheet| filter.accept(&sheet.name)) {
        let parser = match EntryParser::open(&mut archive, sheet, &tables, &[]) {
            Ok(parser) => parser,
            Err(error) => {
                warn!("{}", error);
                continue;
            }
        };
        for result in parser {
            let row = match result {
                Ok(row) => row,
                Err(RowError::Row(error)) => {
                    debug!("{}", error);
                    continue;
                }
                Err(RowError::Sheet(error)) => {
                    warn!("{}", error);
                    break;
                }
            };
            for cell in &row.cells {
                let text = normalize(&cell.value.canonical_text());
                let found = if exact { text == needle } else { text.contains(&needle) };
                if found && !text.is_empty() {
                    matches.push(KeywordMatch {
                        sheet: sheet.name.to_owned(),
                        row: cell.row,
                        col: cell.col,
                        reference: index_to_reference(cell.row, cell.col),
                    });
                }
            }
        }
    }
    debug!("Keyword '{}' found {} time(s) in '{}'", keyword, matches.len(), name);
    Ok(matches)
}

/// Content of a cell read by position
#[derive(Clone, Debug, PartialEq)]
pub struct CellContent {
    pub reference: String,
    pub value: CellValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
}

impl CellContent {
    fn from_cell(cell: &Cell) -> Option<CellContent> {
        if cell.value.is_empty() && cell.formula.is_none() {
            return None;
        }
        Some(CellContent {
            reference: cell.reference(),
            value: cell.value.clone(),
            formula: cell.formula.clone(),
        })
    }

    /// Value as text; error codes keep their code, missing formula results are empty
    pub fn text(&self) -> String {
        self.value.canonical_text().into_owned()
    }

    /// Formula as typed in the sheet (`=A2+B2`), or the value text when there is none
    pub fn formula_text(&self) -> String {
        match &self.formula {
            Some(formula) => format!("={formula}"),
            None => self.text(),
        }
    }
}

/// Reads one cell of a sheet by its `A1` reference. `None` when the cell is empty or absent.
///
/// The sheet is streamed only up to the row of the cell. A row that cannot be decoded
/// reads as absent.
pub fn cell_at(source: &ArchiveSource, sheet: &str, reference: &str) -> Result<Option<CellContent>, ScanError> {
    let target = parse_reference(reference)?;
    let mut found = read_cells(source, sheet, &[target])?;
    Ok(found.pop().flatten())
}

/// Reads a set of named cells, such as the header fields of a form, in a single pass.
/// `fields` maps a field name to the `A1` reference holding it.
pub fn read_fields(
    source: &ArchiveSource,
    sheet: &str,
    fields: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Option<CellContent>>, ScanError> {
    let targets = fields
        .values()
        .map(|reference| parse_reference(reference))
        .collect::<Result<Vec<_>, _>>()?;
    let found = read_cells(source, sheet, &targets)?;
    Ok(fields.keys().cloned().zip(found).collect())
}

fn parse_reference(reference: &str) -> Result<(usize, usize), ScanError> {
    reference_to_index(reference.trim()).ok_or_else(|| ScanError::InvalidReference(reference.to_owned()))
}

/// Streams a sheet until every target `(row, col)` has been passed
fn read_cells(
    source: &ArchiveSource,
    sheet_name: &str,
    targets: &[(usize, usize)],
) -> Result<Vec<Option<CellContent>>, ScanError> {
    let mut found = vec![None; targets.len()];
    let mut archive = Archive::open(source)?;
    let name = archive.name().to_owned();
    let workbook = Workbook::load(&mut archive).with_prefix(&name)?;
    let sheet = workbook
        .sheets
        .iter()
        .find(|sheet| sheet.name == sheet_name)
        .ok_or_else(|| ScanError::SheetNotFound(sheet_name.to_owned()))?;
    let Some(last_row) = targets.iter().map(|(row, _)| *row).max() else {
        return Ok(found);
    };
    let tables = SharedTables::load(&mut archive, workbook.date1904).with_prefix(&name)?;

    let parser = match EntryParser::open(&mut archive, sheet, &tables, &[]) {
        Ok(parser) => parser.with_formulas(),
        Err(error) => {
            warn!("{}", error);
            return Ok(found);
        }
    };
    for result in parser {
        let row = match result {
            Ok(row) => row,
            Err(RowError::Row(error)) => {
                debug!("{}", error);
                continue;
            }
            Err(RowError::Sheet(error)) => {
                warn!("{}", error);
                break;
            }
        };
        if row.index > last_row {
            break;
        }
        for (slot, (target_row, col)) in found.iter_mut().zip(targets) {
            if *target_row == row.index {
                *slot = row.get(*col).and_then(CellContent::from_cell);
            }
        }
    }
    Ok(found)
}
