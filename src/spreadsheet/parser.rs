//! Sheet Stream Parser: turns one worksheet part into a lazy sequence of rows.
//!
//! Only the cells of the row being decoded are held in memory. A row that cannot be
//! decoded is reported as a [`MalformedRowError`] and skipped; a broken stream is
//! reported once as a [`MalformedSheetError`], after which the parser is exhausted.
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::spreadsheet::archive::Archive;
use crate::spreadsheet::cell::parse_iso_datetime;
use crate::spreadsheet::cell::serial_to_datetime;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellStyle;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DateValue;
use crate::spreadsheet::cell::ISO_DATE_FORMAT;
use crate::spreadsheet::reference::index_to_col;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MAX_COLUMN;
use crate::spreadsheet::reference::MAX_ROW;
use crate::spreadsheet::row::Row;
use crate::spreadsheet::workbook::read_string_value;
use crate::spreadsheet::workbook::SharedTables;
use crate::spreadsheet::workbook::WorkbookSheet;
use crate::spreadsheet::MalformedRowError;
use crate::spreadsheet::MalformedSheetError;
use crate::spreadsheet::RowError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::BufReader;
use std::sync::Arc;
use zip::read::ZipFile;

const TAG_SHEET_DATA: &[u8] = b"sheetData";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_VALUE: &[u8] = b"v";
const TAG_FORMULA: &[u8] = b"f";
const TAG_INLINE_STRING: &[u8] = b"is";

/// Parser over a sheet entry read straight from the archive
pub(crate) type EntryParser<'a> = SheetStreamParser<'a, BufReader<ZipFile<'a, UnifiedReader>>>;

/// Streaming row iterator over a worksheet part
pub struct SheetStreamParser<'a, R: BufRead> {
    sheet: String,
    reader: XmlReader<R>,
    tables: &'a SharedTables,
    null_literals: &'a [String],
    last_row: Option<usize>,
    finished: bool,
    /// Keep the text of `<f>` elements on the decoded cells
    keep_formulas: bool,
}

/// Attributes of a `<c>` element
struct CellHeader {
    reference: Option<String>,
    kind: Option<String>,
    style: Option<usize>,
}

/// Children of a `<c>` element
#[derive(Default)]
struct CellBody {
    value: Option<String>,
    inline: Option<String>,
    has_formula: bool,
    formula: Option<String>,
}

impl<'a> EntryParser<'a> {
    /// Opens the sheet's entry. Any failure to open it is sheet-fatal.
    pub(crate) fn open(
        archive: &'a mut Archive,
        sheet: &WorkbookSheet,
        tables: &'a SharedTables,
        null_literals: &'a [String],
    ) -> Result<EntryParser<'a>, MalformedSheetError> {
        match archive.raw_entry(&sheet.entry) {
            Ok(Some(reader)) => Ok(SheetStreamParser::new(&sheet.name, reader, tables, null_literals)),
            Ok(None) => Err(MalformedSheetError {
                sheet: sheet.name.to_owned(),
                reason: format!("entry '{}' not found", sheet.entry),
            }),
            Err(error) => Err(MalformedSheetError {
                sheet: sheet.name.to_owned(),
                reason: error.to_string(),
            }),
        }
    }
}

impl<'a, R: BufRead> SheetStreamParser<'a, R> {
    pub(crate) fn new(
        sheet: &str,
        reader: XmlReader<R>,
        tables: &'a SharedTables,
        null_literals: &'a [String],
    ) -> Self {
        SheetStreamParser {
            sheet: sheet.to_owned(),
            reader,
            tables,
            null_literals,
            last_row: None,
            finished: false,
            keep_formulas: false,
        }
    }

    /// Makes decoded cells carry their formula text
    pub(crate) fn with_formulas(mut self) -> Self {
        self.keep_formulas = true;
        self
    }

    /// Reads the next `<row>` element, `None` once the sheet data is exhausted
    fn read_row(&mut self) -> Result<Option<Row>, RowError> {
        let declared = loop {
            match self.reader.next() {
                Err(error) => return Err(malformed_sheet(&self.sheet, error)),
                Ok(None) => return Ok(None),
                Ok(Some(Event::End(event))) if event.local_name().as_ref() == TAG_SHEET_DATA => return Ok(None),
                Ok(Some(Event::Start(event))) if event.local_name().as_ref() == TAG_ROW => {
                    break event.parse_attribute_value::<usize>("r");
                }
                Ok(Some(_)) => (),
            }
        };

        let implied = match self.last_row {
            None => 0,
            Some(last) => match last.checked_add(1) {
                Some(next) => next,
                None => {
                    return Err(RowError::Sheet(MalformedSheetError {
                        sheet: self.sheet.to_owned(),
                        reason: format!("no row can follow row index {last}"),
                    }))
                }
            },
        };
        let mut problem = None::<String>;
        let index = match declared {
            Ok(Some(number)) if number >= 1 => number - 1,
            Ok(Some(number)) => {
                problem = Some(format!("invalid row number {number}"));
                implied
            }
            Ok(None) => implied,
            Err(error) => {
                problem = Some(error.to_string());
                implied
            }
        };
        if index > MAX_ROW {
            problem.get_or_insert_with(|| format!("row {} is beyond {}", index.saturating_add(1), MAX_ROW + 1));
        }
        match self.last_row {
            Some(last) if index <= last => {
                problem.get_or_insert_with(|| {
                    format!("row {} does not follow row {}", index.saturating_add(1), last.saturating_add(1))
                });
            }
            _ => self.last_row = Some(index),
        }

        let mut row = Row::new(index);
        loop {
            let header = match self.reader.next() {
                Err(error) => return Err(malformed_sheet(&self.sheet, error)),
                Ok(None) => return Err(malformed_sheet(&self.sheet, XmlError::UnexpectedEof("row".to_string()))),
                Ok(Some(Event::End(event))) if event.local_name().as_ref() == TAG_ROW => break,
                Ok(Some(Event::Start(event))) if problem.is_none() && event.local_name().as_ref() == TAG_CELL => {
                    CellHeader::read(&event)
                }
                Ok(Some(_)) => continue,
            };

            let result = match header {
                Ok(header) => read_cell_body(&mut self.reader, self.keep_formulas).map(|body| (header, body)),
                Err(error) => Err(error),
            };
            match result {
                Ok((header, body)) => match self.decode_cell(index, row.cells.len(), header, body) {
                    Ok(cell) => row.push(cell),
                    Err(reason) => problem = Some(reason),
                },
                Err(error) if error.is_fatal() => return Err(malformed_sheet(&self.sheet, error)),
                Err(error) => problem = Some(error.to_string()),
            }
        }

        match problem {
            Some(reason) => Err(RowError::Row(MalformedRowError {
                sheet: self.sheet.to_owned(),
                row: index,
                reason,
            })),
            None => Ok(Some(row)),
        }
    }

    fn decode_cell(&self, row: usize, next_col: usize, header: CellHeader, mut body: CellBody) -> Result<Cell, String> {
        let col = match header.reference.as_deref() {
            Some(reference) => {
                let (cell_row, col) =
                    reference_to_index(reference).ok_or_else(|| format!("invalid cell reference '{reference}'"))?;
                if cell_row != row {
                    return Err(format!("cell {reference} lies outside row {}", row + 1));
                }
                col
            }
            None => next_col,
        };
        if col > MAX_COLUMN {
            return Err(format!("column {} is beyond XFD", index_to_col(col)));
        }
        if col < next_col {
            return Err(format!("column {} is out of order or duplicated", index_to_col(col)));
        }

        let style = header.style.and_then(|index| {
            self.tables.format(index).map(|format| CellStyle {
                index,
                number_format: format.to_owned(),
            })
        });
        let formula = body.formula.take();
        let value = self.decode_value(header.kind.as_deref(), body, style.as_ref())?;
        Ok(Cell {
            row,
            col,
            value,
            style,
            formula,
        })
    }

    fn decode_value(&self, kind: Option<&str>, body: CellBody, style: Option<&CellStyle>) -> Result<CellValue, String> {
        let has_formula = body.has_formula;
        let missing = if has_formula {
            CellValue::FormulaUnavailable(None)
        } else {
            CellValue::Empty
        };
        let value = body.value.filter(|text| !text.is_empty());

        let value = match kind.unwrap_or("n") {
            "s" => match value {
                Some(text) => {
                    let index = text
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| format!("shared string index '{text}' is not an integer"))?;
                    let string = self
                        .tables
                        .shared_string(index)
                        .ok_or_else(|| format!("shared string index {index} is out of range"))?;
                    self.text_value(string.to_owned())
                }
                None => CellValue::Empty,
            },
            "str" => value.map(|text| self.text_value(text)).unwrap_or(missing),
            "inlineStr" => body
                .inline
                .or(value)
                .map(|text| self.text_value(text))
                .unwrap_or(CellValue::Empty),
            "b" => match value.as_deref().map(str::trim) {
                Some("1") | Some("true") => CellValue::Boolean(true),
                Some("0") | Some("false") => CellValue::Boolean(false),
                Some(other) => return Err(format!("invalid boolean '{other}'")),
                None => missing,
            },
            "e" => CellValue::FormulaUnavailable(value),
            "d" => match value {
                Some(text) => {
                    let datetime = parse_iso_datetime(&text).ok_or_else(|| format!("invalid ISO date '{text}'"))?;
                    CellValue::Date(DateValue {
                        datetime,
                        format: Arc::from(ISO_DATE_FORMAT),
                    })
                }
                None => missing,
            },
            "n" => match value {
                Some(text) => {
                    let number = text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|number| number.is_finite())
                        .ok_or_else(|| format!("invalid number '{text}'"))?;
                    self.number_value(number, style)
                }
                None => missing,
            },
            other => return Err(format!("unknown cell type '{other}'")),
        };
        Ok(value)
    }

    /// Numbers rendered with a date or time format are dates
    fn number_value(&self, number: f64, style: Option<&CellStyle>) -> CellValue {
        let temporal = style.filter(|style| style.number_format.kind.is_temporal());
        match temporal.and_then(|style| Some((style, serial_to_datetime(number, self.tables.date1904)?))) {
            Some((style, datetime)) => CellValue::Date(DateValue {
                datetime,
                format: Arc::clone(&style.number_format.code),
            }),
            None => CellValue::Number(number),
        }
    }

    fn text_value(&self, text: String) -> CellValue {
        if text.is_empty() || self.null_literals.iter().any(|literal| *literal == text) {
            CellValue::Empty
        } else {
            CellValue::String(text)
        }
    }
}

impl<R: BufRead> Iterator for SheetStreamParser<'_, R> {
    type Item = Result<Row, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(error @ RowError::Sheet(_)) => {
                self.finished = true;
                Some(Err(error))
            }
            Err(error) => Some(Err(error)),
        }
    }
}

impl CellHeader {
    fn read(event: &BytesStart<'_>) -> Result<CellHeader, XmlError> {
        let style = match event.get_attribute_value("s")? {
            Some(value) if !value.is_empty() => Some(
                value
                    .parse::<usize>()
                    .map_err(|_| XmlError::AttributeValue(value.to_string()))?,
            ),
            _ => None,
        };
        Ok(CellHeader {
            reference: event.get_attribute_value("r")?.map(Cow::into_owned),
            kind: event.get_attribute_value("t")?.map(Cow::into_owned),
            style,
        })
    }
}

/// Reads the children of a `<c>` element up to and including `</c>`
fn read_cell_body<R: BufRead>(reader: &mut XmlReader<R>, keep_formula: bool) -> Result<CellBody, XmlError> {
    let mut body = CellBody::default();
    loop {
        match reader.next()? {
            None => return Err(XmlError::UnexpectedEof("c".to_string())),
            Some(Event::End(event)) if event.local_name().as_ref() == TAG_CELL => return Ok(body),
            Some(Event::Start(event)) if event.local_name().as_ref() == TAG_VALUE => {
                body.value = Some(read_string_value(reader, TAG_VALUE, true)?);
            }
            Some(Event::Start(event)) if event.local_name().as_ref() == TAG_INLINE_STRING => {
                body.inline = Some(read_string_value(reader, TAG_INLINE_STRING, false)?);
            }
            Some(Event::Start(event)) if event.local_name().as_ref() == TAG_FORMULA => {
                body.has_formula = true;
                if keep_formula {
                    let text = read_string_value(reader, TAG_FORMULA, true)?;
                    body.formula = Some(text).filter(|text| !text.is_empty());
                }
            }
            Some(_) => (),
        }
    }
}

fn malformed_sheet(sheet: &str, error: XmlError) -> RowError {
    RowError::Sheet(MalformedSheetError {
        sheet: sheet.to_owned(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::NumberFormat;
    use chrono::NaiveDate;

    fn tables() -> SharedTables {
        SharedTables {
            shared_strings: vec!["name".to_string(), "NULL".to_string()],
            formats: vec![NumberFormat::general(), NumberFormat::builtin(14)],
            date1904: false,
        }
    }

    fn parse(sheet_data: &str) -> Vec<Result<Row, RowError>> {
        let xml = format!("<worksheet><sheetData>{sheet_data}</sheetData></worksheet>");
        let tables = tables();
        let null_literals = vec!["NULL".to_string(), "n/a".to_string()];
        SheetStreamParser::new("Data", XmlReader::new(xml.as_bytes()), &tables, &null_literals).collect()
    }

    #[test]
    fn decodes_cell_kinds() {
        let rows = parse(
            r#"<row r="1">
                <c r="A1" t="s"><v>0</v></c>
                <c r="B1"><v>42</v></c>
                <c r="C1" t="b"><v>1</v></c>
                <c r="D1" t="str"><f>A1</f><v>cached</v></c>
                <c r="E1" t="inlineStr"><is><t>inline</t></is></c>
                <c r="F1" t="e"><v>#DIV/0!</v></c>
                <c r="G1" t="d"><v>2024-03-01</v></c>
                <c r="H1"><f>SUM(B1:B9)</f></c>
                <c r="I1" s="1"><v>45292</v></c>
                <c r="J1" t="s"><v>1</v></c>
                <c r="K1" t="inlineStr"><is><t>n/a</t></is></c>
            </row>"#,
        );
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().expect("row");
        assert_eq!(row.index, 0);
        assert_eq!(row.value(0), &CellValue::String("name".to_string()));
        assert_eq!(row.value(1), &CellValue::Number(42.0));
        assert_eq!(row.value(2), &CellValue::Boolean(true));
        assert_eq!(row.value(3), &CellValue::String("cached".to_string()));
        assert_eq!(row.value(4), &CellValue::String("inline".to_string()));
        assert_eq!(row.value(5), &CellValue::FormulaUnavailable(Some("#DIV/0!".to_string())));
        match row.value(6) {
            CellValue::Date(date) => assert_eq!(&*date.format, ISO_DATE_FORMAT),
            other => panic!("expected a date, got {other:?}"),
        }
        assert_eq!(row.value(7), &CellValue::FormulaUnavailable(None));
        match row.value(8) {
            CellValue::Date(date) => {
                assert_eq!(date.datetime.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
                assert_eq!(&*date.format, "mm-dd-yy");
            }
            other => panic!("expected a date, got {other:?}"),
        }
        assert!(row.value(9).is_empty());
        assert!(row.value(10).is_empty());
        assert_eq!(row.get(8).and_then(|cell| cell.style.as_ref()).map(|style| style.index), Some(1));
    }

    #[test]
    fn skips_malformed_rows_and_continues() {
        let rows = parse(
            r#"<row r="1"><c r="A1"><v>1</v></c></row>
               <row r="2"><c r="A2" t="b"><v>maybe</v></c><c r="B2"><v>2</v></c></row>
               <row r="3"><c r="A3" t="s"><v>7</v></c></row>
               <row r="4"><c r="B4"><v>1</v></c><c r="A4"><v>2</v></c></row>
               <row r="5"><c r="A5"><v>abc</v></c></row>
               <row r="6"><c r="A6"><v>6</v></c></row>"#,
        );
        let malformed: Vec<(usize, String)> = rows
            .iter()
            .filter_map(|result| match result {
                Err(RowError::Row(error)) => Some((error.row, error.reason.to_owned())),
                _ => None,
            })
            .collect();
        assert_eq!(malformed.len(), 4);
        assert_eq!(malformed[0], (1, "invalid boolean 'maybe'".to_string()));
        assert!(malformed[1].1.contains("out of range"));
        assert!(malformed[2].1.contains("out of order"));
        assert!(malformed[3].1.contains("invalid number"));

        let good: Vec<usize> = rows.iter().filter_map(|result| result.as_ref().ok()).map(|row| row.index).collect();
        assert_eq!(good, vec![0, 5]);
    }

    #[test]
    fn rejects_rows_that_do_not_advance() {
        let rows = parse(
            r#"<row r="2"><c r="A2"><v>1</v></c></row>
               <row r="2"><c r="A2"><v>2</v></c></row>
               <row r="3"><c r="A3"><v>3</v></c></row>"#,
        );
        assert!(matches!(&rows[1], Err(RowError::Row(error)) if error.reason.contains("does not follow")));
        assert_eq!(rows[2].as_ref().map(|row| row.index).ok(), Some(2));
    }

    #[test]
    fn keeps_formula_text_on_request() {
        let xml = r#"<worksheet><sheetData><row r="1">
            <c r="A1"><f>A2+B2</f><v>3</v></c>
            <c r="B1"><f t="shared" si="0"/></c>
        </row></sheetData></worksheet>"#;
        let tables = tables();
        let rows: Vec<_> = SheetStreamParser::new("Data", XmlReader::new(xml.as_bytes()), &tables, &[])
            .with_formulas()
            .collect();
        let row = rows[0].as_ref().expect("row");
        assert_eq!(row.get(0).and_then(|cell| cell.formula.as_deref()), Some("A2+B2"));
        assert_eq!(row.value(0), &CellValue::Number(3.0));
        assert!(row.get(1).is_some_and(|cell| cell.formula.is_none()));
        assert_eq!(row.value(1), &CellValue::FormulaUnavailable(None));

        let plain = parse(r#"<row r="1"><c r="A1"><f>A2+B2</f><v>3</v></c></row>"#);
        assert!(plain[0].as_ref().expect("row").get(0).is_some_and(|cell| cell.formula.is_none()));
    }

    #[test]
    fn rejects_rows_beyond_the_sheet_limit() {
        let rows = parse(
            r#"<row r="1048576"><c r="A1048576"><v>1</v></c></row>
               <row r="5000000"><c r="A5000000"><v>2</v></c></row>"#,
        );
        assert_eq!(rows[0].as_ref().map(|row| row.index).ok(), Some(MAX_ROW));
        assert!(matches!(&rows[1], Err(RowError::Row(error)) if error.reason == "row 5000000 is beyond 1048576"));
    }

    #[test]
    fn ends_the_sheet_when_row_positions_run_out() {
        let rows = parse(
            r#"<row r="18446744073709551615"><c><v>1</v></c></row>
               <row><c><v>2</v></c></row>
               <row><c><v>3</v></c></row>
               <row><c><v>4</v></c></row>"#,
        );
        assert_eq!(rows.len(), 3);
        for result in &rows[..2] {
            match result {
                Err(RowError::Row(error)) => {
                    assert!(error.reason.contains("is beyond 1048576"));
                    assert!(!error.to_string().is_empty());
                }
                other => panic!("expected a malformed row, got {other:?}"),
            }
        }
        assert!(matches!(&rows[2], Err(RowError::Sheet(error)) if error.reason.contains("no row can follow")));
    }

    #[test]
    fn implies_missing_positions() {
        let rows = parse(r#"<row><c><v>1</v></c><c><v>2</v></c></row><row><c t="b"><v>0</v></c></row>"#);
        let rows: Vec<Row> = rows.into_iter().collect::<Result<_, _>>().expect("rows");
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].value(1), &CellValue::Number(2.0));
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].value(0), &CellValue::Boolean(false));
    }

    #[test]
    fn broken_stream_ends_the_sheet() {
        let tables = tables();
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row><row r="2"><c r="A2"><v>2</v>"#;
        let mut parser = SheetStreamParser::new("Data", XmlReader::new(xml.as_bytes()), &tables, &[]);
        assert!(matches!(parser.next(), Some(Ok(_))));
        assert!(matches!(parser.next(), Some(Err(RowError::Sheet(error))) if error.sheet == "Data"));
        assert!(parser.next().is_none());
    }
}
