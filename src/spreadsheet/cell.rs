use crate::schema::lattice::ValueType;
use crate::spreadsheet::reference::index_to_reference;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Timelike;
use std::borrow::Cow;
use std::sync::Arc;

/// Largest serial number that still maps to a date before year 10000
const MAX_DATE_SERIAL: f64 = 2_958_466.0;

/// Format signature used for cells stored with the ISO 8601 `d` cell type
pub(crate) const ISO_DATE_FORMAT: &str = "iso8601";

/// How a number format renders its value
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FormatKind {
    #[default]
    General,
    Date,
    Time,
    DateTime,
}

impl FormatKind {
    /// Returns true for formats that turn a serial number into a date and/or time
    pub fn is_temporal(&self) -> bool {
        !matches!(self, FormatKind::General)
    }

    /// Classifies one of the built-in number format ids
    fn from_builtin_id(id: u32) -> Self {
        match id {
            22 => FormatKind::DateTime,
            14..=17 => FormatKind::Date,
            18..=21 | 45..=47 => FormatKind::Time,
            _ => FormatKind::General,
        }
    }

    /// Classifies a custom format code by scanning for date and time tokens outside of
    /// literals, escapes and bracketed sections.
    fn from_code(code: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in code.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => FormatKind::DateTime,
            (true, false) => FormatKind::Date,
            (false, true) => FormatKind::Time,
            (false, false) => FormatKind::General,
        }
    }
}

/// A resolved number format referenced by a cell style
#[derive(Clone, Debug, PartialEq)]
pub struct NumberFormat {
    pub id: u32,
    pub code: Arc<str>,
    pub kind: FormatKind,
}

impl NumberFormat {
    /// The format of unstyled cells
    pub fn general() -> Self {
        Self::builtin(0)
    }

    /// One of the formats every workbook implicitly defines
    pub fn builtin(id: u32) -> Self {
        let code = builtin_format_code(id).unwrap_or("General");
        NumberFormat {
            id,
            code: Arc::from(code),
            kind: FormatKind::from_builtin_id(id),
        }
    }

    /// A format declared in the workbook's `numFmts` table
    pub fn custom(id: u32, code: &str) -> Self {
        NumberFormat {
            id,
            code: Arc::from(code),
            kind: FormatKind::from_code(code),
        }
    }
}

/// Codes of the built-in number formats
fn builtin_format_code(id: u32) -> Option<&'static str> {
    let code = match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

/// A date or time value together with the format it was written in
#[derive(Clone, Debug, PartialEq)]
pub struct DateValue {
    pub datetime: NaiveDateTime,
    /// Number format code, or [`ISO_DATE_FORMAT`] for ISO cells
    pub format: Arc<str>,
}

/// Raw value of a parsed cell
#[derive(Clone, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateValue),
    /// Formula without a cached result, or a cell holding an error code such as `#DIV/0!`
    FormulaUnavailable(Option<String>),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The lattice type this value contributes; `None` for values that carry no type
    pub fn observed_type(&self) -> Option<ValueType> {
        match self {
            CellValue::Empty => Some(ValueType::Empty),
            CellValue::Boolean(_) => Some(ValueType::Boolean),
            CellValue::Number(value) if is_integral(*value) => Some(ValueType::Integer),
            CellValue::Number(_) => Some(ValueType::Float),
            CellValue::Date(_) => Some(ValueType::Date),
            CellValue::String(_) => Some(ValueType::String),
            CellValue::FormulaUnavailable(_) => None,
        }
    }

    /// Numeric payload of plain number cells
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form used for comparisons, keys and evidence
    pub fn canonical_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::String(value) => Cow::Borrowed(value),
            CellValue::Number(value) => Cow::Owned(format_number(*value)),
            CellValue::Boolean(true) => Cow::Borrowed("TRUE"),
            CellValue::Boolean(false) => Cow::Borrowed("FALSE"),
            CellValue::Date(date) => Cow::Owned(format_datetime(&date.datetime)),
            CellValue::FormulaUnavailable(Some(code)) => Cow::Borrowed(code),
            CellValue::FormulaUnavailable(None) => Cow::Borrowed(""),
        }
    }

    /// Short tag distinguishing value kinds that may share a canonical text
    pub(crate) fn kind_tag(&self) -> &'static str {
        match self {
            CellValue::Empty => "e",
            CellValue::String(_) => "s",
            CellValue::Number(_) => "n",
            CellValue::Boolean(_) => "b",
            CellValue::Date(_) => "d",
            CellValue::FormulaUnavailable(_) => "f",
        }
    }
}

/// Style metadata attached to a cell
#[derive(Clone, Debug, PartialEq)]
pub struct CellStyle {
    /// Index into the workbook's `cellXfs` table
    pub index: usize,
    pub number_format: NumberFormat,
}

/// A single parsed cell
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    pub value: CellValue,
    pub style: Option<CellStyle>,
    /// Formula text without the leading `=`; only kept when the parser is asked to
    pub formula: Option<String>,
}

impl Cell {
    pub fn empty(row: usize, col: usize) -> Self {
        Cell {
            row,
            col,
            value: CellValue::Empty,
            style: None,
            formula: None,
        }
    }

    /// Returns the A1-style cell reference
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

/// Renders a number without a trailing `.0` for integral values
pub(crate) fn format_number(value: f64) -> String {
    if is_integral(value) && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Renders a datetime as an ISO date, adding the time part only when it is not midnight
pub(crate) fn format_datetime(datetime: &NaiveDateTime) -> String {
    if datetime.num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}

/// Converts a serial date number to a datetime.
/// The 1900 system reproduces the Lotus 1-2-3 leap year bug for serials before March 1900.
pub(crate) fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if date1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let millis = (serial.fract() * 86_400_000f64).round() as i64;
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?
        .checked_add_signed(TimeDelta::try_days(days + offset)?)?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Parses the value of an ISO 8601 (`t="d"`) cell
pub(crate) fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
            .ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}
