//! Date format signatures: which written form a date-bearing cell uses
use crate::spreadsheet::cell::CellValue;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

/// Textual date layouts recognized in string cells, tried in order
fn text_layouts() -> &'static [(&'static str, Regex)] {
    static LAYOUTS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    LAYOUTS.get_or_init(|| {
        [
            ("text:yyyy-mm-dd", r"^\d{4}-\d{1,2}-\d{1,2}$".to_string()),
            ("text:yyyy-mm-ddThh:mm", r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?Z?$".to_string()),
            ("text:yyyy/mm/dd", r"^\d{4}/\d{1,2}/\d{1,2}$".to_string()),
            ("text:dd/mm/yyyy", r"^\d{1,2}/\d{1,2}/\d{2,4}$".to_string()),
            ("text:dd-mm-yyyy", r"^\d{1,2}-\d{1,2}-\d{4}$".to_string()),
            ("text:dd.mm.yyyy", r"^\d{1,2}\.\d{1,2}\.\d{4}$".to_string()),
            ("text:d month yyyy", format!(r"(?i)^\d{{1,2}}[ -]({MONTHS})[a-z]*\.?[ -]\d{{4}}$")),
            ("text:month d, yyyy", format!(r"(?i)^({MONTHS})[a-z]*\.? \d{{1,2}},? \d{{4}}$")),
        ]
        .into_iter()
        .map(|(label, pattern)| (label, Regex::new(&pattern).expect("Hardcode regex pattern")))
        .collect()
    })
}

/// The format signature of a date-bearing value: the number format code of a
/// date-formatted number, `iso8601` for ISO cells, or the layout of a date-looking string.
pub fn date_signature(value: &CellValue) -> Option<Cow<'_, str>> {
    match value {
        CellValue::Date(date) => Some(Cow::Borrowed(date.format.as_ref())),
        CellValue::String(text) => {
            let text = text.trim();
            text_layouts()
                .iter()
                .find(|(_, pattern)| pattern.is_match(text))
                .map(|(label, _)| Cow::Borrowed(*label))
        }
        _ => None,
    }
}
