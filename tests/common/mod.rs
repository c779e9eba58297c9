#![allow(dead_code)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tempfile::tempdir;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

const MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const CHARTSHEET_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet";

/// A cell value written by [`WorkbookBuilder::sheet`]
#[derive(Clone, Debug)]
pub enum V<'a> {
    N(f64),
    S(&'a str),
    B(bool),
    Blank,
}

/// Builds `.xlsx` containers in memory
#[derive(Default)]
pub struct WorkbookBuilder {
    sheets: Vec<(String, String)>,
    chartsheets: Vec<String>,
    shared_strings: Option<Vec<String>>,
    styles: Option<String>,
    omitted_parts: Vec<String>,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet whose rows start at row 1; strings are written inline
    pub fn sheet(self, name: &str, rows: &[Vec<V<'_>>]) -> Self {
        let mut data = String::new();
        for (index, values) in rows.iter().enumerate() {
            let row = index + 1;
            data.push_str(&format!(r#"<row r="{row}">"#));
            for (col, value) in values.iter().enumerate() {
                let reference = format!("{}{row}", column_label(col));
                match value {
                    V::N(number) => data.push_str(&format!(r#"<c r="{reference}"><v>{number}</v></c>"#)),
                    V::S(text) => data.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text)
                    )),
                    V::B(flag) => data.push_str(&format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*flag))),
                    V::Blank => (),
                }
            }
            data.push_str("</row>");
        }
        self.sheet_xml(name, &data)
    }

    /// Adds a sheet from raw `<sheetData>` content
    pub fn sheet_xml(mut self, name: &str, sheet_data: &str) -> Self {
        self.sheets.push((name.to_string(), sheet_data.to_string()));
        self
    }

    /// Declares a chartsheet after the worksheets
    pub fn chartsheet(mut self, name: &str) -> Self {
        self.chartsheets.push(name.to_string());
        self
    }

    pub fn shared_strings(mut self, strings: &[&str]) -> Self {
        self.shared_strings = Some(strings.iter().map(|string| string.to_string()).collect());
        self
    }

    /// Raw `styles.xml` content
    pub fn styles(mut self, styles: &str) -> Self {
        self.styles = Some(styles.to_string());
        self
    }

    /// Leaves a part out of the container, to build broken workbooks
    pub fn omit(mut self, part: &str) -> Self {
        self.omitted_parts.push(part.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts = Vec::<(String, String)>::new();
        let mut manifest = String::new();
        let mut relationships = String::new();
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            manifest.push_str(&format!(r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name)));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{id}" Type="{WORKSHEET_TYPE}" Target="worksheets/sheet{id}.xml"/>"#
            ));
        }
        for (index, name) in self.chartsheets.iter().enumerate() {
            let id = self.sheets.len() + index + 1;
            manifest.push_str(&format!(r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name)));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{id}" Type="{CHARTSHEET_TYPE}" Target="chartsheets/sheet{}.xml"/>"#,
                index + 1
            ));
            parts.push((
                format!("xl/chartsheets/sheet{}.xml", index + 1),
                format!(r#"<chartsheet xmlns="{MAIN_NAMESPACE}"/>"#),
            ));
        }

        parts.push((
            "[Content_Types].xml".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_string(),
        ));
        parts.push((
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{MAIN_NAMESPACE}" xmlns:r="{RELATIONSHIP_NAMESPACE}"><sheets>{manifest}</sheets></workbook>"#
            ),
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
            ),
        ));
        if let Some(strings) = &self.shared_strings {
            let items: String = strings.iter().map(|string| format!("<si><t>{}</t></si>", escape(string))).collect();
            parts.push((
                "xl/sharedStrings.xml".to_string(),
                format!(r#"<sst xmlns="{MAIN_NAMESPACE}" count="{0}" uniqueCount="{0}">{items}</sst>"#, strings.len()),
            ));
        }
        if let Some(styles) = &self.styles {
            parts.push(("xl/styles.xml".to_string(), styles.to_string()));
        }
        for (index, (_, data)) in self.sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", index + 1),
                format!(r#"<worksheet xmlns="{MAIN_NAMESPACE}"><sheetData>{data}</sheetData></worksheet>"#),
            ));
        }

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts.iter().filter(|(name, _)| !self.omitted_parts.contains(name)) {
            writer.start_file(name.as_str(), options).expect("start zip entry");
            writer.write_all(content.as_bytes()).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

/// A `styles.xml` whose `cellXfs` entry 1 is the built-in date format 14
pub fn date_styles() -> String {
    format!(
        r#"<styleSheet xmlns="{MAIN_NAMESPACE}"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#
    )
}

pub fn column_label(col: usize) -> String {
    let mut col = col + 1;
    let mut label = String::new();
    while col > 0 {
        col -= 1;
        label.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    label
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Header plus one row per value, for single-column key sheets
pub fn key_rows<'a>(header: &'a str, values: &[f64]) -> Vec<Vec<V<'a>>> {
    let mut rows = vec![vec![V::S(header)]];
    rows.extend(values.iter().map(|value| vec![V::N(*value)]));
    rows
}

/// Routes library logs to the test output; `RUST_LOG=debug` shows per-sheet progress
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
