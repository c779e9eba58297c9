//! Workbook manifest and the workbook-level lookup tables every sheet depends on
use crate::error::ScanError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::match_xml_events;
use crate::spreadsheet::archive::Archive;
use crate::spreadsheet::cell::NumberFormat;
use log::debug;
use log::info;
use quick_xml::events::Event;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufRead;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELATIONSHIPS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const STYLES_PATH: &str = "xl/styles.xml";

// XML tag names of the manifest, styles and shared string parts
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";
const TAG_TEXT: &[u8] = b"t";

/// A worksheet declared by the workbook manifest
#[derive(Clone, Debug, PartialEq)]
pub struct WorkbookSheet {
    pub name: String,
    /// Path of the sheet part inside the archive
    pub entry: String,
}

/// A declared sheet that holds no cell grid, such as a chartsheet or dialog sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub name: String,
    /// Relationship kind of the part, e.g. `chartsheet`
    pub kind: String,
}

/// The workbook manifest: worksheets in declaration order
#[derive(Clone, Debug, Default)]
pub struct Workbook {
    pub sheets: Vec<WorkbookSheet>,
    /// Declared sheets that are not worksheets and are never scanned
    pub skipped: Vec<SkippedSheet>,
    /// Whether serial dates count from 1904 instead of 1900
    pub date1904: bool,
}

/// Workbook-level lookup tables. Loaded once before any sheet is parsed and read-only afterwards.
#[derive(Debug, Default)]
pub struct SharedTables {
    pub shared_strings: Vec<String>,
    /// Number format of each `cellXfs` entry, indexed by the cell `s` attribute
    pub formats: Vec<NumberFormat>,
    pub date1904: bool,
}

impl SharedTables {
    pub fn shared_string(&self, index: usize) -> Option<&str> {
        self.shared_strings.get(index).map(String::as_str)
    }

    pub fn format(&self, style: usize) -> Option<&NumberFormat> {
        self.formats.get(style)
    }
}

impl Workbook {
    /// Reads the manifest and checks that every worksheet part it references exists
    ///
    /// # Errors
    /// * `ScanError::EntryNotFound` if the manifest, its relationships or a sheet part is missing
    /// * `ScanError::ContainerCorrupt` if the manifest cannot be parsed or names a sheet twice
    pub fn load(archive: &mut Archive) -> Result<Workbook, ScanError> {
        let relationships = load_relationships(archive)?;
        let (declared, date1904) = {
            let mut reader = archive.entry(WORKBOOK_PATH)?;
            read_manifest(&mut reader).map_err(|error| ScanError::corrupt_part(WORKBOOK_PATH, error))?
        };

        let mut names = HashSet::<String>::new();
        let mut sheets = Vec::<WorkbookSheet>::new();
        let mut skipped = Vec::<SkippedSheet>::new();
        for (name, id) in declared {
            if !names.insert(name.to_owned()) {
                return Err(ScanError::corrupt_part(WORKBOOK_PATH, format!("duplicate sheet name '{name}'")));
            }
            let (kind, target) = relationships
                .get(&id)
                .ok_or_else(|| ScanError::EntryNotFound(format!("{WORKBOOK_RELATIONSHIPS_PATH}#{id}")))?;
            if !kind.ends_with("/worksheet") {
                let kind = kind.rsplit('/').next().unwrap_or(kind.as_str()).to_owned();
                info!("Sheet '{}' is a {} and will not be scanned", name, kind);
                skipped.push(SkippedSheet { name, kind });
                continue;
            }
            sheets.push(WorkbookSheet {
                name,
                entry: target.to_owned(),
            });
        }

        if let Some(missing) = sheets.iter().find(|sheet| !archive.contains(&sheet.entry)) {
            return Err(ScanError::EntryNotFound(missing.entry.to_owned()));
        }
        Ok(Workbook {
            sheets,
            skipped,
            date1904,
        })
    }
}

impl SharedTables {
    /// Loads the shared string table and the cell number formats in full
    pub fn load(archive: &mut Archive, date1904: bool) -> Result<SharedTables, ScanError> {
        let shared_strings = match archive.optional_entry(SHARED_STRINGS_PATH)? {
            Some(mut reader) => read_shared_strings(&mut reader)
                .map_err(|error| ScanError::corrupt_part(SHARED_STRINGS_PATH, error))?,
            None => Vec::new(),
        };
        let formats = match archive.optional_entry(STYLES_PATH)? {
            Some(mut reader) => read_number_formats(&mut reader)
                .map_err(|error| ScanError::corrupt_part(STYLES_PATH, error))?,
            None => Vec::new(),
        };
        debug!(
            "Loaded {} shared string(s) and {} cell format(s)",
            shared_strings.len(),
            formats.len()
        );
        Ok(SharedTables {
            shared_strings,
            formats,
            date1904,
        })
    }
}

/// Loads relationship id → (type, archive path) for the workbook part
fn load_relationships(archive: &mut Archive) -> Result<HashMap<String, (String, String)>, ScanError> {
    let mut reader = archive.entry(WORKBOOK_RELATIONSHIPS_PATH)?;
    read_relationships(&mut reader).map_err(|error| ScanError::corrupt_part(WORKBOOK_RELATIONSHIPS_PATH, error))
}

fn read_relationships<R: BufRead>(reader: &mut XmlReader<R>) -> Result<HashMap<String, (String, String)>, XmlError> {
    let mut relationships = HashMap::<String, (String, String)>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?.unwrap_or_default();
            let target = event.get_attribute_value("Target")?;
            if let Some((id, target)) = id.zip(target) {
                relationships.insert(id.to_string(), (kind.to_string(), to_zip_path(target)));
            }
        }
    });
    Ok(relationships)
}

/// Reads (sheet name, relationship id) pairs and the date system flag
fn read_manifest<R: BufRead>(reader: &mut XmlReader<R>) -> Result<(Vec<(String, String)>, bool), XmlError> {
    let mut sheets = Vec::<(String, String)>::new();
    let mut date1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                sheets.push((name.to_string(), id.to_string()));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            date1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, date1904))
}

fn read_shared_strings<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Vec<String>, XmlError> {
    let mut shared_strings = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Resolves the number format of every `cellXfs` entry
fn read_number_formats<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Vec<NumberFormat>, XmlError> {
    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u32, NumberFormat>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<u32>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id, NumberFormat::custom(id, &code));
            }
        }

        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0));
        }
    });

    Ok(format_indexes
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .cloned()
                .unwrap_or_else(|| NumberFormat::builtin(id))
        })
        .collect())
}

/// Reads string content up to `end_tag`, skipping phonetic runs.
/// With `is_text_content` the content is taken directly, otherwise only from `<t>` children.
pub(crate) fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, XmlError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Normalizes a relationship target to a path inside the archive
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(xml: &str) -> XmlReader<&[u8]> {
        XmlReader::new(xml.as_bytes())
    }

    #[test]
    fn reads_manifest_in_declaration_order() {
        let xml = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
            <workbookPr date1904="1"/>
            <sheets>
                <sheet name="Orders" sheetId="2" r:id="rId2"/>
                <sheet name="Customers" sheetId="1" r:id="rId1"/>
            </sheets>
        </workbook>"#;
        let (sheets, date1904) = read_manifest(&mut reader(xml)).expect("manifest");
        assert!(date1904);
        assert_eq!(
            sheets,
            vec![
                ("Orders".to_string(), "rId2".to_string()),
                ("Customers".to_string(), "rId1".to_string())
            ]
        );
    }

    #[test]
    fn reads_relationship_targets() {
        let xml = r#"<Relationships>
            <Relationship Id="rId1" Type="http://x/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="http://x/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
            <Relationship Id="rId3" Type="http://x/officeDocument/2006/relationships/styles" Target="styles.xml"/>
        </Relationships>"#;
        let relationships = read_relationships(&mut reader(xml)).expect("relationships");
        assert_eq!(relationships["rId1"].1, "xl/worksheets/sheet1.xml");
        assert_eq!(relationships["rId2"].1, "xl/worksheets/sheet2.xml");
        assert!(relationships["rId3"].0.ends_with("/styles"));
    }

    #[test]
    fn reads_shared_strings_without_phonetic_runs() {
        let xml = r#"<sst>
            <si><t>plain</t></si>
            <si><r><t>rich </t></r><r><t>text</t></r></si>
            <si><t>東京</t><rPh><t>トウキョウ</t></rPh></si>
            <si><t>a &amp; b</t></si>
        </sst>"#;
        let strings = read_shared_strings(&mut reader(xml)).expect("shared strings");
        assert_eq!(strings, vec!["plain", "rich text", "東京", "a & b"]);
    }

    #[test]
    fn resolves_cell_formats() {
        let xml = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy/mm/dd"/></numFmts>
            <cellStyleXfs><xf numFmtId="99"/></cellStyleXfs>
            <cellXfs>
                <xf numFmtId="0"/>
                <xf numFmtId="164"/>
                <xf numFmtId="14"/>
                <xf numFmtId="2"/>
            </cellXfs>
        </styleSheet>"#;
        let formats = read_number_formats(&mut reader(xml)).expect("formats");
        assert_eq!(formats.len(), 4);
        assert!(!formats[0].kind.is_temporal());
        assert_eq!(&*formats[1].code, "yyyy/mm/dd");
        assert!(formats[1].kind.is_temporal());
        assert!(formats[2].kind.is_temporal());
        assert!(!formats[3].kind.is_temporal());
    }
}
