//! Minimal `.xlsx` (SpreadsheetML) reader.
//!
//! Reads the workbook sheet list, the workbook relationships, the shared
//! string table and each worksheet's cells, and decodes them into a
//! [`Workbook`]. Only cell values are read. Formulas, styles and dates are
//! ignored and their raw cached value is kept.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{column_letters, split_address, Workbook};
use crate::error::AppError;

const WORKBOOK_XML: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_XML: &str = "xl/sharedStrings.xml";

static SHEET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?sheet\b([^>]*?)/?>").expect("static regex"));
static REL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?Relationship\b([^>]*?)/?>").expect("static regex"));
static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});
static SI_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?si\b[^>]*?(?:/>|>(.*?)</(?:\w+:)?si>)").expect("static regex")
});
static T_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?t\b[^>]*?(?:/>|>(.*?)</(?:\w+:)?t>)").expect("static regex")
});
static PHONETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:\w+:)?rPh\b.*?</(?:\w+:)?rPh>").expect("static regex"));
static ROW_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?row\b([^>]*?)(?:/>|>(.*?)</(?:\w+:)?row>)").expect("static regex")
});
static CELL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?c\b([^>]*?)(?:/>|>(.*?)</(?:\w+:)?c>)").expect("static regex")
});
static V_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?v\b[^>]*>(.*?)</(?:\w+:)?v>").expect("static regex")
});
static IS_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?is\b[^>]*>(.*?)</(?:\w+:)?is>").expect("static regex")
});
static ENTITY_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("static regex")
});

/// Read an `.xlsx` file from disk.
pub fn read_workbook(path: &Path) -> Result<Workbook, AppError> {
    let file = File::open(path)?;
    read_archive(file)
        .map_err(|e| AppError::Workbook(format!("{}: {}", path.display(), e)))
}

/// Read a workbook from any seekable zip stream.
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<Workbook, AppError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    let workbook_xml = read_entry(&mut archive, WORKBOOK_XML)?
        .ok_or_else(|| AppError::Workbook(format!("missing {}", WORKBOOK_XML)))?;
    let rels_xml = read_entry(&mut archive, WORKBOOK_RELS)?
        .ok_or_else(|| AppError::Workbook(format!("missing {}", WORKBOOK_RELS)))?;
    let shared = match read_entry(&mut archive, SHARED_STRINGS_XML)? {
        Some(xml) => parse_shared_strings(&xml),
        None => Vec::new(),
    };

    let targets = parse_relationships(&rels_xml);
    let mut workbook = Workbook::new();

    for (name, rel_id) in parse_sheet_list(&workbook_xml) {
        let target = targets.get(&rel_id).ok_or_else(|| {
            AppError::Workbook(format!("sheet '{}' has no relationship '{}'", name, rel_id))
        })?;
        let part = resolve_part(target);
        let xml = read_entry(&mut archive, &part)?.ok_or_else(|| {
            AppError::Workbook(format!("sheet '{}' part {} is missing", name, part))
        })?;
        load_sheet(&mut workbook, &name, &xml, &shared)?;
        tracing::debug!(sheet = %name, part = %part, "Loaded worksheet");
    }

    Ok(workbook)
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, AppError> {
    let mut entry = match archive.by_name(name) {
        Ok(e) => e,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(Some(text))
}

fn attributes(tag_body: &str) -> HashMap<String, String> {
    ATTR.captures_iter(tag_body)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| unescape_xml(m.as_str()))
                .unwrap_or_default();
            (caps[1].to_string(), value)
        })
        .collect()
}

/// `(sheet name, relationship id)` in workbook order.
fn parse_sheet_list(xml: &str) -> Vec<(String, String)> {
    SHEET_TAG
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = attributes(&caps[1]);
            let name = attrs.get("name")?.clone();
            let rel = attrs
                .iter()
                .find(|(k, _)| k.as_str() == "r:id" || k.ends_with(":id"))
                .map(|(_, v)| v.clone())?;
            Some((name, rel))
        })
        .collect()
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    REL_TAG
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = attributes(&caps[1]);
            Some((attrs.get("Id")?.clone(), attrs.get("Target")?.clone()))
        })
        .collect()
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Concatenated text runs of an `<si>` / `<is>` body, phonetic hints excluded.
fn run_text(body: &str) -> String {
    let body = PHONETIC.replace_all(body, "");
    T_TAG
        .captures_iter(&body)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .collect()
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    SI_TAG
        .captures_iter(xml)
        .map(|caps| caps.get(1).map(|m| run_text(m.as_str())).unwrap_or_default())
        .collect()
}

fn load_sheet(
    workbook: &mut Workbook,
    name: &str,
    xml: &str,
    shared: &[String],
) -> Result<(), AppError> {
    workbook.touch_row(name, None);
    let mut next_row = 1u32;

    for row_caps in ROW_TAG.captures_iter(xml) {
        let row_attrs = attributes(&row_caps[1]);
        let row_number = row_attrs
            .get("r")
            .and_then(|r| r.parse::<u32>().ok())
            .unwrap_or(next_row);
        next_row = row_number + 1;
        workbook.touch_row(name, Some(row_number));

        let Some(cells) = row_caps.get(2) else {
            continue;
        };

        for (position, cell_caps) in CELL_TAG.captures_iter(cells.as_str()).enumerate() {
            let cell_attrs = attributes(&cell_caps[1]);
            let address = match cell_attrs.get("r") {
                Some(r) if split_address(r).is_some() => r.clone(),
                _ => format!("{}{}", column_letters(position), row_number),
            };
            let body = cell_caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if let Some(value) = decode_cell(cell_attrs.get("t").map(String::as_str), body, shared) {
                workbook.set_cell(name, &address, value)?;
            }
        }
    }
    Ok(())
}

/// Decode one cell body according to its `t` attribute.
fn decode_cell(cell_type: Option<&str>, body: &str, shared: &[String]) -> Option<String> {
    if cell_type == Some("inlineStr") {
        return IS_TAG.captures(body).map(|caps| run_text(&caps[1]));
    }

    let raw = V_TAG.captures(body).map(|caps| unescape_xml(&caps[1]))?;
    let value = match cell_type {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or(raw),
        Some("b") => {
            if raw.trim() == "0" {
                "FALSE".to_string()
            } else {
                "TRUE".to_string()
            }
        }
        _ => raw,
    };
    Some(value)
}

/// Replace the predefined XML entities and numeric character references.
pub fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_REF
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match name.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
