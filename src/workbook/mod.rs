//! Spreadsheet access for test scripts.
//!
//! Script loading only ever asks two questions of a workbook: which rows a
//! sheet has, and what string sits at a cell address. [`CellSource`] captures
//! that. [`Workbook`] is the in-memory implementation, filled either from an
//! `.xlsx` archive ([`xlsx`]) or from a YAML fixture.

pub mod xlsx;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Cell-level read access to a workbook.
pub trait CellSource {
    /// Whether a sheet with this exact name exists.
    fn has_sheet(&self, sheet: &str) -> bool;

    /// 1-based row numbers present in the sheet, ascending.
    fn row_numbers(&self, sheet: &str) -> Vec<u32>;

    /// Decoded string value at an `A1`-style address. Missing cells read as "".
    fn cell_value(&self, sheet: &str, address: &str) -> String;
}

/// Split `"AB12"` into `("AB", 12)`. Column letters are upper-cased.
pub fn split_address(address: &str) -> Option<(String, u32)> {
    let digits_at = address.find(|c: char| c.is_ascii_digit())?;
    let (col, row) = address.split_at(digits_at);
    if col.is_empty() || !col.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let row = row.parse::<u32>().ok()?;
    Some((col.to_ascii_uppercase(), row))
}

/// Column letters for a 0-based column index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

// ============================================================================
// In-memory workbook
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Sheet {
    name: String,
    /// row → column letters → value
    rows: BTreeMap<u32, BTreeMap<String, String>>,
}

/// Fully decoded workbook held in memory.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

#[derive(Deserialize)]
struct YamlWorkbook {
    sheets: Vec<YamlSheet>,
}

#[derive(Deserialize)]
struct YamlSheet {
    name: String,
    #[serde(default)]
    rows: Vec<Vec<serde_yaml::Value>>,
}

/// Scalars are stringified the way a spreadsheet would display them.
fn yaml_cell(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(true) => "TRUE".into(),
        serde_yaml::Value::Bool(false) => "FALSE".into(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a workbook file, choosing the decoder by extension.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" => xlsx::read_workbook(path),
            "yaml" | "yml" => Self::from_yaml(&std::fs::read_to_string(path)?),
            other => Err(AppError::Workbook(format!(
                "unsupported workbook extension '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Parse the YAML fixture format: `sheets: [{ name, rows: [[cell, ...]] }]`.
    /// Rows are numbered from 1, columns from A; `~` leaves a cell empty.
    pub fn from_yaml(text: &str) -> Result<Self, AppError> {
        let parsed: YamlWorkbook = serde_yaml::from_str(text)?;
        let mut workbook = Self::new();
        for sheet in parsed.sheets {
            let rows = sheet
                .rows
                .into_iter()
                .map(|r| r.into_iter().map(yaml_cell).collect())
                .collect();
            workbook.add_sheet_rows(&sheet.name, rows);
        }
        Ok(workbook)
    }

    /// Append a sheet from dense rows. Row `i` becomes row number `i + 1`.
    pub fn add_sheet_rows(&mut self, name: &str, rows: Vec<Vec<String>>) {
        let mut sheet = Sheet {
            name: name.to_string(),
            rows: BTreeMap::new(),
        };
        for (r, row) in rows.into_iter().enumerate() {
            let cells = row
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_empty())
                .map(|(c, v)| (column_letters(c), v))
                .collect();
            sheet.rows.insert(r as u32 + 1, cells);
        }
        self.sheets.push(sheet);
    }

    /// Set one cell, creating the sheet and row as needed.
    pub fn set_cell(&mut self, sheet: &str, address: &str, value: String) -> Result<(), AppError> {
        let (col, row) = split_address(address)
            .ok_or_else(|| AppError::Workbook(format!("invalid cell address '{}'", address)))?;
        self.sheet_mut(sheet).rows.entry(row).or_default().insert(col, value);
        Ok(())
    }

    /// Register a sheet (and optionally an empty row of it) that has no cell values.
    pub(crate) fn touch_row(&mut self, sheet: &str, row: Option<u32>) {
        let sheet = self.sheet_mut(sheet);
        if let Some(row) = row {
            sheet.rows.entry(row).or_default();
        }
    }

    fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sheets.push(Sheet {
                    name: name.to_string(),
                    rows: BTreeMap::new(),
                });
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

impl CellSource for Workbook {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet(sheet).is_some()
    }

    fn row_numbers(&self, sheet: &str) -> Vec<u32> {
        self.sheet(sheet)
            .map(|s| s.rows.keys().copied().collect())
            .unwrap_or_default()
    }

    fn cell_value(&self, sheet: &str, address: &str) -> String {
        let Some((col, row)) = split_address(address) else {
            return String::new();
        };
        self.sheet(sheet)
            .and_then(|s| s.rows.get(&row))
            .and_then(|cells| cells.get(&col))
            .cloned()
            .unwrap_or_default()
    }
}
