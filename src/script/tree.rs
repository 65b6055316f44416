//! Scenario tree expansion.
//!
//! A case sheet lists turns top to bottom. A row with a step number is the
//! primary turn at that position and extends every path built so far. A row
//! with a blank step number is an alternative utterance for the most recent
//! step: each path that took the primary turn there is forked, and the fork
//! says the alternative instead.

use super::entities::parse_entities;
use super::{ScriptError, StepAction, TestCaseStep};
use crate::workbook::CellSource;

/// One data row of a case sheet, columns A–D.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptRow {
    pub row: u32,
    pub step_number: String,
    pub input: String,
    pub expected_response: String,
    pub entities: String,
}

impl ScriptRow {
    fn is_blank(&self) -> bool {
        self.step_number.trim().is_empty()
            && self.input.is_empty()
            && self.expected_response.is_empty()
            && self.entities.is_empty()
    }
}

/// Read the data rows of a case sheet, skipping the header row.
pub fn read_rows(source: &dyn CellSource, sheet: &str) -> Vec<ScriptRow> {
    source
        .row_numbers(sheet)
        .into_iter()
        .filter(|&r| r != 1)
        .map(|r| ScriptRow {
            row: r,
            step_number: source.cell_value(sheet, &format!("A{}", r)),
            input: source.cell_value(sheet, &format!("B{}", r)),
            expected_response: source.cell_value(sheet, &format!("C{}", r)),
            entities: source.cell_value(sheet, &format!("D{}", r)),
        })
        .collect()
}

/// Read a case sheet and expand it into its conversation paths.
pub fn build_case_paths(
    source: &dyn CellSource,
    sheet: &str,
) -> Result<Vec<TestCaseStep>, ScriptError> {
    if !source.has_sheet(sheet) {
        return Err(ScriptError::MissingSheet(sheet.to_string()));
    }
    build_paths(sheet, &read_rows(source, sheet))
}

/// Step numbers are integers; spreadsheets may hand back `3.0` for a numeric cell.
fn parse_step_number(sheet: &str, row: &ScriptRow) -> Result<i64, ScriptError> {
    let raw = row.step_number.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(ScriptError::InvalidStepNumber {
            sheet: sheet.to_string(),
            row: row.row,
            value: row.step_number.clone(),
        }),
    }
}

/// Expand script rows into every linear conversation path.
///
/// Path 1 is the primary trunk; forks are numbered in creation order from 2.
/// Forks made by an alternative row join the path set immediately, so later
/// primary and alternative rows extend and fork them like any other path.
pub fn build_paths(sheet: &str, rows: &[ScriptRow]) -> Result<Vec<TestCaseStep>, ScriptError> {
    let mut paths = vec![TestCaseStep::new(1)];
    let mut next_number = 2u32;
    let mut current_step: Option<i64> = None;

    for row in rows {
        if row.is_blank() {
            tracing::debug!(sheet, row = row.row, "Skipping blank script row");
            continue;
        }

        let entities = parse_entities(&row.entities);

        if !row.step_number.trim().is_empty() {
            let step_number = parse_step_number(sheet, row)?;
            current_step = Some(step_number);
            let action = StepAction {
                step_number,
                input: row.input.clone(),
                expected_response: row.expected_response.clone(),
                first_in_order: true,
                entities,
            };
            for path in paths.iter_mut() {
                path.actions.push(action.clone());
            }
            continue;
        }

        let Some(step_number) = current_step else {
            tracing::warn!(
                sheet,
                row = row.row,
                "Alternative row before any numbered step, skipping"
            );
            continue;
        };

        let action = StepAction {
            step_number,
            input: row.input.clone(),
            expected_response: row.expected_response.clone(),
            first_in_order: false,
            entities,
        };

        let forks: Vec<TestCaseStep> = paths
            .iter()
            .filter_map(|path| {
                let position = path.primary_position(step_number)?;
                let mut fork = path.clone();
                fork.actions.remove(position);
                fork.actions.push(action.clone());
                fork.number = next_number;
                next_number += 1;
                Some(fork)
            })
            .collect();

        if forks.is_empty() {
            tracing::warn!(sheet, row = row.row, step_number, "Alternative row matched no path");
        }
        paths.extend(forks);
    }

    tracing::debug!(sheet, paths = paths.len(), "Expanded script rows");
    Ok(paths)
}
