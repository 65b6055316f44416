//! Test script model and the loaders that build it from a workbook.
//!
//! A workbook holds an `Index` sheet listing test cases, plus one sheet per
//! case. Each case sheet is a flat list of turns in which blank step numbers
//! mark alternative utterances; [`tree::build_paths`] expands those into the
//! linear conversations the driver replays.

pub mod entities;
pub mod suite;
pub mod tree;

use serde::Serialize;

pub use entities::parse_entities;
pub use suite::load_suite;
pub use tree::build_paths;

// ============================================================================
// Model
// ============================================================================

/// All runnable test cases, in `Index` sheet order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn path_count(&self) -> usize {
        self.test_cases.iter().map(|c| c.steps.len()).sum()
    }
}

/// One script sheet and every conversation path expanded from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub sheet_name: String,
    pub description: String,
    pub steps: Vec<TestCaseStep>,
}

/// One complete linear conversation ("path") from the first turn to the last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseStep {
    /// Unique within the owning case; 1 is the primary trunk.
    pub number: u32,
    pub actions: Vec<StepAction>,
}

impl TestCaseStep {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            actions: Vec::new(),
        }
    }

    /// Position of the primary action scripted at `step_number`, if this path has one.
    pub fn primary_position(&self, step_number: i64) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| a.first_in_order && a.step_number == step_number)
    }
}

/// A single user turn and the reply expected for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAction {
    /// Script position; shared by a primary turn and its alternatives.
    pub step_number: i64,
    pub input: String,
    /// Reply template, may contain `${n}` / `${n-m}` back-references.
    pub expected_response: String,
    /// True for the primary turn, false for an alternative branch.
    pub first_in_order: bool,
    pub entities: Vec<Entity>,
}

/// An entity annotated on a user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub index: u32,
    pub name: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Structural problems in a case sheet. The loader drops the offending case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("sheet '{sheet}' row {row}: step number '{value}' is not an integer")]
    InvalidStepNumber { sheet: String, row: u32, value: String },

    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),
}
