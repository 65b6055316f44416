//! Run reporting: live console output and the optional JSON report file.

use std::io::{IsTerminal, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use crossterm::style::Stylize;
use serde::Serialize;

use crate::engine::driver::{PathOutcome, PathVerdict};
use crate::engine::orchestrator::SuiteSummary;
use crate::error::AppError;
use crate::script::entities::render_entity;
use crate::script::{TestCase, TestCaseStep, TestSuite};

const SEPARATOR: &str = "*******";

/// Hooks the suite runner calls around each path.
pub trait Reporter {
    fn path_started(&mut self, case: &TestCase, path: &TestCaseStep);
    fn path_finished(&mut self, outcome: &PathOutcome);
    fn suite_finished(&mut self, summary: &SuiteSummary);
}

// ============================================================================
// Console
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Plain,
    Pass,
    Fail,
}

/// Human-readable progress. Diagnostics go through `tracing` on stderr; this
/// writes the run transcript to stdout.
///
/// Pass lines are green and failures red when colour is on.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleReporter<std::io::Stdout> {
    /// Colour is enabled only when stdout is a terminal.
    pub fn stdout() -> Self {
        let color = std::io::stdout().is_terminal();
        Self::new(std::io::stdout()).with_color(color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, color: false }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        self.styled_line(text, Tone::Plain);
    }

    fn styled_line(&mut self, text: &str, tone: Tone) {
        let written = match (self.color, tone) {
            (true, Tone::Pass) => writeln!(self.out, "{}", text.green()),
            (true, Tone::Fail) => writeln!(self.out, "{}", text.red()),
            _ => writeln!(self.out, "{}", text),
        };
        if let Err(e) = written {
            tracing::warn!("Console write failed: {}", e);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn path_started(&mut self, case: &TestCase, path: &TestCaseStep) {
        self.line(&format!(
            "Starting test case: {} {}",
            case.sheet_name, path.number
        ));
    }

    fn path_finished(&mut self, outcome: &PathOutcome) {
        let (case, number) = (&outcome.case, outcome.path_number);
        let tone = if outcome.verdict.is_pass() {
            Tone::Pass
        } else {
            Tone::Fail
        };
        let text = match &outcome.verdict {
            PathVerdict::Passed => format!("Test case passed: {} {}", case, number),
            PathVerdict::Mismatch {
                step_number,
                expected,
                actual,
            } => format!(
                "Failure: {} {}, step: {}\nExpected output: {}\nActual output: {}",
                case,
                number,
                step_number,
                expected.to_lowercase(),
                actual.to_lowercase().replace("\r\n", "\n")
            ),
            PathVerdict::TimedOut {
                step_number,
                expected,
            } => format!(
                "Failure: {} {}, step: {}\nExpected output: {}\nNo reply received",
                case,
                number,
                step_number,
                expected.to_lowercase()
            ),
            PathVerdict::Unresolved {
                step_number,
                reason,
            } => format!(
                "Script error: {} {}, step: {}: {}",
                case, number, step_number, reason
            ),
            PathVerdict::TransportError {
                step_number: Some(step),
                message,
            } => format!(
                "Transport error: {} {}, step: {}: {}",
                case, number, step, message
            ),
            PathVerdict::TransportError {
                step_number: None,
                message,
            } => format!("Transport error: {} {}: {}", case, number, message),
        };
        self.styled_line(&text, tone);
        self.line(SEPARATOR);
    }

    fn suite_finished(&mut self, summary: &SuiteSummary) {
        self.line("");
        self.styled_line(&format!("Passed: {}", summary.passed), Tone::Pass);
        self.styled_line(&format!("Failed: {}", summary.failed), Tone::Fail);
        if summary.errored > 0 {
            self.styled_line(&format!("Errored: {}", summary.errored), Tone::Fail);
        }
    }
}

/// Readable listing of every expanded path, used by `botcheck plan`.
pub fn format_plan(suite: &TestSuite) -> String {
    let mut out = String::new();
    for case in &suite.test_cases {
        out.push_str(&format!("{} ({})\n", case.sheet_name, case.description));
        for path in &case.steps {
            out.push_str(&format!("  path {}\n", path.number));
            for action in &path.actions {
                let marker = if action.first_in_order { ' ' } else { '~' };
                out.push_str(&format!(
                    "   {}{:>3}  {} => {}",
                    marker, action.step_number, action.input, action.expected_response
                ));
                if !action.entities.is_empty() {
                    let entities: Vec<String> = action.entities.iter().map(render_entity).collect();
                    out.push_str(&format!("  {}", entities.join(" ")));
                }
                out.push('\n');
            }
        }
    }
    out.push_str(&format!(
        "{} case(s), {} path(s)\n",
        suite.test_cases.len(),
        suite.path_count()
    ));
    out
}

// ============================================================================
// JSON report
// ============================================================================

/// Everything known about one invocation, written once at the end.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub test_case_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a SuiteSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a AppError>,
}

impl<'a> RunReport<'a> {
    pub fn completed(test_case_file: Option<&Path>, summary: &'a SuiteSummary) -> Self {
        Self {
            generated_at: Utc::now(),
            test_case_file: test_case_file.map(|p| p.display().to_string()),
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failed(test_case_file: Option<&Path>, error: &'a AppError) -> Self {
        Self {
            generated_at: Utc::now(),
            test_case_file: test_case_file.map(|p| p.display().to_string()),
            summary: None,
            error: Some(error),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Wrote JSON report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(verdict: PathVerdict) -> PathOutcome {
        PathOutcome {
            case: "Greeting".into(),
            path_number: 2,
            verdict,
            turns_matched: 1,
            turns_unanswered: 0,
            duration_ms: 12,
        }
    }

    fn transcript(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_console_pass_and_summary() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        let case = TestCase {
            sheet_name: "Greeting".into(),
            description: "hello flow".into(),
            steps: vec![],
        };
        reporter.path_started(&case, &TestCaseStep::new(2));
        reporter.path_finished(&outcome(PathVerdict::Passed));
        reporter.suite_finished(&SuiteSummary {
            passed: 1,
            ..Default::default()
        });
        assert_eq!(
            transcript(reporter),
            "Starting test case: Greeting 2\nTest case passed: Greeting 2\n*******\n\nPassed: 1\nFailed: 0\n"
        );
    }

    #[test]
    fn test_console_colors_verdicts_when_enabled() {
        let mut reporter = ConsoleReporter::new(Vec::new()).with_color(true);
        reporter.path_finished(&outcome(PathVerdict::Passed));
        reporter.path_finished(&outcome(PathVerdict::TimedOut {
            step_number: 1,
            expected: "hello".into(),
        }));
        let text = transcript(reporter);
        assert!(text.contains("Test case passed: Greeting 2"));
        assert!(text.contains("Failure: Greeting 2, step: 1"));
        if std::env::var_os("NO_COLOR").is_none() {
            assert!(text.contains(&format!("{}", "Test case passed: Greeting 2".green())));
            assert!(text.contains("\x1b["));
        }
    }

    #[test]
    fn test_console_plain_without_color() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.path_finished(&outcome(PathVerdict::Passed));
        reporter.suite_finished(&SuiteSummary::default());
        assert!(!transcript(reporter).contains('\x1b'));
    }

    #[test]
    fn test_console_mismatch_block() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.path_finished(&outcome(PathVerdict::Mismatch {
            step_number: 2,
            expected: "See you hi".into(),
            actual: "Goodbye\r\nnow".into(),
        }));
        let text = transcript(reporter);
        assert!(text.contains("Failure: Greeting 2, step: 2"));
        assert!(text.contains("Expected output: see you hi\n"));
        assert!(text.contains("Actual output: goodbye\nnow\n"));
    }

    #[test]
    fn test_console_reports_errors_separately() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.path_finished(&outcome(PathVerdict::Unresolved {
            step_number: 3,
            reason: "'${7}' refers to step 7".into(),
        }));
        reporter.suite_finished(&SuiteSummary {
            errored: 1,
            ..Default::default()
        });
        let text = transcript(reporter);
        assert!(text.contains("Script error: Greeting 2, step: 3"));
        assert!(text.ends_with("Errored: 1\n"));
    }

    #[test]
    fn test_plan_listing_marks_alternatives() {
        let rows = vec![
            crate::script::tree::ScriptRow {
                step_number: "1".into(),
                input: "hi".into(),
                expected_response: "hello".into(),
                ..Default::default()
            },
            crate::script::tree::ScriptRow {
                input: "hey there".into(),
                expected_response: "hello".into(),
                entities: "{2,there}".into(),
                ..Default::default()
            },
        ];
        let suite = TestSuite {
            test_cases: vec![TestCase {
                sheet_name: "Greeting".into(),
                description: "hello flow".into(),
                steps: crate::script::build_paths("Greeting", &rows).unwrap(),
            }],
        };
        let listing = format_plan(&suite);
        assert!(listing.starts_with("Greeting (hello flow)\n  path 1\n"));
        assert!(listing.contains("      1  hi => hello\n"));
        assert!(listing.contains("  path 2\n   ~  1  hey there => hello  {2,there}\n"));
        assert!(listing.ends_with("1 case(s), 2 path(s)\n"));
    }

    #[test]
    fn test_json_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = SuiteSummary {
            passed: 0,
            failed: 1,
            errored: 0,
            duration_ms: 40,
            outcomes: vec![outcome(PathVerdict::TimedOut {
                step_number: 1,
                expected: "hello".into(),
            })],
        };
        RunReport::completed(Some(Path::new("cases.xlsx")), &summary)
            .write_to(&path)
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["testCaseFile"], "cases.xlsx");
        assert_eq!(json["summary"]["failed"], 1);
        assert_eq!(json["summary"]["outcomes"][0]["pathNumber"], 2);
        assert_eq!(json["summary"]["outcomes"][0]["verdict"]["status"], "timed_out");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_json_report_for_setup_error() {
        let err = AppError::Workbook("no Index sheet".into());
        let report = RunReport::failed(None, &err);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error"]["kind"], "workbook");
        assert!(json.get("summary").is_none());
    }
}
