//! Suite orchestrator: runs every path of every case, one at a time, and
//! folds the outcomes into a [`SuiteSummary`].

use std::time::Instant;

use serde::Serialize;

use super::driver::{ConversationDriver, DriverSettings, PathOutcome};
use crate::report::Reporter;
use crate::script::TestSuite;
use crate::transport::Transport;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub passed: usize,
    /// Mismatched or unanswered replies.
    pub failed: usize,
    /// Unresolved references and transport errors.
    pub errored: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<PathOutcome>,
}

impl SuiteSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    fn record(&mut self, outcome: PathOutcome) {
        if outcome.verdict.is_pass() {
            self.passed += 1;
        } else if outcome.verdict.is_error() {
            self.errored += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

pub struct SuiteRunner<'a> {
    driver: ConversationDriver<'a>,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(transport: &'a dyn Transport, settings: DriverSettings) -> Self {
        Self {
            driver: ConversationDriver::new(transport, settings),
        }
    }

    /// Run cases in suite order and paths in number order, sequentially.
    pub async fn run(&self, suite: &TestSuite, reporter: &mut dyn Reporter) -> SuiteSummary {
        let started = Instant::now();
        let mut summary = SuiteSummary::default();
        tracing::info!(
            cases = suite.test_cases.len(),
            paths = suite.path_count(),
            "Running suite"
        );

        for case in &suite.test_cases {
            for path in &case.steps {
                reporter.path_started(case, path);
                let outcome = self.driver.run_path(&case.sheet_name, path).await;
                reporter.path_finished(&outcome);
                summary.record(outcome);
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            errored = summary.errored,
            duration_ms = summary.duration_ms,
            "Suite finished"
        );
        reporter.suite_finished(&summary);
        summary
    }
}
