//! Conversation driver and verifier.
//!
//! Replays one path against a transport session:
//!
//! ```text
//! Idle → SessionStarted → (SendTurn → AwaitReply → Matched | Mismatch | TimedOut)* → Passed | Failed
//! ```
//!
//! Every path gets its own session, client activity id and watermark, so
//! alternative branches can never see each other's replies.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use super::compare::replies_match;
use super::polling::{poll_with_timeout, PollOutcome};
use super::render::render_activity;
use super::template::{resolve, ResolveError};
use crate::config::{PollingConfig, TimeoutPolicy};
use crate::script::{StepAction, TestCaseStep};
use crate::transport::{SessionId, Transport};

/// Reply fragments of one turn are joined with this before comparison.
const LINE_SEPARATOR: &str = "\n";

// ============================================================================
// Settings and results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverSettings {
    pub poll_interval: Duration,
    pub reply_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl From<&PollingConfig> for DriverSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            poll_interval: config.interval(),
            reply_timeout: config.reply_timeout(),
            timeout_policy: config.timeout_policy,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Final verdict for one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PathVerdict {
    Passed,
    /// The bot answered, but not with the expected text.
    Mismatch {
        step_number: i64,
        expected: String,
        actual: String,
    },
    /// The bot did not answer within the reply budget.
    TimedOut { step_number: i64, expected: String },
    /// The expected template referenced something this path does not have.
    Unresolved { step_number: i64, reason: String },
    /// The transport failed; says nothing about the bot's behaviour.
    TransportError {
        step_number: Option<i64>,
        message: String,
    },
}

impl PathVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, PathVerdict::Passed)
    }

    /// Script or infrastructure problem rather than a bot defect.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            PathVerdict::Unresolved { .. } | PathVerdict::TransportError { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathVerdict::Passed => "passed",
            PathVerdict::Mismatch { .. } => "mismatch",
            PathVerdict::TimedOut { .. } => "timed_out",
            PathVerdict::Unresolved { .. } => "unresolved",
            PathVerdict::TransportError { .. } => "transport_error",
        }
    }
}

/// Result of driving one path, handed to the runner and reporters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOutcome {
    pub case: String,
    pub path_number: u32,
    pub verdict: PathVerdict,
    /// Turns whose reply matched.
    pub turns_matched: usize,
    /// Turns that got no reply under `TimeoutPolicy::Ignore`.
    pub turns_unanswered: usize,
    pub duration_ms: u64,
}

// ============================================================================
// Per-path session state
// ============================================================================

struct PathSession {
    id: SessionId,
    client_activity_id: String,
    watermark: u64,
    turns_sent: u32,
}

impl PathSession {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            client_activity_id: format!("{}.{}", random_digits(12), random_digits(16)),
            watermark: 0,
            turns_sent: 0,
        }
    }

    fn correlation_token(&self) -> String {
        format!("{}.{}", self.client_activity_id, self.watermark)
    }

    /// Skip past our own echoed message on every turn but the first.
    fn after_send(&mut self) {
        if self.turns_sent > 0 {
            self.watermark += 1;
        }
        self.turns_sent += 1;
    }
}

fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

enum TurnOutcome {
    Matched,
    Unanswered,
    Failed(PathVerdict),
}

// ============================================================================
// Driver
// ============================================================================

pub struct ConversationDriver<'a> {
    transport: &'a dyn Transport,
    settings: DriverSettings,
}

impl<'a> ConversationDriver<'a> {
    pub fn new(transport: &'a dyn Transport, settings: DriverSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Replay every action of `path` in a fresh session and verify each reply.
    #[tracing::instrument(skip_all, fields(case = %case, path = path.number))]
    pub async fn run_path(&self, case: &str, path: &TestCaseStep) -> PathOutcome {
        let started = Instant::now();
        let mut outcome = PathOutcome {
            case: case.to_string(),
            path_number: path.number,
            verdict: PathVerdict::Passed,
            turns_matched: 0,
            turns_unanswered: 0,
            duration_ms: 0,
        };

        let mut session = match self.transport.start_session().await {
            Ok(id) => PathSession::new(id),
            Err(e) => {
                tracing::warn!("Could not start session: {}", e);
                outcome.verdict = PathVerdict::TransportError {
                    step_number: None,
                    message: e.to_string(),
                };
                outcome.duration_ms = started.elapsed().as_millis() as u64;
                return outcome;
            }
        };
        tracing::debug!(session = %session.id, "Session started");

        for (i, action) in path.actions.iter().enumerate() {
            match self.run_turn(&mut session, &path.actions[..=i], action).await {
                TurnOutcome::Matched => outcome.turns_matched += 1,
                TurnOutcome::Unanswered => outcome.turns_unanswered += 1,
                TurnOutcome::Failed(verdict) => {
                    outcome.verdict = verdict;
                    break;
                }
            }
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn run_turn(
        &self,
        session: &mut PathSession,
        history: &[StepAction],
        action: &StepAction,
    ) -> TurnOutcome {
        let step_number = action.step_number;

        // Resolved before sending so a bad reference surfaces even when the bot is silent.
        let expected = match resolve(history, &action.expected_response) {
            Ok(text) => text,
            Err(e) => return TurnOutcome::Failed(unresolved(step_number, &e)),
        };

        let token = session.correlation_token();

        if let Err(e) = self
            .transport
            .post_message(&session.id, &action.input, &token)
            .await
        {
            tracing::warn!(step = step_number, "Post failed: {}", e);
            return TurnOutcome::Failed(PathVerdict::TransportError {
                step_number: Some(step_number),
                message: e.to_string(),
            });
        }
        session.after_send();
        tracing::debug!(step = step_number, watermark = session.watermark, input = %action.input, "Turn sent");

        let polled = {
            let transport = self.transport;
            let id = &session.id;
            let watermark = session.watermark;
            poll_with_timeout(
                self.settings.poll_interval,
                self.settings.reply_timeout,
                move || transport.list_activities_since(id, watermark),
            )
            .await
        };

        let activities = match polled {
            Ok(PollOutcome::Replied(activities)) => activities,
            Ok(PollOutcome::TimedOut) => return self.on_timeout(step_number, expected),
            Err(e) => {
                tracing::warn!(step = step_number, "Polling failed: {}", e);
                return TurnOutcome::Failed(PathVerdict::TransportError {
                    step_number: Some(step_number),
                    message: e.to_string(),
                });
            }
        };

        session.watermark += activities.len() as u64;
        let actual = activities
            .iter()
            .filter_map(render_activity)
            .collect::<Vec<_>>()
            .join(LINE_SEPARATOR);

        if replies_match(&expected, &actual) {
            tracing::debug!(step = step_number, "Reply matched");
            TurnOutcome::Matched
        } else {
            tracing::info!(step = step_number, expected = %expected, actual = %actual, "Reply mismatch");
            TurnOutcome::Failed(PathVerdict::Mismatch {
                step_number,
                expected,
                actual,
            })
        }
    }

    fn on_timeout(&self, step_number: i64, expected: String) -> TurnOutcome {
        match self.settings.timeout_policy {
            TimeoutPolicy::Ignore => {
                tracing::warn!(
                    step = step_number,
                    timeout_ms = self.settings.reply_timeout.as_millis() as u64,
                    "No reply, continuing (timeout_policy = ignore)"
                );
                TurnOutcome::Unanswered
            }
            TimeoutPolicy::Fail => {
                tracing::info!(step = step_number, "No reply within budget");
                TurnOutcome::Failed(PathVerdict::TimedOut {
                    step_number,
                    expected,
                })
            }
        }
    }
}

fn unresolved(step_number: i64, err: &ResolveError) -> PathVerdict {
    tracing::warn!(step = step_number, "Unresolved template reference: {}", err);
    PathVerdict::Unresolved {
        step_number,
        reason: err.to_string(),
    }
}
