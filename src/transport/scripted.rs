//! In-process transport with a scripted bot, for driver and runner tests.
//!
//! Each session keeps an activity log in which every posted user message is
//! echoed before the bot's replies. Listing returns the activities whose log
//! index is greater than the watermark, matching Direct Line's semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Activity, ChannelAccount, SessionId, Transport};
use crate::error::AppError;

type Responder = Box<dyn Fn(&str) -> Vec<Activity> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub session: SessionId,
    pub text: String,
    pub correlation_token: String,
}

#[derive(Default)]
struct ScriptedState {
    sessions_started: u32,
    logs: HashMap<SessionId, Vec<Activity>>,
    posts: Vec<PostRecord>,
    polls: Vec<(SessionId, u64)>,
}

pub struct ScriptedTransport {
    responder: Responder,
    failing_input: Option<String>,
    state: Mutex<ScriptedState>,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&str) -> Vec<Activity> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            failing_input: None,
            state: Mutex::new(ScriptedState::default()),
        }
    }

    /// Bot that answers each known input with one text message and ignores the rest.
    pub fn replying(pairs: &[(&str, &str)]) -> Self {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(move |input| {
            table
                .get(input)
                .map(|reply| vec![Activity::message(reply)])
                .unwrap_or_default()
        })
    }

    /// Posting this exact input fails with a transport error.
    pub fn with_failure_on(mut self, input: &str) -> Self {
        self.failing_input = Some(input.to_string());
        self
    }

    pub fn sessions_started(&self) -> u32 {
        self.state.lock().unwrap().sessions_started
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn polls(&self) -> Vec<(SessionId, u64)> {
        self.state.lock().unwrap().polls.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start_session(&self) -> Result<SessionId, AppError> {
        let mut state = self.state.lock().unwrap();
        state.sessions_started += 1;
        let session = SessionId(format!("session-{}", state.sessions_started));
        state.logs.insert(session.clone(), Vec::new());
        Ok(session)
    }

    async fn post_message(
        &self,
        session: &SessionId,
        text: &str,
        correlation_token: &str,
    ) -> Result<(), AppError> {
        if self.failing_input.as_deref() == Some(text) {
            return Err(AppError::Transport("502 Bad Gateway".into()));
        }
        let replies = (self.responder)(text);
        let mut state = self.state.lock().unwrap();
        state.posts.push(PostRecord {
            session: session.clone(),
            text: text.to_string(),
            correlation_token: correlation_token.to_string(),
        });
        let log = state
            .logs
            .get_mut(session)
            .ok_or_else(|| AppError::Transport(format!("unknown session {}", session)))?;
        let mut echo = Activity::message(text);
        echo.from = Some(ChannelAccount {
            id: "tester".into(),
            name: None,
        });
        log.push(echo);
        log.extend(replies);
        Ok(())
    }

    async fn list_activities_since(
        &self,
        session: &SessionId,
        watermark: u64,
    ) -> Result<Vec<Activity>, AppError> {
        let mut state = self.state.lock().unwrap();
        state.polls.push((session.clone(), watermark));
        let log = state
            .logs
            .get(session)
            .ok_or_else(|| AppError::Transport(format!("unknown session {}", session)))?;
        Ok(log
            .iter()
            .enumerate()
            .filter(|(i, _)| *i as u64 > watermark)
            .map(|(_, a)| a.clone())
            .collect())
    }
}
