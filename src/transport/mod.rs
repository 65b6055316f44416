//! Bot messaging transport.
//!
//! The driver needs exactly three operations from a chat channel: open a
//! conversation, post a user message into it, and list the activities that
//! arrived after a watermark. [`Transport`] captures that seam;
//! [`directline::DirectLineClient`] implements it over the Bot Framework
//! Direct Line REST API.

pub mod directline;
#[cfg(test)]
pub mod scripted;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

/// Identifier of one open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user or bot account on the channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Rich content attached to an activity (cards, media).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// One inbound activity as listed by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

impl Activity {
    /// Plain text message activity.
    pub fn message(text: &str) -> Self {
        Self {
            activity_type: "message".into(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Chat channel used to drive a bot conversation.
///
/// Sessions must be independent: activities posted in one session never show
/// up when listing another.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a fresh conversation.
    async fn start_session(&self) -> Result<SessionId, AppError>;

    /// Post one user message. `correlation_token` is echoed back by the bot
    /// framework so replies can be matched to the turn that caused them.
    async fn post_message(
        &self,
        session: &SessionId,
        text: &str,
        correlation_token: &str,
    ) -> Result<(), AppError>;

    /// Activities that arrived after `watermark`, oldest first.
    async fn list_activities_since(
        &self,
        session: &SessionId,
        watermark: u64,
    ) -> Result<Vec<Activity>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_deserializes_direct_line_shape() {
        let json = serde_json::json!({
            "type": "message",
            "id": "abc|0000001",
            "text": "Pick one",
            "from": { "id": "bot", "name": "Weather Bot" },
            "attachments": [{
                "contentType": "application/vnd.microsoft.card.hero",
                "content": { "text": "Pick one", "buttons": [] }
            }],
            "channelData": { "ignored": true }
        });
        let activity: Activity = serde_json::from_value(json).unwrap();
        assert_eq!(activity.activity_type, "message");
        assert_eq!(activity.from.unwrap().name.as_deref(), Some("Weather Bot"));
        assert_eq!(activity.attachments.len(), 1);
        assert_eq!(
            activity.attachments[0].content_type,
            "application/vnd.microsoft.card.hero"
        );
    }

    #[test]
    fn test_null_or_missing_attachments_are_empty() {
        let a: Activity = serde_json::from_str(r#"{"type":"typing","attachments":null}"#).unwrap();
        assert!(a.attachments.is_empty());
        let b: Activity = serde_json::from_str(r#"{"type":"message","text":"hi"}"#).unwrap();
        assert!(b.attachments.is_empty());
        assert_eq!(b, Activity::message("hi"));
    }
}
