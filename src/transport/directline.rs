use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Activity, ChannelAccount, SessionId, Transport};
use crate::config::{ActivityProfile, DirectLineConfig};
use crate::error::AppError;

// ============================================================================
// Helper
// ============================================================================

/// Convert any displayable error into `AppError::Transport`.
fn transport_err(e: impl std::fmt::Display) -> AppError {
    AppError::Transport(e.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct ActivitySet {
    #[serde(default)]
    activities: Vec<Activity>,
}

#[derive(Serialize)]
struct ConversationRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelData<'a> {
    client_activity_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundActivity<'a> {
    #[serde(rename = "type")]
    activity_type: &'a str,
    id: String,
    text: &'a str,
    channel_id: &'a str,
    timestamp: String,
    local_timestamp: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    service_url: &'a str,
    from: ChannelAccount,
    conversation: ConversationRef<'a>,
    recipient: ChannelAccount,
    locale: &'a str,
    channel_data: ChannelData<'a>,
}

// ============================================================================
// DirectLineClient
// ============================================================================

/// HTTP client for the Bot Framework Direct Line 3.0 REST API.
pub struct DirectLineClient {
    http: reqwest::Client,
    base_url: Url,
    secret: String,
    profile: ActivityProfile,
}

impl DirectLineClient {
    /// Create a client from the `[direct_line]` and `[activity]` config sections.
    ///
    /// The underlying `reqwest::Client` uses the configured request timeout.
    pub fn new(config: &DirectLineConfig, profile: ActivityProfile) -> Result<Self, AppError> {
        let secret = config
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("Direct Line secret is not set".into()))?;
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AppError::Config(format!("invalid Direct Line URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Direct Line URL '{}' cannot be used as a base",
                config.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(transport_err)?;

        Ok(Self {
            http,
            base_url,
            secret,
            profile,
        })
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    /// `{base}/v3/directline/conversations[/<extra>...]`, segments percent-encoded.
    fn conversations_url(&self, extra: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("invalid Direct Line URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["v3", "directline", "conversations"])
            .extend(extra);
        Ok(url)
    }

    fn authed(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.secret)
    }

    /// Send a request, check the status code, and deserialize the JSON response.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        req.send()
            .await
            .map_err(transport_err)?
            .error_for_status()
            .map_err(transport_err)?
            .json()
            .await
            .map_err(transport_err)
    }

    /// Send a request, check the status code, and discard the response body.
    async fn send_ok(&self, req: reqwest::RequestBuilder) -> Result<(), AppError> {
        req.send()
            .await
            .map_err(transport_err)?
            .error_for_status()
            .map_err(transport_err)?;
        Ok(())
    }

    fn outbound<'a>(
        &'a self,
        session: &'a SessionId,
        text: &'a str,
        correlation_token: &'a str,
    ) -> OutboundActivity<'a> {
        let profile = &self.profile;
        OutboundActivity {
            activity_type: &profile.message_type,
            id: uuid::Uuid::new_v4().simple().to_string(),
            text,
            channel_id: &profile.channel_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            local_timestamp: chrono::Local::now().to_rfc3339(),
            service_url: &profile.service_url,
            from: ChannelAccount {
                id: profile.from_id.clone(),
                name: Some(profile.from_name.clone()),
            },
            conversation: ConversationRef { id: &session.0 },
            recipient: ChannelAccount {
                id: profile.bot_id.clone(),
                name: Some(profile.bot_name.clone()).filter(|n| !n.is_empty()),
            },
            locale: &profile.locale,
            channel_data: ChannelData {
                client_activity_id: correlation_token,
            },
        }
    }
}

#[async_trait]
impl Transport for DirectLineClient {
    /// `POST /v3/directline/conversations`
    async fn start_session(&self) -> Result<SessionId, AppError> {
        let url = self.conversations_url(&[])?;
        let response: ConversationResponse = self
            .send_json(self.authed(reqwest::Method::POST, url))
            .await?;
        tracing::debug!(conversation_id = %response.conversation_id, "Direct Line conversation started");
        Ok(SessionId(response.conversation_id))
    }

    /// `POST /v3/directline/conversations/{id}/activities`
    async fn post_message(
        &self,
        session: &SessionId,
        text: &str,
        correlation_token: &str,
    ) -> Result<(), AppError> {
        let url = self.conversations_url(&[session.0.as_str(), "activities"])?;
        let body = self.outbound(session, text, correlation_token);
        self.send_ok(self.authed(reqwest::Method::POST, url).json(&body))
            .await
    }

    /// `GET /v3/directline/conversations/{id}/activities?watermark={n}`
    async fn list_activities_since(
        &self,
        session: &SessionId,
        watermark: u64,
    ) -> Result<Vec<Activity>, AppError> {
        let mut url = self.conversations_url(&[session.0.as_str(), "activities"])?;
        url.query_pairs_mut()
            .append_pair("watermark", &watermark.to_string());
        let set: ActivitySet = self
            .send_json(self.authed(reqwest::Method::GET, url))
            .await?;
        Ok(set.activities)
    }
}
