//! Runner configuration.
//!
//! Loaded once at startup from a TOML file (default `botcheck.toml` in the
//! working directory, optional), then overridden from the environment
//! (`.env` is honoured via dotenvy) and finally from CLI flags. The resulting
//! [`RunnerConfig`] is passed explicitly to everything that needs it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_CONFIG_FILE: &str = "botcheck.toml";
pub const DEFAULT_DIRECT_LINE_URL: &str = "https://directline.botframework.com";

pub const ENV_SECRET: &str = "BOTCHECK_DIRECT_LINE_SECRET";
pub const ENV_BASE_URL: &str = "BOTCHECK_BASE_URL";
pub const ENV_TEST_CASE_FILE: &str = "BOTCHECK_TEST_CASE_FILE";

/// What to do when a turn gets no reply within the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// The path fails at the silent turn.
    #[default]
    Fail,
    /// Log and move on to the next turn without a verdict.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectLineConfig {
    pub base_url: String,
    /// Never written back out.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for DirectLineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DIRECT_LINE_URL.into(),
            secret: None,
            request_timeout_secs: 30,
        }
    }
}

/// Envelope fields stamped on every outbound activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityProfile {
    pub channel_id: String,
    pub message_type: String,
    pub locale: String,
    pub bot_id: String,
    pub bot_name: String,
    pub service_url: String,
    pub from_id: String,
    pub from_name: String,
}

impl Default for ActivityProfile {
    fn default() -> Self {
        Self {
            channel_id: "directline".into(),
            message_type: "message".into(),
            locale: "en-US".into(),
            bot_id: String::new(),
            bot_name: String::new(),
            service_url: String::new(),
            from_id: "tester".into(),
            from_name: "tester".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub reply_timeout_ms: u64,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            reply_timeout_ms: 15_000,
            timeout_policy: TimeoutPolicy::Fail,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub test_case_file: Option<PathBuf>,
    pub direct_line: DirectLineConfig,
    pub activity: ActivityProfile,
    pub polling: PollingConfig,
}

impl RunnerConfig {
    /// Load from an explicit file, or from `botcheck.toml` if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(secret) = get(ENV_SECRET) {
            self.direct_line.secret = Some(secret);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.direct_line.base_url = url;
        }
        if let Some(file) = get(ENV_TEST_CASE_FILE) {
            self.test_case_file = Some(PathBuf::from(file));
        }
    }

    /// Check what a live run needs.
    pub fn validate_for_run(&self) -> Result<(), AppError> {
        if self.test_case_file.is_none() {
            return Err(AppError::Config(format!(
                "no test case file: set test_case_file, {} or --cases",
                ENV_TEST_CASE_FILE
            )));
        }
        if self.direct_line.secret.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::Config(format!(
                "no Direct Line secret: set direct_line.secret or {}",
                ENV_SECRET
            )));
        }
        if self.polling.interval_ms == 0 {
            return Err(AppError::Config("polling.interval_ms must be > 0".into()));
        }
        url::Url::parse(&self.direct_line.base_url).map_err(|e| {
            AppError::Config(format!(
                "invalid direct_line.base_url '{}': {}",
                self.direct_line.base_url, e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.direct_line.base_url, DEFAULT_DIRECT_LINE_URL);
        assert_eq!(config.polling.interval(), Duration::from_secs(1));
        assert_eq!(config.polling.reply_timeout(), Duration::from_secs(15));
        assert_eq!(config.polling.timeout_policy, TimeoutPolicy::Fail);
        assert_eq!(config.activity.from_id, "tester");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RunnerConfig::from_toml(
            r#"
test_case_file = "cases.xlsx"

[direct_line]
secret = "s3cret"

[activity]
locale = "en-GB"
bot_id = "weather-bot"

[polling]
reply_timeout_ms = 5000
timeout_policy = "ignore"
"#,
        )
        .unwrap();
        assert_eq!(config.test_case_file, Some(PathBuf::from("cases.xlsx")));
        assert_eq!(config.direct_line.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.direct_line.request_timeout_secs, 30);
        assert_eq!(config.activity.locale, "en-GB");
        assert_eq!(config.activity.message_type, "message");
        assert_eq!(config.polling.interval_ms, 1_000);
        assert_eq!(config.polling.reply_timeout_ms, 5_000);
        assert_eq!(config.polling.timeout_policy, TimeoutPolicy::Ignore);
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let err = RunnerConfig::from_toml("[polling]\ninterval_ms = \"fast\"").unwrap_err();
        assert_eq!(err.kind(), "toml");
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let mut config = RunnerConfig::default();
        config.direct_line.secret = Some("s3cret".into());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SECRET, "from-env"),
            (ENV_BASE_URL, "http://localhost:3978"),
            (ENV_TEST_CASE_FILE, ""),
        ]
        .into_iter()
        .collect();
        let mut config = RunnerConfig::default();
        config.test_case_file = Some(PathBuf::from("file.xlsx"));
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.direct_line.secret.as_deref(), Some("from-env"));
        assert_eq!(config.direct_line.base_url, "http://localhost:3978");
        assert_eq!(config.test_case_file, Some(PathBuf::from("file.xlsx")));
    }

    #[test]
    fn test_validate_for_run() {
        let mut config = RunnerConfig::default();
        assert!(config.validate_for_run().is_err());
        config.test_case_file = Some(PathBuf::from("cases.xlsx"));
        assert!(config.validate_for_run().is_err());
        config.direct_line.secret = Some("s".into());
        assert!(config.validate_for_run().is_ok());
        config.polling.interval_ms = 0;
        assert!(config.validate_for_run().is_err());
        config.polling.interval_ms = 10;
        config.direct_line.base_url = "not a url".into();
        assert!(config.validate_for_run().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botcheck.toml");
        std::fs::write(&path, "[polling]\ninterval_ms = 250\n").unwrap();
        let config = RunnerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.polling.interval_ms, 250);

        let missing = dir.path().join("nope.toml");
        assert_eq!(RunnerConfig::load(Some(&missing)).unwrap_err().kind(), "config");
    }
}
