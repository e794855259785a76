//! Engine Configuration
//!
//! Configuration values are loaded with the following priority (highest
//! first):
//! 1. Environment variables (`REVEAL_*`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! The configuration file follows the XDG Base Directory layout:
//! `$XDG_CONFIG_HOME/reveal/reveal.toml` (typically
//! `~/.config/reveal/reveal.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [reveal]
//! interval_ms = 15
//! history_turns = 5
//!
//! [answers]
//! url = "http://localhost:8787"
//! request_timeout_ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notice shown in place of a reply when the answer service fails.
pub const DEFAULT_ERROR_NOTICE: &str =
    "Something went wrong while generating a reply. Please try again.";

/// Notice shown when the answer service returns no usable text.
pub const DEFAULT_EMPTY_REPLY_NOTICE: &str =
    "The assistant returned an empty reply. Please try again.";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Reveal section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Per-character reveal cadence in milliseconds
    pub interval_ms: Option<u64>,
    /// History window size in user/assistant pairs
    pub history_turns: Option<usize>,
}

/// Answer service section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswersToml {
    /// Service base URL
    pub url: Option<String>,
    /// Explicit request timeout in milliseconds. Absent means the call has
    /// no cutoff other than user cancellation.
    pub request_timeout_ms: Option<u64>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Reveal cadence and history settings
    pub reveal: RevealToml,
    /// Answer service settings
    pub answers: AnswersToml,
}

/// Engine configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Per-character reveal cadence
    pub reveal_interval: Duration,
    /// History window, in user/assistant pairs
    pub history_turns: usize,
    /// Answer service base URL
    pub answer_url: String,
    /// Explicit request timeout. `None` (the default) means user
    /// cancellation is the only cutoff; this stays an explicit policy knob
    /// rather than an implied behavior.
    pub request_timeout: Option<Duration>,
    /// Notice shown for failed turns
    pub error_notice: String,
    /// Notice shown for empty replies
    pub empty_reply_notice: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reveal_interval: Duration::from_millis(15),
            history_turns: 5,
            answer_url: "http://localhost:8787".to_string(),
            request_timeout: None,
            error_notice: DEFAULT_ERROR_NOTICE.to_string(),
            empty_reply_notice: DEFAULT_EMPTY_REPLY_NOTICE.to_string(),
        }
    }
}

impl ChatConfig {
    /// Create configuration from environment variables over defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Fold a parsed TOML file into this configuration.
    #[must_use]
    pub fn apply_file(mut self, file: &ChatToml) -> Self {
        if let Some(ms) = file.reveal.interval_ms {
            self.reveal_interval = Duration::from_millis(ms);
        }
        if let Some(turns) = file.reveal.history_turns {
            self.history_turns = turns;
        }
        if let Some(ref url) = file.answers.url {
            self.answer_url = url.clone();
        }
        if let Some(ms) = file.answers.request_timeout_ms {
            self.request_timeout = Some(Duration::from_millis(ms));
        }
        self
    }

    /// Fold environment variables into this configuration.
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>("REVEAL_INTERVAL_MS") {
            self.reveal_interval = Duration::from_millis(ms);
        }
        if let Some(turns) = env_parse::<usize>("REVEAL_HISTORY_TURNS") {
            self.history_turns = turns;
        }
        if let Ok(url) = std::env::var("REVEAL_ANSWER_URL") {
            self.answer_url = url;
        }
        if let Some(ms) = env_parse::<u64>("REVEAL_REQUEST_TIMEOUT_MS") {
            self.request_timeout = Some(Duration::from_millis(ms));
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Default XDG path of the configuration file.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reveal").join("reveal.toml"))
}

/// Load configuration from the given file (or the default path), then
/// apply environment overrides.
///
/// A missing file is not an error; the file layer is simply skipped.
pub fn load_config(path: Option<&Path>) -> Result<ChatConfig, ConfigError> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let mut config = ChatConfig::default();

    if let Some(path) = path {
        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
                path: path.clone(),
                source,
            })?;
            let file: ChatToml = toml::from_str(&raw)?;
            tracing::debug!(path = %path.display(), "Loaded configuration file");
            config = config.apply_file(&file);
        }
    }

    Ok(config.apply_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.reveal_interval, Duration::from_millis(15));
        assert_eq!(config.history_turns, 5);
        assert_eq!(config.answer_url, "http://localhost:8787");
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.error_notice, DEFAULT_ERROR_NOTICE);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file: ChatToml = toml::from_str(
            r#"
            [reveal]
            interval_ms = 30
            history_turns = 3

            [answers]
            url = "http://answers.internal:9000"
            request_timeout_ms = 1500
            "#,
        )
        .unwrap();

        let config = ChatConfig::default().apply_file(&file);
        assert_eq!(config.reveal_interval, Duration::from_millis(30));
        assert_eq!(config.history_turns, 3);
        assert_eq!(config.answer_url, "http://answers.internal:9000");
        assert_eq!(config.request_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file: ChatToml = toml::from_str(
            r#"
            [reveal]
            interval_ms = 8
            "#,
        )
        .unwrap();

        let config = ChatConfig::default().apply_file(&file);
        assert_eq!(config.reveal_interval, Duration::from_millis(8));
        assert_eq!(config.history_turns, 5);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_load_config_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reveal.toml");
        std::fs::write(
            &path,
            "[reveal]\nhistory_turns = 9\n\n[answers]\nurl = \"http://box:1\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.history_turns, 9);
        assert_eq!(config.answer_url, "http://box:1");
    }

    #[test]
    fn test_load_config_missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.history_turns, ChatConfig::default().history_turns);
    }

    #[test]
    fn test_load_config_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reveal.toml");
        std::fs::write(&path, "this is not toml [[").unwrap();

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
