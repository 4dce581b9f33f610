//! Client configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags (see [`crate::cli`]).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ChatError, Result};
use crate::protocol::WireFormat;
use crate::session::SessionOptions;

/// Environment variable overriding [`ClientConfig::host`].
pub const ENV_HOST: &str = "ISSUE_CHAT_HOST";
/// Environment variable overriding [`ClientConfig::port`].
pub const ENV_PORT: &str = "ISSUE_CHAT_PORT";
/// Environment variable overriding [`ClientConfig::issue_id`].
pub const ENV_ISSUE: &str = "ISSUE_CHAT_ISSUE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// `ws` or `wss`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Conversation to join; becomes the last path segment of the address.
    pub issue_id: String,
    pub wire_format: WireFormat,
    /// Enables the suggested-reply channel.
    pub suggested_reply: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub color: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".to_string(),
            host: "localhost".to_string(),
            port: 8000,
            issue_id: String::new(),
            wire_format: WireFormat::Legacy,
            suggested_reply: true,
            log_level: "info".to_string(),
            color: true,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ChatError::Config(format!("{ENV_PORT}='{port}' is not a port")))?;
        }
        if let Some(issue) = lookup(ENV_ISSUE) {
            self.issue_id = issue;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme != "ws" && self.scheme != "wss" {
            return Err(ChatError::Config(format!(
                "scheme must be 'ws' or 'wss', got '{}'",
                self.scheme
            )));
        }
        if self.host.trim().is_empty() {
            return Err(ChatError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ChatError::Config("port must be non-zero".to_string()));
        }
        validate_issue_id(&self.issue_id)
    }

    /// Connection address, `<scheme>://<host>:<port>/ws/<issue_id>`.
    pub fn url(&self) -> Result<String> {
        self.validate()?;
        Ok(format!(
            "{}://{}:{}/ws/{}",
            self.scheme, self.host, self.port, self.issue_id
        ))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            wire_format: self.wire_format,
            suggested_reply: self.suggested_reply,
        }
    }
}

/// An issue id must be a single, non-empty path segment.
pub fn validate_issue_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '%'));
    if bad {
        return Err(ChatError::InvalidIssueId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_issue(id: &str) -> ClientConfig {
        ClientConfig { issue_id: id.to_string(), ..ClientConfig::default() }
    }

    #[test]
    fn test_default_url() {
        assert_eq!(with_issue("42").url().unwrap(), "ws://localhost:8000/ws/42");
    }

    #[test]
    fn test_url_requires_issue_id() {
        assert!(matches!(
            ClientConfig::default().url(),
            Err(ChatError::InvalidIssueId(_))
        ));
    }

    #[test]
    fn test_issue_id_rejects_path_characters() {
        for bad in ["a/b", "a?b", "a#b", "a b", "a%2F"] {
            assert!(validate_issue_id(bad).is_err(), "{bad} should be rejected");
        }
        assert!(validate_issue_id("issue-17_b").is_ok());
    }

    #[test]
    fn test_toml_partial_file_keeps_defaults() {
        let cfg = ClientConfig::from_toml_str("host = \"chat.internal\"\nport = 9001\n").unwrap();
        assert_eq!(cfg.host, "chat.internal");
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.scheme, "ws");
        assert!(cfg.suggested_reply);
    }

    #[test]
    fn test_toml_wire_format() {
        let cfg = ClientConfig::from_toml_str("wire_format = \"envelope\"").unwrap();
        assert_eq!(cfg.wire_format, WireFormat::Envelope);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str("hots = \"x\""),
            Err(ChatError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = ClientConfig::default();
        cfg.apply_env(env(&[(ENV_HOST, "10.0.0.5"), (ENV_PORT, "7000"), (ENV_ISSUE, "9")]))
            .unwrap();
        assert_eq!(cfg.url().unwrap(), "ws://10.0.0.5:7000/ws/9");
    }

    #[test]
    fn test_env_bad_port() {
        let mut cfg = ClientConfig::default();
        let err = cfg.apply_env(env(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_validate_scheme() {
        let cfg = ClientConfig { scheme: "http".to_string(), ..with_issue("1") };
        assert!(cfg.validate().is_err());
        let cfg = ClientConfig { scheme: "wss".to_string(), ..with_issue("1") };
        assert_eq!(cfg.url().unwrap(), "wss://localhost:8000/ws/1");
    }

    #[test]
    fn test_session_options_follow_config() {
        let cfg = ClientConfig { suggested_reply: false, ..ClientConfig::default() };
        assert!(!cfg.session_options().suggested_reply);
    }
}
