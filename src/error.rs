//! Crate-level error type.
//!
//! Only the plumbing around the session returns these: config loading,
//! connecting and envelope decoding. The session itself absorbs failures and
//! reports them through `tracing`.

use thiserror::Error;

/// Errors raised while configuring, connecting or decoding.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The TOML config file could not be parsed.
    #[error("config file parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake or socket-level WebSocket failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// `send` was called while the connection was not open.
    #[error("connection is not open")]
    NotOpen,

    /// A structured frame could not be decoded.
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// The issue id cannot be embedded in a connection path.
    #[error("invalid issue id '{0}'")]
    InvalidIssueId(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
