//! Wire protocol: frame classification and the two framings the client speaks.
//!
//! The legacy framing multiplexes both streams over plain text frames: a
//! `suggested_reply:` prefix tags the suggested stream, and the literal
//! `__message_finished__` terminates an exchange. There is no escaping, so a
//! primary chunk whose text equals the sentinel is read as a terminator.
//!
//! The envelope framing carries the same four frame kinds as tagged JSON
//! objects and has no such ambiguity. Both decode into [`Frame`] once, at the
//! transport boundary.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Terminator literal for both streams under the legacy framing.
pub const SENTINEL: &str = "__message_finished__";

/// Prefix tag marking a suggested-stream frame under the legacy framing.
pub const SUGGESTED_PREFIX: &str = "suggested_reply:";

/// Control token that asks the server for a suggested reply.
pub const SUGGESTED_REQUEST: &str = "suggested_reply";

// ---------------------------------------------------------------------------
// Classified frames
// ---------------------------------------------------------------------------

/// Logical stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Primary,
    Suggested,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Primary => write!(f, "primary"),
            Channel::Suggested => write!(f, "suggested"),
        }
    }
}

/// One inbound frame after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    PrimaryChunk(String),
    PrimaryDone,
    SuggestedChunk(String),
    SuggestedDone,
}

impl Frame {
    pub fn channel(&self) -> Channel {
        match self {
            Frame::PrimaryChunk(_) | Frame::PrimaryDone => Channel::Primary,
            Frame::SuggestedChunk(_) | Frame::SuggestedDone => Channel::Suggested,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Frame::PrimaryDone | Frame::SuggestedDone)
    }
}

/// Classify a legacy text payload.
///
/// Precedence is fixed: the suggested prefix is checked first, then the bare
/// sentinel, and anything else is a primary chunk taken verbatim.
pub fn classify(raw: &str) -> Frame {
    if let Some(rest) = raw.strip_prefix(SUGGESTED_PREFIX) {
        if rest == SENTINEL {
            Frame::SuggestedDone
        } else {
            Frame::SuggestedChunk(rest.to_string())
        }
    } else if raw == SENTINEL {
        Frame::PrimaryDone
    } else {
        Frame::PrimaryChunk(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// Envelope framing
// ---------------------------------------------------------------------------

/// Server → client envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerEnvelope {
    PrimaryChunk { text: String },
    PrimaryDone,
    SuggestedChunk { text: String },
    SuggestedDone,
}

impl From<ServerEnvelope> for Frame {
    fn from(env: ServerEnvelope) -> Self {
        match env {
            ServerEnvelope::PrimaryChunk { text } => Frame::PrimaryChunk(text),
            ServerEnvelope::PrimaryDone => Frame::PrimaryDone,
            ServerEnvelope::SuggestedChunk { text } => Frame::SuggestedChunk(text),
            ServerEnvelope::SuggestedDone => Frame::SuggestedDone,
        }
    }
}

/// Client → server envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Prompt { text: String },
    SuggestedReply,
}

// ---------------------------------------------------------------------------
// Outbound requests
// ---------------------------------------------------------------------------

/// A request the client can put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Raw user prompt for the primary stream.
    Prompt(String),
    /// Ask for a suggested reply.
    SuggestedReply,
}

/// Which framing the connection uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Prefix tag + sentinel over plain text.
    #[default]
    Legacy,
    /// Tagged JSON envelopes.
    Envelope,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::Legacy => write!(f, "legacy"),
            WireFormat::Envelope => write!(f, "envelope"),
        }
    }
}

impl WireFormat {
    /// Decode one inbound text payload into a [`Frame`].
    ///
    /// Legacy decoding never fails; envelope decoding fails on malformed JSON
    /// or an unknown `kind`.
    pub fn decode(&self, raw: &str) -> Result<Frame> {
        match self {
            WireFormat::Legacy => Ok(classify(raw)),
            WireFormat::Envelope => {
                let env: ServerEnvelope = serde_json::from_str(raw)?;
                Ok(env.into())
            }
        }
    }

    /// Encode an outbound request as a text payload.
    pub fn encode(&self, request: &Request) -> Result<String> {
        match self {
            WireFormat::Legacy => Ok(match request {
                Request::Prompt(text) => text.clone(),
                Request::SuggestedReply => SUGGESTED_REQUEST.to_string(),
            }),
            WireFormat::Envelope => {
                let env = match request {
                    Request::Prompt(text) => ClientEnvelope::Prompt { text: text.clone() },
                    Request::SuggestedReply => ClientEnvelope::SuggestedReply,
                };
                Ok(serde_json::to_string(&env)?)
            }
        }
    }
}
