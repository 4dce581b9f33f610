//! Streaming chat client for per-issue conversations.
//!
//! A [`session::ChatSession`] multiplexes two incremental-text streams over
//! one WebSocket: the primary reply to each user prompt, and an optional
//! suggested reply. Replies are rendered into a [`sink::RenderSink`] chunk by
//! chunk as they arrive.

pub mod app;
pub mod assembler;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod gate;
pub mod protocol;
pub mod session;
pub mod sink;

pub use error::{ChatError, Result};
pub use protocol::{Channel, Frame, WireFormat};
pub use session::{ChatSession, DropReason, Key, SessionOptions, SubmitOutcome};
pub use sink::{MemorySink, RenderSink, TargetId, TerminalSink};
