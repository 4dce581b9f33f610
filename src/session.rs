//! Chat session: the client-side protocol state machine.
//!
//! ## Design
//! - One session per conversation, driven from a single event loop. Every
//!   method runs to completion; nothing here blocks or locks.
//! - Two independent channels share the connection. Each has its own
//!   [`SendGate`] and [`StreamAssembler`]:
//!   - primary: user prompts, one fresh reply target per exchange;
//!   - suggested: requested by a dedicated action, always rendered into the
//!     sink's fixed suggested target. Only available when enabled.
//! - Inbound payloads are decoded once into [`Frame`]s and routed by channel.
//! - Failures are absorbed here and logged; callers only ever see a
//!   [`SubmitOutcome`].
//!
//! ## Connection loss
//! A transport error or close forces both gates back to `Idle` and marks any
//! in-flight exchange as failed, so the input never stays blocked.

use crate::assembler::{ExchangeStatus, StreamAssembler};
use crate::connection::{ConnectionEvent, Outbound};
use crate::gate::{GateState, SendGate};
use crate::protocol::{Channel, Frame, Request, WireFormat};
use crate::sink::{RenderSink, TargetId};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Session behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub wire_format: WireFormat,
    /// Enables the suggested-reply channel.
    pub suggested_reply: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { wire_format: WireFormat::Legacy, suggested_reply: true }
    }
}

/// State of the underlying connection as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

/// Keyboard input reaching the prompt field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    /// Enter, with or without the newline modifier (Shift) held.
    Enter { shift: bool },
}

/// Why a request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The channel is still waiting for a reply.
    InFlight,
    /// The suggested-reply channel is switched off.
    Disabled,
    /// The connection has closed.
    Disconnected,
}

/// Result of a submit or suggested-reply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent,
    Dropped(DropReason),
    /// Admitted but the transport refused the frame; the exchange was closed
    /// as failed.
    SendFailed,
}

/// One prompt and its streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryExchange {
    pub prompt: String,
    pub target: TargetId,
    pub reply: String,
    pub status: ExchangeStatus,
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

pub struct ChatSession<S: RenderSink, O: Outbound> {
    sink: S,
    outbound: O,
    options: SessionOptions,
    link: LinkState,
    input: String,
    primary_gate: SendGate,
    suggested_gate: SendGate,
    primary: StreamAssembler,
    suggested: StreamAssembler,
    exchanges: Vec<PrimaryExchange>,
}

impl<S: RenderSink, O: Outbound> ChatSession<S, O> {
    pub fn new(sink: S, outbound: O, options: SessionOptions) -> Self {
        Self {
            sink,
            outbound,
            options,
            link: LinkState::Connecting,
            input: String::new(),
            primary_gate: SendGate::new(Channel::Primary),
            suggested_gate: SendGate::new(Channel::Suggested),
            primary: StreamAssembler::new(Channel::Primary),
            suggested: StreamAssembler::new(Channel::Suggested),
            exchanges: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Input controller
    // -----------------------------------------------------------------------

    /// Type text into the prompt field.
    pub fn type_text(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// Handle a key press on the prompt field.
    ///
    /// Enter submits; Shift+Enter inserts a newline like a multi-line field
    /// would. Returns the submit outcome when Enter submitted.
    pub fn on_key(&mut self, key: Key) -> Option<SubmitOutcome> {
        match key {
            Key::Char(c) => {
                self.input.push(c);
                None
            }
            Key::Backspace => {
                self.input.pop();
                None
            }
            Key::Enter { shift: true } => {
                self.input.push('\n');
                None
            }
            Key::Enter { shift: false } => Some(self.submit()),
        }
    }

    /// Discard whatever is in the prompt field.
    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Submit the prompt field as a primary prompt.
    ///
    /// Empty prompts are sent as they are. A submit while a reply is in
    /// flight is dropped and leaves the field untouched.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.link == LinkState::Closed {
            tracing::debug!(target: "issue_chat::session", "submit after close dropped");
            return SubmitOutcome::Dropped(DropReason::Disconnected);
        }
        if !self.primary_gate.admit() {
            return SubmitOutcome::Dropped(DropReason::InFlight);
        }

        let prompt = std::mem::take(&mut self.input);
        self.sink.push_user_message(&prompt);
        let target = self.sink.create_placeholder();
        self.primary.begin(&mut self.sink, target);
        self.exchanges.push(PrimaryExchange {
            prompt: prompt.clone(),
            target,
            reply: String::new(),
            status: ExchangeStatus::InFlight,
        });

        tracing::debug!(
            target: "issue_chat::session",
            target_id = %target,
            len = prompt.len(),
            "prompt submitted"
        );

        if self.transmit(Request::Prompt(prompt)) {
            SubmitOutcome::Sent
        } else {
            self.end_primary(ExchangeStatus::Failed);
            SubmitOutcome::SendFailed
        }
    }

    /// Convenience for callers that hold the whole prompt already.
    pub fn submit_prompt(&mut self, prompt: &str) -> SubmitOutcome {
        if !self.primary_gate.is_idle() {
            return SubmitOutcome::Dropped(DropReason::InFlight);
        }
        self.input.clear();
        self.input.push_str(prompt);
        self.submit()
    }

    // -----------------------------------------------------------------------
    // Suggested-reply controller
    // -----------------------------------------------------------------------

    /// Ask the server for a suggested reply.
    ///
    /// Independent of the primary channel. Refused while a suggested reply is
    /// still streaming.
    pub fn request_suggested_reply(&mut self) -> SubmitOutcome {
        if !self.options.suggested_reply {
            return SubmitOutcome::Dropped(DropReason::Disabled);
        }
        if self.link == LinkState::Closed {
            return SubmitOutcome::Dropped(DropReason::Disconnected);
        }
        if !self.suggested_gate.admit() {
            return SubmitOutcome::Dropped(DropReason::InFlight);
        }

        let target = self.sink.suggested_target();
        self.suggested.begin(&mut self.sink, target);

        if self.transmit(Request::SuggestedReply) {
            SubmitOutcome::Sent
        } else {
            self.suggested.fail(&mut self.sink);
            self.suggested_gate.release();
            SubmitOutcome::SendFailed
        }
    }

    // -----------------------------------------------------------------------
    // Connection events
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Open => {
                tracing::info!(target: "issue_chat::session", "connection established");
                self.link = LinkState::Open;
            }
            ConnectionEvent::Message(raw) => self.handle_payload(&raw),
            ConnectionEvent::Error(err) => {
                tracing::error!(target: "issue_chat::session", error = %err, "connection error");
                self.connection_lost();
            }
            ConnectionEvent::Closed { code, reason } => {
                tracing::info!(target: "issue_chat::session", code, %reason, "connection closed");
                self.connection_lost();
            }
        }
    }

    /// Decode one inbound payload and route it.
    pub fn handle_payload(&mut self, raw: &str) {
        match self.options.wire_format.decode(raw) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => tracing::warn!(
                target: "issue_chat::session",
                error = %e,
                "undecodable frame ignored"
            ),
        }
    }

    pub fn handle_frame(&mut self, frame: Frame) {
        tracing::trace!(
            target: "issue_chat::session",
            channel = %frame.channel(),
            terminator = frame.is_terminator(),
            "frame received"
        );
        match frame {
            Frame::PrimaryChunk(text) => {
                self.primary.append_chunk(&mut self.sink, &text);
            }
            Frame::PrimaryDone => {
                if self.primary.is_in_flight() {
                    self.end_primary(ExchangeStatus::Finished);
                } else {
                    tracing::debug!(target: "issue_chat::session", "stray primary terminator");
                }
            }
            Frame::SuggestedChunk(text) => {
                self.suggested.append_chunk(&mut self.sink, &text);
            }
            Frame::SuggestedDone => {
                self.suggested.finish(&mut self.sink);
                self.suggested_gate.release();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn primary_state(&self) -> GateState {
        self.primary_gate.state()
    }

    pub fn suggested_state(&self) -> GateState {
        self.suggested_gate.state()
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Text streamed so far for the current (or last) primary reply.
    pub fn current_reply(&self) -> &str {
        self.primary.buffer()
    }

    /// Text streamed so far for the current (or last) suggested reply.
    pub fn suggested_reply(&self) -> &str {
        self.suggested.buffer()
    }

    pub fn exchanges(&self) -> &[PrimaryExchange] {
        &self.exchanges
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn transmit(&mut self, request: Request) -> bool {
        let text = match self.options.wire_format.encode(&request) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(target: "issue_chat::session", error = %e, "encode failed");
                return false;
            }
        };
        match self.outbound.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(target: "issue_chat::session", error = %e, ?request, "send failed");
                false
            }
        }
    }

    fn end_primary(&mut self, status: ExchangeStatus) {
        match status {
            ExchangeStatus::Failed => self.primary.fail(&mut self.sink),
            _ => self.primary.finish(&mut self.sink),
        };
        self.primary_gate.release();
        if let Some(exchange) = self.exchanges.last_mut() {
            if exchange.status == ExchangeStatus::InFlight {
                exchange.reply = self.primary.buffer().to_string();
                exchange.status = status;
            }
        }
    }

    fn connection_lost(&mut self) {
        self.link = LinkState::Closed;
        if self.primary.is_in_flight() {
            tracing::warn!(target: "issue_chat::session", "primary reply cut off by connection loss");
            self.end_primary(ExchangeStatus::Failed);
        }
        self.primary_gate.release();
        if self.suggested.fail(&mut self.sink) {
            tracing::warn!(target: "issue_chat::session", "suggested reply cut off by connection loss");
        }
        self.suggested_gate.release();
    }
}
