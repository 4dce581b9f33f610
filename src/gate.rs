//! Send gate: admission control for one channel.
//!
//! A gate admits one request and then refuses further ones until the reply's
//! terminator releases it. Refused requests are dropped, never queued.

use crate::protocol::Channel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateState {
    /// A new request may be sent.
    #[default]
    Idle,
    /// A request is out and its reply has not terminated.
    AwaitingReply,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Idle => write!(f, "idle"),
            GateState::AwaitingReply => write!(f, "awaiting-reply"),
        }
    }
}

#[derive(Debug)]
pub struct SendGate {
    channel: Channel,
    state: GateState,
}

impl SendGate {
    pub fn new(channel: Channel) -> Self {
        Self { channel, state: GateState::Idle }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GateState::Idle
    }

    /// `Idle -> AwaitingReply`. Returns `false` and leaves the state untouched
    /// when a reply is already awaited.
    pub fn admit(&mut self) -> bool {
        match self.state {
            GateState::Idle => {
                self.state = GateState::AwaitingReply;
                true
            }
            GateState::AwaitingReply => {
                tracing::debug!(
                    target: "issue_chat::gate",
                    channel = %self.channel,
                    "request refused while awaiting reply"
                );
                false
            }
        }
    }

    /// `AwaitingReply -> Idle`. Returns whether a reply was awaited.
    pub fn release(&mut self) -> bool {
        let was_waiting = self.state == GateState::AwaitingReply;
        self.state = GateState::Idle;
        was_waiting
    }
}
