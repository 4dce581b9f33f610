//! Stream assembler: accumulates one channel's chunks into its target.
//!
//! Chunks are written to the sink the moment they arrive so the reply "types"
//! itself out; the internal buffer mirrors what was rendered.

use crate::protocol::Channel;
use crate::sink::{RenderSink, TargetId};

/// Lifecycle of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    InFlight,
    Finished,
    /// The connection ended before the terminator arrived.
    Failed,
}

#[derive(Debug)]
pub struct StreamAssembler {
    channel: Channel,
    target: Option<TargetId>,
    buffer: String,
    in_flight: bool,
    chunks: usize,
}

impl StreamAssembler {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            target: None,
            buffer: String::new(),
            in_flight: false,
            chunks: 0,
        }
    }

    /// Open a new exchange rendering into `target`, clearing its content.
    pub fn begin<S: RenderSink + ?Sized>(&mut self, sink: &mut S, target: TargetId) {
        if self.in_flight {
            tracing::warn!(
                target: "issue_chat::assembler",
                channel = %self.channel,
                "begin while an exchange was still in flight"
            );
        }
        sink.clear(target);
        self.target = Some(target);
        self.buffer.clear();
        self.chunks = 0;
        self.in_flight = true;
    }

    /// Render `text` at the end of the current target.
    ///
    /// Returns `false` without touching any state when no exchange is open.
    pub fn append_chunk<S: RenderSink + ?Sized>(&mut self, sink: &mut S, text: &str) -> bool {
        let target = match (self.in_flight, self.target) {
            (true, Some(target)) => target,
            _ => {
                tracing::debug!(
                    target: "issue_chat::assembler",
                    channel = %self.channel,
                    len = text.len(),
                    "chunk with no open exchange dropped"
                );
                return false;
            }
        };
        sink.append(target, text);
        self.buffer.push_str(text);
        self.chunks += 1;
        true
    }

    /// Close the exchange normally. Returns `false` if none was open.
    pub fn finish<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        self.close(sink, ExchangeStatus::Finished)
    }

    /// Close the exchange as failed. Returns `false` if none was open.
    pub fn fail<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> bool {
        self.close(sink, ExchangeStatus::Failed)
    }

    fn close<S: RenderSink + ?Sized>(&mut self, sink: &mut S, status: ExchangeStatus) -> bool {
        if !self.in_flight {
            tracing::debug!(
                target: "issue_chat::assembler",
                channel = %self.channel,
                "terminator with no open exchange ignored"
            );
            return false;
        }
        self.in_flight = false;
        if let Some(target) = self.target {
            match status {
                ExchangeStatus::Failed => sink.mark_failed(target),
                _ => sink.finish(target),
            }
        }
        tracing::debug!(
            target: "issue_chat::assembler",
            channel = %self.channel,
            chunks = self.chunks,
            bytes = self.buffer.len(),
            ?status,
            "exchange closed"
        );
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    /// Text rendered for the current (or last) exchange.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_append_without_begin_is_noop() {
        let mut sink = MemorySink::new();
        let mut asm = StreamAssembler::new(Channel::Primary);
        assert!(!asm.append_chunk(&mut sink, "stray"));
        assert_eq!(asm.buffer(), "");
        assert!(asm.target().is_none());
    }

    #[test]
    fn test_chunks_render_in_arrival_order() {
        let mut sink = MemorySink::new();
        let target = sink.create_placeholder();
        let mut asm = StreamAssembler::new(Channel::Primary);
        asm.begin(&mut sink, target);
        for chunk in ["a", "b", "c"] {
            assert!(asm.append_chunk(&mut sink, chunk));
        }
        assert_eq!(sink.content(target), Some("abc"));
        assert_eq!(asm.buffer(), "abc");
    }

    #[test]
    fn test_finish_freezes_content() {
        let mut sink = MemorySink::new();
        let target = sink.create_placeholder();
        let mut asm = StreamAssembler::new(Channel::Primary);
        asm.begin(&mut sink, target);
        asm.append_chunk(&mut sink, "done");
        assert!(asm.finish(&mut sink));
        assert!(!asm.append_chunk(&mut sink, " late"));
        assert_eq!(sink.content(target), Some("done"));
        assert!(sink.is_finished(target));
    }

    #[test]
    fn test_finish_twice_reports_false() {
        let mut sink = MemorySink::new();
        let target = sink.create_placeholder();
        let mut asm = StreamAssembler::new(Channel::Primary);
        asm.begin(&mut sink, target);
        assert!(asm.finish(&mut sink));
        assert!(!asm.finish(&mut sink));
    }

    #[test]
    fn test_begin_clears_previous_content() {
        let mut sink = MemorySink::new();
        let target = sink.suggested_target();
        let mut asm = StreamAssembler::new(Channel::Suggested);
        asm.begin(&mut sink, target);
        asm.append_chunk(&mut sink, "first");
        asm.finish(&mut sink);
        asm.begin(&mut sink, target);
        assert_eq!(sink.suggested_content(), "");
        assert_eq!(asm.buffer(), "");
    }

    #[test]
    fn test_fail_marks_target() {
        let mut sink = MemorySink::new();
        let target = sink.create_placeholder();
        let mut asm = StreamAssembler::new(Channel::Primary);
        asm.begin(&mut sink, target);
        asm.append_chunk(&mut sink, "partial");
        assert!(asm.fail(&mut sink));
        assert!(sink.is_failed(target));
        assert_eq!(sink.content(target), Some("partial"));
        assert!(!asm.is_in_flight());
    }
}
