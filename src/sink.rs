//! Rendering sinks: the display surface replies are written into.
//!
//! Targets are addressed by an opaque [`TargetId`] handed out by the sink
//! itself, so the session never rebuilds an address from strings.

use colored::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

/// Opaque handle to one rendering target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Wrap a sink-specific raw id. Sinks must never hand out the same raw id
    /// twice within a session.
    pub fn from_raw(raw: u64) -> Self {
        TargetId(raw)
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// The display surface both stream assemblers write into.
pub trait RenderSink {
    /// Append a user message record to the history list.
    fn push_user_message(&mut self, prompt: &str);

    /// Create an empty reply placeholder at the end of the history and return
    /// its handle. Every call returns a fresh handle.
    fn create_placeholder(&mut self) -> TargetId;

    /// The fixed target suggested replies are rendered into.
    fn suggested_target(&self) -> TargetId;

    /// Empty the visible content of `target`.
    fn clear(&mut self, target: TargetId);

    /// Append `text` to the end of `target`'s content.
    fn append(&mut self, target: TargetId, text: &str);

    /// The exchange rendering into `target` completed normally.
    fn finish(&mut self, _target: TargetId) {}

    /// The exchange rendering into `target` was cut off by the transport.
    fn mark_failed(&mut self, target: TargetId);
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// One entry of the rendered chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    User(String),
    Bot(TargetId),
}

/// In-memory sink. Keeps the history list and each target's content.
#[derive(Debug)]
pub struct MemorySink {
    history: Vec<HistoryEntry>,
    contents: HashMap<TargetId, String>,
    failed: HashSet<TargetId>,
    finished: HashSet<TargetId>,
    suggested: TargetId,
    next_id: u64,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        let suggested = TargetId(0);
        let mut contents = HashMap::new();
        contents.insert(suggested, String::new());
        Self {
            history: Vec::new(),
            contents,
            failed: HashSet::new(),
            finished: HashSet::new(),
            suggested,
            next_id: 1,
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History rendered as display lines, e.g. `User: Hello` / `Bot: Hi`.
    pub fn history_lines(&self) -> Vec<String> {
        self.history
            .iter()
            .map(|entry| match entry {
                HistoryEntry::User(text) => format!("User: {}", text),
                HistoryEntry::Bot(id) => {
                    format!("Bot: {}", self.content(*id).unwrap_or_default())
                }
            })
            .collect()
    }

    /// Number of reply placeholders created so far.
    pub fn placeholder_count(&self) -> usize {
        self.history
            .iter()
            .filter(|e| matches!(e, HistoryEntry::Bot(_)))
            .count()
    }

    /// Handle of the most recent reply placeholder.
    pub fn last_placeholder(&self) -> Option<TargetId> {
        self.history.iter().rev().find_map(|e| match e {
            HistoryEntry::Bot(id) => Some(*id),
            HistoryEntry::User(_) => None,
        })
    }

    pub fn content(&self, target: TargetId) -> Option<&str> {
        self.contents.get(&target).map(String::as_str)
    }

    pub fn suggested_content(&self) -> &str {
        self.content(self.suggested).unwrap_or_default()
    }

    pub fn is_failed(&self, target: TargetId) -> bool {
        self.failed.contains(&target)
    }

    pub fn is_finished(&self, target: TargetId) -> bool {
        self.finished.contains(&target)
    }
}

impl RenderSink for MemorySink {
    fn push_user_message(&mut self, prompt: &str) {
        self.history.push(HistoryEntry::User(prompt.to_string()));
    }

    fn create_placeholder(&mut self) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.contents.insert(id, String::new());
        self.history.push(HistoryEntry::Bot(id));
        id
    }

    fn suggested_target(&self) -> TargetId {
        self.suggested
    }

    fn clear(&mut self, target: TargetId) {
        if let Some(content) = self.contents.get_mut(&target) {
            content.clear();
            self.failed.remove(&target);
            self.finished.remove(&target);
        }
    }

    fn append(&mut self, target: TargetId, text: &str) {
        match self.contents.get_mut(&target) {
            Some(content) => content.push_str(text),
            None => tracing::debug!(
                target: "issue_chat::sink",
                target_id = %target,
                "append to unknown target ignored"
            ),
        }
    }

    fn finish(&mut self, target: TargetId) {
        if self.contents.contains_key(&target) {
            self.finished.insert(target);
        }
    }

    fn mark_failed(&mut self, target: TargetId) {
        if self.contents.contains_key(&target) {
            self.failed.insert(target);
        }
    }
}

// ---------------------------------------------------------------------------
// TerminalSink
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Held {
    text: String,
    closed: Option<bool>,
}

/// Streams replies to a terminal as they arrive.
///
/// Only one target can own the cursor line at a time. Chunks for any other
/// target are held back and printed once the live target completes, so the
/// two streams never interleave mid-line.
pub struct TerminalSink<W: Write> {
    out: W,
    labels: HashMap<TargetId, &'static str>,
    live: Option<TargetId>,
    live_dirty: bool,
    held: BTreeMap<TargetId, Held>,
    suggested: TargetId,
    next_id: u64,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        let suggested = TargetId(0);
        let mut labels = HashMap::new();
        labels.insert(suggested, "Suggested:");
        Self {
            out,
            labels,
            live: None,
            live_dirty: false,
            held: BTreeMap::new(),
            suggested,
            next_id: 1,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, s: &str) {
        if let Err(e) = self.out.write_all(s.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!(target: "issue_chat::sink", error = %e, "terminal write failed");
        }
    }

    fn label(&self, target: TargetId) -> ColoredString {
        let text = self.labels.get(&target).copied().unwrap_or("Bot:");
        if target == self.suggested {
            text.bright_magenta().bold()
        } else {
            text.bright_green().bold()
        }
    }

    fn take_line(&mut self, target: TargetId) {
        self.live = Some(target);
        self.live_dirty = false;
        let label = self.label(target);
        self.emit(&format!("{} ", label));
    }

    fn close_line(&mut self, failed: bool) {
        if failed {
            let marker = format!(" {}\n", "[connection lost]".bright_red());
            self.emit(&marker);
        } else {
            self.emit("\n");
        }
        self.live = None;
        self.release_held();
    }

    /// Print held targets in creation order until one is still streaming,
    /// which then becomes the live line.
    fn release_held(&mut self) {
        while let Some((target, held)) = self.held.pop_first() {
            let line = format!("{} {}", self.label(target), held.text);
            self.emit(&line);
            match held.closed {
                Some(failed) => {
                    if failed {
                        let marker = format!(" {}", "[connection lost]".bright_red());
                        self.emit(&marker);
                    }
                    self.emit("\n");
                }
                None => {
                    self.live = Some(target);
                    self.live_dirty = !held.text.is_empty();
                    return;
                }
            }
        }
    }

    fn close(&mut self, target: TargetId, failed: bool) {
        if self.live == Some(target) {
            self.close_line(failed);
        } else if let Some(held) = self.held.get_mut(&target) {
            held.closed = Some(failed);
        }
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn push_user_message(&mut self, prompt: &str) {
        let line = format!("{} {}\n", "User:".bright_cyan().bold(), prompt);
        match self.live {
            Some(live) => {
                // Break the live line and resume it under the prompt. The text
                // already printed stays above.
                let dirty = self.live_dirty;
                self.emit("\n");
                self.emit(&line);
                self.take_line(live);
                self.live_dirty = dirty;
            }
            None => self.emit(&line),
        }
    }

    fn create_placeholder(&mut self) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.labels.insert(id, "Bot:");
        if self.live.is_none() {
            self.take_line(id);
        } else {
            self.held.insert(id, Held { text: String::new(), closed: None });
        }
        id
    }

    fn suggested_target(&self) -> TargetId {
        self.suggested
    }

    fn clear(&mut self, target: TargetId) {
        if self.live == Some(target) {
            if !self.live_dirty {
                return;
            }
            // Restart the line rather than erase what is already on screen.
            self.emit("\n");
            self.live = None;
        }
        if self.live.is_none() {
            self.held.remove(&target);
            self.take_line(target);
        } else {
            self.held.insert(target, Held { text: String::new(), closed: None });
        }
    }

    fn append(&mut self, target: TargetId, text: &str) {
        if self.live == Some(target) {
            self.live_dirty |= !text.is_empty();
            self.emit(text);
        } else if let Some(held) = self.held.get_mut(&target) {
            held.text.push_str(text);
        } else {
            tracing::debug!(target: "issue_chat::sink", target_id = %target, "append to unknown target ignored");
        }
    }

    fn finish(&mut self, target: TargetId) {
        self.close(target, false);
    }

    fn mark_failed(&mut self, target: TargetId) {
        self.close(target, true);
    }
}
