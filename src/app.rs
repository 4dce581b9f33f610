//! Interactive terminal client: wires stdin, the connection and a session
//! into one event loop.
//!
//! Input is line based. Each line is typed into the prompt field followed by
//! Enter; a trailing `\` holds Shift so the prompt continues on the next
//! line. `/suggest` asks for a suggested reply and `/quit` closes the
//! connection.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::config::ClientConfig;
use crate::connection::{self, ConnectionEvent, Outbound};
use crate::error::Result;
use crate::session::{ChatSession, DropReason, Key, SubmitOutcome};
use crate::sink::{RenderSink, TerminalSink};

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// Type the text and press Enter (`continued == false`) or Shift+Enter.
    Prompt { text: String, continued: bool },
    Suggest,
    Quit,
}

pub fn parse_line(line: &str) -> InputLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.trim() {
        "/quit" | "/exit" => return InputLine::Quit,
        "/suggest" => return InputLine::Suggest,
        _ => {}
    }
    match line.strip_suffix('\\') {
        Some(text) => InputLine::Prompt { text: text.to_string(), continued: true },
        None => InputLine::Prompt { text: line.to_string(), continued: false },
    }
}

/// Feed one interpreted line into the session. Returns `false` on quit.
pub fn apply_line<S, O>(session: &mut ChatSession<S, O>, line: InputLine) -> bool
where
    S: RenderSink,
    O: Outbound,
{
    match line {
        InputLine::Quit => return false,
        InputLine::Suggest => {
            let outcome = session.request_suggested_reply();
            if outcome == SubmitOutcome::Dropped(DropReason::Disabled) {
                eprintln!("suggested replies are disabled for this session");
            }
            log_outcome("suggest", outcome);
        }
        InputLine::Prompt { text, continued } => {
            session.type_text(&text);
            if let Some(outcome) = session.on_key(Key::Enter { shift: continued }) {
                // The field is not visible here, so a refused prompt must not
                // linger and get prepended to the next one.
                if matches!(outcome, SubmitOutcome::Dropped(_)) {
                    session.clear_input();
                }
                log_outcome("submit", outcome);
            }
        }
    }
    true
}

fn log_outcome(action: &'static str, outcome: SubmitOutcome) {
    if outcome != SubmitOutcome::Sent {
        tracing::debug!(target: "issue_chat::app", action, ?outcome, "request not sent");
    }
}

/// Connect per `config` and run until the connection closes.
pub async fn run(config: ClientConfig) -> Result<()> {
    let url = config.url()?;
    tracing::info!(
        target: "issue_chat::app",
        %url,
        wire_format = %config.wire_format,
        suggested_reply = config.suggested_reply,
        "connecting"
    );

    let (handle, mut events) = connection::open(&url);
    let mut session = ChatSession::new(
        TerminalSink::stdout(),
        handle.clone(),
        config.session_options(),
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = LinesStream::new(stdin.lines());
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let closed = matches!(event, ConnectionEvent::Closed { .. });
                session.handle_event(event);
                if closed {
                    break;
                }
            }
            line = lines.next(), if stdin_open => {
                match line {
                    Some(Ok(line)) => {
                        if !apply_line(&mut session, parse_line(&line)) {
                            handle.close();
                            stdin_open = false;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(target: "issue_chat::app", error = %e, "stdin read failed");
                        handle.close();
                        stdin_open = false;
                    }
                    None => {
                        handle.close();
                        stdin_open = false;
                    }
                }
            }
        }
    }

    Ok(())
}
