//! Connection adapter: one WebSocket per conversation.
//!
//! ## Design
//! - `open` spawns a task that owns the socket and returns immediately.
//! - Socket activity comes back as [`ConnectionEvent`]s on an unbounded
//!   channel, in the order frames arrived.
//! - Outbound text goes through [`ConnectionHandle`], which forwards it to the
//!   socket task. The handle knows nothing about the chat protocol.
//! - There is no reconnect: once `Closed` is emitted the task has exited.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{ChatError, Result};

/// Close code reported when the socket ends without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Something that happened on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Open,
    /// One inbound text payload.
    Message(String),
    /// Transport-level failure. Always followed by `Closed`.
    Error(String),
    Closed { code: u16, reason: String },
}

/// Anything the session can put text frames on.
pub trait Outbound {
    /// Send one text frame. Fails with [`ChatError::NotOpen`] when the
    /// transport cannot accept it.
    fn send_text(&mut self, text: String) -> Result<()>;
}

/// Collects sent frames. Stands in for a live connection.
impl Outbound for Vec<String> {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.push(text);
        Ok(())
    }
}

#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// Sending half of an open connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a text frame. Nothing is buffered while the socket is not open.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        if !self.is_open() {
            return Err(ChatError::NotOpen);
        }
        self.tx
            .send(Outgoing::Text(text.into()))
            .map_err(|_| ChatError::NotOpen)
    }

    /// Ask the socket task to close the connection.
    pub fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

impl Outbound for ConnectionHandle {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.send(text)
    }
}

/// Connect to `url` in the background.
///
/// Must be called from within a tokio runtime. The first event is either
/// `Open` or `Error`; the last is always `Closed`.
pub fn open(url: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(false));
    let handle = ConnectionHandle { tx: out_tx, open: Arc::clone(&open) };

    let url = url.to_string();
    tokio::spawn(async move {
        run_socket(url, open.clone(), event_tx, out_rx).await;
        open.store(false, Ordering::Release);
    });

    (handle, event_rx)
}

async fn run_socket(
    url: String,
    open: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let emit = |event: ConnectionEvent| {
        // The receiver is gone only when the session has shut down.
        let _ = events.send(event);
    };

    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let err = ChatError::from(e);
            tracing::warn!(target: "issue_chat::connection", %url, error = %err, "connect failed");
            emit(ConnectionEvent::Error(err.to_string()));
            emit(ConnectionEvent::Closed {
                code: ABNORMAL_CLOSE,
                reason: "connect failed".to_string(),
            });
            return;
        }
    };

    tracing::info!(target: "issue_chat::connection", %url, "connection established");
    open.store(true, Ordering::Release);
    emit(ConnectionEvent::Open);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => emit(ConnectionEvent::Message(text)),
                    Some(Ok(WsMessage::Binary(data))) => {
                        tracing::warn!(
                            target: "issue_chat::connection",
                            len = data.len(),
                            "binary frame dropped"
                        );
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        open.store(false, Ordering::Release);
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.into_owned()),
                            None => (1005, String::new()),
                        };
                        emit(ConnectionEvent::Closed { code, reason });
                        return;
                    }
                    // Pings are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        open.store(false, Ordering::Release);
                        emit(ConnectionEvent::Error(ChatError::from(e).to_string()));
                        emit(ConnectionEvent::Closed {
                            code: ABNORMAL_CLOSE,
                            reason: "transport error".to_string(),
                        });
                        return;
                    }
                    None => {
                        open.store(false, Ordering::Release);
                        emit(ConnectionEvent::Closed {
                            code: ABNORMAL_CLOSE,
                            reason: "stream ended".to_string(),
                        });
                        return;
                    }
                }
            }
            cmd = outgoing.recv() => {
                match cmd {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = ws_sink.send(WsMessage::Text(text)).await {
                            open.store(false, Ordering::Release);
                            emit(ConnectionEvent::Error(format!("send failed: {e}")));
                            emit(ConnectionEvent::Closed {
                                code: ABNORMAL_CLOSE,
                                reason: "send failed".to_string(),
                            });
                            return;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        open.store(false, Ordering::Release);
                        let _ = ws_sink.send(WsMessage::Close(None)).await;
                        emit(ConnectionEvent::Closed {
                            code: 1000,
                            reason: "client requested close".to_string(),
                        });
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_outbound_records_frames() {
        let mut sent: Vec<String> = Vec::new();
        sent.send_text("a".to_string()).unwrap();
        sent.send_text("b".to_string()).unwrap();
        assert_eq!(sent, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        // Nothing listens on port 9 in the test environment.
        let (handle, _events) = open("ws://127.0.0.1:9/ws/1");
        assert!(matches!(handle.send("hi"), Err(ChatError::NotOpen)));
    }
}
