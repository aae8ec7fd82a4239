//! WebSocket terminal sessions

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ResponseBody;
use crate::pty::{resolve_shell, spawn_reader, PtyError, PtySession, TerminalSize};

/// Channel capacity for PTY output chunks waiting to be sent
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Per-connection parameters for [`TerminalBackend::session`]
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// How long to wait for the browser's first message
    pub timeout: Duration,
    /// Ends the session when cancelled
    pub cancel: CancellationToken,
}

/// Serves terminal sessions to the browser
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    /// Whether a session can be opened, for the `/check` route
    async fn check(&self) -> ResponseBody;

    /// Drive one session until either side closes or `ctx.cancel` fires
    async fn session(&self, socket: WebSocket, ctx: SessionContext);
}

/// Text frames sent by the browser
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input { data: String },
    Resize { rows: u16, cols: u16 },
}

#[derive(Debug, Error)]
enum SessionError {
    #[error("no message from the browser within {0:?}")]
    HandshakeTimeout(Duration),

    #[error(transparent)]
    Pty(#[from] PtyError),
}

/// Runs the local shell on a PTY
#[derive(Debug, Clone, Default)]
pub struct LocalShell {
    shell: Option<String>,
}

impl LocalShell {
    /// `shell` overrides `$SHELL` and the platform default
    pub fn new(shell: Option<String>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl TerminalBackend for LocalShell {
    async fn check(&self) -> ResponseBody {
        match resolve_shell(self.shell.as_deref()) {
            Ok(shell) => ResponseBody::success(json!({ "shell": shell })),
            Err(e) => ResponseBody::failure(e.to_string()),
        }
    }

    async fn session(&self, socket: WebSocket, ctx: SessionContext) {
        if let Err(e) = run_session(socket, self.shell.as_deref(), ctx).await {
            tracing::warn!("Terminal session failed: {}", e);
        }
    }
}

async fn run_session(
    mut socket: WebSocket,
    configured_shell: Option<&str>,
    ctx: SessionContext,
) -> Result<(), SessionError> {
    let first = tokio::select! {
        _ = ctx.cancel.cancelled() => return Ok(()),
        first = tokio::time::timeout(ctx.timeout, socket.recv()) => match first {
            Err(_) => {
                let _ = socket.send(Message::Close(None)).await;
                return Err(SessionError::HandshakeTimeout(ctx.timeout));
            }
            Ok(Some(Ok(message))) => message,
            Ok(_) => return Ok(()),
        },
    };

    let size = match parse_client_message(&first) {
        Some(ClientMessage::Resize { rows, cols }) => TerminalSize { rows, cols },
        _ => TerminalSize::default(),
    };

    let shell = match resolve_shell(configured_shell) {
        Ok(shell) => shell,
        Err(e) => {
            let _ = socket
                .send(Message::Text(format!("\r\n{}\r\n", e)))
                .await;
            let _ = socket.send(Message::Close(None)).await;
            return Err(e.into());
        }
    };
    let (mut pty, reader) = PtySession::spawn(&shell, size)?;

    let (tx, mut output) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    let reader_cancel = ctx.cancel.child_token();
    // Not joined: a shell's orphaned children can keep the PTY open.
    let _reader = spawn_reader(reader, tx, reader_cancel.clone());

    if !matches!(parse_client_message(&first), Some(ClientMessage::Resize { .. })) {
        apply(&mut pty, first)?;
    }

    let (mut sink, mut stream) = socket.split();
    let result = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break Ok(()),

            chunk = output.recv() => match chunk {
                Some(bytes) => {
                    if sink.send(Message::Binary(bytes)).await.is_err() {
                        break Ok(());
                    }
                }
                None => {
                    tracing::debug!("Shell output ended");
                    break Ok(());
                }
            },

            message = stream.next() => match message {
                Some(Ok(message)) => match apply(&mut pty, message) {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                },
                _ => break Ok(()),
            },
        }
    };

    reader_cancel.cancel();
    drop(output);
    let exit_code = tokio::task::spawn_blocking(move || pty.close())
        .await
        .ok()
        .flatten();
    let _ = sink.send(Message::Close(None)).await;
    tracing::info!("Terminal session ended (shell exit code {:?})", exit_code);

    result.map_err(SessionError::from)
}

fn parse_client_message(message: &Message) -> Option<ClientMessage> {
    match message {
        Message::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Apply one browser message to the PTY. Returns `false` when the browser
/// closed the socket.
fn apply(pty: &mut PtySession, message: Message) -> Result<bool, PtyError> {
    match message {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Input { data }) => pty.write(data.as_bytes())?,
            Ok(ClientMessage::Resize { rows, cols }) => pty.resize(TerminalSize { rows, cols })?,
            Err(_) => pty.write(text.as_bytes())?,
        },
        Message::Binary(data) => pty.write(&data)?,
        Message::Close(_) => return Ok(false),
        Message::Ping(_) | Message::Pong(_) => {}
    }
    Ok(true)
}
