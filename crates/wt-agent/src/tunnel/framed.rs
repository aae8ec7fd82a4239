//! Tunnel client speaking the framed wire protocol over TCP
//!
//! A single TCP connection carries every proxied stream. After registration
//! a multiplexer task owns the connection: it turns `StreamOpen` frames into
//! in-memory duplex streams handed to the listener, routes `Data` frames to
//! them, and sends their output back as `Data` frames.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use wt_core::config::split_remote;
use wt_core::TunnelError;
use wt_protocol::{ErrorCode, Frame, FrameCodec, Message, StreamId, PROTOCOL_VERSION};

use super::{TunnelClient, TunnelConnector, TunnelListener, TunnelStream};

/// In-memory buffer between the multiplexer and a proxied connection
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Read size when turning local output into `Data` frames
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Pending inbound chunks per stream; a stream further behind is closed
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Frames queued by stream pumps for the multiplexer to send
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Streams opened by the server but not yet accepted
const INCOMING_CHANNEL_CAPACITY: usize = 32;

/// Connects to a framed tunnel server over plain TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedConnector;

#[async_trait]
impl TunnelConnector for FramedConnector {
    async fn connect(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Box<dyn TunnelClient>, TunnelError> {
        if url.trim().is_empty() || url.contains(char::is_whitespace) {
            return Err(TunnelError::InvalidUrl(url.to_string()));
        }

        let (host, port) = split_remote(url);
        let addr = format!("{}:{}", host, port);
        tracing::info!("Connecting to tunnel server at {}", addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TunnelError::Connect {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(TunnelError::ConnectTimeout {
                    url: url.to_string(),
                    timeout,
                })
            }
        };
        stream.set_nodelay(true)?;

        Ok(Box::new(FramedClient {
            framed: Framed::new(stream, FrameCodec::new()),
            url: url.to_string(),
            timeout,
        }))
    }
}

/// Connected client waiting to register
pub struct FramedClient {
    framed: Framed<TcpStream, FrameCodec>,
    url: String,
    timeout: Duration,
}

#[async_trait]
impl TunnelClient for FramedClient {
    async fn listen(
        self: Box<Self>,
        cancel: CancellationToken,
        endpoint_id: &str,
    ) -> Result<Box<dyn TunnelListener>, TunnelError> {
        let FramedClient {
            mut framed,
            url,
            timeout,
        } = *self;

        framed
            .send(Frame::control(Message::Register {
                endpoint_id: endpoint_id.to_string(),
                version: Some(PROTOCOL_VERSION.to_string()),
            }))
            .await?;

        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(TunnelError::Cancelled),
            reply = tokio::time::timeout(timeout, framed.next()) => match reply {
                Err(_) => return Err(TunnelError::ConnectTimeout { url, timeout }),
                Ok(None) => return Err(TunnelError::Closed),
                Ok(Some(frame)) => frame?,
            },
        };

        match reply.message {
            Message::RegisterAck { accepted: true, .. } => {
                tracing::info!("Registered endpoint '{}' with {}", endpoint_id, url);
            }
            Message::RegisterAck {
                accepted: false,
                reason,
            } => {
                return Err(TunnelError::Rejected {
                    endpoint: endpoint_id.to_string(),
                    reason: reason.unwrap_or_else(|| "no reason given".to_string()),
                });
            }
            Message::Error { code, message } => {
                return Err(TunnelError::Rejected {
                    endpoint: endpoint_id.to_string(),
                    reason: format!("{:?}: {}", code, message),
                });
            }
            other => {
                return Err(TunnelError::UnexpectedMessage(format!(
                    "expected RegisterAck, got {:?}",
                    other.message_type()
                )));
            }
        }

        let shutdown = cancel.child_token();
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let mux = Multiplexer {
            framed,
            streams: HashMap::new(),
            incoming: incoming_tx,
            outbound_tx,
            outbound_rx,
            pumps: JoinSet::new(),
            cancel: shutdown.clone(),
        };

        Ok(Box::new(FramedListener {
            incoming: incoming_rx,
            task: Some(tokio::spawn(mux.run())),
            shutdown,
        }))
    }
}

/// Streams for a registered endpoint
///
/// Dropping the listener stops the multiplexer.
pub struct FramedListener {
    incoming: mpsc::Receiver<TunnelStream>,
    task: Option<JoinHandle<Result<(), TunnelError>>>,
    shutdown: CancellationToken,
}

#[async_trait]
impl TunnelListener for FramedListener {
    async fn accept(&mut self) -> Result<TunnelStream, TunnelError> {
        if let Some(stream) = self.incoming.recv().await {
            return Ok(stream);
        }

        let Some(task) = self.task.take() else {
            return Err(TunnelError::Closed);
        };
        match task.await {
            Ok(Ok(())) => Err(TunnelError::Cancelled),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(TunnelError::Io(std::io::Error::other(e))),
        }
    }
}

impl Drop for FramedListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Multiplexer {
    framed: Framed<TcpStream, FrameCodec>,
    streams: HashMap<StreamId, mpsc::Sender<Bytes>>,
    incoming: mpsc::Sender<TunnelStream>,
    outbound_tx: mpsc::Sender<Frame>,
    outbound_rx: mpsc::Receiver<Frame>,
    pumps: JoinSet<()>,
    cancel: CancellationToken,
}

impl Multiplexer {
    async fn run(mut self) -> Result<(), TunnelError> {
        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Ok(()),

                frame = self.framed.next() => match frame {
                    Some(Ok(frame)) => {
                        if let Err(e) = self.handle_inbound(frame).await {
                            break Err(e);
                        }
                    }
                    Some(Err(e)) => break Err(e.into()),
                    None => {
                        tracing::warn!("Tunnel server closed the connection");
                        break Err(TunnelError::Closed);
                    }
                },

                Some(frame) = self.outbound_rx.recv() => {
                    if matches!(frame.message, Message::StreamClose) {
                        self.streams.remove(&frame.stream_id);
                    }
                    if let Err(e) = self.framed.send(frame).await {
                        break Err(e.into());
                    }
                }

                Some(_) = self.pumps.join_next(), if !self.pumps.is_empty() => {}
            }
        };

        self.streams.clear();
        self.pumps.shutdown().await;
        result
    }

    async fn handle_inbound(&mut self, frame: Frame) -> Result<(), TunnelError> {
        let id = frame.stream_id;
        match frame.message {
            Message::StreamOpen { peer } => {
                if id.is_control() || self.streams.contains_key(&id) {
                    return self
                        .reply_error(id, ErrorCode::InvalidMessage, "stream id in use")
                        .await;
                }
                tracing::debug!(
                    "Opening {} for {}",
                    id,
                    peer.as_deref().unwrap_or("unknown peer")
                );

                let (local, remote) = tokio::io::duplex(STREAM_BUFFER_SIZE);
                let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
                self.streams.insert(id, tx);
                self.pumps
                    .spawn(pump(id, remote, rx, self.outbound_tx.clone()));

                if self.incoming.send(local).await.is_err() {
                    tracing::debug!("Listener gone, dropping {}", id);
                }
            }

            Message::Data(chunk) => {
                let Some(tx) = self.streams.get(&id) else {
                    return self
                        .reply_error(id, ErrorCode::StreamNotFound, "unknown stream")
                        .await;
                };
                // Must not block: other streams and heartbeats share this loop
                match tx.try_send(chunk) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("{} is not keeping up, closing it", id);
                        self.streams.remove(&id);
                        return self
                            .reply_error(id, ErrorCode::StreamOverflow, "stream buffer full")
                            .await;
                    }
                    Err(TrySendError::Closed(_)) => {
                        self.streams.remove(&id);
                    }
                }
            }

            Message::StreamClose => {
                if self.streams.remove(&id).is_some() {
                    tracing::debug!("{} closed by server", id);
                }
            }

            Message::Heartbeat { timestamp } => {
                self.framed
                    .send(Frame::control(Message::HeartbeatAck { timestamp }))
                    .await?;
            }

            Message::Error { code, message } => {
                tracing::warn!("Tunnel server error on {}: {:?} {}", id, code, message);
                if !id.is_control() {
                    self.streams.remove(&id);
                }
            }

            other => {
                tracing::debug!("Ignoring {:?} on {}", other.message_type(), id);
            }
        }
        Ok(())
    }

    async fn reply_error(
        &mut self,
        id: StreamId,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), TunnelError> {
        tracing::debug!("Rejecting frame on {}: {}", id, message);
        self.framed
            .send(Frame::new(
                id,
                Message::Error {
                    code,
                    message: message.to_string(),
                },
            ))
            .await?;
        Ok(())
    }
}

/// Copy bytes between one stream's channel pair and its duplex end.
async fn pump(
    id: StreamId,
    stream: TunnelStream,
    mut inbound: mpsc::Receiver<Bytes>,
    outbound: mpsc::Sender<Frame>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let to_local = async {
        while let Some(chunk) = inbound.recv().await {
            if writer.write_all(&chunk).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    };

    let to_remote = async {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let frame = Frame::new(id, Message::Data(Bytes::copy_from_slice(&buf[..n])));
                    if outbound.send(frame).await.is_err() {
                        return;
                    }
                }
            }
        }
        let _ = outbound.send(Frame::new(id, Message::StreamClose)).await;
    };

    tokio::join!(to_local, to_remote);
}
