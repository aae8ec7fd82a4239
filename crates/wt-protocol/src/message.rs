//! Message types for the tunnel protocol
//!
//! # Message Flow
//!
//! 1. Client connects and sends `Register` on the control stream
//! 2. Server answers with `RegisterAck`; a rejected registration ends the
//!    connection
//! 3. For every inbound visitor connection the server sends `StreamOpen` on a
//!    fresh stream id
//! 4. Bytes flow in both directions as `Data` frames on that stream
//! 5. Either side ends a stream with `StreamClose`
//! 6. The server sends `Heartbeat` periodically; the client echoes the
//!    timestamp in `HeartbeatAck`

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Current protocol version string, sent in `Register`.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Message type identifier carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Endpoint registration (client → server)
    Register = 0x01,
    /// Registration acknowledgment
    RegisterAck = 0x02,
    /// A new proxied connection (server → client)
    StreamOpen = 0x03,
    /// Stream payload
    Data = 0x04,
    /// End of a stream
    StreamClose = 0x05,
    /// Heartbeat ping
    Heartbeat = 0x06,
    /// Heartbeat acknowledgment
    HeartbeatAck = 0x07,
    /// Error report
    Error = 0xFF,
}

impl MessageType {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Register),
            0x02 => Some(Self::RegisterAck),
            0x03 => Some(Self::StreamOpen),
            0x04 => Some(Self::Data),
            0x05 => Some(Self::StreamClose),
            0x06 => Some(Self::Heartbeat),
            0x07 => Some(Self::HeartbeatAck),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Error codes for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    Unknown = 0,
    /// Frame referenced a stream the peer does not know
    StreamNotFound = 1,
    /// Endpoint id already registered by another client
    EndpointTaken = 2,
    /// Malformed or out-of-order message
    InvalidMessage = 3,
    /// The local upstream refused the proxied connection
    UpstreamUnavailable = 4,
    /// The receiver fell too far behind and closed the stream
    StreamOverflow = 5,
}

/// Protocol messages
///
/// Optional fields are always serialized; bincode is not self-describing,
/// so `skip_serializing_if` must not be used here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Register this client under an endpoint id
    Register {
        /// Endpoint the server should route to this client
        endpoint_id: String,
        /// Protocol version, see [`PROTOCOL_VERSION`]
        version: Option<String>,
    },

    /// Registration outcome
    RegisterAck {
        accepted: bool,
        /// Reason if not accepted
        reason: Option<String>,
    },

    /// The server accepted a visitor connection for this endpoint
    StreamOpen {
        /// Visitor address, for logging only
        peer: Option<String>,
    },

    /// Stream payload
    Data(Bytes),

    /// End of stream
    StreamClose,

    Heartbeat {
        timestamp: u64,
    },

    HeartbeatAck {
        timestamp: u64,
    },

    Error {
        code: ErrorCode,
        message: String,
    },
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Register { .. } => MessageType::Register,
            Message::RegisterAck { .. } => MessageType::RegisterAck,
            Message::StreamOpen { .. } => MessageType::StreamOpen,
            Message::Data(_) => MessageType::Data,
            Message::StreamClose => MessageType::StreamClose,
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::HeartbeatAck { .. } => MessageType::HeartbeatAck,
            Message::Error { .. } => MessageType::Error,
        }
    }
}
