//! wt-protocol: Wire protocol for webssh-tunnel
//!
//! This crate defines the binary protocol spoken between the tunnel client
//! and the remote tunnel server. A single TCP connection carries a control
//! stream plus any number of proxied streams, each identified by a
//! [`StreamId`].

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod stream;

pub use codec::{Frame, FrameCodec};
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{ErrorCode, Message, MessageType, PROTOCOL_VERSION};
pub use stream::StreamId;
