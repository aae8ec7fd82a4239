//! Tokio codec for framed protocol messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::message::Message;
use crate::stream::StreamId;

/// A complete frame with header and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Stream this frame belongs to
    pub stream_id: StreamId,
    /// The message payload
    pub message: Message,
}

impl Frame {
    pub fn new(stream_id: StreamId, message: Message) -> Self {
        Self { stream_id, message }
    }

    /// Frame on the control stream
    pub fn control(message: Message) -> Self {
        Self::new(StreamId::CONTROL, message)
    }
}

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Header decoded while waiting for the rest of its payload
    pending_header: Option<FrameHeader>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.payload_length as usize;
        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();
        let message: Message = bincode::deserialize(&payload)?;

        let actual = message.message_type();
        if actual != header.message_type {
            return Err(ProtocolError::TypeMismatch {
                declared: header.message_type,
                actual,
            });
        }

        Ok(Some(Frame {
            stream_id: header.stream_id,
            message,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::serialize(&frame.message)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let header = FrameHeader::new(
            frame.stream_id,
            frame.message.message_type(),
            payload.len() as u32,
        );
        header.encode(dst);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_SIZE;
    use crate::message::MessageType;
    use bytes::{BufMut, Bytes};

    #[test]
    fn test_codec_register() {
        let mut codec = FrameCodec::new();
        let frame = Frame::control(Message::Register {
            endpoint_id: "my-server".to_string(),
            version: Some("1.0".to_string()),
        });

        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = FrameCodec::new();
        let frame = Frame::new(StreamId::new(3), Message::Data(Bytes::from("GET / HTTP/1.1\r\n")));

        let mut full = BytesMut::new();
        codec.encode(frame.clone(), &mut full).unwrap();

        // Header split across reads
        let mut partial = full.split_to(HEADER_SIZE - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Header complete, payload still missing a byte
        partial.extend_from_slice(&full.split_to(full.len() - 1));
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full);
        assert_eq!(codec.decode(&mut partial).unwrap(), Some(frame));
    }

    #[test]
    fn test_codec_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(StreamId::new(1), Message::StreamOpen { peer: None }), &mut buf)
            .unwrap();
        codec
            .encode(Frame::new(StreamId::new(1), Message::StreamClose), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message.message_type(), MessageType::StreamOpen);
        assert_eq!(second.message, Message::StreamClose);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_rejects_type_mismatch() {
        let mut codec = FrameCodec::new();
        let payload = bincode::serialize(&Message::StreamClose).unwrap();

        let mut buf = BytesMut::new();
        FrameHeader::new(StreamId::new(2), MessageType::Data, payload.len() as u32).encode(&mut buf);
        buf.put_slice(&payload);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::TypeMismatch {
                declared: MessageType::Data,
                actual: MessageType::StreamClose,
            })
        ));
    }

    #[test]
    fn test_codec_rejects_oversized_payload() {
        let mut codec = FrameCodec::new();
        let frame = Frame::new(
            StreamId::new(1),
            Message::Data(Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + 1])),
        );

        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(frame, &mut buf),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
        assert!(buf.is_empty());
    }
}
