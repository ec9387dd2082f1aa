//! Wire frame decoding and encoding.
//!
//! Frame layout (16-byte header + payload, all little-endian):
//!
//! ```text
//! +---------+------------+------------+---------+---------------------+
//! | length  | request_id | response_to| opcode  | payload             |
//! | 4 bytes | 4 bytes    | 4 bytes    | 4 bytes | length - 16 bytes   |
//! +---------+------------+------------+---------+---------------------+
//! ```
//!
//! `length` counts the whole message including the header.

use crate::error::ProtocolError;
use crate::message::MsgHeader;
use crate::MAX_MESSAGE_SIZE;
use bytes::{Buf, Bytes, BytesMut};

/// Size of the fixed message header in bytes.
pub const HEADER_SIZE: usize = 16;

/// One wire message: header plus payload.
///
/// A frame is materialized once per read, consumed by exactly one
/// dispatch, and then dropped.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: MsgHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Builds a frame for `op` with the given ids and payload, computing
    /// the length field.
    pub fn new(op: i32, request_id: i32, response_to: i32, payload: Bytes) -> Self {
        Self {
            header: MsgHeader {
                length: (HEADER_SIZE + payload.len()) as i32,
                request_id,
                response_to,
                op,
            },
            payload,
        }
    }

    /// Decodes a frame from the receive buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete message was buffered,
    /// `Ok(None)` if more data is needed, or `Err` on a malformed length
    /// field. The decoded bytes are consumed from `buf`.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let declared = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if declared < HEADER_SIZE as i32 {
            return Err(ProtocolError::MalformedLength(declared));
        }
        let total = declared as usize;
        if total > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: total,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if buf.len() < total {
            return Ok(None);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&buf[..HEADER_SIZE]);
        let header = MsgHeader::from_bytes(&header_bytes);

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(total - HEADER_SIZE).freeze();

        Ok(Some(Self { header, payload }))
    }

    /// Serializes the frame, recomputing the length field.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        let header = MsgHeader {
            length: (HEADER_SIZE + self.payload.len()) as i32,
            ..self.header
        };
        header.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OpCode;

    fn query_frame(request_id: i32, payload: &[u8]) -> Frame {
        Frame::new(
            OpCode::Query.as_i32(),
            request_id,
            0,
            Bytes::copy_from_slice(payload),
        )
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = query_frame(42, b"payload-bytes");
        let mut buf = frame.encode();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.header.request_id, 42);
        assert_eq!(decoded.header.opcode(), Some(OpCode::Query));
        assert_eq!(decoded.header.length as usize, HEADER_SIZE + 13);
        assert_eq!(decoded.payload.as_ref(), b"payload-bytes");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = BytesMut::from(&b"\x20\x00\x00"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        // Nothing consumed while waiting for more data.
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_incomplete_payload() {
        let frame = query_frame(1, b"0123456789");
        let encoded = frame.encode();
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 4]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_malformed_negative_length() {
        let mut buf = BytesMut::new();
        MsgHeader {
            length: -8,
            request_id: 0,
            response_to: 0,
            op: 2002,
        }
        .write_to(&mut buf);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::MalformedLength(-8))
        ));
    }

    #[test]
    fn test_length_below_header_size() {
        let mut buf = BytesMut::new();
        MsgHeader {
            length: 12,
            request_id: 0,
            response_to: 0,
            op: 2002,
        }
        .write_to(&mut buf);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::MalformedLength(12))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::new();
        MsgHeader {
            length: i32::MAX,
            request_id: 0,
            response_to: 0,
            op: 2004,
        }
        .write_to(&mut buf);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_header_only_frame() {
        let frame = Frame::new(OpCode::Msg.as_i32(), 5, 0, Bytes::new());
        let mut buf = frame.encode();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.header.length as usize, HEADER_SIZE);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&query_frame(1, b"one").encode());
        buf.extend_from_slice(&query_frame(2, b"two").encode());

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.header.request_id, 1);
        let second = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.header.request_id, 2);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }
}
