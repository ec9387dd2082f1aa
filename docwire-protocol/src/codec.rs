//! Incremental frame decoding over a connection's receive buffer.

use crate::error::ProtocolError;
use crate::frame::Frame;
use bytes::BytesMut;

/// Accumulates socket reads and yields complete frames.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data read from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards all buffered data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OpCode;
    use bytes::Bytes;

    #[test]
    fn test_partial_then_complete() {
        let frame = Frame::new(OpCode::Insert.as_i32(), 3, 0, Bytes::from_static(b"body"));
        let encoded = frame.encode();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..7]);
        assert!(decoder.decode_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 7);

        decoder.extend(&encoded[7..]);
        let decoded = decoder.decode_frame().unwrap().unwrap();
        assert_eq!(decoded.header.request_id, 3);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut decoder = Decoder::new();
        decoder.extend(b"\x40\x00\x00\x00partial");
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.decode_frame().unwrap().is_none());
    }
}
