//! Empty reply encoding.
//!
//! Reply layout (all little-endian, 36 bytes total):
//!
//! ```text
//! +--------------------+---------+-----------+---------------+-----------------+
//! | header (16 bytes)  | flags   | cursor_id | starting_from | number_returned |
//! | opcode = OP_REPLY  | 4 bytes | 8 bytes   | 4 bytes       | 4 bytes         |
//! +--------------------+---------+-----------+---------------+-----------------+
//! ```
//!
//! The front door only ever answers with a syntactically valid, empty
//! result set: zero documents, cursor closed.

use crate::message::{MsgHeader, OpCode};
use bytes::{BufMut, BytesMut};

/// Serialized size of an empty reply in bytes.
pub const REPLY_SIZE: usize = 36;

/// An empty result-set reply correlated to one request.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub request_id: i32,
    pub response_to: i32,
}

impl Reply {
    /// Creates a reply to the given request id, with a fresh random id of
    /// its own.
    pub fn new(response_to: i32) -> Self {
        Self {
            request_id: rand::random(),
            response_to,
        }
    }

    /// Serializes the reply into a single write-ready buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(REPLY_SIZE);
        MsgHeader {
            length: REPLY_SIZE as i32,
            request_id: self.request_id,
            response_to: self.response_to,
            op: OpCode::Reply.as_i32(),
        }
        .write_to(&mut buf);
        buf.put_i32_le(0); // flags
        buf.put_i64_le(0); // cursor_id
        buf.put_i32_le(0); // starting_from
        buf.put_i32_le(0); // number_returned
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(buf: &[u8], at: usize) -> i32 {
        i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    #[test]
    fn test_reply_layout() {
        let reply = Reply {
            request_id: 77,
            response_to: 12345,
        };
        let buf = reply.encode();

        assert_eq!(buf.len(), REPLY_SIZE);
        assert_eq!(field(&buf, 0), REPLY_SIZE as i32);
        assert_eq!(field(&buf, 4), 77);
        assert_eq!(field(&buf, 8), 12345);
        assert_eq!(field(&buf, 12), OpCode::Reply.as_i32());
        // Empty result set: flags, cursor, offset, and count all zero.
        assert!(buf[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reply_correlates_to_request() {
        let reply = Reply::new(99);
        assert_eq!(reply.response_to, 99);
        let buf = reply.encode();
        assert_eq!(field(&buf, 8), 99);
        assert_eq!(field(&buf, 32), 0); // number_returned
    }
}
