//! Message header, opcodes, and payload bodies.

use crate::error::ProtocolError;
use crate::HEADER_SIZE;
use bytes::{BufMut, Bytes, BytesMut};
use docwire_bson::RawDoc;

/// Operation codes consumed or produced by the front door.
///
/// The numeric values are fixed by the external protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Reply,
    Msg,
    Update,
    Insert,
    Query,
    GetMore,
    Delete,
    KillCursors,
}

impl OpCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(OpCode::Reply),
            1000 => Some(OpCode::Msg),
            2001 => Some(OpCode::Update),
            2002 => Some(OpCode::Insert),
            2004 => Some(OpCode::Query),
            2005 => Some(OpCode::GetMore),
            2006 => Some(OpCode::Delete),
            2007 => Some(OpCode::KillCursors),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            OpCode::Reply => 1,
            OpCode::Msg => 1000,
            OpCode::Update => 2001,
            OpCode::Insert => 2002,
            OpCode::Query => 2004,
            OpCode::GetMore => 2005,
            OpCode::Delete => 2006,
            OpCode::KillCursors => 2007,
        }
    }
}

/// The fixed 16-byte little-endian message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total message length in bytes, header included.
    pub length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op: i32,
}

impl MsgHeader {
    /// Decodes a header from exactly [`HEADER_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let field = |at: usize| {
            i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            length: field(0),
            request_id: field(4),
            response_to: field(8),
            op: field(12),
        }
    }

    /// Appends the serialized header to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.op);
    }

    /// The decoded opcode, or `None` if the value is outside the known set.
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_i32(self.op)
    }
}

/// Cursor over a message payload.
struct Body<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Body<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < 4 {
            return Err(ProtocolError::TruncatedPayload {
                offset: self.pos,
                needed: 4,
                remaining,
            });
        }
        let b = &self.buf[self.pos..self.pos + 4];
        self.pos += 4;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_cstr(&mut self) -> Result<&'a str, ProtocolError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::TruncatedPayload {
                offset: self.pos,
                needed: rest.len() + 1,
                remaining: rest.len(),
            })?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| ProtocolError::BadNamespace)?;
        self.pos += nul + 1;
        Ok(s)
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// Parsed body of an Insert message:
/// `[flags:i32][namespace cstring][document]`.
#[derive(Debug, Clone)]
pub struct InsertBody {
    pub flags: i32,
    pub namespace: String,
    pub document: Bytes,
}

impl InsertBody {
    pub fn parse(payload: &Bytes) -> Result<Self, ProtocolError> {
        let mut body = Body::new(payload);
        let flags = body.read_i32()?;
        let namespace = body.read_cstr()?.to_string();
        let document = take_document(payload, body.position())?;
        Ok(Self {
            flags,
            namespace,
            document,
        })
    }
}

/// Parsed body of a Query or GetMore message:
/// `[flags:i32][namespace cstring][skip:i32][return:i32][query document]`.
#[derive(Debug, Clone)]
pub struct QueryBody {
    pub flags: i32,
    pub namespace: String,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Bytes,
}

impl QueryBody {
    pub fn parse(payload: &Bytes) -> Result<Self, ProtocolError> {
        let mut body = Body::new(payload);
        let flags = body.read_i32()?;
        let namespace = body.read_cstr()?.to_string();
        let number_to_skip = body.read_i32()?;
        let number_to_return = body.read_i32()?;
        let query = take_document(payload, body.position())?;
        Ok(Self {
            flags,
            namespace,
            number_to_skip,
            number_to_return,
            query,
        })
    }
}

/// Validates the binary doc starting at `offset` and slices it out.
fn take_document(payload: &Bytes, offset: usize) -> Result<Bytes, ProtocolError> {
    let raw = RawDoc::new(&payload[offset..])?;
    Ok(payload.slice(offset..offset + raw.byte_len()))
}
