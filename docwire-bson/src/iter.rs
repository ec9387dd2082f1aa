//! Sequential cursor over a binary doc buffer.
//!
//! Document layout:
//!
//! ```text
//! +----------+----------------------------------+------+
//! | int32 LE | elements                         | 0x00 |
//! | total    | tag (1) + key cstring + value    |      |
//! +----------+----------------------------------+------+
//! ```
//!
//! The declared total size includes the 4-byte prefix and the trailing
//! terminator. Every length and terminator read by the cursor is checked
//! against the buffer bounds; an element whose declared extent overruns
//! the buffer yields a typed error instead of reading out of bounds.

use crate::error::BsonError;
use crate::value::{BsonValue, ValueKind};
use crate::MIN_DOC_SIZE;

/// A validated view over a binary doc buffer.
///
/// Construction checks the declared total size against the backing slice;
/// the view covers exactly the declared bytes, so trailing data (as found
/// inside wire payloads) is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDoc<'a> {
    bytes: &'a [u8],
}

impl<'a> RawDoc<'a> {
    /// Creates a doc view, validating the length prefix against `bytes`.
    pub fn new(bytes: &'a [u8]) -> Result<Self, BsonError> {
        if bytes.len() < MIN_DOC_SIZE {
            return Err(BsonError::Truncated {
                offset: 0,
                needed: MIN_DOC_SIZE,
                remaining: bytes.len(),
            });
        }
        let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if declared < MIN_DOC_SIZE as i32 {
            return Err(BsonError::InvalidLength(declared));
        }
        let declared = declared as usize;
        if declared > bytes.len() {
            return Err(BsonError::Truncated {
                offset: 0,
                needed: declared,
                remaining: bytes.len(),
            });
        }
        Ok(Self {
            bytes: &bytes[..declared],
        })
    }

    /// The underlying bytes, trimmed to the declared size.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Declared size of the document in bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns a fresh cursor over the document's elements.
    ///
    /// An exhausted cursor stays exhausted; call `iter()` again for
    /// another pass.
    pub fn iter(&self) -> DocIter<'a> {
        DocIter {
            buf: self.bytes,
            pos: 4,
            done: false,
        }
    }
}

/// One decoded element: a key and its typed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    pub key: &'a str,
    pub value: BsonValue<'a>,
}

impl Element<'_> {
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }
}

/// Cursor over the elements of one container.
///
/// Yields `Err` once (and then stops) if the buffer is corrupt: an
/// unknown type tag or a value region overrunning the buffer.
#[derive(Debug)]
pub struct DocIter<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for DocIter<'a> {
    type Item = Result<Element<'a>, BsonError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<'a> DocIter<'a> {
    fn advance(&mut self) -> Result<Option<Element<'a>>, BsonError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let tag = self.buf[self.pos];
        self.pos += 1;
        if tag == 0 {
            // End-of-container marker.
            return Ok(None);
        }
        let kind = ValueKind::from_tag(tag).ok_or(BsonError::UnknownKind(tag))?;
        let key = self.read_cstr("element key")?;
        let value = self.read_value(kind)?;
        Ok(Some(Element { key, value }))
    }

    fn read_value(&mut self, kind: ValueKind) -> Result<BsonValue<'a>, BsonError> {
        Ok(match kind {
            ValueKind::Double => BsonValue::Double(f64::from_le_bytes(self.take_array::<8>()?)),
            ValueKind::Utf8String => BsonValue::String(self.read_lenstr("string value")?),
            ValueKind::SubDocument => BsonValue::Document(self.read_subdoc()?),
            ValueKind::SubArray => BsonValue::Array(self.read_subdoc()?),
            ValueKind::BinaryData => {
                let len = self.read_length()?;
                let subtype = self.take(1)?[0];
                let bytes = self.take(len)?;
                BsonValue::Binary { subtype, bytes }
            }
            ValueKind::Undefined => BsonValue::Undefined,
            ValueKind::ObjectId => {
                let bytes = self.take(12)?;
                // take() guarantees the slice length
                BsonValue::ObjectId(bytes.try_into().unwrap())
            }
            ValueKind::Bool => BsonValue::Bool(self.take(1)?[0] != 0),
            ValueKind::Date => BsonValue::Date(i64::from_le_bytes(self.take_array::<8>()?)),
            ValueKind::Null => BsonValue::Null,
            ValueKind::Regex => {
                let pattern = self.read_cstr("regex pattern")?;
                let options = self.read_cstr("regex options")?;
                BsonValue::Regex { pattern, options }
            }
            ValueKind::Code => BsonValue::Code(self.read_lenstr("code value")?),
            ValueKind::Symbol => BsonValue::Symbol(self.read_lenstr("symbol value")?),
            ValueKind::CodeWithScope => {
                // Total length includes its own 4 bytes.
                let declared =
                    i32::from_le_bytes(self.peek_array::<4>()?);
                if declared < 4 {
                    return Err(BsonError::InvalidLength(declared));
                }
                let raw = self.take(declared as usize)?;
                BsonValue::CodeWithScope(raw)
            }
            ValueKind::Int32 => BsonValue::Int32(i32::from_le_bytes(self.take_array::<4>()?)),
            ValueKind::Timestamp => {
                BsonValue::Timestamp(u64::from_le_bytes(self.take_array::<8>()?))
            }
            ValueKind::Int64 => BsonValue::Int64(i64::from_le_bytes(self.take_array::<8>()?)),
        })
    }

    /// Reads a length-prefixed string: int32 size (including the trailing
    /// null), bytes, null.
    fn read_lenstr(&mut self, what: &'static str) -> Result<&'a str, BsonError> {
        let len = i32::from_le_bytes(self.take_array::<4>()?);
        if len < 1 {
            return Err(BsonError::InvalidLength(len));
        }
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(&bytes[..bytes.len() - 1]).map_err(|_| BsonError::InvalidUtf8(what))
    }

    /// Reads a null-terminated string.
    fn read_cstr(&mut self, what: &'static str) -> Result<&'a str, BsonError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(BsonError::Truncated {
                offset: self.pos,
                needed: rest.len() + 1,
                remaining: rest.len(),
            })?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| BsonError::InvalidUtf8(what))?;
        self.pos += nul + 1;
        Ok(s)
    }

    /// Reads a nested container, delimited by its own length prefix.
    fn read_subdoc(&mut self) -> Result<RawDoc<'a>, BsonError> {
        let declared = i32::from_le_bytes(self.peek_array::<4>()?);
        if declared < MIN_DOC_SIZE as i32 {
            return Err(BsonError::InvalidLength(declared));
        }
        let raw = self.take(declared as usize)?;
        RawDoc::new(raw)
    }

    fn read_length(&mut self) -> Result<usize, BsonError> {
        let len = i32::from_le_bytes(self.take_array::<4>()?);
        if len < 0 {
            return Err(BsonError::InvalidLength(len));
        }
        Ok(len as usize)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BsonError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(BsonError::Truncated {
                offset: self.pos,
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], BsonError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn peek_array<const N: usize>(&mut self) -> Result<[u8; N], BsonError> {
        let remaining = self.buf.len() - self.pos;
        if N > remaining {
            return Err(BsonError::Truncated {
                offset: self.pos,
                needed: N,
                remaining,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        Ok(out)
    }
}
