//! Value kinds and typed element views.

use crate::iter::RawDoc;
use std::fmt;

/// Type tags for binary doc elements.
///
/// The numeric values are part of the on-wire format and must not change.
/// Tag `0x00` is the end-of-container marker and has no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Double,
    Utf8String,
    SubDocument,
    SubArray,
    BinaryData,
    Undefined,
    ObjectId,
    Bool,
    Date,
    Null,
    Regex,
    Code,
    Symbol,
    CodeWithScope,
    Int32,
    Timestamp,
    Int64,
}

impl ValueKind {
    /// Maps a type tag byte to its kind. Returns `None` for unknown tags
    /// (including `0x00`, which is the container terminator).
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(ValueKind::Double),
            0x02 => Some(ValueKind::Utf8String),
            0x03 => Some(ValueKind::SubDocument),
            0x04 => Some(ValueKind::SubArray),
            0x05 => Some(ValueKind::BinaryData),
            0x06 => Some(ValueKind::Undefined),
            0x07 => Some(ValueKind::ObjectId),
            0x08 => Some(ValueKind::Bool),
            0x09 => Some(ValueKind::Date),
            0x0A => Some(ValueKind::Null),
            0x0B => Some(ValueKind::Regex),
            0x0D => Some(ValueKind::Code),
            0x0E => Some(ValueKind::Symbol),
            0x0F => Some(ValueKind::CodeWithScope),
            0x10 => Some(ValueKind::Int32),
            0x11 => Some(ValueKind::Timestamp),
            0x12 => Some(ValueKind::Int64),
            _ => None,
        }
    }

    /// The type tag byte for this kind.
    pub fn tag(&self) -> u8 {
        match self {
            ValueKind::Double => 0x01,
            ValueKind::Utf8String => 0x02,
            ValueKind::SubDocument => 0x03,
            ValueKind::SubArray => 0x04,
            ValueKind::BinaryData => 0x05,
            ValueKind::Undefined => 0x06,
            ValueKind::ObjectId => 0x07,
            ValueKind::Bool => 0x08,
            ValueKind::Date => 0x09,
            ValueKind::Null => 0x0A,
            ValueKind::Regex => 0x0B,
            ValueKind::Code => 0x0D,
            ValueKind::Symbol => 0x0E,
            ValueKind::CodeWithScope => 0x0F,
            ValueKind::Int32 => 0x10,
            ValueKind::Timestamp => 0x11,
            ValueKind::Int64 => 0x12,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Double => "double",
            ValueKind::Utf8String => "string",
            ValueKind::SubDocument => "document",
            ValueKind::SubArray => "array",
            ValueKind::BinaryData => "binary",
            ValueKind::Undefined => "undefined",
            ValueKind::ObjectId => "object-id",
            ValueKind::Bool => "bool",
            ValueKind::Date => "date",
            ValueKind::Null => "null",
            ValueKind::Regex => "regex",
            ValueKind::Code => "code",
            ValueKind::Symbol => "symbol",
            ValueKind::CodeWithScope => "code-with-scope",
            ValueKind::Int32 => "int32",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Int64 => "int64",
        };
        write!(f, "{name}")
    }
}

/// How a container's contents are interpreted when rendered or built.
///
/// Documents and arrays share one physical layout; the distinction lives
/// entirely in this flag. Array element keys ("0", "1", ...) are ignored
/// when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Document,
    Array,
}

/// A decoded element value borrowing from the underlying doc buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BsonValue<'a> {
    Double(f64),
    String(&'a str),
    Document(RawDoc<'a>),
    Array(RawDoc<'a>),
    Binary { subtype: u8, bytes: &'a [u8] },
    Undefined,
    ObjectId(&'a [u8; 12]),
    Bool(bool),
    Date(i64),
    Null,
    Regex { pattern: &'a str, options: &'a str },
    Code(&'a str),
    Symbol(&'a str),
    CodeWithScope(&'a [u8]),
    Int32(i32),
    Timestamp(u64),
    Int64(i64),
}

impl BsonValue<'_> {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            BsonValue::Double(_) => ValueKind::Double,
            BsonValue::String(_) => ValueKind::Utf8String,
            BsonValue::Document(_) => ValueKind::SubDocument,
            BsonValue::Array(_) => ValueKind::SubArray,
            BsonValue::Binary { .. } => ValueKind::BinaryData,
            BsonValue::Undefined => ValueKind::Undefined,
            BsonValue::ObjectId(_) => ValueKind::ObjectId,
            BsonValue::Bool(_) => ValueKind::Bool,
            BsonValue::Date(_) => ValueKind::Date,
            BsonValue::Null => ValueKind::Null,
            BsonValue::Regex { .. } => ValueKind::Regex,
            BsonValue::Code(_) => ValueKind::Code,
            BsonValue::Symbol(_) => ValueKind::Symbol,
            BsonValue::CodeWithScope(_) => ValueKind::CodeWithScope,
            BsonValue::Int32(_) => ValueKind::Int32,
            BsonValue::Timestamp(_) => ValueKind::Timestamp,
            BsonValue::Int64(_) => ValueKind::Int64,
        }
    }
}
