//! # docwire-protocol
//!
//! MongoDB wire protocol framing for docwire.
//!
//! This crate provides:
//! - The 16-byte little-endian message header and opcode table
//! - Incremental frame decoding over a receive buffer
//! - Payload body parsers for the Insert and Query/GetMore operations
//! - The empty OP_REPLY encoder

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod reply;

pub use codec::Decoder;
pub use error::ProtocolError;
pub use frame::{Frame, HEADER_SIZE};
pub use message::{InsertBody, MsgHeader, OpCode, QueryBody};
pub use reply::{Reply, REPLY_SIZE};

/// Default listen port, fixed by the external protocol.
pub const DEFAULT_PORT: u16 = 27017;

/// Maximum accepted message size (48 MiB), matching the protocol's limit.
pub const MAX_MESSAGE_SIZE: usize = 48 * 1024 * 1024;
