//! # docwire-bson
//!
//! Binary document model for docwire.
//!
//! This crate provides:
//! - Value kind tags and typed element views over a binary doc buffer
//! - A bounds-checked cursor (`DocIter`) over document elements
//! - A binary-to-JSON encoder (`doc_to_json`)
//! - A JSON-event-to-binary builder (`JsonDocBuilder`) driven by a
//!   streaming parse event stream, plus a `serde_json`-backed entry point

pub mod builder;
pub mod error;
pub mod iter;
pub mod json;
pub mod value;

pub use builder::{json_to_doc, DocBuilder, JsonDocBuilder, ParseEvent, ScalarToken};
pub use error::BsonError;
pub use iter::{DocIter, Element, RawDoc};
pub use json::doc_to_json;
pub use value::{BsonValue, ContainerKind, ValueKind};

/// Smallest legal document: a 4-byte length prefix plus the terminator.
pub const MIN_DOC_SIZE: usize = 5;
