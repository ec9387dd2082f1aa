//! Binary doc construction: the low-level writer and the JSON-event builder.
//!
//! `DocBuilder` appends tagged elements and patches container length
//! prefixes on close. `JsonDocBuilder` sits on top of it and consumes the
//! structural events of a streaming JSON parse; `json_to_doc` drives it
//! from `serde_json`.

use crate::error::BsonError;
use crate::value::{ContainerKind, ValueKind};
use bytes::Bytes;
use serde_json::Value;

/// Low-level binary doc writer.
///
/// Containers nest via `open_document`/`open_array` and `close_container`;
/// `finish` terminates the root and returns the immutable buffer.
#[derive(Debug)]
pub struct DocBuilder {
    buf: Vec<u8>,
    // Offsets of the length placeholders of open containers; index 0 is
    // always the root.
    open: Vec<usize>,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; 4],
            open: vec![0],
        }
    }

    /// Nesting depth below the root.
    pub fn depth(&self) -> usize {
        self.open.len() - 1
    }

    pub fn append_double(&mut self, key: &str, value: f64) -> Result<(), BsonError> {
        self.element_header(ValueKind::Double, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn append_string(&mut self, key: &str, value: &str) -> Result<(), BsonError> {
        self.element_header(ValueKind::Utf8String, key)?;
        self.push_lenstr(value);
        Ok(())
    }

    pub fn append_symbol(&mut self, key: &str, value: &str) -> Result<(), BsonError> {
        self.element_header(ValueKind::Symbol, key)?;
        self.push_lenstr(value);
        Ok(())
    }

    pub fn append_i32(&mut self, key: &str, value: i32) -> Result<(), BsonError> {
        self.element_header(ValueKind::Int32, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn append_i64(&mut self, key: &str, value: i64) -> Result<(), BsonError> {
        self.element_header(ValueKind::Int64, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn append_bool(&mut self, key: &str, value: bool) -> Result<(), BsonError> {
        self.element_header(ValueKind::Bool, key)?;
        self.buf.push(u8::from(value));
        Ok(())
    }

    pub fn append_null(&mut self, key: &str) -> Result<(), BsonError> {
        self.element_header(ValueKind::Null, key)
    }

    pub fn append_object_id(&mut self, key: &str, oid: &[u8; 12]) -> Result<(), BsonError> {
        self.element_header(ValueKind::ObjectId, key)?;
        self.buf.extend_from_slice(oid);
        Ok(())
    }

    pub fn append_date(&mut self, key: &str, millis: i64) -> Result<(), BsonError> {
        self.element_header(ValueKind::Date, key)?;
        self.buf.extend_from_slice(&millis.to_le_bytes());
        Ok(())
    }

    pub fn append_timestamp(&mut self, key: &str, value: u64) -> Result<(), BsonError> {
        self.element_header(ValueKind::Timestamp, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn append_regex(
        &mut self,
        key: &str,
        pattern: &str,
        options: &str,
    ) -> Result<(), BsonError> {
        self.element_header(ValueKind::Regex, key)?;
        self.push_cstr(pattern, "regex pattern")?;
        self.push_cstr(options, "regex options")?;
        Ok(())
    }

    pub fn open_document(&mut self, key: &str) -> Result<(), BsonError> {
        self.open_container(ValueKind::SubDocument, key)
    }

    pub fn open_array(&mut self, key: &str) -> Result<(), BsonError> {
        self.open_container(ValueKind::SubArray, key)
    }

    fn open_container(&mut self, kind: ValueKind, key: &str) -> Result<(), BsonError> {
        self.element_header(kind, key)?;
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0u8; 4]);
        Ok(())
    }

    /// Closes the innermost open container, patching its length prefix.
    pub fn close_container(&mut self) -> Result<(), BsonError> {
        if self.open.len() < 2 {
            return Err(BsonError::Structural(
                "no open container to close".to_string(),
            ));
        }
        self.buf.push(0);
        if let Some(start) = self.open.pop() {
            self.patch_length(start);
        }
        Ok(())
    }

    /// Terminates the root document and returns the finished buffer.
    pub fn finish(mut self) -> Result<Bytes, BsonError> {
        if self.open.len() != 1 {
            return Err(BsonError::Structural(format!(
                "{} container(s) left open",
                self.open.len() - 1
            )));
        }
        self.buf.push(0);
        self.patch_length(0);
        Ok(Bytes::from(self.buf))
    }

    fn element_header(&mut self, kind: ValueKind, key: &str) -> Result<(), BsonError> {
        if key.as_bytes().contains(&0) {
            return Err(BsonError::InvalidKey(key.to_string()));
        }
        self.buf.push(kind.tag());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn push_lenstr(&mut self, value: &str) {
        let len = (value.len() + 1) as i32;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    fn push_cstr(&mut self, value: &str, what: &str) -> Result<(), BsonError> {
        if value.as_bytes().contains(&0) {
            return Err(BsonError::Structural(format!("embedded null in {what}")));
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn patch_length(&mut self, start: usize) {
        let total = (self.buf.len() - start) as i32;
        self.buf[start..start + 4].copy_from_slice(&total.to_le_bytes());
    }
}

impl Default for DocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scalar tokens the text parser can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarToken {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// Structural events of a streaming text-tree parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    FieldName(String),
    ArrayElementStart,
    Scalar(ScalarToken),
}

#[derive(Debug)]
struct OpenContainer {
    kind: ContainerKind,
    next_index: u64,
}

/// Builds a binary doc from a stream of parse events.
///
/// State is the open-container stack plus at most one pending field name,
/// set by `FieldName`/`ArrayElementStart` and consumed by the next scalar
/// or container start. The first `ObjectStart` is the implicit root and
/// writes nothing; numbers always build doubles. Array elements are keyed
/// by their decimal position, the format's own convention for arrays.
#[derive(Debug)]
pub struct JsonDocBuilder {
    writer: DocBuilder,
    stack: Vec<OpenContainer>,
    pending: Option<String>,
}

impl JsonDocBuilder {
    pub fn new() -> Self {
        Self {
            writer: DocBuilder::new(),
            stack: Vec::new(),
            pending: None,
        }
    }

    /// Current nesting depth, counting the root.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Applies one parse event to the document under construction.
    pub fn handle(&mut self, event: ParseEvent) -> Result<(), BsonError> {
        match event {
            ParseEvent::ObjectStart => {
                if self.stack.is_empty() {
                    // Implicit document root.
                    self.stack.push(OpenContainer {
                        kind: ContainerKind::Document,
                        next_index: 0,
                    });
                    return Ok(());
                }
                let key = self.take_pending("object start")?;
                self.writer.open_document(&key)?;
                self.stack.push(OpenContainer {
                    kind: ContainerKind::Document,
                    next_index: 0,
                });
            }
            ParseEvent::ArrayStart => {
                if self.stack.is_empty() {
                    return Err(BsonError::Structural(
                        "document root must be an object".to_string(),
                    ));
                }
                let key = self.take_pending("array start")?;
                self.writer.open_array(&key)?;
                self.stack.push(OpenContainer {
                    kind: ContainerKind::Array,
                    next_index: 0,
                });
            }
            ParseEvent::ObjectEnd => self.close(ContainerKind::Document)?,
            ParseEvent::ArrayEnd => self.close(ContainerKind::Array)?,
            ParseEvent::FieldName(name) => {
                let top = self.stack.last().ok_or_else(|| {
                    BsonError::Structural("field name before document root".to_string())
                })?;
                if top.kind != ContainerKind::Document {
                    return Err(BsonError::Structural(
                        "field name inside an array".to_string(),
                    ));
                }
                if self.pending.is_some() {
                    return Err(BsonError::Structural(
                        "field name while another is pending".to_string(),
                    ));
                }
                self.pending = Some(name);
            }
            ParseEvent::ArrayElementStart => {
                let top = self.stack.last_mut().ok_or_else(|| {
                    BsonError::Structural("array element before document root".to_string())
                })?;
                if top.kind != ContainerKind::Array {
                    return Err(BsonError::Structural(
                        "array element outside an array".to_string(),
                    ));
                }
                self.pending = Some(top.next_index.to_string());
                top.next_index += 1;
            }
            ParseEvent::Scalar(token) => {
                let key = self.take_pending("scalar")?;
                match token {
                    ScalarToken::Str(s) => self.writer.append_string(&key, &s)?,
                    ScalarToken::Number(n) => self.writer.append_double(&key, n)?,
                    ScalarToken::Bool(b) => self.writer.append_bool(&key, b)?,
                    ScalarToken::Null => self.writer.append_null(&key)?,
                }
            }
        }
        Ok(())
    }

    /// Finalizes the document once the top-level parse has completed.
    pub fn finish(self) -> Result<Bytes, BsonError> {
        if !self.stack.is_empty() {
            return Err(BsonError::Structural(format!(
                "{} container(s) not terminated",
                self.stack.len()
            )));
        }
        self.writer.finish()
    }

    fn close(&mut self, kind: ContainerKind) -> Result<(), BsonError> {
        let top = self.stack.pop().ok_or_else(|| {
            BsonError::Structural("container end before document root".to_string())
        })?;
        if top.kind != kind {
            return Err(BsonError::Structural(
                "mismatched container end".to_string(),
            ));
        }
        if self.pending.is_some() {
            return Err(BsonError::Structural(
                "dangling field name at container end".to_string(),
            ));
        }
        if self.stack.is_empty() {
            // Root close; the writer terminates the root in finish().
            return Ok(());
        }
        self.writer.close_container()
    }

    fn take_pending(&mut self, what: &str) -> Result<String, BsonError> {
        self.pending
            .take()
            .ok_or_else(|| BsonError::Structural(format!("{what} without a field name")))
    }
}

impl Default for JsonDocBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a JSON document and builds the equivalent binary doc.
///
/// `serde_json` supplies the token stream; the structural events are fed
/// through a [`JsonDocBuilder`]. The root must be an object.
pub fn json_to_doc(text: &str) -> Result<Bytes, BsonError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(BsonError::Structural(
            "document root must be an object".to_string(),
        ));
    }
    let mut builder = JsonDocBuilder::new();
    feed_value(&mut builder, &value)?;
    builder.finish()
}

fn feed_value(builder: &mut JsonDocBuilder, value: &Value) -> Result<(), BsonError> {
    match value {
        Value::Object(map) => {
            builder.handle(ParseEvent::ObjectStart)?;
            for (key, item) in map {
                builder.handle(ParseEvent::FieldName(key.clone()))?;
                feed_value(builder, item)?;
            }
            builder.handle(ParseEvent::ObjectEnd)
        }
        Value::Array(items) => {
            builder.handle(ParseEvent::ArrayStart)?;
            for item in items {
                builder.handle(ParseEvent::ArrayElementStart)?;
                feed_value(builder, item)?;
            }
            builder.handle(ParseEvent::ArrayEnd)
        }
        Value::String(s) => builder.handle(ParseEvent::Scalar(ScalarToken::Str(s.clone()))),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| BsonError::UnexpectedToken(n.to_string()))?;
            builder.handle(ParseEvent::Scalar(ScalarToken::Number(f)))
        }
        Value::Bool(b) => builder.handle(ParseEvent::Scalar(ScalarToken::Bool(*b))),
        Value::Null => builder.handle(ParseEvent::Scalar(ScalarToken::Null)),
    }
}
