//! Binary doc to JSON text rendering.
//!
//! Output goes into a per-call `String`; on error the partial buffer is
//! dropped with the call, so no partial text ever escapes. Only the
//! double-quote character is escaped in string output, matching the wire
//! peers this front door is compatible with; control characters and
//! backslashes pass through verbatim.

use crate::error::BsonError;
use crate::iter::RawDoc;
use crate::value::{BsonValue, ContainerKind};

/// Renders a binary doc as a JSON object string.
///
/// Fails with [`BsonError::UnsupportedKind`] if the document contains any
/// value kind without a JSON rendering; the whole encode is abandoned.
pub fn doc_to_json(doc: &RawDoc<'_>) -> Result<String, BsonError> {
    let mut out = String::with_capacity(doc.byte_len() * 2);
    out.push('{');
    write_container(&mut out, doc, ContainerKind::Document)?;
    out.push('}');
    Ok(out)
}

/// Renders the elements of one container into `out`.
///
/// Document containers emit `"key":value` pairs; array containers emit
/// values only, ignoring the positional keys.
fn write_container(
    out: &mut String,
    doc: &RawDoc<'_>,
    kind: ContainerKind,
) -> Result<(), BsonError> {
    let mut first = true;
    for element in doc.iter() {
        let element = element?;
        if !first {
            out.push(',');
        }
        first = false;
        if kind == ContainerKind::Document {
            write_quoted(out, element.key);
            out.push(':');
        }
        write_value(out, &element.value)?;
    }
    Ok(())
}

fn write_value(out: &mut String, value: &BsonValue<'_>) -> Result<(), BsonError> {
    match value {
        BsonValue::Double(d) => out.push_str(&format!("{d:.6}")),
        BsonValue::String(s) | BsonValue::Symbol(s) => write_quoted(out, s),
        BsonValue::ObjectId(oid) => {
            out.push('"');
            for byte in oid.iter() {
                out.push_str(&format!("{byte:02x}"));
            }
            out.push('"');
        }
        BsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        BsonValue::Int32(i) => out.push_str(&i.to_string()),
        BsonValue::Int64(i) => out.push_str(&i.to_string()),
        BsonValue::Null => out.push_str("null"),
        BsonValue::Document(sub) => {
            out.push('{');
            write_container(out, sub, ContainerKind::Document)?;
            out.push('}');
        }
        BsonValue::Array(sub) => {
            out.push('[');
            write_container(out, sub, ContainerKind::Array)?;
            out.push(']');
        }
        other => return Err(BsonError::UnsupportedKind(other.kind())),
    }
    Ok(())
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        if ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}
