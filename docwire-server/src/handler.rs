//! Opcode dispatch.
//!
//! The front door decodes requests and logs them; nothing is executed
//! against a backing store. Query and GetMore get a syntactically valid
//! empty reply so wire-compatible clients keep talking to us.

use bytes::BytesMut;
use docwire_bson::{doc_to_json, RawDoc};
use docwire_protocol::{Frame, InsertBody, OpCode, ProtocolError, QueryBody, Reply};

/// Routes decoded frames to per-operation handlers.
#[derive(Debug, Default)]
pub struct MessageHandler;

impl MessageHandler {
    pub fn new() -> Self {
        Self
    }

    /// Dispatches one frame, returning reply bytes when the operation
    /// calls for them.
    ///
    /// Payload decode failures abort only this frame's dispatch; the
    /// connection keeps serving subsequent frames.
    pub fn handle(&self, frame: &Frame) -> Option<BytesMut> {
        match frame.header.opcode() {
            Some(OpCode::Insert) => {
                if let Err(e) = self.log_insert(frame) {
                    tracing::warn!("discarding malformed insert: {e}");
                }
                None
            }
            Some(op @ (OpCode::Query | OpCode::GetMore)) => {
                match QueryBody::parse(&frame.payload) {
                    Ok(body) => {
                        self.log_query(op, &body);
                        Some(Reply::new(frame.header.request_id).encode())
                    }
                    Err(e) => {
                        tracing::warn!("discarding malformed {op:?}: {e}");
                        None
                    }
                }
            }
            Some(op @ (OpCode::Update | OpCode::Delete | OpCode::KillCursors | OpCode::Msg)) => {
                tracing::debug!("accepted {op:?} without decoding");
                None
            }
            Some(OpCode::Reply) => {
                tracing::debug!("ignoring unsolicited reply frame");
                None
            }
            None => {
                tracing::warn!("unknown message op: {}", frame.header.op);
                None
            }
        }
    }

    fn log_insert(&self, frame: &Frame) -> Result<(), ProtocolError> {
        let body = InsertBody::parse(&frame.payload)?;
        tracing::info!(namespace = %body.namespace, "OP_INSERT");
        Self::log_document(&body.document);
        Ok(())
    }

    fn log_query(&self, op: OpCode, body: &QueryBody) {
        tracing::info!(
            namespace = %body.namespace,
            skip = body.number_to_skip,
            limit = body.number_to_return,
            "{op:?}"
        );
        Self::log_document(&body.query);
    }

    /// Renders a document for the log. Rendering is a logging aid only; a
    /// failure here never affects the wire exchange.
    fn log_document(doc: &[u8]) {
        match RawDoc::new(doc).and_then(|doc| doc_to_json(&doc)) {
            Ok(json) => tracing::info!("json = {json}"),
            Err(e) if e.is_malformed_input() => {
                tracing::warn!("corrupt document in payload: {e}");
            }
            Err(e) => tracing::warn!("document not renderable: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, Bytes, BytesMut};
    use docwire_bson::DocBuilder;
    use docwire_protocol::REPLY_SIZE;

    fn int_doc() -> Bytes {
        let mut b = DocBuilder::new();
        b.append_i32("a", 1).unwrap();
        b.finish().unwrap()
    }

    fn insert_frame(request_id: i32) -> Frame {
        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_slice(b"test.foo\0");
        payload.put_slice(&int_doc());
        Frame::new(OpCode::Insert.as_i32(), request_id, 0, payload.freeze())
    }

    fn query_frame(request_id: i32) -> Frame {
        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_slice(b"test.foo\0");
        payload.put_i32_le(0);
        payload.put_i32_le(10);
        payload.put_slice(&int_doc());
        Frame::new(OpCode::Query.as_i32(), request_id, 0, payload.freeze())
    }

    fn reply_field(buf: &[u8], at: usize) -> i32 {
        i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    #[test]
    fn test_insert_produces_no_reply() {
        let handler = MessageHandler::new();
        assert!(handler.handle(&insert_frame(1)).is_none());
    }

    #[test]
    fn test_query_produces_empty_reply() {
        let handler = MessageHandler::new();
        let reply = handler.handle(&query_frame(321)).unwrap();

        assert_eq!(reply.len(), REPLY_SIZE);
        assert_eq!(reply_field(&reply, 8), 321); // response_to
        assert_eq!(reply_field(&reply, 12), OpCode::Reply.as_i32());
        assert_eq!(reply_field(&reply, 32), 0); // number_returned
    }

    #[test]
    fn test_get_more_also_replies() {
        let handler = MessageHandler::new();
        let mut frame = query_frame(5);
        frame.header.op = OpCode::GetMore.as_i32();
        assert!(handler.handle(&frame).is_some());
    }

    #[test]
    fn test_undecoded_ops_are_accepted_silently() {
        let handler = MessageHandler::new();
        for op in [
            OpCode::Update,
            OpCode::Delete,
            OpCode::KillCursors,
            OpCode::Msg,
        ] {
            let frame = Frame::new(op.as_i32(), 1, 0, Bytes::from_static(b"ignored"));
            assert!(handler.handle(&frame).is_none());
        }
    }

    #[test]
    fn test_unknown_opcode_is_not_fatal() {
        let handler = MessageHandler::new();
        let frame = Frame::new(9999, 1, 0, Bytes::new());
        assert!(handler.handle(&frame).is_none());
    }

    #[test]
    fn test_malformed_query_payload_gets_no_reply() {
        let handler = MessageHandler::new();
        let frame = Frame::new(OpCode::Query.as_i32(), 8, 0, Bytes::from_static(b"\x00"));
        assert!(handler.handle(&frame).is_none());
    }

    #[test]
    fn test_query_with_unrenderable_doc_still_replies() {
        // A regex query is valid on the wire even though it has no JSON
        // rendering; the reply must go out regardless.
        let mut b = DocBuilder::new();
        b.append_regex("re", "^x", "").unwrap();
        let doc = b.finish().unwrap();

        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_slice(b"test.foo\0");
        payload.put_i32_le(0);
        payload.put_i32_le(0);
        payload.put_slice(&doc);
        let frame = Frame::new(OpCode::Query.as_i32(), 2, 0, payload.freeze());

        let handler = MessageHandler::new();
        let reply = handler.handle(&frame).unwrap();
        assert_eq!(reply.len(), REPLY_SIZE);
        assert_eq!(reply_field(&reply, 8), 2);
        assert_eq!(reply_field(&reply, 32), 0);
    }
}
