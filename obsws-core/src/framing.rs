//! Reassembly of JSON documents from transport chunks
//!
//! The websocket layer hands over frames, and a single JSON document may span
//! several of them. [`FrameReassembler`] appends every chunk to one buffer and
//! parses as many complete documents as the buffer holds.
//!
//! Incomplete input is told apart from corrupt input through serde_json's
//! streaming deserializer: a premature end of input is reported as an EOF
//! error (`Error::is_eof`), anything else is a syntax error. On a syntax
//! error the whole buffer is discarded and the peer is expected to resume at
//! the next frame boundary.

use crate::error::Error;
use crate::types::Document;
use serde_json::Value;

/// Default ceiling for buffered, still-incomplete input (16 MiB)
pub const DEFAULT_MAX_BUFFER: usize = 16 * 1024 * 1024;

/// Accumulates received bytes until complete documents can be parsed
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    max_buffer: usize,
}

impl FrameReassembler {
    /// Create an empty reassembler with the default buffer ceiling
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BUFFER)
    }

    /// Create an empty reassembler that gives up on documents larger than `max_buffer`
    pub fn with_limit(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer: max_buffer.max(1),
        }
    }

    /// Append a chunk and return every document it completes
    ///
    /// Returns an empty vector while a document is still incomplete. A
    /// corrupt buffer yields one `Err(Error::ProtocolError)` entry after any
    /// documents that parsed cleanly before it; the buffer is then cleared.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Document, Error>> {
        self.buffer.extend_from_slice(chunk);

        let mut documents = Vec::new();
        let consumed = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();
            loop {
                match stream.next() {
                    Some(Ok(doc)) => documents.push(Ok(doc)),
                    Some(Err(e)) if e.is_eof() => break Some(stream.byte_offset()),
                    Some(Err(e)) => {
                        documents.push(Err(Error::ProtocolError(e.to_string())));
                        break None;
                    }
                    None => break Some(stream.byte_offset()),
                }
            }
        };

        match consumed {
            Some(offset) => {
                self.buffer.drain(..offset);
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    self.buffer.clear();
                } else if self.buffer.len() > self.max_buffer {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    documents.push(Err(Error::ProtocolError(format!(
                        "incomplete document exceeds {} bytes ({} buffered)",
                        self.max_buffer, len
                    ))));
                }
            }
            None => self.buffer.clear(),
        }

        documents
    }

    /// Number of bytes held for an incomplete document
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// True when no partial document is pending
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any partial document
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_docs(results: Vec<Result<Document, Error>>) -> Vec<Document> {
        results.into_iter().map(|r| r.expect("document should parse")).collect()
    }

    #[test]
    fn reassembles_three_chunks() {
        let mut reassembler = FrameReassembler::new();

        assert!(reassembler.push(br#"{"mess"#).is_empty());
        assert!(reassembler.push(br#"age-id":"abc","#).is_empty());
        let docs = ok_docs(reassembler.push(br#""ok":true}"#));

        assert_eq!(docs, vec![json!({"message-id": "abc", "ok": true})]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn reassembles_at_every_split_point() {
        let text = r#"{"message-id":"abc","ok":true,"nested":{"list":[1,2.5,"x"]}}"#;
        let expected: Value = serde_json::from_str(text).unwrap();

        for split in 0..=text.len() {
            let mut reassembler = FrameReassembler::new();
            let (head, tail) = text.as_bytes().split_at(split);
            let mut docs = ok_docs(reassembler.push(head));
            docs.extend(ok_docs(reassembler.push(tail)));

            assert_eq!(docs, vec![expected.clone()], "split at {}", split);
            assert!(reassembler.is_empty());
        }
    }

    #[test]
    fn reassembles_byte_by_byte() {
        let text = r#"{"update-type":"SwitchScenes","scene-name":"Über"}"#;
        let mut reassembler = FrameReassembler::new();
        let mut docs = Vec::new();

        for b in text.as_bytes() {
            docs.extend(ok_docs(reassembler.push(std::slice::from_ref(b))));
        }

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["scene-name"], "Über");
    }

    #[test]
    fn yields_several_documents_from_one_chunk() {
        let mut reassembler = FrameReassembler::new();
        let docs = ok_docs(reassembler.push(br#"{"a":1} {"b":2}{"c":"#));

        assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(reassembler.buffered(), br#"{"c":"#.len());

        let docs = ok_docs(reassembler.push(b"3}"));
        assert_eq!(docs, vec![json!({"c": 3})]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn corrupt_input_is_reported_and_dropped() {
        let mut reassembler = FrameReassembler::new();
        let results = reassembler.push(br#"{"a":1,]"#);

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::ProtocolError(_))));
        assert!(reassembler.is_empty());

        // The next frame boundary starts clean
        let docs = ok_docs(reassembler.push(br#"{"a":2}"#));
        assert_eq!(docs, vec![json!({"a": 2})]);
    }

    #[test]
    fn documents_before_corruption_survive() {
        let mut reassembler = FrameReassembler::new();
        let results = reassembler.push(br#"{"a":1}garbage"#);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &json!({"a": 1}));
        assert!(results[1].is_err());
        assert!(reassembler.is_empty());
    }

    #[test]
    fn trailing_whitespace_is_not_buffered() {
        let mut reassembler = FrameReassembler::new();
        let docs = ok_docs(reassembler.push(b"{\"a\":1}\r\n  "));
        assert_eq!(docs.len(), 1);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn oversized_partial_document_is_dropped() {
        let mut reassembler = FrameReassembler::with_limit(8);
        let results = reassembler.push(br#"{"message-id":"#);

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert!(reassembler.is_empty());
    }
}
