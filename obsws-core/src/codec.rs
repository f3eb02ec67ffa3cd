//! Codec for obsws request and response documents
//!
//! Serialization itself is plain serde_json; this module adds the protocol
//! rules on top:
//! - **Tagging**: stamping a request with its correlation id
//! - **Classification**: telling responses apart from push events
//! - **Status mapping**: turning `"status": "error"` into [`Error::Remote`]
//!
//! # Examples
//!
//! ```rust
//! use obsws_core::codec;
//! use serde_json::json;
//!
//! let request = codec::build_request("GetVersion", json!({})).unwrap();
//! let tagged = codec::tag_request(&request, "abc").unwrap();
//! assert_eq!(tagged["message-id"], "abc");
//!
//! let inbound = codec::classify(json!({"message-id": "abc", "status": "ok"}));
//! assert!(inbound.is_response());
//! ```

use crate::error::{Error, Result};
use crate::types::{Document, InboundMessage, ERROR, MESSAGE_ID, REQUEST_TYPE, STATUS};
use serde::Serialize;
use serde_json::Value;

/// Encode a document to its compact wire form
pub fn encode(doc: &Document) -> Result<String> {
    serde_json::to_string(doc).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a complete wire text into a document
pub fn decode(data: &str) -> Result<Document> {
    serde_json::from_str(data).map_err(|e| Error::ProtocolError(e.to_string()))
}

/// Copy `doc` and set its correlation id
///
/// Any `message-id` already present is overwritten; ids are owned by the
/// client so that responses can always be matched.
///
/// # Errors
///
/// Returns `Error::InvalidRequest` if `doc` is not a JSON object.
pub fn tag_request(doc: &Document, message_id: &str) -> Result<Document> {
    let mut tagged = doc.clone();
    match tagged.as_object_mut() {
        Some(map) => {
            map.insert(MESSAGE_ID.to_string(), Value::String(message_id.to_string()));
            Ok(tagged)
        }
        None => Err(Error::InvalidRequest(
            "request document must be a JSON object".to_string(),
        )),
    }
}

/// Build `{"request-type": request_type, ...fields}`
///
/// `fields` must serialize to an object or to null.
pub fn build_request<P: Serialize>(request_type: &str, fields: P) -> Result<Document> {
    let mut doc = match serde_json::to_value(fields)? {
        Value::Null => Value::Object(Default::default()),
        v @ Value::Object(_) => v,
        other => {
            return Err(Error::InvalidRequest(format!(
                "request fields must be an object, got {}",
                other
            )))
        }
    };
    if let Some(map) = doc.as_object_mut() {
        map.insert(REQUEST_TYPE.to_string(), Value::String(request_type.to_string()));
    }
    Ok(doc)
}

/// Extract the correlation id of an inbound document
///
/// Numeric ids are accepted and rendered as text.
pub fn message_id(doc: &Document) -> Option<String> {
    match doc.get(MESSAGE_ID)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Classify an inbound document as a response or an unsolicited event
pub fn classify(doc: Document) -> InboundMessage {
    match message_id(&doc) {
        Some(message_id) => InboundMessage::Response {
            message_id,
            document: doc,
        },
        None => InboundMessage::Event(doc),
    }
}

/// Map a response's `status` field onto a `Result`
///
/// Responses without a status field are treated as successful.
pub fn check_status(doc: &Document) -> Result<()> {
    match doc.get(STATUS).and_then(Value::as_str) {
        Some("error") => {
            let msg = doc
                .get(ERROR)
                .and_then(Value::as_str)
                .unwrap_or("unspecified error");
            Err(Error::Remote(msg.to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_request_sets_id() {
        let doc = json!({"request-type": "GetSceneList"});
        let tagged = tag_request(&doc, "id-1").unwrap();

        assert_eq!(tagged["message-id"], "id-1");
        assert_eq!(tagged["request-type"], "GetSceneList");
        // The original is left untouched
        assert!(doc.get("message-id").is_none());
    }

    #[test]
    fn test_tag_request_overwrites_caller_id() {
        let doc = json!({"request-type": "GetVersion", "message-id": "mine"});
        let tagged = tag_request(&doc, "ours").unwrap();
        assert_eq!(tagged["message-id"], "ours");
    }

    #[test]
    fn test_tag_request_rejects_non_object() {
        let result = tag_request(&json!([1, 2, 3]), "id");
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_build_request() {
        let doc = build_request("SetCurrentScene", json!({"scene-name": "Before"})).unwrap();
        assert_eq!(doc["request-type"], "SetCurrentScene");
        assert_eq!(doc["scene-name"], "Before");

        let bare = build_request("GetVersion", ()).unwrap();
        assert_eq!(bare, json!({"request-type": "GetVersion"}));

        assert!(build_request("Broken", 42).is_err());
    }

    #[test]
    fn test_classify() {
        let response = classify(json!({"message-id": "abc", "ok": true}));
        match response {
            InboundMessage::Response { message_id, document } => {
                assert_eq!(message_id, "abc");
                assert_eq!(document["ok"], true);
            }
            _ => panic!("Expected response"),
        }

        let event = classify(json!({"update-type": "SwitchScenes", "scene-name": "Intro"}));
        assert!(event.is_event());
        assert_eq!(event.update_type(), Some("SwitchScenes"));
    }

    #[test]
    fn test_classify_numeric_id() {
        let response = classify(json!({"message-id": 7}));
        match response {
            InboundMessage::Response { message_id, .. } => assert_eq!(message_id, "7"),
            _ => panic!("Expected response"),
        }
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(&json!({"status": "ok"})).is_ok());
        assert!(check_status(&json!({"no-status": true})).is_ok());

        match check_status(&json!({"status": "error", "error": "source not found"})) {
            Err(Error::Remote(msg)) => assert_eq!(msg, "source not found"),
            other => panic!("Expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_is_compact() {
        let encoded = encode(&json!({"request-type": "GetVersion", "message-id": "x"})).unwrap();
        assert!(!encoded.contains('\n'));
        assert_eq!(decode(&encoded).unwrap()["message-id"], "x");
    }

    #[test]
    fn test_decode_invalid() {
        assert!(matches!(decode("not json"), Err(Error::ProtocolError(_))));
    }
}
