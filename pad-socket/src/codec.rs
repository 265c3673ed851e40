//! Wire envelope encoding.
//!
//! Outbound frames are objects, `{"event": name, "data": payload}`, with
//! `data` omitted when there is no payload so that "no payload" and a
//! `null` payload stay distinguishable. Inbound frames are arrays,
//! `[name, payload]`. The decoder accepts both shapes.

use serde::Serialize;
use serde_json::Value;

use pad_core::error::{PadError, PadResult};

/// A decoded `(event, payload)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    /// `None` when the envelope carried no payload at all.
    pub payload: Option<Value>,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

/// Encode an outbound frame.
pub fn encode(event: &str, payload: Option<&Value>) -> PadResult<String> {
    if event.is_empty() {
        return Err(PadError::Codec("event name must not be empty".into()));
    }
    let text = serde_json::to_string(&OutboundEnvelope { event, data: payload })?;
    Ok(text)
}

/// Decode an inbound frame.
///
/// Accepts `[name]`, `[name, payload]` and `{"event": name, "data"?: payload}`.
pub fn decode(text: &str) -> PadResult<Frame> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PadError::Codec(format!("frame is not valid JSON: {e}")))?;

    let (name, payload) = match value {
        Value::Array(mut items) => {
            if items.is_empty() || items.len() > 2 {
                return Err(PadError::Codec(format!(
                    "expected [event, payload], got {} element(s)",
                    items.len()
                )));
            }
            let payload = if items.len() == 2 { items.pop() } else { None };
            (items.swap_remove(0), payload)
        }
        Value::Object(mut map) => {
            let name = map
                .remove("event")
                .ok_or_else(|| PadError::Codec("object frame has no event field".into()))?;
            (name, map.remove("data"))
        }
        other => {
            return Err(PadError::Codec(format!("unexpected frame shape: {other}")));
        }
    };

    match name {
        Value::String(event) if !event.is_empty() => Ok(Frame { event, payload }),
        Value::String(_) => Err(PadError::Codec("event name must not be empty".into())),
        other => Err(PadError::Codec(format!("event name must be a string, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_omits_absent_payload() {
        let text = encode("load", None).unwrap();
        assert_eq!(text, r#"{"event":"load"}"#);
    }

    #[test]
    fn test_encode_keeps_null_payload() {
        let text = encode("load", Some(&Value::Null)).unwrap();
        assert_eq!(text, r#"{"event":"load","data":null}"#);
    }

    #[test]
    fn test_encode_rejects_empty_name() {
        assert!(matches!(encode("", None), Err(PadError::Codec(_))));
    }

    #[test]
    fn test_decode_inbound_array() {
        let frame = decode(r#"["settings",{"results":"NOT_ALLOWED"}]"#).unwrap();
        assert_eq!(frame.event, "settings");
        assert_eq!(frame.payload, Some(json!({"results": "NOT_ALLOWED"})));
    }

    #[test]
    fn test_decode_distinguishes_absent_and_null() {
        assert_eq!(decode(r#"["ping"]"#).unwrap().payload, None);
        assert_eq!(decode(r#"["ping",null]"#).unwrap().payload, Some(Value::Null));
        assert_eq!(decode(r#"{"event":"ping"}"#).unwrap().payload, None);
        assert_eq!(
            decode(r#"{"event":"ping","data":null}"#).unwrap().payload,
            Some(Value::Null)
        );
    }

    #[test]
    fn test_roundtrip_through_object_form() {
        let payloads = [
            None,
            Some(Value::Null),
            Some(json!(0)),
            Some(json!("text")),
            Some(json!([1, "two", null])),
            Some(json!({"term": "x", "nested": {"deep": [true, false]}})),
        ];
        for payload in payloads {
            let text = encode("search", payload.as_ref()).unwrap();
            let frame = decode(&text).unwrap();
            assert_eq!(frame.event, "search");
            assert_eq!(frame.payload, payload);
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let inputs = [
            "not json",
            "42",
            r#""settings""#,
            "[]",
            r#"["a","b","c"]"#,
            r#"[42,"payload"]"#,
            r#"["",{}]"#,
            r#"{"data":1}"#,
        ];
        for input in inputs {
            assert!(
                matches!(decode(input), Err(PadError::Codec(_))),
                "{input} should be rejected"
            );
        }
    }
}
