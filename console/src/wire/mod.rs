//! Typed boundary for the remote API's response format.
//!
//! Responses arrive as an envelope carrying a nested status code and a body
//! that is usually a JSON string (double-encoded) but can also be an
//! already-parsed value. Record attributes inside the body are wrapped in
//! one-letter type tags (`S`, `N`, `BOOL`, `L`, `M`). Everything here fails
//! closed: a shape we do not recognize becomes a typed [`WireError`] instead
//! of leaking dynamic data inward.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while decoding an API response.
#[derive(Debug, Error)]
pub enum WireError {
    /// The envelope or its nested body is not valid JSON of the expected shape.
    #[error("Malformed envelope: {0}")]
    Malformed(String),
    /// The body parsed but does not carry the expected payload.
    #[error("Unexpected body: {0}")]
    UnexpectedBody(String),
}

/// One attribute of a wire record, tagged with its type code.
///
/// Numeric attributes (`N`) keep their string payload so precision is never
/// lost before a caller explicitly asks for arithmetic via [`AttrValue::as_f64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    S(String),
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    L(Vec<AttrValue>),
    M(HashMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric payload in its precision-preserving string form.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_l(&self) -> Option<&[AttrValue]> {
        match self {
            Self::L(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&HashMap<String, AttrValue>> {
        match self {
            Self::M(map) => Some(map),
            _ => None,
        }
    }

    /// Parses the payload as a number, for attributes that need arithmetic.
    /// Accepts the numeric form and the string form.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::N(n) => n.parse().ok(),
            Self::S(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Collapses the wrapper into a plain JSON value, recursively for list
    /// and map attributes. Numeric payloads stay strings.
    pub fn unwrap_value(&self) -> Value {
        match self {
            Self::S(s) => Value::String(s.clone()),
            Self::N(n) => Value::String(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::L(items) => Value::Array(items.iter().map(AttrValue::unwrap_value).collect()),
            Self::M(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.unwrap_value()))
                    .collect(),
            ),
        }
    }
}

/// One API-returned entity with attributes wrapped in type tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireRecord(pub HashMap<String, AttrValue>);

impl WireRecord {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// String payload of `name`, or `None` when absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_s)
    }

    /// Numeric payload of `name` in string form (`N` first, then `S`).
    pub fn num_field(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|v| v.as_n().or_else(|| v.as_s()))
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(AttrValue::as_f64)
    }

    pub fn list_field(&self, name: &str) -> Option<&[AttrValue]> {
        self.get(name).and_then(AttrValue::as_l)
    }
}

/// The remote API's outer response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(rename = "body-json")]
    pub body_json: EnvelopeBody,
}

/// Nested status code plus the (possibly double-encoded) body.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeBody {
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub body: Value,
}

impl ApiEnvelope {
    /// Parses the raw response text into an envelope.
    pub fn parse(raw: &str) -> Result<Self, WireError> {
        serde_json::from_str(raw).map_err(|e| WireError::Malformed(e.to_string()))
    }

    /// True when the nested status code marks a duplicate-entity conflict.
    pub fn is_conflict(&self) -> bool {
        self.body_json.status_code == Some(409)
    }

    /// Decodes the nested body, unwrapping the string-encoded form.
    pub fn decode_body(&self) -> Result<Value, WireError> {
        match &self.body_json.body {
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| WireError::Malformed(e.to_string()))
            }
            Value::Null => Err(WireError::UnexpectedBody("body is missing".to_string())),
            other => Ok(other.clone()),
        }
    }

    /// Interprets the body as a list of wire records. Accepts a bare array
    /// or an object carrying the array under `Items`.
    pub fn records(&self) -> Result<Vec<WireRecord>, WireError> {
        let body = self.decode_body()?;

        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("Items") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(WireError::UnexpectedBody(
                        "expected an array of records".to_string(),
                    ));
                }
            },
            _ => {
                return Err(WireError::UnexpectedBody(
                    "expected an array of records".to_string(),
                ));
            }
        };

        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| WireError::Malformed(e.to_string()))
            })
            .collect()
    }

    /// The `error` field of an error-shaped body, when present.
    pub fn error_message(&self) -> Option<String> {
        let body = self.decode_body().ok()?;
        body.get("error")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_wrappers_unwrap() {
        let s: AttrValue = serde_json::from_value(json!({"S": "x"})).unwrap();
        assert_eq!(s.unwrap_value(), json!("x"));

        let n: AttrValue = serde_json::from_value(json!({"N": "42"})).unwrap();
        assert_eq!(n.as_f64(), Some(42.0));
        // The string form is preserved, not coerced.
        assert_eq!(n.as_n(), Some("42"));
        assert_eq!(n.unwrap_value(), json!("42"));

        let b: AttrValue = serde_json::from_value(json!({"BOOL": true})).unwrap();
        assert_eq!(b.as_bool(), Some(true));
    }

    #[test]
    fn test_list_wrapper_unwraps_recursively() {
        let l: AttrValue =
            serde_json::from_value(json!({"L": [{"S": "a"}, {"N": "1.50"}]})).unwrap();
        assert_eq!(l.unwrap_value(), json!(["a", "1.50"]));
    }

    #[test]
    fn test_map_wrapper_unwraps_recursively() {
        let m: AttrValue =
            serde_json::from_value(json!({"M": {"descripcion": {"S": "Ibuprofeno"}}})).unwrap();
        assert_eq!(m.unwrap_value(), json!({"descripcion": "Ibuprofeno"}));
    }

    #[test]
    fn test_unknown_tag_fails_closed() {
        let parsed: Result<AttrValue, _> = serde_json::from_value(json!({"SS": ["a"]}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_envelope_with_double_encoded_body() {
        let raw = r#"{"body-json":{"statusCode":200,"body":"[{\"sk\":{\"S\":\"doc#1\"}}]"}}"#;
        let envelope = ApiEnvelope::parse(raw).unwrap();
        let records = envelope.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str_field("sk"), Some("doc#1"));
    }

    #[test]
    fn test_envelope_with_parsed_object_body() {
        let raw = json!({
            "body-json": {
                "statusCode": 200,
                "body": {"Items": [{"sk": {"S": "doc#2"}}]}
            }
        })
        .to_string();
        let envelope = ApiEnvelope::parse(&raw).unwrap();
        let records = envelope.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str_field("sk"), Some("doc#2"));
    }

    #[test]
    fn test_conflict_envelope() {
        let raw = r#"{"body-json":{"statusCode":409,"body":"{\"error\":\"dup\"}"}}"#;
        let envelope = ApiEnvelope::parse(raw).unwrap();
        assert!(envelope.is_conflict());
        assert_eq!(envelope.error_message(), Some("dup".to_string()));
    }

    #[test]
    fn test_malformed_body_string_is_rejected() {
        let raw = r#"{"body-json":{"statusCode":200,"body":"not json"}}"#;
        let envelope = ApiEnvelope::parse(raw).unwrap();
        assert!(matches!(
            envelope.decode_body(),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_wrapper_is_rejected() {
        assert!(ApiEnvelope::parse(r#"{"params":{}}"#).is_err());
    }

    #[test]
    fn test_non_array_body_is_rejected() {
        let raw = r#"{"body-json":{"statusCode":200,"body":"{\"other\":1}"}}"#;
        let envelope = ApiEnvelope::parse(raw).unwrap();
        assert!(matches!(
            envelope.records(),
            Err(WireError::UnexpectedBody(_))
        ));
    }
}
