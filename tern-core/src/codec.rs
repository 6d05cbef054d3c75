//! Type-preserving codec between `Value` and JSON text
//!
//! JSON has no dates, regular expressions, ordered maps, sets or big
//! integers. This codec carries them anyway by wrapping each one in a tagged
//! object on the way out and recognizing the wrapper on the way in:
//!
//! ```json
//! { "__bst__": "set", "value": [1, 2, 3] }
//! ```
//!
//! # Type Handlers
//!
//! Each extended type is owned by a [`TypeHandler`]. The handlers form a
//! fixed, ordered list: `date`, `regexp`, `map`, `set`, `bigint`. At every
//! node the first handler that claims the node wins.
//!
//! | Tag | Payload |
//! |---|---|
//! | *(none)* | dates travel as ISO-8601 strings with milliseconds and `Z` |
//! | `regexp` | the literal `/source/flags` |
//! | `map` | an array of `[key, value]` pairs |
//! | `set` | an array of elements |
//! | `bigint` | a decimal string |
//!
//! # Date Ambiguity
//!
//! Dates carry no tag, so decoding promotes *any* string that looks like an
//! ISO-8601 UTC timestamp to a `Date`. Sending the string
//! `"2024-01-01T00:00:00.000Z"` therefore arrives as a `Date`. Map keys are
//! the exception: they are read verbatim and never become dates.
//!
//! The reverse also holds for instants outside years 0000 to 9999. They
//! render with an expanded year such as `+10000-01-01T00:00:00.000Z`, which
//! does not match the four-digit pattern, so they decode as plain strings.
//!
//! # Reserved Field
//!
//! Objects whose `__bst__` field names a known tag are always treated as
//! wrappers. Plain objects should not use that field name.
//!
//! # Examples
//!
//! ```rust
//! use tern_core::{codec, Value};
//!
//! let value = Value::set(vec![Value::from(1), Value::from(2)]);
//! let text = codec::encode(&value).unwrap();
//! assert_eq!(text, r#"{"__bst__":"set","value":[1,2]}"#);
//!
//! let decoded = codec::decode(&text).unwrap();
//! assert_eq!(decoded, value);
//! ```

use crate::error::{Error, Result};
use crate::value::{format_date, MapKey, RegExp, Value, ValueMap, ValueSet};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use regex::Regex;
use serde_json::{Map, Value as Json};
use std::sync::OnceLock;

/// Name of the field that marks a tagged wrapper
pub const TYPE_FIELD: &str = "__bst__";

/// Name of the field holding a wrapper's payload
pub const VALUE_FIELD: &str = "value";

pub type EncodeFn<'a> = &'a dyn Fn(&Value) -> Result<Json>;
pub type DecodeFn<'a> = &'a dyn Fn(&Json) -> Result<Value>;

/// Converts one extended type to and from its JSON form
///
/// `encode` and `decode` receive the codec's own recursion so a handler
/// can hand nested values back for processing.
pub trait TypeHandler: Send + Sync {
    /// Tag written to the wrapper, or `None` for types carried untagged
    fn tag(&self) -> Option<&'static str>;

    fn can_encode(&self, value: &Value) -> bool;

    fn encode(&self, value: &Value, inner: EncodeFn<'_>) -> Result<Json>;

    /// Default: the node is an object whose type field equals this handler's tag
    fn can_decode(&self, node: &Json) -> bool {
        match (self.tag(), node) {
            (Some(tag), Json::Object(map)) => {
                map.get(TYPE_FIELD).and_then(Json::as_str) == Some(tag)
            }
            _ => false,
        }
    }

    fn decode(&self, node: &Json, inner: DecodeFn<'_>) -> Result<Value>;
}

/// The registered handlers, in matching order
pub fn handlers() -> &'static [&'static dyn TypeHandler] {
    static HANDLERS: [&dyn TypeHandler; 5] = [
        &DateHandler,
        &RegExpHandler,
        &MapHandler,
        &SetHandler,
        &BigIntHandler,
    ];
    &HANDLERS
}

/// Encode a value to JSON text
pub fn encode(value: &Value) -> Result<String> {
    let json = encode_value(value)?;
    Ok(serde_json::to_string(&json)?)
}

/// Encode a value to a JSON tree, wrapping extended types
pub fn encode_value(value: &Value) -> Result<Json> {
    if let Some(handler) = handlers().iter().find(|h| h.can_encode(value)) {
        return handler.encode(value, &encode_value);
    }

    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(encode_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(key.clone(), encode_value(item)?);
            }
            Json::Object(out)
        }
        other => {
            return Err(Error::Codec(format!(
                "no handler accepts value: {:?}",
                other
            )))
        }
    })
}

/// Decode JSON text into a value, reviving extended types
pub fn decode(text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text)?;
    decode_value(&json)
}

/// Revive a parsed JSON tree
///
/// Children are revived before the node that contains them is built.
pub fn decode_value(node: &Json) -> Result<Value> {
    if let Some(handler) = handlers().iter().find(|h| h.can_decode(node)) {
        return handler.decode(node, &decode_value);
    }

    Ok(match node {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(map) => {
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in map {
                out.insert(key.clone(), decode_value(item)?);
            }
            Value::Object(out)
        }
    })
}

/// The body-carrying request envelope `{ "method", "input" }`
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `None` when the field is absent or not a string
    pub method: Option<String>,
    /// `Null` when absent
    pub input: Value,
}

/// Encode a request envelope
pub fn encode_envelope(method: &str, input: &Value) -> Result<String> {
    let mut map = Map::new();
    map.insert("method".to_string(), Json::String(method.to_string()));
    map.insert("input".to_string(), encode_value(input)?);
    Ok(serde_json::to_string(&Json::Object(map))?)
}

/// Decode a request envelope
///
/// Fails only when the text is not valid JSON or a wrapper is malformed.
/// A body that is valid JSON but not an object yields an envelope with no
/// method.
pub fn decode_envelope(text: &str) -> Result<Envelope> {
    let json: Json = serde_json::from_str(text)?;
    let Json::Object(map) = json else {
        return Ok(Envelope {
            method: None,
            input: Value::Null,
        });
    };

    let method = map.get("method").and_then(Json::as_str).map(str::to_string);
    let input = match map.get("input") {
        Some(node) => decode_value(node)?,
        None => Value::Null,
    };

    Ok(Envelope { method, input })
}

fn wrap(tag: &str, payload: Json) -> Json {
    let mut map = Map::new();
    map.insert(TYPE_FIELD.to_string(), Json::String(tag.to_string()));
    map.insert(VALUE_FIELD.to_string(), payload);
    Json::Object(map)
}

fn payload<'a>(node: &'a Json, tag: &str) -> Result<&'a Json> {
    node.get(VALUE_FIELD)
        .ok_or_else(|| Error::Codec(format!("{} wrapper has no payload", tag)))
}

fn date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^\d{4}-[01]\d-[0-3]\dT[0-2]\d:[0-5]\d:[0-5]\d(.*Z)").ok()
        })
        .as_ref()
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if !date_pattern()?.is_match(s) {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

struct DateHandler;

impl TypeHandler for DateHandler {
    fn tag(&self) -> Option<&'static str> {
        None
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    fn encode(&self, value: &Value, _inner: EncodeFn<'_>) -> Result<Json> {
        match value {
            Value::Date(d) => Ok(Json::String(format_date(d))),
            _ => Err(Error::Codec("date handler given a non-date".into())),
        }
    }

    fn can_decode(&self, node: &Json) -> bool {
        node.as_str().and_then(parse_date).is_some()
    }

    fn decode(&self, node: &Json, _inner: DecodeFn<'_>) -> Result<Value> {
        node.as_str()
            .and_then(parse_date)
            .map(Value::date)
            .ok_or_else(|| Error::Codec("invalid date".into()))
    }
}

struct RegExpHandler;

impl TypeHandler for RegExpHandler {
    fn tag(&self) -> Option<&'static str> {
        Some("regexp")
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::RegExp(_))
    }

    fn encode(&self, value: &Value, _inner: EncodeFn<'_>) -> Result<Json> {
        match value {
            Value::RegExp(r) => Ok(wrap("regexp", Json::String(r.to_string()))),
            _ => Err(Error::Codec("regexp handler given a non-regexp".into())),
        }
    }

    fn decode(&self, node: &Json, _inner: DecodeFn<'_>) -> Result<Value> {
        let literal = payload(node, "regexp")?
            .as_str()
            .ok_or_else(|| Error::Codec("regexp payload must be a string".into()))?;

        // Source runs from the first slash to the last one
        let start = literal.find('/');
        let end = literal.rfind('/');
        match (start, end) {
            (Some(start), Some(end)) if end > start => Ok(Value::RegExp(RegExp::new(
                &literal[start + 1..end],
                &literal[end + 1..],
            ))),
            _ => Err(Error::Codec(format!(
                "regexp payload is not a /source/flags literal: {}",
                literal
            ))),
        }
    }
}

struct MapHandler;

impl TypeHandler for MapHandler {
    fn tag(&self) -> Option<&'static str> {
        Some("map")
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn encode(&self, value: &Value, inner: EncodeFn<'_>) -> Result<Json> {
        let Value::Map(map) = value else {
            return Err(Error::Codec("map handler given a non-map".into()));
        };

        let mut pairs = Vec::with_capacity(map.len());
        for (key, item) in map.iter() {
            pairs.push(Json::Array(vec![key.to_json(), inner(item)?]));
        }
        Ok(wrap("map", Json::Array(pairs)))
    }

    fn decode(&self, node: &Json, inner: DecodeFn<'_>) -> Result<Value> {
        let pairs = payload(node, "map")?
            .as_array()
            .ok_or_else(|| Error::Codec("map payload must be an array".into()))?;

        let mut map = ValueMap::new();
        for pair in pairs {
            let (key, item) = match pair.as_array().map(Vec::as_slice) {
                Some([key, item]) => (key, item),
                _ => return Err(Error::Codec("map entry must be a [key, value] pair".into())),
            };
            let key = match key {
                Json::String(s) => MapKey::String(s.clone()),
                Json::Number(n) => MapKey::Number(n.clone()),
                Json::Bool(b) => MapKey::Bool(*b),
                other => {
                    return Err(Error::Codec(format!("unsupported map key: {}", other)))
                }
            };
            map.insert(key, inner(item)?);
        }
        Ok(Value::Map(map))
    }
}

struct SetHandler;

impl TypeHandler for SetHandler {
    fn tag(&self) -> Option<&'static str> {
        Some("set")
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Set(_))
    }

    fn encode(&self, value: &Value, inner: EncodeFn<'_>) -> Result<Json> {
        let Value::Set(set) = value else {
            return Err(Error::Codec("set handler given a non-set".into()));
        };

        let items = set.iter().map(inner).collect::<Result<Vec<_>>>()?;
        Ok(wrap("set", Json::Array(items)))
    }

    fn decode(&self, node: &Json, inner: DecodeFn<'_>) -> Result<Value> {
        let items = payload(node, "set")?
            .as_array()
            .ok_or_else(|| Error::Codec("set payload must be an array".into()))?;

        let set = items
            .iter()
            .map(inner)
            .collect::<Result<ValueSet>>()?;
        Ok(Value::Set(set))
    }
}

struct BigIntHandler;

impl TypeHandler for BigIntHandler {
    fn tag(&self) -> Option<&'static str> {
        Some("bigint")
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::BigInt(_))
    }

    fn encode(&self, value: &Value, _inner: EncodeFn<'_>) -> Result<Json> {
        match value {
            Value::BigInt(n) => Ok(wrap("bigint", Json::String(n.to_string()))),
            _ => Err(Error::Codec("bigint handler given a non-bigint".into())),
        }
    }

    fn decode(&self, node: &Json, _inner: DecodeFn<'_>) -> Result<Value> {
        let digits = payload(node, "bigint")?
            .as_str()
            .ok_or_else(|| Error::Codec("bigint payload must be a decimal string".into()))?;

        digits
            .parse::<BigInt>()
            .map(Value::BigInt)
            .map_err(|e| Error::Codec(format!("invalid bigint {:?}: {}", digits, e)))
    }
}
