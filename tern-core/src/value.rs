//! The extended value model carried by tern
//!
//! Plain JSON can only describe null, booleans, numbers, strings, arrays and
//! objects. RPC inputs and outputs frequently need more than that, so `Value`
//! adds five variants on top of the JSON data model:
//!
//! - **Date**: a UTC instant, millisecond precision on the wire
//! - **RegExp**: a pattern source plus its flag letters
//! - **Map**: an insertion-ordered map with string, number or boolean keys
//! - **Set**: an insertion-ordered collection of unique values
//! - **BigInt**: an arbitrary-precision integer
//!
//! `Value` is an owned tree, so cyclic structures cannot be built. The codec
//! in [`crate::codec`] turns any `Value` into JSON text and back.
//!
//! # Examples
//!
//! ```rust
//! use tern_core::{MapKey, Value};
//!
//! let tags = Value::set(vec![Value::from("admin"), Value::from("staff"), Value::from("admin")]);
//! assert_eq!(tags.as_set().map(|s| s.len()), Some(2));
//!
//! let scores = Value::map(vec![
//!     (MapKey::from("alice"), Value::from(1)),
//!     (MapKey::from("bob"), Value::from(2)),
//!     (MapKey::from("alice"), Value::from(3)),
//! ]);
//! let scores = scores.as_map().unwrap();
//! assert_eq!(scores.get(&MapKey::from("alice")), Some(&Value::from(3)));
//! assert_eq!(scores.len(), 2);
//! ```

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

/// A value that can cross the wire with its type intact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number; integer-ness is preserved
    Number(Number),
    /// JSON string
    String(String),
    /// JSON array
    List(Vec<Value>),
    /// JSON object; key order is not significant
    Object(BTreeMap<String, Value>),
    /// A UTC instant
    Date(DateTime<Utc>),
    /// A regular expression
    RegExp(RegExp),
    /// An insertion-ordered map with unique keys
    Map(ValueMap),
    /// An insertion-ordered set of unique values
    Set(ValueSet),
    /// An arbitrary-precision integer
    BigInt(BigInt),
}

impl Value {
    /// Build a `Date`, truncated to the millisecond precision the wire carries
    pub fn date(instant: DateTime<Utc>) -> Self {
        Value::Date(instant.trunc_subsecs(3))
    }

    /// Build a `RegExp` from its source and flag letters
    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp(RegExp::new(source, flags))
    }

    /// Build a `Map`; a repeated key keeps its first position and its last value
    pub fn map(entries: impl IntoIterator<Item = (MapKey, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Build a `Set`; a repeated element keeps its first occurrence
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(items.into_iter().collect())
    }

    /// Build an `Object` from key/value pairs
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_regexp(&self) -> Option<&RegExp> {
        match self {
            Value::RegExp(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::BigInt(n) => Some(n),
            _ => None,
        }
    }

    /// Look up a field of an `Object`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Flatten into plain JSON, dropping the extended type information
    ///
    /// Dates become ISO-8601 strings, regular expressions their `/source/flags`
    /// literal, maps an array of `[key, value]` pairs, sets an array and big
    /// integers their decimal string. This is the shape serde-driven typed
    /// handlers deserialize from.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Date(d) => Json::String(format_date(d)),
            Value::RegExp(r) => Json::String(r.to_string()),
            Value::Map(m) => Json::Array(
                m.iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
            Value::Set(s) => Json::Array(s.iter().map(Value::to_json).collect()),
            Value::BigInt(n) => Json::String(n.to_string()),
        }
    }
}

/// Render an instant the way the wire expects: RFC 3339, milliseconds, `Z`
pub fn format_date(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize any `Serialize` type into a `Value`
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| Error::Codec(e.to_string()))
}

/// Deserialize a `Value` into any `DeserializeOwned` type
///
/// Extended variants are flattened with [`Value::to_json`] first, so a
/// `chrono::DateTime<Utc>` field accepts a `Date` and a `Vec<T>` accepts a `Set`.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    serde_json::from_value(value.to_json()).map_err(|e| Error::Codec(e.to_string()))
}

/// A regular expression carried as source text plus flag letters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegExp {
    pub source: String,
    pub flags: String,
}

impl RegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Compile the pattern with the `regex` crate
    ///
    /// The `i`, `m`, `s` and `x` flags become inline flags. Other flags
    /// (`g`, `u`, `y`, `d`) are carried on the wire but have no effect here.
    pub fn to_regex(&self) -> Result<regex::Regex> {
        let inline: String = self
            .flags
            .chars()
            .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
            .collect();

        let pattern = if inline.is_empty() {
            self.source.clone()
        } else {
            format!("(?{}){}", inline, self.source)
        };

        regex::Regex::new(&pattern).map_err(|e| Error::Codec(e.to_string()))
    }
}

impl fmt::Display for RegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// Keys a `Map` may use
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    String(String),
    Number(Number),
    Bool(bool),
}

impl MapKey {
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            MapKey::String(s) => serde_json::Value::String(s.clone()),
            MapKey::Number(n) => serde_json::Value::Number(n.clone()),
            MapKey::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::String(s)
    }
}

impl From<i64> for MapKey {
    fn from(n: i64) -> Self {
        MapKey::Number(n.into())
    }
}

impl From<bool> for MapKey {
    fn from(b: bool) -> Self {
        MapKey::Bool(b)
    }
}

/// Insertion-ordered map with unique keys
///
/// Two maps are equal when they hold the same entries in the same order.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: IndexMap<MapKey, Value>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: MapKey, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, MapKey, Value> {
        self.entries.iter()
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl Eq for ValueMap {}

impl Hash for ValueMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.entries.len());
        for entry in &self.entries {
            entry.hash(state);
        }
    }
}

impl FromIterator<(MapKey, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (MapKey, Value)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Insertion-ordered set; uniqueness is structural equality
///
/// Like [`ValueMap`], equality also compares order.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    items: IndexSet<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element; returns false if an equal element was already present
    pub fn insert(&mut self, value: Value) -> bool {
        self.items.insert(value)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, Value> {
        self.items.iter()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.items.iter().eq(other.items.iter())
    }
}

impl Eq for ValueSet {}

impl Hash for ValueSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.items.len());
        for item in &self.items {
            item.hash(state);
        }
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n.into())
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(instant: DateTime<Utc>) -> Self {
        Value::date(instant)
    }
}

impl From<RegExp> for Value {
    fn from(r: RegExp) -> Self {
        Value::RegExp(r)
    }
}

impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Self {
        Value::Map(m)
    }
}

impl From<ValueSet> for Value {
    fn from(s: ValueSet) -> Self {
        Value::Set(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Plain JSON converts structurally; no extended types are inferred
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_map_keeps_first_position_last_value() {
        let value = Value::map(vec![
            (MapKey::from("a"), Value::from(1)),
            (MapKey::from("b"), Value::from(2)),
            (MapKey::from("a"), Value::from(3)),
        ]);
        let map = value.as_map().unwrap();
        let keys: Vec<_> = map.iter().map(|(k, _)| k.clone()).collect();

        assert_eq!(keys, vec![MapKey::from("a"), MapKey::from("b")]);
        assert_eq!(map.get(&MapKey::from("a")), Some(&Value::from(3)));
    }

    #[test]
    fn test_map_keys_of_different_types_are_distinct() {
        let value = Value::map(vec![
            (MapKey::from("1"), Value::from("string")),
            (MapKey::from(1), Value::from("number")),
            (MapKey::from(true), Value::from("bool")),
        ]);
        assert_eq!(value.as_map().unwrap().len(), 3);
    }

    #[test]
    fn test_set_uses_structural_equality() {
        let value = Value::set(vec![
            Value::object(vec![("id", Value::from(1))]),
            Value::object(vec![("id", Value::from(1))]),
            Value::object(vec![("id", Value::from(2))]),
        ]);
        let set = value.as_set().unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&Value::object(vec![("id", Value::from(2))])));
    }

    #[test]
    fn test_large_set_and_map_dedupe() {
        let set: ValueSet = (0..50_000).map(|i| Value::from(i % 25_000)).collect();
        assert_eq!(set.len(), 25_000);
        assert_eq!(set.iter().next(), Some(&Value::from(0)));
        assert!(set.contains(&Value::from(24_999)));

        let map: ValueMap = (0..50_000)
            .map(|i| (MapKey::from(i % 25_000), Value::from(i)))
            .collect();
        assert_eq!(map.len(), 25_000);
        assert_eq!(map.get(&MapKey::from(3)), Some(&Value::from(25_003)));
    }

    #[test]
    fn test_collection_equality_is_ordered() {
        let ab = Value::set(vec![Value::from("a"), Value::from("b")]);
        let ba = Value::set(vec![Value::from("b"), Value::from("a")]);
        assert_ne!(ab, ba);

        // Sets of sets dedupe on the same ordered equality
        let nested = Value::set(vec![ab.clone(), ab.clone(), ba]);
        assert_eq!(nested.as_set().unwrap().len(), 2);
    }

    #[test]
    fn test_date_truncated_to_millis() {
        let instant = Utc.timestamp_nanos(1_700_000_000_123_456_789);
        let value = Value::date(instant);

        assert_eq!(
            format_date(value.as_date().unwrap()),
            "2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn test_regexp_display_and_compile() {
        let r = RegExp::new("^hello", "gi");
        assert_eq!(r.to_string(), "/^hello/gi");

        let compiled = r.to_regex().unwrap();
        assert!(compiled.is_match("HELLO world"));
        assert!(!compiled.is_match("say hello"));
    }

    #[test]
    fn test_regexp_invalid_pattern() {
        let r = RegExp::new("(unclosed", "");
        assert!(matches!(r.to_regex(), Err(Error::Codec(_))));
    }

    #[test]
    fn test_from_json_is_structural() {
        let json = serde_json::json!({"when": "2024-01-01T00:00:00.000Z", "n": [1, 2]});
        let value = Value::from(json);

        assert_eq!(
            value.get("when"),
            Some(&Value::from("2024-01-01T00:00:00.000Z"))
        );
        assert_eq!(
            value.get("n"),
            Some(&Value::List(vec![Value::from(1), Value::from(2)]))
        );
    }

    #[test]
    fn test_typed_round_trip_through_serde() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct User {
            name: String,
            born: DateTime<Utc>,
            tags: Vec<String>,
        }

        let value = Value::object(vec![
            ("name", Value::from("Ada")),
            ("born", Value::date(Utc.with_ymd_and_hms(1815, 12, 10, 0, 0, 0).unwrap())),
            ("tags", Value::set(vec![Value::from("math")])),
        ]);

        let user: User = from_value(&value).unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(user.tags, vec!["math".to_string()]);

        let back = to_value(&user).unwrap();
        assert_eq!(back.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_bigint_to_json_is_decimal_string() {
        let n: BigInt = "123456789012345678901234567890".parse().unwrap();
        assert_eq!(
            Value::from(n).to_json(),
            serde_json::json!("123456789012345678901234567890")
        );
    }
}
