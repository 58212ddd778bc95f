//! The closed set of values that flow between SQL arguments, stored
//! documents and result rows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field map of a stored document. Ordered so that wildcard projections are
/// deterministic.
pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Map(Fields),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Column type name reported for result rows.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "INT64",
            Value::Float(_) => "FLOAT64",
            Value::String(_) => "STRING",
            Value::Bytes(_) => "BYTES",
            Value::Map(_) => "MAP",
            Value::List(_) => "ARRAY",
        }
    }

    /// Looks up a dotted path (`address.city`) through nested maps.
    pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Writes `value` at a dotted path, creating intermediate maps and
    /// replacing non-map values along the way.
    pub fn set_path(fields: &mut Fields, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                fields.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let entry = fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Map(Fields::new()));
                if !matches!(entry, Value::Map(_)) {
                    *entry = Value::Map(Fields::new());
                }
                if let Value::Map(inner) = entry {
                    Value::set_path(inner, rest, value);
                }
            }
        }
    }

    /// Comparison used by store filters. Integers and floats compare
    /// numerically; values of unrelated types are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality with numeric widening, so `1` and `1.0` match.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Total order for sorting mixed-type result sets: values group by type
    /// (null first), then compare within the type.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.compare(other).unwrap_or(Ordering::Equal))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(bytes) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        let value = Value::from(json!({"name": "Alice", "age": 30, "score": 1.5, "tags": ["a"]}));
        let fields = value.as_map().unwrap();
        assert_eq!(fields["name"], Value::from("Alice"));
        assert_eq!(fields["age"], Value::Int(30));
        assert_eq!(fields["score"], Value::Float(1.5));
        assert_eq!(fields["tags"], Value::List(vec![Value::from("a")]));

        let back = serde_json::Value::from(value);
        assert_eq!(back["age"], json!(30));
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let json = serde_json::to_value(Value::Bytes(b"hi".to_vec())).unwrap();
        assert_eq!(json, json!("aGk="));
    }

    #[test]
    fn test_compare_numeric_widening() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Some(Ordering::Less));
        assert!(Value::Int(1).loosely_equals(&Value::Float(1.0)));
        assert_eq!(Value::from("a").compare(&Value::Int(1)), None);
        assert!(!Value::from("1").loosely_equals(&Value::Int(1)));
    }

    #[test]
    fn test_lookup_nested() {
        let value = Value::from(json!({"address": {"city": "Paris"}}));
        let fields = value.as_map().unwrap();
        assert_eq!(Value::lookup(fields, "address.city"), Some(&Value::from("Paris")));
        assert_eq!(Value::lookup(fields, "address.zip"), None);
        assert_eq!(Value::lookup(fields, "missing"), None);
    }

    #[test]
    fn test_set_path_nested() {
        let mut fields = Fields::new();
        fields.insert("address".to_string(), Value::from("flat"));
        Value::set_path(&mut fields, "address.city", Value::from("Lyon"));
        Value::set_path(&mut fields, "name", Value::from("a"));
        assert_eq!(
            Value::Map(fields),
            Value::from(json!({"address": {"city": "Lyon"}, "name": "a"}))
        );
    }

    #[test]
    fn test_sort_cmp_groups_types() {
        let mut values = vec![Value::from("b"), Value::Int(2), Value::Null, Value::Float(1.5)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![Value::Null, Value::Float(1.5), Value::Int(2), Value::from("b")]
        );
    }
}
