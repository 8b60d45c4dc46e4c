//! Message payload values.

use std::collections::BTreeMap;

use serde_json::{Number, Value};

/// A single payload value. Binary values are kept as bytes until rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Non-integral number, rendered as a JSON number.
    Float(Number),
    Text(String),
    Bytes(Vec<u8>),
    /// Array or object, rendered structurally.
    Nested(Value),
}

/// Payload of a message, ordered by key.
pub type Bindings = BTreeMap<String, BindingValue>;

impl BindingValue {
    /// JSON form: bytes become lowercase hex strings.
    pub fn to_json(&self) -> Value {
        match self {
            BindingValue::Null => Value::Null,
            BindingValue::Bool(b) => Value::Bool(*b),
            BindingValue::Int(n) => Value::from(*n),
            BindingValue::UInt(n) => Value::from(*n),
            BindingValue::Float(n) => Value::Number(n.clone()),
            BindingValue::Text(s) => Value::String(s.clone()),
            BindingValue::Bytes(bytes) => Value::String(hex::encode(bytes)),
            BindingValue::Nested(value) => value.clone(),
        }
    }

    /// Reads a JSON value. Integers keep their sign; arrays and objects are
    /// kept as they are.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => BindingValue::Null,
            Value::Bool(b) => BindingValue::Bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    BindingValue::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    BindingValue::Int(i)
                } else {
                    BindingValue::Float(n.clone())
                }
            }
            Value::String(s) => BindingValue::Text(s.clone()),
            nested @ (Value::Array(_) | Value::Object(_)) => BindingValue::Nested(nested.clone()),
        }
    }
}

impl From<bool> for BindingValue {
    fn from(value: bool) -> Self {
        BindingValue::Bool(value)
    }
}

impl From<i64> for BindingValue {
    fn from(value: i64) -> Self {
        BindingValue::Int(value)
    }
}

impl From<u64> for BindingValue {
    fn from(value: u64) -> Self {
        BindingValue::UInt(value)
    }
}

impl From<&str> for BindingValue {
    fn from(value: &str) -> Self {
        BindingValue::Text(value.to_string())
    }
}

impl From<String> for BindingValue {
    fn from(value: String) -> Self {
        BindingValue::Text(value)
    }
}

impl From<Vec<u8>> for BindingValue {
    fn from(value: Vec<u8>) -> Self {
        BindingValue::Bytes(value)
    }
}

impl<T: Into<BindingValue>> From<Option<T>> for BindingValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(BindingValue::Null, Into::into)
    }
}

/// Builds a [`Bindings`] map from `key => value` pairs.
///
/// ```
/// use tally_protocol::bindings;
/// let b = bindings! { "asset" => "XCP", "quantity" => 5u64 };
/// assert_eq!(b.len(), 2);
/// ```
#[macro_export]
macro_rules! bindings {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::messages::Bindings::new();
        $(map.insert(($key).to_string(), $crate::messages::BindingValue::from($value));)*
        map
    }};
}

/// Converts a JSON object into bindings. Non-objects yield an empty map.
pub fn bindings_from_json(value: &Value) -> Bindings {
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(k, v)| (k.clone(), BindingValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes_render_as_hex() {
        assert_eq!(BindingValue::Bytes(vec![0x00, 0xff]).to_json(), json!("00ff"));
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(BindingValue::from(None::<&str>), BindingValue::Null);
        assert_eq!(BindingValue::from(Some("x")), BindingValue::Text("x".to_string()));
    }

    #[test]
    fn json_numbers_keep_sign() {
        assert_eq!(BindingValue::from_json(&json!(7)), BindingValue::UInt(7));
        assert_eq!(BindingValue::from_json(&json!(-7)), BindingValue::Int(-7));
    }

    #[test]
    fn floats_and_nested_values_stay_structured() {
        let b = bindings_from_json(&json!({"fee_fraction": 0.5, "tags": [1, 2]}));
        assert_eq!(b["fee_fraction"].to_json(), json!(0.5));
        assert_eq!(b["tags"], BindingValue::Nested(json!([1, 2])));
    }

    #[test]
    fn macro_builds_sorted_map() {
        let b = bindings! { "zeta" => 1u64, "alpha" => "a", "memo" => vec![1u8] };
        let keys: Vec<&str> = b.keys().map(String::as_str).collect();
        assert_eq!(keys, ["alpha", "memo", "zeta"]);
    }

    #[test]
    fn objects_convert_to_bindings() {
        let b = bindings_from_json(&json!({"a": true, "b": null}));
        assert_eq!(b["a"], BindingValue::Bool(true));
        assert_eq!(b["b"], BindingValue::Null);
        assert!(bindings_from_json(&json!([1, 2])).is_empty());
    }
}
