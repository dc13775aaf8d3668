use std::collections::HashMap;

use crate::builtins::text_arg;
use crate::callable::Callable;
use crate::evaluator::RuntimeError;
use crate::host::HostObject;
use crate::value::Value;

/// The `json` namespace: `encode` and `decode`.
#[derive(Debug)]
pub struct Json;

impl HostObject for Json {
    fn type_name(&self) -> &str {
        "json"
    }

    fn get(&self, property: &str) -> Option<Value> {
        let function = match property {
            "encode" => Callable::native("json.encode", |_, args| {
                let value = args.first().cloned().unwrap_or(Value::Absent);
                Ok(Value::text(to_json(&value).to_string()))
            }),
            "decode" => Callable::native("json.decode", |_, args| {
                let text = text_arg(args, 0)?;
                let json = serde_json::from_str(&text).map_err(|e| RuntimeError::InvalidJson {
                    reason: e.to_string(),
                })?;
                Ok(from_json(&json))
            }),
            _ => return None,
        };
        Some(Value::Callable(function))
    }
}

/// A decoded JSON object, exposed to scripts as a read-only property bag.
#[derive(Debug)]
struct JsonObject {
    entries: HashMap<String, Value>,
}

impl HostObject for JsonObject {
    fn type_name(&self) -> &str {
        "object"
    }

    fn get(&self, property: &str) -> Option<Value> {
        self.entries.get(property).cloned()
    }

    fn as_json(&self) -> Option<serde_json::Value> {
        let map = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect();
        Some(serde_json::Value::Object(map))
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => {
            // keep integral numbers integral on the wire
            if n.fract() == 0.0 && n.is_finite() && *n >= i64::MIN as f64 && *n <= i64::MAX as f64
            {
                serde_json::Value::Number((*n as i64).into())
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Absent => serde_json::Value::Null,
        Value::Array(elements) => {
            serde_json::Value::Array(elements.borrow().iter().map(to_json).collect())
        }
        Value::Callable(function) => serde_json::Value::String(function.to_string()),
        Value::Host(object) => object
            .as_json()
            .unwrap_or_else(|| serde_json::Value::String(format!("<{}>", object.type_name()))),
    }
}

fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Absent,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Value::text(s.clone()),
        serde_json::Value::Array(elements) => {
            Value::array(elements.iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            let entries = map
                .iter()
                .map(|(key, value)| (key.clone(), from_json(value)))
                .collect();
            Value::host(JsonObject { entries })
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips_scalars_and_arrays() {
        let value = Value::array(vec![Value::Number(1.0), Value::text("x"), Value::Bool(true)]);
        let encoded = to_json(&value).to_string();
        assert_eq!(encoded, r#"[1,"x",true]"#);
        assert_eq!(from_json(&serde_json::from_str(&encoded).expect("valid")), value);
    }

    #[test]
    fn objects_decode_to_property_bags() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, 2], "b": true}"#).expect("valid");
        let Value::Host(object) = from_json(&json) else {
            panic!("expected a host object");
        };
        assert_eq!(
            object.get("a"),
            Some(Value::array(vec![Value::Number(1.0), Value::Number(2.0)]))
        );
        assert_eq!(object.get("b"), Some(Value::Bool(true)));
        assert_eq!(object.get("missing"), None);
    }
}
