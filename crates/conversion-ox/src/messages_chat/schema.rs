use serde_json::{Map, Value};

use super::constants::{SCHEMA_MAP_KEYS, STRIPPED_SCHEMA_KEYS};

/// Strip schema keys the Chat function dialect does not accept
///
/// At every object level:
/// - Remove `$schema`, `additionalProperties`, `title` and `examples`
/// - Remove `format` when the same object has `type: "string"`
/// - Recurse into `properties` (name → schema, names are kept as-is),
///   `items`, and any other nested object
///
/// Arrays other than `items` are left untouched. The input is not mutated
/// and `clean_schema(&clean_schema(s)) == clean_schema(s)`.
pub fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(clean_object(obj)),
        other => other.clone(),
    }
}

fn clean_object(obj: &Map<String, Value>) -> Map<String, Value> {
    let string_typed = obj.get("type").and_then(Value::as_str) == Some("string");

    obj.iter()
        .filter(|(key, _)| {
            !STRIPPED_SCHEMA_KEYS.contains(&key.as_str()) && !(string_typed && key.as_str() == "format")
        })
        .map(|(key, value)| {
            let cleaned = match value {
                Value::Object(inner) if SCHEMA_MAP_KEYS.contains(&key.as_str()) => Value::Object(
                    inner
                        .iter()
                        .map(|(name, sub)| (name.clone(), clean_schema(sub)))
                        .collect(),
                ),
                // tuple-style `items`
                Value::Array(elements) if key == "items" => {
                    Value::Array(elements.iter().map(clean_schema).collect())
                }
                Value::Object(inner) => Value::Object(clean_object(inner)),
                other => other.clone(),
            };
            (key.clone(), cleaned)
        })
        .collect()
}
