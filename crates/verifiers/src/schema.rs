use forge_domain::verifier::{Outcome, VerifierVerdict};
use serde_json::Value;

/// `spec = {required: [String], properties: {key: {type: String}}}`.
///
/// The result body must be an object; every name in `required` must be
/// present; for each declared property present in the body its JSON type
/// (with `array` distinguished from `object`) must match. Any violation is
/// a `block`.
pub fn verify(spec: &Value, result: &Value) -> VerifierVerdict {
    let Some(body) = result.as_object() else {
        return block("result body is not a JSON object");
    };

    if let Some(required) = spec.get("required").and_then(|v| v.as_array()) {
        for name in required {
            let Some(name) = name.as_str() else { continue };
            if !body.contains_key(name) {
                return block(&format!("missing required field '{name}'"));
            }
        }
    }

    if let Some(properties) = spec.get("properties").and_then(|v| v.as_object()) {
        for (key, def) in properties {
            let Some(value) = body.get(key) else { continue };
            let Some(expected) = def.get("type").and_then(|v| v.as_str()) else {
                continue;
            };
            let actual = json_type_name(value);
            if actual != expected {
                return block(&format!(
                    "field '{key}' has type '{actual}', expected '{expected}'"
                ));
            }
        }
    }

    VerifierVerdict::pass()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn block(message: &str) -> VerifierVerdict {
    VerifierVerdict {
        outcome: Outcome::Block,
        message: Some(message.to_string()),
        verifier_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_when_required_fields_present() {
        let spec = json!({"required": ["temp"]});
        let verdict = verify(&spec, &json!({"temp": 72}));
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[test]
    fn blocks_on_missing_required_field() {
        let spec = json!({"required": ["temp"]});
        let verdict = verify(&spec, &json!({"other": 1}));
        assert_eq!(verdict.outcome, Outcome::Block);
    }

    #[test]
    fn blocks_on_type_mismatch_distinguishing_array_from_object() {
        let spec = json!({"properties": {"items": {"type": "array"}}});
        let verdict = verify(&spec, &json!({"items": {}}));
        assert_eq!(verdict.outcome, Outcome::Block);
    }

    #[test]
    fn non_object_body_blocks() {
        let verdict = verify(&json!({}), &json!("plain string"));
        assert_eq!(verdict.outcome, Outcome::Block);
    }
}
