use forge_domain::verifier::{Outcome, VerifierVerdict};
use regex::Regex;
use serde_json::Value;

/// `spec = {reject?: String, match?: String, outcome?: "warn"|"block"}`.
///
/// Stringifies the body to JSON if it isn't already a string. If `reject`
/// matches, or `match` is given and does *not* match, the outcome is
/// `spec.outcome` (default `warn`). A malformed regex yields `warn` with the
/// compile error as its message.
pub fn verify(spec: &Value, result: &Value) -> VerifierVerdict {
    let text = match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let outcome = spec
        .get("outcome")
        .and_then(|v| v.as_str())
        .map(|s| if s == "block" { Outcome::Block } else { Outcome::Warn })
        .unwrap_or(Outcome::Warn);

    if let Some(reject) = spec.get("reject").and_then(|v| v.as_str()) {
        match Regex::new(reject) {
            Ok(re) => {
                if re.is_match(&text) {
                    return VerifierVerdict {
                        outcome,
                        message: Some(format!("matched reject pattern '{reject}'")),
                        verifier_name: None,
                    };
                }
            }
            Err(e) => {
                return VerifierVerdict {
                    outcome: Outcome::Warn,
                    message: Some(format!("invalid reject pattern: {e}")),
                    verifier_name: None,
                }
            }
        }
    }

    if let Some(expect) = spec.get("match").and_then(|v| v.as_str()) {
        match Regex::new(expect) {
            Ok(re) => {
                if !re.is_match(&text) {
                    return VerifierVerdict {
                        outcome,
                        message: Some(format!("did not match required pattern '{expect}'")),
                        verifier_name: None,
                    };
                }
            }
            Err(e) => {
                return VerifierVerdict {
                    outcome: Outcome::Warn,
                    message: Some(format!("invalid match pattern: {e}")),
                    verifier_name: None,
                }
            }
        }
    }

    VerifierVerdict::pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reject_pattern_warns_by_default() {
        let spec = json!({"reject": "error"});
        let verdict = verify(&spec, &json!("an error occurred"));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn reject_pattern_can_escalate_to_block() {
        let spec = json!({"reject": "fatal", "outcome": "block"});
        let verdict = verify(&spec, &json!("fatal failure"));
        assert_eq!(verdict.outcome, Outcome::Block);
    }

    #[test]
    fn missing_required_match_warns() {
        let spec = json!({"match": "^ok$"});
        let verdict = verify(&spec, &json!("not ok"));
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn malformed_regex_warns_with_compile_error() {
        let spec = json!({"match": "(unclosed"});
        let verdict = verify(&spec, &json!("anything"));
        assert_eq!(verdict.outcome, Outcome::Warn);
        assert!(verdict.message.unwrap().contains("invalid match pattern"));
    }
}
