//! Post-execution verification of tool results: ordered schema/pattern/custom
//! checks with block short-circuit.

pub mod custom;
pub mod pattern;
pub mod schema;

use forge_domain::verifier::{Outcome, VerifierSpec, VerifierType, VerifierVerdict};
use serde_json::Value;

/// Merge a tool-specific binding list with the wildcard-bound list,
/// deduplicate by verifier name (first-seen wins), and stable-sort by
/// `aciru_order` (absent order sorts last).
pub fn compose(tool_specific: Vec<VerifierSpec>, wildcard: Vec<VerifierSpec>) -> Vec<VerifierSpec> {
    let mut seen = std::collections::HashSet::new();
    let mut merged: Vec<VerifierSpec> = tool_specific
        .into_iter()
        .chain(wildcard)
        .filter(|v| v.enabled && seen.insert(v.verifier_name.clone()))
        .collect();
    merged.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    merged
}

/// Run every verifier in `ordered` against `result` in order, short-circuiting
/// on the first `block`. Returns the worst outcome seen (or `pass`).
pub fn run(
    custom_registry: &custom::CustomVerifierRegistry,
    ordered: &[VerifierSpec],
    tool_name: &str,
    args: &Value,
    result: &Value,
) -> VerifierVerdict {
    let mut worst = VerifierVerdict::pass();

    for verifier in ordered {
        let verdict = match verifier.type_ {
            VerifierType::Schema => schema::verify(&verifier.spec, result),
            VerifierType::Pattern => pattern::verify(&verifier.spec, result),
            VerifierType::Custom => custom_registry.verify(&verifier.spec, tool_name, args, result),
        };
        let verdict = VerifierVerdict {
            outcome: verdict.outcome,
            message: verdict.message,
            verifier_name: Some(verifier.verifier_name.clone()),
        };

        if verdict.outcome == Outcome::Block {
            return verdict;
        }
        if verdict.outcome > worst.outcome {
            worst = verdict;
        }
    }

    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, order: &str, spec: Value) -> VerifierSpec {
        VerifierSpec {
            verifier_name: name.into(),
            type_: VerifierType::Schema,
            aciru_order: Some(order.into()),
            spec,
            enabled: true,
        }
    }

    #[test]
    fn block_short_circuits_before_later_verifiers() {
        let registry = custom::CustomVerifierRegistry::new("/tmp/verifiers");
        let verifiers = vec![
            spec("pass-check", "A-0001", json!({"required": []})),
            spec("block-check", "A-0002", json!({"required": ["missing_field"]})),
        ];
        let verdict = run(&registry, &verifiers, "tool_c", &json!({}), &json!({"other": "data"}));
        assert_eq!(verdict.outcome, Outcome::Block);
        assert_eq!(verdict.verifier_name.as_deref(), Some("block-check"));
    }

    #[test]
    fn compose_dedups_first_seen_and_sorts() {
        let tool_specific = vec![spec("v2", "C-0001", json!({}))];
        let wildcard = vec![spec("v1", "A-0001", json!({})), spec("v2", "Z-9999", json!({}))];
        let merged = compose(tool_specific, wildcard);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].verifier_name, "v1");
        assert_eq!(merged[1].verifier_name, "v2");
        assert_eq!(merged[1].aciru_order.as_deref(), Some("C-0001"));
    }
}
