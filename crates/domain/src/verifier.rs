use serde::{Deserialize, Serialize};

/// Verification result severity. Ordered `Pass < Warn < Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Warn,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierType {
    Schema,
    Pattern,
    Custom,
}

/// `verifier_name` is unique. `aciru_order` sorts lexicographically with the
/// convention `A-NNNN < C-NNNN < I-NNNN < R-NNNN < U-NNNN`; a verifier with no
/// order sorts after every ordered one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierSpec {
    pub verifier_name: String,
    #[serde(rename = "type")]
    pub type_: VerifierType,
    #[serde(default)]
    pub aciru_order: Option<String>,
    pub spec: serde_json::Value,
    #[serde(default = "d_enabled")]
    pub enabled: bool,
}

fn d_enabled() -> bool {
    true
}

impl VerifierSpec {
    /// Sort key such that verifiers without an explicit order sort last,
    /// and ordered ones sort lexicographically by their `aciru_order`.
    pub fn sort_key(&self) -> (bool, &str) {
        match &self.aciru_order {
            Some(order) => (false, order.as_str()),
            None => (true, self.verifier_name.as_str()),
        }
    }
}

/// A `(verifier_name, tool_name)` binding. `tool_name == "*"` is the wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierBinding {
    pub verifier_name: String,
    pub tool_name: String,
}

/// One row appended to the `verifier_results` log after a verification runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierResult {
    pub session_id: String,
    pub tool_name: String,
    pub verifier_name: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifierVerdict {
    pub outcome: Outcome,
    pub message: Option<String>,
    /// Name of the verifier that produced this outcome.
    pub verifier_name: Option<String>,
}

impl VerifierVerdict {
    pub fn pass() -> Self {
        Self {
            outcome: Outcome::Pass,
            message: None,
            verifier_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_ordering() {
        assert!(Outcome::Pass < Outcome::Warn);
        assert!(Outcome::Warn < Outcome::Block);
    }

    #[test]
    fn sort_key_puts_unordered_last() {
        let with_order = VerifierSpec {
            verifier_name: "v1".into(),
            type_: VerifierType::Schema,
            aciru_order: Some("A-0001".into()),
            spec: serde_json::json!({}),
            enabled: true,
        };
        let without_order = VerifierSpec {
            verifier_name: "v2".into(),
            type_: VerifierType::Schema,
            aciru_order: None,
            spec: serde_json::json!({}),
            enabled: true,
        };
        assert!(with_order.sort_key() < without_order.sort_key());
    }
}
