use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalType {
    Golden,
    Labeled,
    Mixed,
}

/// One row per evaluation run of a tool against a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRun {
    pub id: uuid::Uuid,
    pub tool_name: String,
    pub model: String,
    pub eval_type: EvalType,
    pub total_cases: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// `None` when `total_cases == 0`.
    pub pass_rate: Option<f64>,
    pub run_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub eval_run_id: uuid::Uuid,
    pub case_id: String,
    pub status: CaseStatus,
    pub latency_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Open,
    Resolved,
}

/// At most one `Open` alert may exist per tool at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub id: uuid::Uuid,
    pub tool_name: String,
    pub detected_at: chrono::DateTime<chrono::Utc>,
    pub trigger_tools: Vec<String>,
    pub baseline_rate: f64,
    pub current_rate: f64,
    pub delta: f64,
    pub status: DriftStatus,
    #[serde(default)]
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Result of checking a single tool's rolling pass rate against its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftCheck {
    pub drifting: bool,
    pub delta: f64,
    pub current_rate: f64,
    pub suspects: Vec<String>,
}

/// `drifting ⇔ (baseline - current) >= threshold`.
pub fn evaluate_drift(baseline: f64, current: f64, threshold: f64) -> (bool, f64) {
    let delta = baseline - current;
    (delta >= threshold, delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_detected_at_exact_threshold() {
        let (drifting, delta) = evaluate_drift(0.9, 0.8, 0.1);
        assert!(drifting);
        assert!((delta - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn no_drift_below_threshold() {
        let (drifting, _) = evaluate_drift(0.9, 0.85, 0.1);
        assert!(!drifting);
    }
}
