use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_domain::conversation::{ConversationMessage, UserPreferences};
use forge_domain::drift::{DriftAlert, EvalRun};
use forge_domain::error::Result;
use forge_domain::registry::{McpCallLog, ToolSpec};
use forge_domain::verifier::{VerifierResult, VerifierSpec};
use uuid::Uuid;

/// Storage capability threaded through every handler and background task.
///
/// One implementation per backend (sqlite, postgres, redis, in-process map);
/// selection happens once at startup from [`crate::build_store`].
#[async_trait]
pub trait Store: Send + Sync {
    // ── Tool registry ──────────────────────────────────────────────
    async fn promoted_tools(&self) -> Result<Vec<ToolSpec>>;
    async fn get_tool(&self, tool_name: &str) -> Result<Option<ToolSpec>>;
    async fn append_call_log(&self, entry: McpCallLog) -> Result<()>;
    async fn set_lifecycle(
        &self,
        tool_name: &str,
        state: forge_domain::registry::LifecycleState,
        at: DateTime<Utc>,
        replaced_by: Option<&str>,
    ) -> Result<()>;

    // ── Verifier registry ──────────────────────────────────────────
    async fn verifiers_for_tool(&self, tool_name: &str) -> Result<Vec<VerifierSpec>>;
    async fn append_verifier_result(&self, result: VerifierResult) -> Result<()>;

    // ── Conversation store ──────────────────────────────────────────
    async fn append_message(&self, msg: ConversationMessage) -> Result<i64>;
    async fn list_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationMessage>>;
    async fn incomplete_sessions(&self) -> Result<Vec<String>>;

    // ── Preference store ────────────────────────────────────────────
    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;
    async fn upsert_preferences(&self, prefs: UserPreferences) -> Result<()>;

    // ── Eval runs ────────────────────────────────────────────────────
    async fn recent_eval_runs(&self, tool_name: &str, window: usize) -> Result<Vec<EvalRun>>;
    async fn insert_eval_run(&self, run: EvalRun) -> Result<Uuid>;

    // ── Drift alerts ─────────────────────────────────────────────────
    async fn open_alert_for_tool(&self, tool_name: &str) -> Result<Option<DriftAlert>>;
    /// Insert an open alert and flag the tool in one transaction. No-op
    /// (idempotent) if an open alert for this tool already exists.
    async fn insert_drift_alert_and_flag(&self, alert: DriftAlert) -> Result<()>;
    async fn resolve_drift(&self, alert_id: Uuid, replacement_name: &str) -> Result<()>;
    /// Names of promoted tools (other than `exclude`) whose `promoted_at`
    /// falls in `(after, before_eq]`.
    async fn tools_promoted_between(
        &self,
        after: DateTime<Utc>,
        before_eq: DateTime<Utc>,
        exclude: &str,
    ) -> Result<Vec<String>>;
}
