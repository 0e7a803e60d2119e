//! In-process `Store`, backed by `parking_lot::RwLock`-guarded maps.
//!
//! Used for the `memory` conversation-store config option and for tests.
//! Carries no cross-process durability — acceptable per the spec's
//! stated non-goal around in-memory HITL/state consistency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_domain::conversation::{ConversationMessage, UserPreferences};
use forge_domain::drift::{DriftAlert, DriftStatus, EvalRun};
use forge_domain::error::{Error, Result};
use forge_domain::registry::{LifecycleState, McpCallLog, ToolSpec};
use forge_domain::verifier::{VerifierResult, VerifierSpec};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::Store;

#[derive(Default)]
struct Inner {
    tools: HashMap<String, ToolSpec>,
    call_log: Vec<McpCallLog>,
    verifiers: Vec<VerifierSpec>,
    bindings: Vec<(String, String)>,
    verifier_results: Vec<VerifierResult>,
    messages: Vec<ConversationMessage>,
    preferences: HashMap<String, UserPreferences>,
    eval_runs: Vec<EvalRun>,
    drift_alerts: Vec<DriftAlert>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Seed the registry with a tool (used by tests and by bootstrap when
    /// no external registry is configured).
    pub fn insert_tool(&self, spec: ToolSpec) {
        self.inner.write().tools.insert(spec.tool_name.clone(), spec);
    }

    pub fn bind_verifier(&self, verifier: VerifierSpec, tool_name: impl Into<String>) {
        let mut inner = self.inner.write();
        let name = verifier.verifier_name.clone();
        inner.verifiers.push(verifier);
        inner.bindings.push((name, tool_name.into()));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn promoted_tools(&self) -> Result<Vec<ToolSpec>> {
        Ok(self
            .inner
            .read()
            .tools
            .values()
            .filter(|t| t.lifecycle_state == LifecycleState::Promoted)
            .cloned()
            .collect())
    }

    async fn get_tool(&self, tool_name: &str) -> Result<Option<ToolSpec>> {
        Ok(self.inner.read().tools.get(tool_name).cloned())
    }

    async fn append_call_log(&self, entry: McpCallLog) -> Result<()> {
        self.inner.write().call_log.push(entry);
        Ok(())
    }

    async fn set_lifecycle(
        &self,
        tool_name: &str,
        state: LifecycleState,
        at: DateTime<Utc>,
        replaced_by: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(tool) = inner.tools.get_mut(tool_name) {
            tool.lifecycle_state = state;
            match state {
                LifecycleState::Promoted => tool.promoted_at = Some(at),
                LifecycleState::Flagged => tool.flagged_at = Some(at),
                LifecycleState::Retired => tool.retired_at = Some(at),
                LifecycleState::Candidate => {}
            }
            if let Some(r) = replaced_by {
                tool.replaced_by = Some(r.to_string());
            }
        }
        Ok(())
    }

    async fn verifiers_for_tool(&self, tool_name: &str) -> Result<Vec<VerifierSpec>> {
        let inner = self.inner.read();
        let names: std::collections::HashSet<&str> = inner
            .bindings
            .iter()
            .filter(|(_, t)| t == tool_name || t == "*")
            .map(|(v, _)| v.as_str())
            .collect();
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<VerifierSpec> = inner
            .verifiers
            .iter()
            .filter(|v| v.enabled && names.contains(v.verifier_name.as_str()))
            .filter(|v| seen.insert(v.verifier_name.clone()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(out)
    }

    async fn append_verifier_result(&self, result: VerifierResult) -> Result<()> {
        self.inner.write().verifier_results.push(result);
        Ok(())
    }

    async fn append_message(&self, msg: ConversationMessage) -> Result<i64> {
        let id = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.inner.write().messages.push(msg);
        Ok(id)
    }

    async fn list_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationMessage>> {
        let inner = self.inner.read();
        let mut msgs: Vec<ConversationMessage> = inner
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        msgs.sort_by_key(|m| m.created_at);
        if let Some(limit) = limit {
            if msgs.len() > limit {
                let start = msgs.len() - limit;
                msgs = msgs.split_off(start);
            }
        }
        Ok(msgs)
    }

    async fn incomplete_sessions(&self) -> Result<Vec<String>> {
        let inner = self.inner.read();
        let sessions: std::collections::HashSet<&str> =
            inner.messages.iter().map(|m| m.session_id.as_str()).collect();
        Ok(sessions
            .into_iter()
            .filter(|s| {
                let history: Vec<ConversationMessage> = inner
                    .messages
                    .iter()
                    .filter(|m| m.session_id == *s)
                    .cloned()
                    .collect();
                !forge_domain::conversation::is_complete(&history)
            })
            .map(String::from)
            .collect())
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.inner.read().preferences.get(user_id).cloned())
    }

    async fn upsert_preferences(&self, prefs: UserPreferences) -> Result<()> {
        self.inner
            .write()
            .preferences
            .insert(prefs.user_id.clone(), prefs);
        Ok(())
    }

    async fn recent_eval_runs(&self, tool_name: &str, window: usize) -> Result<Vec<EvalRun>> {
        let inner = self.inner.read();
        let mut runs: Vec<EvalRun> = inner
            .eval_runs
            .iter()
            .filter(|r| r.tool_name == tool_name && r.pass_rate.is_some() && r.total_cases > 0)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.run_at.cmp(&a.run_at));
        runs.truncate(window);
        Ok(runs)
    }

    async fn insert_eval_run(&self, run: EvalRun) -> Result<Uuid> {
        let id = run.id;
        self.inner.write().eval_runs.push(run);
        Ok(id)
    }

    async fn open_alert_for_tool(&self, tool_name: &str) -> Result<Option<DriftAlert>> {
        Ok(self
            .inner
            .read()
            .drift_alerts
            .iter()
            .find(|a| a.tool_name == tool_name && a.status == DriftStatus::Open)
            .cloned())
    }

    async fn insert_drift_alert_and_flag(&self, alert: DriftAlert) -> Result<()> {
        let mut inner = self.inner.write();
        if inner
            .drift_alerts
            .iter()
            .any(|a| a.tool_name == alert.tool_name && a.status == DriftStatus::Open)
        {
            return Ok(());
        }
        if let Some(tool) = inner.tools.get_mut(&alert.tool_name) {
            tool.lifecycle_state = LifecycleState::Flagged;
            tool.flagged_at = Some(alert.detected_at);
        }
        inner.drift_alerts.push(alert);
        Ok(())
    }

    async fn resolve_drift(&self, alert_id: Uuid, replacement_name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let now = Utc::now();
        let tool_name = {
            let alert = inner
                .drift_alerts
                .iter_mut()
                .find(|a| a.id == alert_id)
                .ok_or_else(|| Error::NotFound(format!("drift alert {alert_id}")))?;
            alert.status = DriftStatus::Resolved;
            alert.resolved_at = Some(now);
            alert.tool_name.clone()
        };
        if let Some(tool) = inner.tools.get_mut(&tool_name) {
            tool.lifecycle_state = LifecycleState::Retired;
            tool.retired_at = Some(now);
            tool.replaced_by = Some(replacement_name.to_string());
        }
        if let Some(replacement) = inner.tools.get_mut(replacement_name) {
            replacement.lifecycle_state = LifecycleState::Promoted;
            replacement.promoted_at = Some(now);
        }
        Ok(())
    }

    async fn tools_promoted_between(
        &self,
        after: DateTime<Utc>,
        before_eq: DateTime<Utc>,
        exclude: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()
            .tools
            .values()
            .filter(|t| t.tool_name != exclude)
            .filter_map(|t| t.promoted_at.map(|p| (t.tool_name.clone(), p)))
            .filter(|(_, p)| *p > after && *p <= before_eq)
            .map(|(name, _)| name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::registry::{HttpMethod, McpRouting};

    fn tool(name: &str) -> ToolSpec {
        ToolSpec {
            tool_name: name.into(),
            description: String::new(),
            input_schema: HashMap::new(),
            mcp_routing: McpRouting {
                endpoint: format!("/{name}"),
                method: HttpMethod::Get,
                param_map: HashMap::new(),
            },
            requires_confirmation: false,
            category: None,
            lifecycle_state: LifecycleState::Promoted,
            promoted_at: None,
            flagged_at: None,
            retired_at: None,
            baseline_pass_rate: None,
            replaced_by: None,
        }
    }

    #[tokio::test]
    async fn promoted_tools_excludes_candidates() {
        let store = MemoryStore::new();
        store.insert_tool(tool("a"));
        let mut b = tool("b");
        b.lifecycle_state = LifecycleState::Candidate;
        store.insert_tool(b);
        let promoted = store.promoted_tools().await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].tool_name, "a");
    }

    #[tokio::test]
    async fn drift_alert_insertion_is_idempotent() {
        let store = MemoryStore::new();
        store.insert_tool(tool("a"));
        let alert = DriftAlert {
            id: Uuid::new_v4(),
            tool_name: "a".into(),
            detected_at: Utc::now(),
            trigger_tools: vec![],
            baseline_rate: 0.9,
            current_rate: 0.7,
            delta: 0.2,
            status: DriftStatus::Open,
            resolved_at: None,
        };
        store.insert_drift_alert_and_flag(alert.clone()).await.unwrap();
        let mut second = alert;
        second.id = Uuid::new_v4();
        store.insert_drift_alert_and_flag(second).await.unwrap();
        assert_eq!(store.inner.read().drift_alerts.len(), 1);
    }
}
