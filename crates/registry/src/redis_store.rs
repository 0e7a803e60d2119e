//! Redis-backed [`Store`]. Conversation history is windowed at write time
//! (`LTRIM`) rather than read time, trading a slightly wider "window" config
//! surface for O(1) reads of recent history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_domain::conversation::{ConversationMessage, UserPreferences};
use forge_domain::drift::{DriftAlert, DriftStatus, EvalRun};
use forge_domain::error::{Error, Result};
use forge_domain::registry::{LifecycleState, McpCallLog, ToolSpec};
use forge_domain::verifier::{VerifierResult, VerifierSpec};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::store::Store;

pub struct RedisStore {
    conn: ConnectionManager,
    window: usize,
}

impl RedisStore {
    pub async fn connect(url: &str, window: usize) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Store(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(Self { conn, window })
    }

    fn tool_key(name: &str) -> String {
        format!("forge:tool:{name}")
    }
    fn conv_key(session_id: &str) -> String {
        format!("forge:conv:{session_id}")
    }
    fn prefs_key(user_id: &str) -> String {
        format!("forge:prefs:{user_id}")
    }
    fn eval_key(tool_name: &str) -> String {
        format!("forge:evals:{tool_name}")
    }
    fn alert_key(id: Uuid) -> String {
        format!("forge:drift_alert:{id}")
    }
    fn open_alert_key(tool_name: &str) -> String {
        format!("forge:drift_open:{tool_name}")
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn promoted_tools(&self) -> Result<Vec<ToolSpec>> {
        let mut conn = self.conn.clone();
        let names: Vec<String> = conn
            .smembers("forge:tools:index")
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut out = Vec::new();
        for name in names {
            if let Some(spec) = self.get_tool(&name).await? {
                if spec.lifecycle_state == LifecycleState::Promoted {
                    out.push(spec);
                }
            }
        }
        Ok(out)
    }

    async fn get_tool(&self, tool_name: &str) -> Result<Option<ToolSpec>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::tool_key(tool_name))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| Error::Store(e.to_string())))
            .transpose()
    }

    async fn append_call_log(&self, entry: McpCallLog) -> Result<()> {
        let mut conn = self.conn.clone();
        let res: std::result::Result<(), redis::RedisError> = conn
            .lpush("forge:call_log", serde_json::to_string(&entry).unwrap_or_default())
            .await;
        if let Err(e) = res {
            tracing::warn!("mcp call log write failed: {e}");
        }
        Ok(())
    }

    async fn set_lifecycle(
        &self,
        tool_name: &str,
        state: LifecycleState,
        at: DateTime<Utc>,
        replaced_by: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        if let Some(mut spec) = self.get_tool(tool_name).await? {
            spec.lifecycle_state = state;
            match state {
                LifecycleState::Promoted => spec.promoted_at = Some(at),
                LifecycleState::Flagged => spec.flagged_at = Some(at),
                LifecycleState::Retired => spec.retired_at = Some(at),
                LifecycleState::Candidate => {}
            }
            if let Some(r) = replaced_by {
                spec.replaced_by = Some(r.to_string());
            }
            conn.set::<_, _, ()>(Self::tool_key(tool_name), serde_json::to_string(&spec).unwrap_or_default())
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
        }
        Ok(())
    }

    async fn verifiers_for_tool(&self, tool_name: &str) -> Result<Vec<VerifierSpec>> {
        let mut conn = self.conn.clone();
        let mut names: Vec<String> = conn
            .smembers(format!("forge:verifier_bindings:{tool_name}"))
            .await
            .unwrap_or_default();
        let wildcard: Vec<String> = conn
            .smembers("forge:verifier_bindings:*")
            .await
            .unwrap_or_default();
        names.extend(wildcard);

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for name in names {
            if !seen.insert(name.clone()) {
                continue;
            }
            let raw: Option<String> = conn.get(format!("forge:verifier:{name}")).await.ok();
            if let Some(raw) = raw {
                if let Ok(spec) = serde_json::from_str::<VerifierSpec>(&raw) {
                    if spec.enabled {
                        out.push(spec);
                    }
                }
            }
        }
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(out)
    }

    async fn append_verifier_result(&self, result: VerifierResult) -> Result<()> {
        let mut conn = self.conn.clone();
        let res: std::result::Result<(), redis::RedisError> = conn
            .lpush(
                "forge:verifier_results",
                serde_json::to_string(&result).unwrap_or_default(),
            )
            .await;
        if let Err(e) = res {
            tracing::warn!("verifier result log write failed: {e}");
        }
        Ok(())
    }

    async fn append_message(&self, msg: ConversationMessage) -> Result<i64> {
        let mut conn = self.conn.clone();
        let id = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let key = Self::conv_key(&msg.session_id);
        conn.rpush::<_, _, ()>(&key, serde_json::to_string(&msg).unwrap_or_default())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let window = self.window.max(1) as isize;
        conn.ltrim::<_, ()>(&key, -window, -1)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        conn.sadd::<_, _, ()>("forge:conv:index", &msg.session_id)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(id)
    }

    async fn list_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationMessage>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .lrange(Self::conv_key(session_id), 0, -1)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut msgs: Vec<ConversationMessage> = raw
            .iter()
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect();
        msgs.sort_by_key(|m: &ConversationMessage| m.created_at);
        if let Some(limit) = limit {
            if msgs.len() > limit {
                let start = msgs.len() - limit;
                msgs = msgs.split_off(start);
            }
        }
        Ok(msgs)
    }

    async fn incomplete_sessions(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let sessions: Vec<String> = conn
            .smembers("forge:conv:index")
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut out = Vec::new();
        for session_id in sessions {
            let history = self.list_history(&session_id, None).await?;
            if !forge_domain::conversation::is_complete(&history) {
                out.push(session_id);
            }
        }
        Ok(out)
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::prefs_key(user_id))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| Error::Store(e.to_string())))
            .transpose()
    }

    async fn upsert_preferences(&self, prefs: UserPreferences) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(
            Self::prefs_key(&prefs.user_id),
            serde_json::to_string(&prefs).unwrap_or_default(),
        )
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn recent_eval_runs(&self, tool_name: &str, window: usize) -> Result<Vec<EvalRun>> {
        let mut conn = self.conn.clone();
        // -1 means "to the end of the list" in Redis's LRANGE; clamp large
        // windows (e.g. usize::MAX for an unbounded history scan) to that.
        let end: isize = window.max(1).min(isize::MAX as usize - 1) as isize - 1;
        let end = if window >= isize::MAX as usize { -1 } else { end };
        let raw: Vec<String> = conn
            .lrange(Self::eval_key(tool_name), 0, end)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(raw
            .iter()
            .filter_map(|s| serde_json::from_str::<EvalRun>(s).ok())
            .filter(|r| r.pass_rate.is_some() && r.total_cases > 0)
            .collect())
    }

    async fn insert_eval_run(&self, run: EvalRun) -> Result<Uuid> {
        let mut conn = self.conn.clone();
        let id = run.id;
        conn.lpush::<_, _, ()>(Self::eval_key(&run.tool_name), serde_json::to_string(&run).unwrap_or_default())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(id)
    }

    async fn open_alert_for_tool(&self, tool_name: &str) -> Result<Option<DriftAlert>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::open_alert_key(tool_name))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        raw.map(|s| serde_json::from_str(&s).map_err(|e| Error::Store(e.to_string())))
            .transpose()
    }

    async fn insert_drift_alert_and_flag(&self, alert: DriftAlert) -> Result<()> {
        let mut conn = self.conn.clone();
        // SETNX-style guard: only the first caller to claim the open-alert key
        // for this tool gets to insert; this is our idempotence boundary since
        // redis lacks cross-key transactions as convenient as SQL's here.
        let claimed: bool = conn
            .set_nx(Self::open_alert_key(&alert.tool_name), serde_json::to_string(&alert).unwrap_or_default())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        if !claimed {
            return Ok(());
        }
        conn.set::<_, _, ()>(Self::alert_key(alert.id), serde_json::to_string(&alert).unwrap_or_default())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        self.set_lifecycle(&alert.tool_name, LifecycleState::Flagged, alert.detected_at, None)
            .await?;
        Ok(())
    }

    async fn resolve_drift(&self, alert_id: Uuid, replacement_name: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::alert_key(alert_id))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut alert: DriftAlert = raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .ok_or_else(|| Error::NotFound(format!("drift alert {alert_id}")))?;
        let now = Utc::now();
        alert.status = DriftStatus::Resolved;
        alert.resolved_at = Some(now);
        conn.set::<_, _, ()>(Self::alert_key(alert_id), serde_json::to_string(&alert).unwrap_or_default())
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        conn.del::<_, ()>(Self::open_alert_key(&alert.tool_name))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        self.set_lifecycle(&alert.tool_name, LifecycleState::Retired, now, Some(replacement_name))
            .await?;
        self.set_lifecycle(replacement_name, LifecycleState::Promoted, now, None)
            .await?;
        Ok(())
    }

    async fn tools_promoted_between(
        &self,
        after: DateTime<Utc>,
        before_eq: DateTime<Utc>,
        exclude: &str,
    ) -> Result<Vec<String>> {
        let tools = self.promoted_tools().await?;
        Ok(tools
            .into_iter()
            .filter(|t| t.tool_name != exclude)
            .filter_map(|t| t.promoted_at.map(|p| (t.tool_name, p)))
            .filter(|(_, p)| *p > after && *p <= before_eq)
            .map(|(name, _)| name)
            .collect())
    }
}
