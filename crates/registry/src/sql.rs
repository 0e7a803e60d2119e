//! SQLite/Postgres-backed [`Store`] implementation.
//!
//! Both backends are reached through `sqlx`'s `Any` driver so the same SQL
//! and row-extraction code serves either one; only the connection string
//! and a handful of DDL quirks (autoincrement, boolean literals) differ.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_domain::conversation::{ConversationMessage, UserPreferences};
use forge_domain::drift::{DriftAlert, DriftStatus, EvalRun, EvalType};
use forge_domain::error::{Error, Result};
use forge_domain::hitl::HitlLevel;
use forge_domain::registry::{
    HttpMethod, LifecycleState, McpCallLog, McpRouting, ParamMapping, ParamSchema, ToolSpec,
};
use forge_domain::tool::Role;
use forge_domain::verifier::{Outcome, VerifierResult, VerifierSpec, VerifierType};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::store::Store;

pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    pub async fn connect_sqlite(url: &str, enable_wal: bool) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        if enable_wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
        }
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn connect_postgres(url: &str) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS tools (
                tool_name TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                input_schema TEXT NOT NULL,
                mcp_routing TEXT NOT NULL,
                requires_confirmation INTEGER NOT NULL,
                category TEXT,
                lifecycle_state TEXT NOT NULL,
                promoted_at TEXT,
                flagged_at TEXT,
                retired_at TEXT,
                baseline_pass_rate REAL,
                replaced_by TEXT
            )",
            "CREATE TABLE IF NOT EXISTS mcp_call_log (
                tool_name TEXT NOT NULL,
                input TEXT NOT NULL,
                output TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                error TEXT,
                called_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS verifiers (
                verifier_name TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                aciru_order TEXT,
                spec TEXT NOT NULL,
                enabled INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS verifier_bindings (
                verifier_name TEXT NOT NULL,
                tool_name TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS verifier_results (
                session_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                verifier_name TEXT NOT NULL,
                outcome TEXT NOT NULL,
                message TEXT,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS conversation_messages (
                id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                stage TEXT,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS preferences (
                user_id TEXT PRIMARY KEY,
                model TEXT,
                hitl_level TEXT,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS eval_runs (
                id TEXT PRIMARY KEY,
                tool_name TEXT NOT NULL,
                model TEXT NOT NULL,
                eval_type TEXT NOT NULL,
                total_cases INTEGER NOT NULL,
                passed INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                skipped INTEGER NOT NULL,
                pass_rate REAL,
                run_at TEXT NOT NULL,
                notes TEXT
            )",
            "CREATE TABLE IF NOT EXISTS drift_alerts (
                id TEXT PRIMARY KEY,
                tool_name TEXT NOT NULL,
                detected_at TEXT NOT NULL,
                trigger_tools TEXT NOT NULL,
                baseline_rate REAL NOT NULL,
                current_rate REAL NOT NULL,
                delta REAL NOT NULL,
                status TEXT NOT NULL,
                resolved_at TEXT
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
        }
        Ok(())
    }
}

fn row_to_tool(row: &sqlx::any::AnyRow) -> Result<ToolSpec> {
    let input_schema: HashMap<String, ParamSchema> =
        serde_json::from_str(row.try_get::<String, _>("input_schema").unwrap_or_default().as_str())
            .map_err(|e| Error::Store(e.to_string()))?;
    let mcp_routing: McpRouting =
        serde_json::from_str(row.try_get::<String, _>("mcp_routing").unwrap_or_default().as_str())
            .map_err(|e| Error::Store(e.to_string()))?;
    let lifecycle_state = parse_lifecycle(&row.try_get::<String, _>("lifecycle_state").unwrap_or_default())?;
    Ok(ToolSpec {
        tool_name: row.try_get("tool_name").unwrap_or_default(),
        description: row.try_get("description").unwrap_or_default(),
        input_schema,
        mcp_routing,
        requires_confirmation: row.try_get::<i64, _>("requires_confirmation").unwrap_or(0) != 0,
        category: row.try_get("category").ok(),
        lifecycle_state,
        promoted_at: parse_opt_dt(row.try_get("promoted_at").ok()),
        flagged_at: parse_opt_dt(row.try_get("flagged_at").ok()),
        retired_at: parse_opt_dt(row.try_get("retired_at").ok()),
        baseline_pass_rate: row.try_get("baseline_pass_rate").ok(),
        replaced_by: row.try_get("replaced_by").ok(),
    })
}

fn parse_lifecycle(s: &str) -> Result<LifecycleState> {
    match s {
        "candidate" => Ok(LifecycleState::Candidate),
        "promoted" => Ok(LifecycleState::Promoted),
        "flagged" => Ok(LifecycleState::Flagged),
        "retired" => Ok(LifecycleState::Retired),
        other => Err(Error::Store(format!("unknown lifecycle state '{other}'"))),
    }
}

fn lifecycle_str(s: LifecycleState) -> &'static str {
    match s {
        LifecycleState::Candidate => "candidate",
        LifecycleState::Promoted => "promoted",
        LifecycleState::Flagged => "flagged",
        LifecycleState::Retired => "retired",
    }
}

fn parse_opt_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|v| v.with_timezone(&Utc))
}

fn fmt_opt_dt(d: Option<DateTime<Utc>>) -> Option<String> {
    d.map(|v| v.to_rfc3339())
}

#[async_trait]
impl Store for SqlStore {
    async fn promoted_tools(&self) -> Result<Vec<ToolSpec>> {
        let rows = sqlx::query("SELECT * FROM tools WHERE lifecycle_state = 'promoted'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match row_to_tool(row) {
                Ok(spec) => out.push(spec),
                Err(e) => tracing::warn!("skipping malformed tool row: {e}"),
            }
        }
        Ok(out)
    }

    async fn get_tool(&self, tool_name: &str) -> Result<Option<ToolSpec>> {
        let row = sqlx::query("SELECT * FROM tools WHERE tool_name = ?")
            .bind(tool_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        row.as_ref().map(row_to_tool).transpose()
    }

    async fn append_call_log(&self, entry: McpCallLog) -> Result<()> {
        let res = sqlx::query(
            "INSERT INTO mcp_call_log (tool_name, input, output, status_code, latency_ms, error, called_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.tool_name)
        .bind(entry.input.to_string())
        .bind(entry.output.to_string())
        .bind(entry.status_code as i64)
        .bind(entry.latency_ms as i64)
        .bind(entry.error)
        .bind(entry.called_at.to_rfc3339())
        .execute(&self.pool)
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
        let column = match state {
            LifecycleState::Promoted => "promoted_at",
            LifecycleState::Flagged => "flagged_at",
            LifecycleState::Retired => "retired_at",
            LifecycleState::Candidate => "promoted_at",
        };
        let sql = format!(
            "UPDATE tools SET lifecycle_state = ?, {column} = ?, replaced_by = COALESCE(?, replaced_by) WHERE tool_name = ?"
        );
        sqlx::query(&sql)
            .bind(lifecycle_str(state))
            .bind(at.to_rfc3339())
            .bind(replaced_by)
            .bind(tool_name)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn verifiers_for_tool(&self, tool_name: &str) -> Result<Vec<VerifierSpec>> {
        let rows = sqlx::query(
            "SELECT v.* FROM verifiers v
             JOIN verifier_bindings b ON b.verifier_name = v.verifier_name
             WHERE v.enabled = 1 AND (b.tool_name = ? OR b.tool_name = '*')",
        )
        .bind(tool_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for row in &rows {
            let name: String = row.try_get("verifier_name").unwrap_or_default();
            if !seen.insert(name.clone()) {
                continue;
            }
            let type_str: String = row.try_get("type").unwrap_or_default();
            let type_ = match type_str.as_str() {
                "schema" => VerifierType::Schema,
                "pattern" => VerifierType::Pattern,
                "custom" => VerifierType::Custom,
                other => {
                    tracing::warn!("unknown verifier type '{other}', skipping {name}");
                    continue;
                }
            };
            let spec: serde_json::Value =
                serde_json::from_str(&row.try_get::<String, _>("spec").unwrap_or_default())
                    .unwrap_or(serde_json::Value::Null);
            out.push(VerifierSpec {
                verifier_name: name,
                type_,
                aciru_order: row.try_get("aciru_order").ok(),
                spec,
                enabled: true,
            });
        }
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(out)
    }

    async fn append_verifier_result(&self, result: VerifierResult) -> Result<()> {
        let outcome = match result.outcome {
            Outcome::Pass => "pass",
            Outcome::Warn => "warn",
            Outcome::Block => "block",
        };
        let res = sqlx::query(
            "INSERT INTO verifier_results (session_id, tool_name, verifier_name, outcome, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(result.session_id)
        .bind(result.tool_name)
        .bind(result.verifier_name)
        .bind(outcome)
        .bind(result.message)
        .bind(result.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;
        if let Err(e) = res {
            tracing::warn!("verifier result log write failed: {e}");
        }
        Ok(())
    }

    async fn append_message(&self, msg: ConversationMessage) -> Result<i64> {
        let id = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let role = role_str(msg.role);
        sqlx::query(
            "INSERT INTO conversation_messages (id, session_id, role, content, stage, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(msg.session_id)
        .bind(role)
        .bind(msg.content)
        .bind(msg.stage)
        .bind(msg.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(id)
    }

    async fn list_history(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationMessage>> {
        let rows = sqlx::query(
            "SELECT role, content, stage, created_at FROM conversation_messages
             WHERE session_id = ? ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        let mut out: Vec<ConversationMessage> = rows
            .iter()
            .filter_map(|row| {
                let role = parse_role(&row.try_get::<String, _>("role").ok()?).ok()?;
                let created_at = DateTime::parse_from_rfc3339(&row.try_get::<String, _>("created_at").ok()?)
                    .ok()?
                    .with_timezone(&Utc);
                Some(ConversationMessage {
                    session_id: session_id.to_string(),
                    role,
                    content: row.try_get("content").unwrap_or_default(),
                    stage: row.try_get("stage").ok(),
                    created_at,
                })
            })
            .collect();

        if let Some(limit) = limit {
            if out.len() > limit {
                let start = out.len() - limit;
                out = out.split_off(start);
            }
        }
        Ok(out)
    }

    async fn incomplete_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT session_id FROM conversation_messages")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut out = Vec::new();
        for row in &rows {
            let session_id: String = row.try_get("session_id").unwrap_or_default();
            let history = self.list_history(&session_id, None).await?;
            if !forge_domain::conversation::is_complete(&history) {
                out.push(session_id);
            }
        }
        Ok(out)
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let row = sqlx::query("SELECT * FROM preferences WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(row.map(|row| UserPreferences {
            user_id: row.try_get("user_id").unwrap_or_default(),
            model: row.try_get("model").ok(),
            hitl_level: row
                .try_get::<String, _>("hitl_level")
                .ok()
                .and_then(|s| parse_hitl_level(&s)),
            updated_at: parse_opt_dt(row.try_get("updated_at").ok()).unwrap_or_else(Utc::now),
        }))
    }

    async fn upsert_preferences(&self, prefs: UserPreferences) -> Result<()> {
        sqlx::query(
            "INSERT INTO preferences (user_id, model, hitl_level, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET
               model = excluded.model, hitl_level = excluded.hitl_level, updated_at = excluded.updated_at",
        )
        .bind(prefs.user_id)
        .bind(prefs.model)
        .bind(prefs.hitl_level.map(hitl_level_str))
        .bind(prefs.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn recent_eval_runs(&self, tool_name: &str, window: usize) -> Result<Vec<EvalRun>> {
        let rows = sqlx::query(
            "SELECT * FROM eval_runs WHERE tool_name = ? AND pass_rate IS NOT NULL AND total_cases > 0
             ORDER BY run_at DESC",
        )
        .bind(tool_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows.iter().take(window) {
            out.push(EvalRun {
                id: Uuid::from_str(&row.try_get::<String, _>("id").unwrap_or_default())
                    .unwrap_or_else(|_| Uuid::nil()),
                tool_name: row.try_get("tool_name").unwrap_or_default(),
                model: row.try_get("model").unwrap_or_default(),
                eval_type: parse_eval_type(&row.try_get::<String, _>("eval_type").unwrap_or_default()),
                total_cases: row.try_get::<i64, _>("total_cases").unwrap_or(0) as u32,
                passed: row.try_get::<i64, _>("passed").unwrap_or(0) as u32,
                failed: row.try_get::<i64, _>("failed").unwrap_or(0) as u32,
                skipped: row.try_get::<i64, _>("skipped").unwrap_or(0) as u32,
                pass_rate: row.try_get("pass_rate").ok(),
                run_at: parse_opt_dt(row.try_get("run_at").ok()).unwrap_or_else(Utc::now),
                notes: row.try_get("notes").ok(),
            });
        }
        Ok(out)
    }

    async fn insert_eval_run(&self, run: EvalRun) -> Result<Uuid> {
        sqlx::query(
            "INSERT INTO eval_runs (id, tool_name, model, eval_type, total_cases, passed, failed, skipped, pass_rate, run_at, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.to_string())
        .bind(&run.tool_name)
        .bind(&run.model)
        .bind(eval_type_str(run.eval_type))
        .bind(run.total_cases as i64)
        .bind(run.passed as i64)
        .bind(run.failed as i64)
        .bind(run.skipped as i64)
        .bind(run.pass_rate)
        .bind(run.run_at.to_rfc3339())
        .bind(&run.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(run.id)
    }

    async fn open_alert_for_tool(&self, tool_name: &str) -> Result<Option<DriftAlert>> {
        let row = sqlx::query("SELECT * FROM drift_alerts WHERE tool_name = ? AND status = 'open'")
            .bind(tool_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(row.map(|row| row_to_alert(&row)))
    }

    async fn insert_drift_alert_and_flag(&self, alert: DriftAlert) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| Error::Store(e.to_string()))?;

        let existing = sqlx::query("SELECT id FROM drift_alerts WHERE tool_name = ? AND status = 'open'")
            .bind(&alert.tool_name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        if existing.is_some() {
            tx.commit().await.map_err(|e| Error::Store(e.to_string()))?;
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO drift_alerts (id, tool_name, detected_at, trigger_tools, baseline_rate, current_rate, delta, status, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'open', NULL)",
        )
        .bind(alert.id.to_string())
        .bind(&alert.tool_name)
        .bind(alert.detected_at.to_rfc3339())
        .bind(serde_json::to_string(&alert.trigger_tools).unwrap_or_default())
        .bind(alert.baseline_rate)
        .bind(alert.current_rate)
        .bind(alert.delta)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query("UPDATE tools SET lifecycle_state = 'flagged', flagged_at = ? WHERE tool_name = ?")
            .bind(alert.detected_at.to_rfc3339())
            .bind(&alert.tool_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        tx.commit().await.map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn resolve_drift(&self, alert_id: Uuid, replacement_name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| Error::Store(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let row = sqlx::query("SELECT tool_name FROM drift_alerts WHERE id = ?")
            .bind(alert_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("drift alert {alert_id}")))?;
        let tool_name: String = row.try_get("tool_name").unwrap_or_default();

        sqlx::query("UPDATE drift_alerts SET status = 'resolved', resolved_at = ? WHERE id = ?")
            .bind(&now)
            .bind(alert_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            "UPDATE tools SET lifecycle_state = 'retired', retired_at = ?, replaced_by = ? WHERE tool_name = ?",
        )
        .bind(&now)
        .bind(replacement_name)
        .bind(&tool_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query("UPDATE tools SET lifecycle_state = 'promoted', promoted_at = ? WHERE tool_name = ?")
            .bind(&now)
            .bind(replacement_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        tx.commit().await.map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn tools_promoted_between(
        &self,
        after: DateTime<Utc>,
        before_eq: DateTime<Utc>,
        exclude: &str,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT tool_name FROM tools WHERE promoted_at > ? AND promoted_at <= ? AND tool_name != ?",
        )
        .bind(after.to_rfc3339())
        .bind(before_eq.to_rfc3339())
        .bind(exclude)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|row| row.try_get::<String, _>("tool_name").unwrap_or_default())
            .collect())
    }
}

fn row_to_alert(row: &sqlx::any::AnyRow) -> DriftAlert {
    DriftAlert {
        id: Uuid::from_str(&row.try_get::<String, _>("id").unwrap_or_default()).unwrap_or_else(|_| Uuid::nil()),
        tool_name: row.try_get("tool_name").unwrap_or_default(),
        detected_at: parse_opt_dt(row.try_get("detected_at").ok()).unwrap_or_else(Utc::now),
        trigger_tools: serde_json::from_str(&row.try_get::<String, _>("trigger_tools").unwrap_or_default())
            .unwrap_or_default(),
        baseline_rate: row.try_get("baseline_rate").unwrap_or_default(),
        current_rate: row.try_get("current_rate").unwrap_or_default(),
        delta: row.try_get("delta").unwrap_or_default(),
        status: match row.try_get::<String, _>("status").unwrap_or_default().as_str() {
            "resolved" => DriftStatus::Resolved,
            _ => DriftStatus::Open,
        },
        resolved_at: parse_opt_dt(row.try_get("resolved_at").ok()),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn parse_role(s: &str) -> Result<Role> {
    match s {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "tool" => Ok(Role::Tool),
        other => Err(Error::Store(format!("unknown role '{other}'"))),
    }
}

fn hitl_level_str(level: HitlLevel) -> &'static str {
    match level {
        HitlLevel::Autonomous => "autonomous",
        HitlLevel::Cautious => "cautious",
        HitlLevel::Standard => "standard",
        HitlLevel::Paranoid => "paranoid",
    }
}

fn parse_hitl_level(s: &str) -> Option<HitlLevel> {
    match s {
        "autonomous" => Some(HitlLevel::Autonomous),
        "cautious" => Some(HitlLevel::Cautious),
        "standard" => Some(HitlLevel::Standard),
        "paranoid" => Some(HitlLevel::Paranoid),
        _ => None,
    }
}

fn eval_type_str(t: EvalType) -> &'static str {
    match t {
        EvalType::Golden => "golden",
        EvalType::Labeled => "labeled",
        EvalType::Mixed => "mixed",
    }
}

fn parse_eval_type(s: &str) -> EvalType {
    match s {
        "labeled" => EvalType::Labeled,
        "mixed" => EvalType::Mixed,
        _ => EvalType::Golden,
    }
}
