//! Drift monitor: compares a tool's rolling eval pass-rate against its
//! recorded baseline and attributes regressions to recently-promoted tools.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use forge_domain::drift::{evaluate_drift, DriftAlert, DriftCheck, DriftStatus};
use forge_domain::error::Result;
use forge_registry::Store;
use uuid::Uuid;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Rolling average of up to `window` most recent eval runs with a non-null
/// pass rate and at least one case, or `None` if there are no such runs.
pub async fn rolling_average(store: &dyn Store, tool_name: &str, window: usize) -> Result<Option<f64>> {
    let runs = store.recent_eval_runs(tool_name, window).await?;
    if runs.is_empty() {
        return Ok(None);
    }
    let sum: f64 = runs.iter().filter_map(|r| r.pass_rate).sum();
    let count = runs.iter().filter(|r| r.pass_rate.is_some()).count();
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(sum / count as f64))
}

/// Tools whose `promoted_at` falls strictly after the flagged tool's last
/// clean eval run and on-or-before `flagged_at`.
async fn compute_suspects(store: &dyn Store, tool_name: &str, baseline: f64, flagged_at: chrono::DateTime<Utc>) -> Result<Vec<String>> {
    let history = store.recent_eval_runs(tool_name, usize::MAX).await?;
    let last_clean = history
        .iter()
        .filter(|r| r.pass_rate.map(|p| p >= baseline).unwrap_or(false))
        .max_by_key(|r| r.run_at);
    let Some(last_clean) = last_clean else {
        return Ok(Vec::new());
    };
    store
        .tools_promoted_between(last_clean.run_at, flagged_at, tool_name)
        .await
}

/// Check one tool's drift status. Does not persist anything.
pub async fn check_drift(
    store: &dyn Store,
    tool_name: &str,
    baseline_pass_rate: f64,
    window: usize,
    threshold: f64,
) -> Result<DriftCheck> {
    let current = rolling_average(store, tool_name, window).await?.unwrap_or(baseline_pass_rate);
    let (drifting, delta) = evaluate_drift(baseline_pass_rate, current, threshold);
    let suspects = if drifting {
        compute_suspects(store, tool_name, baseline_pass_rate, Utc::now()).await?
    } else {
        Vec::new()
    };
    Ok(DriftCheck {
        drifting,
        delta,
        current_rate: current,
        suspects,
    })
}

/// Run one tick over every promoted tool: check drift, and for any tool that
/// is drifting with no existing open alert, atomically flag it and insert
/// an alert row. Idempotent across repeated calls within the same window.
pub async fn tick(store: &dyn Store, window: usize, threshold: f64) -> Result<Vec<DriftAlert>> {
    let tools = store.promoted_tools().await?;
    let mut new_alerts = Vec::new();

    for tool in tools {
        let Some(baseline) = tool.baseline_pass_rate else {
            continue;
        };
        if store.open_alert_for_tool(&tool.tool_name).await?.is_some() {
            continue;
        }
        let check = match check_drift(store, &tool.tool_name, baseline, window, threshold).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("drift check failed for {}: {e}", tool.tool_name);
                continue;
            }
        };
        if !check.drifting {
            continue;
        }
        let detected_at = Utc::now();
        let alert = DriftAlert {
            id: Uuid::new_v4(),
            tool_name: tool.tool_name.clone(),
            detected_at,
            trigger_tools: check.suspects,
            baseline_rate: baseline,
            current_rate: check.current_rate,
            delta: check.delta,
            status: DriftStatus::Open,
            resolved_at: None,
        };
        if let Err(e) = store.insert_drift_alert_and_flag(alert.clone()).await {
            tracing::warn!("failed to persist drift alert for {}: {e}", tool.tool_name);
            continue;
        }
        new_alerts.push(alert);
    }

    Ok(new_alerts)
}

/// Resolve an open alert: mark it resolved, retire the flagged tool, and
/// promote its replacement.
pub async fn resolve(store: &dyn Store, alert_id: Uuid, replacement_name: &str) -> Result<()> {
    store.resolve_drift(alert_id, replacement_name).await
}

/// Spawn the background loop that ticks every `interval`, forever. Errors
/// are logged and never abort the loop.
pub fn spawn_background_loop(store: Arc<dyn Store>, window: usize, threshold: f64, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match tick(store.as_ref(), window, threshold).await {
                Ok(alerts) if !alerts.is_empty() => {
                    tracing::info!("drift tick flagged {} tool(s)", alerts.len());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("drift tick failed: {e}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::drift::{EvalRun, EvalType};
    use forge_domain::registry::LifecycleState;
    use forge_registry::memory_store::MemoryStore;

    fn run(tool: &str, pass_rate: f64, run_at: chrono::DateTime<Utc>) -> EvalRun {
        EvalRun {
            id: Uuid::new_v4(),
            tool_name: tool.into(),
            model: "claude-sonnet-4-6".into(),
            eval_type: EvalType::Golden,
            total_cases: 10,
            passed: (pass_rate * 10.0) as u32,
            failed: 10 - (pass_rate * 10.0) as u32,
            skipped: 0,
            pass_rate: Some(pass_rate),
            run_at,
            notes: None,
        }
    }

    #[tokio::test]
    async fn drift_round_flags_tool_exactly_once() {
        let store = MemoryStore::new();
        let mut tool = forge_domain::registry::ToolSpec {
            tool_name: "tool_a".into(),
            description: String::new(),
            input_schema: Default::default(),
            mcp_routing: forge_domain::registry::McpRouting {
                endpoint: "/a".into(),
                method: forge_domain::registry::HttpMethod::Get,
                param_map: Default::default(),
            },
            requires_confirmation: false,
            category: None,
            lifecycle_state: LifecycleState::Promoted,
            promoted_at: Some(Utc::now()),
            flagged_at: None,
            retired_at: None,
            baseline_pass_rate: Some(0.95),
            replaced_by: None,
        };
        tool.lifecycle_state = LifecycleState::Promoted;
        store.insert_tool(tool);

        let now = Utc::now();
        for i in 0..5 {
            store
                .insert_eval_run(run("tool_a", 0.80, now - chrono::Duration::hours(i)))
                .await
                .unwrap();
        }

        let alerts = tick(&store, 5, 0.10).await.unwrap();
        assert_eq!(alerts.len(), 1);

        let alerts_again = tick(&store, 5, 0.10).await.unwrap();
        assert!(alerts_again.is_empty());

        let tool_after = store.get_tool("tool_a").await.unwrap().unwrap();
        assert_eq!(tool_after.lifecycle_state, LifecycleState::Flagged);
    }
}
