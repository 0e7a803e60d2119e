//! Pause/resume protocol for human-in-the-loop tool confirmation.
//!
//! A paused turn serializes its [`HitlPendingState`] under a fresh
//! one-time-use `resume_token`; the HTTP resume handler later trades that
//! token back for the state, exactly once, and only before it expires.

pub mod memory;
pub mod sql;
pub mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_domain::error::Result;
use forge_domain::hitl::HitlPendingState;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait HitlStore: Send + Sync {
    /// Store `state` under a new resume token with the given time-to-live,
    /// returning the token.
    async fn pause(&self, state: HitlPendingState, ttl: Duration) -> Result<String>;

    /// Atomically consume the entry for `token`: return the state exactly
    /// once, then never again (missing or expired both yield `None`).
    async fn resume(&self, token: &str) -> Result<Option<HitlPendingState>>;
}

/// Build the highest-priority available backend: Redis, then Postgres,
/// then SQLite, then the in-process map.
pub async fn build_hitl_store(
    redis_url: Option<&str>,
    database_url: Option<&str>,
    prefer_postgres: bool,
) -> Result<Arc<dyn HitlStore>> {
    if let Some(url) = redis_url {
        let store = redis_backend::RedisHitlStore::connect(url).await?;
        return Ok(Arc::new(store));
    }
    if let Some(url) = database_url {
        let store = if prefer_postgres {
            sql::SqlHitlStore::connect_postgres(url).await?
        } else {
            sql::SqlHitlStore::connect_sqlite(url).await?
        };
        return Ok(Arc::new(store));
    }
    let store = memory::MemoryHitlStore::new();
    store.clone().spawn_sweeper();
    Ok(store)
}
