//! Storage backends for the tool registry, conversation history, user
//! preferences, eval runs, and drift alerts.
//!
//! The [`Store`] trait is the single capability surface every HTTP handler
//! and background task is threaded through; which backend answers it is a
//! config decision, never a global.

pub mod memory_store;
pub mod redis_store;
pub mod sql;
pub mod store;

pub use store::Store;

use std::sync::Arc;

use forge_domain::config::{ConversationConfig, StoreKind};
use forge_domain::error::{Error, Result};

/// Build the configured [`Store`] implementation.
///
/// `database_url` backs the sqlite/postgres variants; `redis_url` backs the
/// redis variant. The in-process memory backend needs neither.
///
/// `sidecar_enabled` mirrors `config.sidecar.enabled`: sidecar mode turns on
/// SQLite's WAL journal mode so the drift monitor's background writes and
/// request-handler writes are serialized without blocking readers.
pub async fn build_store(
    config: &ConversationConfig,
    database_url: Option<&str>,
    redis_url: Option<&str>,
    sidecar_enabled: bool,
) -> Result<Arc<dyn Store>> {
    match config.store {
        StoreKind::Memory => Ok(Arc::new(memory_store::MemoryStore::new())),
        StoreKind::Sqlite => {
            let url = config
                .store_url
                .as_deref()
                .or(database_url)
                .unwrap_or("sqlite://forge.db");
            let store = sql::SqlStore::connect_sqlite(url, sidecar_enabled).await?;
            Ok(Arc::new(store))
        }
        StoreKind::Postgres => {
            let url = config
                .store_url
                .as_deref()
                .or(database_url)
                .ok_or_else(|| Error::Config("postgres store requires a database url".into()))?;
            let store = sql::SqlStore::connect_postgres(url).await?;
            Ok(Arc::new(store))
        }
        StoreKind::Redis => {
            let url = config
                .store_url
                .as_deref()
                .or(redis_url)
                .ok_or_else(|| Error::Config("redis store requires a connection url".into()))?;
            let store = redis_store::RedisStore::connect(url, config.window).await?;
            Ok(Arc::new(store))
        }
    }
}
