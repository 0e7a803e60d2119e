use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use forge_domain::error::{Error, Result};
use forge_domain::hitl::HitlPendingState;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::HitlStore;

pub struct SqlHitlStore {
    pool: AnyPool,
}

impl SqlHitlStore {
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
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
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hitl_pending (
                resume_token TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HitlStore for SqlHitlStore {
    async fn pause(&self, state: HitlPendingState, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5));
        sqlx::query(
            "INSERT INTO hitl_pending (resume_token, state, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(serde_json::to_string(&state).map_err(|e| Error::Store(e.to_string()))?)
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(token)
    }

    async fn resume(&self, token: &str) -> Result<Option<HitlPendingState>> {
        let mut tx = self.pool.begin().await.map_err(|e| Error::Store(e.to_string()))?;
        let row = sqlx::query("SELECT state, expires_at FROM hitl_pending WHERE resume_token = ?")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let Some(row) = row else {
            tx.commit().await.ok();
            return Ok(None);
        };
        sqlx::query("DELETE FROM hitl_pending WHERE resume_token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        tx.commit().await.map_err(|e| Error::Store(e.to_string()))?;

        let expires_at: String = row.try_get("expires_at").unwrap_or_default();
        let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(Utc::now());
        if expires_at <= Utc::now() {
            return Ok(None);
        }
        let state: String = row.try_get("state").unwrap_or_default();
        Ok(serde_json::from_str(&state).ok())
    }
}
