use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_domain::error::Result;
use forge_domain::hitl::HitlPendingState;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{HitlStore, SWEEP_INTERVAL};

struct Entry {
    state: HitlPendingState,
    expires_at: DateTime<Utc>,
}

/// In-process HITL backend. Per the spec's stated non-goal, this offers no
/// cross-process consistency — only safe when a single gateway process owns
/// all pending pauses.
#[derive(Clone)]
pub struct MemoryHitlStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryHitlStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Start the 60-second reaper that drops expired entries proactively.
    /// Resume already refuses expired entries on its own, so this only
    /// bounds memory growth from abandoned pauses.
    pub fn spawn_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                self.entries.lock().retain(|_, e| e.expires_at > now);
            }
        });
    }
}

#[async_trait]
impl HitlStore for MemoryHitlStore {
    async fn pause(&self, state: HitlPendingState, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5));
        self.entries.lock().insert(token.clone(), Entry { state, expires_at });
        Ok(token)
    }

    async fn resume(&self, token: &str) -> Result<Option<HitlPendingState>> {
        let entry = self.entries.lock().remove(token);
        match entry {
            Some(e) if e.expires_at > Utc::now() => Ok(Some(e.state)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_domain::tool::{Message, MessageContent, Role};

    fn state() -> HitlPendingState {
        HitlPendingState {
            session_id: "s1".into(),
            conversation_messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text("hi".into()),
            }],
            pending_tool_calls: vec![],
            turn_index: 0,
        }
    }

    #[tokio::test]
    async fn resume_is_one_time_use() {
        let store = MemoryHitlStore::new();
        let token = store.pause(state(), Duration::from_secs(60)).await.unwrap();
        assert!(store.resume(&token).await.unwrap().is_some());
        assert!(store.resume(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_never_resumes() {
        let store = MemoryHitlStore::new();
        let token = store.pause(state(), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.resume(&token).await.unwrap().is_none());
    }
}
