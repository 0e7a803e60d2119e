//! Shared application state threaded through every HTTP handler and
//! background task.

use std::sync::Arc;

use forge_domain::config::Config;
use forge_verifiers::custom::CustomVerifierRegistry;
use parking_lot::RwLock;

use crate::session_lock::SessionLockMap;

/// Hashed bearer secrets compared in constant time, read once at startup.
#[derive(Clone)]
pub struct BearerSecret {
    hash: Vec<u8>,
}

impl BearerSecret {
    pub fn new(raw: &str) -> Self {
        use sha2::{Digest, Sha256};
        Self {
            hash: Sha256::digest(raw.as_bytes()).to_vec(),
        }
    }

    /// Constant-time comparison against a candidate bearer token.
    pub fn matches(&self, candidate: &str) -> bool {
        use sha2::{Digest, Sha256};
        use subtle::ConstantTimeEq;
        let candidate_hash = Sha256::digest(candidate.as_bytes());
        self.hash.ct_eq(&candidate_hash).into()
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Runtime-mutable so `PUT /forge-admin/config` can apply changes
    /// without a restart.
    pub config: Arc<RwLock<Config>>,
    pub store: Arc<dyn forge_registry::Store>,
    pub hitl: Arc<dyn forge_hitl::HitlStore>,
    pub verifiers: Arc<CustomVerifierRegistry>,
    pub session_locks: Arc<SessionLockMap>,
    pub mcp_key: Option<BearerSecret>,
    pub admin_key: Option<BearerSecret>,
    pub http: reqwest::Client,
    pub widget_dir: std::path::PathBuf,
    pub queue: Arc<crate::router::queue::WorkQueue>,
    pub last_activity: Arc<parking_lot::Mutex<std::time::Instant>>,
    pub started_at: std::time::Instant,
    pub shutdown: Arc<tokio::sync::Notify>,
}

impl AppState {
    pub fn touch(&self) {
        *self.last_activity.lock() = std::time::Instant::now();
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
