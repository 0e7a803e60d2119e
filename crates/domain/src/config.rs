use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hitl::HitlLevel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "d_default_model")]
    pub default_model: String,
    #[serde(default)]
    pub default_hitl_level: HitlLevel,
    #[serde(default)]
    pub allow_user_model_select: bool,
    #[serde(default)]
    pub allow_user_hitl_config: bool,
    #[serde(default)]
    pub admin_key: Option<String>,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            default_model: d_default_model(),
            default_hitl_level: HitlLevel::default(),
            allow_user_model_select: false,
            allow_user_hitl_config: false,
            admin_key: None,
            conversation: ConversationConfig::default(),
            sidecar: SidecarConfig::default(),
            drift: DriftConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate a config document. Rejects any field outside its
    /// stated domain; `auth.mode = verify` without `auth.signing_key` is an error.
    pub fn load(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.mode == AuthMode::Verify && self.auth.signing_key.is_none() {
            return Err(Error::Config(
                "auth.signingKey is required when auth.mode is 'verify'".into(),
            ));
        }
        if self.sidecar.port == 0 {
            return Err(Error::Config("sidecar.port must be in 1..=65535".into()));
        }
        if self.conversation.window == 0 {
            return Err(Error::Config("conversation.window must be a positive integer".into()));
        }
        if !(0.0..=1.0).contains(&self.drift.threshold) {
            return Err(Error::Config("drift.threshold must be in 0.0..=1.0".into()));
        }
        if self.drift.window_size == 0 {
            return Err(Error::Config("drift.windowSize must be a positive integer".into()));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth (JWT verify/trust)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub signing_key: Option<String>,
    #[serde(default = "d_claims_path")]
    pub claims_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            signing_key: None,
            claims_path: d_claims_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Verify the JWT signature against `signing_key` (HS256/RS256).
    Verify,
    /// Trust the caller's claims without verifying a signature.
    #[default]
    Trust,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationConfig {
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "d_window")]
    pub window: usize,
    /// Connection string for `store`. Falls back to `DATABASE_URL`/`REDIS_URL`
    /// when unset; unused for the in-process `memory` backend.
    #[serde(default)]
    pub store_url: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            window: d_window(),
            store_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Redis,
    Postgres,
    /// Not part of the documented config surface; used for tests and
    /// ephemeral/dev runs where no persistence is desired.
    Memory,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sidecar
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_sidecar_port")]
    pub port: u16,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: d_sidecar_port(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Drift monitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftConfig {
    #[serde(default = "d_drift_threshold")]
    pub threshold: f64,
    #[serde(default = "d_window_size")]
    pub window_size: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: d_drift_threshold(),
            window_size: d_window_size(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend API
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default value helpers (serde)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_default_model() -> String {
    "claude-sonnet-4-6".into()
}
fn d_claims_path() -> String {
    "sub".into()
}
fn d_window() -> usize {
    25
}
fn d_sidecar_port() -> u16 {
    8001
}
fn d_drift_threshold() -> f64 {
    0.1
}
fn d_window_size() -> usize {
    5
}
fn d_base_url() -> String {
    "http://localhost:3000".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.auth.mode, AuthMode::Trust);
        assert_eq!(config.auth.claims_path, "sub");
        assert_eq!(config.default_model, "claude-sonnet-4-6");
        assert_eq!(config.default_hitl_level, HitlLevel::Cautious);
        assert!(!config.allow_user_model_select);
        assert!(!config.allow_user_hitl_config);
        assert_eq!(config.conversation.store, StoreKind::Sqlite);
        assert_eq!(config.conversation.window, 25);
        assert!(!config.sidecar.enabled);
        assert_eq!(config.sidecar.port, 8001);
        assert_eq!(config.drift.threshold, 0.1);
        assert_eq!(config.drift.window_size, 5);
        assert_eq!(config.api.base_url, "http://localhost:3000");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn verify_mode_without_signing_key_is_rejected() {
        let mut config = Config::default();
        config.auth.mode = AuthMode::Verify;
        assert!(config.validate().is_err());
    }

    #[test]
    fn verify_mode_with_signing_key_is_accepted() {
        let mut config = Config::default();
        config.auth.mode = AuthMode::Verify;
        config.auth.signing_key = Some("secret".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sidecar_port_is_rejected() {
        let mut config = Config::default();
        config.sidecar.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = Config::default();
        config.conversation.window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_drift_threshold_is_rejected() {
        let mut config = Config::default();
        config.drift.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_parses_json_and_validates() {
        let raw = r#"{"defaultModel": "custom-model", "sidecar": {"port": 9001}}"#;
        let config = Config::load(raw).unwrap();
        assert_eq!(config.default_model, "custom-model");
        assert_eq!(config.sidecar.port, 9001);
    }

    #[test]
    fn load_rejects_invalid_combination() {
        let raw = r#"{"auth": {"mode": "verify"}}"#;
        assert!(Config::load(raw).is_err());
    }
}
