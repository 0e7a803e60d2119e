//! JWT auth for `/agent-api/*` (verify/trust modes) and timing-safe bearer
//! comparison for the MCP and admin surfaces.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use forge_domain::config::{AuthConfig, AuthMode};
use forge_domain::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::state::BearerSecret;

/// Claims decoded from a verified (or trusted) JWT.
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Extract the bearer token from an `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ").map(str::trim)
}

/// Verify (or trust) a JWT per `config.auth`, returning the resolved user id.
pub fn authenticate(token: &str, config: &AuthConfig) -> Result<AuthenticatedUser> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Auth("malformed JWT: expected 3 segments".into()));
    }
    let (header_b64, payload_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    if config.mode == AuthMode::Verify {
        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| Error::Auth("malformed JWT header".into()))?;
        let header: serde_json::Value = serde_json::from_slice(&header_bytes)
            .map_err(|_| Error::Auth("malformed JWT header".into()))?;
        let alg = header.get("alg").and_then(|v| v.as_str()).unwrap_or("");

        let signing_key = config
            .signing_key
            .as_deref()
            .ok_or_else(|| Error::Auth("auth.signingKey not configured".into()))?;

        match alg {
            "HS256" => verify_hs256(header_b64, payload_b64, signature_b64, signing_key)?,
            "RS256" => verify_rs256(header_b64, payload_b64, signature_b64, signing_key)?,
            other => return Err(Error::Auth(format!("Unsupported algorithm: {other}"))),
        }
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| Error::Auth("malformed JWT payload".into()))?;
    let claims: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| Error::Auth("malformed JWT payload".into()))?;

    let user_id = extract_claims_path(&claims, &config.claims_path)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Auth(format!("claim '{}' missing or not a string", config.claims_path)))?
        .to_string();

    Ok(AuthenticatedUser { user_id })
}

fn verify_hs256(header_b64: &str, payload_b64: &str, signature_b64: &str, key: &str) -> Result<()> {
    let signing_input = format!("{header_b64}.{payload_b64}");
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Auth(format!("invalid HMAC key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let expected = mac.finalize().into_bytes();
    let expected_b64 = URL_SAFE_NO_PAD.encode(expected);

    use subtle::ConstantTimeEq;
    let ok: bool = expected_b64.as_bytes().ct_eq(signature_b64.as_bytes()).into();
    if ok {
        Ok(())
    } else {
        Err(Error::Auth("JWT signature verification failed".into()))
    }
}

fn verify_rs256(header_b64: &str, payload_b64: &str, signature_b64: &str, public_key_pem: &str) -> Result<()> {
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};

    let token = format!("{header_b64}.{payload_b64}.{signature_b64}");
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| Error::Auth(format!("invalid RS256 public key: {e}")))?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation_if_alg_matches = false;
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<serde_json::Value>(&token, &key, &validation)
        .map(|_| ())
        .map_err(|e| Error::Auth(format!("JWT signature verification failed: {e}")))
}

/// Resolve a dotted claims path like `"user.id"` against a JSON value.
fn extract_claims_path<'a>(claims: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = claims;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Fail-closed bearer check used by `/mcp` and `/forge-admin/*`: unset key,
/// missing header, length mismatch, or failed constant-time compare all
/// reject.
pub fn check_bearer(header: Option<&str>, secret: Option<&BearerSecret>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    let Some(token) = extract_bearer(header) else {
        return false;
    };
    secret.matches(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(v: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap())
    }

    #[test]
    fn trust_mode_skips_signature_but_decodes_payload() {
        let header = b64(&serde_json::json!({"alg": "none"}));
        let payload = b64(&serde_json::json!({"sub": "user-42"}));
        let token = format!("{header}.{payload}.ignored-signature");

        let config = AuthConfig {
            mode: AuthMode::Trust,
            signing_key: None,
            claims_path: "sub".into(),
        };
        let user = authenticate(&token, &config).unwrap();
        assert_eq!(user.user_id, "user-42");
    }

    #[test]
    fn verify_mode_hs256_round_trip() {
        let header = b64(&serde_json::json!({"alg": "HS256"}));
        let payload = b64(&serde_json::json!({"sub": "user-1"}));
        let signing_input = format!("{header}.{payload}");
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(signing_input.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        let token = format!("{header}.{payload}.{sig}");

        let config = AuthConfig {
            mode: AuthMode::Verify,
            signing_key: Some("secret".into()),
            claims_path: "sub".into(),
        };
        let user = authenticate(&token, &config).unwrap();
        assert_eq!(user.user_id, "user-1");
    }

    #[test]
    fn verify_mode_rejects_bad_signature() {
        let header = b64(&serde_json::json!({"alg": "HS256"}));
        let payload = b64(&serde_json::json!({"sub": "user-1"}));
        let token = format!("{header}.{payload}.bm90LXRoZS1yaWdodC1zaWc");

        let config = AuthConfig {
            mode: AuthMode::Verify,
            signing_key: Some("secret".into()),
            claims_path: "sub".into(),
        };
        assert!(authenticate(&token, &config).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        let config = AuthConfig::default();
        assert!(authenticate("not-a-jwt", &config).is_err());
    }

    #[test]
    fn claims_path_supports_dotted_nesting() {
        let header = b64(&serde_json::json!({"alg": "none"}));
        let payload = b64(&serde_json::json!({"user": {"id": "nested-7"}}));
        let token = format!("{header}.{payload}.x");

        let config = AuthConfig {
            mode: AuthMode::Trust,
            signing_key: None,
            claims_path: "user.id".into(),
        };
        let user = authenticate(&token, &config).unwrap();
        assert_eq!(user.user_id, "nested-7");
    }

    #[test]
    fn check_bearer_rejects_unset_secret() {
        assert!(!check_bearer(Some("Bearer anything"), None));
    }

    #[test]
    fn check_bearer_rejects_missing_header() {
        let secret = BearerSecret::new("topsecret");
        assert!(!check_bearer(None, Some(&secret)));
    }

    #[test]
    fn check_bearer_accepts_matching_token() {
        let secret = BearerSecret::new("topsecret");
        assert!(check_bearer(Some("Bearer topsecret"), Some(&secret)));
    }

    #[test]
    fn check_bearer_rejects_wrong_token() {
        let secret = BearerSecret::new("topsecret");
        assert!(!check_bearer(Some("Bearer wrong"), Some(&secret)));
    }
}
