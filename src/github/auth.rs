//! GitHub App 认证
//! RS256 app JWT; installation tokens are exchanged in `client`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::GitHubError;
use crate::config::GitHubConfig;

/// Clock skew allowance GitHub recommends
const ISSUED_AT_BACKDATE_SECS: i64 = 60;
/// GitHub caps app tokens at ten minutes
const APP_TOKEN_TTL_SECS: i64 = 600;

/// App JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// GitHub App identity
pub struct AppCredentials {
    app_id: String,
    key: EncodingKey,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, private_key_pem: &str) -> Result<Self, GitHubError> {
        let pem = normalize_pem(private_key_pem);
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| GitHubError::PrivateKey(e.to_string()))?;
        Ok(Self {
            app_id: app_id.into(),
            key,
        })
    }

    /// `None` when the app is not configured.
    pub fn from_config(config: &GitHubConfig) -> Result<Option<Self>, GitHubError> {
        let Some(app_id) = config.app_id.as_deref() else {
            return Ok(None);
        };

        match load_private_key(config) {
            Some(pem) => Self::new(app_id, &pem).map(Some),
            None => {
                warn!(
                    app_id = %app_id,
                    "GitHub App private key not found (GITHUB_APP_PRIVATE_KEY or GITHUB_APP_PRIVATE_KEY_PATH), app authentication disabled"
                );
                Ok(None)
            }
        }
    }

    /// Signs a short-lived app token.
    pub fn app_jwt(&self) -> Result<String, GitHubError> {
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - ISSUED_AT_BACKDATE_SECS,
            exp: now + APP_TOKEN_TTL_SECS,
            iss: self.app_id.clone(),
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }
}

/// Key file wins when it exists; otherwise the inline key is used.
pub fn load_private_key(config: &GitHubConfig) -> Option<String> {
    if let Some(raw_path) = config.private_key_path.as_deref() {
        let path = resolve_key_path(raw_path);
        match std::fs::read_to_string(&path) {
            Ok(pem) => {
                info!(path = %path.display(), "GitHub App private key loaded from file");
                return Some(pem);
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read GitHub App private key file, falling back to GITHUB_APP_PRIVATE_KEY"
                );
            }
        }
    }

    config
        .private_key
        .as_ref()
        .map(|key| key.expose_secret().clone())
}

/// Relative paths resolve against the working directory.
fn resolve_key_path(raw: &str) -> PathBuf {
    let cleaned = raw.trim().trim_matches('"').trim_matches('\'');
    let path = Path::new(cleaned);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Env files often carry the PEM on one line with literal `\n`.
fn normalize_pem(pem: &str) -> String {
    pem.replace("\\n", "\n").trim().to_string() + "\n"
}
