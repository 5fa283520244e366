//! GitHub Webhook 签名校验与事件分类

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// 签名头
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
/// 事件类型头
pub const EVENT_HEADER: &str = "x-github-event";

/// Checks `X-Hub-Signature-256` against the raw body.
///
/// With no secret configured every delivery is accepted and a warning is
/// logged.
pub fn verify_signature(secret: Option<&Secret<String>>, body: &[u8], header: Option<&str>) -> bool {
    let Some(secret) = secret else {
        warn!("WEBHOOK_SECRET is not set, skipping signature verification");
        return true;
    };

    let Some(header) = header else {
        return false;
    };

    let Some(received) = header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(received) = hex::decode(received.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&received).is_ok()
}

/// Hex digest in the form GitHub sends it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key of any size");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
    #[serde(default)]
    pub issue: Option<WebhookIssue>,
    #[serde(default)]
    pub repository: Option<WebhookRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRef {
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookRepository {
    pub name: Option<String>,
    pub full_name: Option<String>,
}

/// An opened issue with fallbacks already applied
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedIssue {
    pub repo_name: String,
    pub repo_full_name: String,
    pub number: Option<u64>,
    pub title: String,
    pub body: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    InstallationCreated {
        installation_id: u64,
    },
    IssueOpened(OpenedIssue),
    Repository {
        event: Option<String>,
        name: Option<String>,
        full_name: Option<String>,
    },
    Other {
        event: Option<String>,
    },
}

impl WebhookEvent {
    pub fn classify(event_type: Option<&str>, payload: WebhookPayload) -> Self {
        let action = payload.action.as_deref();

        if let (Some("installation"), Some("created"), Some(installation)) =
            (event_type, action, payload.installation.as_ref())
        {
            return WebhookEvent::InstallationCreated {
                installation_id: installation.id,
            };
        }

        if event_type == Some("issues") && action == Some("opened") {
            let issue = payload.issue.unwrap_or_default();
            let repository = payload.repository.unwrap_or_default();
            return WebhookEvent::IssueOpened(OpenedIssue {
                repo_name: repository
                    .name
                    .unwrap_or_else(|| "Unknown repository".to_string()),
                repo_full_name: repository
                    .full_name
                    .unwrap_or_else(|| "Unknown repository".to_string()),
                number: issue.number,
                title: issue.title.unwrap_or_else(|| "Untitled".to_string()),
                body: issue.body.unwrap_or_default(),
                html_url: issue.html_url.unwrap_or_default(),
            });
        }

        if let Some(repository) = payload.repository {
            return WebhookEvent::Repository {
                event: event_type.map(str::to_string),
                name: repository.name,
                full_name: repository.full_name,
            };
        }

        WebhookEvent::Other {
            event: event_type.map(str::to_string),
        }
    }
}
