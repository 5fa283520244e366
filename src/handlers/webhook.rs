//! GitHub Webhook 处理器

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{AppError, Result},
    github::{
        verify_signature,
        webhook::{EVENT_HEADER, SIGNATURE_HEADER},
        WebhookEvent, WebhookPayload,
    },
    middleware::AppState,
};

/// POST /webhook
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !verify_signature(state.config.github.webhook_secret.as_ref(), &body, signature) {
        warn!("Invalid webhook signature");
        return Err(AppError::InvalidSignature);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Invalid webhook payload: {}", e)))?;
    let event_type = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());

    info!(event = ?event_type, action = ?payload.action, "Webhook received");

    let response = match WebhookEvent::classify(event_type, payload) {
        WebhookEvent::InstallationCreated { installation_id } => {
            info!(installation_id, "GitHub App installed");
            json!({
                "message": format!("GitHub App installed! Installation ID: {}", installation_id),
                "installation_id": installation_id,
            })
        }
        WebhookEvent::IssueOpened(issue) => {
            info!(
                repo = %issue.repo_full_name,
                issue = ?issue.number,
                title = %issue.title,
                "New issue opened"
            );

            let technical_spec = state
                .analysis
                .analyze(&issue.title, &issue.body, &issue.repo_full_name)
                .await;

            let number_label = issue
                .number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());

            json!({
                "success": true,
                "event": "issue_opened",
                "repository": {
                    "name": issue.repo_name,
                    "full_name": issue.repo_full_name,
                },
                "issue": {
                    "number": issue.number,
                    "title": issue.title,
                    "url": issue.html_url,
                    "body": issue.body,
                },
                "technical_spec": technical_spec,
                "message": format!(
                    "Issue #{} \"{}\" opened in repository {}",
                    number_label, issue.title, issue.repo_full_name
                ),
            })
        }
        WebhookEvent::Repository {
            event,
            name,
            full_name,
        } => {
            info!(event = ?event, repo = ?full_name, "Repository event");
            json!({
                "message": format!(
                    "Received {} event for repository {}",
                    event.as_deref().unwrap_or("unknown"),
                    full_name.as_deref().unwrap_or("unknown")
                ),
                "event": event,
                "repository_name": name,
                "repository_full_name": full_name,
            })
        }
        WebhookEvent::Other { event } => {
            info!(event = ?event, "Unhandled event");
            json!({
                "event": event,
                "message": "Webhook received",
            })
        }
    };

    Ok(Json(response))
}
