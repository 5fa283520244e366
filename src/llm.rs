//! LLM 客户端
//! OpenAI 兼容的 chat completions 接口，支持 DeepSeek / OpenRouter 预设

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Client,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const OPENROUTER_TITLE: &str = "GitHub Issue Analyzer Agent";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("model returned no choices")]
    NoChoices,

    #[error("model response is empty")]
    EmptyResponse,

    #[error("invalid LLM client setup: {0}")]
    Setup(String),
}

/// Chat model seam used by the agents.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One system + user exchange, returning the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

/// Provider selection derived from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub base_url: String,
    pub model: String,
    pub openrouter: bool,
}

impl Provider {
    pub fn resolve(config: &LlmConfig) -> Self {
        let explicit = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let base_url = match explicit {
            Some(url) => url.to_string(),
            None if config.api_key.is_some() && config.use_deepseek => DEEPSEEK_BASE_URL.to_string(),
            None if config.api_key.is_some() && config.use_openrouter => {
                OPENROUTER_BASE_URL.to_string()
            }
            None => OPENAI_BASE_URL.to_string(),
        };

        let lowered = base_url.to_lowercase();
        let openrouter = lowered.contains("openrouter");
        let default_model = if lowered.contains("deepseek") {
            "deepseek-chat"
        } else if openrouter {
            "openai/gpt-4o-mini"
        } else {
            "gpt-4o-mini"
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            openrouter,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatible {
    http: Client,
    provider: Provider,
    api_key: Option<Secret<String>>,
    temperature: f32,
}

impl OpenAiCompatible {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = Provider::resolve(config);

        if config.api_key.is_none() {
            warn!("OPENAI_API_KEY is not set, LLM calls will fail");
        }

        let mut headers = HeaderMap::new();
        if provider.openrouter {
            headers.insert(
                HeaderName::from_static("x-title"),
                HeaderValue::from_static(OPENROUTER_TITLE),
            );
            if let Some(referer) = config.openrouter_http_referer.as_deref() {
                let value = HeaderValue::from_str(referer)
                    .map_err(|e| LlmError::Setup(format!("OPENROUTER_HTTP_REFERER: {}", e)))?;
                headers.insert(HeaderName::from_static("http-referer"), value);
                info!(referer = %referer, "OpenRouter HTTP-Referer configured");
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(base_url = %provider.base_url, model = %provider.model, "LLM client ready");

        Ok(Self {
            http,
            provider,
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatible {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.provider.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        debug!(model = %self.provider.model, prompt_chars = user.len(), "Sending chat completion");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.provider.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::NoChoices)?;

        choice
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model(&self) -> &str {
        &self.provider.model
    }
}
