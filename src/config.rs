//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息
//!
//! Two sources are merged on top of the defaults:
//! - the plain variable names the deployment already uses (`PORT`,
//!   `GITHUB_APP_ID`, `OPENAI_API_KEY`, ...);
//! - structured overrides with the `ISSUE_AGENT_` prefix, e.g.
//!   `ISSUE_AGENT_GITHUB__API_URL`.
//!
//! Plain names win over prefixed ones. Empty values count as unset.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:5000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体上限（字节）
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// REST API base, overridable for GitHub Enterprise
    pub api_url: String,
    /// Web base used to build html links
    pub web_url: String,
    pub app_id: Option<String>,
    /// PEM, literal `\n` sequences allowed
    pub private_key: Option<Secret<String>>,
    /// Takes precedence over `private_key` when the file exists
    pub private_key_path: Option<String>,
    /// Fallback installation when none is passed or discovered
    pub installation_id: Option<u64>,
    /// Personal access token used when no installation applies
    pub token: Option<Secret<String>>,
    pub webhook_secret: Option<Secret<String>>,
    pub http_timeout_secs: u64,
    pub structure_max_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<Secret<String>>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub use_deepseek: bool,
    pub use_openrouter: bool,
    pub openrouter_http_referer: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", format!("0.0.0.0:{}", DEFAULT_PORT))?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 5 * 1024 * 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("github.web_url", "https://github.com")?
            .set_default("github.http_timeout_secs", 30)?
            .set_default("github.structure_max_depth", 2)?
            .set_default("llm.use_deepseek", false)?
            .set_default("llm.use_openrouter", false)?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.timeout_secs", 120)?;

        // 结构化覆盖（前缀为 ISSUE_AGENT_）
        settings = settings.add_source(
            Environment::with_prefix("ISSUE_AGENT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        settings = apply_plain_env(settings)?;

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 监听端口
    pub fn port(&self) -> Option<u16> {
        self.server
            .addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        match self.port() {
            Some(port) if port > 0 => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid server address: {}",
                    self.server.addr
                )))
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if !(self.github.api_url.starts_with("http://")
            || self.github.api_url.starts_with("https://"))
        {
            return Err(ConfigError::Message(format!(
                "github.api_url must be an http(s) URL, got {}",
                self.github.api_url
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Message(
                "llm.temperature must be between 0 and 2".to_string(),
            ));
        }

        if let Some(key) = &self.llm.api_key {
            if key.expose_secret().trim().is_empty() {
                return Err(ConfigError::Message("llm.api_key is blank".to_string()));
            }
        }

        Ok(())
    }
}

/// Maps the plain variable names onto config keys.
fn apply_plain_env(
    mut settings: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(port) = env_non_empty("PORT") {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Message(format!("PORT is not a valid port: {}", port)))?;
        settings = settings.set_override("server.addr", format!("0.0.0.0:{}", port))?;
    }

    let installation_id = match env_non_empty("GITHUB_INSTALLATION_ID") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            ConfigError::Message(format!("GITHUB_INSTALLATION_ID is not a number: {}", raw))
        })?),
        None => None,
    };

    settings = settings
        .set_override_option("logging.level", env_non_empty("LOG_LEVEL"))?
        .set_override_option("logging.format", env_non_empty("LOG_FORMAT"))?
        .set_override_option("github.app_id", env_non_empty("GITHUB_APP_ID"))?
        .set_override_option("github.private_key", env_non_empty("GITHUB_APP_PRIVATE_KEY"))?
        .set_override_option(
            "github.private_key_path",
            env_non_empty("GITHUB_APP_PRIVATE_KEY_PATH"),
        )?
        .set_override_option("github.installation_id", installation_id)?
        .set_override_option("github.token", env_non_empty("GITHUB_TOKEN"))?
        .set_override_option("github.webhook_secret", env_non_empty("WEBHOOK_SECRET"))?
        .set_override_option("llm.api_key", env_non_empty("OPENAI_API_KEY"))?
        .set_override_option("llm.base_url", env_non_empty("OPENAI_BASE_URL"))?
        .set_override_option("llm.model", env_non_empty("OPENAI_MODEL"))?
        .set_override_option("llm.use_deepseek", env_flag("USE_DEEPSEEK"))?
        .set_override_option("llm.use_openrouter", env_flag("USE_OPENROUTER"))?
        .set_override_option(
            "llm.openrouter_http_referer",
            env_non_empty("OPENROUTER_HTTP_REFERER"),
        )?;

    Ok(settings)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env_non_empty(name).map(|v| is_truthy(&v))
}

/// `true`, `1` and `yes` (any case) enable a flag.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}
