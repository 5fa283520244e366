//! GitHub Issue 分析智能体主入口

use issue_agent::{config::AppConfig, handlers::health, middleware::AppState, routes, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("issue-agent {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env
    // 已设置的环境变量不会被覆盖
    if let Ok(name) = std::env::var("ISSUE_AGENT_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Issue agent starting...");

    // 3. 构建应用状态
    let app_state = AppState::from_config(config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize services: {}", e))?;

    tracing::info!(
        github_app = app_state.github.app_configured(),
        webhook_secret = config.github.webhook_secret.is_some(),
        "Services initialized"
    );

    // 4. 构建路由
    let app = routes::create_router(Arc::new(app_state));

    // 5. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 6. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
///
/// Returns on Ctrl+C or SIGTERM; in-flight requests then get
/// `timeout_secs` to finish before the process exits anyway.
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制关闭
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("issue-agent {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: issue-agent [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --version     Print version information and exit");
    println!("  --help        Print this help and exit");
    println!();
    println!("Environment:");
    println!("  PORT                          Listen port (default 5000)");
    println!("  GITHUB_APP_ID                 GitHub App id");
    println!("  GITHUB_APP_PRIVATE_KEY(_PATH) GitHub App private key, inline or as a file");
    println!("  GITHUB_INSTALLATION_ID        Default installation id");
    println!("  GITHUB_TOKEN                  Personal token fallback");
    println!("  WEBHOOK_SECRET                Webhook signature secret");
    println!("  OPENAI_API_KEY                LLM API key");
    println!("  OPENAI_BASE_URL, OPENAI_MODEL LLM endpoint and model");
    println!("  USE_DEEPSEEK, USE_OPENROUTER  LLM provider presets");
    println!();
    println!("  See .env.example for the full list.");
}
