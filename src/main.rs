//! Herald 入口
//!
//! 加载配置、发现工具并初始化推理适配器，之后才开始监听；收到关闭信号后运行清理任务。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use herald::config::{load_config, AppConfig};
use herald::core::{AdapterCleanup, ShutdownCoordinator, ShutdownManager, TaskOrchestrator};
use herald::llm::create_llm_from_config;
use herald::protocol::AgentCard;
use herald::reasoning::{LlmReasoningAdapter, ReasoningAdapter};
use herald::server::{router, AppState};
use herald::store::{InMemoryCancellationRegistry, InMemoryConversationStore, InMemoryTaskStore};
use herald::tools::assemble_tools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    herald::observability::init();

    // 第一个参数可指定配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let tool_set = assemble_tools(&cfg.tools).await;
    let llm = create_llm_from_config(&cfg.llm);
    let adapter = LlmReasoningAdapter::initialize(llm, tool_set);
    let card = AgentCard::from_config(&cfg, &adapter.catalog().names());
    let adapter: Arc<dyn ReasoningAdapter> = Arc::new(adapter);

    let orchestrator = TaskOrchestrator::new(
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(InMemoryCancellationRegistry::new()),
        Arc::clone(&adapter),
    );
    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        tasks: Arc::new(InMemoryTaskStore::new()),
        card,
    });

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let mut coordinator = ShutdownCoordinator::new(cfg.shutdown.cleanup_timeout_secs);
    coordinator.register(AdapterCleanup::new(adapter));

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("{} listening on http://{}", cfg.app.name, addr);

    let token = shutdown.token();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("HTTP server failed")?;
    tracing::info!(reason = ?shutdown.reason(), "server stopped");

    coordinator.run_cleanup().await;
    Ok(())
}
