//! 优雅关闭
//!
//! 信号（Ctrl+C / SIGTERM）取消关闭 token，HTTP 服务随之停止接收请求；
//! 之后协调器逐个运行清理任务，失败或超时只记日志。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::reasoning::ReasoningAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

/// 关闭信号；只记录第一次触发的原因
pub struct ShutdownManager {
    token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: OnceLock::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 触发关闭，重复调用只保留首个原因
    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(reason = ?reason, "shutdown requested");
        } else {
            tracing::debug!(reason = ?reason, "shutdown already in progress");
        }
        self.token.cancel();
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        manager.shutdown(ShutdownReason::Signal);
                    }
                    Err(e) => tracing::warn!(error = %e, "SIGTERM handler not installed"),
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// 按注册顺序运行清理任务，每个任务单独限时
pub struct ShutdownCoordinator {
    tasks: Vec<Arc<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            tasks: Vec::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.tasks.push(Arc::new(task));
    }

    pub async fn run_cleanup(&self) {
        tracing::info!(tasks = self.tasks.len(), "running cleanup");

        for task in &self.tasks {
            let name = task.name();
            match tokio::time::timeout(self.timeout, task.cleanup()).await {
                Ok(Ok(())) => tracing::info!(task = name, "cleanup done"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "cleanup failed"),
                Err(_) => tracing::warn!(
                    task = name,
                    timeout_secs = self.timeout.as_secs(),
                    "cleanup timed out"
                ),
            }
        }
    }
}

/// 关闭时调用推理适配器的 cleanup
pub struct AdapterCleanup {
    adapter: Arc<dyn ReasoningAdapter>,
}

impl AdapterCleanup {
    pub fn new(adapter: Arc<dyn ReasoningAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for AdapterCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.adapter.cleanup().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReasoningAdapter"
    }
}
