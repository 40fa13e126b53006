//! 取消登记：被标记取消的 task id 集合
//!
//! 标记单调、幂等、不可撤销；编排器只检查，不等待。

use std::collections::HashMap;
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;

pub trait CancellationRegistry: Send + Sync {
    /// 标记取消（幂等）
    fn mark_cancelled(&self, task_id: &str);

    fn is_cancelled(&self, task_id: &str) -> bool;
}

/// 内存实现：每个被标记的任务持有一个已触发的 CancellationToken
#[derive(Default)]
pub struct InMemoryCancellationRegistry {
    tokens: RwLock<HashMap<String, CancellationToken>>,
}

impl InMemoryCancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CancellationRegistry for InMemoryCancellationRegistry {
    fn mark_cancelled(&self, task_id: &str) {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens
            .entry(task_id.to_string())
            .or_insert_with(CancellationToken::new)
            .cancel();
    }

    fn is_cancelled(&self, task_id: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}
