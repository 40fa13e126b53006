//! 任务快照存储：记录每个任务最近一次状态，供传输层按 taskId 查找已有任务

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::protocol::{AgentEvent, Task};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save(&self, task: Task);

    async fn get(&self, task_id: &str) -> Option<Task>;
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }
}

/// 将事件折叠进任务快照
///
/// task 事件整体替换快照；status-update 更新状态，final 更新携带的 agent 消息追加到 history。
/// 快照不存在时 status-update 会以空 history 建立快照。
pub fn apply_event(snapshot: &mut Option<Task>, event: &AgentEvent) {
    match event {
        AgentEvent::Task(task) => *snapshot = Some(task.clone()),
        AgentEvent::StatusUpdate(update) => {
            let task = snapshot.get_or_insert_with(|| Task {
                id: update.task_id.clone(),
                context_id: update.context_id.clone(),
                status: update.status.clone(),
                history: Vec::new(),
                metadata: None,
            });
            task.status = update.status.clone();
            if update.is_final {
                if let Some(message) = &update.status.message {
                    task.history.push(message.clone());
                }
            }
        }
    }
}
