//! 会话存储：conversation id -> 有序消息历史
//!
//! 编排器是唯一写入者；同一会话的读-改-写通过 ConversationLocks 串行化。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::protocol::Message;

/// 会话存储接口
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 取会话历史；不存在时返回空
    async fn get(&self, conversation_id: &str) -> Vec<Message>;

    /// 整体替换会话历史
    async fn put(&self, conversation_id: &str, history: Vec<Message>);
}

/// 内存会话存储，进程内有效
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, conversation_id: &str) -> usize {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn put(&self, conversation_id: &str, history: Vec<Message>) {
        self.conversations
            .write()
            .await
            .insert(conversation_id.to_string(), history);
    }
}

/// 按会话 id 的互斥锁表（惰性创建，不回收）
#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取会话锁；guard 释放前同一会话的其他读-改-写等待
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
