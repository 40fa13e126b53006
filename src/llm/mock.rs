//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 默认回显最后一条 User 消息；可用 with_reply 固定回复。流式时按词切分。

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{ChatMessage, ChatRole, LlmClient, TokenStream};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    reply: Option<String>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定回复内容
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }
}

/// 按空白切分并保留分隔符，拼回后与原文一致
fn split_words(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch.is_whitespace() {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl MockLlmClient {
    fn reply_for(&self, messages: &[ChatMessage]) -> String {
        if let Some(reply) = &self.reply {
            return reply.clone();
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {}", last_user)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, String> {
        let content = self.reply_for(messages);
        Ok(Box::pin(stream::iter(
            split_words(&content).into_iter().map(Ok),
        )))
    }
}
