//! 推理适配器契约
//!
//! 编排器只依赖此 trait：输入完整对话投影与会话 key，输出惰性的帧流。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::Frame;
use crate::core::AgentError;
use crate::llm::ChatMessage;

/// 帧流：类型上无界，实践中有限
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, AgentError>> + Send>>;

/// 适配器输入
#[derive(Clone, Debug)]
pub struct AdapterInput {
    /// 按时间排序的 role/content 投影
    pub history: Vec<ChatMessage>,
    /// 引擎内部检查点使用的连续性 key（即 conversation id），编排器不解释
    pub conversation_key: String,
}

#[async_trait]
pub trait ReasoningAdapter: Send + Sync {
    /// 启动一次推理，返回帧流
    async fn stream(&self, input: AdapterInput) -> Result<FrameStream, AgentError>;

    /// 释放外部连接（关闭时调用）
    async fn cleanup(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
