//! 推理帧：推理引擎流式输出的单元
//!
//! 帧内最后一条消息的内容是最新推理输出；`awaiting_input` 显式标记引擎是否在等待外部输入。

use serde::{Deserialize, Serialize};

use crate::llm::ChatRole;

/// 引擎请求的工具调用（{"name": "calculator", "args": {...}}）；解析时也接受 "tool" 作为键名
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(alias = "tool")]
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 帧消息内容
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FrameContent {
    Text(String),
    ToolCallRequest(Vec<ToolCallRequest>),
    /// 无法识别的结构，渲染为 JSON
    Unknown(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    pub role: ChatRole,
    pub content: FrameContent,
}

impl FrameMessage {
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: FrameContent::Text(text.into()),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: FrameContent::ToolCallRequest(calls),
        }
    }

    /// 文本优先；空文本或空调用列表退回整条消息的 JSON
    fn render(&self) -> String {
        match &self.content {
            FrameContent::Text(text) if !text.is_empty() => text.clone(),
            FrameContent::ToolCallRequest(calls) if !calls.is_empty() => {
                serde_json::to_string(calls).unwrap_or_default()
            }
            FrameContent::Unknown(value) => value.to_string(),
            _ => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub messages: Vec<FrameMessage>,
    /// 本帧之后引擎等待更多输入（而非自然结束）
    pub awaiting_input: bool,
}

impl Frame {
    /// 中间进度帧
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![FrameMessage::assistant_text(text)],
            awaiting_input: false,
        }
    }

    pub fn with_awaiting_input(mut self, awaiting_input: bool) -> Self {
        self.awaiting_input = awaiting_input;
        self
    }

    /// 最新推理输出：最后一条消息的渲染；无消息时为整帧 JSON
    pub fn render_content(&self) -> String {
        match self.messages.last() {
            Some(last) => last.render(),
            None => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}
