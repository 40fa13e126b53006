//! 基于 LlmClient 的推理适配器
//!
//! system prompt 列出可用工具；LLM 的 Token 流逐块转为进度帧，流结束时解析完整输出：
//! 普通文本为结束帧，JSON Tool Call 为等待输入帧（本进程不执行工具）。

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, Peekable};
use futures_util::StreamExt;

use super::{AdapterInput, Frame, FrameMessage, FrameStream, ReasoningAdapter, ToolCallRequest};
use crate::core::AgentError;
use crate::llm::{ChatMessage, LlmClient, TokenStream};
use crate::tools::{ToolCatalog, ToolSet};

/// 解析后的 LLM 输出
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// 直接回复用户
    Response(String),
    /// 请求调用工具
    ToolCall(ToolCallRequest),
}

/// 解析 LLM 输出：含合法 JSON 且工具名非空则为 ToolCall，否则原文作为回复
pub fn parse_llm_output(output: &str) -> PlannerOutput {
    let trimmed = output.trim();

    // ```json ... ``` 或裸 JSON
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return PlannerOutput::Response(trimmed.to_string());
        }
    } else {
        return PlannerOutput::Response(trimmed.to_string());
    };

    match serde_json::from_str::<ToolCallRequest>(json_str) {
        Ok(call) if !call.name.is_empty() => PlannerOutput::ToolCall(call),
        _ => PlannerOutput::Response(trimmed.to_string()),
    }
}

fn final_frame(output: &str) -> Frame {
    match parse_llm_output(output) {
        PlannerOutput::Response(text) => Frame::text(text),
        PlannerOutput::ToolCall(call) => Frame {
            messages: vec![FrameMessage::tool_calls(vec![call])],
            awaiting_input: true,
        },
    }
}

/// unfold 状态：Token 流（可 peek 以判断是否为最后一块）与已累计文本
struct FrameState {
    tokens: Peekable<TokenStream>,
    accumulated: String,
    done: bool,
}

pub struct LlmReasoningAdapter {
    llm: Arc<dyn LlmClient>,
    catalog: ToolCatalog,
    system_prompt: String,
}

impl LlmReasoningAdapter {
    /// 启动时调用一次：装配工具目录与 system prompt
    pub fn initialize(llm: Arc<dyn LlmClient>, tool_set: ToolSet) -> Self {
        if let ToolSet::Reduced { reason, .. } = &tool_set {
            tracing::warn!(reason = %reason, "reasoning adapter running with reduced tool set");
        }
        let catalog = tool_set.into_catalog();
        let system_prompt = build_system_prompt(&catalog);
        tracing::info!(tools = catalog.len(), "reasoning adapter initialized");
        Self {
            llm,
            catalog,
            system_prompt,
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

fn build_system_prompt(catalog: &ToolCatalog) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant. Answer the user directly in plain text.",
    );
    if !catalog.is_empty() {
        prompt.push_str(
            "\nIf a tool is needed, reply with only a JSON object {\"name\": \"<tool name>\", \"args\": {...}}.\nAvailable tools:\n",
        );
        prompt.push_str(&catalog.to_schema_json());
    }
    prompt
}

#[async_trait]
impl ReasoningAdapter for LlmReasoningAdapter {
    async fn stream(&self, input: AdapterInput) -> Result<FrameStream, AgentError> {
        tracing::debug!(
            conversation = %input.conversation_key,
            messages = input.history.len(),
            "starting reasoning stream"
        );
        let messages: Vec<ChatMessage> = std::iter::once(ChatMessage::system(self.system_prompt.clone()))
            .chain(input.history)
            .collect();

        let tokens = self
            .llm
            .complete_stream(&messages)
            .await
            .map_err(AgentError::Llm)?;

        let state = FrameState {
            tokens: tokens.peekable(),
            accumulated: String::new(),
            done: false,
        };

        let frames = stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            match st.tokens.next().await {
                Some(Ok(chunk)) => {
                    st.accumulated.push_str(&chunk);
                    if Pin::new(&mut st.tokens).peek().await.is_some() {
                        let frame = Frame::text(st.accumulated.clone());
                        Some((Ok(frame), st))
                    } else {
                        st.done = true;
                        let frame = final_frame(&st.accumulated);
                        Some((Ok(frame), st))
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    Some((Err(AgentError::Stream(e)), st))
                }
                None => {
                    st.done = true;
                    let frame = final_frame(&st.accumulated);
                    Some((Ok(frame), st))
                }
            }
        });

        Ok(Box::pin(frames))
    }

    /// 远程工具只在启动时拉取一次描述，不保留连接；LLM 客户端的连接池随适配器释放
    async fn cleanup(&self) -> Result<(), AgentError> {
        tracing::info!(tools = self.catalog.len(), "reasoning adapter released");
        Ok(())
    }
}
