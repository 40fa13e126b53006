//! 任务编排器
//!
//! 每次执行：合并会话历史 -> 校验输入 -> 发布 submitted/working -> 消费推理帧流
//! -> 写回 agent 回复 -> 发布唯一的终态事件（final=true）。
//! execute 不返回错误，所有失败都转成终态事件。

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::Instrument;

use crate::core::{AgentError, EventBus};
use crate::llm::ChatMessage;
use crate::protocol::{
    AgentEvent, Message, RequestContext, Role, Task, TaskState, TaskStatus, TaskStatusUpdateEvent,
};
use crate::reasoning::{AdapterInput, ReasoningAdapter};
use crate::store::{CancellationRegistry, ConversationLocks, ConversationStore};

pub const PROCESSING_MESSAGE: &str = "Processing your request...";
pub const NO_MESSAGE_TO_PROCESS: &str = "No message found to process.";
pub const COMPLETED_FALLBACK: &str = "Completed.";

/// 帧流的消费结果
enum StreamOutcome {
    Finished {
        content: Option<String>,
        awaiting_input: bool,
    },
    Canceled,
}

/// 单次执行的发布上下文
struct Execution<'a> {
    task_id: String,
    context_id: String,
    bus: &'a dyn EventBus,
}

impl Execution<'_> {
    fn agent_message(&self, text: impl Into<String>) -> Message {
        Message::agent(text, &self.task_id, &self.context_id)
    }

    fn publish_status(&self, state: TaskState, message: Option<Message>, is_final: bool) {
        tracing::debug!(state = %state, is_final, "publish status-update");
        self.bus.publish(AgentEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            status: TaskStatus::new(state, message),
            is_final,
        }));
    }

    fn publish_canceled(&self) {
        tracing::info!("task canceled");
        self.publish_status(TaskState::Canceled, None, true);
    }
}

/// 会话历史 -> LLM 对话投影：agent 为 assistant，其余为 user；内容为非空文本片段
pub fn project_history(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|m| match m.role {
            Role::Agent => ChatMessage::assistant(m.text_content()),
            Role::User => ChatMessage::user(m.text_content()),
        })
        .collect()
}

pub struct TaskOrchestrator {
    conversations: Arc<dyn ConversationStore>,
    cancellations: Arc<dyn CancellationRegistry>,
    adapter: Arc<dyn ReasoningAdapter>,
    locks: ConversationLocks,
}

impl TaskOrchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        cancellations: Arc<dyn CancellationRegistry>,
        adapter: Arc<dyn ReasoningAdapter>,
    ) -> Self {
        Self {
            conversations,
            cancellations,
            adapter,
            locks: ConversationLocks::new(),
        }
    }

    /// 标记取消；幂等，立即返回。终态事件由执行循环发布
    pub fn cancel_task(&self, task_id: &str) {
        tracing::info!(task_id = %task_id, "cancellation requested");
        self.cancellations.mark_cancelled(task_id);
    }

    /// 执行一次任务，事件按序写入 bus
    pub async fn execute(&self, ctx: RequestContext, bus: &dyn EventBus) {
        let user_message = ctx.user_message;
        let existing = ctx.task;

        let task_id = existing
            .as_ref()
            .map(|t| t.id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let context_id = user_message
            .context_id
            .clone()
            .or_else(|| existing.as_ref().map(|t| t.context_id.clone()))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let span = tracing::info_span!("execute", task_id = %task_id, context_id = %context_id);
        let exec = Execution {
            task_id,
            context_id,
            bus,
        };
        self.run(exec, user_message, existing.is_some())
            .instrument(span)
            .await
    }

    async fn run(&self, exec: Execution<'_>, user_message: Message, has_task: bool) {
        tracing::info!(message_id = %user_message.message_id, "processing message");

        // 合并历史（同一 message id 不重复追加）
        let history = {
            let _guard = self.locks.acquire(&exec.context_id).await;
            let mut history = self.conversations.get(&exec.context_id).await;
            if !history
                .iter()
                .any(|m| m.message_id == user_message.message_id)
            {
                history.push(user_message.clone());
            }
            self.conversations
                .put(&exec.context_id, history.clone())
                .await;
            history
        };

        let projected = project_history(&history);
        if projected.iter().all(|m| m.content.is_empty()) {
            tracing::warn!("no text content in history");
            exec.publish_status(
                TaskState::Failed,
                Some(exec.agent_message(NO_MESSAGE_TO_PROCESS)),
                true,
            );
            return;
        }

        if !has_task {
            tracing::debug!("publish task(submitted)");
            let metadata = user_message.metadata.clone();
            exec.bus.publish(AgentEvent::Task(Task {
                id: exec.task_id.clone(),
                context_id: exec.context_id.clone(),
                status: TaskStatus::new(TaskState::Submitted, None),
                history: vec![user_message],
                metadata,
            }));
        }
        exec.publish_status(
            TaskState::Working,
            Some(exec.agent_message(PROCESSING_MESSAGE)),
            false,
        );

        if self.cancellations.is_cancelled(&exec.task_id) {
            exec.publish_canceled();
            return;
        }

        let outcome = match self.consume_frames(&exec, projected).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "agent execution failed");
                exec.publish_status(
                    TaskState::Failed,
                    Some(exec.agent_message(format!("Agent error: {}", e))),
                    true,
                );
                return;
            }
        };

        let (content, awaiting_input) = match outcome {
            StreamOutcome::Canceled => {
                exec.publish_canceled();
                return;
            }
            StreamOutcome::Finished {
                content,
                awaiting_input,
            } => (content, awaiting_input),
        };

        let final_message =
            exec.agent_message(content.unwrap_or_else(|| COMPLETED_FALLBACK.to_string()));
        {
            let _guard = self.locks.acquire(&exec.context_id).await;
            let mut history = self.conversations.get(&exec.context_id).await;
            history.push(final_message.clone());
            self.conversations.put(&exec.context_id, history).await;
        }

        let state = if awaiting_input {
            TaskState::InputRequired
        } else {
            TaskState::Completed
        };
        tracing::info!(state = %state, "task finished");
        exec.publish_status(state, Some(final_message), true);
    }

    /// 消费帧流：每帧前检查取消，发布 working 进度，记录最新输出
    async fn consume_frames(
        &self,
        exec: &Execution<'_>,
        projected: Vec<ChatMessage>,
    ) -> Result<StreamOutcome, AgentError> {
        let mut frames = self
            .adapter
            .stream(AdapterInput {
                history: projected,
                conversation_key: exec.context_id.clone(),
            })
            .await?;

        let mut latest: Option<String> = None;
        let mut awaiting_input = false;

        while let Some(frame) = frames.next().await {
            if self.cancellations.is_cancelled(&exec.task_id) {
                return Ok(StreamOutcome::Canceled);
            }
            let frame = frame?;
            let content = frame.render_content();
            awaiting_input = frame.awaiting_input;
            exec.publish_status(
                TaskState::Working,
                Some(exec.agent_message(content.clone())),
                false,
            );
            latest = Some(content);
        }

        Ok(StreamOutcome::Finished {
            content: latest,
            awaiting_input,
        })
    }
}
