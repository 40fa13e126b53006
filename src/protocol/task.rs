//! 任务状态与生命周期事件
//!
//! 一次执行发布的事件序列：task(submitted) -> status-update(working)* -> 终态 status-update(final=true)。

use serde::{Deserialize, Serialize};

use super::message::Message;

/// 任务状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// completed / failed / canceled 为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Canceled)
    }

    /// 本次执行结束的状态：终态 + input-required
    pub fn ends_execution(self) -> bool {
        self.is_terminal() || self == TaskState::InputRequired
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// 状态 + 时间戳（RFC 3339）+ 可选 agent 消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            timestamp: chrono::Utc::now().to_rfc3339(),
            message,
        }
    }
}

/// 任务快照
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// 状态更新事件；final=true 表示本次执行的最后一个事件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// 发布到 EventBus 的事件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AgentEvent {
    Task(Task),
    StatusUpdate(TaskStatusUpdateEvent),
}

impl AgentEvent {
    pub fn is_final(&self) -> bool {
        match self {
            AgentEvent::Task(_) => false,
            AgentEvent::StatusUpdate(update) => update.is_final,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            AgentEvent::Task(task) => &task.id,
            AgentEvent::StatusUpdate(update) => &update.task_id,
        }
    }

    pub fn state(&self) -> TaskState {
        match self {
            AgentEvent::Task(task) => task.status.state,
            AgentEvent::StatusUpdate(update) => update.status.state,
        }
    }

    /// 事件携带的 agent 消息文本（无消息时为 None）
    pub fn message_text(&self) -> Option<String> {
        let status = match self {
            AgentEvent::Task(task) => &task.status,
            AgentEvent::StatusUpdate(update) => &update.status,
        };
        status.message.as_ref().map(Message::text_content)
    }
}

/// 传输层交给编排器的请求上下文
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// 触发本次执行的用户消息
    pub user_message: Message,
    /// 请求引用的已有任务（续聊 / 补充输入）
    pub task: Option<Task>,
}

impl RequestContext {
    pub fn new(user_message: Message) -> Self {
        Self {
            user_message,
            task: None,
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(TaskState::Canceled.is_terminal());
        assert!(!TaskState::InputRequired.is_terminal());
        assert!(TaskState::InputRequired.ends_execution());
        assert!(!TaskState::Working.ends_execution());
    }

    #[test]
    fn test_status_update_wire_format() {
        let event = AgentEvent::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            status: TaskStatus::new(TaskState::InputRequired, None),
            is_final: true,
        });
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["kind"], "status-update");
        assert_eq!(v["taskId"], "t1");
        assert_eq!(v["final"], true);
        assert_eq!(v["status"]["state"], "input-required");

        let back: AgentEvent = serde_json::from_value(v).unwrap();
        assert!(back.is_final());
        assert_eq!(back.state(), TaskState::InputRequired);
    }
}
