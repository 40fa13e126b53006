//! 协议层：消息、任务状态、生命周期事件与 Agent 名片
//!
//! 线上格式为 camelCase JSON；事件以 `kind` 字段区分（task / status-update）。

pub mod card;
pub mod message;
pub mod task;

pub use card::{AgentCapabilities, AgentCard, AgentSkill};
pub use message::{FileContent, Message, MessageKind, Part, Role};
pub use task::{AgentEvent, RequestContext, Task, TaskState, TaskStatus, TaskStatusUpdateEvent};
