//! 进程级共享存储：会话历史、取消登记、任务快照
//!
//! 均为内存实现，随进程启动创建、退出销毁；通过 Arc<dyn …> 注入编排器与传输层。

pub mod cancellation;
pub mod conversation;
pub mod task;

pub use cancellation::{CancellationRegistry, InMemoryCancellationRegistry};
pub use conversation::{ConversationLocks, ConversationStore, InMemoryConversationStore};
pub use task::{apply_event, InMemoryTaskStore, TaskStore};
