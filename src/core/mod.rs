//! 核心编排层：错误类型、事件总线、任务编排器、优雅关闭

pub mod error;
pub mod event_bus;
pub mod orchestrator;
pub mod shutdown;

pub use error::AgentError;
pub use event_bus::{ChannelEventBus, EventBus};
pub use orchestrator::{project_history, TaskOrchestrator};
pub use shutdown::{
    AdapterCleanup, ShutdownCleanup, ShutdownCoordinator, ShutdownManager, ShutdownReason,
};
