//! 事件总线：编排器写入生命周期事件，传输层消费
//!
//! 每次执行一条总线；发布不阻塞，接收端已断开时事件被丢弃。

use tokio::sync::mpsc;

use crate::protocol::AgentEvent;

/// 单次执行的发布通道
pub trait EventBus: Send + Sync {
    fn publish(&self, event: AgentEvent);
}

/// 基于 mpsc 无界通道的事件总线
#[derive(Clone)]
pub struct ChannelEventBus {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelEventBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: AgentEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, event discarded");
        }
    }
}
