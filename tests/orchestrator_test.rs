//! 编排器集成测试：生命周期事件序列、历史写回、取消与失败路径

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;

use herald::core::{AgentError, EventBus, TaskOrchestrator};
use herald::llm::ChatMessage;
use herald::protocol::{
    AgentEvent, Message, Part, RequestContext, Role, Task, TaskState, TaskStatus,
};
use herald::reasoning::{
    AdapterInput, Frame, FrameMessage, FrameStream, ReasoningAdapter, ToolCallRequest,
};
use herald::store::{
    CancellationRegistry, ConversationStore, InMemoryCancellationRegistry,
    InMemoryConversationStore,
};

/// 按脚本输出帧的适配器，记录调用次数与最近一次输入
struct ScriptedAdapter {
    frames: Vec<Result<Frame, AgentError>>,
    start_error: Option<AgentError>,
    calls: AtomicUsize,
    last_input: Mutex<Option<AdapterInput>>,
}

impl ScriptedAdapter {
    fn new(frames: Vec<Result<Frame, AgentError>>) -> Self {
        Self {
            frames,
            start_error: None,
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    fn failing(err: AgentError) -> Self {
        Self {
            start_error: Some(err),
            ..Self::new(Vec::new())
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningAdapter for ScriptedAdapter {
    async fn stream(&self, input: AdapterInput) -> Result<FrameStream, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input);
        if let Some(err) = &self.start_error {
            return Err(err.clone());
        }
        Ok(Box::pin(stream::iter(self.frames.clone())))
    }
}

/// 记录所有事件；可在看到指定文本的事件时标记取消
#[derive(Default)]
struct RecordingBus {
    events: Mutex<Vec<AgentEvent>>,
    cancel_on: Option<(String, Arc<dyn CancellationRegistry>)>,
}

impl RecordingBus {
    fn cancelling_on(text: &str, registry: Arc<dyn CancellationRegistry>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_on: Some((text.to_string(), registry)),
        }
    }

    fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().unwrap().clone()
    }

    fn states(&self) -> Vec<TaskState> {
        self.events().iter().map(AgentEvent::state).collect()
    }
}

impl EventBus for RecordingBus {
    fn publish(&self, event: AgentEvent) {
        if let Some((text, registry)) = &self.cancel_on {
            let matches = match &event {
                AgentEvent::Task(_) => text == "submitted",
                AgentEvent::StatusUpdate(_) => event.message_text().as_deref() == Some(text.as_str()),
            };
            if matches {
                registry.mark_cancelled(event.task_id());
            }
        }
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    conversations: Arc<InMemoryConversationStore>,
    cancellations: Arc<InMemoryCancellationRegistry>,
    adapter: Arc<ScriptedAdapter>,
    orchestrator: TaskOrchestrator,
}

fn harness(adapter: ScriptedAdapter) -> Harness {
    let conversations = Arc::new(InMemoryConversationStore::new());
    let cancellations = Arc::new(InMemoryCancellationRegistry::new());
    let adapter = Arc::new(adapter);
    let orchestrator = TaskOrchestrator::new(
        conversations.clone(),
        cancellations.clone(),
        adapter.clone(),
    );
    Harness {
        conversations,
        cancellations,
        adapter,
        orchestrator,
    }
}

fn assert_single_final_last(events: &[AgentEvent]) {
    assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
    assert!(events.last().unwrap().is_final());
}

fn texts(events: &[AgentEvent]) -> Vec<Option<String>> {
    events.iter().map(AgentEvent::message_text).collect()
}

#[tokio::test]
async fn test_scenario_completed_answer() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("4"))]));
    let bus = RecordingBus::default();
    let msg = Message::user("2+2?").with_context("c1");

    h.orchestrator.execute(RequestContext::new(msg.clone()), &bus).await;

    let events = bus.events();
    assert_eq!(
        bus.states(),
        vec![
            TaskState::Submitted,
            TaskState::Working,
            TaskState::Working,
            TaskState::Completed
        ]
    );
    assert_eq!(
        texts(&events),
        vec![
            None,
            Some("Processing your request...".to_string()),
            Some("4".to_string()),
            Some("4".to_string())
        ]
    );
    assert_single_final_last(&events);

    match &events[0] {
        AgentEvent::Task(task) => {
            assert_eq!(task.context_id, "c1");
            assert_eq!(task.history, vec![msg.clone()]);
        }
        other => panic!("expected task event, got {:?}", other),
    }

    let history = h.conversations.get("c1").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], msg);
    let reply = history.last().unwrap();
    assert_eq!(reply.role, Role::Agent);
    assert_eq!(reply.text_content(), "4");
    assert_eq!(reply.context_id.as_deref(), Some("c1"));
    assert_eq!(reply.task_id.as_deref(), Some(events[0].task_id()));

    let input = h.adapter.last_input.lock().unwrap().clone().unwrap();
    assert_eq!(input.conversation_key, "c1");
    assert_eq!(input.history, vec![ChatMessage::user("2+2?")]);
}

#[tokio::test]
async fn test_scenario_cancel_before_frames() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("4"))]));
    let bus = RecordingBus::cancelling_on("submitted", h.cancellations.clone());

    h.orchestrator
        .execute(RequestContext::new(Message::user("2+2?").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(
        bus.states(),
        vec![TaskState::Submitted, TaskState::Working, TaskState::Canceled]
    );
    assert_eq!(events.last().unwrap().message_text(), None);
    assert_single_final_last(&events);
    assert_eq!(h.adapter.calls(), 0);

    let history = h.conversations.get("c1").await;
    assert!(history.iter().all(|m| m.role == Role::User));
}

#[tokio::test]
async fn test_scenario_no_text_fails_without_adapter_call() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("4"))]));
    let bus = RecordingBus::default();
    let msg = Message::user("").with_context("c1").with_parts(vec![Part::Data {
        data: serde_json::json!({"image": "..."}),
    }]);

    h.orchestrator.execute(RequestContext::new(msg), &bus).await;

    let events = bus.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state(), TaskState::Failed);
    assert!(events[0].is_final());
    assert_eq!(
        events[0].message_text().as_deref(),
        Some("No message found to process.")
    );
    assert_eq!(h.adapter.calls(), 0);
}

#[tokio::test]
async fn test_cancel_mid_stream_discards_output() {
    let h = harness(ScriptedAdapter::new(vec![
        Ok(Frame::text("step 1")),
        Ok(Frame::text("step 2")),
        Ok(Frame::text("answer")),
    ]));
    let bus = RecordingBus::cancelling_on("step 1", h.cancellations.clone());

    h.orchestrator
        .execute(RequestContext::new(Message::user("go").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::Canceled);
    assert_single_final_last(&events);
    assert!(!texts(&events).contains(&Some("step 2".to_string())));
    assert_eq!(h.conversations.get("c1").await.len(), 1);
}

#[tokio::test]
async fn test_redelivery_does_not_duplicate_user_message() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("hello"))]));
    let msg = Message::user("hi").with_context("c1");

    for _ in 0..2 {
        let bus = RecordingBus::default();
        h.orchestrator
            .execute(RequestContext::new(msg.clone()), &bus)
            .await;
        assert_single_final_last(&bus.events());
    }

    let history = h.conversations.get("c1").await;
    let copies = history
        .iter()
        .filter(|m| m.message_id == msg.message_id)
        .count();
    assert_eq!(copies, 1);
    assert_eq!(history.len(), 3);

    let input = h.adapter.last_input.lock().unwrap().clone().unwrap();
    assert_eq!(
        input.history,
        vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]
    );
}

#[tokio::test]
async fn test_awaiting_input_ends_input_required() {
    let tool_frame = Frame {
        messages: vec![FrameMessage::tool_calls(vec![ToolCallRequest {
            name: "getCurrentTime".into(),
            args: serde_json::json!({}),
        }])],
        awaiting_input: true,
    };
    let h = harness(ScriptedAdapter::new(vec![
        Ok(Frame::text("let me check")),
        Ok(tool_frame),
    ]));
    let bus = RecordingBus::default();

    h.orchestrator
        .execute(RequestContext::new(Message::user("time?").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::InputRequired);
    assert_single_final_last(&events);

    let history = h.conversations.get("c1").await;
    assert_eq!(history.len(), 2);
    assert!(history[1].text_content().contains("getCurrentTime"));
}

#[tokio::test]
async fn test_done_after_several_frames_persists_one_reply() {
    let h = harness(ScriptedAdapter::new(vec![
        Ok(Frame::text("2")),
        Ok(Frame::text("2 + 2")),
        Ok(Frame::text("2 + 2 = 4")),
    ]));
    let bus = RecordingBus::default();

    h.orchestrator
        .execute(RequestContext::new(Message::user("2+2?").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::Completed);
    assert_eq!(
        events.last().unwrap().message_text().as_deref(),
        Some("2 + 2 = 4")
    );
    let agent_replies = h
        .conversations
        .get("c1")
        .await
        .into_iter()
        .filter(|m| m.role == Role::Agent)
        .count();
    assert_eq!(agent_replies, 1);
}

#[tokio::test]
async fn test_empty_stream_completes_with_fallback() {
    let h = harness(ScriptedAdapter::new(Vec::new()));
    let bus = RecordingBus::default();

    h.orchestrator
        .execute(RequestContext::new(Message::user("hi").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::Completed);
    assert_eq!(
        events.last().unwrap().message_text().as_deref(),
        Some("Completed.")
    );
    assert_eq!(h.conversations.get("c1").await.len(), 2);
}

#[tokio::test]
async fn test_adapter_start_error_fails_without_reply() {
    let h = harness(ScriptedAdapter::failing(AgentError::Llm("boom".into())));
    let bus = RecordingBus::default();

    h.orchestrator
        .execute(RequestContext::new(Message::user("hi").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::Failed);
    assert_eq!(
        events.last().unwrap().message_text().as_deref(),
        Some("Agent error: LLM error: boom")
    );
    assert_single_final_last(&events);
    assert_eq!(h.conversations.get("c1").await.len(), 1);
}

#[tokio::test]
async fn test_error_frame_discards_partial_output() {
    let h = harness(ScriptedAdapter::new(vec![
        Ok(Frame::text("partial")),
        Err(AgentError::Stream("connection reset".into())),
        Ok(Frame::text("never seen")),
    ]));
    let bus = RecordingBus::default();

    h.orchestrator
        .execute(RequestContext::new(Message::user("hi").with_context("c1")), &bus)
        .await;

    let events = bus.events();
    assert_eq!(events.last().unwrap().state(), TaskState::Failed);
    assert_eq!(
        events.last().unwrap().message_text().as_deref(),
        Some("Agent error: Stream error: connection reset")
    );
    assert!(!texts(&events).contains(&Some("never seen".to_string())));
    assert_single_final_last(&events);
    assert_eq!(h.conversations.get("c1").await.len(), 1);
}

#[tokio::test]
async fn test_existing_task_skips_submitted_and_keeps_ids() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("sure"))]));
    let bus = RecordingBus::default();
    let task = Task {
        id: "task-1".into(),
        context_id: "ctx-1".into(),
        status: TaskStatus::new(TaskState::InputRequired, None),
        history: Vec::new(),
        metadata: None,
    };

    h.orchestrator
        .execute(
            RequestContext::new(Message::user("continue")).with_task(task),
            &bus,
        )
        .await;

    let events = bus.events();
    assert!(events.iter().all(|e| matches!(e, AgentEvent::StatusUpdate(_))));
    assert!(events.iter().all(|e| e.task_id() == "task-1"));
    assert_eq!(events.last().unwrap().state(), TaskState::Completed);
    assert_eq!(h.conversations.get("ctx-1").await.len(), 2);
}

#[tokio::test]
async fn test_cancel_task_is_idempotent_and_marks_registry() {
    let h = harness(ScriptedAdapter::new(vec![Ok(Frame::text("4"))]));
    h.orchestrator.cancel_task("task-1");
    h.orchestrator.cancel_task("task-1");
    assert!(h.cancellations.is_cancelled("task-1"));
    assert!(!h.cancellations.is_cancelled("task-2"));

    let task = Task {
        id: "task-1".into(),
        context_id: "ctx-1".into(),
        status: TaskStatus::new(TaskState::Working, None),
        history: Vec::new(),
        metadata: None,
    };
    let bus = RecordingBus::default();
    h.orchestrator
        .execute(RequestContext::new(Message::user("hi")).with_task(task), &bus)
        .await;

    assert_eq!(bus.states(), vec![TaskState::Working, TaskState::Canceled]);
    assert_eq!(h.adapter.calls(), 0);
}

#[tokio::test]
async fn test_conversations_are_independent() {
    let h = Arc::new(harness(ScriptedAdapter::new(vec![Ok(Frame::text("ok"))])));

    let mut handles = Vec::new();
    for i in 0..8 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            let bus = RecordingBus::default();
            let ctx = format!("c{}", i);
            h.orchestrator
                .execute(RequestContext::new(Message::user("hi").with_context(&ctx)), &bus)
                .await;
            bus.events()
        }));
    }
    for handle in handles {
        let events = handle.await.unwrap();
        assert_eq!(events.last().unwrap().state(), TaskState::Completed);
    }
    for i in 0..8 {
        assert_eq!(h.conversations.get(&format!("c{}", i)).await.len(), 2);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executions_share_one_conversation() {
    const N: usize = 8;
    let h = Arc::new(harness(ScriptedAdapter::new(vec![
        Ok(Frame::text("thinking")),
        Ok(Frame::text("ok")),
    ])));

    let mut handles = Vec::new();
    let mut sent_ids = Vec::new();
    for i in 0..N {
        let message = Message::user(format!("q{}", i)).with_context("shared");
        sent_ids.push(message.message_id.clone());
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            let bus = RecordingBus::default();
            h.orchestrator
                .execute(RequestContext::new(message), &bus)
                .await;
            bus.events()
        }));
    }
    for handle in handles {
        let events = handle.await.unwrap();
        assert_single_final_last(&events);
        assert_eq!(events.last().unwrap().state(), TaskState::Completed);
    }

    let history = h.conversations.get("shared").await;
    assert_eq!(history.len(), 2 * N);
    assert_eq!(history.iter().filter(|m| m.role == Role::User).count(), N);
    assert_eq!(history.iter().filter(|m| m.role == Role::Agent).count(), N);
    for id in &sent_ids {
        assert_eq!(history.iter().filter(|m| &m.message_id == id).count(), 1);
    }
    let mut all_ids: Vec<&str> = history.iter().map(|m| m.message_id.as_str()).collect();
    all_ids.sort_unstable();
    all_ids.dedup();
    assert_eq!(all_ids.len(), 2 * N);
    assert_eq!(h.adapter.calls(), N);
}
