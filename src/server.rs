//! HTTP 传输层（axum）
//!
//! 每个请求启动一次编排执行；事件经 ChannelEventBus 转发，同时折叠进 TaskStore。
//! message/send 等待 final 事件后返回任务快照，message/stream 以 SSE 逐条推送事件。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::{AgentError, ChannelEventBus, TaskOrchestrator};
use crate::protocol::{AgentCard, AgentEvent, Message, RequestContext, Role, Task};
use crate::store::{apply_event, TaskStore};

pub struct AppState {
    pub orchestrator: Arc<TaskOrchestrator>,
    pub tasks: Arc<dyn TaskStore>,
    pub card: AgentCard,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: Message,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub task_id: String,
    pub acknowledged: bool,
}

type ApiError = (StatusCode, String);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/.well-known/agent.json", get(agent_card))
        .route("/v1/message/send", post(message_send))
        .route("/v1/message/stream", post(message_stream))
        .route("/v1/tasks/:id", get(task_get))
        .route("/v1/tasks/:id/cancel", post(task_cancel))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

fn bad_request(err: AgentError) -> ApiError {
    tracing::debug!(error = %err, "request rejected");
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn validate(message: &Message) -> Result<(), AgentError> {
    if message.message_id.trim().is_empty() {
        return Err(AgentError::InvalidRequest("messageId is required".to_string()));
    }
    if message.role != Role::User {
        return Err(AgentError::InvalidRequest(
            "only user messages can start an execution".to_string(),
        ));
    }
    Ok(())
}

/// 任务在生命周期内只属于一个会话
fn check_task_context(message: &Message, task: &Task) -> Result<(), AgentError> {
    match &message.context_id {
        Some(context_id) if *context_id != task.context_id => Err(AgentError::InvalidRequest(
            format!(
                "task {} belongs to context {}, not {}",
                task.id, task.context_id, context_id
            ),
        )),
        _ => Ok(()),
    }
}

/// 启动一次执行，返回事件接收端；接收端在 final 事件后关闭
async fn start_execution(
    state: &Arc<AppState>,
    message: Message,
) -> Result<mpsc::UnboundedReceiver<AgentEvent>, ApiError> {
    validate(&message).map_err(bad_request)?;

    let existing = match &message.task_id {
        Some(task_id) => state.tasks.get(task_id).await,
        None => None,
    };
    if let Some(task) = &existing {
        check_task_context(&message, task).map_err(bad_request)?;
    }
    let mut snapshot = existing.clone();
    if let Some(task) = snapshot.as_mut() {
        if !task.history.iter().any(|m| m.message_id == message.message_id) {
            task.history.push(message.clone());
        }
    }

    let mut ctx = RequestContext::new(message);
    if let Some(task) = existing {
        ctx = ctx.with_task(task);
    }

    let (bus, mut events) = ChannelEventBus::new();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.execute(ctx, &bus).await;
    });

    let tasks = Arc::clone(&state.tasks);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            apply_event(&mut snapshot, &event);
            if let Some(task) = &snapshot {
                tasks.save(task.clone()).await;
            }
            let is_final = event.is_final();
            let _ = out_tx.send(event);
            if is_final {
                break;
            }
        }
    });

    Ok(out_rx)
}

/// GET /.well-known/agent.json
async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

/// POST /v1/message/send：阻塞至 final 事件，返回任务快照
async fn message_send(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Task>, ApiError> {
    let mut events = start_execution(&state, req.message).await?;

    while let Some(event) = events.recv().await {
        if event.is_final() {
            return state
                .tasks
                .get(event.task_id())
                .await
                .map(Json)
                .ok_or_else(|| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "task snapshot missing".to_string(),
                    )
                });
        }
    }

    tracing::error!("execution ended without a final event");
    Err((
        StatusCode::INTERNAL_SERVER_ERROR,
        "execution ended without a final event".to_string(),
    ))
}

/// POST /v1/message/stream：SSE，每条事件的 data 为 AgentEvent JSON
async fn message_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    let events = start_execution(&state, req.message).await?;

    let event_stream = stream::unfold(events, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });

    Ok(Sse::new(event_stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(15))
                .text("keepalive"),
        )
        .into_response())
}

/// GET /v1/tasks/:id
async fn task_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state
        .tasks
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "task not found".to_string()))
}

/// POST /v1/tasks/:id/cancel：只做标记，终态事件由执行循环发布
async fn task_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<CancelResponse>) {
    state.orchestrator.cancel_task(&id);
    (
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            task_id: id,
            acknowledged: true,
        }),
    )
}
