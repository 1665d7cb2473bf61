// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task HTTP API.
//!
//! Every route is workspace-scoped via the `workspace` query parameter.
//! Errors map to `400` (invalid input), `404` (missing), `409` (conflict),
//! with a stable `{error}` JSON body.

use std::path::Path;
use std::sync::Arc;

use ads_core::{Clock, MessageRole, MessageType, SystemClock, TaskId, TaskMessage, TaskStatus};
use ads_storage::{CreateTask, StoreError, TaskUpdate};
use ads_wire::{
    ChatRequest, CreateTaskRequest, ErrorBody, MoveRequest, PatchAction, PatchTaskRequest,
    QueueStatusDto, ReorderRequest, TaskDto,
};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::project::{Project, ProjectError, ProjectRegistry};
use crate::ws::AppState;

pub fn router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/reorder", post(reorder_tasks))
        .route("/api/tasks/{id}", get(get_task).patch(patch_task).delete(delete_task))
        .route("/api/tasks/{id}/retry", post(retry_task))
        .route("/api/tasks/{id}/run", post(run_task))
        .route("/api/tasks/{id}/rerun", post(rerun_task))
        .route("/api/tasks/{id}/move", post(move_task))
        .route("/api/tasks/{id}/chat", post(chat_task))
        .route("/api/tasks/{id}/plan", get(get_plan))
        .route("/api/task-queue/status", get(queue_status).post(queue_status))
        .route("/api/task-queue/run", get(queue_run).post(queue_run))
        .route("/api/task-queue/pause", get(queue_pause).post(queue_pause))
        .route("/ws", get(crate::ws::ws_handler))
        .with_state(app)
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    pub workspace: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub token: Option<String>,
}

/// JSON error with the given status.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Conflict(_) => error_response(StatusCode::CONFLICT, e.to_string()),
        StoreError::InvalidInput(_) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        StoreError::Wal(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn project_error(e: ProjectError) -> Response {
    match e {
        ProjectError::Missing(_) | ProjectError::NotAllowed(_) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        ProjectError::Store(e) => store_error(e),
    }
}

fn authorize(app: &AppState, token: Option<&str>) -> Result<(), Response> {
    match &app.auth_token {
        Some(required) if token != Some(required.as_str()) => {
            Err(error_response(StatusCode::UNAUTHORIZED, "invalid token"))
        }
        _ => Ok(()),
    }
}

fn open_project(
    registry: &ProjectRegistry,
    workspace: &str,
) -> Result<Arc<Project>, Response> {
    registry.get_or_open(Path::new(workspace)).map_err(project_error)
}

fn parse_status(raw: &Option<String>) -> Result<Option<TaskStatus>, Response> {
    let Some(raw) = raw else { return Ok(None) };
    serde_json::from_value::<TaskStatus>(serde_json::Value::String(raw.clone()))
        .map(Some)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("unknown status {:?}", raw)))
}

async fn list_tasks(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let status = match parse_status(&query.status) {
        Ok(status) => status,
        Err(response) => return response,
    };
    let tasks: Vec<TaskDto> =
        project.store.list_tasks(status, query.limit).iter().map(TaskDto::from).collect();
    Json(tasks).into_response()
}

async fn create_task(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
    Json(body): Json<CreateTaskRequest>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let input = CreateTask {
        title: body.title,
        prompt: body.prompt,
        model: body.model,
        model_params: Default::default(),
        priority: body.priority.unwrap_or(0),
        inherit_context: body.inherit_context.unwrap_or(false),
        max_retries: body.max_retries.unwrap_or(0),
        attachments: body.attachments,
        parent_task_id: None,
    };
    let status = body.queued.then_some(TaskStatus::Queued);
    match project.store.create_task(input, SystemClock.epoch_ms(), status) {
        Ok(task) => {
            project.queue.notify_new_task();
            (StatusCode::CREATED, Json(TaskDto::from(&task))).into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn get_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.store.get_task(&TaskId::from_string(id)) {
        Some(task) => Json(TaskDto::from(&task)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "task not found"),
    }
}

async fn get_plan(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let id = TaskId::from_string(id);
    if project.store.get_task(&id).is_none() {
        return error_response(StatusCode::NOT_FOUND, "task not found");
    }
    Json(project.store.get_plan(&id)).into_response()
}

async fn retry_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.queue.retry(&TaskId::from_string(id)) {
        Ok(task) => Json(TaskDto::from(&task)).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn rerun_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.queue.rerun(&TaskId::from_string(id)) {
        Ok(task) => Json(TaskDto::from(&task)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// Single-task run: auto-resumes the queue for this task only.
async fn run_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.queue.run_single(&TaskId::from_string(id)) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => engine_error(e),
    }
}

fn engine_error(e: ads_engine::EngineError) -> Response {
    match e {
        ads_engine::EngineError::Store(e) => store_error(e),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

async fn reorder_tasks(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
    Json(body): Json<ReorderRequest>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.store.reorder_pending_tasks(&body.ids) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_error(e),
    }
}

/// Move within the pending band; only while the queue is paused.
async fn move_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
    Json(body): Json<MoveRequest>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    if project.queue.is_running() {
        return error_response(StatusCode::CONFLICT, "queue is running");
    }
    match project.store.move_pending_task(&TaskId::from_string(id), body.direction.as_str()) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_error(e),
    }
}

/// Append a user chat message to a task. Forbidden once cancelled.
async fn chat_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let id = TaskId::from_string(id);
    let Some(task) = project.store.get_task(&id) else {
        return error_response(StatusCode::NOT_FOUND, "task not found");
    };
    if task.status == TaskStatus::Cancelled {
        return error_response(StatusCode::CONFLICT, "task is cancelled");
    }
    let message = TaskMessage {
        task_id: id,
        role: MessageRole::User,
        message_type: MessageType::Chat,
        content: body.content,
        model_used: None,
        created_at_ms: SystemClock.epoch_ms(),
    };
    match project.store.add_message(message) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_error(e),
    }
}

async fn patch_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
    Json(body): Json<PatchTaskRequest>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let id = TaskId::from_string(id);
    match body {
        PatchTaskRequest::Action { action } => match action {
            PatchAction::Pause => {
                project.queue.pause(Some("paused via API".to_string()));
                StatusCode::OK.into_response()
            }
            PatchAction::Resume => {
                project.queue.resume();
                StatusCode::OK.into_response()
            }
            PatchAction::Cancel => match project.queue.cancel(&id) {
                Ok(()) => StatusCode::OK.into_response(),
                Err(e) => engine_error(e),
            },
        },
        PatchTaskRequest::Update {
            title,
            prompt,
            model,
            priority,
            inherit_context,
            max_retries,
        } => {
            let update = TaskUpdate {
                title,
                prompt,
                model: model.map(Some),
                priority,
                inherit_context,
                max_retries,
            };
            if update.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "no fields to update");
            }
            match project.store.update_task(&id, update) {
                Ok(task) => Json(TaskDto::from(&task)).into_response(),
                Err(e) => store_error(e),
            }
        }
    }
}

async fn delete_task(
    State(app): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    match project.store.delete_task(&TaskId::from_string(id)) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_error(e),
    }
}

async fn queue_status(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    let status = QueueStatusDto {
        running: project.queue.is_running(),
        active_task_id: project.queue.active_task_id(),
        pending: project.store.list_tasks(Some(TaskStatus::Pending), None).len(),
        queued: project.store.list_tasks(Some(TaskStatus::Queued), None).len(),
    };
    Json(status).into_response()
}

async fn queue_run(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    project.queue.start();
    StatusCode::OK.into_response()
}

async fn queue_pause(
    State(app): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Response {
    if let Err(response) = authorize(&app, query.token.as_deref()) {
        return response;
    }
    let project = match open_project(&app.registry, &query.workspace) {
        Ok(project) => project,
        Err(response) => return response,
    };
    project.queue.pause(Some("paused via API".to_string()));
    StatusCode::OK.into_response()
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
