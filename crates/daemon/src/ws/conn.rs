// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection accept, heartbeat and message dispatch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ads_core::id::ConnectionId;
use ads_core::DedupeMode;
use ads_wire::{AgentInfo, ClientMessage, ServerMessage};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastBus, ConnectionHandle};
use crate::env::PROTOCOL_VERSION;
use crate::project::{Project, ProjectRegistry};

use super::commands::{parse_command, SlashCommand};
use super::prompt;

/// Pluggable `/search` backend (vector search lives outside this process).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// `(title, snippet)` pairs.
    async fn search(&self, query: &str) -> Vec<(String, String)>;
}

/// Default backend: no index attached.
pub struct NoopSearch;

#[async_trait]
impl SearchProvider for NoopSearch {
    async fn search(&self, _query: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Process-wide server state shared by HTTP and WS handlers.
pub struct AppState {
    pub registry: Arc<ProjectRegistry>,
    pub bus: Arc<BroadcastBus>,
    pub auth_token: Option<String>,
    /// 0 means unlimited.
    pub max_clients: usize,
    /// Accepted `Origin` values; empty disables the check.
    pub allowed_origins: Vec<String>,
    pub ping_interval: Duration,
    pub max_missed_pongs: u32,
    pub explored_enabled: bool,
    pub explored_max_items: usize,
    pub explored_dedupe: DedupeMode,
    pub search: Arc<dyn SearchProvider>,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub workspace: String,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Per-connection context shared with the prompt pipeline.
pub(super) struct ConnCtx {
    pub app: Arc<AppState>,
    pub project: Arc<Project>,
    pub user_id: i64,
    pub chat_session: String,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub turn_cancel: Mutex<Option<CancellationToken>>,
    pub turn_running: AtomicBool,
}

impl ConnCtx {
    /// History scope for this connection's identity.
    pub fn history_key(&self) -> String {
        format!("{}|{}", self.project.session_id, self.chat_session)
    }

    pub fn send(&self, message: ServerMessage) {
        let _ = self.tx.send(message);
    }

    pub fn agent_infos(&self) -> Vec<AgentInfo> {
        let orchestrator =
            self.project.sessions.get_or_create(self.user_id, &self.project.root, None);
        orchestrator
            .list_agents()
            .into_iter()
            .map(|a| AgentInfo { id: a.id, active: a.active, ready: a.ready, model: None })
            .collect()
    }
}

/// `GET /ws?workspace=…&session=…&user=…&token=…`
pub async fn ws_handler(
    State(app): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(required) = &app.auth_token {
        if params.token.as_deref() != Some(required.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    if !app.allowed_origins.is_empty() {
        let origin = headers
            .get(axum::http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !app.allowed_origins.iter().any(|allowed| allowed == origin) {
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    // MAX_CLIENTS=0 means unlimited.
    if app.max_clients != 0 && app.bus.len() >= app.max_clients {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let project = match app.registry.get_or_open(Path::new(&params.workspace)) {
        Ok(project) => project,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app, project, params))
}

async fn handle_socket(
    socket: WebSocket,
    app: Arc<AppState>,
    project: Arc<Project>,
    params: WsParams,
) {
    let connection_id = ConnectionId::new();
    let chat_session = params.session.unwrap_or_else(|| "main".to_string());
    let user_id = params.user.unwrap_or(0);
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    app.bus.register(
        connection_id.clone(),
        ConnectionHandle {
            session_id: chat_session.clone(),
            workspace_session: project.session_id.clone(),
            sender: tx.clone(),
        },
    );
    info!(connection = %connection_id, workspace = %project.root.display(), "client connected");

    let ctx = Arc::new(ConnCtx {
        app: Arc::clone(&app),
        project: Arc::clone(&project),
        user_id,
        chat_session,
        tx: tx.clone(),
        turn_cancel: Mutex::new(None),
        turn_running: AtomicBool::new(false),
    });

    ctx.send(ServerMessage::Welcome {
        version: PROTOCOL_VERSION.to_string(),
        workspace: project.root.clone(),
        agents: ctx.agent_infos(),
        explored: Vec::new(),
    });
    let history = project.store.history(&ctx.history_key());
    if !history.is_empty() {
        ctx.send(ServerMessage::History {
            entries: history.iter().filter_map(|row| serde_json::to_value(row).ok()).collect(),
        });
    }

    let (mut sink, mut stream) = socket.split();
    let missed_pongs = Arc::new(AtomicU32::new(0));

    // Writer: outbound queue + heartbeat pings.
    let writer_missed = Arc::clone(&missed_pongs);
    let ping_interval = app.ping_interval;
    let max_missed = app.max_missed_pongs;
    let writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    let Ok(json) = serde_json::to_string(&message) else { continue };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if writer_missed.fetch_add(1, Ordering::SeqCst) >= max_missed {
                        debug!("too many missed pongs; closing");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: dispatch in arrival order.
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "ws read error");
                break;
            }
        };
        match message {
            Message::Pong(_) => {
                missed_pongs.store(0, Ordering::SeqCst);
            }
            Message::Close(_) => break,
            Message::Text(text) => {
                missed_pongs.store(0, Ordering::SeqCst);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => dispatch(&ctx, client_message).await,
                    Err(e) => {
                        ctx.send(ServerMessage::Error(ads_wire::ErrorPayload {
                            code: "invalid_input".to_string(),
                            message: format!("malformed message: {}", e),
                            retryable: false,
                            needs_reset: false,
                            hint: "check the message schema".to_string(),
                        }));
                    }
                }
            }
            _ => {}
        }
    }

    app.bus.unregister(&connection_id);
    if let Some(cancel) = ctx.turn_cancel.lock().take() {
        cancel.cancel();
    }
    writer.abort();
    info!(connection = %connection_id, "client disconnected");
}

async fn dispatch(ctx: &Arc<ConnCtx>, message: ClientMessage) {
    match message {
        ClientMessage::Ping => {
            ctx.project.sessions.touch(ctx.user_id);
        }
        ClientMessage::Agents => {
            ctx.send(ServerMessage::Agents { agents: ctx.agent_infos() });
        }
        ClientMessage::Prompt(payload) => {
            // Slash commands typed into the prompt box dispatch directly.
            let trimmed = payload.text.trim();
            if trimmed.starts_with("/search") || trimmed.starts_with("/bootstrap") {
                let line = trimmed.to_string();
                handle_command(ctx, &line).await;
                return;
            }
            if ctx.turn_running.swap(true, Ordering::SeqCst) {
                ctx.send(ServerMessage::Error(ads_wire::ErrorPayload {
                    code: "conflict".to_string(),
                    message: "a turn is already in progress".to_string(),
                    retryable: true,
                    needs_reset: false,
                    hint: "wait for the current turn to finish".to_string(),
                }));
                return;
            }
            let ctx = Arc::clone(ctx);
            tokio::spawn(async move {
                prompt::run_prompt(&ctx, payload).await;
                ctx.turn_running.store(false, Ordering::SeqCst);
                *ctx.turn_cancel.lock() = None;
            });
        }
        ClientMessage::Command(line) => handle_command(ctx, &line).await,
        ClientMessage::TaskResume(payload) => prompt::handle_task_resume(ctx, payload).await,
        ClientMessage::Resume { thread_id } => {
            prompt::handle_task_resume(
                ctx,
                ads_wire::TaskResumePayload { mode: ads_wire::ResumeMode::Auto, thread_id },
            )
            .await
        }
        ClientMessage::Reset => {
            let orchestrator =
                ctx.project.sessions.get_or_create(ctx.user_id, &ctx.project.root, None);
            // Stash a restore point before dropping the live thread.
            if let Some(agent) = orchestrator.list_agents().iter().find(|a| a.active) {
                if let Some(thread) = orchestrator.thread_id() {
                    let _ = ctx.project.sessions.stash_resume_thread(
                        ctx.user_id,
                        &agent.id,
                        &thread,
                    );
                }
            }
            orchestrator.reset();
            ctx.send(ServerMessage::Agents { agents: ctx.agent_infos() });
        }
    }
}

async fn handle_command(ctx: &Arc<ConnCtx>, line: &str) {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(message) => {
            ctx.send(step_delta(&message));
            return;
        }
    };
    match command {
        SlashCommand::Pwd => {
            let cwd = ctx
                .project
                .sessions
                .cwd(ctx.user_id)
                .unwrap_or_else(|| ctx.project.root.clone());
            ctx.send(ServerMessage::Workspace { initialized: is_initialized(&cwd), root: cwd });
        }
        SlashCommand::Cd(target) => {
            match ctx.app.registry.validate_workspace(&target) {
                Ok(canonical) => {
                    ctx.project.sessions.get_or_create(ctx.user_id, &ctx.project.root, None);
                    ctx.project.sessions.set_cwd(ctx.user_id, &canonical);
                    let initialized = is_initialized(&canonical);
                    if !initialized {
                        ctx.send(step_delta("workspace is not initialized"));
                    }
                    ctx.send(ServerMessage::Workspace { root: canonical, initialized });
                }
                Err(e) => ctx.send(error_message("invalid_input", &e.to_string())),
            }
        }
        SlashCommand::Agent(id) => {
            let orchestrator =
                ctx.project.sessions.get_or_create(ctx.user_id, &ctx.project.root, None);
            match orchestrator.switch_agent(&id) {
                Ok(()) => ctx.send(ServerMessage::Agent { id, active: true }),
                Err(e) => ctx.send(error_message("not_found", &e.to_string())),
            }
        }
        SlashCommand::Interrupt => {
            if let Some(cancel) = ctx.turn_cancel.lock().take() {
                cancel.cancel();
                ctx.send(step_delta("interrupted"));
            } else {
                ctx.send(step_delta("nothing to interrupt"));
            }
        }
        SlashCommand::Search(query) => {
            let results = ctx.app.search.search(&query).await;
            let mut bubble = format!("Search results for \"{}\":\n", query);
            if results.is_empty() {
                bubble.push_str("(no results)\n");
            }
            for (title, snippet) in results {
                bubble.push_str(&format!("- {}: {}\n", title, snippet));
            }
            ctx.send(ServerMessage::Delta { delta: bubble, source: Some("step".into()) });
        }
        SlashCommand::Bootstrap(args) => prompt::run_bootstrap_command(ctx, args).await,
        SlashCommand::External(raw) => {
            // The external command runner is a separate collaborator; this
            // process only reports that nothing is attached.
            warn!(command = %raw, "no external command runner attached");
            ctx.send(step_delta(&format!("unhandled command: {}", raw)));
        }
    }
}

pub(super) fn step_delta(text: &str) -> ServerMessage {
    ServerMessage::Delta { delta: format!("{}\n", text), source: Some("step".into()) }
}

pub(super) fn error_message(code: &str, message: &str) -> ServerMessage {
    ServerMessage::Error(ads_wire::ErrorPayload {
        code: code.to_string(),
        message: message.to_string(),
        retryable: false,
        needs_reset: false,
        hint: message.to_string(),
    })
}

fn is_initialized(root: &PathBuf) -> bool {
    root.join(".git").exists()
}
