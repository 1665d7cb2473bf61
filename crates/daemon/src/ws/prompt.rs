// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt turn pipeline and the resume/bootstrap WS flows.

use std::path::PathBuf;
use std::sync::Arc;

use ads_adapters::{AdapterError, SendOptions};
use ads_core::{Input, InputPart, SystemClock, Clock};
use ads_engine::{
    BootstrapSpec, CommitSpec, ProjectSource, SandboxBackend, SandboxSpec,
};
use ads_storage::HistoryEntry;
use ads_wire::{
    ErrorPayload, PromptPayload, ResumeMode, ServerMessage, TaskResumePayload, TurnResult,
};
use base64::Engine as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::commands::BootstrapArgs;
use super::conn::{error_message, step_delta, ConnCtx};
use super::turn::TurnTranslator;

/// History-injection bounds: at most this many recent rows, at most this
/// many characters.
const HISTORY_MAX_ENTRIES: usize = 20;
const HISTORY_MAX_CHARS: usize = 8_000;

/// Run one prompt turn end to end.
pub(super) async fn run_prompt(ctx: &Arc<ConnCtx>, payload: PromptPayload) {
    let clock = SystemClock;
    let now = clock.epoch_ms();

    // Duplicate suppression: the first history insertion wins.
    if let Some(client_id) = &payload.client_message_id {
        let entry = HistoryEntry {
            session_key: ctx.history_key(),
            kind: "user".to_string(),
            content: payload.text.clone(),
            client_message_id: Some(client_id.clone()),
            created_at_ms: now,
        };
        match ctx.project.store.append_history(entry) {
            Ok(true) => {
                ctx.send(ServerMessage::Ack {
                    client_message_id: client_id.clone(),
                    duplicate: false,
                });
            }
            Ok(false) => {
                ctx.send(ServerMessage::Ack {
                    client_message_id: client_id.clone(),
                    duplicate: true,
                });
                return;
            }
            Err(e) => {
                ctx.send(error_message("internal", &e.to_string()));
                return;
            }
        }
    } else {
        let entry = HistoryEntry {
            session_key: ctx.history_key(),
            kind: "user".to_string(),
            content: payload.text.clone(),
            client_message_id: None,
            created_at_ms: now,
        };
        let _ = ctx.project.store.append_history(entry);
    }

    let mut input = match build_input(&payload) {
        Ok(input) => input,
        Err(message) => {
            ctx.send(error_message("invalid_input", &message));
            return;
        }
    };
    if input.is_empty() {
        ctx.send(error_message("invalid_input", "empty prompt"));
        return;
    }

    let sessions = &ctx.project.sessions;
    let orchestrator = sessions.get_or_create(ctx.user_id, &ctx.project.root, None);

    // Bounded transcript prefix when the session was flagged.
    if sessions.take_needs_history_injection(ctx.user_id) {
        let recent = ctx.project.store.recent_history(
            &ctx.history_key(),
            HISTORY_MAX_ENTRIES,
            HISTORY_MAX_CHARS,
        );
        if !recent.is_empty() {
            let mut block = String::from("Recent conversation:\n");
            for row in &recent {
                block.push_str(&format!("[{}] {}\n", row.kind, row.content));
            }
            input = input.with_prefix(block);
        }
    }

    let active_agent_id = orchestrator
        .list_agents()
        .into_iter()
        .find(|a| a.active)
        .map(|a| a.id)
        .unwrap_or_default();
    let expected_thread = sessions.saved_thread(ctx.user_id, &active_agent_id);

    let cancel = CancellationToken::new();
    *ctx.turn_cancel.lock() = Some(cancel.clone());
    let opts = SendOptions { streaming: true, cancel: cancel.clone(), ..SendOptions::default() };

    // The turn holds the project lock; queue transitions and other turns
    // for this workspace wait.
    let locks = ctx.app.registry.locks().clone();
    let root = ctx.project.root.clone();
    let mut events = orchestrator.subscribe();
    let mut translator = TurnTranslator::new(
        if ctx.app.explored_enabled { ctx.app.explored_max_items } else { 0 },
        ctx.app.explored_dedupe,
        &active_agent_id,
    );
    translator.set_now_ms(now);

    let outcome = locks
        .run_exclusive(&root, || async {
            let send = orchestrator.send(input, opts);
            tokio::pin!(send);
            loop {
                tokio::select! {
                    outcome = &mut send => break outcome,
                    event = events.recv() => {
                        if let Ok(event) = event {
                            for message in translator.translate(&event) {
                                ctx.send(message);
                            }
                        }
                    }
                }
            }
        })
        .await;

    // Drain anything that raced the turn end.
    while let Ok(event) = events.try_recv() {
        for message in translator.translate(&event) {
            ctx.send(message);
        }
    }
    for row in translator.take_history() {
        let _ = ctx.project.store.append_history(HistoryEntry {
            session_key: ctx.history_key(),
            kind: "status".to_string(),
            content: row,
            client_message_id: None,
            created_at_ms: clock.epoch_ms(),
        });
    }

    match outcome {
        Ok(outcome) => {
            let thread_reset = match (&expected_thread, &outcome.thread_id) {
                (Some(expected), Some(new)) => expected != new,
                (Some(_), None) => true,
                _ => false,
            };
            if let Some(thread_id) = &outcome.thread_id {
                let _ = sessions.save_thread(ctx.user_id, &active_agent_id, thread_id);
            }
            let _ = ctx.project.store.append_history(HistoryEntry {
                session_key: ctx.history_key(),
                kind: "assistant".to_string(),
                content: outcome.response.clone(),
                client_message_id: None,
                created_at_ms: clock.epoch_ms(),
            });
            ctx.send(ServerMessage::Result(TurnResult {
                ok: true,
                output: outcome.response,
                thread_id: outcome.thread_id,
                expected_thread_id: expected_thread,
                thread_reset,
            }));
        }
        Err(AdapterError::Aborted) => {
            // Cancellation is not an error.
            ctx.send(ServerMessage::Result(TurnResult {
                ok: false,
                output: "aborted".to_string(),
                thread_id: None,
                expected_thread_id: expected_thread,
                thread_reset: false,
            }));
        }
        Err(err) => {
            let classified = err.classify();
            debug!(error = %classified, "turn failed");
            ctx.send(ServerMessage::Error(ErrorPayload::from(&classified)));
        }
    }
}

/// Materialize base64 images and assemble the input parts.
fn build_input(payload: &PromptPayload) -> Result<Input, String> {
    let mut parts = vec![InputPart::Text { text: payload.text.clone() }];
    if payload.images.is_empty() {
        return Ok(Input { parts });
    }
    let dir = std::env::temp_dir().join("ads-uploads");
    std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    for (index, image) in payload.images.iter().enumerate() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image.data.as_bytes())
            .map_err(|e| format!("image {} is not valid base64: {}", index, e))?;
        let extension = match image.content_type.as_deref() {
            Some("image/jpeg") => "jpg",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            _ => "png",
        };
        let path = dir.join(format!(
            "upload-{}-{}.{}",
            std::process::id(),
            nano_stamp(index),
            extension
        ));
        std::fs::write(&path, bytes).map_err(|e| e.to_string())?;
        parts.push(InputPart::LocalImage { path });
    }
    Ok(Input { parts })
}

/// Collision-resistant-enough name component for temp uploads.
fn nano_stamp(index: usize) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}-{}", nanos, index)
}

/// `task_resume`: pick a thread id, rebuild the session around it, probe
/// it with a minimal turn, then reset the visible history to one status
/// row.
pub(super) async fn handle_task_resume(ctx: &Arc<ConnCtx>, payload: TaskResumePayload) {
    // Resume is rejected while a task is active; queued tasks stay queued.
    if let Some(active) = ctx.project.store.get_active_task_id() {
        ctx.send(error_message(
            "conflict",
            &format!("cannot resume while task {} is active", active),
        ));
        return;
    }

    let sessions = &ctx.project.sessions;
    let orchestrator = sessions.get_or_create(ctx.user_id, &ctx.project.root, None);
    let active_agent_id = orchestrator
        .list_agents()
        .into_iter()
        .find(|a| a.active)
        .map(|a| a.id)
        .unwrap_or_default();

    // explicit → current → saved → none
    let thread_id = match payload.mode {
        ResumeMode::Current => orchestrator.thread_id(),
        ResumeMode::Saved => sessions.saved_thread(ctx.user_id, &active_agent_id),
        ResumeMode::Auto => payload
            .thread_id
            .clone()
            .or_else(|| orchestrator.thread_id())
            .or_else(|| sessions.saved_thread(ctx.user_id, &active_agent_id)),
    };

    let orchestrator =
        sessions.recreate(ctx.user_id, &ctx.project.root, thread_id.clone());

    // Probe the thread with a minimal turn before declaring it resumable.
    let probe = orchestrator
        .send(
            Input::text("ping"),
            SendOptions { streaming: false, ..SendOptions::default() },
        )
        .await;
    match probe {
        Ok(outcome) => {
            let clock = SystemClock;
            let _ = ctx.project.store.clear_history(&ctx.history_key());
            let status = match &thread_id {
                Some(thread) => format!("resumed thread {}", thread),
                None => "started a fresh thread".to_string(),
            };
            let _ = ctx.project.store.append_history(HistoryEntry {
                session_key: ctx.history_key(),
                kind: "status".to_string(),
                content: status,
                client_message_id: None,
                created_at_ms: clock.epoch_ms(),
            });
            if let Some(thread) = &outcome.thread_id {
                let _ = sessions.save_thread(ctx.user_id, &active_agent_id, thread);
            }
            ctx.send(ServerMessage::Result(TurnResult {
                ok: true,
                output: "resumed".to_string(),
                thread_id: outcome.thread_id,
                expected_thread_id: thread_id,
                thread_reset: false,
            }));
        }
        Err(err) => {
            let classified = err.classify();
            ctx.send(ServerMessage::Error(ErrorPayload::from(&classified)));
        }
    }
}

/// `/bootstrap …` — run the loop and stream a summary when it finishes.
pub(super) async fn run_bootstrap_command(ctx: &Arc<ConnCtx>, args: BootstrapArgs) {
    let project = if args.target.contains("://") || args.target.starts_with("git@") {
        ProjectSource::GitUrl(args.target.clone())
    } else {
        match ctx.app.registry.validate_workspace(&PathBuf::from(&args.target)) {
            Ok(canonical) => ProjectSource::LocalPath(canonical),
            Err(e) => {
                ctx.send(error_message("invalid_input", &e.to_string()));
                return;
            }
        }
    };

    let spec = BootstrapSpec {
        project,
        goal: args.goal.clone(),
        max_iterations: args.max_iterations.unwrap_or(5),
        allow_network: !args.no_network,
        allow_install_deps: !args.no_install,
        commit: CommitSpec { enabled: true, ..CommitSpec::default() },
        sandbox: SandboxSpec { backend: SandboxBackend::None, require_hard: !args.soft },
        branch_prefix: "ads/bootstrap".to_string(),
        recipe: None,
        state_dir: ctx.app.registry.config().state_dir.clone(),
    };

    ctx.send(step_delta(&format!("bootstrap starting: {}", args.goal)));

    let orchestrator = ctx.project.sessions.get_or_create(ctx.user_id, &ctx.project.root, None);
    let agent = OrchestratorBootstrapAgent { orchestrator };
    let cancel = CancellationToken::new();
    *ctx.turn_cancel.lock() = Some(cancel.clone());

    let locks = ctx.app.registry.locks().clone();
    match ads_engine::run_bootstrap(&spec, &agent, &locks, &cancel).await {
        Ok(outcome) if outcome.ok => {
            let commit = outcome.final_commit.as_deref().unwrap_or("none");
            ctx.send(step_delta(&format!(
                "bootstrap succeeded after {} iteration(s); branch {}, commit {}",
                outcome.iterations, outcome.final_branch, commit
            )));
        }
        Ok(outcome) => {
            ctx.send(step_delta(&format!(
                "bootstrap failed after {} iteration(s): {}",
                outcome.iterations,
                outcome.error.as_deref().unwrap_or("unknown")
            )));
        }
        Err(e) if e.is_aborted() => {
            ctx.send(step_delta("bootstrap aborted"));
        }
        Err(e) => {
            warn!(error = %e, "bootstrap run failed");
            ctx.send(error_message("internal", &e.to_string()));
        }
    }
    *ctx.turn_cancel.lock() = None;
}

/// Drives the session's active agent one bootstrap iteration at a time.
struct OrchestratorBootstrapAgent {
    orchestrator: Arc<ads_engine::Orchestrator>,
}

#[async_trait::async_trait]
impl ads_engine::BootstrapAgent for OrchestratorBootstrapAgent {
    async fn run_iteration(
        &self,
        request: ads_engine::IterationRequest,
    ) -> Result<(), ads_core::ClassifiedError> {
        let mut prompt = format!(
            "You are iterating on the repository at {} (iteration {}).\nGoal: {}\n",
            request.cwd.display(),
            request.iteration,
            request.goal
        );
        if let Some(note) = &request.feedback.strategy_note {
            prompt.push_str(&format!("Note: {}\n", note));
        }
        if let Some(lint) = &request.feedback.lint_summary {
            prompt.push_str(&format!("\nLint result:\n{}\n", lint));
        }
        if let Some(test) = &request.feedback.test_summary {
            prompt.push_str(&format!("\nTest result:\n{}\n", test));
        }
        if let Some(diff) = &request.feedback.diff_summary {
            prompt.push_str(&format!("\nYour previous diff:\n{}\n", diff));
        }
        prompt.push_str("\nMake the install/lint/test verification pass.");

        self.orchestrator.set_working_directory(request.cwd.clone());
        let opts = SendOptions {
            streaming: false,
            cancel: request.cancel.clone(),
            ..SendOptions::default()
        };
        match self.orchestrator.send(Input::text(prompt), opts).await {
            Ok(_) => Ok(()),
            Err(err) => Err(err.classify()),
        }
    }

    async fn reset(&self) {
        self.orchestrator.reset();
    }
}
