// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task, plan, message and attachment event handlers.

use crate::events::StoreEvent;
use crate::state::MaterializedTasks;

pub(super) fn apply(state: &mut MaterializedTasks, event: &StoreEvent) {
    match event {
        StoreEvent::TaskCreated { task } => {
            // Guarded insert keeps replay idempotent.
            state
                .tasks
                .entry(task.id.as_str().to_string())
                .or_insert_with(|| task.clone());
        }

        StoreEvent::TaskUpdated {
            id,
            title,
            prompt,
            model,
            priority,
            inherit_context,
            max_retries,
        } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if let Some(title) = title {
                    task.title = title.clone();
                }
                if let Some(prompt) = prompt {
                    task.prompt = prompt.clone();
                }
                if let Some(model) = model {
                    task.model = model.clone();
                }
                if let Some(priority) = priority {
                    task.priority = *priority;
                }
                if let Some(inherit_context) = inherit_context {
                    task.inherit_context = *inherit_context;
                }
                if let Some(max_retries) = max_retries {
                    task.max_retries = *max_retries;
                }
            }
        }

        StoreEvent::TaskStatusChanged {
            id,
            status,
            started_at_ms,
            completed_at_ms,
            queue_order,
            retry_count,
            result,
            error,
            agent_id,
            thread_id,
            ..
        } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                task.status = *status;
                if let Some(at) = started_at_ms {
                    task.started_at_ms = Some(*at);
                }
                if let Some(at) = completed_at_ms {
                    task.completed_at_ms = Some(*at);
                }
                if let Some(order) = queue_order {
                    task.queue_order = *order;
                }
                if let Some(count) = retry_count {
                    task.retry_count = *count;
                }
                if let Some(result) = result {
                    task.result = Some(result.clone());
                }
                if let Some(error) = error {
                    task.error = Some(error.clone());
                }
                if let Some(agent_id) = agent_id {
                    task.agent_id = Some(agent_id.clone());
                }
                if let Some(thread_id) = thread_id {
                    task.thread_id = Some(thread_id.clone());
                }
            }
        }

        StoreEvent::QueueOrderSet { id, queue_order } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                task.queue_order = *queue_order;
            }
        }

        StoreEvent::PromptInjected { id, at_ms } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.prompt_injected_at_ms.is_none() {
                    task.prompt_injected_at_ms = Some(*at_ms);
                }
            }
        }

        StoreEvent::TaskArchived { id, at_ms } => {
            if let Some(task) = state.tasks.get_mut(id.as_str()) {
                if task.archived_at_ms.is_none() {
                    task.archived_at_ms = Some(*at_ms);
                }
            }
        }

        StoreEvent::TaskDeleted { id } => {
            remove_task(state, id.as_str());
        }

        StoreEvent::TasksPurged { ids } => {
            for id in ids {
                remove_task(state, id.as_str());
            }
        }

        StoreEvent::PlanStepAdded { step } => {
            let steps = state.plan_steps.entry(step.task_id.as_str().to_string()).or_default();
            if !steps.iter().any(|s| s.step_number == step.step_number) {
                steps.push(step.clone());
                steps.sort_by_key(|s| s.step_number);
            }
        }

        StoreEvent::PlanStepStateChanged { task_id, step_number, state: new_state } => {
            if let Some(steps) = state.plan_steps.get_mut(task_id.as_str()) {
                if let Some(step) = steps.iter_mut().find(|s| s.step_number == *step_number) {
                    step.state = *new_state;
                }
            }
        }

        StoreEvent::MessageAdded { message } => {
            let messages = state.messages.entry(message.task_id.as_str().to_string()).or_default();
            // Replay guard: identical (ts, role, content) rows are the same fact.
            let duplicate = messages.iter().any(|m| {
                m.created_at_ms == message.created_at_ms
                    && m.role == message.role
                    && m.content == message.content
            });
            if !duplicate {
                messages.push(message.clone());
            }
        }

        StoreEvent::AttachmentAdded { attachment } => {
            state
                .attachments
                .entry(attachment.id.as_str().to_string())
                .or_insert_with(|| attachment.clone());
        }

        StoreEvent::AttachmentLinked { id, task_id } => {
            if let Some(attachment) = state.attachments.get_mut(id.as_str()) {
                attachment.task_id = Some(task_id.clone());
            }
        }

        _ => {}
    }
}

/// Drop a task and everything it owns.
fn remove_task(state: &mut MaterializedTasks, id: &str) {
    state.tasks.remove(id);
    state.plan_steps.remove(id);
    state.messages.remove(id);
    state.notifications.remove(id);
    state.attachments.retain(|_, a| a.task_id.as_ref().map(|t| t.as_str()) != Some(id));
}
