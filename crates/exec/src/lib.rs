// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ads-exec: process and lock infrastructure.
//!
//! Abortable subprocess execution with output caps, the per-workspace async
//! lock pool, the cross-process directory lock used for worktree
//! preparation, and the ordered verification runner built on top of the
//! command runner.

pub mod command;
pub mod dirlock;
pub mod lock;
pub mod verify;

pub use command::{kill_with_grace, run, CommandOutcome, CommandSpec, ExecError};
pub use dirlock::{DirLock, DirLockGuard, DirLockOwner};
pub use lock::WorkspaceLocks;
pub use verify::{run_recipe, run_recipe_step, StepReport, VerifyRecipe, VerifyReport, VerifyStep};
