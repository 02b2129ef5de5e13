// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod executor;
pub mod planner;

pub use executor::{
    BatchExecutor, BatchReport, BatchRun, RunState, TaskOutcome, TaskStatus, TransferTask,
};
pub use planner::{BatchPlan, CollectionRequest, SkippedEntry};
