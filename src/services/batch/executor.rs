// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::run_log::SharedRunLog;
use crate::domain::account::DerivedAccount;
use crate::domain::error::{AppError, ErrorKind};
use crate::domain::types::{ChainAddress, ChainFamily, PreparedRequest, TransferRequest, TxId};
use crate::network::client::{ChainClient, SubmitOptions};
use alloy::primitives::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One unit of work. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub source: Arc<DerivedAccount>,
    pub request: TransferRequest,
    pub gas_limit: Option<u64>,
    /// Per-gas fee ceiling; set on native sweeps whose amount already nets out the gas cost.
    pub fee_cap: Option<U256>,
    /// Source balance in the moved asset as fetched at planning time. The executor subtracts
    /// what earlier successful tasks of the same source already moved.
    pub available: Option<U256>,
}

impl TransferTask {
    pub fn new(source: Arc<DerivedAccount>, request: TransferRequest) -> Self {
        Self {
            source,
            request,
            gas_limit: None,
            fee_cap: None,
            available: None,
        }
    }

    pub fn with_available(mut self, available: U256) -> Self {
        self.available = Some(available);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_fee_cap(mut self, fee_cap: U256) -> Self {
        self.fee_cap = Some(fee_cap);
        self
    }

    fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            gas_limit: self.gas_limit,
            fee_cap: self.fee_cap,
        }
    }
}

/// What successful tasks have moved so far, per source account and asset (`None` is the
/// native asset). Failed tasks never debit it.
#[derive(Debug, Default)]
struct SpendLedger {
    spent: HashMap<(u32, Option<ChainAddress>), U256>,
}

impl SpendLedger {
    fn key(source: &DerivedAccount, prepared: &PreparedRequest) -> (u32, Option<ChainAddress>) {
        (source.index, prepared.outflow_token().copied())
    }

    fn remaining(&self, source: &DerivedAccount, prepared: &PreparedRequest, available: U256) -> U256 {
        let spent = self
            .spent
            .get(&Self::key(source, prepared))
            .copied()
            .unwrap_or_default();
        available.saturating_sub(spent)
    }

    fn debit(&mut self, source: &DerivedAccount, prepared: &PreparedRequest) {
        let entry = self.spent.entry(Self::key(source, prepared)).or_default();
        *entry = entry.saturating_add(prepared.outflow());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded { tx: TxId },
    Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// 1-based position in the run.
    pub position: usize,
    pub source: String,
    pub recipient: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// An ordered task list plus the outcomes recorded so far.
#[derive(Debug)]
pub struct BatchRun {
    tasks: Vec<TransferTask>,
    outcomes: Vec<TaskOutcome>,
    state: RunState,
    ledger: SpendLedger,
}

impl BatchRun {
    pub fn new(tasks: Vec<TransferTask>) -> Self {
        Self {
            outcomes: Vec::with_capacity(tasks.len()),
            tasks,
            state: RunState::Idle,
            ledger: SpendLedger::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn outcomes(&self) -> &[TaskOutcome] {
        &self.outcomes
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Failed { .. }))
            .count()
    }

    pub fn summary(&self) -> String {
        format!("{}/{}", self.succeeded(), self.attempted())
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            state: self.state,
            attempted: self.attempted(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            outcomes: self.outcomes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub state: RunState,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<TaskOutcome>,
}

/// Executes a batch strictly in order, one task at a time. A failing task is logged and
/// counted; it never stops the run.
pub struct BatchExecutor {
    client: Arc<dyn ChainClient>,
    log: SharedRunLog,
    wait_for_receipts: bool,
}

impl BatchExecutor {
    pub fn new(client: Arc<dyn ChainClient>, log: SharedRunLog, wait_for_receipts: bool) -> Self {
        Self {
            client,
            log,
            wait_for_receipts,
        }
    }

    pub fn log(&self) -> &SharedRunLog {
        &self.log
    }

    /// Drives `run` from `Idle` to `Completed`, or to `Cancelled` when `cancel` fires.
    /// Cancellation is checked before each task; a task already started is awaited to its
    /// outcome, receipt included.
    pub async fn execute(
        &self,
        run: &mut BatchRun,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        if run.state != RunState::Idle {
            return Err(AppError::validation(
                "run",
                format!("batch already {:?}", run.state),
            ));
        }
        let family = self.client.family();
        let total = run.tasks.len();
        run.state = RunState::Running;
        self.log
            .info(format!("Batch started: {total} task(s) on {family}"));

        for position in 1..=total {
            if cancel.is_cancelled() {
                run.state = RunState::Cancelled;
                self.log.warn(format!(
                    "Batch cancelled before task {position}/{total}: {}",
                    run.summary()
                ));
                return Ok(run.report());
            }

            let task = &run.tasks[position - 1];
            let outcome = self
                .execute_task(family, position, total, task, &mut run.ledger)
                .await;
            run.outcomes.push(outcome);
        }

        run.state = RunState::Completed;
        self.log.info(format!("Batch completed: {}", run.summary()));
        Ok(run.report())
    }

    async fn execute_task(
        &self,
        family: ChainFamily,
        position: usize,
        total: usize,
        task: &TransferTask,
        ledger: &mut SpendLedger,
    ) -> TaskOutcome {
        let source = task.source.label(family);
        let recipient = task.request.recipient_label();
        self.log.info(format!(
            "Task {position}/{total} started: {source} -> {recipient}"
        ));

        let status = match self.run_task(family, task, ledger).await {
            Ok(tx) => {
                self.log.info(format!(
                    "Task {position}/{total} succeeded: {source} -> {recipient} tx {tx}"
                ));
                TaskStatus::Succeeded { tx }
            }
            Err(e) => {
                let kind = e.kind();
                self.log.error(format!(
                    "Task {position}/{total} failed [{kind}]: {source} -> {recipient}: {e}"
                ));
                TaskStatus::Failed {
                    kind,
                    reason: e.to_string(),
                }
            }
        };

        TaskOutcome {
            position,
            source,
            recipient,
            status,
        }
    }

    async fn run_task(
        &self,
        family: ChainFamily,
        task: &TransferTask,
        ledger: &mut SpendLedger,
    ) -> Result<TxId, AppError> {
        if !task.source.supports(family) {
            return Err(AppError::validation(
                "source",
                format!("account #{} has no {family} key", task.source.index),
            ));
        }
        let prepared = task.request.validate(family)?;

        if let Some(available) = task.available {
            let available = ledger.remaining(&task.source, &prepared, available);
            let required = prepared.outflow();
            if required > available {
                return Err(AppError::InsufficientFunds {
                    required: required.to_string(),
                    available: available.to_string(),
                });
            }
        }

        let tx = self
            .client
            .submit(&task.source, &prepared, task.submit_options())
            .await?;
        if self.wait_for_receipts {
            self.client.wait_for_receipt(&tx).await.map_err(|e| match e {
                AppError::Transaction { reason, .. } => AppError::Transaction {
                    hash: tx.0.clone(),
                    reason,
                },
                other => other,
            })?;
        }
        ledger.debit(&task.source, &prepared);
        Ok(tx)
    }
}
