// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod support;

use alloy::primitives::U256;
use fleetops::common::run_log::RunLog;
use fleetops::domain::error::ErrorKind;
use fleetops::domain::types::{AssetSelector, ChainFamily, PreparedRequest, TransferRequest};
use fleetops::network::client::ChainClient;
use fleetops::services::batch::planner::{plan_collection, plan_distribution};
use fleetops::services::batch::{
    BatchExecutor, BatchRun, CollectionRequest, RunState, TaskStatus, TransferTask,
};
use std::sync::Arc;
use support::{MockChain, evm_account, evm_recipient};
use tokio_util::sync::CancellationToken;

fn native_task(index: u32, to: u8, amount: u64) -> TransferTask {
    TransferTask::new(
        evm_account(index),
        TransferRequest::NativeTransfer {
            to: evm_recipient(to),
            amount: U256::from(amount),
        },
    )
}

#[tokio::test]
async fn one_invalid_task_does_not_stop_the_batch() {
    let chain = Arc::new(MockChain::default());
    let log = RunLog::shared("batch", 100);
    let executor = BatchExecutor::new(chain.clone(), log.clone(), true);

    let tasks = vec![
        native_task(0, 1, 10),
        native_task(1, 2, 20),
        native_task(2, 3, 0),
        native_task(3, 4, 40),
        native_task(4, 5, 50),
    ];
    let mut run = BatchRun::new(tasks);
    let report = executor
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);

    let positions: Vec<usize> = report.outcomes.iter().map(|o| o.position).collect();
    assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    assert!(matches!(
        report.outcomes[2].status,
        TaskStatus::Failed {
            kind: ErrorKind::Validation,
            ..
        }
    ));

    let lines = log.snapshot();
    let validation_lines = lines
        .iter()
        .filter(|l| l.message.contains("[ValidationError]"))
        .count();
    assert_eq!(validation_lines, 1);
    assert!(lines.last().unwrap().message.ends_with("4/5"));

    // The invalid task never reached the chain.
    let amounts: Vec<U256> = chain
        .submissions()
        .iter()
        .map(PreparedRequest::outflow)
        .collect();
    assert_eq!(
        amounts,
        [10u64, 20, 40, 50].map(U256::from).to_vec()
    );
}

#[tokio::test]
async fn cancellation_waits_for_the_task_in_flight() {
    let cancel = CancellationToken::new();
    let chain = Arc::new(MockChain {
        cancel_after: Some((2, cancel.clone())),
        ..MockChain::default()
    });
    let log = RunLog::shared("batch", 100);
    let executor = BatchExecutor::new(chain.clone(), log.clone(), true);

    let tasks = (0..10).map(|i| native_task(i, (i + 1) as u8, 5)).collect();
    let mut run = BatchRun::new(tasks);
    let report = executor.execute(&mut run, &cancel).await.unwrap();

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.outcomes.len(), 2);
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| matches!(o.status, TaskStatus::Succeeded { .. }))
    );
    assert_eq!(chain.submissions().len(), 2);
    assert!(
        log.snapshot()
            .iter()
            .any(|l| l.message.contains("cancelled before task 3/10"))
    );
}

#[tokio::test]
async fn collection_leaves_gas_reserve_and_skips_dust() {
    let chain = Arc::new(MockChain::with_gas_price(10));
    let accounts = vec![evm_account(0), evm_account(1), evm_account(2)];
    let target = evm_account(2).address(ChainFamily::Evm).unwrap();
    chain.set_balance(accounts[0].address(ChainFamily::Evm).unwrap(), 1_000_000);
    chain.set_balance(accounts[1].address(ChainFamily::Evm).unwrap(), 100_000);
    chain.set_balance(target, 5_000_000);

    let client: Arc<dyn ChainClient> = chain.clone();
    let target_text = target.to_string();
    let plan = plan_collection(
        client.clone(),
        CollectionRequest {
            accounts: &accounts,
            target: &target_text,
            asset: &AssetSelector::Native,
            reserve: None,
            gas_limit: 21_000,
        },
    )
    .await
    .unwrap();

    // 1_000_000 - 10 * 21_000
    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(plan.skipped.len(), 2);
    assert!(
        plan.skipped
            .iter()
            .any(|s| s.reason.contains("collection target"))
    );

    let executor = BatchExecutor::new(client, RunLog::shared("batch", 50), false);
    let mut run = BatchRun::new(plan.tasks);
    let report = executor
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    let value = chain.submissions()[0].outflow();
    assert_eq!(value, U256::from(790_000u64));

    // The sweep is sent with the reserve's price as its fee cap, so value plus the worst-case
    // gas charge never exceeds the balance.
    let options = chain.submit_options()[0];
    assert_eq!(options.gas_limit, Some(21_000));
    let fee_cap = options.fee_cap.expect("sweep carries a fee cap");
    assert_eq!(fee_cap, U256::from(10u64));
    assert!(value + U256::from(21_000u64) * fee_cap <= U256::from(1_000_000u64));
}

#[tokio::test]
async fn explicit_reserve_collection_keeps_oracle_fees() {
    let chain = Arc::new(MockChain::with_gas_price(10));
    let accounts = vec![evm_account(0)];
    chain.set_balance(accounts[0].address(ChainFamily::Evm).unwrap(), 1_000_000);

    let client: Arc<dyn ChainClient> = chain.clone();
    let target = evm_recipient(9);
    let plan = plan_collection(
        client,
        CollectionRequest {
            accounts: &accounts,
            target: &target,
            asset: &AssetSelector::Native,
            reserve: Some(U256::from(300_000u64)),
            gas_limit: 21_000,
        },
    )
    .await
    .unwrap();

    assert_eq!(plan.tasks.len(), 1);
    assert_eq!(plan.tasks[0].fee_cap, None);
    match &plan.tasks[0].request {
        TransferRequest::NativeTransfer { amount, .. } => {
            assert_eq!(*amount, U256::from(700_000u64))
        }
        other => panic!("unexpected request {other:?}"),
    }
}

#[tokio::test]
async fn distribution_beyond_balance_fails_only_the_overdrawn_tasks() {
    let chain = Arc::new(MockChain::default());
    let body = format!(
        "{}, 0.0000000000000004\n{}, 0.0000000000000001\n{}, 0.0000000000000004\n",
        evm_recipient(1),
        evm_recipient(2),
        evm_recipient(3)
    );
    let plan = plan_distribution(
        evm_account(0),
        ChainFamily::Evm,
        &AssetSelector::Native,
        &body,
        None,
        Some(U256::from(600u64)),
    );
    assert_eq!(plan.tasks.len(), 3);

    let executor = BatchExecutor::new(chain.clone(), RunLog::shared("batch", 50), false);
    let mut run = BatchRun::new(plan.tasks);
    let report = executor
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    let kinds: Vec<Option<ErrorKind>> = report
        .outcomes
        .iter()
        .map(|o| match &o.status {
            TaskStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![None, None, Some(ErrorKind::InsufficientFunds)]);
    assert_eq!(chain.submissions().len(), 2);
}

#[tokio::test]
async fn failed_distribution_line_leaves_its_amount_available() {
    let chain = Arc::new(MockChain::default());
    let body = format!(
        "0xnotanaddress, 0.0000000000000005\n{}, 0.0000000000000004\n",
        evm_recipient(2)
    );
    let plan = plan_distribution(
        evm_account(0),
        ChainFamily::Evm,
        &AssetSelector::Native,
        &body,
        None,
        Some(U256::from(600u64)),
    );
    assert_eq!(plan.tasks.len(), 2);

    let executor = BatchExecutor::new(chain.clone(), RunLog::shared("batch", 50), false);
    let mut run = BatchRun::new(plan.tasks);
    let report = executor
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].status,
        TaskStatus::Failed {
            kind: ErrorKind::Validation,
            ..
        }
    ));
    assert!(matches!(
        report.outcomes[1].status,
        TaskStatus::Succeeded { .. }
    ));
    assert_eq!((report.succeeded, report.attempted), (1, 2));
    assert_eq!(chain.submissions().len(), 1);
    assert_eq!(chain.submissions()[0].outflow(), U256::from(400u64));
}
