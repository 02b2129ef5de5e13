// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod support;

use alloy::primitives::U256;
use fleetops::common::run_log::RunLog;
use fleetops::domain::error::{AppError, ErrorKind};
use fleetops::services::batch::{RunState, TaskStatus};
use fleetops::services::trading::{BatchTrader, BuySizing, SellSizing, TradeSide};
use std::sync::Arc;
use support::{MockVenue, evm_account};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn batch_buy_runs_every_account_in_order_and_tallies() {
    let mut venue = MockVenue::new();
    venue.failing_buyers.insert(1);
    let venue = Arc::new(venue);
    let log = RunLog::shared("trade", 50);
    let trader = BatchTrader::new(venue.clone(), log.clone());
    let accounts = vec![evm_account(0), evm_account(1), evm_account(2)];

    let report = trader
        .execute(
            &accounts,
            TradeSide::Buy(BuySizing::SpendAllMinusReserve(U256::from(3_000u64))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!((report.succeeded, report.attempted, report.failed), (2, 3, 1));
    let order: Vec<u32> = venue.buys().iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert!(matches!(
        report.outcomes[1].status,
        TaskStatus::Failed {
            kind: ErrorKind::InsufficientFunds,
            ..
        }
    ));
    assert!(venue.sells().is_empty());

    let lines = log.snapshot();
    assert!(lines[0].message.starts_with("Batch buy started: 3 account(s)"));
    assert!(lines.last().unwrap().message.ends_with("Batch buy completed: 2/3"));
}

#[tokio::test]
async fn batch_sell_passes_sizing_through() {
    let mut venue = MockVenue::new();
    venue.failing_sellers.insert(0);
    let venue = Arc::new(venue);
    let trader = BatchTrader::new(venue.clone(), RunLog::shared("trade", 50));
    let accounts = vec![evm_account(0), evm_account(1)];

    let report = trader
        .execute(
            &accounts,
            TradeSide::Sell(SellSizing::All),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert_eq!(
        venue.sells(),
        vec![(0, SellSizing::All), (1, SellSizing::All)]
    );
    assert_eq!(report.outcomes[1].recipient, "sell");
}

#[tokio::test]
async fn cancelled_batch_trade_stops_before_the_next_account() {
    let venue = Arc::new(MockVenue::new());
    let log = RunLog::shared("trade", 50);
    let trader = BatchTrader::new(venue.clone(), log.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = trader
        .execute(
            &[evm_account(0), evm_account(1)],
            TradeSide::Sell(SellSizing::Percent(50)),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Cancelled);
    assert!(report.outcomes.is_empty());
    assert!(venue.sells().is_empty());
    assert!(
        log.snapshot()
            .iter()
            .any(|l| l.message.contains("cancelled before account 1/2"))
    );
}

#[tokio::test]
async fn unresolved_token_fails_the_whole_batch() {
    let mut venue = MockVenue::new();
    venue.metadata = Err("no decimals()".into());
    let venue = Arc::new(venue);
    let trader = BatchTrader::new(venue.clone(), RunLog::shared("trade", 10));

    let result = trader
        .execute(
            &[evm_account(0)],
            TradeSide::Buy(BuySizing::ExactOutput(U256::from(1u64))),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(AppError::AssetMetadata(_))));
    assert!(venue.buys().is_empty());
}
