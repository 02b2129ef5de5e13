// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod support;

use alloy::primitives::U256;
use fleetops::common::run_log::RunLog;
use fleetops::domain::error::AppError;
use fleetops::services::trading::{BuyPlan, LoopState, SellSizing, TradingLoopConfig, VolumeBot};
use std::sync::Arc;
use std::time::Duration;
use support::{MockVenue, evm_account};

fn loop_config(max_cycles: Option<u64>) -> TradingLoopConfig {
    TradingLoopConfig {
        buy: BuyPlan::Spend {
            min: U256::from(1_000u64),
            max: U256::from(5_000u64),
        },
        sell_pct_min: 50,
        sell_pct_max: 90,
        interval_min: Duration::from_secs(5),
        interval_max: Duration::from_secs(15),
        pause_poll: Duration::from_secs(2),
        max_cycles,
        seed: Some(0x5eed),
    }
}

#[tokio::test(start_paused = true)]
async fn hundred_cycles_pick_distinct_pairs_and_bounded_delays() {
    let venue = Arc::new(MockVenue::new());
    let accounts = (0..4).map(evm_account).collect();
    let bot = VolumeBot::new(
        venue.clone(),
        accounts,
        RunLog::shared("volume_bot", 50),
        loop_config(Some(100)),
    );

    let handle = bot.start().await.unwrap();
    let stats = handle.join().await.unwrap();

    assert_eq!(stats.cycles, 100);
    assert_eq!(stats.attempts, 200);
    assert_eq!(stats.successes, 200);
    assert_eq!(stats.failures, 0);

    let buys = venue.buys();
    let sells = venue.sells();
    assert_eq!(buys.len(), 100);
    assert_eq!(sells.len(), 100);
    for ((buyer, _), (seller, sizing)) in buys.iter().zip(&sells) {
        assert_ne!(buyer, seller);
        match sizing {
            SellSizing::Percent(pct) => assert!((50..=90).contains(pct)),
            other => panic!("unexpected sell sizing {other:?}"),
        }
    }
    for pair in buys.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(gap >= Duration::from_secs(5) && gap <= Duration::from_secs(15), "{gap:?}");
    }
    assert!(stats.volume >= U256::from(100_000u64) && stats.volume <= U256::from(500_000u64));
}

#[tokio::test(start_paused = true)]
async fn failed_leg_is_counted_without_stopping_the_loop() {
    let mut venue = MockVenue::new();
    venue.failing_buyers.insert(0);
    let venue = Arc::new(venue);
    let log = RunLog::shared("volume_bot", 500);
    let bot = VolumeBot::new(
        venue.clone(),
        vec![evm_account(0), evm_account(1)],
        log.clone(),
        loop_config(Some(20)),
    );

    let stats = bot.start().await.unwrap().join().await.unwrap();
    let failed_buys = venue.buys().iter().filter(|(i, _)| *i == 0).count() as u64;

    assert_eq!(stats.cycles, 20);
    assert_eq!(stats.attempts, 40);
    assert_eq!(stats.failures, failed_buys);
    assert_eq!(stats.successes, 40 - failed_buys);
    assert!(
        log.snapshot()
            .iter()
            .any(|l| l.message.contains("[InsufficientFundsError]"))
    );
}

#[tokio::test(start_paused = true)]
async fn pause_resume_and_stop() {
    let venue = Arc::new(MockVenue::new());
    let mut config = loop_config(None);
    config.interval_min = Duration::from_secs(1);
    config.interval_max = Duration::from_secs(1);
    let bot = VolumeBot::new(
        venue.clone(),
        vec![evm_account(0), evm_account(1), evm_account(2)],
        RunLog::shared("volume_bot", 50),
        config,
    );
    let handle = bot.start().await.unwrap();
    assert_eq!(handle.state(), LoopState::Running);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    handle.pause();
    assert_eq!(handle.state(), LoopState::Paused);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let paused_at = handle.stats().cycles;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.stats().cycles, paused_at);

    handle.resume();
    assert_eq!(handle.state(), LoopState::Running);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.stats().cycles > paused_at);

    handle.stop();
    let stats = handle.join().await.unwrap();
    assert_eq!(stats.attempts, stats.cycles * 2);
}

#[tokio::test]
async fn unresolved_token_refuses_to_start() {
    let mut venue = MockVenue::new();
    venue.metadata = Err("0xaa.. has no decimals()".into());
    let bot = VolumeBot::new(
        Arc::new(venue),
        vec![evm_account(0), evm_account(1)],
        RunLog::shared("volume_bot", 10),
        loop_config(Some(1)),
    );
    assert!(matches!(bot.start().await, Err(AppError::AssetMetadata(_))));
}

#[tokio::test]
async fn single_account_refuses_to_start() {
    let venue = Arc::new(MockVenue::new());
    let bot = VolumeBot::new(
        venue.clone(),
        vec![evm_account(0)],
        RunLog::shared("volume_bot", 10),
        loop_config(Some(1)),
    );
    assert!(matches!(
        bot.start().await,
        Err(AppError::Validation { .. })
    ));
    assert!(venue.buys().is_empty());
}
