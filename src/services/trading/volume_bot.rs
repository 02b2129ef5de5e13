// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::run_log::SharedRunLog;
use crate::common::units::format_amount;
use crate::domain::account::DerivedAccount;
use crate::domain::error::AppError;
use crate::domain::types::ChainFamily;
use crate::services::trading::venue::{BuySizing, SellSizing, TradeFill, TradeVenue};
use alloy::primitives::U256;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SPEND_GRANULARITY: u64 = 1_000_000;

/// Buy-side sizing as configured; `Spend` ranges are drawn per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyPlan {
    Spend { min: U256, max: U256 },
    ExactOutput(U256),
    SpendAllMinusReserve(U256),
}

#[derive(Debug, Clone)]
pub struct TradingLoopConfig {
    pub buy: BuyPlan,
    pub sell_pct_min: u8,
    pub sell_pct_max: u8,
    pub interval_min: Duration,
    pub interval_max: Duration,
    pub pause_poll: Duration,
    /// Stop on its own after this many cycles.
    pub max_cycles: Option<u64>,
    /// Fixed RNG seed for reproducible pair and delay selection.
    pub seed: Option<u64>,
}

impl TradingLoopConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval_min > self.interval_max {
            return Err(AppError::validation("interval", "minimum exceeds maximum"));
        }
        if self.sell_pct_min == 0 || self.sell_pct_min > self.sell_pct_max || self.sell_pct_max > 100
        {
            return Err(AppError::validation(
                "sell_pct",
                format!(
                    "range {}..={} must satisfy 1 <= min <= max <= 100",
                    self.sell_pct_min, self.sell_pct_max
                ),
            ));
        }
        if let BuyPlan::Spend { min, max } = self.buy
            && (min.is_zero() || min > max)
        {
            return Err(AppError::validation(
                "amount",
                "spend range needs 0 < min <= max",
            ));
        }
        Ok(())
    }
}

/// Pseudorandom choices made once per cycle.
pub struct CycleScheduler {
    rng: StdRng,
    interval_min: Duration,
    interval_max: Duration,
    sell_pct_min: u8,
    sell_pct_max: u8,
}

impl CycleScheduler {
    pub fn new(config: &TradingLoopConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            interval_min: config.interval_min,
            interval_max: config.interval_max,
            sell_pct_min: config.sell_pct_min,
            sell_pct_max: config.sell_pct_max,
        }
    }

    /// Two distinct positions in `0..len`, drawn uniformly without replacement.
    pub fn pick_pair(&mut self, len: usize) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let first = self.rng.gen_range(0..len);
        let mut second = self.rng.gen_range(0..len - 1);
        if second >= first {
            second += 1;
        }
        Some((first, second))
    }

    pub fn next_delay(&mut self) -> Duration {
        let min = self.interval_min.as_millis() as u64;
        let max = self.interval_max.as_millis() as u64;
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    pub fn sell_percent(&mut self) -> u8 {
        self.rng.gen_range(self.sell_pct_min..=self.sell_pct_max)
    }

    /// Uniform draw in `[min, max]` with a resolution of one millionth of the range.
    pub fn spend_amount(&mut self, min: U256, max: U256) -> U256 {
        if max <= min {
            return min;
        }
        let step = self.rng.gen_range(0..=SPEND_GRANULARITY);
        let span = max - min;
        min + span / U256::from(SPEND_GRANULARITY) * U256::from(step)
            + span % U256::from(SPEND_GRANULARITY) * U256::from(step) / U256::from(SPEND_GRANULARITY)
    }

    pub fn buy_sizing(&mut self, plan: BuyPlan) -> BuySizing {
        match plan {
            BuyPlan::Spend { min, max } => BuySizing::Spend {
                amount: self.spend_amount(min, max),
                min_balance: min,
            },
            BuyPlan::ExactOutput(amount) => BuySizing::ExactOutput(amount),
            BuyPlan::SpendAllMinusReserve(reserve) => BuySizing::SpendAllMinusReserve(reserve),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

/// Aggregate counters across cycles. Each leg counts as one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingStats {
    pub cycles: u64,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Base asset spent by successful buy legs.
    pub volume: U256,
}

struct Shared {
    state: Mutex<LoopState>,
    stats: Mutex<TradingStats>,
    paused: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: LoopState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn state(&self) -> LoopState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stats(&self) -> TradingStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update_stats(&self, f: impl FnOnce(&mut TradingStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *stats);
    }
}

/// Control surface of a running trading loop.
pub struct TradingLoopHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TradingLoopHandle {
    /// Takes effect before the next cycle; a cycle in progress finishes.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        if self.shared.state() == LoopState::Running {
            self.shared.set_state(LoopState::Paused);
        }
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        if self.shared.state() == LoopState::Paused {
            self.shared.set_state(LoopState::Running);
        }
    }

    /// Requests a stop. Legs in flight are awaited; the inter-cycle sleep is cut short.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn stats(&self) -> TradingStats {
        self.shared.stats()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to end and returns the final statistics.
    pub async fn join(self) -> Result<TradingStats, AppError> {
        self.task
            .await
            .map_err(|e| AppError::Unknown(anyhow::anyhow!("trading loop task failed: {e}")))?;
        Ok(self.shared.stats())
    }
}

/// Paired buy/sell loop over a set of accounts.
pub struct VolumeBot {
    venue: Arc<dyn TradeVenue>,
    accounts: Vec<Arc<DerivedAccount>>,
    log: SharedRunLog,
    config: TradingLoopConfig,
}

impl VolumeBot {
    pub fn new(
        venue: Arc<dyn TradeVenue>,
        accounts: Vec<Arc<DerivedAccount>>,
        log: SharedRunLog,
        config: TradingLoopConfig,
    ) -> Self {
        Self {
            venue,
            accounts,
            log,
            config,
        }
    }

    /// Validates the setup, resolves the traded token and spawns the loop.
    pub async fn start(self) -> Result<TradingLoopHandle, AppError> {
        self.config.validate()?;
        let accounts: Vec<Arc<DerivedAccount>> = self
            .accounts
            .into_iter()
            .filter(|a| a.supports(ChainFamily::Evm))
            .collect();
        if accounts.len() < 2 {
            return Err(AppError::validation(
                "accounts",
                "paired trading needs at least 2 EVM accounts",
            ));
        }

        let meta = self.venue.resolve_metadata().await.map_err(|e| match e {
            AppError::AssetMetadata(_) => e,
            other => AppError::AssetMetadata(other.to_string()),
        })?;
        self.log.info(format!(
            "Target token verified: {} ({} decimals)",
            meta.symbol, meta.decimals
        ));

        let shared = Arc::new(Shared {
            state: Mutex::new(LoopState::Running),
            stats: Mutex::new(TradingStats::default()),
            paused: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let runner = LoopRunner {
            venue: self.venue,
            accounts,
            log: self.log,
            scheduler: CycleScheduler::new(&self.config),
            config: self.config,
            token_symbol: meta.symbol,
            token_decimals: meta.decimals,
            shared: shared.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(runner.run());

        Ok(TradingLoopHandle {
            shared,
            cancel,
            task,
        })
    }
}

struct LoopRunner {
    venue: Arc<dyn TradeVenue>,
    accounts: Vec<Arc<DerivedAccount>>,
    log: SharedRunLog,
    scheduler: CycleScheduler,
    config: TradingLoopConfig,
    token_symbol: String,
    token_decimals: u8,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl LoopRunner {
    async fn run(mut self) {
        self.log.info("Trading loop started");
        let mut announced_pause = false;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if self.shared.paused.load(Ordering::SeqCst) {
                if !announced_pause {
                    self.log.info("Trading loop paused");
                    announced_pause = true;
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.config.pause_poll) => {}
                    _ = self.cancel.cancelled() => break,
                }
                continue;
            }
            if announced_pause {
                self.log.info("Trading loop resumed");
                announced_pause = false;
            }

            self.run_cycle().await;

            let done = self.shared.stats().cycles;
            if self.config.max_cycles.is_some_and(|max| done >= max) {
                self.log.info(format!("Reached {done} cycle(s)"));
                break;
            }

            let delay = self.scheduler.next_delay();
            self.log
                .info(format!("Next cycle in {:.1}s", delay.as_secs_f64()));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        self.shared.set_state(LoopState::Stopped);
        let stats = self.shared.stats();
        self.log.info(format!(
            "Trading loop stopped: {} cycle(s), {}/{} legs succeeded, volume {} {}",
            stats.cycles,
            stats.successes,
            stats.attempts,
            format_amount(stats.volume, self.venue.base_decimals()),
            self.venue.base_symbol()
        ));
    }

    async fn run_cycle(&mut self) {
        let Some((buy_idx, sell_idx)) = self.scheduler.pick_pair(self.accounts.len()) else {
            return;
        };
        let buyer = self.accounts[buy_idx].clone();
        let seller = self.accounts[sell_idx].clone();
        let sizing = self.scheduler.buy_sizing(self.config.buy);
        let percent = self.scheduler.sell_percent();
        let cycle = self.shared.stats().cycles + 1;

        self.log.info(format!(
            "Cycle {cycle}: buyer #{} {} / seller #{} {} ({percent}%)",
            buyer.index,
            buyer.label(ChainFamily::Evm),
            seller.index,
            seller.label(ChainFamily::Evm),
        ));

        let (bought, sold) = tokio::join!(
            self.venue.buy(&buyer, sizing),
            self.venue.sell(&seller, SellSizing::Percent(percent))
        );

        self.shared.update_stats(|s| s.cycles += 1);
        self.record_leg("Buy", &buyer, bought, true);
        self.record_leg("Sell", &seller, sold, false);
    }

    fn record_leg(
        &self,
        side: &str,
        account: &DerivedAccount,
        result: Result<TradeFill, AppError>,
        is_buy: bool,
    ) {
        match result {
            Ok(fill) => {
                let amount = if is_buy {
                    format!(
                        "{} {}",
                        format_amount(fill.amount, self.venue.base_decimals()),
                        self.venue.base_symbol()
                    )
                } else {
                    format!(
                        "{} {}",
                        format_amount(fill.amount, self.token_decimals),
                        self.token_symbol
                    )
                };
                self.log.info(format!(
                    "{side} succeeded [#{}]: {amount} tx {}",
                    account.index, fill.tx
                ));
                self.shared.update_stats(|s| {
                    s.attempts += 1;
                    s.successes += 1;
                    if is_buy {
                        s.volume = s.volume.saturating_add(fill.amount);
                    }
                });
            }
            Err(e) => {
                self.log.error(format!(
                    "{side} failed [#{}] [{}]: {e}",
                    account.index,
                    e.kind()
                ));
                self.shared.update_stats(|s| {
                    s.attempts += 1;
                    s.failures += 1;
                });
            }
        }
    }
}
