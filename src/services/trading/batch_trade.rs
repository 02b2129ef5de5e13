// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::run_log::SharedRunLog;
use crate::common::units::format_amount;
use crate::domain::account::DerivedAccount;
use crate::domain::error::AppError;
use crate::domain::types::ChainFamily;
use crate::services::batch::{BatchReport, RunState, TaskOutcome, TaskStatus};
use crate::services::trading::venue::{BuySizing, SellSizing, TradeFill, TradeVenue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One side applied to every account of a batch trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy(BuySizing),
    Sell(SellSizing),
}

impl TradeSide {
    fn verb(&self) -> &'static str {
        match self {
            TradeSide::Buy(_) => "buy",
            TradeSide::Sell(_) => "sell",
        }
    }
}

/// Runs the same buy or sell for each account in order, one at a time. A failed account is
/// logged and counted; the batch moves on to the next one.
pub struct BatchTrader {
    venue: Arc<dyn TradeVenue>,
    log: SharedRunLog,
}

impl BatchTrader {
    pub fn new(venue: Arc<dyn TradeVenue>, log: SharedRunLog) -> Self {
        Self { venue, log }
    }

    pub fn log(&self) -> &SharedRunLog {
        &self.log
    }

    /// Fails up front only when the traded token cannot be resolved. Cancellation is checked
    /// before each account; the trade in flight always finishes.
    pub async fn execute(
        &self,
        accounts: &[Arc<DerivedAccount>],
        side: TradeSide,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, AppError> {
        let metadata = self.venue.resolve_metadata().await.map_err(|e| match e {
            AppError::AssetMetadata(_) => e,
            other => AppError::AssetMetadata(other.to_string()),
        })?;
        let verb = side.verb();
        let total = accounts.len();
        self.log.info(format!(
            "Batch {verb} started: {total} account(s), token {} ({})",
            metadata.symbol, metadata.address
        ));

        let mut outcomes = Vec::with_capacity(total);
        let mut state = RunState::Completed;
        for (idx, account) in accounts.iter().enumerate() {
            let position = idx + 1;
            if cancel.is_cancelled() {
                state = RunState::Cancelled;
                self.log.warn(format!(
                    "Batch {verb} cancelled before account {position}/{total}: {}",
                    tally(&outcomes)
                ));
                break;
            }

            let label = account.label(ChainFamily::Evm);
            let result = match side {
                TradeSide::Buy(sizing) => self.venue.buy(account, sizing).await,
                TradeSide::Sell(sizing) => self.venue.sell(account, sizing).await,
            };
            let status = match result {
                Ok(fill) => {
                    self.log.info(format!(
                        "Account {label} {verb} succeeded: {} tx {}",
                        self.describe_fill(side, &fill, metadata.decimals, &metadata.symbol),
                        fill.tx
                    ));
                    TaskStatus::Succeeded { tx: fill.tx }
                }
                Err(e) => {
                    let kind = e.kind();
                    self.log
                        .error(format!("Account {label} {verb} failed [{kind}]: {e}"));
                    TaskStatus::Failed {
                        kind,
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(TaskOutcome {
                position,
                source: label,
                recipient: verb.to_string(),
                status,
            });
        }

        if state == RunState::Completed {
            self.log
                .info(format!("Batch {verb} completed: {}", tally(&outcomes)));
        }
        let succeeded = outcomes
            .iter()
            .filter(|o| matches!(o.status, TaskStatus::Succeeded { .. }))
            .count();
        Ok(BatchReport {
            state,
            attempted: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        })
    }

    fn describe_fill(&self, side: TradeSide, fill: &TradeFill, decimals: u8, symbol: &str) -> String {
        match side {
            TradeSide::Buy(_) => format!(
                "{} {}",
                format_amount(fill.amount, self.venue.base_decimals()),
                self.venue.base_symbol()
            ),
            TradeSide::Sell(_) => format!("{} {symbol}", format_amount(fill.amount, decimals)),
        }
    }
}

fn tally(outcomes: &[TaskOutcome]) -> String {
    let ok = outcomes
        .iter()
        .filter(|o| matches!(o.status, TaskStatus::Succeeded { .. }))
        .count();
    format!("{ok}/{}", outcomes.len())
}
