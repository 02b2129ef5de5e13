// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::network::provider::HttpProvider;
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::FeeHistory;
use std::sync::{Arc, Mutex};

const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

#[derive(Clone)]
pub struct GasOracle {
    provider: HttpProvider,
    last_good: Arc<Mutex<Option<GasFees>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub next_base_fee_per_gas: u128,
}

impl GasFees {
    /// Clamps both fee fields to `cap`, so `gas_limit * max_fee_per_gas` stays within a
    /// reserve that was priced at `cap`.
    pub fn capped(self, cap: u128) -> Self {
        Self {
            max_fee_per_gas: self.max_fee_per_gas.min(cap),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.min(cap),
            next_base_fee_per_gas: self.next_base_fee_per_gas,
        }
    }
}

impl GasOracle {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            last_good: Arc::new(Mutex::new(None)),
        }
    }

    /// Legacy gas price, used for native reserve estimation.
    pub async fn gas_price(&self) -> Result<u128, AppError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| AppError::Network(format!("eth_gasPrice failed: {}", e)))
    }

    /// EIP-1559 fees from recent history; falls back to the last good sample and then to the
    /// legacy gas price for nodes without `eth_feeHistory`.
    pub async fn estimate_eip1559_fees(&self) -> Result<GasFees, AppError> {
        let history = self
            .provider
            .get_fee_history(5, BlockNumberOrTag::Latest, &[50.0f64])
            .await;

        match history.ok().and_then(Self::fees_from_history) {
            Some(fees) => {
                if let Ok(mut guard) = self.last_good.lock() {
                    *guard = Some(fees.clone());
                }
                Ok(fees)
            }
            None => {
                if let Ok(guard) = self.last_good.lock()
                    && let Some(fees) = guard.clone()
                {
                    return Ok(fees);
                }
                let price = self.gas_price().await?;
                Ok(GasFees {
                    max_fee_per_gas: price,
                    max_priority_fee_per_gas: price,
                    next_base_fee_per_gas: price,
                })
            }
        }
    }

    fn fees_from_history(history: FeeHistory) -> Option<GasFees> {
        let latest_base_fee = history
            .latest_block_base_fee()
            .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())?;
        let raw_next_base = history.next_block_base_fee().unwrap_or(latest_base_fee);

        // 12.5% buffer for nodes that report a zero next base fee.
        let next_base_fee = if raw_next_base == 0 {
            latest_base_fee.saturating_mul(1125) / 1000
        } else {
            raw_next_base
        };

        let (sum, count) = history
            .reward
            .iter()
            .flatten()
            .filter_map(|block| block.first().copied())
            .fold((0u128, 0u128), |(s, c), r| (s.saturating_add(r), c + 1));
        let tip = if count > 0 {
            sum / count
        } else {
            DEFAULT_PRIORITY_FEE_WEI
        };

        Some(GasFees {
            max_fee_per_gas: next_base_fee.saturating_mul(2).saturating_add(tip),
            max_priority_fee_per_gas: tip,
            next_base_fee_per_gas: next_base_fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fees_use_average_tip_and_double_base_cap() {
        let history = FeeHistory {
            base_fee_per_gas: vec![10, 12, 14],
            gas_used_ratio: vec![0.5, 0.6],
            reward: Some(vec![vec![2], vec![4]]),
            ..Default::default()
        };
        let fees = GasOracle::fees_from_history(history).expect("fees");
        assert_eq!(fees.next_base_fee_per_gas, 14);
        assert_eq!(fees.max_priority_fee_per_gas, 3);
        assert_eq!(fees.max_fee_per_gas, 31);
    }

    #[test]
    fn missing_rewards_fall_back_to_default_tip() {
        let history = FeeHistory {
            base_fee_per_gas: vec![100, 100],
            gas_used_ratio: vec![0.5],
            reward: None,
            ..Default::default()
        };
        let fees = GasOracle::fees_from_history(history).expect("fees");
        assert_eq!(fees.max_priority_fee_per_gas, DEFAULT_PRIORITY_FEE_WEI);
    }

    #[test]
    fn cap_bounds_both_fee_fields() {
        let fees = GasFees {
            max_fee_per_gas: 61,
            max_priority_fee_per_gas: 3,
            next_base_fee_per_gas: 29,
        };
        let capped = fees.clone().capped(30);
        assert_eq!(capped.max_fee_per_gas, 30);
        assert_eq!(capped.max_priority_fee_per_gas, 3);
        assert_eq!(capped.next_base_fee_per_gas, 29);

        let tiny = fees.capped(2);
        assert_eq!(tiny.max_fee_per_gas, 2);
        assert_eq!(tiny.max_priority_fee_per_gas, 2);
    }

    #[test]
    fn empty_history_yields_none() {
        assert!(GasOracle::fees_from_history(FeeHistory::default()).is_none());
    }
}
