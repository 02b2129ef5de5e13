// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::types::AssetSelector;
use alloy::primitives::U256;

/// What to hold back in `BalanceMinusReserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserve {
    Explicit(U256),
    /// `gas_price * gas_limit` at evaluation time. Applies to native transfers only.
    GasCost { gas_limit: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountPolicy {
    Fixed(U256),
    FullBalance,
    BalanceMinusReserve(Reserve),
    /// Share of the balance in basis points, rounded down.
    PercentageOfBalance { bps: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub target: U256,
    pub valid: bool,
}

impl PolicyOutcome {
    fn from_target(target: U256) -> Self {
        Self {
            target,
            valid: !target.is_zero(),
        }
    }
}

impl AmountPolicy {
    pub fn needs_gas_price(&self, asset: &AssetSelector) -> bool {
        matches!(
            self,
            AmountPolicy::BalanceMinusReserve(Reserve::GasCost { .. })
        ) && asset.is_native()
    }

    /// Pure integer evaluation. `gas_price` is only read for gas-cost reserves on native assets.
    pub fn evaluate(&self, balance: U256, asset: &AssetSelector, gas_price: U256) -> PolicyOutcome {
        match self {
            AmountPolicy::Fixed(amount) => PolicyOutcome::from_target(*amount),
            AmountPolicy::FullBalance => PolicyOutcome::from_target(balance),
            AmountPolicy::BalanceMinusReserve(reserve) => {
                let reserve = match reserve {
                    Reserve::Explicit(amount) => *amount,
                    Reserve::GasCost { gas_limit } if asset.is_native() => {
                        gas_price.saturating_mul(U256::from(*gas_limit))
                    }
                    Reserve::GasCost { .. } => U256::ZERO,
                };
                PolicyOutcome::from_target(balance.saturating_sub(reserve))
            }
            AmountPolicy::PercentageOfBalance { bps } => {
                PolicyOutcome::from_target(percent_of(balance, *bps))
            }
        }
    }
}

/// `floor(amount * bps / 10000)` without overflowing for any `U256`.
pub fn percent_of(amount: U256, bps: u64) -> U256 {
    let denom = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(bps);
    (amount / denom).saturating_mul(bps) + (amount % denom) * bps / denom
}
