// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::account::DerivedAccount;
use crate::domain::error::AppError;
use crate::domain::types::{ChainAddress, ChainFamily, PreparedRequest, TxId};
use alloy::primitives::U256;
use async_trait::async_trait;

/// Per-transaction overrides the planner may attach to a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub gas_limit: Option<u64>,
    /// Upper bound for the per-gas fee. A native sweep whose amount was computed as
    /// `balance - gas_limit * price` is sent with this set to `price`.
    pub fee_cap: Option<U256>,
}

impl SubmitOptions {
    pub fn with_gas_limit(gas_limit: Option<u64>) -> Self {
        Self {
            gas_limit,
            fee_cap: None,
        }
    }
}

/// Chain access used by the balance aggregator and the batch executor.
///
/// Per-owner results are positional: `result[i]` belongs to `owners[i]`, so one failed lookup
/// never hides the others.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn family(&self) -> ChainFamily;

    async fn native_balances(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>>;

    /// Fails with `InvalidAsset` when `token` is not a fungible-token contract of this chain.
    async fn ensure_token(&self, token: &ChainAddress) -> Result<(), AppError>;

    async fn token_balances(
        &self,
        token: &ChainAddress,
        owners: &[ChainAddress],
    ) -> Vec<Result<U256, AppError>>;

    /// Price of one gas unit (one signature on Solana) in native smallest units.
    async fn gas_price(&self) -> Result<U256, AppError>;

    /// Signs `request` with `account`'s key for this family and broadcasts it.
    async fn submit(
        &self,
        account: &DerivedAccount,
        request: &PreparedRequest,
        options: SubmitOptions,
    ) -> Result<TxId, AppError>;

    /// Waits for inclusion; a reverted or failed transaction is an error.
    async fn wait_for_receipt(&self, tx: &TxId) -> Result<(), AppError>;
}
