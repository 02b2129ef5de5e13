// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::account::DerivedAccount;
use crate::domain::constants::{BPS_DENOMINATOR, BaseToken, RouterKind};
use crate::domain::error::AppError;
use crate::domain::types::TxId;
use crate::infrastructure::data::token_manager::TokenMetadata;
use crate::network::client::SubmitOptions;
use crate::network::evm::EvmClient;
use crate::services::policy::percent_of;
use crate::services::trading::routers::{UniV2Router, UniV3MulticallDeadline, UniV3Quoter, UniV3Router};
use alloy::primitives::aliases::{U24, U160};
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// How the buy leg sizes its spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuySizing {
    /// Spend `amount` of the base asset, capped at the balance. The buyer must hold at least
    /// `min_balance`.
    Spend { amount: U256, min_balance: U256 },
    /// Buy exactly `amount` target tokens. V3 routers need a quoter for this.
    ExactOutput(U256),
    /// Spend everything above `reserve`.
    SpendAllMinusReserve(U256),
}

/// How a sell sizes its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellSizing {
    /// Whole percent of the token balance. Any output is accepted.
    Percent(u8),
    /// Exactly this many tokens, with the output floored at the quote minus slippage.
    Amount(U256),
    /// The whole token balance, floored like `Amount`.
    All,
}

/// Result of one executed leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeFill {
    pub tx: TxId,
    /// Base spent on a buy (upper bound for exact-output buys); tokens sold on a sell.
    pub amount: U256,
}

/// Market the paired-trading loop trades against.
#[async_trait]
pub trait TradeVenue: Send + Sync {
    /// Resolves and caches the traded token's symbol and decimals.
    async fn resolve_metadata(&self) -> Result<TokenMetadata, AppError>;

    async fn buy(&self, account: &DerivedAccount, sizing: BuySizing) -> Result<TradeFill, AppError>;

    async fn sell(&self, account: &DerivedAccount, sizing: SellSizing) -> Result<TradeFill, AppError>;

    fn base_symbol(&self) -> &str;

    fn base_decimals(&self) -> u8;
}

pub fn apply_slippage_up(amount: U256, slippage_bps: u64) -> U256 {
    amount.saturating_mul(U256::from(BPS_DENOMINATOR + slippage_bps)) / U256::from(BPS_DENOMINATOR)
}

pub fn apply_slippage_down(amount: U256, slippage_bps: u64) -> U256 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps);
    amount.saturating_mul(U256::from(keep)) / U256::from(BPS_DENOMINATOR)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone)]
pub struct RouterVenueConfig {
    pub kind: RouterKind,
    pub router: Address,
    pub quoter: Option<Address>,
    pub target: Address,
    pub base: BaseToken,
    pub v3_fee: u32,
    pub slippage_bps: u64,
    pub deadline_secs: u64,
    pub gas_limit: u64,
    /// V2 only: exact-input swaps go through the fee-on-transfer entry points.
    pub fee_on_transfer: bool,
}

/// Uniswap-style router venue (V2 router or V3 SwapRouter02).
pub struct RouterVenue {
    client: EvmClient,
    config: RouterVenueConfig,
}

impl RouterVenue {
    pub fn new(client: EvmClient, config: RouterVenueConfig) -> Self {
        if config.fee_on_transfer && config.kind == RouterKind::V3 {
            tracing::warn!(
                target: "venue",
                router = %config.router,
                "fee_on_transfer has no effect on a V3 router"
            );
        }
        Self { client, config }
    }

    fn signer<'a>(&self, account: &'a DerivedAccount) -> Result<&'a PrivateKeySigner, AppError> {
        account.evm_signer().ok_or_else(|| {
            AppError::validation("account", format!("account #{} has no EVM key", account.index))
        })
    }

    fn deadline(&self) -> U256 {
        U256::from(unix_now().saturating_add(self.config.deadline_secs))
    }

    fn buy_path(&self) -> Vec<Address> {
        vec![self.config.base.address, self.config.target]
    }

    fn sell_path(&self) -> Vec<Address> {
        vec![self.config.target, self.config.base.address]
    }

    async fn base_balance(&self, owner: Address) -> Result<U256, AppError> {
        if self.config.base.wraps_native {
            self.client.native_balance(owner).await
        } else {
            self.client.token_balance(self.config.base.address, owner).await
        }
    }

    async fn v2_amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Result<U256, AppError> {
        let amounts = UniV2Router::new(self.config.router, self.client.provider().clone())
            .getAmountsOut(amount_in, path)
            .call()
            .await
            .map_err(|e| AppError::Network(format!("getAmountsOut failed: {e}")))?;
        amounts
            .last()
            .copied()
            .ok_or_else(|| AppError::Network("getAmountsOut returned no amounts".into()))
    }

    async fn v2_amounts_in(&self, amount_out: U256, path: Vec<Address>) -> Result<U256, AppError> {
        let amounts = UniV2Router::new(self.config.router, self.client.provider().clone())
            .getAmountsIn(amount_out, path)
            .call()
            .await
            .map_err(|e| AppError::Network(format!("getAmountsIn failed: {e}")))?;
        amounts
            .first()
            .copied()
            .ok_or_else(|| AppError::Network("getAmountsIn returned no amounts".into()))
    }

    async fn v3_quote_out(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<Option<U256>, AppError> {
        let Some(quoter) = self.config.quoter else {
            return Ok(None);
        };
        let out = UniV3Quoter::new(quoter, self.client.provider().clone())
            .quoteExactInputSingle(
                token_in,
                token_out,
                U24::from(self.config.v3_fee),
                amount_in,
                U160::ZERO,
            )
            .call()
            .await
            .map_err(|e| AppError::Network(format!("quoteExactInputSingle failed: {e}")))?;
        Ok(Some(out))
    }

    async fn v3_quote_in(&self, amount_out: U256) -> Result<U256, AppError> {
        let quoter = self.config.quoter.ok_or_else(|| {
            AppError::Unsupported("exact-output buys on a V3 router need a quoter".into())
        })?;
        UniV3Quoter::new(quoter, self.client.provider().clone())
            .quoteExactOutputSingle(
                self.config.base.address,
                self.config.target,
                U24::from(self.config.v3_fee),
                amount_out,
                U160::ZERO,
            )
            .call()
            .await
            .map_err(|e| AppError::Network(format!("quoteExactOutputSingle failed: {e}")))
    }

    /// Quoted output for an exact-input swap minus slippage, or zero when no quote source
    /// exists for this router.
    async fn min_output(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, AppError> {
        let expected = match self.config.kind {
            RouterKind::V2 => Some(self.v2_amounts_out(amount_in, vec![token_in, token_out]).await?),
            RouterKind::V3 => self.v3_quote_out(token_in, token_out, amount_in).await?,
        };
        match expected {
            Some(expected) => Ok(apply_slippage_down(expected, self.config.slippage_bps)),
            None => {
                tracing::warn!(
                    target: "venue",
                    router = %self.config.router,
                    "No V3 quoter configured; swap runs without an output floor"
                );
                Ok(U256::ZERO)
            }
        }
    }

    /// Wraps SwapRouter02 calls in one multicall so the router enforces the deadline.
    fn with_v3_deadline(&self, calls: Vec<Vec<u8>>) -> Vec<u8> {
        UniV3MulticallDeadline::multicallCall {
            deadline: self.deadline(),
            data: calls.into_iter().map(Bytes::from).collect(),
        }
        .abi_encode()
    }

    fn exact_input_buy_call(&self, amount_in: U256, min_out: U256, to: Address) -> Vec<u8> {
        let native = self.config.base.wraps_native;
        let fot = self.config.fee_on_transfer;
        match self.config.kind {
            RouterKind::V2 if native && fot => {
                UniV2Router::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                    amountOutMin: min_out,
                    path: self.buy_path(),
                    to,
                    deadline: self.deadline(),
                }
                .abi_encode()
            }
            RouterKind::V2 if native => UniV2Router::swapExactETHForTokensCall {
                amountOutMin: min_out,
                path: self.buy_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V2 if fot => {
                UniV2Router::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    path: self.buy_path(),
                    to,
                    deadline: self.deadline(),
                }
                .abi_encode()
            }
            RouterKind::V2 => UniV2Router::swapExactTokensForTokensCall {
                amountIn: amount_in,
                amountOutMin: min_out,
                path: self.buy_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V3 => {
                let call = UniV3Router::exactInputSingleCall {
                    params: UniV3Router::ExactInputSingleParams {
                        tokenIn: self.config.base.address,
                        tokenOut: self.config.target,
                        fee: U24::from(self.config.v3_fee),
                        recipient: to,
                        amountIn: amount_in,
                        amountOutMinimum: min_out,
                        sqrtPriceLimitX96: U160::ZERO,
                    },
                }
                .abi_encode();
                self.with_v3_deadline(vec![call])
            }
        }
    }

    /// Exact-output buy. Paying with the native coin on V3 appends `refundETH` so the unspent
    /// part of `max_in` comes back in the same transaction.
    fn exact_output_buy_call(&self, amount_out: U256, max_in: U256, to: Address) -> Vec<u8> {
        let native = self.config.base.wraps_native;
        match self.config.kind {
            RouterKind::V2 if native => UniV2Router::swapETHForExactTokensCall {
                amountOut: amount_out,
                path: self.buy_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V2 => UniV2Router::swapTokensForExactTokensCall {
                amountOut: amount_out,
                amountInMax: max_in,
                path: self.buy_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V3 => {
                let call = UniV3Router::exactOutputSingleCall {
                    params: UniV3Router::ExactOutputSingleParams {
                        tokenIn: self.config.base.address,
                        tokenOut: self.config.target,
                        fee: U24::from(self.config.v3_fee),
                        recipient: to,
                        amountOut: amount_out,
                        amountInMaximum: max_in,
                        sqrtPriceLimitX96: U160::ZERO,
                    },
                }
                .abi_encode();
                let mut calls = vec![call];
                if native {
                    calls.push(UniV3Router::refundETHCall {}.abi_encode());
                }
                self.with_v3_deadline(calls)
            }
        }
    }

    fn sell_call(&self, amount: U256, min_out: U256, to: Address) -> Vec<u8> {
        let native = self.config.base.wraps_native;
        let fot = self.config.fee_on_transfer;
        match self.config.kind {
            RouterKind::V2 if native && fot => {
                UniV2Router::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                    amountIn: amount,
                    amountOutMin: min_out,
                    path: self.sell_path(),
                    to,
                    deadline: self.deadline(),
                }
                .abi_encode()
            }
            RouterKind::V2 if native => UniV2Router::swapExactTokensForETHCall {
                amountIn: amount,
                amountOutMin: min_out,
                path: self.sell_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V2 if fot => {
                UniV2Router::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
                    amountIn: amount,
                    amountOutMin: min_out,
                    path: self.sell_path(),
                    to,
                    deadline: self.deadline(),
                }
                .abi_encode()
            }
            RouterKind::V2 => UniV2Router::swapExactTokensForTokensCall {
                amountIn: amount,
                amountOutMin: min_out,
                path: self.sell_path(),
                to,
                deadline: self.deadline(),
            }
            .abi_encode(),
            RouterKind::V3 => {
                let call = UniV3Router::exactInputSingleCall {
                    params: UniV3Router::ExactInputSingleParams {
                        tokenIn: self.config.target,
                        tokenOut: self.config.base.address,
                        fee: U24::from(self.config.v3_fee),
                        recipient: to,
                        amountIn: amount,
                        amountOutMinimum: min_out,
                        sqrtPriceLimitX96: U160::ZERO,
                    },
                }
                .abi_encode();
                self.with_v3_deadline(vec![call])
            }
        }
    }

    async fn swap(
        &self,
        signer: &PrivateKeySigner,
        value: U256,
        calldata: Vec<u8>,
    ) -> Result<TxId, AppError> {
        let hash = self
            .client
            .send_transaction(
                signer,
                self.config.router,
                value,
                calldata.into(),
                SubmitOptions::with_gas_limit(Some(self.config.gas_limit)),
            )
            .await?;
        self.client.wait_for_hash(hash).await?;
        Ok(TxId(format!("{hash:#x}")))
    }
}

#[async_trait]
impl TradeVenue for RouterVenue {
    async fn resolve_metadata(&self) -> Result<TokenMetadata, AppError> {
        self.client.tokens().resolve(self.config.target).await
    }

    async fn buy(&self, account: &DerivedAccount, sizing: BuySizing) -> Result<TradeFill, AppError> {
        let signer = self.signer(account)?;
        let owner = signer.address();
        let balance = self.base_balance(owner).await?;
        let native = self.config.base.wraps_native;

        let (spend, calldata) = match sizing {
            BuySizing::ExactOutput(amount_out) => {
                let quoted_in = match self.config.kind {
                    RouterKind::V2 => self.v2_amounts_in(amount_out, self.buy_path()).await?,
                    RouterKind::V3 => self.v3_quote_in(amount_out).await?,
                };
                let max_in = apply_slippage_up(quoted_in, self.config.slippage_bps);
                if max_in > balance {
                    return Err(AppError::InsufficientFunds {
                        required: max_in.to_string(),
                        available: balance.to_string(),
                    });
                }
                (max_in, self.exact_output_buy_call(amount_out, max_in, owner))
            }
            BuySizing::Spend {
                amount,
                min_balance,
            } => {
                if balance < min_balance {
                    return Err(AppError::InsufficientFunds {
                        required: min_balance.to_string(),
                        available: balance.to_string(),
                    });
                }
                let amount_in = amount.min(balance);
                (amount_in, self.exact_input_buy(amount_in, owner).await?)
            }
            BuySizing::SpendAllMinusReserve(reserve) => {
                if balance <= reserve {
                    return Err(AppError::InsufficientFunds {
                        required: reserve.to_string(),
                        available: balance.to_string(),
                    });
                }
                let amount_in = balance - reserve;
                (amount_in, self.exact_input_buy(amount_in, owner).await?)
            }
        };

        if !native {
            self.client
                .ensure_allowance(signer, self.config.base.address, self.config.router, spend, U256::MAX)
                .await?;
        }
        let value = if native { spend } else { U256::ZERO };
        let tx = self.swap(signer, value, calldata).await?;
        Ok(TradeFill { tx, amount: spend })
    }

    async fn sell(&self, account: &DerivedAccount, sizing: SellSizing) -> Result<TradeFill, AppError> {
        let signer = self.signer(account)?;
        let owner = signer.address();
        let holdings = self.client.token_balance(self.config.target, owner).await?;
        if holdings.is_zero() {
            return Err(AppError::validation("balance", "target token balance is 0"));
        }
        let amount = match sizing {
            SellSizing::Percent(percent) => percent_of(holdings, u64::from(percent) * 100),
            SellSizing::Amount(amount) => {
                if amount > holdings {
                    return Err(AppError::InsufficientFunds {
                        required: amount.to_string(),
                        available: holdings.to_string(),
                    });
                }
                amount
            }
            SellSizing::All => holdings,
        };
        if amount.is_zero() {
            return Err(AppError::validation("amount", "sell amount rounds to zero"));
        }

        self.client
            .ensure_allowance(signer, self.config.target, self.config.router, amount, U256::MAX)
            .await?;

        // Percentage sells take any output; failed execution is the risk managed there.
        let min_out = match sizing {
            SellSizing::Percent(_) => U256::ZERO,
            SellSizing::Amount(_) | SellSizing::All => {
                self.min_output(self.config.target, self.config.base.address, amount)
                    .await?
            }
        };
        let tx = self
            .swap(signer, U256::ZERO, self.sell_call(amount, min_out, owner))
            .await?;
        Ok(TradeFill { tx, amount })
    }

    fn base_symbol(&self) -> &str {
        self.config.base.symbol
    }

    fn base_decimals(&self) -> u8 {
        self.config.base.decimals
    }
}

impl RouterVenue {
    async fn exact_input_buy(&self, amount_in: U256, to: Address) -> Result<Vec<u8>, AppError> {
        if amount_in.is_zero() {
            return Err(AppError::validation("amount", "buy amount is zero"));
        }
        let min_out = self
            .min_output(self.config.base.address, self.config.target, amount_in)
            .await?;
        Ok(self.exact_input_buy_call(amount_in, min_out, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::base_token;
    use crate::network::evm::EvmClientSettings;
    use std::time::Duration;

    #[test]
    fn slippage_moves_bounds_in_the_right_direction() {
        let quote = U256::from(1_000_000u64);
        assert_eq!(apply_slippage_down(quote, 200), U256::from(980_000u64));
        assert_eq!(apply_slippage_up(quote, 200), U256::from(1_020_000u64));
        assert_eq!(apply_slippage_down(quote, 0), quote);
    }

    #[test]
    fn slippage_rounds_toward_zero() {
        assert_eq!(apply_slippage_down(U256::from(99u64), 200), U256::from(97u64));
        assert_eq!(apply_slippage_up(U256::from(99u64), 200), U256::from(100u64));
    }

    fn venue(kind: RouterKind, base: &str, fee_on_transfer: bool) -> RouterVenue {
        let client = EvmClient::connect(
            "http://127.0.0.1:8545",
            EvmClientSettings {
                chain_id: 1,
                batch_size: 10,
                multicall: None,
                disperse: None,
                receipt_poll: Duration::from_millis(10),
                receipt_timeout: Duration::from_secs(1),
                native_gas_limit: 21_000,
                token_gas_limit: None,
            },
        )
        .expect("client");
        RouterVenue::new(
            client,
            RouterVenueConfig {
                kind,
                router: Address::repeat_byte(0x10),
                quoter: None,
                target: Address::repeat_byte(0xAA),
                base: base_token(1, base).expect("known base"),
                v3_fee: 3_000,
                slippage_bps: 150,
                deadline_secs: 1_200,
                gas_limit: 300_000,
                fee_on_transfer,
            },
        )
    }

    fn selector(calldata: &[u8]) -> String {
        hex::encode(&calldata[..4])
    }

    #[tokio::test]
    async fn fee_on_transfer_switches_v2_entry_points() {
        let to = Address::repeat_byte(3);
        let one = U256::from(1u64);

        let plain = venue(RouterKind::V2, "WETH", false);
        assert_eq!(selector(&plain.exact_input_buy_call(one, one, to)), "7ff36ab5");
        assert_eq!(selector(&plain.sell_call(one, one, to)), "18cbafe5");

        let taxed = venue(RouterKind::V2, "WETH", true);
        assert_eq!(selector(&taxed.exact_input_buy_call(one, one, to)), "b6f9de95");
        assert_eq!(selector(&taxed.sell_call(one, one, to)), "791ac947");

        let taxed_stable = venue(RouterKind::V2, "USDC", true);
        assert_eq!(selector(&taxed_stable.exact_input_buy_call(one, one, to)), "5c11d795");
        assert_eq!(selector(&taxed_stable.sell_call(one, one, to)), "5c11d795");
    }

    #[tokio::test]
    async fn v3_native_exact_output_refunds_unspent_input() {
        let to = Address::repeat_byte(3);
        let native = venue(RouterKind::V3, "WETH", false);
        let calldata = native.exact_output_buy_call(U256::from(10u64), U256::from(12u64), to);
        let decoded = UniV3MulticallDeadline::multicallCall::abi_decode(&calldata).expect("multicall");
        assert_eq!(decoded.data.len(), 2);
        assert_eq!(selector(&decoded.data[0]), "5023b4df");
        assert_eq!(selector(&decoded.data[1]), "12210e8a");

        let stable = venue(RouterKind::V3, "USDC", false);
        let calldata = stable.exact_output_buy_call(U256::from(10u64), U256::from(12u64), to);
        let decoded = UniV3MulticallDeadline::multicallCall::abi_decode(&calldata).expect("multicall");
        assert_eq!(decoded.data.len(), 1);
    }
}
