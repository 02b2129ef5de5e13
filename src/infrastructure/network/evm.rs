// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::parse_b256_hex;
use crate::domain::account::DerivedAccount;
use crate::domain::constants::{BPS_DENOMINATOR, GAS_ESTIMATE_HEADROOM_BPS};
use crate::domain::error::AppError;
use crate::domain::types::{AssetSelector, ChainAddress, ChainFamily, PreparedRequest, TxId};
use crate::infrastructure::data::abi::{IDisperse, IERC20, IMulticall3};
use crate::infrastructure::data::token_manager::TokenManager;
use crate::network::client::{ChainClient, SubmitOptions};
use crate::network::gas::GasOracle;
use crate::network::nonce::NonceManager;
use crate::network::provider::{ConnectionFactory, HttpProvider};
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::client::{RpcClient, Waiter};
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::future::join_all;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct EvmClientSettings {
    pub chain_id: u64,
    pub batch_size: usize,
    pub multicall: Option<Address>,
    pub disperse: Option<Address>,
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
    pub native_gas_limit: u64,
    pub token_gas_limit: Option<u64>,
}

#[derive(Clone)]
pub struct EvmClient {
    rpc: RpcClient,
    provider: HttpProvider,
    gas: GasOracle,
    nonces: NonceManager,
    tokens: TokenManager,
    settings: EvmClientSettings,
}

impl EvmClient {
    pub fn connect(rpc_url: &str, settings: EvmClientSettings) -> Result<Self, AppError> {
        let (rpc, provider) = ConnectionFactory::http_with_client(rpc_url)?;
        Ok(Self {
            gas: GasOracle::new(provider.clone()),
            nonces: NonceManager::new(provider.clone()),
            tokens: TokenManager::with_known_tokens(provider.clone(), settings.chain_id),
            rpc,
            provider,
            settings,
        })
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    pub fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn native_balance(&self, owner: Address) -> Result<U256, AppError> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| AppError::Network(format!("eth_getBalance {owner} failed: {e}")))
    }

    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| AppError::Network(format!("balanceOf({owner}) on {token:#x} failed: {e}")))
    }

    /// Signs an EIP-1559 transaction and broadcasts it. Returns the transaction hash.
    ///
    /// `options.fee_cap` clamps the per-gas fees; without it the oracle's estimate is used.
    pub async fn send_transaction(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
        input: Bytes,
        options: SubmitOptions,
    ) -> Result<B256, AppError> {
        let from = signer.address();
        let gas_limit = match options.gas_limit {
            Some(limit) => limit,
            None => self.estimate_gas_limit(from, to, value, &input).await?,
        };
        let mut fees = self.gas.estimate_eip1559_fees().await?;
        if let Some(cap) = options.fee_cap {
            fees = fees.capped(cap.saturating_to::<u128>());
        }
        let nonce = self.nonces.next_nonce(from).await?;

        let mut tx = TxEip1559 {
            chain_id: self.settings.chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input,
        };

        let sig = match TxSignerSync::sign_transaction_sync(signer, &mut tx) {
            Ok(sig) => sig,
            Err(e) => {
                self.nonces.release(from, nonce);
                return Err(AppError::Transaction {
                    hash: String::new(),
                    reason: format!("Sign tx failed: {e}"),
                });
            }
        };
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let hash = *signed.tx_hash();
        let raw = signed.encoded_2718();

        if let Err(e) = self.provider.send_raw_transaction(&raw).await {
            self.nonces.release(from, nonce);
            let err = match e.as_error_resp() {
                Some(payload) => AppError::Transaction {
                    hash: format!("{hash:#x}"),
                    reason: payload.message.to_string(),
                },
                None => AppError::Network(format!("eth_sendRawTransaction failed: {e}")),
            };
            return Err(err);
        }

        tracing::debug!(
            target: "evm",
            from = %from,
            to = %to,
            nonce,
            gas_limit,
            hash = %format!("{:#x}", hash),
            "Transaction broadcast"
        );
        Ok(hash)
    }

    /// Polls for the receipt of `hash` until it lands or the timeout elapses.
    pub async fn wait_for_hash(&self, hash: B256) -> Result<(), AppError> {
        let started = Instant::now();
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(rcpt)) => {
                    if rcpt.status() {
                        return Ok(());
                    }
                    return Err(AppError::Transaction {
                        hash: format!("{hash:#x}"),
                        reason: "execution reverted".into(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        target: "evm",
                        error = %e,
                        hash = %format!("{:#x}", hash),
                        "Receipt lookup error; polling again"
                    );
                }
            }

            if started.elapsed() >= self.settings.receipt_timeout {
                return Err(AppError::Network(format!(
                    "receipt for {hash:#x} not seen within {}ms",
                    self.settings.receipt_timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.settings.receipt_poll).await;
        }
    }

    /// Approves `approve_amount` to `spender` when the current allowance is below `needed`,
    /// and waits for the approval to land.
    pub async fn ensure_allowance(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        spender: Address,
        needed: U256,
        approve_amount: U256,
    ) -> Result<(), AppError> {
        let owner = signer.address();
        let current = IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| AppError::Network(format!("allowance() on {token:#x} failed: {e}")))?;
        if current >= needed {
            return Ok(());
        }

        let calldata = IERC20::approveCall {
            spender,
            amount: approve_amount,
        }
        .abi_encode();
        let hash = self
            .send_transaction(
                signer,
                token,
                U256::ZERO,
                calldata.into(),
                SubmitOptions::default(),
            )
            .await?;
        tracing::info!(
            target: "evm",
            owner = %owner,
            token = %format!("{:#x}", token),
            spender = %spender,
            hash = %format!("{:#x}", hash),
            "Approval submitted"
        );
        self.wait_for_hash(hash).await
    }

    async fn estimate_gas_limit(
        &self,
        from: Address,
        to: Address,
        value: U256,
        input: &Bytes,
    ) -> Result<u64, AppError> {
        let request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            value: Some(value),
            input: TransactionInput::new(input.clone()),
            ..Default::default()
        };
        let estimate = self.provider.estimate_gas(request).await.map_err(|e| {
            AppError::Transaction {
                hash: String::new(),
                reason: format!("gas estimation failed: {e}"),
            }
        })?;
        Ok(estimate.saturating_mul(GAS_ESTIMATE_HEADROOM_BPS) / BPS_DENOMINATOR)
    }

    /// One JSON-RPC batch of `eth_getBalance` calls.
    async fn native_balance_batch(&self, owners: &[Address]) -> Vec<Result<U256, AppError>> {
        let mut batch = self.rpc.new_batch();
        let mut waiters: Vec<Result<Waiter<U256>, AppError>> = Vec::with_capacity(owners.len());
        for owner in owners {
            let waiter = batch
                .add_call("eth_getBalance", &(*owner, BlockNumberOrTag::Latest))
                .map_err(|e| AppError::Network(format!("eth_getBalance {owner} not queued: {e}")));
            waiters.push(waiter);
        }

        if let Err(e) = batch.send().await {
            let reason = format!("balance batch failed: {e}");
            return owners
                .iter()
                .map(|_| Err(AppError::Network(reason.clone())))
                .collect();
        }

        let mut results = Vec::with_capacity(waiters.len());
        for (owner, waiter) in owners.iter().zip(waiters) {
            let result = match waiter {
                Ok(waiter) => waiter
                    .await
                    .map_err(|e| AppError::Network(format!("eth_getBalance {owner} failed: {e}"))),
                Err(e) => Err(e),
            };
            results.push(result);
        }
        results
    }

    /// `balanceOf` for a chunk of owners through Multicall3, or `None` when the aggregate
    /// call itself is unavailable.
    async fn token_balances_multicall(
        &self,
        multicall: Address,
        token: Address,
        owners: &[Address],
    ) -> Option<Vec<Result<U256, AppError>>> {
        let calls = owners
            .iter()
            .map(|owner| IMulticall3::Call3 {
                target: token,
                allowFailure: true,
                callData: IERC20::balanceOfCall { owner: *owner }.abi_encode().into(),
            })
            .collect::<Vec<_>>();

        let returned = match IMulticall3::new(multicall, self.provider.clone())
            .aggregate3(calls)
            .call()
            .await
        {
            Ok(returned) => returned,
            Err(e) => {
                tracing::debug!(
                    target: "evm",
                    error = %e,
                    multicall = %multicall,
                    "aggregate3 unavailable; falling back to individual calls"
                );
                return None;
            }
        };
        if returned.len() != owners.len() {
            tracing::warn!(
                target: "evm",
                expected = owners.len(),
                got = returned.len(),
                "aggregate3 returned a mismatched result count"
            );
            return None;
        }

        Some(
            owners
                .iter()
                .zip(returned)
                .map(|(owner, entry)| {
                    if !entry.success {
                        return Err(AppError::Network(format!(
                            "balanceOf({owner}) reverted inside multicall"
                        )));
                    }
                    IERC20::balanceOfCall::abi_decode_returns(&entry.returnData).map_err(|e| {
                        AppError::Network(format!("balanceOf({owner}) returned garbage: {e}"))
                    })
                })
                .collect(),
        )
    }

    async fn token_balances_individual(
        &self,
        token: Address,
        owners: &[Address],
    ) -> Vec<Result<U256, AppError>> {
        join_all(owners.iter().map(|owner| self.token_balance(token, *owner))).await
    }

    async fn disperse(
        &self,
        signer: &PrivateKeySigner,
        asset: &AssetSelector,
        recipients: &[(ChainAddress, U256)],
        options: SubmitOptions,
    ) -> Result<B256, AppError> {
        let contract = self.settings.disperse.ok_or_else(|| {
            AppError::Unsupported(format!(
                "no Disperse contract configured for chain {}",
                self.settings.chain_id
            ))
        })?;

        let mut addresses = Vec::with_capacity(recipients.len());
        let mut values = Vec::with_capacity(recipients.len());
        for (recipient, amount) in recipients {
            addresses.push(expect_evm(recipient)?);
            values.push(*amount);
        }
        let total = values
            .iter()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v));

        match asset {
            AssetSelector::Native => {
                let calldata = IDisperse::disperseEtherCall {
                    recipients: addresses,
                    values,
                }
                .abi_encode();
                self.send_transaction(signer, contract, total, calldata.into(), options)
                    .await
            }
            AssetSelector::Token { contract: token, .. } => {
                let token = expect_evm(token)?;
                self.ensure_allowance(signer, token, contract, total, total)
                    .await?;
                let calldata = IDisperse::disperseTokenCall {
                    token,
                    recipients: addresses,
                    values,
                }
                .abi_encode();
                self.send_transaction(signer, contract, U256::ZERO, calldata.into(), options)
                    .await
            }
        }
    }
}

fn expect_evm(address: &ChainAddress) -> Result<Address, AppError> {
    address
        .as_evm()
        .ok_or_else(|| AppError::InvalidAddress(address.to_string()))
}

fn split_owners(owners: &[ChainAddress]) -> Vec<Option<Address>> {
    owners.iter().map(ChainAddress::as_evm).collect()
}

/// Runs `fetch` over the EVM owners in chunks and scatters results back to input positions.
async fn scatter_chunks<F, Fut>(
    owners: &[ChainAddress],
    chunk_size: usize,
    mut fetch: F,
) -> Vec<Result<U256, AppError>>
where
    F: FnMut(Vec<Address>) -> Fut,
    Fut: std::future::Future<Output = Vec<Result<U256, AppError>>>,
{
    let resolved = split_owners(owners);
    let mut results: Vec<Option<Result<U256, AppError>>> = owners
        .iter()
        .zip(&resolved)
        .map(|(raw, evm)| match evm {
            Some(_) => None,
            None => Some(Err(AppError::InvalidAddress(raw.to_string()))),
        })
        .collect();

    let positions: Vec<(usize, Address)> = resolved
        .iter()
        .enumerate()
        .filter_map(|(idx, addr)| addr.map(|a| (idx, a)))
        .collect();

    for chunk in positions.chunks(chunk_size.max(1)) {
        let addrs = chunk.iter().map(|(_, a)| *a).collect::<Vec<_>>();
        let fetched = fetch(addrs).await;
        for ((idx, _), result) in chunk.iter().zip(fetched) {
            results[*idx] = Some(result);
        }
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(AppError::Network("no result returned".into()))))
        .collect()
}

#[async_trait]
impl ChainClient for EvmClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn native_balances(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>> {
        scatter_chunks(owners, self.settings.batch_size, |chunk| async move {
            self.native_balance_batch(&chunk).await
        })
        .await
    }

    async fn ensure_token(&self, token: &ChainAddress) -> Result<(), AppError> {
        let token = token
            .as_evm()
            .ok_or_else(|| AppError::InvalidAsset(format!("{token} is not an EVM contract")))?;
        self.tokens.ensure_contract(token).await
    }

    async fn token_balances(
        &self,
        token: &ChainAddress,
        owners: &[ChainAddress],
    ) -> Vec<Result<U256, AppError>> {
        let Some(token) = token.as_evm() else {
            return owners
                .iter()
                .map(|_| Err(AppError::InvalidAsset(format!("{token} is not an EVM contract"))))
                .collect();
        };
        let multicall = self.settings.multicall;
        scatter_chunks(owners, self.settings.batch_size, |chunk| async move {
            if let Some(multicall) = multicall
                && let Some(results) = self.token_balances_multicall(multicall, token, &chunk).await
            {
                return results;
            }
            self.token_balances_individual(token, &chunk).await
        })
        .await
    }

    async fn gas_price(&self) -> Result<U256, AppError> {
        self.gas.gas_price().await.map(U256::from)
    }

    async fn submit(
        &self,
        account: &DerivedAccount,
        request: &PreparedRequest,
        options: SubmitOptions,
    ) -> Result<TxId, AppError> {
        let signer = account.evm_signer().ok_or_else(|| {
            AppError::validation(
                "source",
                format!("account #{} has no EVM key", account.index),
            )
        })?;

        let hash = match request {
            PreparedRequest::NativeTransfer { to, amount } => {
                let to = expect_evm(to)?;
                let options = SubmitOptions {
                    gas_limit: Some(options.gas_limit.unwrap_or(self.settings.native_gas_limit)),
                    ..options
                };
                self.send_transaction(signer, to, *amount, Bytes::new(), options)
                    .await?
            }
            PreparedRequest::TokenTransfer { token, to, amount } => {
                let token = expect_evm(token)?;
                let calldata = IERC20::transferCall {
                    to: expect_evm(to)?,
                    amount: *amount,
                }
                .abi_encode();
                let options = SubmitOptions {
                    gas_limit: options.gas_limit.or(self.settings.token_gas_limit),
                    ..options
                };
                self.send_transaction(signer, token, U256::ZERO, calldata.into(), options)
                    .await?
            }
            PreparedRequest::ContractCall {
                to,
                calldata,
                value,
            } => {
                let to = expect_evm(to)?;
                self.send_transaction(signer, to, *value, calldata.clone(), options)
                    .await?
            }
            PreparedRequest::Disperse { asset, recipients } => {
                self.disperse(signer, asset, recipients, options).await?
            }
        };
        Ok(TxId(format!("{hash:#x}")))
    }

    async fn wait_for_receipt(&self, tx: &TxId) -> Result<(), AppError> {
        let hash = parse_b256_hex(&tx.0)
            .ok_or_else(|| AppError::validation("tx", format!("'{tx}' is not a transaction hash")))?;
        self.wait_for_hash(hash).await
    }
}
