// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::Provider;
use dashmap::{DashMap, DashSet};

use crate::domain::constants::base_tokens;
use crate::domain::error::AppError;
use crate::infrastructure::data::abi::IERC20;
use crate::network::provider::HttpProvider;

/// Token metadata needed to size and display amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Caches `decimals()`/`symbol()` per token; entries live until invalidated.
#[derive(Clone)]
pub struct TokenManager {
    provider: HttpProvider,
    tokens: Arc<DashMap<Address, TokenMetadata>>,
    invalid_tokens: Arc<DashSet<Address>>,
}

impl TokenManager {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            tokens: Arc::new(DashMap::new()),
            invalid_tokens: Arc::new(DashSet::new()),
        }
    }

    /// Pre-populates the well-known base tokens of `chain_id`.
    pub fn with_known_tokens(provider: HttpProvider, chain_id: u64) -> Self {
        let manager = Self::new(provider);
        for token in base_tokens(chain_id) {
            manager.tokens.insert(
                token.address,
                TokenMetadata {
                    address: token.address,
                    symbol: token.symbol.to_string(),
                    decimals: token.decimals,
                },
            );
        }
        manager
    }

    pub fn cached(&self, token: Address) -> Option<TokenMetadata> {
        self.tokens.get(&token).map(|entry| entry.value().clone())
    }

    pub fn invalidate(&self, token: Address) {
        self.tokens.remove(&token);
        self.invalid_tokens.remove(&token);
    }

    /// Fails with `InvalidAsset` when `token` has no bytecode.
    pub async fn ensure_contract(&self, token: Address) -> Result<(), AppError> {
        if self.tokens.contains_key(&token) {
            return Ok(());
        }
        if self.invalid_tokens.contains(&token) {
            return Err(AppError::InvalidAsset(format!("{token:#x} is not a contract")));
        }
        let code = self
            .provider
            .get_code_at(token)
            .await
            .map_err(|e| AppError::Network(format!("eth_getCode {token:#x} failed: {e}")))?;
        if code.is_empty() {
            tracing::warn!(
                target: "token_manager",
                address = %format!("{:#x}", token),
                "Token address has no bytecode"
            );
            self.invalid_tokens.insert(token);
            return Err(AppError::InvalidAsset(format!("{token:#x} is not a contract")));
        }
        Ok(())
    }

    /// Resolves decimals and symbol once per token.
    pub async fn resolve(&self, token: Address) -> Result<TokenMetadata, AppError> {
        if let Some(meta) = self.cached(token) {
            return Ok(meta);
        }
        self.ensure_contract(token).await.map_err(|e| match e {
            AppError::InvalidAsset(msg) => AppError::AssetMetadata(msg),
            other => other,
        })?;

        let erc20 = IERC20::new(token, self.provider.clone());
        let decimals = erc20.decimals().call().await.map_err(|e| {
            AppError::AssetMetadata(format!("decimals() on {token:#x} failed: {e}"))
        })?;
        let symbol = erc20.symbol().call().await.map_err(|e| {
            AppError::AssetMetadata(format!("symbol() on {token:#x} failed: {e}"))
        })?;

        let meta = TokenMetadata {
            address: token,
            symbol,
            decimals,
        };
        tracing::debug!(
            target: "token_manager",
            address = %format!("{:#x}", token),
            symbol = %meta.symbol,
            decimals = meta.decimals,
            "Resolved token metadata"
        );
        self.tokens.insert(token, meta.clone());
        Ok(meta)
    }
}
