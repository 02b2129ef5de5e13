// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{
    self, DEFAULT_SOLANA_RPC, MULTICALL3, NATIVE_TRANSFER_GAS, RouterKind,
    SOLANA_MAX_TRANSFERS_PER_TX,
};
use crate::domain::error::AppError;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    pub http_providers: Option<HashMap<String, String>>,
    #[serde(default = "default_solana_rpc_url")]
    pub solana_rpc_url: String,

    // Accounts
    #[serde(default = "default_account_start")]
    pub account_start: u32,
    #[serde(default = "default_account_count")]
    pub account_count: u32,

    // Reads
    #[serde(default = "default_rpc_batch_size")]
    pub rpc_batch_size: usize,
    #[serde(default = "default_true")]
    pub multicall_enabled: bool,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: Address,

    // Batch execution
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default = "default_true")]
    pub wait_for_receipts: bool,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    #[serde(default = "default_native_gas_limit")]
    pub native_gas_limit: u64,
    /// Fixed gas limit for token transfers; estimated per transaction when unset.
    pub token_gas_limit: Option<u64>,
    /// Explicit native reserve (decimal) left behind by collections; gas-cost reserve when unset.
    pub collect_reserve: Option<String>,
    pub disperse_address: Option<Address>,
    #[serde(default = "default_evm_airdrop_chunk_size")]
    pub evm_airdrop_chunk_size: usize,
    #[serde(default = "default_solana_chunk_size")]
    pub solana_chunk_size: usize,

    // Paired trading
    #[serde(default = "default_bot_router_kind")]
    pub bot_router_kind: String,
    pub bot_router_address: Option<Address>,
    pub bot_quoter_address: Option<Address>,
    #[serde(default = "default_bot_base_token")]
    pub bot_base_token: String,
    #[serde(default = "default_bot_v3_fee")]
    pub bot_v3_fee: u32,
    /// `spend`, `exact-output` or `spend-all`.
    #[serde(default = "default_bot_buy_mode")]
    pub bot_buy_mode: String,
    #[serde(default = "default_bot_amount_min")]
    pub bot_amount_min: String,
    #[serde(default = "default_bot_amount_max")]
    pub bot_amount_max: String,
    /// Token amount bought per cycle in `exact-output` mode.
    pub bot_exact_output: Option<String>,
    #[serde(default = "default_bot_reserve")]
    pub bot_reserve: String,
    #[serde(default = "default_bot_sell_pct_min")]
    pub bot_sell_pct_min: u8,
    #[serde(default = "default_bot_sell_pct_max")]
    pub bot_sell_pct_max: u8,
    #[serde(default = "default_bot_interval_min_secs")]
    pub bot_interval_min_secs: u64,
    #[serde(default = "default_bot_interval_max_secs")]
    pub bot_interval_max_secs: u64,
    #[serde(default = "default_slippage_bps")]
    pub bot_slippage_bps: u64,
    #[serde(default = "default_bot_deadline_secs")]
    pub bot_deadline_secs: u64,
    #[serde(default = "default_bot_pause_poll_ms")]
    pub bot_pause_poll_ms: u64,
    #[serde(default = "default_bot_gas_limit")]
    pub bot_gas_limit: u64,
    /// Route V2 exact-input swaps through the `...SupportingFeeOnTransferTokens` entry points.
    #[serde(default = "default_false")]
    pub bot_fee_on_transfer: bool,
}

// Defaults
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_chain_id() -> u64 {
    constants::CHAIN_ETHEREUM
}
fn default_solana_rpc_url() -> String {
    DEFAULT_SOLANA_RPC.to_string()
}
fn default_account_start() -> u32 {
    0
}
fn default_account_count() -> u32 {
    1
}
fn default_rpc_batch_size() -> usize {
    100
}
fn default_multicall_address() -> Address {
    MULTICALL3
}
fn default_log_capacity() -> usize {
    200
}
fn default_receipt_poll_ms() -> u64 {
    1_000
}
fn default_receipt_timeout_ms() -> u64 {
    120_000
}
fn default_native_gas_limit() -> u64 {
    NATIVE_TRANSFER_GAS
}
fn default_evm_airdrop_chunk_size() -> usize {
    200
}
fn default_solana_chunk_size() -> usize {
    SOLANA_MAX_TRANSFERS_PER_TX
}
fn default_bot_router_kind() -> String {
    "v2".to_string()
}
fn default_bot_base_token() -> String {
    "WETH".to_string()
}
fn default_bot_v3_fee() -> u32 {
    2_500
}
fn default_bot_buy_mode() -> String {
    "spend".to_string()
}
fn default_bot_amount_min() -> String {
    "0.001".to_string()
}
fn default_bot_amount_max() -> String {
    "0.01".to_string()
}
fn default_bot_reserve() -> String {
    "0.003".to_string()
}
fn default_bot_sell_pct_min() -> u8 {
    50
}
fn default_bot_sell_pct_max() -> u8 {
    90
}
fn default_bot_interval_min_secs() -> u64 {
    5
}
fn default_bot_interval_max_secs() -> u64 {
    15
}
fn default_slippage_bps() -> u64 {
    200
}
fn default_bot_deadline_secs() -> u64 {
    1_200
}
fn default_bot_pause_poll_ms() -> u64 {
    2_000
}
fn default_bot_gas_limit() -> u64 {
    300_000
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.rpc_batch_size == 0 {
            return Err(AppError::Config("rpc_batch_size must be at least 1".into()));
        }
        if self.solana_chunk_size == 0 || self.solana_chunk_size > SOLANA_MAX_TRANSFERS_PER_TX {
            return Err(AppError::Config(format!(
                "solana_chunk_size must be within 1..={SOLANA_MAX_TRANSFERS_PER_TX}"
            )));
        }
        if self.evm_airdrop_chunk_size == 0 {
            return Err(AppError::Config(
                "evm_airdrop_chunk_size must be at least 1".into(),
            ));
        }
        if self.bot_interval_min_secs > self.bot_interval_max_secs {
            return Err(AppError::Config(format!(
                "bot interval range is inverted: {} > {}",
                self.bot_interval_min_secs, self.bot_interval_max_secs
            )));
        }
        if self.bot_sell_pct_min == 0
            || self.bot_sell_pct_min > self.bot_sell_pct_max
            || self.bot_sell_pct_max > 100
        {
            return Err(AppError::Config(format!(
                "bot sell percentage range {}..={} must satisfy 1 <= min <= max <= 100",
                self.bot_sell_pct_min, self.bot_sell_pct_max
            )));
        }
        if self.bot_slippage_bps >= constants::BPS_DENOMINATOR {
            return Err(AppError::Config(format!(
                "bot_slippage_bps {} must be below {}",
                self.bot_slippage_bps,
                constants::BPS_DENOMINATOR
            )));
        }
        self.router_kind()?;
        Ok(())
    }

    /// Helper to get RPC URL for a specific chain
    pub fn get_http_provider(&self, chain_id: u64) -> Result<String, AppError> {
        if let Some(urls) = &self.http_providers
            && let Some(url) = urls.get(&chain_id.to_string())
        {
            return Ok(url.clone());
        }

        // Fallback to env var convention: http_provider_1, http_provider_56, then generic http_provider
        let candidates = [
            format!("http_provider_{}", chain_id),
            "http_provider".to_string(),
        ];
        for key in candidates {
            if let Ok(v) = std::env::var(&key) {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Ok(trimmed.to_string());
                }
            }
        }

        Err(AppError::Config(format!(
            "No RPC URL found for chain {}",
            chain_id
        )))
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms.max(1))
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms.max(self.receipt_poll_ms).max(1))
    }

    pub fn router_kind(&self) -> Result<RouterKind, AppError> {
        self.bot_router_kind.parse().map_err(AppError::Config)
    }

    pub fn bot_router(&self, chain_id: u64) -> Result<Address, AppError> {
        let kind = self.router_kind()?;
        self.bot_router_address
            .or_else(|| constants::default_router(kind, chain_id))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "No {kind:?} router configured for chain {chain_id} (set bot_router_address)"
                ))
            })
    }

    pub fn bot_quoter(&self, chain_id: u64) -> Option<Address> {
        self.bot_quoter_address
            .or_else(|| constants::default_v3_quoter(chain_id))
    }

    pub fn disperse_for_chain(&self, chain_id: u64) -> Option<Address> {
        self.disperse_address
            .or_else(|| constants::default_disperse_address(chain_id))
    }

    pub fn multicall(&self) -> Option<Address> {
        self.multicall_enabled.then_some(self.multicall_address)
    }
}
