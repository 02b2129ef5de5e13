// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

#![allow(dead_code)]

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use fleetops::data::token_manager::TokenMetadata;
use fleetops::domain::account::DerivedAccount;
use fleetops::domain::error::AppError;
use fleetops::domain::types::{ChainAddress, ChainFamily, PreparedRequest, TxId};
use fleetops::network::client::{ChainClient, SubmitOptions};
use fleetops::services::trading::{BuySizing, SellSizing, TradeFill, TradeVenue};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub fn evm_account(index: u32) -> Arc<DerivedAccount> {
    let mut key = [0u8; 32];
    key[31] = (index + 1) as u8;
    key[0] = 0x11;
    let signer = PrivateKeySigner::from_slice(&key).expect("valid key");
    Arc::new(DerivedAccount::new(index, Some(signer), None))
}

pub fn evm_recipient(n: u8) -> String {
    Address::repeat_byte(n).to_string()
}

/// In-memory EVM chain: balances per address, every submission recorded in order.
#[derive(Default)]
pub struct MockChain {
    pub balances: Mutex<HashMap<ChainAddress, U256>>,
    pub failing_owners: Mutex<HashSet<ChainAddress>>,
    pub submitted: Mutex<Vec<PreparedRequest>>,
    pub submit_options: Mutex<Vec<SubmitOptions>>,
    pub gas_price: U256,
    /// Fires the token once this many submissions went through.
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub balance_calls: Mutex<usize>,
}

impl MockChain {
    pub fn with_gas_price(gas_price: u64) -> Self {
        Self {
            gas_price: U256::from(gas_price),
            ..Self::default()
        }
    }

    pub fn set_balance(&self, owner: ChainAddress, amount: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert(owner, U256::from(amount));
    }

    pub fn submissions(&self) -> Vec<PreparedRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_options(&self) -> Vec<SubmitOptions> {
        self.submit_options.lock().unwrap().clone()
    }

    fn lookup(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>> {
        *self.balance_calls.lock().unwrap() += 1;
        let balances = self.balances.lock().unwrap();
        let failing = self.failing_owners.lock().unwrap();
        owners
            .iter()
            .map(|owner| {
                if failing.contains(owner) {
                    Err(AppError::Network(format!("lookup for {owner} timed out")))
                } else {
                    Ok(balances.get(owner).copied().unwrap_or_default())
                }
            })
            .collect()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn native_balances(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>> {
        self.lookup(owners)
    }

    async fn ensure_token(&self, _token: &ChainAddress) -> Result<(), AppError> {
        Ok(())
    }

    async fn token_balances(
        &self,
        _token: &ChainAddress,
        owners: &[ChainAddress],
    ) -> Vec<Result<U256, AppError>> {
        self.lookup(owners)
    }

    async fn gas_price(&self) -> Result<U256, AppError> {
        Ok(self.gas_price)
    }

    async fn submit(
        &self,
        _account: &DerivedAccount,
        request: &PreparedRequest,
        options: SubmitOptions,
    ) -> Result<TxId, AppError> {
        self.submit_options.lock().unwrap().push(options);
        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(request.clone());
            submitted.len()
        };
        if let Some((after, token)) = &self.cancel_after
            && count == *after
        {
            token.cancel();
        }
        Ok(TxId(format!("0x{count:064x}")))
    }

    async fn wait_for_receipt(&self, _tx: &TxId) -> Result<(), AppError> {
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Venue double: fills every leg instantly and records which account traded when.
pub struct MockVenue {
    pub metadata: Result<TokenMetadata, String>,
    pub buys: Mutex<Vec<(u32, tokio::time::Instant)>>,
    pub sells: Mutex<Vec<(u32, SellSizing)>>,
    /// Buys from these account indices fail.
    pub failing_buyers: HashSet<u32>,
    /// Sells from these account indices fail.
    pub failing_sellers: HashSet<u32>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self {
            metadata: Ok(TokenMetadata {
                address: Address::repeat_byte(0xAA),
                symbol: "TKN".into(),
                decimals: 18,
            }),
            buys: Mutex::new(Vec::new()),
            sells: Mutex::new(Vec::new()),
            failing_buyers: HashSet::new(),
            failing_sellers: HashSet::new(),
        }
    }

    pub fn buys(&self) -> Vec<(u32, tokio::time::Instant)> {
        self.buys.lock().unwrap().clone()
    }

    pub fn sells(&self) -> Vec<(u32, SellSizing)> {
        self.sells.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeVenue for MockVenue {
    async fn resolve_metadata(&self) -> Result<TokenMetadata, AppError> {
        self.metadata.clone().map_err(AppError::AssetMetadata)
    }

    async fn buy(&self, account: &DerivedAccount, sizing: BuySizing) -> Result<TradeFill, AppError> {
        self.buys
            .lock()
            .unwrap()
            .push((account.index, tokio::time::Instant::now()));
        if self.failing_buyers.contains(&account.index) {
            return Err(AppError::InsufficientFunds {
                required: "1".into(),
                available: "0".into(),
            });
        }
        let amount = match sizing {
            BuySizing::Spend { amount, .. } => amount,
            BuySizing::ExactOutput(amount) | BuySizing::SpendAllMinusReserve(amount) => amount,
        };
        Ok(TradeFill {
            tx: TxId(format!("buy-{}", account.index)),
            amount,
        })
    }

    async fn sell(&self, account: &DerivedAccount, sizing: SellSizing) -> Result<TradeFill, AppError> {
        self.sells.lock().unwrap().push((account.index, sizing));
        if self.failing_sellers.contains(&account.index) {
            return Err(AppError::validation("balance", "target token balance is 0"));
        }
        let amount = match sizing {
            SellSizing::Percent(percent) => U256::from(percent),
            SellSizing::Amount(amount) => amount,
            SellSizing::All => U256::from(1_000u64),
        };
        Ok(TradeFill {
            tx: TxId(format!("sell-{}", account.index)),
            amount,
        })
    }

    fn base_symbol(&self) -> &str {
        "WETH"
    }

    fn base_decimals(&self) -> u8 {
        18
    }
}
