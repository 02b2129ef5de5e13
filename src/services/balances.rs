// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use crate::domain::types::{AssetSelector, BalanceRecord, ChainAddress};
use crate::network::client::ChainClient;
use alloy::primitives::U256;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Fetches balances for many addresses at once through one chain client. Every call goes to
/// the network; nothing is cached.
#[derive(Clone)]
pub struct BalanceAggregator {
    client: Arc<dyn ChainClient>,
}

impl BalanceAggregator {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// One record per distinct input address, in first-seen order. Per-address failures become
    /// failed records; an invalid token fails the whole fetch before any balance call.
    pub async fn fetch_balances(
        &self,
        addresses: &[ChainAddress],
        asset: &AssetSelector,
    ) -> Result<Vec<BalanceRecord>, AppError> {
        let family = self.client.family();
        if let AssetSelector::Token { contract, .. } = asset {
            if contract.family() != family {
                return Err(AppError::InvalidAsset(format!(
                    "token {contract} is not a {family} contract"
                )));
            }
            self.client.ensure_token(contract).await?;
        }

        let mut seen = HashSet::with_capacity(addresses.len());
        let unique: Vec<ChainAddress> = addresses
            .iter()
            .filter(|a| seen.insert(**a))
            .copied()
            .collect();
        let queryable: Vec<ChainAddress> = unique
            .iter()
            .filter(|a| a.family() == family)
            .copied()
            .collect();

        let fetched = match asset {
            AssetSelector::Native => self.client.native_balances(&queryable).await,
            AssetSelector::Token { contract, .. } => {
                self.client.token_balances(contract, &queryable).await
            }
        };
        let mut by_address: HashMap<ChainAddress, Result<U256, AppError>> =
            queryable.into_iter().zip(fetched).collect();

        let records: Vec<BalanceRecord> = unique
            .into_iter()
            .map(|address| {
                if address.family() != family {
                    return BalanceRecord::failed(
                        address,
                        asset.clone(),
                        format!("{address} is not a {family} address"),
                    );
                }
                match by_address.remove(&address) {
                    Some(Ok(raw)) => BalanceRecord::ok(address, asset.clone(), raw),
                    Some(Err(e)) => BalanceRecord::failed(address, asset.clone(), e.to_string()),
                    None => BalanceRecord::failed(address, asset.clone(), "no result returned"),
                }
            })
            .collect();

        let failed = records.iter().filter(|r| !r.is_ok()).count();
        if failed > 0 {
            tracing::warn!(
                target: "balances",
                family = %family,
                asset = %asset,
                total = records.len(),
                failed,
                "Balance fetch finished with failures"
            );
        } else {
            tracing::debug!(
                target: "balances",
                family = %family,
                asset = %asset,
                total = records.len(),
                "Balance fetch finished"
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::DerivedAccount;
    use crate::domain::types::{ChainFamily, PreparedRequest, SolanaPubkey, TxId};
    use crate::network::client::SubmitOptions;
    use alloy::primitives::Address;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedClient {
        calls: Mutex<Vec<usize>>,
        bad_token: bool,
    }

    #[async_trait]
    impl ChainClient for ScriptedClient {
        fn family(&self) -> ChainFamily {
            ChainFamily::Evm
        }

        async fn native_balances(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>> {
            self.calls.lock().unwrap().push(owners.len());
            owners
                .iter()
                .map(|o| {
                    let byte = o.as_evm().unwrap().0[19];
                    if byte == 0xee {
                        Err(AppError::Network("timeout".into()))
                    } else {
                        Ok(U256::from(byte))
                    }
                })
                .collect()
        }

        async fn ensure_token(&self, token: &ChainAddress) -> Result<(), AppError> {
            if self.bad_token {
                return Err(AppError::InvalidAsset(format!("{token} has no code")));
            }
            Ok(())
        }

        async fn token_balances(
            &self,
            _token: &ChainAddress,
            owners: &[ChainAddress],
        ) -> Vec<Result<U256, AppError>> {
            self.calls.lock().unwrap().push(owners.len());
            owners.iter().map(|_| Ok(U256::from(1u64))).collect()
        }

        async fn gas_price(&self) -> Result<U256, AppError> {
            Ok(U256::from(1u64))
        }

        async fn submit(
            &self,
            _account: &DerivedAccount,
            _request: &PreparedRequest,
            _options: SubmitOptions,
        ) -> Result<TxId, AppError> {
            Err(AppError::Unsupported("read-only".into()))
        }

        async fn wait_for_receipt(&self, _tx: &TxId) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn evm(byte: u8) -> ChainAddress {
        ChainAddress::Evm(Address::repeat_byte(byte))
    }

    #[tokio::test]
    async fn keys_match_input_set_under_partial_failure() {
        let client = Arc::new(ScriptedClient::default());
        let aggregator = BalanceAggregator::new(client.clone());
        let input = vec![
            evm(1),
            evm(0xee),
            evm(1),
            ChainAddress::Solana(SolanaPubkey([3u8; 32])),
            evm(2),
        ];
        let records = aggregator
            .fetch_balances(&input, &AssetSelector::Native)
            .await
            .unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].raw, U256::from(1u64));
        assert!(!records[1].is_ok());
        assert_eq!(records[1].raw, U256::ZERO);
        assert!(records[2].error.as_deref().unwrap().contains("not a evm address"));
        assert_eq!(records[3].raw, U256::from(2u64));
        // one coalesced request for the three distinct EVM owners
        assert_eq!(*client.calls.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn invalid_token_fails_before_balance_calls() {
        let client = Arc::new(ScriptedClient {
            bad_token: true,
            ..Default::default()
        });
        let aggregator = BalanceAggregator::new(client.clone());
        let asset = AssetSelector::Token {
            contract: evm(9),
            decimals: 18,
        };
        let err = aggregator
            .fetch_balances(&[evm(1), evm(2)], &asset)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAsset(_)));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_of_other_family_is_invalid() {
        let aggregator = BalanceAggregator::new(Arc::new(ScriptedClient::default()));
        let asset = AssetSelector::Token {
            contract: ChainAddress::Solana(SolanaPubkey([1u8; 32])),
            decimals: 6,
        };
        let err = aggregator.fetch_balances(&[evm(1)], &asset).await.unwrap_err();
        assert_eq!(err.kind().as_str(), "InvalidAssetError");
    }
}
