// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::account::DerivedAccount;
use crate::domain::constants::{
    SOLANA_LAMPORTS_PER_SIGNATURE, SOLANA_MAX_TRANSFERS_PER_TX, SPL_TOKEN_2022_PROGRAM,
    SPL_TOKEN_PROGRAM,
};
use crate::domain::error::AppError;
use crate::domain::types::{
    AssetSelector, ChainAddress, ChainFamily, PreparedRequest, SolanaPubkey, TxId,
};
use crate::network::client::{ChainClient, SubmitOptions};
use crate::network::provider::ConnectionFactory;
use crate::network::solana_tx::{SystemTransfer, sdk_keypair, transfer_transaction};
use alloy::primitives::U256;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone)]
pub struct SolanaClientSettings {
    pub timeout: Duration,
    pub batch_size: usize,
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
}

impl Default for SolanaClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            batch_size: 100,
            receipt_poll: Duration::from_millis(1_000),
            receipt_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[serde(default)]
    id: Option<u64>,
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    owner: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct TokenAccountEntry {
    account: TokenAccountData,
}

#[derive(Debug, Deserialize)]
struct TokenAccountData {
    data: Value,
}

/// Solana client. Balance reads go out as JSON-RPC batch arrays; blockhash, broadcast and
/// signature status go through the SDK client.
#[derive(Clone)]
pub struct SolanaClient {
    http: reqwest::Client,
    url: Url,
    sdk: Arc<SolanaRpcClient>,
    settings: SolanaClientSettings,
}

impl SolanaClient {
    pub fn connect(rpc_url: &str, settings: SolanaClientSettings) -> Result<Self, AppError> {
        let (http, url) = ConnectionFactory::json_rpc(rpc_url, settings.timeout)?;
        let sdk = SolanaRpcClient::new_with_timeout_and_commitment(
            url.to_string(),
            settings.timeout,
            CommitmentConfig::confirmed(),
        );
        Ok(Self {
            http,
            url,
            sdk: Arc::new(sdk),
            settings,
        })
    }

    async fn rpc_call<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<R, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("{method} request failed: {e}")))?;
        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("{method} response unreadable: {e}")))?;
        unwrap_response(method, body)
    }

    /// One JSON-RPC batch array per `batch_size` params; results keep the order of `params`.
    async fn rpc_batch<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> Vec<Result<R, AppError>> {
        let mut results = Vec::with_capacity(params.len());
        for chunk in params.chunks(self.settings.batch_size.max(1)) {
            let requests = chunk
                .iter()
                .enumerate()
                .map(|(id, p)| JsonRpcRequest {
                    jsonrpc: "2.0",
                    id: id as u64,
                    method,
                    params: p,
                })
                .collect::<Vec<_>>();

            let sent = self.http.post(self.url.clone()).json(&requests).send().await;
            let responses: Result<Vec<JsonRpcResponse<R>>, AppError> = match sent {
                Ok(resp) => resp
                    .json()
                    .await
                    .map_err(|e| AppError::Network(format!("{method} batch unreadable: {e}"))),
                Err(e) => Err(AppError::Network(format!("{method} batch failed: {e}"))),
            };

            match responses {
                Ok(responses) => results.extend(scatter_by_id(method, chunk.len(), responses)),
                Err(e) => {
                    let reason = e.to_string();
                    results.extend(chunk.iter().map(|_| Err(AppError::Network(reason.clone()))));
                }
            }
        }
        results
    }

    async fn send_transfers(
        &self,
        account: &DerivedAccount,
        transfers: &[SystemTransfer],
    ) -> Result<TxId, AppError> {
        let keypair = account.solana_keypair().ok_or_else(|| {
            AppError::validation(
                "source",
                format!("account #{} has no Solana key", account.index),
            )
        })?;
        if transfers.len() > SOLANA_MAX_TRANSFERS_PER_TX {
            return Err(AppError::validation(
                "recipients",
                format!(
                    "{} transfers exceed the {} per transaction limit",
                    transfers.len(),
                    SOLANA_MAX_TRANSFERS_PER_TX
                ),
            ));
        }

        let payer = sdk_keypair(keypair)?;
        let blockhash = self
            .sdk
            .get_latest_blockhash()
            .await
            .map_err(|e| map_client_error(e, None))?;
        let tx = transfer_transaction(&payer, transfers, blockhash)?;
        let signature = tx.signatures.first().map(ToString::to_string);
        let returned = self
            .sdk
            .send_transaction(&tx)
            .await
            .map_err(|e| map_client_error(e, signature.as_deref()))?;

        tracing::debug!(
            target: "solana",
            from = %keypair.pubkey(),
            transfers = transfers.len(),
            signature = %returned,
            "Transaction broadcast"
        );
        Ok(TxId(returned.to_string()))
    }
}

impl SolanaClient {
    async fn mint_info(&self, mint: SolanaPubkey) -> Result<AccountInfo, AppError> {
        let info: WithContext<Option<AccountInfo>> = self
            .rpc_call(
                "getAccountInfo",
                json!([mint.to_string(), { "encoding": "jsonParsed" }]),
            )
            .await?;
        match info.value {
            Some(info) if is_mint_account(&info) => Ok(info),
            Some(info) => Err(AppError::InvalidAsset(format!(
                "{mint} is owned by {} and is not a token mint",
                info.owner
            ))),
            None => Err(AppError::InvalidAsset(format!("{mint} does not exist"))),
        }
    }

    /// Decimals recorded in the mint account.
    pub async fn mint_decimals(&self, mint: SolanaPubkey) -> Result<u8, AppError> {
        let info = self.mint_info(mint).await?;
        mint_decimals_of(&info)
            .ok_or_else(|| AppError::AssetMetadata(format!("mint {mint} reports no decimals")))
    }
}

fn mint_decimals_of(info: &AccountInfo) -> Option<u8> {
    info.data
        .pointer("/parsed/info/decimals")
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok())
}

fn unwrap_response<R>(method: &str, body: JsonRpcResponse<R>) -> Result<R, AppError> {
    if let Some(err) = body.error {
        return Err(AppError::Network(format!(
            "{method} rpc error {}: {}",
            err.code, err.message
        )));
    }
    body.result
        .ok_or_else(|| AppError::Network(format!("{method} returned no result")))
}

fn scatter_by_id<R>(
    method: &str,
    expected: usize,
    responses: Vec<JsonRpcResponse<R>>,
) -> Vec<Result<R, AppError>> {
    let mut by_id: HashMap<u64, JsonRpcResponse<R>> = HashMap::with_capacity(responses.len());
    for (pos, response) in responses.into_iter().enumerate() {
        by_id.insert(response.id.unwrap_or(pos as u64), response);
    }
    (0..expected as u64)
        .map(|id| match by_id.remove(&id) {
            Some(response) => unwrap_response(method, response),
            None => Err(AppError::Network(format!("{method} batch dropped request {id}"))),
        })
        .collect()
}

/// Node rejections of a signed transaction carry its signature; transport failures do not.
fn map_client_error(err: ClientError, signature: Option<&str>) -> AppError {
    let reason = err.to_string();
    match (err.kind(), signature) {
        (ClientErrorKind::RpcError(_) | ClientErrorKind::TransactionError(_), Some(hash)) => {
            AppError::Transaction {
                hash: hash.to_string(),
                reason,
            }
        }
        _ => AppError::Network(reason),
    }
}

fn expect_solana(address: &ChainAddress) -> Result<SolanaPubkey, AppError> {
    address
        .as_solana()
        .ok_or_else(|| AppError::InvalidAddress(address.to_string()))
}

fn lamports(amount: U256) -> Result<u64, AppError> {
    u64::try_from(amount)
        .map_err(|_| AppError::validation("amount", format!("{amount} lamports overflows u64")))
}

/// Sums `tokenAmount.amount` across the jsonParsed token accounts of one owner.
fn sum_token_accounts(entries: &[TokenAccountEntry]) -> Result<U256, AppError> {
    entries.iter().try_fold(U256::ZERO, |acc, entry| {
        let raw = entry
            .account
            .data
            .pointer("/parsed/info/tokenAmount/amount")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Network("token account without parsed amount".into()))?;
        let amount = U256::from_str_radix(raw, 10)
            .map_err(|e| AppError::Network(format!("token amount '{raw}' unreadable: {e}")))?;
        Ok(acc.saturating_add(amount))
    })
}

fn is_mint_account(info: &AccountInfo) -> bool {
    let owned_by_token_program =
        info.owner == SPL_TOKEN_PROGRAM || info.owner == SPL_TOKEN_2022_PROGRAM;
    // Accounts fetched without jsonParsed carry no type; the owner check alone decides then.
    let kind = info.data.pointer("/parsed/type").and_then(Value::as_str);
    owned_by_token_program && kind.is_none_or(|k| k == "mint")
}

#[async_trait]
impl ChainClient for SolanaClient {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    async fn native_balances(&self, owners: &[ChainAddress]) -> Vec<Result<U256, AppError>> {
        let mut params = Vec::new();
        let mut slots = Vec::with_capacity(owners.len());
        for owner in owners {
            match expect_solana(owner) {
                Ok(key) => {
                    slots.push(Ok(params.len()));
                    params.push(json!([key.to_string(), { "commitment": "confirmed" }]));
                }
                Err(e) => slots.push(Err(e)),
            }
        }
        let mut fetched = self
            .rpc_batch::<WithContext<u64>>("getBalance", params)
            .await
            .into_iter()
            .map(|r| r.map(|v| U256::from(v.value)))
            .map(Some)
            .collect::<Vec<_>>();

        slots
            .into_iter()
            .map(|slot| {
                let idx = slot?;
                fetched[idx]
                    .take()
                    .unwrap_or_else(|| Err(AppError::Network("no result returned".into())))
            })
            .collect()
    }

    async fn ensure_token(&self, token: &ChainAddress) -> Result<(), AppError> {
        let mint = token
            .as_solana()
            .ok_or_else(|| AppError::InvalidAsset(format!("{token} is not a Solana mint")))?;
        self.mint_info(mint).await.map(|_| ())
    }

    async fn token_balances(
        &self,
        token: &ChainAddress,
        owners: &[ChainAddress],
    ) -> Vec<Result<U256, AppError>> {
        let Some(mint) = token.as_solana() else {
            return owners
                .iter()
                .map(|_| Err(AppError::InvalidAsset(format!("{token} is not a Solana mint"))))
                .collect();
        };

        let mut params = Vec::new();
        let mut slots = Vec::with_capacity(owners.len());
        for owner in owners {
            match expect_solana(owner) {
                Ok(key) => {
                    slots.push(Ok(params.len()));
                    params.push(json!([
                        key.to_string(),
                        { "mint": mint.to_string() },
                        { "encoding": "jsonParsed", "commitment": "confirmed" }
                    ]));
                }
                Err(e) => slots.push(Err(e)),
            }
        }
        let mut fetched = self
            .rpc_batch::<WithContext<Vec<TokenAccountEntry>>>("getTokenAccountsByOwner", params)
            .await
            .into_iter()
            .map(|r| r.and_then(|v| sum_token_accounts(&v.value)))
            .map(Some)
            .collect::<Vec<_>>();

        slots
            .into_iter()
            .map(|slot| {
                let idx = slot?;
                fetched[idx]
                    .take()
                    .unwrap_or_else(|| Err(AppError::Network("no result returned".into())))
            })
            .collect()
    }

    async fn gas_price(&self) -> Result<U256, AppError> {
        Ok(U256::from(SOLANA_LAMPORTS_PER_SIGNATURE))
    }

    async fn submit(
        &self,
        account: &DerivedAccount,
        request: &PreparedRequest,
        _options: SubmitOptions,
    ) -> Result<TxId, AppError> {
        match request {
            PreparedRequest::NativeTransfer { to, amount } => {
                let transfer = SystemTransfer {
                    to: expect_solana(to)?,
                    lamports: lamports(*amount)?,
                };
                self.send_transfers(account, &[transfer]).await
            }
            PreparedRequest::Disperse {
                asset: AssetSelector::Native,
                recipients,
            } => {
                let transfers = recipients
                    .iter()
                    .map(|(to, amount)| {
                        Ok(SystemTransfer {
                            to: expect_solana(to)?,
                            lamports: lamports(*amount)?,
                        })
                    })
                    .collect::<Result<Vec<_>, AppError>>()?;
                self.send_transfers(account, &transfers).await
            }
            PreparedRequest::TokenTransfer { .. } | PreparedRequest::Disperse { .. } => Err(
                AppError::Unsupported("SPL token transfers are not supported".into()),
            ),
            PreparedRequest::ContractCall { .. } => Err(AppError::Unsupported(
                "program calls are not supported on Solana".into(),
            )),
        }
    }

    async fn wait_for_receipt(&self, tx: &TxId) -> Result<(), AppError> {
        let signature = Signature::from_str(&tx.0)
            .map_err(|e| AppError::validation("signature", format!("{tx}: {e}")))?;
        let started = Instant::now();
        loop {
            let statuses = self
                .sdk
                .get_signature_statuses_with_history(&[signature])
                .await
                .map_err(|e| map_client_error(e, None))?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(AppError::Transaction {
                        hash: tx.0.clone(),
                        reason: err.to_string(),
                    });
                }
                if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                    return Ok(());
                }
            }

            if started.elapsed() >= self.settings.receipt_timeout {
                return Err(AppError::Network(format!(
                    "signature {tx} not confirmed within {}ms",
                    self.settings.receipt_timeout.as_millis()
                )));
            }
            tokio::time::sleep(self.settings.receipt_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(id: u64, value: u64) -> JsonRpcResponse<u64> {
        JsonRpcResponse {
            id: Some(id),
            result: Some(value),
            error: None,
        }
    }

    #[test]
    fn batch_responses_are_matched_by_id() {
        let responses = vec![
            response(2, 30),
            JsonRpcResponse {
                id: Some(0),
                result: None,
                error: Some(JsonRpcError {
                    code: -32602,
                    message: "Invalid param".into(),
                }),
            },
        ];
        let results = scatter_by_id("getBalance", 3, responses);
        assert!(matches!(&results[0], Err(AppError::Network(m)) if m.contains("Invalid param")));
        assert!(matches!(&results[1], Err(AppError::Network(m)) if m.contains("dropped")));
        assert_eq!(results[2].as_ref().unwrap(), &30);
    }

    #[test]
    fn token_accounts_are_summed() {
        let entries: Vec<TokenAccountEntry> = serde_json::from_value(json!([
            { "account": { "data": { "parsed": { "info": { "tokenAmount": { "amount": "150" } } } } } },
            { "account": { "data": { "parsed": { "info": { "tokenAmount": { "amount": "50" } } } } } }
        ]))
        .unwrap();
        assert_eq!(sum_token_accounts(&entries).unwrap(), U256::from(200u64));
        assert_eq!(sum_token_accounts(&[]).unwrap(), U256::ZERO);
    }

    #[test]
    fn mint_detection_requires_token_program_owner() {
        let mint: AccountInfo = serde_json::from_value(json!({
            "owner": SPL_TOKEN_PROGRAM,
            "data": { "parsed": { "type": "mint" } }
        }))
        .unwrap();
        let holder: AccountInfo = serde_json::from_value(json!({
            "owner": SPL_TOKEN_PROGRAM,
            "data": { "parsed": { "type": "account" } }
        }))
        .unwrap();
        let wallet: AccountInfo =
            serde_json::from_value(json!({ "owner": "11111111111111111111111111111111" }))
                .unwrap();
        assert!(is_mint_account(&mint));
        assert!(!is_mint_account(&holder));
        assert!(!is_mint_account(&wallet));
    }

    #[test]
    fn mint_decimals_come_from_parsed_info() {
        let mint: AccountInfo = serde_json::from_value(json!({
            "owner": SPL_TOKEN_PROGRAM,
            "data": { "parsed": { "type": "mint", "info": { "decimals": 6 } } }
        }))
        .unwrap();
        assert_eq!(mint_decimals_of(&mint), Some(6));
        let raw: AccountInfo =
            serde_json::from_value(json!({ "owner": SPL_TOKEN_PROGRAM })).unwrap();
        assert_eq!(mint_decimals_of(&raw), None);
    }

    #[test]
    fn rejected_transactions_keep_their_signature() {
        use solana_sdk::transaction::TransactionError;

        let rejected = ClientError::from(ClientErrorKind::TransactionError(
            TransactionError::AccountNotFound,
        ));
        assert!(matches!(
            map_client_error(rejected, Some("5sig")),
            AppError::Transaction { hash, .. } if hash == "5sig"
        ));

        let transport = ClientError::from(ClientErrorKind::Custom("connection refused".into()));
        assert!(matches!(
            map_client_error(transport, Some("5sig")),
            AppError::Network(m) if m.contains("connection refused")
        ));

        let unsigned = ClientError::from(ClientErrorKind::TransactionError(
            TransactionError::AccountNotFound,
        ));
        assert!(matches!(map_client_error(unsigned, None), AppError::Network(_)));
    }

    #[tokio::test]
    async fn malformed_signature_is_rejected_before_polling() {
        let client = SolanaClient::connect("http://127.0.0.1:9", SolanaClientSettings::default())
            .unwrap();
        let err = client
            .wait_for_receipt(&TxId("not-a-signature".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn lamports_must_fit_u64() {
        assert_eq!(lamports(U256::from(5u64)).unwrap(), 5);
        assert!(lamports(U256::from(u64::MAX) + U256::from(1u64)).is_err());
    }

    #[tokio::test]
    async fn spl_transfers_are_unsupported() {
        let client = SolanaClient::connect("http://127.0.0.1:9", SolanaClientSettings::default())
            .unwrap();
        let account = DerivedAccount::new(0, None, None);
        let request = PreparedRequest::TokenTransfer {
            token: ChainAddress::Solana(SolanaPubkey([1u8; 32])),
            to: ChainAddress::Solana(SolanaPubkey([2u8; 32])),
            amount: U256::from(1u64),
        };
        let err = client.submit(&account, &request, SubmitOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }
}
