// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use alloy::rpc::client::{ClientBuilder, RpcClient};
use std::time::Duration;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let (_, provider) = Self::http_with_client(rpc_url)?;
        Ok(provider)
    }

    /// Provider plus the raw RPC client it wraps, for JSON-RPC batch requests.
    pub fn http_with_client(rpc_url: &str) -> Result<(RpcClient, HttpProvider), AppError> {
        let url = parse_url(rpc_url)?;
        let client = ClientBuilder::default().http(url);
        let provider = RootProvider::new(client.clone());
        Ok((client, provider))
    }

    /// Plain HTTP client for JSON-RPC endpoints without an alloy transport (Solana).
    pub fn json_rpc(rpc_url: &str, timeout: Duration) -> Result<(reqwest::Client, Url), AppError> {
        let url = parse_url(rpc_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("HTTP client build failed: {e}")))?;
        Ok((client, url))
    }
}

fn parse_url(rpc_url: &str) -> Result<Url, AppError> {
    Url::parse(rpc_url.trim()).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))
}
