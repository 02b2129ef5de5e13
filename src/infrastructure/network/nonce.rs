// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use dashmap::DashMap;
use std::sync::Arc;

/// Hands out nonces per sender. Lagging RPC nodes can report a stale pending count right
/// after a send, so the next nonce is never lower than the last one handed out plus one.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    last_used: Arc<DashMap<Address, u64>>,
}

impl NonceManager {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            last_used: Arc::new(DashMap::new()),
        }
    }

    pub async fn next_nonce(&self, address: Address) -> Result<u64, AppError> {
        let pending = self
            .provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| AppError::Network(format!("Failed to fetch nonce: {}", e)))?;

        let last = self.last_used.get(&address).map(|v| *v);
        let next = resolve_next(pending, last);
        self.last_used.insert(address, next);
        Ok(next)
    }

    /// Forgets `nonce` after a rejected submission so the next call resyncs from the node.
    pub fn release(&self, address: Address, nonce: u64) {
        self.last_used.remove_if(&address, |_, last| *last == nonce);
        tracing::debug!(target: "nonce", address = %address, nonce, "Nonce released");
    }
}

fn resolve_next(pending: u64, last_used: Option<u64>) -> u64 {
    match last_used {
        Some(last) => pending.max(last.saturating_add(1)),
        None => pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::provider::ConnectionFactory;

    #[test]
    fn stale_pending_count_does_not_reuse_nonce() {
        assert_eq!(resolve_next(5, None), 5);
        assert_eq!(resolve_next(5, Some(5)), 6);
        assert_eq!(resolve_next(9, Some(5)), 9);
    }

    #[test]
    fn release_only_drops_matching_nonce() {
        let provider = ConnectionFactory::http("http://127.0.0.1:9").unwrap();
        let manager = NonceManager::new(provider);
        let addr = Address::repeat_byte(0x42);
        manager.last_used.insert(addr, 7);

        manager.release(addr, 6);
        assert_eq!(manager.last_used.get(&addr).map(|v| *v), Some(7));

        manager.release(addr, 7);
        assert!(manager.last_used.get(&addr).is_none());
    }
}
