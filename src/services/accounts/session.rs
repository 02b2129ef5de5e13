// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::account::DerivedAccount;
use crate::domain::error::AppError;
use crate::domain::types::{ChainAddress, ChainFamily};
use crate::services::accounts::derivation::{SeedMaterial, derive_range};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns the seed material and the accounts derived from it for the lifetime of one operator
/// session. Nothing here is ever written to disk.
pub struct WalletSession {
    material: Option<SeedMaterial>,
    accounts: BTreeMap<u32, Arc<DerivedAccount>>,
    next_index: u32,
}

impl WalletSession {
    /// Opens a session. Single-key material yields its one account immediately; a mnemonic
    /// starts empty with the next index at `start`.
    pub fn open(material: SeedMaterial, start: u32) -> Result<Self, AppError> {
        let mut session = Self {
            material: None,
            accounts: BTreeMap::new(),
            next_index: start,
        };
        if !material.is_mnemonic() {
            session.next_index = 0;
            let derived = derive_range(&material, 0, 1)?;
            session.insert(derived);
        }
        session.material = Some(material);
        Ok(session)
    }

    /// Derives the next `count` indices after the highest one ever derived. Removed indices
    /// are never handed out again.
    pub fn add_accounts(&mut self, count: u32) -> Result<Vec<Arc<DerivedAccount>>, AppError> {
        let material = self
            .material
            .as_ref()
            .ok_or_else(|| AppError::Derivation("session was torn down".into()))?;
        if count == 0 {
            return Ok(Vec::new());
        }
        if !material.is_mnemonic() {
            return Err(AppError::Unsupported(
                "a single private key cannot derive more accounts".into(),
            ));
        }

        let derived = derive_range(material, self.next_index, count)?;
        let added = self.insert(derived);
        tracing::info!(
            target: "session",
            added = added.len(),
            next_index = self.next_index,
            "Derived accounts"
        );
        Ok(added)
    }

    fn insert(&mut self, derived: Vec<DerivedAccount>) -> Vec<Arc<DerivedAccount>> {
        let mut added = Vec::with_capacity(derived.len());
        for account in derived {
            let account = Arc::new(account);
            self.next_index = self.next_index.max(account.index.saturating_add(1));
            self.accounts.insert(account.index, account.clone());
            added.push(account);
        }
        added
    }

    /// Drops the account at `index` from the visible set. Other indices are unaffected.
    pub fn remove(&mut self, index: u32) -> Option<Arc<DerivedAccount>> {
        self.accounts.remove(&index)
    }

    /// Accounts in ascending index order.
    pub fn accounts(&self) -> Vec<Arc<DerivedAccount>> {
        self.accounts.values().cloned().collect()
    }

    pub fn account(&self, index: u32) -> Option<Arc<DerivedAccount>> {
        self.accounts.get(&index).cloned()
    }

    /// Accounts that can sign for `family`, in index order.
    pub fn accounts_for(&self, family: ChainFamily) -> Vec<Arc<DerivedAccount>> {
        self.accounts
            .values()
            .filter(|a| a.supports(family))
            .cloned()
            .collect()
    }

    pub fn addresses(&self, family: ChainFamily) -> Vec<ChainAddress> {
        self.accounts
            .values()
            .filter_map(|a| a.address(family))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.material.is_some()
    }

    /// Wipes the seed material and releases this session's handles to the signers.
    pub fn teardown(&mut self) {
        if self.material.take().is_some() {
            tracing::info!(target: "session", "Session torn down");
        }
        self.accounts.clear();
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
