// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::types::{ChainAddress, ChainFamily, SolanaPubkey};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use ed25519_dalek::SigningKey;
use std::fmt;
use zeroize::Zeroizing;

/// ed25519 keypair for the Solana family. The secret half is wiped when dropped.
pub struct SolanaKeypair {
    signing_key: SigningKey,
}

impl SolanaKeypair {
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn pubkey(&self) -> SolanaPubkey {
        SolanaPubkey(self.signing_key.verifying_key().to_bytes())
    }

    /// Secret and public halves in the 64-byte layout Solana keypair files use.
    pub(crate) fn keypair_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }
}

impl fmt::Debug for SolanaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaKeypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// One derivation index and the signing capability it yields per chain family.
///
/// Accounts opened from a raw private key carry a single family.
pub struct DerivedAccount {
    pub index: u32,
    evm: Option<PrivateKeySigner>,
    solana: Option<SolanaKeypair>,
}

impl DerivedAccount {
    pub fn new(index: u32, evm: Option<PrivateKeySigner>, solana: Option<SolanaKeypair>) -> Self {
        Self { index, evm, solana }
    }

    pub fn evm_address(&self) -> Option<Address> {
        self.evm.as_ref().map(|s| s.address())
    }

    pub fn solana_address(&self) -> Option<SolanaPubkey> {
        self.solana.as_ref().map(|k| k.pubkey())
    }

    pub fn address(&self, family: ChainFamily) -> Option<ChainAddress> {
        match family {
            ChainFamily::Evm => self.evm_address().map(ChainAddress::Evm),
            ChainFamily::Solana => self.solana_address().map(ChainAddress::Solana),
        }
    }

    pub fn supports(&self, family: ChainFamily) -> bool {
        match family {
            ChainFamily::Evm => self.evm.is_some(),
            ChainFamily::Solana => self.solana.is_some(),
        }
    }

    pub fn evm_signer(&self) -> Option<&PrivateKeySigner> {
        self.evm.as_ref()
    }

    pub fn solana_keypair(&self) -> Option<&SolanaKeypair> {
        self.solana.as_ref()
    }

    /// Label used in logs: the address for `family`, or the index when the family is absent.
    pub fn label(&self, family: ChainFamily) -> String {
        self.address(family)
            .map(|a| a.to_string())
            .unwrap_or_else(|| format!("account #{}", self.index))
    }
}

impl fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("index", &self.index)
            .field("evm", &self.evm_address())
            .field("solana", &self.solana_address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secret_bytes() {
        let secret = [7u8; 32];
        let account = DerivedAccount::new(0, None, Some(SolanaKeypair::from_secret(&secret)));
        let rendered = format!("{account:?}");
        assert!(rendered.contains("DerivedAccount"));
        assert!(!rendered.contains(&hex::encode(secret)));
        assert!(!rendered.contains("[7, 7"));
    }

    #[test]
    fn label_falls_back_to_index_for_missing_family() {
        let account = DerivedAccount::new(4, None, Some(SolanaKeypair::from_secret(&[1u8; 32])));
        assert_eq!(account.label(ChainFamily::Evm), "account #4");
        assert!(account.supports(ChainFamily::Solana));
        assert_eq!(
            account.label(ChainFamily::Solana),
            account.solana_address().unwrap().to_string()
        );
    }
}
