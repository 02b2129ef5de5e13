// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::parse_hex_bytes;
use crate::domain::account::{DerivedAccount, SolanaKeypair};
use crate::domain::constants::{SOLANA_COIN_TYPE, evm_derivation_path};
use crate::domain::error::AppError;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

/// Secret input for a wallet session. Every variant wipes its bytes on drop.
pub enum SeedMaterial {
    /// BIP-39 English phrase; derives both chain families.
    Mnemonic(Zeroizing<String>),
    /// Raw secp256k1 key; yields one EVM account.
    EvmKey(Zeroizing<[u8; 32]>),
    /// Raw ed25519 secret; yields one Solana account.
    SolanaSecret(Zeroizing<[u8; 32]>),
}

impl fmt::Debug for SeedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SeedMaterial::Mnemonic(_) => "Mnemonic",
            SeedMaterial::EvmKey(_) => "EvmKey",
            SeedMaterial::SolanaSecret(_) => "SolanaSecret",
        };
        write!(f, "SeedMaterial::{kind}(<redacted>)")
    }
}

impl SeedMaterial {
    /// Validates word count and checksum against the English word list.
    pub fn mnemonic(phrase: &str) -> Result<Self, AppError> {
        let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
        Mnemonic::parse_normalized(&normalized)
            .map_err(|e| AppError::Derivation(format!("invalid mnemonic: {e}")))?;
        Ok(SeedMaterial::Mnemonic(normalized))
    }

    pub fn evm_private_key(raw: &str) -> Result<Self, AppError> {
        let bytes = Zeroizing::new(
            parse_hex_bytes(raw.trim())
                .ok_or_else(|| AppError::Derivation("EVM private key is not hex".into()))?,
        );
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AppError::Derivation(format!(
                "EVM private key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let key = Zeroizing::new(key);
        PrivateKeySigner::from_slice(key.as_slice())
            .map_err(|e| AppError::Derivation(format!("invalid EVM private key: {e}")))?;
        Ok(SeedMaterial::EvmKey(key))
    }

    /// Accepts a base58 64-byte keypair, a base58 32-byte seed, or a JSON byte array of
    /// either length.
    pub fn solana_secret(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let bytes = if trimmed.starts_with('[') {
            Zeroizing::new(
                serde_json::from_str::<Vec<u8>>(trimmed)
                    .map_err(|e| AppError::Derivation(format!("invalid keypair JSON: {e}")))?,
            )
        } else {
            Zeroizing::new(
                bs58::decode(trimmed)
                    .into_vec()
                    .map_err(|_| AppError::Derivation("Solana secret is not base58".into()))?,
            )
        };

        let mut secret = Zeroizing::new([0u8; 32]);
        match bytes.len() {
            32 => secret.copy_from_slice(&bytes),
            64 => {
                secret.copy_from_slice(&bytes[..32]);
                let keypair = SolanaKeypair::from_secret(&secret);
                if keypair.pubkey().0[..] != bytes[32..] {
                    return Err(AppError::Derivation(
                        "keypair public half does not match its secret".into(),
                    ));
                }
            }
            other => {
                return Err(AppError::Derivation(format!(
                    "Solana secret must be 32 or 64 bytes, got {other}"
                )));
            }
        }
        Ok(SeedMaterial::SolanaSecret(secret))
    }

    /// Picks the variant from the shape of `raw`: several words, then hex, then Solana forms.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.split_whitespace().count() > 1 {
            return Self::mnemonic(trimmed);
        }
        let hex_body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_body.len() == 64 && hex_body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Self::evm_private_key(trimmed);
        }
        Self::solana_secret(trimmed)
    }

    pub fn is_mnemonic(&self) -> bool {
        matches!(self, SeedMaterial::Mnemonic(_))
    }
}

/// Derives the account at `index`. Both families are derived independently from the seed.
pub fn derive_account(seed: &SeedMaterial, index: u32) -> Result<DerivedAccount, AppError> {
    match seed {
        SeedMaterial::Mnemonic(phrase) => {
            let seed_bytes = mnemonic_seed(phrase)?;
            derive_from_phrase(phrase, &seed_bytes, index)
        }
        SeedMaterial::EvmKey(key) => {
            single_key_index(index)?;
            let signer = PrivateKeySigner::from_slice(key.as_slice())
                .map_err(|e| AppError::Derivation(format!("invalid EVM private key: {e}")))?;
            Ok(DerivedAccount::new(0, Some(signer), None))
        }
        SeedMaterial::SolanaSecret(secret) => {
            single_key_index(index)?;
            Ok(DerivedAccount::new(
                0,
                None,
                Some(SolanaKeypair::from_secret(secret)),
            ))
        }
    }
}

/// Derives `count` consecutive accounts starting at `start`, in index order.
pub fn derive_range(
    seed: &SeedMaterial,
    start: u32,
    count: u32,
) -> Result<Vec<DerivedAccount>, AppError> {
    let end = start
        .checked_add(count)
        .ok_or_else(|| AppError::Derivation("derivation index overflow".into()))?;
    if end > HARDENED {
        return Err(AppError::Derivation(format!(
            "index {} is outside the non-hardened range",
            end - 1
        )));
    }

    match seed {
        SeedMaterial::Mnemonic(phrase) => {
            let seed_bytes = mnemonic_seed(phrase)?;
            (start..end)
                .map(|index| derive_from_phrase(phrase, &seed_bytes, index))
                .collect()
        }
        _ => (start..end).map(|index| derive_account(seed, index)).collect(),
    }
}

fn single_key_index(index: u32) -> Result<(), AppError> {
    if index != 0 {
        return Err(AppError::Derivation(format!(
            "a single private key only has index 0, not {index}"
        )));
    }
    Ok(())
}

fn mnemonic_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>, AppError> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| AppError::Derivation(format!("invalid mnemonic: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

fn derive_from_phrase(
    phrase: &str,
    seed: &[u8; 64],
    index: u32,
) -> Result<DerivedAccount, AppError> {
    let evm = MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .derivation_path(evm_derivation_path(index))
        .map_err(|e| AppError::Derivation(format!("EVM path for index {index}: {e}")))?
        .build()
        .map_err(|e| AppError::Derivation(format!("EVM key for index {index}: {e}")))?;

    let secret = slip10_ed25519(seed, &[44, SOLANA_COIN_TYPE, index, 0])?;
    let solana = SolanaKeypair::from_secret(&secret);

    Ok(DerivedAccount::new(index, Some(evm), Some(solana)))
}

/// SLIP-10 ed25519 derivation. Every path element is hardened.
fn slip10_ed25519(seed: &[u8], path: &[u32]) -> Result<Zeroizing<[u8; 32]>, AppError> {
    let (mut key, mut chain_code) = hmac_split(ED25519_SEED_KEY, &[seed])?;
    for element in path {
        if *element >= HARDENED {
            return Err(AppError::Derivation(format!(
                "path element {element} already carries the hardened bit"
            )));
        }
        let hardened = (element | HARDENED).to_be_bytes();
        let (child_key, child_chain) =
            hmac_split(chain_code.as_slice(), &[&[0u8], key.as_slice(), &hardened])?;
        key = child_key;
        chain_code = child_chain;
    }
    Ok(key)
}

fn hmac_split(
    mac_key: &[u8],
    parts: &[&[u8]],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), AppError> {
    let mut mac = HmacSha512::new_from_slice(mac_key)
        .map_err(|e| AppError::Derivation(format!("HMAC init failed: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    Ok((left, right))
}
