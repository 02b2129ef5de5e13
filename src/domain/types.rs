// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::parse_address_hex;
use crate::common::units::format_amount;
use crate::domain::error::AppError;
use alloy::primitives::{Address, Bytes, U256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl ChainFamily {
    pub fn native_decimals(&self) -> u8 {
        match self {
            ChainFamily::Evm => 18,
            ChainFamily::Solana => 9,
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => f.write_str("evm"),
            ChainFamily::Solana => f.write_str("solana"),
        }
    }
}

/// Raw 32-byte ed25519 public key, displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolanaPubkey(pub [u8; 32]);

impl SolanaPubkey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for SolanaPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for SolanaPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SolanaPubkey({self})")
    }
}

impl FromStr for SolanaPubkey {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| AppError::InvalidAddress(trimmed.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::InvalidAddress(trimmed.to_string()))?;
        Ok(SolanaPubkey(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainAddress {
    Evm(Address),
    Solana(SolanaPubkey),
}

impl ChainAddress {
    pub fn family(&self) -> ChainFamily {
        match self {
            ChainAddress::Evm(_) => ChainFamily::Evm,
            ChainAddress::Solana(_) => ChainFamily::Solana,
        }
    }

    /// Parses `raw` as an address of the given family.
    pub fn parse(family: ChainFamily, raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        match family {
            ChainFamily::Evm => {
                if !(trimmed.starts_with("0x") || trimmed.starts_with("0X")) || trimmed.len() != 42
                {
                    return Err(AppError::InvalidAddress(trimmed.to_string()));
                }
                parse_address_hex(trimmed)
                    .map(ChainAddress::Evm)
                    .ok_or_else(|| AppError::InvalidAddress(trimmed.to_string()))
            }
            ChainFamily::Solana => trimmed.parse::<SolanaPubkey>().map(ChainAddress::Solana),
        }
    }

    pub fn as_evm(&self) -> Option<Address> {
        match self {
            ChainAddress::Evm(addr) => Some(*addr),
            ChainAddress::Solana(_) => None,
        }
    }

    pub fn as_solana(&self) -> Option<SolanaPubkey> {
        match self {
            ChainAddress::Solana(key) => Some(*key),
            ChainAddress::Evm(_) => None,
        }
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainAddress::Evm(addr) => write!(f, "{addr}"),
            ChainAddress::Solana(key) => write!(f, "{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetSelector {
    Native,
    Token { contract: ChainAddress, decimals: u8 },
}

impl AssetSelector {
    pub fn decimals(&self, family: ChainFamily) -> u8 {
        match self {
            AssetSelector::Native => family.native_decimals(),
            AssetSelector::Token { decimals, .. } => *decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetSelector::Native)
    }
}

impl fmt::Display for AssetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSelector::Native => f.write_str("native"),
            AssetSelector::Token { contract, .. } => write!(f, "token {contract}"),
        }
    }
}

/// Balance of one address for one asset. A failed lookup keeps a zero amount and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub address: ChainAddress,
    pub asset: AssetSelector,
    pub raw: U256,
    pub formatted: String,
    pub error: Option<String>,
}

impl BalanceRecord {
    pub fn ok(address: ChainAddress, asset: AssetSelector, raw: U256) -> Self {
        let decimals = asset.decimals(address.family());
        Self {
            address,
            formatted: format_amount(raw, decimals),
            asset,
            raw,
            error: None,
        }
    }

    pub fn failed(address: ChainAddress, asset: AssetSelector, reason: impl Into<String>) -> Self {
        Self {
            address,
            asset,
            raw: U256::ZERO,
            formatted: "0".to_string(),
            error: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Keeps successful records with a non-zero balance, preserving order.
pub fn prune_zero_balances(records: Vec<BalanceRecord>) -> Vec<BalanceRecord> {
    records
        .into_iter()
        .filter(|r| r.is_ok() && !r.raw.is_zero())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub amount: U256,
}

/// Operator-supplied request, one variant per operation kind. Addresses are still unchecked text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRequest {
    NativeTransfer {
        to: String,
        amount: U256,
    },
    TokenTransfer {
        token: ChainAddress,
        to: String,
        amount: U256,
    },
    ContractCall {
        to: String,
        calldata: Bytes,
        value: U256,
    },
    Disperse {
        asset: AssetSelector,
        recipients: Vec<Recipient>,
    },
}

/// A request whose addresses and amounts passed validation for one chain family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedRequest {
    NativeTransfer {
        to: ChainAddress,
        amount: U256,
    },
    TokenTransfer {
        token: ChainAddress,
        to: ChainAddress,
        amount: U256,
    },
    ContractCall {
        to: ChainAddress,
        calldata: Bytes,
        value: U256,
    },
    Disperse {
        asset: AssetSelector,
        recipients: Vec<(ChainAddress, U256)>,
    },
}

impl TransferRequest {
    /// Primary counterparty, used in log lines.
    pub fn recipient_label(&self) -> String {
        match self {
            TransferRequest::NativeTransfer { to, .. }
            | TransferRequest::TokenTransfer { to, .. }
            | TransferRequest::ContractCall { to, .. } => to.clone(),
            TransferRequest::Disperse { recipients, .. } => {
                format!("{} recipients", recipients.len())
            }
        }
    }

    pub fn validate(&self, family: ChainFamily) -> Result<PreparedRequest, AppError> {
        match self {
            TransferRequest::NativeTransfer { to, amount } => Ok(PreparedRequest::NativeTransfer {
                to: parse_recipient(family, to)?,
                amount: positive_amount(*amount)?,
            }),
            TransferRequest::TokenTransfer { token, to, amount } => {
                if token.family() != family {
                    return Err(AppError::InvalidAsset(format!(
                        "token {token} is not a {family} contract"
                    )));
                }
                Ok(PreparedRequest::TokenTransfer {
                    token: *token,
                    to: parse_recipient(family, to)?,
                    amount: positive_amount(*amount)?,
                })
            }
            TransferRequest::ContractCall {
                to,
                calldata,
                value,
            } => {
                if calldata.is_empty() && value.is_zero() {
                    return Err(AppError::validation(
                        "calldata",
                        "contract call carries neither calldata nor value",
                    ));
                }
                Ok(PreparedRequest::ContractCall {
                    to: parse_recipient(family, to)?,
                    calldata: calldata.clone(),
                    value: *value,
                })
            }
            TransferRequest::Disperse { asset, recipients } => {
                if recipients.is_empty() {
                    return Err(AppError::validation("recipients", "recipient list is empty"));
                }
                if let AssetSelector::Token { contract, .. } = asset
                    && contract.family() != family
                {
                    return Err(AppError::InvalidAsset(format!(
                        "token {contract} is not a {family} contract"
                    )));
                }
                let mut prepared = Vec::with_capacity(recipients.len());
                for recipient in recipients {
                    prepared.push((
                        parse_recipient(family, &recipient.address)?,
                        positive_amount(recipient.amount)?,
                    ));
                }
                Ok(PreparedRequest::Disperse {
                    asset: asset.clone(),
                    recipients: prepared,
                })
            }
        }
    }
}

impl PreparedRequest {
    /// Amount leaving the source in the moved asset (call value for contract calls).
    /// Token contract the outflow is denominated in; `None` for the native asset.
    pub fn outflow_token(&self) -> Option<&ChainAddress> {
        match self {
            PreparedRequest::TokenTransfer { token, .. } => Some(token),
            PreparedRequest::Disperse {
                asset: AssetSelector::Token { contract, .. },
                ..
            } => Some(contract),
            PreparedRequest::NativeTransfer { .. }
            | PreparedRequest::ContractCall { .. }
            | PreparedRequest::Disperse { .. } => None,
        }
    }

    pub fn outflow(&self) -> U256 {
        match self {
            PreparedRequest::NativeTransfer { amount, .. }
            | PreparedRequest::TokenTransfer { amount, .. } => *amount,
            PreparedRequest::ContractCall { value, .. } => *value,
            PreparedRequest::Disperse { recipients, .. } => recipients
                .iter()
                .fold(U256::ZERO, |acc, (_, amount)| acc.saturating_add(*amount)),
        }
    }
}

fn parse_recipient(family: ChainFamily, raw: &str) -> Result<ChainAddress, AppError> {
    ChainAddress::parse(family, raw).map_err(|_| {
        AppError::validation(
            "recipient",
            format!("'{}' is not a valid {family} address", raw.trim()),
        )
    })
}

fn positive_amount(amount: U256) -> Result<U256, AppError> {
    if amount.is_zero() {
        return Err(AppError::validation("amount", "must be greater than zero"));
    }
    Ok(amount)
}

/// Transaction identifier: `0x` hash on EVM chains, base58 signature on Solana.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
