// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Derivation failed: {0}")]
    Derivation(String),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Asset metadata unavailable: {0}")]
    AssetMetadata(String),

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("Address {0} is invalid or not checksummed")]
    InvalidAddress(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Stable error classification used in operator-facing run logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Derivation,
    InvalidAsset,
    Validation,
    Network,
    InsufficientFunds,
    AssetMetadata,
    Transaction,
    Unsupported,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Derivation => "DerivationError",
            ErrorKind::InvalidAsset => "InvalidAssetError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::InsufficientFunds => "InsufficientFundsError",
            ErrorKind::AssetMetadata => "AssetMetadataError",
            ErrorKind::Transaction => "TransactionError",
            ErrorKind::Unsupported => "UnsupportedError",
            ErrorKind::Other => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) | AppError::Initialization(_) => ErrorKind::Config,
            AppError::Derivation(_) => ErrorKind::Derivation,
            AppError::InvalidAsset(_) => ErrorKind::InvalidAsset,
            AppError::Validation { .. } | AppError::InvalidAddress(_) => ErrorKind::Validation,
            AppError::Network(_) => ErrorKind::Network,
            AppError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AppError::AssetMetadata(_) => ErrorKind::AssetMetadata,
            AppError::Transaction { .. } => ErrorKind::Transaction,
            AppError::Unsupported(_) => ErrorKind::Unsupported,
            AppError::Unknown(_) => ErrorKind::Other,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
