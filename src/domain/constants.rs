// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_BSC: u64 = 56;
pub const CHAIN_BSC_TESTNET: u64 = 97;
pub const CHAIN_SEPOLIA: u64 = 11_155_111;

pub const DEFAULT_SOLANA_RPC: &str = "https://api.mainnet-beta.solana.com";

// =============================================================================
// DERIVATION
// =============================================================================

pub const EVM_DERIVATION_PREFIX: &str = "m/44'/60'/0'/0";
pub const SOLANA_COIN_TYPE: u32 = 501;

pub fn evm_derivation_path(index: u32) -> String {
    format!("{EVM_DERIVATION_PREFIX}/{index}")
}

pub fn solana_derivation_path(index: u32) -> String {
    format!("m/44'/{SOLANA_COIN_TYPE}'/{index}'/0'")
}

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const NATIVE_TRANSFER_GAS: u64 = 21_000;
/// Headroom applied on top of `eth_estimateGas`.
pub const GAS_ESTIMATE_HEADROOM_BPS: u64 = 12_000;
pub const APPROVE_GAS_FALLBACK: u64 = 80_000;
pub const DEFAULT_SWAP_GAS_LIMIT: u64 = 300_000;

pub const BPS_DENOMINATOR: u64 = 10_000;

// Solana fee model: flat fee per signature.
pub const SOLANA_LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const SOLANA_MAX_TRANSFERS_PER_TX: usize = 12;
pub const SOLANA_SYSTEM_PROGRAM: [u8; 32] = [0u8; 32];
pub const SPL_TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const SPL_TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

// =============================================================================
// CONTRACTS
// =============================================================================

pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

pub fn default_disperse_address(chain_id: u64) -> Option<Address> {
    match chain_id {
        CHAIN_ETHEREUM | CHAIN_SEPOLIA => Some(address!("D152f549545093347A162Dce210e7293f1452150")),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    V2,
    V3,
}

impl std::str::FromStr for RouterKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "v2" => Ok(RouterKind::V2),
            "v3" => Ok(RouterKind::V3),
            other => Err(format!("unknown router kind '{other}' (expected v2 or v3)")),
        }
    }
}

pub fn default_router(kind: RouterKind, chain_id: u64) -> Option<Address> {
    match (kind, chain_id) {
        // Uniswap V2
        (RouterKind::V2, CHAIN_ETHEREUM) => Some(address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D")),
        // PancakeSwap V2
        (RouterKind::V2, CHAIN_BSC) => Some(address!("10ED43C718714eb63d5aA57B78B54704E256024E")),
        (RouterKind::V2, CHAIN_SEPOLIA) => Some(address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008")),
        // SwapRouter02-style routers (no deadline in the params struct)
        (RouterKind::V3, CHAIN_ETHEREUM) => Some(address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45")),
        (RouterKind::V3, CHAIN_BSC) => Some(address!("13f4EA83D0bd40E75C8222255bc855a974568Dd4")),
        (RouterKind::V3, CHAIN_SEPOLIA) => Some(address!("3bFA4769FB09eefC5a80d6E87c3B9C650f7Ae48E")),
        (RouterKind::V3, CHAIN_BSC_TESTNET) => Some(address!("1b81D678ffb9C0263b24A97847620C99d213eB14")),
        _ => None,
    }
}

/// Uniswap V3 Quoter (V1 interface) deployments.
pub fn default_v3_quoter(chain_id: u64) -> Option<Address> {
    match chain_id {
        CHAIN_ETHEREUM => Some(address!("b27308f9F90D607463bb33eA1BeBb41C27CE5AB6")),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BaseToken {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
    /// Wrapped form of the chain's native coin; trades against it pay with the coin itself.
    pub wraps_native: bool,
}

pub fn base_tokens(chain_id: u64) -> &'static [BaseToken] {
    const MAINNET: &[BaseToken] = &[
        BaseToken {
            symbol: "WETH",
            address: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            decimals: 18,
            wraps_native: true,
        },
        BaseToken {
            symbol: "USDC",
            address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            decimals: 6,
            wraps_native: false,
        },
        BaseToken {
            symbol: "USDT",
            address: address!("dAC17F958D2ee523a2206206994597C13D831ec7"),
            decimals: 6,
            wraps_native: false,
        },
    ];
    const BSC: &[BaseToken] = &[
        BaseToken {
            symbol: "WETH",
            address: address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            decimals: 18,
            wraps_native: true,
        },
        BaseToken {
            symbol: "USDC",
            address: address!("8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
            decimals: 18,
            wraps_native: false,
        },
        BaseToken {
            symbol: "USDT",
            address: address!("55d398326f99059fF775485246999027B3197955"),
            decimals: 18,
            wraps_native: false,
        },
    ];
    const SEPOLIA: &[BaseToken] = &[
        BaseToken {
            symbol: "WETH",
            address: address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14"),
            decimals: 18,
            wraps_native: true,
        },
        BaseToken {
            symbol: "USDC",
            address: address!("1c7D4B196Cb0C7B01d743Fbc6116a902fB6DbcE8"),
            decimals: 6,
            wraps_native: false,
        },
    ];
    const BSC_TESTNET: &[BaseToken] = &[
        BaseToken {
            symbol: "WETH",
            address: address!("ae13d989daC2f0dEbFf460aC112a837C89BAa7cd"),
            decimals: 18,
            wraps_native: true,
        },
        BaseToken {
            symbol: "USDT",
            address: address!("337610d27c682E347C9cD60BD4b3b107C9d34dDd"),
            decimals: 18,
            wraps_native: false,
        },
    ];

    match chain_id {
        CHAIN_ETHEREUM => MAINNET,
        CHAIN_BSC => BSC,
        CHAIN_SEPOLIA => SEPOLIA,
        CHAIN_BSC_TESTNET => BSC_TESTNET,
        _ => &[],
    }
}

pub fn base_token(chain_id: u64, symbol: &str) -> Option<BaseToken> {
    base_tokens(chain_id)
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_paths_follow_family_conventions() {
        assert_eq!(evm_derivation_path(3), "m/44'/60'/0'/0/3");
        assert_eq!(solana_derivation_path(3), "m/44'/501'/3'/0'");
    }

    #[test]
    fn base_token_lookup_is_case_insensitive() {
        let weth = base_token(CHAIN_BSC, "weth").expect("wbnb entry");
        assert!(weth.wraps_native);
        assert!(base_token(424242, "WETH").is_none());
    }

    #[test]
    fn router_kind_parses_loosely() {
        assert_eq!("V2".parse::<RouterKind>(), Ok(RouterKind::V2));
        assert_eq!(" v3 ".parse::<RouterKind>(), Ok(RouterKind::V3));
        assert!("v4".parse::<RouterKind>().is_err());
    }
}
