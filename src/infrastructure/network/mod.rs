// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod client;
pub mod evm;
pub mod gas;
pub mod nonce;
pub mod provider;
pub mod solana;
pub mod solana_tx;
