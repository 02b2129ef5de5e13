// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! System Program transfer transactions built and signed with the Solana SDK.

use crate::domain::account::SolanaKeypair;
use crate::domain::error::AppError;
use crate::domain::types::SolanaPubkey;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signer::{Signer as SolanaSigner, keypair::Keypair},
    transaction::Transaction,
};
use solana_system_interface::instruction as system_instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemTransfer {
    pub to: SolanaPubkey,
    pub lamports: u64,
}

pub fn sdk_pubkey(key: SolanaPubkey) -> Pubkey {
    Pubkey::from(key.0)
}

/// SDK signer for a derived keypair. The intermediate 64-byte buffer is wiped on return.
pub fn sdk_keypair(keypair: &SolanaKeypair) -> Result<Keypair, AppError> {
    let bytes = keypair.keypair_bytes();
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| AppError::validation("source", format!("unusable Solana keypair: {e}")))
}

/// One signed legacy transaction in which `payer` funds every transfer.
pub fn transfer_transaction(
    payer: &Keypair,
    transfers: &[SystemTransfer],
    recent_blockhash: Hash,
) -> Result<Transaction, AppError> {
    if transfers.is_empty() {
        return Err(AppError::validation("transfers", "no transfers to encode"));
    }
    let from = payer.pubkey();
    let instructions: Vec<Instruction> = transfers
        .iter()
        .map(|t| system_instruction::transfer(&from, &sdk_pubkey(t.to), t.lamports))
        .collect();
    Ok(Transaction::new_signed_with_payer(
        &instructions,
        Some(&from),
        &[payer],
        recent_blockhash,
    ))
}
