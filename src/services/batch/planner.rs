// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::{RecipientLine, parse_recipient_lines};
use crate::common::units::parse_amount;
use crate::domain::account::DerivedAccount;
use crate::domain::error::AppError;
use crate::domain::types::{AssetSelector, ChainAddress, ChainFamily, Recipient, TransferRequest};
use crate::network::client::ChainClient;
use crate::services::balances::BalanceAggregator;
use crate::services::batch::executor::TransferTask;
use crate::services::policy::{AmountPolicy, Reserve};
use alloy::primitives::U256;
use std::collections::HashSet;
use std::sync::Arc;

/// An entry that produced no task, with the reason shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchPlan {
    pub tasks: Vec<TransferTask>,
    pub skipped: Vec<SkippedEntry>,
}

/// Many -> one. Each account sends what the amount policy allows to `target`.
pub struct CollectionRequest<'a> {
    pub accounts: &'a [Arc<DerivedAccount>],
    pub target: &'a str,
    pub asset: &'a AssetSelector,
    /// Explicit native reserve; the gas-cost reserve is used when `None`.
    pub reserve: Option<U256>,
    pub gas_limit: u64,
}

pub async fn plan_collection(
    client: Arc<dyn ChainClient>,
    request: CollectionRequest<'_>,
) -> Result<BatchPlan, AppError> {
    let family = client.family();
    let target = ChainAddress::parse(family, request.target).map_err(|_| {
        AppError::validation(
            "target",
            format!("'{}' is not a valid {family} address", request.target.trim()),
        )
    })?;

    let mut plan = BatchPlan::default();
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for account in request.accounts {
        let Some(address) = account.address(family) else {
            plan.skipped.push(SkippedEntry {
                label: account.label(family),
                reason: format!("no {family} key"),
            });
            continue;
        };
        if address == target {
            plan.skipped.push(SkippedEntry {
                label: address.to_string(),
                reason: "source is the collection target".into(),
            });
            continue;
        }
        if seen.insert(address) {
            sources.push((address, account.clone()));
        }
    }

    let policy = match request.asset {
        AssetSelector::Native => AmountPolicy::BalanceMinusReserve(match request.reserve {
            Some(amount) => Reserve::Explicit(amount),
            None => Reserve::GasCost {
                gas_limit: request.gas_limit,
            },
        }),
        AssetSelector::Token { .. } => AmountPolicy::FullBalance,
    };

    let addresses = sources.iter().map(|(a, _)| *a).collect::<Vec<_>>();
    let records = BalanceAggregator::new(client.clone())
        .fetch_balances(&addresses, request.asset)
        .await?;

    // One price for the whole run; sweeps are later sent with it as their fee cap.
    let gas_price = if policy.needs_gas_price(request.asset) {
        Some(client.gas_price().await?)
    } else {
        None
    };

    for ((address, account), record) in sources.into_iter().zip(records) {
        if let Some(error) = &record.error {
            plan.skipped.push(SkippedEntry {
                label: address.to_string(),
                reason: format!("balance unavailable: {error}"),
            });
            continue;
        }
        let outcome = policy.evaluate(record.raw, request.asset, gas_price.unwrap_or_default());
        if !outcome.valid {
            plan.skipped.push(SkippedEntry {
                label: address.to_string(),
                reason: format!("nothing to collect from balance {}", record.formatted),
            });
            continue;
        }

        let transfer = match request.asset {
            AssetSelector::Native => TransferRequest::NativeTransfer {
                to: target.to_string(),
                amount: outcome.target,
            },
            AssetSelector::Token { contract, .. } => TransferRequest::TokenTransfer {
                token: *contract,
                to: target.to_string(),
                amount: outcome.target,
            },
        };
        let mut task = TransferTask::new(account, transfer).with_available(record.raw);
        if request.asset.is_native() {
            task = task.with_gas_limit(request.gas_limit);
        }
        if let Some(price) = gas_price {
            task = task.with_fee_cap(price);
        }
        plan.tasks.push(task);
    }

    tracing::info!(
        target: "planner",
        tasks = plan.tasks.len(),
        skipped = plan.skipped.len(),
        "Collection planned"
    );
    Ok(plan)
}

fn line_amount(
    line: &RecipientLine,
    decimals: u8,
    default_amount: Option<U256>,
) -> Result<U256, String> {
    match (&line.amount, default_amount) {
        (Some(text), _) => parse_amount(text, decimals).map_err(|e| e.to_string()),
        (None, Some(amount)) => Ok(amount),
        (None, None) => Err("no amount given and no default set".into()),
    }
}

fn parsed_recipients(
    body: &str,
    decimals: u8,
    default_amount: Option<U256>,
    skipped: &mut Vec<SkippedEntry>,
) -> Vec<Recipient> {
    parse_recipient_lines(body)
        .into_iter()
        .filter_map(|line| match line_amount(&line, decimals, default_amount) {
            Ok(amount) => Some(Recipient {
                address: line.address,
                amount,
            }),
            Err(reason) => {
                skipped.push(SkippedEntry {
                    label: format!("line {}: {}", line.line_no, line.address),
                    reason,
                });
                None
            }
        })
        .collect()
}

/// One -> many: one fixed-amount transfer per recipient line. Malformed addresses are left for
/// the executor to reject so they show up as failed tasks. Every task carries the full source
/// balance; the executor nets out what earlier tasks actually moved.
pub fn plan_distribution(
    source: Arc<DerivedAccount>,
    family: ChainFamily,
    asset: &AssetSelector,
    recipients: &str,
    default_amount: Option<U256>,
    available: Option<U256>,
) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let decimals = asset.decimals(family);

    for recipient in parsed_recipients(recipients, decimals, default_amount, &mut plan.skipped) {
        let request = match asset {
            AssetSelector::Native => TransferRequest::NativeTransfer {
                to: recipient.address,
                amount: recipient.amount,
            },
            AssetSelector::Token { contract, .. } => TransferRequest::TokenTransfer {
                token: *contract,
                to: recipient.address,
                amount: recipient.amount,
            },
        };
        let mut task = TransferTask::new(source.clone(), request);
        if let Some(balance) = available {
            task = task.with_available(balance);
        }
        plan.tasks.push(task);
    }
    plan
}

/// One -> many in few transactions: recipient lines grouped into `Disperse` tasks of at most
/// `chunk_size` recipients.
pub fn plan_airdrop(
    source: Arc<DerivedAccount>,
    family: ChainFamily,
    asset: &AssetSelector,
    recipients: &str,
    default_amount: Option<U256>,
    chunk_size: usize,
    available: Option<U256>,
) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let decimals = asset.decimals(family);
    let parsed = parsed_recipients(recipients, decimals, default_amount, &mut plan.skipped);

    for chunk in parsed.chunks(chunk_size.max(1)) {
        let request = TransferRequest::Disperse {
            asset: asset.clone(),
            recipients: chunk.to_vec(),
        };
        let mut task = TransferTask::new(source.clone(), request);
        if let Some(balance) = available {
            task = task.with_available(balance);
        }
        plan.tasks.push(task);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::SolanaKeypair;

    fn source() -> Arc<DerivedAccount> {
        Arc::new(DerivedAccount::new(
            0,
            None,
            Some(SolanaKeypair::from_secret(&[4u8; 32])),
        ))
    }

    #[test]
    fn distribution_skips_bad_amounts_and_carries_the_full_balance() {
        let body = "\
11111111111111111111111111111112, 0.5
not-an-address 0.25
11111111111111111111111111111113 abc
11111111111111111111111111111114
";
        let plan = plan_distribution(
            source(),
            ChainFamily::Solana,
            &AssetSelector::Native,
            body,
            None,
            Some(U256::from(600_000_000u64)),
        );

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan.skipped[0].label.starts_with("line 3"));
        assert!(plan.skipped[1].reason.contains("no amount"));
        assert_eq!(plan.tasks[0].available, Some(U256::from(600_000_000u64)));
        assert_eq!(plan.tasks[1].available, Some(U256::from(600_000_000u64)));
        assert_eq!(plan.tasks[1].request.recipient_label(), "not-an-address");
    }

    #[test]
    fn airdrop_chunks_recipients() {
        let body = (0..25)
            .map(|_| "11111111111111111111111111111112".to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let plan = plan_airdrop(
            source(),
            ChainFamily::Solana,
            &AssetSelector::Native,
            &body,
            Some(U256::from(10u64)),
            12,
            None,
        );
        let sizes = plan
            .tasks
            .iter()
            .map(|t| match &t.request {
                TransferRequest::Disperse { recipients, .. } => recipients.len(),
                other => panic!("unexpected request {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![12, 12, 1]);
        assert!(plan.skipped.is_empty());
    }
}
