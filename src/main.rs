// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, U256};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleetops::app::config::GlobalSettings;
use fleetops::app::logging::setup_logging;
use fleetops::common::run_log::{RunLog, SharedRunLog};
use fleetops::common::units::{format_amount, parse_amount};
use fleetops::domain::account::DerivedAccount;
use fleetops::domain::constants::{BaseToken, base_token};
use fleetops::domain::error::AppError;
use fleetops::domain::types::{
    AssetSelector, ChainAddress, ChainFamily, prune_zero_balances,
};
use fleetops::network::client::ChainClient;
use fleetops::network::evm::{EvmClient, EvmClientSettings};
use fleetops::network::solana::{SolanaClient, SolanaClientSettings};
use fleetops::services::accounts::{SeedMaterial, WalletSession};
use fleetops::services::balances::BalanceAggregator;
use fleetops::services::batch::planner::{plan_airdrop, plan_collection, plan_distribution};
use fleetops::services::batch::{BatchExecutor, BatchPlan, BatchRun, CollectionRequest, TaskStatus};
use fleetops::services::trading::{
    BatchTrader, BuyPlan, BuySizing, RouterVenue, RouterVenueConfig, SellSizing, TradeSide,
    TradingLoopConfig, VolumeBot,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(author, version, about = "fleetops: batch wallet operations across EVM and Solana")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON (overrides config/env)
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct AccountRange {
    /// First derivation index (overrides account_start)
    #[arg(long)]
    start: Option<u32>,

    /// Number of accounts to derive (overrides account_count)
    #[arg(long)]
    count: Option<u32>,
}

#[derive(Args, Debug, Clone)]
struct AssetArgs {
    /// Token contract (EVM) or mint (Solana); native coin when omitted
    #[arg(long)]
    token: Option<String>,

    /// Operate on Solana instead of the configured EVM chain
    #[arg(long, default_value_t = false)]
    solana: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BuyMode {
    /// Spend `--amount` of the base token
    Spend,
    /// Receive exactly `--amount` target tokens
    ExactOutput,
    /// Spend everything above `--reserve`
    SpendAll,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive and print account addresses
    Accounts {
        #[command(flatten)]
        range: AccountRange,
    },
    /// Fetch balances for every derived account
    Balances {
        #[command(flatten)]
        range: AccountRange,
        #[command(flatten)]
        asset: AssetArgs,
        /// Only print non-zero balances
        #[arg(long, default_value_t = false)]
        hide_zero: bool,
    },
    /// Sweep every derived account into one target address
    Collect {
        #[command(flatten)]
        range: AccountRange,
        #[command(flatten)]
        asset: AssetArgs,
        /// Receiving address
        #[arg(long)]
        target: String,
        /// Native amount left behind per account (overrides collect_reserve)
        #[arg(long)]
        reserve: Option<String>,
    },
    /// Send from one account to every line of a recipients file, one transaction each
    Distribute {
        #[command(flatten)]
        range: AccountRange,
        #[command(flatten)]
        asset: AssetArgs,
        /// File of `address[,amount]` lines
        #[arg(long)]
        recipients: PathBuf,
        /// Amount for lines without one
        #[arg(long)]
        amount: Option<String>,
        /// Derivation index of the sending account
        #[arg(long, default_value_t = 0)]
        from: u32,
    },
    /// Like distribute, but pays many recipients per transaction
    Airdrop {
        #[command(flatten)]
        range: AccountRange,
        #[command(flatten)]
        asset: AssetArgs,
        #[arg(long)]
        recipients: PathBuf,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long, default_value_t = 0)]
        from: u32,
    },
    /// Buy or sell the same way from every derived account, one account at a time
    Trade {
        #[command(flatten)]
        range: AccountRange,
        /// Token traded against the configured base token
        #[arg(long)]
        token: String,
        #[arg(long, value_enum)]
        side: Side,
        #[arg(long, value_enum, default_value_t = BuyMode::Spend)]
        mode: BuyMode,
        /// Base amount to spend (spend), tokens to receive (exact-output) or tokens to sell
        #[arg(long)]
        amount: Option<String>,
        /// Base amount kept back in spend-all mode (overrides bot_reserve)
        #[arg(long)]
        reserve: Option<String>,
        /// Sell this whole percent of each balance, accepting any output
        #[arg(long, conflicts_with = "amount")]
        percent: Option<u8>,
        /// Use the fee-on-transfer router entry points (overrides bot_fee_on_transfer)
        #[arg(long, default_value_t = false)]
        fee_on_transfer: bool,
    },
    /// Paired buy/sell loop over the derived accounts until Ctrl-C
    VolumeBot {
        #[command(flatten)]
        range: AccountRange,
        /// Token traded against the configured base token
        #[arg(long)]
        token: String,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// RNG seed for reproducible pair and delay selection
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// One connected chain client plus what the commands need to know about it.
enum ChainContext {
    Evm(EvmClient),
    Solana(SolanaClient),
}

impl ChainContext {
    fn connect(settings: &GlobalSettings, solana: bool) -> Result<Self, AppError> {
        if solana {
            let client = SolanaClient::connect(
                &settings.solana_rpc_url,
                SolanaClientSettings {
                    batch_size: settings.rpc_batch_size,
                    receipt_poll: settings.receipt_poll(),
                    receipt_timeout: settings.receipt_timeout(),
                    ..SolanaClientSettings::default()
                },
            )?;
            return Ok(Self::Solana(client));
        }
        Ok(Self::Evm(connect_evm(settings)?))
    }

    fn family(&self) -> ChainFamily {
        match self {
            Self::Evm(_) => ChainFamily::Evm,
            Self::Solana(_) => ChainFamily::Solana,
        }
    }

    fn client(&self) -> Arc<dyn ChainClient> {
        match self {
            Self::Evm(c) => Arc::new(c.clone()),
            Self::Solana(c) => Arc::new(c.clone()),
        }
    }

    /// Native coin, or the token with its decimals read from chain.
    async fn asset(&self, token: Option<&str>) -> Result<AssetSelector, AppError> {
        let Some(raw) = token else {
            return Ok(AssetSelector::Native);
        };
        let contract = ChainAddress::parse(self.family(), raw)
            .map_err(|_| AppError::InvalidAsset(format!("'{raw}' is not a token address")))?;
        let decimals = match (self, contract) {
            (Self::Evm(c), ChainAddress::Evm(addr)) => c.tokens().resolve(addr).await?.decimals,
            (Self::Solana(c), ChainAddress::Solana(mint)) => c.mint_decimals(mint).await?,
            _ => {
                return Err(AppError::InvalidAsset(format!(
                    "{raw} is not a {} token",
                    self.family()
                )));
            }
        };
        Ok(AssetSelector::Token { contract, decimals })
    }
}

fn connect_evm(settings: &GlobalSettings) -> Result<EvmClient, AppError> {
    let chain_id = settings.chain_id;
    let url = settings.get_http_provider(chain_id)?;
    EvmClient::connect(
        &url,
        EvmClientSettings {
            chain_id,
            batch_size: settings.rpc_batch_size,
            multicall: settings.multicall(),
            disperse: settings.disperse_for_chain(chain_id),
            receipt_poll: settings.receipt_poll(),
            receipt_timeout: settings.receipt_timeout(),
            native_gas_limit: settings.native_gas_limit,
            token_gas_limit: settings.token_gas_limit,
        },
    )
}

/// Seed material from `FLEETOPS_MNEMONIC`, `FLEETOPS_PRIVATE_KEY`, or one line of stdin.
fn read_seed_material() -> Result<SeedMaterial, AppError> {
    if let Ok(phrase) = std::env::var("FLEETOPS_MNEMONIC") {
        let phrase = Zeroizing::new(phrase);
        return SeedMaterial::mnemonic(&phrase);
    }
    if let Ok(key) = std::env::var("FLEETOPS_PRIVATE_KEY") {
        let key = Zeroizing::new(key);
        return SeedMaterial::parse(&key);
    }

    eprintln!("Enter mnemonic or private key:");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Initialization(format!("failed to read seed from stdin: {e}")))?;
    if line.trim().is_empty() {
        return Err(AppError::Initialization(
            "no seed material (set FLEETOPS_MNEMONIC or FLEETOPS_PRIVATE_KEY)".into(),
        ));
    }
    SeedMaterial::parse(&line)
}

fn open_session(settings: &GlobalSettings, range: &AccountRange) -> Result<WalletSession, AppError> {
    let material = read_seed_material()?;
    let start = range.start.unwrap_or(settings.account_start);
    let count = range.count.unwrap_or(settings.account_count);
    let mut session = WalletSession::open(material, start)?;
    if session.is_empty() {
        session.add_accounts(count)?;
    } else if count > 1 {
        tracing::warn!(
            target: "session",
            requested = count,
            "Single private key loaded; only one account is available"
        );
    }
    Ok(session)
}

fn source_account(
    session: &WalletSession,
    index: u32,
) -> Result<Arc<DerivedAccount>, AppError> {
    session.account(index).ok_or_else(|| {
        AppError::validation(
            "from",
            format!("account #{index} is not in this session"),
        )
    })
}

fn read_recipients(path: &PathBuf) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::validation("recipients", format!("cannot read {}: {e}", path.display()))
    })
}

fn parse_optional_amount(
    raw: Option<&str>,
    decimals: u8,
) -> Result<Option<U256>, AppError> {
    raw.map(|a| parse_amount(a, decimals)).transpose()
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "cli", "Ctrl-C received, stopping after the task in flight");
            token.cancel();
        }
    });
}

async fn source_balance(
    client: &Arc<dyn ChainClient>,
    account: &DerivedAccount,
    asset: &AssetSelector,
) -> Option<U256> {
    let address = account.address(client.family())?;
    let aggregator = BalanceAggregator::new(client.clone());
    match aggregator.fetch_balances(&[address], asset).await {
        Ok(records) => records.into_iter().find(|r| r.is_ok()).map(|r| r.raw),
        Err(e) => {
            tracing::warn!(target: "cli", error = %e, "Source balance unavailable");
            None
        }
    }
}

async fn run_plan(
    settings: &GlobalSettings,
    client: Arc<dyn ChainClient>,
    plan: BatchPlan,
) -> Result<(), AppError> {
    for skipped in &plan.skipped {
        println!("skipped {}: {}", skipped.label, skipped.reason);
    }
    if plan.tasks.is_empty() {
        println!("nothing to do");
        return Ok(());
    }

    let log: SharedRunLog = RunLog::shared("batch", settings.log_capacity);
    let executor = BatchExecutor::new(client, log.clone(), settings.wait_for_receipts);
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut run = BatchRun::new(plan.tasks);
    let report = executor.execute(&mut run, &cancel).await?;

    for line in log.snapshot() {
        println!("{line}");
    }
    for outcome in &report.outcomes {
        match &outcome.status {
            TaskStatus::Succeeded { tx } => {
                println!("#{} ok {} -> {} {tx}", outcome.position, outcome.source, outcome.recipient)
            }
            TaskStatus::Failed { kind, reason } => println!(
                "#{} failed [{kind}] {} -> {}: {reason}",
                outcome.position, outcome.source, outcome.recipient
            ),
            TaskStatus::Pending => {}
        }
    }
    println!(
        "{:?}: {}/{} succeeded, {} failed",
        report.state, report.succeeded, report.attempted, report.failed
    );
    Ok(())
}

fn parse_target(token: &str) -> Result<Address, AppError> {
    token
        .parse()
        .map_err(|_| AppError::AssetMetadata(format!("'{token}' is not a token address")))
}

fn configured_base(settings: &GlobalSettings) -> Result<BaseToken, AppError> {
    let chain_id = settings.chain_id;
    base_token(chain_id, &settings.bot_base_token).ok_or_else(|| {
        AppError::Config(format!(
            "base token {} is not known on chain {chain_id}",
            settings.bot_base_token
        ))
    })
}

/// Router venue for `target` built from the `bot_*` settings.
fn router_venue(
    settings: &GlobalSettings,
    client: EvmClient,
    target: Address,
    fee_on_transfer: bool,
) -> Result<RouterVenue, AppError> {
    let chain_id = settings.chain_id;
    Ok(RouterVenue::new(
        client,
        RouterVenueConfig {
            kind: settings.router_kind()?,
            router: settings.bot_router(chain_id)?,
            quoter: settings.bot_quoter(chain_id),
            target,
            base: configured_base(settings)?,
            v3_fee: settings.bot_v3_fee,
            slippage_bps: settings.bot_slippage_bps,
            deadline_secs: settings.bot_deadline_secs,
            gas_limit: settings.bot_gas_limit,
            fee_on_transfer,
        },
    ))
}

struct TradeArgs {
    token: String,
    side: Side,
    mode: BuyMode,
    amount: Option<String>,
    reserve: Option<String>,
    percent: Option<u8>,
    fee_on_transfer: bool,
}

fn trade_side(
    settings: &GlobalSettings,
    args: &TradeArgs,
    base: &BaseToken,
    token_decimals: u8,
) -> Result<TradeSide, AppError> {
    let amount = |decimals: u8| -> Result<U256, AppError> {
        let raw = args
            .amount
            .as_deref()
            .ok_or_else(|| AppError::validation("amount", "--amount is required for this mode"))?;
        parse_amount(raw, decimals)
    };
    match args.side {
        Side::Buy => Ok(TradeSide::Buy(match args.mode {
            BuyMode::Spend => BuySizing::Spend {
                amount: amount(base.decimals)?,
                min_balance: U256::ZERO,
            },
            BuyMode::ExactOutput => BuySizing::ExactOutput(amount(token_decimals)?),
            BuyMode::SpendAll => {
                let reserve = args.reserve.as_deref().unwrap_or(&settings.bot_reserve);
                BuySizing::SpendAllMinusReserve(parse_amount(reserve, base.decimals)?)
            }
        })),
        Side::Sell => Ok(TradeSide::Sell(match (args.percent, &args.amount) {
            (Some(pct), _) if (1..=100).contains(&pct) => SellSizing::Percent(pct),
            (Some(pct), _) => {
                return Err(AppError::validation(
                    "percent",
                    format!("{pct} is outside 1..=100"),
                ));
            }
            (None, Some(_)) => SellSizing::Amount(amount(token_decimals)?),
            (None, None) => SellSizing::All,
        })),
    }
}

async fn run_trade(
    settings: &GlobalSettings,
    session: &WalletSession,
    args: TradeArgs,
) -> Result<(), AppError> {
    let client = connect_evm(settings)?;
    let target = parse_target(&args.token)?;
    let token_decimals = client.tokens().resolve(target).await?.decimals;
    let base = configured_base(settings)?;
    let side = trade_side(settings, &args, &base, token_decimals)?;
    let venue = router_venue(
        settings,
        client,
        target,
        args.fee_on_transfer || settings.bot_fee_on_transfer,
    )?;

    let log: SharedRunLog = RunLog::shared("trade", settings.log_capacity);
    let trader = BatchTrader::new(Arc::new(venue), log.clone());
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let report = trader
        .execute(&session.accounts_for(ChainFamily::Evm), side, &cancel)
        .await?;

    for line in log.snapshot() {
        println!("{line}");
    }
    println!(
        "{:?}: {}/{} succeeded, {} failed",
        report.state, report.succeeded, report.attempted, report.failed
    );
    Ok(())
}

async fn run_volume_bot(
    settings: &GlobalSettings,
    session: &WalletSession,
    token: &str,
    cycles: Option<u64>,
    seed: Option<u64>,
) -> Result<(), AppError> {
    let client = connect_evm(settings)?;
    let target = parse_target(token)?;
    let base = configured_base(settings)?;

    let buy = match settings.bot_buy_mode.trim().to_ascii_lowercase().as_str() {
        "spend" => BuyPlan::Spend {
            min: parse_amount(&settings.bot_amount_min, base.decimals)?,
            max: parse_amount(&settings.bot_amount_max, base.decimals)?,
        },
        "exact-output" => {
            let raw = settings.bot_exact_output.as_deref().ok_or_else(|| {
                AppError::Config("bot_exact_output is required in exact-output mode".into())
            })?;
            let decimals = client.tokens().resolve(target).await?.decimals;
            BuyPlan::ExactOutput(parse_amount(raw, decimals)?)
        }
        "spend-all" => BuyPlan::SpendAllMinusReserve(parse_amount(
            &settings.bot_reserve,
            base.decimals,
        )?),
        other => {
            return Err(AppError::Config(format!(
                "unknown bot_buy_mode '{other}' (expected spend, exact-output or spend-all)"
            )));
        }
    };

    let venue = router_venue(settings, client, target, settings.bot_fee_on_transfer)?;

    let log: SharedRunLog = RunLog::shared("volume_bot", settings.log_capacity);
    let bot = VolumeBot::new(
        Arc::new(venue),
        session.accounts_for(ChainFamily::Evm),
        log.clone(),
        TradingLoopConfig {
            buy,
            sell_pct_min: settings.bot_sell_pct_min,
            sell_pct_max: settings.bot_sell_pct_max,
            interval_min: Duration::from_secs(settings.bot_interval_min_secs),
            interval_max: Duration::from_secs(settings.bot_interval_max_secs),
            pause_poll: Duration::from_millis(settings.bot_pause_poll_ms.max(1)),
            max_cycles: cycles,
            seed,
        },
    );
    let handle = bot.start().await?;

    let stop = CancellationToken::new();
    cancel_on_ctrl_c(stop.clone());
    tokio::select! {
        _ = stop.cancelled() => handle.stop(),
        _ = async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        } => {}
    }
    let stats = handle.join().await?;
    println!(
        "cycles {} | legs {}/{} ok, {} failed | volume {} {}",
        stats.cycles,
        stats.successes,
        stats.attempts,
        stats.failures,
        format_amount(stats.volume, base.decimals),
        base.symbol
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(
        if settings.debug { "debug" } else { "info" },
        cli.json_logs || settings.log_json,
    );

    match cli.command {
        Command::Accounts { range } => {
            let session = open_session(&settings, &range)?;
            for account in session.accounts() {
                println!(
                    "#{:<4} evm {:<44} solana {}",
                    account.index,
                    account
                        .evm_address()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".into()),
                    account
                        .solana_address()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".into()),
                );
            }
        }
        Command::Balances {
            range,
            asset,
            hide_zero,
        } => {
            let session = open_session(&settings, &range)?;
            let chain = ChainContext::connect(&settings, asset.solana)?;
            let selector = chain.asset(asset.token.as_deref()).await?;
            let aggregator = BalanceAggregator::new(chain.client());
            let addresses = session.addresses(chain.family());
            let mut records = aggregator.fetch_balances(&addresses, &selector).await?;
            if hide_zero {
                records = prune_zero_balances(records);
            }
            for record in records {
                match &record.error {
                    None => println!("{} {}", record.address, record.formatted),
                    Some(reason) => println!("{} error: {reason}", record.address),
                }
            }
        }
        Command::Collect {
            range,
            asset,
            target,
            reserve,
        } => {
            let session = open_session(&settings, &range)?;
            let chain = ChainContext::connect(&settings, asset.solana)?;
            let selector = chain.asset(asset.token.as_deref()).await?;
            let native_decimals = chain.family().native_decimals();
            let reserve = reserve
                .as_deref()
                .or(settings.collect_reserve.as_deref())
                .map(|r| parse_amount(r, native_decimals))
                .transpose()?;
            let accounts = session.accounts();
            let client = chain.client();
            let plan = plan_collection(
                client.clone(),
                CollectionRequest {
                    accounts: &accounts,
                    target: &target,
                    asset: &selector,
                    reserve,
                    gas_limit: settings.native_gas_limit,
                },
            )
            .await?;
            run_plan(&settings, client, plan).await?;
        }
        Command::Distribute {
            range,
            asset,
            recipients,
            amount,
            from,
        } => {
            let session = open_session(&settings, &range)?;
            let chain = ChainContext::connect(&settings, asset.solana)?;
            let selector = chain.asset(asset.token.as_deref()).await?;
            let family = chain.family();
            let source = source_account(&session, from)?;
            let body = read_recipients(&recipients)?;
            let default_amount =
                parse_optional_amount(amount.as_deref(), selector.decimals(family))?;
            let client = chain.client();
            let available = source_balance(&client, &source, &selector).await;
            let plan = plan_distribution(source, family, &selector, &body, default_amount, available);
            run_plan(&settings, client, plan).await?;
        }
        Command::Airdrop {
            range,
            asset,
            recipients,
            amount,
            from,
        } => {
            let session = open_session(&settings, &range)?;
            let chain = ChainContext::connect(&settings, asset.solana)?;
            let selector = chain.asset(asset.token.as_deref()).await?;
            let family = chain.family();
            let source = source_account(&session, from)?;
            let body = read_recipients(&recipients)?;
            let default_amount =
                parse_optional_amount(amount.as_deref(), selector.decimals(family))?;
            let chunk_size = match family {
                ChainFamily::Evm => settings.evm_airdrop_chunk_size,
                ChainFamily::Solana => settings.solana_chunk_size,
            };
            let client = chain.client();
            let available = source_balance(&client, &source, &selector).await;
            let plan = plan_airdrop(
                source,
                family,
                &selector,
                &body,
                default_amount,
                chunk_size,
                available,
            );
            run_plan(&settings, client, plan).await?;
        }
        Command::Trade {
            range,
            token,
            side,
            mode,
            amount,
            reserve,
            percent,
            fee_on_transfer,
        } => {
            let session = open_session(&settings, &range)?;
            run_trade(
                &settings,
                &session,
                TradeArgs {
                    token,
                    side,
                    mode,
                    amount,
                    reserve,
                    percent,
                    fee_on_transfer,
                },
            )
            .await?;
        }
        Command::VolumeBot {
            range,
            token,
            cycles,
            seed,
        } => {
            let session = open_session(&settings, &range)?;
            run_volume_bot(&settings, &session, &token, cycles, seed).await?;
        }
    }

    Ok(())
}
