//! tierstake CLI - operator tool for a local staking deployment.
//!
//! Usage:
//!   tierstake init
//!   tierstake fund alice 1000
//!   tierstake attest 100
//!   tierstake stake alice 1000 --tier standard
//!   tierstake --now 1712960001 convert alice
//!   tierstake status

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use std::path::PathBuf;

use tierstake::cli::{expand_path, CliApp, CliConfig, OutputFormat, CONFIG_FILE};
use tierstake::core::{EngineParams, Tier, YieldShortfallPolicy};
use tierstake::protocol::ProtocolEvent;
use tierstake::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI STRUCTURE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "tierstake")]
#[command(author = "tierstake Team")]
#[command(version)]
#[command(about = "Tiered staking and reserve-gated redemption", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(short, long, global = true, env = "TIERSTAKE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Operator identity (hex address or label) for admin commands
    #[arg(long, global = true, env = "TIERSTAKE_OPERATOR")]
    operator: Option<String>,

    /// Pin the clock to this unix timestamp
    #[arg(long, global = true)]
    now: Option<u64>,

    /// Output format (text, json, json-pretty, minimal)
    #[arg(short, long, global = true)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new local deployment
    Init(InitArgs),

    /// Credit an account with the staked value asset (local faucet)
    Fund {
        /// Account (hex address or label)
        account: String,
        /// Amount in smallest units
        amount: u64,
    },

    /// Publish a reserve attestation
    Attest {
        /// Total vaulted units backing the issued asset
        units: u64,
        /// Attestation time (defaults to now)
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Open a locked position
    Stake {
        /// Position owner
        owner: String,
        /// Gross amount, before the deposit fee
        amount: u64,
        /// Lock tier (standard, premium, elite)
        #[arg(short, long, default_value = "standard")]
        tier: Tier,
    },

    /// Convert an unlocked position into one backed unit plus yield
    Convert {
        /// Position owner
        owner: String,
    },

    /// Exit a locked position early, paying the penalty
    Withdraw {
        /// Position owner
        owner: String,
    },

    /// Show a position with projections
    Position {
        /// Position owner
        owner: String,
    },

    /// Show treasury, parameters and reserve coverage
    Status,

    /// List recent events
    Events {
        /// Maximum number of events
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only events about this account
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Yield pool operations
    #[command(subcommand)]
    Yield(YieldCommands),

    /// Administrative operations
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Args)]
struct InitArgs {
    /// Overwrite an existing deployment
    #[arg(short, long)]
    force: bool,
    /// Deposit fee in basis points
    #[arg(long)]
    fee_bps: Option<u64>,
    /// Early-exit penalty in basis points
    #[arg(long)]
    penalty_bps: Option<u64>,
    /// Required reserve coverage in basis points
    #[arg(long)]
    coverage_bps: Option<u64>,
    /// Maximum attestation age in seconds
    #[arg(long)]
    staleness_secs: Option<u64>,
    /// Annual base yield in basis points
    #[arg(long)]
    base_yield_bps: Option<u64>,
    /// Behavior when the yield pool is short
    #[arg(long, value_enum)]
    yield_shortfall: Option<ShortfallArg>,
    /// Load parameters from a JSON file
    #[arg(long)]
    params: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShortfallArg {
    Reject,
    CapToPool,
}

impl From<ShortfallArg> for YieldShortfallPolicy {
    fn from(arg: ShortfallArg) -> Self {
        match arg {
            ShortfallArg::Reject => YieldShortfallPolicy::Reject,
            ShortfallArg::CapToPool => YieldShortfallPolicy::CapToPool,
        }
    }
}

#[derive(Subcommand)]
enum YieldCommands {
    /// Add to the pooled yield balance
    Deposit {
        /// Amount in smallest units
        amount: u64,
        /// Funding account (defaults to the operator)
        #[arg(long)]
        from: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Set the deposit fee (≤ 500 bps)
    SetFee {
        /// Basis points
        bps: u64,
    },
    /// Set the early-exit penalty (≤ 2000 bps)
    SetPenalty {
        /// Basis points
        bps: u64,
    },
    /// Set the required reserve coverage (≥ 10000 bps)
    SetCoverage {
        /// Basis points
        bps: u64,
    },
    /// Set the attestation staleness threshold
    SetStaleness {
        /// Seconds
        secs: u64,
    },
    /// Withdraw accrued fees
    WithdrawFees {
        /// Amount in smallest units
        amount: u64,
        /// Recipient (defaults to the operator)
        #[arg(long)]
        to: Option<String>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        match e.downcast_ref::<tierstake::Error>() {
            Some(err) => eprintln!(
                "{} [{}] {}",
                style("Error:").red().bold(),
                err.code(),
                err
            ),
            None => eprintln!("{} {}", style("Error:").red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let app = build_app(cli)?;

    match &cli.command {
        Commands::Init(args) => cmd_init(&app, args, term),
        Commands::Fund { account, amount } => cmd_fund(&app, account, *amount, term),
        Commands::Attest { units, timestamp } => cmd_attest(&app, *units, *timestamp, term),
        Commands::Stake {
            owner,
            amount,
            tier,
        } => cmd_stake(&app, owner, *amount, *tier, term),
        Commands::Convert { owner } => cmd_convert(&app, owner, term),
        Commands::Withdraw { owner } => cmd_withdraw(&app, owner, term),
        Commands::Position { owner } => cmd_position(&app, owner),
        Commands::Status => cmd_status(&app),
        Commands::Events { limit, account } => cmd_events(&app, *limit, account.as_deref()),
        Commands::Yield(cmd) => cmd_yield(&app, cmd, term),
        Commands::Admin(cmd) => cmd_admin(&app, cmd, term),
    }
}

/// Config file in the data directory, then environment, then flags
fn build_app(cli: &Cli) -> anyhow::Result<CliApp> {
    let mut config = CliConfig::from_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    let config_path = expand_path(&config.data_dir).join(CONFIG_FILE);
    if config_path.exists() {
        let stored = CliConfig::load(&config_path)?;
        config.format = stored.format;
        config.color = stored.color;
        if std::env::var("TIERSTAKE_OPERATOR").is_err() {
            config.operator = stored.operator;
        }
    }

    if let Some(operator) = &cli.operator {
        config.operator = operator.clone();
    }
    config.validate()?;

    let mut app = CliApp::new(config).with_now(cli.now);
    if let Some(format) = cli.output {
        app = app.with_format(format);
    }
    Ok(app)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(app: &CliApp, args: &InitArgs, term: &Term) -> anyhow::Result<()> {
    let mut params = match &args.params {
        Some(path) => EngineParams::load(path)?,
        None => EngineParams::default(),
    }
    .apply_env()?;

    if let Some(v) = args.fee_bps {
        params.fee_bps = v;
    }
    if let Some(v) = args.penalty_bps {
        params.penalty_bps = v;
    }
    if let Some(v) = args.coverage_bps {
        params.coverage_bps = v;
    }
    if let Some(v) = args.staleness_secs {
        params.staleness_threshold_secs = v;
    }
    if let Some(v) = args.base_yield_bps {
        params.base_yield_rate_bps = v;
    }
    if let Some(v) = args.yield_shortfall {
        params.yield_shortfall = v.into();
    }
    params.validate()?;

    let deployment = app.init(params, args.force)?;

    if app.output().format().is_json() {
        app.output().emit(&app.output().render_record("Deployment", &serde_json::json!({
            "data_dir": app.data_dir(),
            "engine": deployment.engine().address(),
            "admin": app.config().operator_address(),
            "params": deployment.engine().params()?,
        })));
        return Ok(());
    }

    let _ = term.write_line(&format!(
        "{} Deployment created at {}",
        style("✓").green(),
        style(app.data_dir().display()).cyan()
    ));
    let _ = term.write_line(&format!(
        "  Engine: {}",
        style(deployment.engine().address()).yellow()
    ));
    let _ = term.write_line(&format!(
        "  Admin:  {} ({})",
        style(app.config().operator_address()).yellow(),
        app.config().operator
    ));
    Ok(())
}

fn cmd_fund(app: &CliApp, account: &str, amount: u64, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let address = Address::parse(account);
    let balance = deployment.fund(&address, amount)?;
    deployment.save()?;

    report(app, term, &format!("Funded {} with {}", account, amount), &serde_json::json!({
        "account": address,
        "amount": amount,
        "balance": balance,
    }));
    Ok(())
}

fn cmd_attest(app: &CliApp, units: u64, timestamp: Option<u64>, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let attestation = deployment.attest(units, timestamp)?;
    deployment.save()?;

    report(
        app,
        term,
        &format!(
            "Attested {} vaulted units at {}",
            units,
            format_time(attestation.last_update_timestamp)
        ),
        &attestation,
    );
    Ok(())
}

fn cmd_stake(app: &CliApp, owner: &str, amount: u64, tier: Tier, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let address = Address::parse(owner);
    let result = deployment.engine().stake(&address, amount, tier)?;
    deployment.save()?;

    report(
        app,
        term,
        &format!(
            "Staked {} for {} ({} fee), unlocks {}",
            result.position.deposited_amount,
            owner,
            result.fee,
            format_time(result.position.unlock_time)
        ),
        &result,
    );
    Ok(())
}

fn cmd_convert(app: &CliApp, owner: &str, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let address = Address::parse(owner);
    let result = deployment.engine().convert(&address)?;
    deployment.save()?;

    report(
        app,
        term,
        &format!(
            "Converted position of {}: {} backed unit, {} yield",
            owner, result.backed_units, result.yield_paid
        ),
        &result,
    );
    if result.yield_shortfall > 0 {
        app.output().emit(&app.output().render_warning(&format!(
            "Yield pool was short by {}",
            result.yield_shortfall
        )));
    }
    Ok(())
}

fn cmd_withdraw(app: &CliApp, owner: &str, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let address = Address::parse(owner);
    let result = deployment.engine().emergency_withdraw(&address)?;
    deployment.save()?;

    report(
        app,
        term,
        &format!(
            "Withdrew {} to {} ({} penalty retained)",
            result.payout, owner, result.penalty
        ),
        &result,
    );
    Ok(())
}

fn cmd_position(app: &CliApp, owner: &str) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let view = deployment.engine().position_view(&Address::parse(owner))?;
    app.output().emit(&app.output().render_record("Position", &view));
    Ok(())
}

fn cmd_status(app: &CliApp) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let engine = deployment.engine();
    let attestation = deployment.attestation()?;

    let status = serde_json::json!({
        "now": format_time(deployment.now()),
        "engine": engine.address(),
        "open_positions": engine.open_positions()?,
        "treasury": engine.treasury_summary()?,
        "params": engine.params()?,
        "reserve": {
            "total_vaulted_units": attestation.total_vaulted_units,
            "last_update": format_time(attestation.last_update_timestamp),
            "healthy": engine.is_oracle_healthy()?,
            "coverage_ratio_bps": engine.coverage_ratio()?,
        },
        "state_hash": engine.state_hash()?.to_hex(),
    });
    app.output().emit(&app.output().render_record("Protocol Status", &status));
    Ok(())
}

fn cmd_events(app: &CliApp, limit: usize, account: Option<&str>) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let events = match account {
        Some(account) => {
            let mut events = deployment.engine().events_for(&Address::parse(account))?;
            let skip = events.len().saturating_sub(limit);
            events.drain(..skip);
            events
        }
        None => deployment.engine().recent_events(limit)?,
    };

    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                format_time(e.timestamp()),
                e.event_type().to_string(),
                e.subject().short(),
                describe(e),
            ]
        })
        .collect();
    app.output()
        .emit(&app.output().render_table(&["time", "event", "subject", "details"], &rows));
    Ok(())
}

fn cmd_yield(app: &CliApp, cmd: &YieldCommands, term: &Term) -> anyhow::Result<()> {
    match cmd {
        YieldCommands::Deposit { amount, from } => {
            let deployment = app.open()?;
            let caller = caller_or_operator(app, from.as_deref());
            let pool = deployment.engine().deposit_yield(&caller, *amount)?;
            deployment.save()?;

            report(app, term, &format!("Deposited {} yield, pool now {}", amount, pool), &serde_json::json!({
                "from": caller,
                "amount": amount,
                "pool_balance": pool,
            }));
        }
    }
    Ok(())
}

fn cmd_admin(app: &CliApp, cmd: &AdminCommands, term: &Term) -> anyhow::Result<()> {
    let deployment = app.open()?;
    let engine = deployment.engine();
    let operator = app.config().operator_address();

    let message = match cmd {
        AdminCommands::SetFee { bps } => {
            engine.set_fee_bps(&operator, *bps)?;
            format!("Deposit fee set to {} bps", bps)
        }
        AdminCommands::SetPenalty { bps } => {
            engine.set_penalty_bps(&operator, *bps)?;
            format!("Early-exit penalty set to {} bps", bps)
        }
        AdminCommands::SetCoverage { bps } => {
            engine.set_coverage_bps(&operator, *bps)?;
            format!("Required coverage set to {} bps", bps)
        }
        AdminCommands::SetStaleness { secs } => {
            engine.set_staleness_threshold(&operator, *secs)?;
            format!("Staleness threshold set to {}s", secs)
        }
        AdminCommands::WithdrawFees { amount, to } => {
            let to = caller_or_operator(app, to.as_deref());
            let remaining = engine.withdraw_fees(&operator, &to, *amount)?;
            format!("Withdrew {} in fees to {}, {} left", amount, to.short(), remaining)
        }
    };
    deployment.save()?;

    report(app, term, &message, &engine.params()?);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Styled one-liner for text output, the full record otherwise
fn report<T: serde::Serialize>(app: &CliApp, term: &Term, message: &str, data: &T) {
    match app.output().format() {
        OutputFormat::Text => {
            let _ = term.write_line(&format!("{} {}", style("✓").green(), message));
        }
        _ => app.output().emit(&app.output().render_record(message, data)),
    }
}

fn caller_or_operator(app: &CliApp, account: Option<&str>) -> Address {
    account
        .map(Address::parse)
        .unwrap_or_else(|| app.config().operator_address())
}

fn format_time(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn describe(event: &ProtocolEvent) -> String {
    match event {
        ProtocolEvent::Staked(e) => format!(
            "{} tier, {} deposited ({} fee), unlocks {}",
            e.tier,
            e.deposited_amount,
            e.fee,
            format_time(e.unlock_time)
        ),
        ProtocolEvent::Converted(e) => format!(
            "{} backed unit, {} yield, coverage {} bps",
            e.backed_units, e.yield_paid, e.coverage_ratio_bps
        ),
        ProtocolEvent::EarlyWithdraw(e) => {
            format!("{} paid, {} penalty", e.payout, e.penalty)
        }
        ProtocolEvent::YieldDeposited(e) => {
            format!("{} added, pool {}", e.amount, e.pool_balance)
        }
        ProtocolEvent::FeesWithdrawn(e) => {
            format!("{} withdrawn, {} left", e.amount, e.remaining_fees)
        }
        ProtocolEvent::ParameterChanged(e) => {
            format!("{}: {} -> {}", e.parameter, e.old_value, e.new_value)
        }
    }
}

