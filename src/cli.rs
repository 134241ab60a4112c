//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::warn;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvPriceFeed;
use crate::adapters::feed_price_broker::FeedPriceBroker;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_store::MemoryStore;
use crate::domain::backtest::BacktestReport;
use crate::domain::config_validation::{
    build_backtest_request, build_data_dir, build_profile_config, validate_backtest_config,
    validate_bindings, ProfileConfig,
};
use crate::domain::error::QuorumError;
use crate::domain::manager::ProfileManager;
use crate::domain::profile::{describe_wallet, Profile, ProfileDeps};
use crate::domain::record::ProfileKey;
use crate::domain::registry::Registry;
use crate::domain::status::ProfileStatus;
use crate::ports::config_port::ConfigPort;
use crate::ports::feed_port::PriceFeedPort;
use crate::ports::store_port::ProfileStore;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "quorum", about = "Consensus-scored trading profiles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay price history through a profile
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the net-worth history as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate a profile once and trade the resulting order
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start a profile's scheduler
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Validate a profile configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, output } => run_backtest(&config, output.as_ref()),
        Command::Evaluate { config } => run_evaluate(&config),
        Command::Run { config, duration } => run_profile(&config, duration.map(Duration::from_secs)),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = QuorumError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Profile store named by the config: SQLite when a `[sqlite]` section is
/// present, otherwise an in-process store.
pub fn open_store(config: &dyn ConfigPort) -> Result<Arc<dyn ProfileStore>, QuorumError> {
    if config.sections().iter().any(|s| s == "sqlite") {
        #[cfg(feature = "sqlite")]
        {
            use crate::adapters::sqlite_adapter::SqliteStore;
            return Ok(Arc::new(SqliteStore::from_config(config)?));
        }
        #[cfg(not(feature = "sqlite"))]
        {
            return Err(QuorumError::ConfigInvalid {
                section: "sqlite".into(),
                key: "path".into(),
                reason: "built without the sqlite feature".into(),
            });
        }
    }
    Ok(Arc::new(MemoryStore::new()))
}

pub fn build_deps(config: &dyn ConfigPort, store: Arc<dyn ProfileStore>) -> Result<ProfileDeps, QuorumError> {
    let feed: Arc<dyn PriceFeedPort> = Arc::new(CsvPriceFeed::new(build_data_dir(config)?));
    Ok(ProfileDeps {
        store,
        broker: Arc::new(FeedPriceBroker::new(feed.clone())),
        feed,
        registry: Arc::new(Registry::with_builtins()),
    })
}

/// Find the configured profile in the manager, or create it with the
/// configured bindings. A profile created here is removed again if any
/// binding is refused.
pub fn install_profile(manager: &ProfileManager, config: &ProfileConfig) -> Result<Arc<Profile>, QuorumError> {
    let key = ProfileKey::Name(config.record.name.clone());
    if let Ok(profile) = manager.get(&key) {
        eprintln!("Using stored profile {} ({})", profile.name(), profile.id());
        return Ok(profile);
    }

    let profile = manager.create(config.record.clone())?;
    let bound = bind_all(&profile, config);
    if let Err(e) = bound {
        if let Err(cleanup) = manager.delete(&key) {
            warn!("could not remove half-built profile {}: {}", key, cleanup);
        }
        return Err(e);
    }
    Ok(profile)
}

fn bind_all(profile: &Profile, config: &ProfileConfig) -> Result<(), QuorumError> {
    for c in &config.components {
        profile.add_component(&c.name, c.weight, &c.ticker, c.interval, c.settings.clone())?;
    }
    for p in &config.plugins {
        profile.add_plugin(&p.name, p.settings.clone())?;
    }
    Ok(())
}

/// Load, validate and turn a config file into a profile config.
fn prepare(config_path: &PathBuf) -> Result<(FileConfigAdapter, ProfileConfig), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let profile_config = build_profile_config(&adapter).map_err(|e| report(&e))?;
    let registry = Registry::with_builtins();
    validate_bindings(&profile_config, &registry).map_err(|e| {
        let code = report(&e);
        match e {
            QuorumError::UnknownComponent { .. } => {
                eprintln!("available components: {}", registry.component_names().join(", "));
            }
            QuorumError::UnknownPlugin { .. } => {
                eprintln!("available plugins: {}", registry.plugin_names().join(", "));
            }
            _ => {}
        }
        code
    })?;
    Ok((adapter, profile_config))
}

fn report(e: &QuorumError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

fn run_backtest(config_path: &PathBuf, output_path: Option<&PathBuf>) -> ExitCode {
    // Stage 1: Load and validate config
    let (adapter, profile_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let request = match build_backtest_request(&adapter, profile_config.record.balance) {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    // Stage 2: Build an in-process profile; backtests never touch the stored one
    let deps = match build_deps(&adapter, Arc::new(MemoryStore::new())) {
        Ok(d) => d,
        Err(e) => return report(&e),
    };
    let manager = ProfileManager::new(deps);
    let profile = match install_profile(&manager, &profile_config) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };

    // Stage 3: Replay
    eprintln!(
        "Backtesting {} over {:?} in {} partitions",
        profile.name(),
        request.horizon,
        request.partitions
    );
    let result = profile.backtest(&request);
    manager.shutdown(SHUTDOWN_GRACE);
    let backtest_report = match result {
        Ok(r) => r,
        Err(e) => return report(&e),
    };

    // Stage 4: Output
    print_backtest(&backtest_report, request.starting_balance);
    if let Some(path) = output_path {
        if let Err(e) = write_history(path, &backtest_report, request.starting_balance) {
            return report(&e);
        }
        eprintln!("History written to {}", path.display());
    }
    ExitCode::SUCCESS
}

fn print_backtest(report: &BacktestReport, starting_balance: f64) {
    println!("partition\treturn");
    for (i, ratio) in report.history.entries().iter().enumerate() {
        println!("{}\t{:.6}", i + 1, ratio);
    }
    println!("starting balance: {:.2}", starting_balance);
    println!("final value:      {:.2}", report.final_value);
    println!("final cash:       {:.2}", report.final_ledger.balance);
    println!("final holdings:   {}", describe_wallet(&report.final_ledger.wallet));
    println!("total return:     {:.6}", report.history.total_return());
}

pub fn write_history(path: &PathBuf, report: &BacktestReport, starting_balance: f64) -> Result<(), QuorumError> {
    let body = serde_json::json!({
        "starting_balance": starting_balance,
        "final_value": report.final_value,
        "history": report.history.entries(),
        "final_wallet": report.final_ledger.wallet,
    });
    fs::write(path, serde_json::to_string_pretty(&body)?)?;
    Ok(())
}

fn run_evaluate(config_path: &PathBuf) -> ExitCode {
    let (adapter, profile_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let manager = match open_store(&adapter)
        .and_then(|store| build_deps(&adapter, store))
        .and_then(ProfileManager::load)
    {
        Ok(m) => m,
        Err(e) => return report(&e),
    };
    let profile = match install_profile(&manager, &profile_config) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };

    let target = profile_config.target_status;
    let result = profile
        .change_status(target, false)
        .and_then(|()| profile.evaluate());
    manager.shutdown(SHUTDOWN_GRACE);
    let order = match result {
        Ok(o) => o,
        Err(e) => return report(&e),
    };

    if order.is_empty() {
        println!("no order");
    }
    for (ticker, fraction) in order.iter() {
        println!("{}\t{:+.4}", ticker, fraction);
    }
    let snapshot = profile.snapshot();
    let ledger = match target {
        ProfileStatus::PaperTrading => &snapshot.paper,
        _ => &snapshot.live,
    };
    println!("cash:     {:.2}", ledger.balance);
    println!("holdings: {}", describe_wallet(&ledger.wallet));
    ExitCode::SUCCESS
}

fn run_profile(config_path: &PathBuf, duration: Option<Duration>) -> ExitCode {
    let (adapter, profile_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let manager = match open_store(&adapter)
        .and_then(|store| build_deps(&adapter, store))
        .and_then(ProfileManager::load)
    {
        Ok(m) => m,
        Err(e) => return report(&e),
    };
    let profile = match install_profile(&manager, &profile_config) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };

    if let Err(e) = profile.change_status(profile_config.target_status, true) {
        manager.shutdown(SHUTDOWN_GRACE);
        return report(&e);
    }
    eprintln!(
        "{} running as {} every {}s",
        profile.name(),
        profile.status(),
        profile_config.record.schedule_seconds
    );

    match duration {
        Some(d) => thread::sleep(d),
        None => loop {
            thread::park();
        },
    }

    let stragglers = manager.shutdown(SHUTDOWN_GRACE);
    if !stragglers.is_empty() {
        eprintln!("warning: schedulers still running: {}", stragglers.join(", "));
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let (adapter, profile_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if adapter.sections().iter().any(|s| s == "backtest") {
        if let Err(e) = validate_backtest_config(&adapter) {
            return report(&e);
        }
    }

    eprintln!("\nProfile: {}", profile_config.record.name);
    eprintln!(
        "  limits: buy {} / sell {}",
        profile_config.record.buy_limit, profile_config.record.sell_limit
    );
    eprintln!("  start as: {}", profile_config.target_status);
    eprintln!("\nComponents:");
    for c in &profile_config.components {
        eprintln!(
            "  [{}] {} on {} {} weight {}",
            c.section, c.name, c.ticker, c.interval, c.weight
        );
    }
    eprintln!("\nPlugins:");
    for p in &profile_config.plugins {
        eprintln!("  [{}] {}", p.section, p.name);
    }
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
