//! Configuration validation and typed profile/backtest settings.
//!
//! A profile config file looks like:
//!
//! ```ini
//! [profile]
//! name = swing
//! balance = 10000
//! buy_limit = 0.5
//! sell_limit = -0.5
//! schedule_seconds = 3600
//! status = paper
//!
//! [component:trend]
//! name = ema
//! ticker = BTC
//! interval = 1h
//! weight = 1.0
//! settings = {"period": 20}
//!
//! [plugin:order]
//! name = mean_threshold
//!
//! [backtest]
//! partitions = 4
//! candles = 500
//! ```

use crate::domain::backtest::{BacktestRequest, Horizon};
use crate::domain::binding::PluginJob;
use crate::domain::error::QuorumError;
use crate::domain::interval::SamplingInterval;
use crate::domain::profile::validate_limits;
use crate::domain::record::ProfileRecord;
use crate::domain::registry::Registry;
use crate::domain::settings::{self, Settings};
use crate::domain::status::ProfileStatus;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const COMPONENT_PREFIX: &str = "component:";
pub const PLUGIN_PREFIX: &str = "plugin:";

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    pub section: String,
    pub name: String,
    pub ticker: String,
    pub interval: SamplingInterval,
    pub weight: f64,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    pub section: String,
    pub name: String,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileConfig {
    /// Draft record; `status` stays INACTIVE until the profile is started.
    pub record: ProfileRecord,
    /// Status the `run` command moves the profile to.
    pub target_status: ProfileStatus,
    pub components: Vec<ComponentConfig>,
    pub plugins: Vec<PluginConfig>,
}

pub fn validate_profile_config(config: &dyn ConfigPort, registry: &Registry) -> Result<(), QuorumError> {
    let profile = build_profile_config(config)?;
    validate_bindings(&profile, registry)
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), QuorumError> {
    build_backtest_request(config, 1.0).map(|_| ())
}

pub fn build_profile_config(config: &dyn ConfigPort) -> Result<ProfileConfig, QuorumError> {
    let name = required(config, "profile", "name")?;
    let balance = config.get_double("profile", "balance", 0.0);
    if !balance.is_finite() || balance <= 0.0 {
        return Err(invalid("profile", "balance", "balance must be positive"));
    }

    let mut record = ProfileRecord::draft(name, balance);
    record.paper_balance = config.get_double("profile", "paper_balance", balance);
    if !record.paper_balance.is_finite() || record.paper_balance < 0.0 {
        return Err(invalid("profile", "paper_balance", "paper_balance must be non-negative"));
    }
    record.buy_limit = config.get_double("profile", "buy_limit", record.buy_limit);
    record.sell_limit = config.get_double("profile", "sell_limit", record.sell_limit);
    validate_limits(record.buy_limit, record.sell_limit)?;

    let schedule = config.get_int("profile", "schedule_seconds", record.schedule_seconds as i64);
    if schedule < 1 {
        return Err(invalid("profile", "schedule_seconds", "schedule_seconds must be at least 1"));
    }
    record.schedule_seconds = schedule as u64;

    let target_status = match config.get_string("profile", "status") {
        Some(s) => ProfileStatus::parse(&s)?,
        None => ProfileStatus::PaperTrading,
    };
    if matches!(target_status, ProfileStatus::Backtesting | ProfileStatus::Error(_)) {
        return Err(invalid(
            "profile",
            "status",
            &format!("cannot start a profile as {}", target_status),
        ));
    }

    let mut components = Vec::new();
    let mut plugins = Vec::new();
    for section in config.sections() {
        if section.starts_with(COMPONENT_PREFIX) {
            components.push(build_component_config(config, &section)?);
        } else if section.starts_with(PLUGIN_PREFIX) {
            plugins.push(PluginConfig {
                name: required(config, &section, "name")?,
                settings: section_settings(config, &section)?,
                section,
            });
        }
    }
    if components.is_empty() {
        return Err(QuorumError::ConfigMissing {
            section: format!("{}<name>", COMPONENT_PREFIX),
            key: "name".into(),
        });
    }

    Ok(ProfileConfig {
        record,
        target_status,
        components,
        plugins,
    })
}

fn build_component_config(config: &dyn ConfigPort, section: &str) -> Result<ComponentConfig, QuorumError> {
    let interval_label = required(config, section, "interval")?;
    let interval = interval_label
        .parse::<SamplingInterval>()
        .map_err(|e| invalid(section, "interval", &e.to_string()))?;
    let weight = config.get_double(section, "weight", 1.0);
    if !weight.is_finite() {
        return Err(invalid(section, "weight", "weight must be finite"));
    }
    Ok(ComponentConfig {
        section: section.to_string(),
        name: required(config, section, "name")?,
        ticker: required(config, section, "ticker")?.to_uppercase(),
        interval,
        weight,
        settings: section_settings(config, section)?,
    })
}

fn section_settings(config: &dyn ConfigPort, section: &str) -> Result<Settings, QuorumError> {
    let text = config.get_string(section, "settings").unwrap_or_default();
    settings::parse(&text).map_err(|e| invalid(section, "settings", &e.to_string()))
}

/// Every name must be registered and exactly one plugin must create orders.
pub fn validate_bindings(profile: &ProfileConfig, registry: &Registry) -> Result<(), QuorumError> {
    for c in &profile.components {
        registry.build_component(&c.name, &c.settings)?;
    }
    let mut order_plugins = 0;
    for p in &profile.plugins {
        if registry.plugin_job(&p.name)? == PluginJob::CreateOrder {
            order_plugins += 1;
        }
        registry.build_plugin(&p.name, &p.settings)?;
    }
    match order_plugins {
        0 => Err(QuorumError::MissingOrderPlugin {
            profile: profile.record.name.clone(),
        }),
        1 => Ok(()),
        _ => Err(invalid(
            "plugin",
            "name",
            "only one CREATE_ORDER plugin may be configured",
        )),
    }
}

/// `[backtest]`: `partitions` (default 1), one of `days` or `candles`, and
/// `starting_balance` (defaults to `default_balance`).
pub fn build_backtest_request(config: &dyn ConfigPort, default_balance: f64) -> Result<BacktestRequest, QuorumError> {
    let partitions = config.get_int("backtest", "partitions", 1);
    if partitions < 1 {
        return Err(invalid("backtest", "partitions", "partitions must be at least 1"));
    }

    let days = config.get_int("backtest", "days", 0);
    let candles = config.get_int("backtest", "candles", 0);
    let horizon = match (days, candles) {
        (d, 0) if d > 0 => Horizon::Days(d as u32),
        (0, c) if c > 0 => Horizon::Candles(c as usize),
        (0, 0) => {
            return Err(QuorumError::ConfigMissing {
                section: "backtest".into(),
                key: "days".into(),
            });
        }
        _ => {
            return Err(invalid(
                "backtest",
                "days",
                "set exactly one positive value of days or candles",
            ));
        }
    };

    let starting_balance = config.get_double("backtest", "starting_balance", default_balance);
    if !starting_balance.is_finite() || starting_balance <= 0.0 {
        return Err(invalid(
            "backtest",
            "starting_balance",
            "starting_balance must be positive",
        ));
    }

    Ok(BacktestRequest {
        starting_balance,
        partitions: partitions as usize,
        horizon,
    })
}

/// `[data] dir`: directory holding the `<TICKER>_<interval>.csv` files.
pub fn build_data_dir(config: &dyn ConfigPort) -> Result<PathBuf, QuorumError> {
    Ok(PathBuf::from(required(config, "data", "dir")?))
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, QuorumError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(QuorumError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> QuorumError {
    QuorumError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
