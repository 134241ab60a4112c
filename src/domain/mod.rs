//! Core domain types and logic.

pub mod ohlcv;
pub mod interval;
pub mod status;
pub mod settings;
pub mod record;
pub mod confidence;
pub mod component;
pub mod plugin;
pub mod binding;
pub mod registry;
pub mod scoring;
pub mod trade_agent;
pub mod scheduler;
pub mod backtest;
pub mod profile;
pub mod manager;
pub mod config_validation;
pub mod error;
