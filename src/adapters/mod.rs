//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod feed_price_broker;
pub mod file_config_adapter;
pub mod memory_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
