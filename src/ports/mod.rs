//! Port traits the domain depends on; implementations live in `adapters`.

pub mod broker_port;
pub mod config_port;
pub mod feed_port;
pub mod store_port;
