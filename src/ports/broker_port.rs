//! Order execution port trait for live trading.

use crate::domain::error::QuorumError;

/// An executed trade. `quantity` is signed: positive bought, negative sold.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub ticker: String,
    pub quantity: f64,
    pub price: f64,
}

pub trait BrokerPort: Send + Sync {
    fn submit(&self, ticker: &str, quantity: f64) -> Result<Fill, QuorumError>;
}
