//! Broker that fills every order immediately at the feed's latest price.
//!
//! Stands in for a brokerage connection: no slippage, no partial fills.

use std::sync::Arc;

use log::info;

use crate::domain::error::QuorumError;
use crate::ports::broker_port::{BrokerPort, Fill};
use crate::ports::feed_port::PriceFeedPort;

pub struct FeedPriceBroker {
    feed: Arc<dyn PriceFeedPort>,
}

impl FeedPriceBroker {
    pub fn new(feed: Arc<dyn PriceFeedPort>) -> Self {
        Self { feed }
    }
}

impl BrokerPort for FeedPriceBroker {
    fn submit(&self, ticker: &str, quantity: f64) -> Result<Fill, QuorumError> {
        if !quantity.is_finite() || quantity == 0.0 {
            return Err(QuorumError::Broker {
                ticker: ticker.to_string(),
                reason: format!("invalid quantity {}", quantity),
            });
        }
        let price = self.feed.latest_price(ticker)?;
        info!("broker fill {} {:+.6} @ {:.4}", ticker, quantity, price);
        Ok(Fill {
            ticker: ticker.to_string(),
            quantity,
            price,
        })
    }
}
