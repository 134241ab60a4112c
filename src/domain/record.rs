//! Persisted records exchanged with the profile store.

use std::collections::BTreeMap;

use crate::domain::binding::{BindingId, PluginJob};
use crate::domain::interval::SamplingInterval;
use crate::domain::settings::Settings;
use crate::domain::status::ProfileStatus;

pub type ProfileId = i64;

/// Ticker -> held quantity.
pub type Wallet = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub name: String,
    pub status: ProfileStatus,
    pub balance: f64,
    pub wallet: Wallet,
    pub paper_balance: f64,
    pub paper_wallet: Wallet,
    pub buy_limit: f64,
    pub sell_limit: f64,
    pub schedule_seconds: u64,
}

impl ProfileRecord {
    /// A new, not yet persisted, inactive profile.
    pub fn draft(name: impl Into<String>, balance: f64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            status: ProfileStatus::Inactive,
            balance,
            wallet: Wallet::new(),
            paper_balance: balance,
            paper_wallet: Wallet::new(),
            buy_limit: 0.5,
            sell_limit: -0.5,
            schedule_seconds: 3600,
        }
    }
}

/// Partial update of a profile; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub status: Option<ProfileStatus>,
    pub balance: Option<f64>,
    pub wallet: Option<Wallet>,
    pub paper_balance: Option<f64>,
    pub paper_wallet: Option<Wallet>,
    pub buy_limit: Option<f64>,
    pub sell_limit: Option<f64>,
}

impl ProfileUpdate {
    pub fn status(status: ProfileStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, record: &mut ProfileRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(balance) = self.balance {
            record.balance = balance;
        }
        if let Some(wallet) = &self.wallet {
            record.wallet = wallet.clone();
        }
        if let Some(balance) = self.paper_balance {
            record.paper_balance = balance;
        }
        if let Some(wallet) = &self.paper_wallet {
            record.paper_wallet = wallet.clone();
        }
        if let Some(limit) = self.buy_limit {
            record.buy_limit = limit;
        }
        if let Some(limit) = self.sell_limit {
            record.sell_limit = limit;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileKey {
    Id(ProfileId),
    Name(String),
}

impl std::fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKey::Id(id) => write!(f, "#{}", id),
            ProfileKey::Name(name) => write!(f, "'{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    pub id: BindingId,
    pub profile_id: ProfileId,
    pub name: String,
    pub weight: f64,
    pub ticker: String,
    pub interval: SamplingInterval,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginRecord {
    pub id: BindingId,
    pub profile_id: ProfileId,
    pub name: String,
    pub job: PluginJob,
    pub settings: Settings,
}
