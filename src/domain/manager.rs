//! Process-level owner of every profile.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::domain::error::QuorumError;
use crate::domain::profile::{validate_limits, Profile, ProfileDeps};
use crate::domain::record::{ProfileId, ProfileKey, ProfileRecord};
use crate::domain::status::ProfileStatus;

pub struct ProfileManager {
    deps: ProfileDeps,
    profiles: Mutex<BTreeMap<ProfileId, Arc<Profile>>>,
}

impl ProfileManager {
    pub fn new(deps: ProfileDeps) -> Self {
        Self {
            deps,
            profiles: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load every stored profile and resume the ones persisted as ACTIVE or
    /// PAPER_TRADING.
    pub fn load(deps: ProfileDeps) -> Result<Self, QuorumError> {
        let manager = Self::new(deps);
        for record in manager.deps.store.list_profiles()? {
            let status = record.status;
            let profile = manager.build(record)?;
            if matches!(status, ProfileStatus::Active | ProfileStatus::PaperTrading) {
                if let Err(e) = profile.change_status(status, false) {
                    error!("{}: could not resume as {}: {}", profile.name(), status, e);
                }
            }
            manager.profiles().insert(profile.id(), profile);
        }
        info!("loaded {} profiles", manager.profiles().len());
        Ok(manager)
    }

    fn profiles(&self) -> MutexGuard<'_, BTreeMap<ProfileId, Arc<Profile>>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build(&self, record: ProfileRecord) -> Result<Arc<Profile>, QuorumError> {
        let components = self.deps.store.list_components(record.id)?;
        let plugins = self.deps.store.list_plugins(record.id)?;
        Profile::from_records(record, components, plugins, self.deps.clone())
    }

    /// Persist and register a new profile. Names are unique.
    pub fn create(&self, record: ProfileRecord) -> Result<Arc<Profile>, QuorumError> {
        validate_limits(record.buy_limit, record.sell_limit)?;
        if record.schedule_seconds == 0 {
            return Err(QuorumError::ConfigInvalid {
                section: "profile".into(),
                key: "schedule_seconds".into(),
                reason: "schedule_seconds must be positive".into(),
            });
        }
        let key = ProfileKey::Name(record.name.clone());
        if self.deps.store.get_profile(&key)?.is_some() {
            return Err(QuorumError::ConfigInvalid {
                section: "profile".into(),
                key: "name".into(),
                reason: format!("a profile named {} already exists", key),
            });
        }
        let stored = self.deps.store.create_profile(&record)?;
        let profile = self.build(stored)?;
        info!("created profile {} ({})", profile.name(), profile.id());
        self.profiles().insert(profile.id(), profile.clone());
        Ok(profile)
    }

    pub fn get(&self, key: &ProfileKey) -> Result<Arc<Profile>, QuorumError> {
        let profiles = self.profiles();
        let found = match key {
            ProfileKey::Id(id) => profiles.get(id),
            ProfileKey::Name(name) => profiles.values().find(|p| p.name() == name),
        };
        found.cloned().ok_or_else(|| QuorumError::ProfileNotFound {
            key: key.to_string(),
        })
    }

    pub fn list(&self) -> Vec<Arc<Profile>> {
        self.profiles().values().cloned().collect()
    }

    /// Delete a profile with its bindings, then stop its scheduler. A
    /// profile the store refuses to delete stays registered and keeps its
    /// scheduler.
    pub fn delete(&self, key: &ProfileKey) -> Result<(), QuorumError> {
        let profile = self.get(key)?;
        if !self.deps.store.delete_profile(profile.id())? {
            return Err(QuorumError::persistence(
                format!("deletion of profile {}", profile.name()),
                "no row deleted",
            ));
        }
        profile.stop_scheduler();
        self.profiles().remove(&profile.id());
        info!("deleted profile {}", profile.name());
        Ok(())
    }

    /// Deactivate every profile, stop the schedulers and wait up to `grace`
    /// for their threads. Returns the names of threads still running.
    pub fn shutdown(&self, grace: Duration) -> Vec<String> {
        let profiles = self.list();
        for profile in &profiles {
            if let Err(e) = profile.change_status(ProfileStatus::Inactive, false) {
                warn!("{}: deactivation during shutdown failed: {}", profile.name(), e);
            }
            profile.stop_scheduler();
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline && !profiles.iter().all(|p| p.scheduler_finished()) {
            thread::sleep(Duration::from_millis(10));
        }

        let mut stragglers = Vec::new();
        for profile in &profiles {
            if profile.scheduler_finished() {
                profile.reap_scheduler();
            } else {
                warn!("{}: scheduler still running after {:?}", profile.name(), grace);
                stragglers.push(profile.name().to_string());
            }
        }
        info!("shutdown complete, {} stragglers", stragglers.len());
        stragglers
    }
}
