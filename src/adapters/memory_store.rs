//! In-process profile store, for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::binding::BindingId;
use crate::domain::error::QuorumError;
use crate::domain::record::{
    ComponentRecord, PluginRecord, ProfileId, ProfileKey, ProfileRecord, ProfileUpdate,
};
use crate::ports::store_port::ProfileStore;

#[derive(Default)]
struct Tables {
    next_id: i64,
    profiles: BTreeMap<ProfileId, ProfileRecord>,
    components: BTreeMap<BindingId, ComponentRecord>,
    plugins: BTreeMap<BindingId, PluginRecord>,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProfileStore for MemoryStore {
    fn create_profile(&self, record: &ProfileRecord) -> Result<ProfileRecord, QuorumError> {
        let mut tables = self.tables();
        if tables.profiles.values().any(|p| p.name == record.name) {
            return Err(QuorumError::DatabaseQuery {
                reason: format!("UNIQUE constraint failed: profiles.name ({})", record.name),
            });
        }
        let mut stored = record.clone();
        stored.id = tables.allocate();
        tables.profiles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn get_profile(&self, key: &ProfileKey) -> Result<Option<ProfileRecord>, QuorumError> {
        let tables = self.tables();
        Ok(match key {
            ProfileKey::Id(id) => tables.profiles.get(id).cloned(),
            ProfileKey::Name(name) => tables.profiles.values().find(|p| &p.name == name).cloned(),
        })
    }

    fn list_profiles(&self) -> Result<Vec<ProfileRecord>, QuorumError> {
        Ok(self.tables().profiles.values().cloned().collect())
    }

    fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        match tables.profiles.get_mut(&id) {
            Some(record) => {
                update.apply_to(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_profile(&self, id: ProfileId) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        tables.components.retain(|_, c| c.profile_id != id);
        tables.plugins.retain(|_, p| p.profile_id != id);
        Ok(tables.profiles.remove(&id).is_some())
    }

    fn create_component(&self, record: &ComponentRecord) -> Result<ComponentRecord, QuorumError> {
        let mut tables = self.tables();
        if !tables.profiles.contains_key(&record.profile_id) {
            return Err(QuorumError::DatabaseQuery {
                reason: format!("FOREIGN KEY constraint failed: profile {}", record.profile_id),
            });
        }
        let mut stored = record.clone();
        stored.id = tables.allocate();
        tables.components.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn get_component(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<ComponentRecord>, QuorumError> {
        Ok(self
            .tables()
            .components
            .get(&id)
            .filter(|c| c.profile_id == profile_id)
            .cloned())
    }

    fn list_components(&self, profile_id: ProfileId) -> Result<Vec<ComponentRecord>, QuorumError> {
        Ok(self
            .tables()
            .components
            .values()
            .filter(|c| c.profile_id == profile_id)
            .cloned()
            .collect())
    }

    fn update_component(&self, record: &ComponentRecord) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        match tables.components.get_mut(&record.id) {
            Some(existing) if existing.profile_id == record.profile_id => {
                *existing = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_component(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        if tables.components.get(&id).is_some_and(|c| c.profile_id == profile_id) {
            tables.components.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    fn create_plugin(&self, record: &PluginRecord) -> Result<PluginRecord, QuorumError> {
        let mut tables = self.tables();
        if !tables.profiles.contains_key(&record.profile_id) {
            return Err(QuorumError::DatabaseQuery {
                reason: format!("FOREIGN KEY constraint failed: profile {}", record.profile_id),
            });
        }
        let mut stored = record.clone();
        stored.id = tables.allocate();
        tables.plugins.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn get_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<PluginRecord>, QuorumError> {
        Ok(self
            .tables()
            .plugins
            .get(&id)
            .filter(|p| p.profile_id == profile_id)
            .cloned())
    }

    fn list_plugins(&self, profile_id: ProfileId) -> Result<Vec<PluginRecord>, QuorumError> {
        Ok(self
            .tables()
            .plugins
            .values()
            .filter(|p| p.profile_id == profile_id)
            .cloned()
            .collect())
    }

    fn update_plugin(&self, record: &PluginRecord) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        match tables.plugins.get_mut(&record.id) {
            Some(existing) if existing.profile_id == record.profile_id => {
                *existing = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError> {
        let mut tables = self.tables();
        if tables.plugins.get(&id).is_some_and(|p| p.profile_id == profile_id) {
            tables.plugins.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::binding::PluginJob;
    use crate::domain::interval::SamplingInterval;
    use crate::domain::settings;
    use crate::domain::status::ProfileStatus;

    fn component(profile_id: ProfileId) -> ComponentRecord {
        ComponentRecord {
            id: 0,
            profile_id,
            name: "ema".into(),
            weight: 1.0,
            ticker: "BTC".into(),
            interval: SamplingInterval::Hour1,
            settings: settings::empty(),
        }
    }

    #[test]
    fn profile_lifecycle() {
        let store = MemoryStore::new();
        let created = store.create_profile(&ProfileRecord::draft("a", 10.0)).unwrap();
        assert!(created.id > 0);
        assert!(store.create_profile(&ProfileRecord::draft("a", 10.0)).is_err());

        assert!(store
            .update_profile(created.id, &ProfileUpdate::status(ProfileStatus::Active))
            .unwrap());
        let fetched = store.get_profile(&ProfileKey::Name("a".into())).unwrap().unwrap();
        assert_eq!(fetched.status, ProfileStatus::Active);
        assert!(!store.update_profile(999, &ProfileUpdate::default()).unwrap());
    }

    #[test]
    fn delete_profile_cascades() {
        let store = MemoryStore::new();
        let p = store.create_profile(&ProfileRecord::draft("a", 10.0)).unwrap();
        store.create_component(&component(p.id)).unwrap();
        store
            .create_plugin(&PluginRecord {
                id: 0,
                profile_id: p.id,
                name: "mean_threshold".into(),
                job: PluginJob::CreateOrder,
                settings: settings::empty(),
            })
            .unwrap();
        assert!(store.delete_profile(p.id).unwrap());
        assert!(store.list_components(p.id).unwrap().is_empty());
        assert!(store.list_plugins(p.id).unwrap().is_empty());
    }

    #[test]
    fn bindings_are_scoped_to_their_profile() {
        let store = MemoryStore::new();
        let a = store.create_profile(&ProfileRecord::draft("a", 10.0)).unwrap();
        let b = store.create_profile(&ProfileRecord::draft("b", 10.0)).unwrap();
        let c = store.create_component(&component(a.id)).unwrap();
        assert!(store.get_component(b.id, c.id).unwrap().is_none());
        assert!(!store.delete_component(b.id, c.id).unwrap());
        assert!(store.create_component(&component(404)).is_err());
    }
}
