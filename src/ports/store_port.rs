//! Persistence port trait for profiles and their bindings.
//!
//! `update_*` methods return `Ok(false)` when no row matched; callers treat
//! that the same as a failed write.

use crate::domain::binding::BindingId;
use crate::domain::error::QuorumError;
use crate::domain::record::{
    ComponentRecord, PluginRecord, ProfileId, ProfileKey, ProfileRecord, ProfileUpdate,
};

pub trait ProfileStore: Send + Sync {
    /// Insert a profile, returning the record with its assigned id.
    fn create_profile(&self, record: &ProfileRecord) -> Result<ProfileRecord, QuorumError>;
    fn get_profile(&self, key: &ProfileKey) -> Result<Option<ProfileRecord>, QuorumError>;
    fn list_profiles(&self) -> Result<Vec<ProfileRecord>, QuorumError>;
    fn update_profile(&self, id: ProfileId, update: &ProfileUpdate) -> Result<bool, QuorumError>;
    /// Delete a profile and every binding it owns.
    fn delete_profile(&self, id: ProfileId) -> Result<bool, QuorumError>;

    fn create_component(&self, record: &ComponentRecord) -> Result<ComponentRecord, QuorumError>;
    fn get_component(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<ComponentRecord>, QuorumError>;
    fn list_components(&self, profile_id: ProfileId) -> Result<Vec<ComponentRecord>, QuorumError>;
    fn update_component(&self, record: &ComponentRecord) -> Result<bool, QuorumError>;
    fn delete_component(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError>;

    fn create_plugin(&self, record: &PluginRecord) -> Result<PluginRecord, QuorumError>;
    fn get_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<Option<PluginRecord>, QuorumError>;
    fn list_plugins(&self, profile_id: ProfileId) -> Result<Vec<PluginRecord>, QuorumError>;
    fn update_plugin(&self, record: &PluginRecord) -> Result<bool, QuorumError>;
    fn delete_plugin(&self, profile_id: ProfileId, id: BindingId) -> Result<bool, QuorumError>;
}
