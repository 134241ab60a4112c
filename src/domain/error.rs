//! Domain error types.

use crate::domain::binding::BindingId;

/// Top-level error type for quorum.
#[derive(Debug, thiserror::Error)]
pub enum QuorumError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("failed to persist {what}: {reason}")]
    Persistence { what: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("profile {profile} has no CREATE_ORDER plugin")]
    MissingOrderPlugin { profile: String },

    #[error("profile {profile} already has a CREATE_ORDER plugin (binding {existing})")]
    DuplicateOrderPlugin { profile: String, existing: BindingId },

    #[error("unknown scoring component '{name}'")]
    UnknownComponent { name: String },

    #[error("unknown plugin '{name}'")]
    UnknownPlugin { name: String },

    #[error("invalid settings for '{name}': {reason}")]
    InvalidSettings { name: String, reason: String },

    #[error("profile {profile} has no binding {id}")]
    BindingNotFound { profile: String, id: BindingId },

    #[error("profile not found: {key}")]
    ProfileNotFound { key: String },

    #[error("profile {profile} is in error state {status}; deactivated")]
    ProfileErrored { profile: String, status: i64 },

    #[error("invalid status transition for profile {profile}: {reason}")]
    InvalidTransition { profile: String, reason: String },

    #[error("scoring component '{component}' failed: {reason}")]
    Scoring { component: String, reason: String },

    #[error("plugin '{plugin}' failed: {reason}")]
    Plugin { plugin: String, reason: String },

    #[error("no data for {ticker} at {interval}")]
    NoData { ticker: String, interval: String },

    #[error("no price available for {ticker}: {reason}")]
    NoPrice { ticker: String, reason: String },

    #[error("broker rejected {ticker}: {reason}")]
    Broker { ticker: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuorumError {
    pub(crate) fn persistence(what: impl Into<String>, reason: impl Into<String>) -> Self {
        QuorumError::Persistence {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl From<&QuorumError> for std::process::ExitCode {
    fn from(err: &QuorumError) -> Self {
        let code: u8 = match err {
            QuorumError::Io(_) => 1,
            QuorumError::ConfigParse { .. }
            | QuorumError::ConfigMissing { .. }
            | QuorumError::ConfigInvalid { .. }
            | QuorumError::MissingOrderPlugin { .. }
            | QuorumError::DuplicateOrderPlugin { .. }
            | QuorumError::UnknownComponent { .. }
            | QuorumError::UnknownPlugin { .. }
            | QuorumError::InvalidSettings { .. }
            | QuorumError::Json(_) => 2,
            QuorumError::Database { .. }
            | QuorumError::DatabaseQuery { .. }
            | QuorumError::Persistence { .. } => 3,
            QuorumError::BindingNotFound { .. }
            | QuorumError::ProfileNotFound { .. }
            | QuorumError::ProfileErrored { .. }
            | QuorumError::InvalidTransition { .. } => 4,
            QuorumError::NoData { .. } | QuorumError::NoPrice { .. } => 5,
            QuorumError::Scoring { .. } | QuorumError::Plugin { .. } | QuorumError::Broker { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
