//! Profile lifecycle status.
//!
//! Persisted as an integer code. Codes at or above
//! [`UNKNOWN_ERROR_THRESHOLD`] form an open error band rather than a set of
//! named states: any such profile is refused by every lifecycle entry point
//! and deactivated.

use std::fmt;

use crate::domain::error::QuorumError;

/// First status code of the error band.
pub const UNKNOWN_ERROR_THRESHOLD: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    Inactive,
    Active,
    PaperTrading,
    Backtesting,
    Error(i64),
}

impl ProfileStatus {
    pub fn code(self) -> i64 {
        match self {
            ProfileStatus::Inactive => 0,
            ProfileStatus::Active => 1,
            ProfileStatus::PaperTrading => 2,
            ProfileStatus::Backtesting => 3,
            ProfileStatus::Error(code) => code,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, ProfileStatus::Error(_))
    }

    /// Statuses under which the scheduler should be stopped.
    pub fn halts_scheduler(self) -> bool {
        matches!(self, ProfileStatus::Inactive | ProfileStatus::Error(_))
    }

    /// Parse a user-facing label (`inactive`, `active`, `paper`, `error:<code>`)
    /// or a bare status code.
    pub fn parse(value: &str) -> Result<Self, QuorumError> {
        let trimmed = value.trim().to_lowercase();
        let invalid = |reason: String| QuorumError::ConfigInvalid {
            section: "profile".into(),
            key: "status".into(),
            reason,
        };
        match trimmed.as_str() {
            "inactive" => Ok(ProfileStatus::Inactive),
            "active" | "live" => Ok(ProfileStatus::Active),
            "paper" | "paper_trading" => Ok(ProfileStatus::PaperTrading),
            "backtesting" => Ok(ProfileStatus::Backtesting),
            other => {
                let code_str = other.strip_prefix("error:").unwrap_or(other);
                let code: i64 = code_str
                    .parse()
                    .map_err(|_| invalid(format!("unrecognised status '{value}'")))?;
                ProfileStatus::try_from(code).map_err(|_| invalid(format!("invalid status code {code}")))
            }
        }
    }
}

impl TryFrom<i64> for ProfileStatus {
    type Error = QuorumError;

    fn try_from(code: i64) -> Result<Self, QuorumError> {
        match code {
            0 => Ok(ProfileStatus::Inactive),
            1 => Ok(ProfileStatus::Active),
            2 => Ok(ProfileStatus::PaperTrading),
            3 => Ok(ProfileStatus::Backtesting),
            c if c >= UNKNOWN_ERROR_THRESHOLD => Ok(ProfileStatus::Error(c)),
            c => Err(QuorumError::ConfigInvalid {
                section: "profile".into(),
                key: "status".into(),
                reason: format!("status code {c} is neither a known state nor in the error band"),
            }),
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileStatus::Inactive => write!(f, "INACTIVE"),
            ProfileStatus::Active => write!(f, "ACTIVE"),
            ProfileStatus::PaperTrading => write!(f, "PAPER_TRADING"),
            ProfileStatus::Backtesting => write!(f, "BACKTESTING"),
            ProfileStatus::Error(code) => write!(f, "ERROR({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_try_from() {
        for status in [
            ProfileStatus::Inactive,
            ProfileStatus::Active,
            ProfileStatus::PaperTrading,
            ProfileStatus::Backtesting,
            ProfileStatus::Error(UNKNOWN_ERROR_THRESHOLD),
            ProfileStatus::Error(512),
        ] {
            assert_eq!(ProfileStatus::try_from(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn codes_between_states_and_band_are_rejected() {
        assert!(ProfileStatus::try_from(4).is_err());
        assert!(ProfileStatus::try_from(UNKNOWN_ERROR_THRESHOLD - 1).is_err());
        assert!(ProfileStatus::try_from(-1).is_err());
    }

    #[test]
    fn error_band_is_open_ended() {
        assert!(ProfileStatus::try_from(100_000).unwrap().is_error());
        assert!(!ProfileStatus::Active.is_error());
    }

    #[test]
    fn halts_scheduler_only_for_inactive_and_errors() {
        assert!(ProfileStatus::Inactive.halts_scheduler());
        assert!(ProfileStatus::Error(101).halts_scheduler());
        assert!(!ProfileStatus::Active.halts_scheduler());
        assert!(!ProfileStatus::PaperTrading.halts_scheduler());
        assert!(!ProfileStatus::Backtesting.halts_scheduler());
    }

    #[test]
    fn parse_labels() {
        assert_eq!(ProfileStatus::parse("paper").unwrap(), ProfileStatus::PaperTrading);
        assert_eq!(ProfileStatus::parse(" Active ").unwrap(), ProfileStatus::Active);
        assert_eq!(ProfileStatus::parse("0").unwrap(), ProfileStatus::Inactive);
        assert_eq!(ProfileStatus::parse("error:150").unwrap(), ProfileStatus::Error(150));
        assert!(ProfileStatus::parse("sleeping").is_err());
        assert!(ProfileStatus::parse("error:5").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(ProfileStatus::PaperTrading.to_string(), "PAPER_TRADING");
        assert_eq!(ProfileStatus::Error(120).to_string(), "ERROR(120)");
    }
}
