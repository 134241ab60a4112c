//! Opaque per-binding settings and typed lookups into them.

use crate::domain::error::QuorumError;

/// Settings stored with a binding; only the bound component or plugin
/// interprets them.
pub type Settings = serde_json::Value;

pub fn empty() -> Settings {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Parse settings text, treating blank input as an empty object.
pub fn parse(text: &str) -> Result<Settings, QuorumError> {
    if text.trim().is_empty() {
        return Ok(empty());
    }
    Ok(serde_json::from_str(text)?)
}

pub fn get_f64(settings: &Settings, owner: &str, key: &str, default: f64) -> Result<f64, QuorumError> {
    match settings.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| QuorumError::InvalidSettings {
                name: owner.to_string(),
                reason: format!("'{key}' must be a finite number"),
            }),
    }
}

pub fn get_usize(settings: &Settings, owner: &str, key: &str, default: usize) -> Result<usize, QuorumError> {
    match settings.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| QuorumError::InvalidSettings {
                name: owner.to_string(),
                reason: format!("'{key}' must be a positive integer"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_blank_is_empty_object() {
        assert_eq!(parse("  ").unwrap(), empty());
        assert_eq!(parse(r#"{"period": 5}"#).unwrap(), json!({"period": 5}));
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn get_usize_defaults_and_validates() {
        let s = json!({"period": 14, "bad": -3, "zero": 0});
        assert_eq!(get_usize(&s, "rsi", "period", 7).unwrap(), 14);
        assert_eq!(get_usize(&s, "rsi", "missing", 7).unwrap(), 7);
        assert!(get_usize(&s, "rsi", "bad", 7).is_err());
        assert!(get_usize(&s, "rsi", "zero", 7).is_err());
    }

    #[test]
    fn get_f64_defaults_and_validates() {
        let s = json!({"sensitivity": 2.5, "text": "x"});
        assert_eq!(get_f64(&s, "ema", "sensitivity", 1.0).unwrap(), 2.5);
        assert_eq!(get_f64(&s, "ema", "missing", 1.0).unwrap(), 1.0);
        assert!(get_f64(&s, "ema", "text", 1.0).is_err());
    }
}
