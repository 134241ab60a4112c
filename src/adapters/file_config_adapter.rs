//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const PROFILE_INI: &str = r#"
[profile]
name = swing
balance = 10000.0
buy_limit = 0.6
status = paper

[component:trend]
name = ema
ticker = BTC
interval = 1h
weight = 1.5
settings = {"period": 20}

[plugin:order]
name = mean_threshold

[backtest]
partitions = 4
candles = 500
"#;

    #[test]
    fn from_string_parses_profile_config() {
        let adapter = FileConfigAdapter::from_string(PROFILE_INI).unwrap();
        assert_eq!(adapter.get_string("profile", "name"), Some("swing".to_string()));
        assert_eq!(
            adapter.get_string("component:trend", "settings"),
            Some(r#"{"period": 20}"#.to_string())
        );
        assert_eq!(adapter.get_double("component:trend", "weight", 1.0), 1.5);
        assert_eq!(adapter.get_int("backtest", "partitions", 1), 4);
    }

    #[test]
    fn sections_are_listed_sorted() {
        let adapter = FileConfigAdapter::from_string(PROFILE_INI).unwrap();
        assert_eq!(
            adapter.sections(),
            vec!["backtest", "component:trend", "plugin:order", "profile"]
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[profile]\nname = swing\n").unwrap();
        assert_eq!(adapter.get_string("profile", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[backtest]\npartitions = abc\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "partitions", 42), 42);
        assert_eq!(adapter.get_int("backtest", "missing", 7), 7);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[profile]\nbalance = lots\n").unwrap();
        assert_eq!(adapter.get_double("profile", "balance", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[run]\na = true\nb = no\nc = 1\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("run", "a", false));
        assert!(!adapter.get_bool("run", "b", true));
        assert!(adapter.get_bool("run", "c", false));
        assert!(adapter.get_bool("run", "d", true));
        assert!(!adapter.get_bool("run", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\ndir = /var/lib/quorum/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "dir"),
            Some("/var/lib/quorum/prices".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
