//! Environment-driven configuration

use crate::llm::LlmConfig;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Wall-clock ceiling for one plotting snippet
    pub render_timeout: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok());
        config.llm = LlmConfig::from_env();
        config
    }

    /// Build from an arbitrary variable source; unparsable values fall back
    /// to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("MATHBUDDY_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = lookup("MATHBUDDY_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".mathbuddy").join("mathbuddy.db")
            },
            PathBuf::from,
        );

        let render_timeout_ms = lookup("MATHBUDDY_RENDER_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_MS);

        Self {
            port,
            db_path,
            render_timeout: Duration::from_millis(render_timeout_ms),
            llm: LlmConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("HOME", "/home/ada")]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("/home/ada/.mathbuddy/mathbuddy.db"));
        assert_eq!(config.render_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MATHBUDDY_PORT", "9090"),
            ("MATHBUDDY_DB_PATH", "/var/lib/mathbuddy.db"),
            ("MATHBUDDY_RENDER_TIMEOUT_MS", "1500"),
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/mathbuddy.db"));
        assert_eq!(config.render_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config(&[
            ("MATHBUDDY_PORT", "eighty"),
            ("MATHBUDDY_RENDER_TIMEOUT_MS", "0"),
        ]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/.mathbuddy/mathbuddy.db"));
        assert_eq!(config.render_timeout, Duration::from_secs(5));
    }
}
