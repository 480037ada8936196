/// Runtime configuration for the planner server and client
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::PlannerError;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV_VAR: &str = "PLANNER_CONFIG";

/// Substring of a category name that marks a course as a major course.
pub const DEFAULT_MAJOR_MARKER: &str = "전공";

/// Top-level planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Base URL of the server hosting search, generation and save endpoints
    pub generator_base_url: String,
    pub bind_address: String,
    pub port: u16,
    pub major_marker: String,
    pub candidate_cache_ttl_secs: u64,
    pub session_idle_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            generator_base_url: "http://127.0.0.1:8000".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            major_marker: DEFAULT_MAJOR_MARKER.to_string(),
            candidate_cache_ttl_secs: 5 * 60,
            session_idle_secs: 60 * 60,
        }
    }
}

impl PlannerConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON config file
    ///
    /// # Returns
    /// * `Ok(PlannerConfig)` - Loaded configuration
    /// * `Err` - If the file can't be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self, PlannerError> {
        let content = fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&content)?;
        if config.major_marker.is_empty() {
            return Err(PlannerError::Config {
                message: "major_marker must not be empty".to_string(),
            });
        }

        Ok(config)
    }

    /// Loads the file named by `PLANNER_CONFIG`, or the defaults if the
    /// variable is unset.
    pub fn from_env() -> Result<Self, PlannerError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load_from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn candidate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.candidate_cache_ttl_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Address the server listens on, e.g. `127.0.0.1:3000`.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("planner-{name}-{nanos}.json"));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_file("partial", r#"{ "port": 8081 }"#);
        let config = PlannerConfig::load_from_file(&path).unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.major_marker, DEFAULT_MAJOR_MARKER);
        assert_eq!(config.candidate_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.listen_address(), "127.0.0.1:8081");
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_empty_marker_rejected() {
        let path = temp_file("marker", r#"{ "major_marker": "" }"#);
        let err = PlannerConfig::load_from_file(&path).unwrap_err();

        assert!(matches!(err, PlannerError::Config { .. }));
        fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PlannerConfig::load_from_file(Path::new("/nonexistent/planner.json")).unwrap_err();
        assert!(matches!(err, PlannerError::Config { .. }));
    }
}
