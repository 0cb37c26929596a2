//! Harness configuration and its validation.
//!
//! Values come from an optional TOML file, then environment overrides:
//!
//! | Variable | Default |
//! |---|---|
//! | `BASE_URL` | `http://localhost:8080` |
//! | `VALID_USERNAME` | `Admin` |
//! | `VALID_PASSWORD` | `admin123` |
//! | `HARNESS_STEP_TIMEOUT_MS` | `5000` |
//! | `HARNESS_SCENARIO_TIMEOUT_SECS` | `300` |
//! | `HARNESS_ARTIFACT_DIR` | `screenshots` |
//! | `HARNESS_MAX_NAME_LEN` | `50` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::Credentials;
use crate::error::{Error, Result};

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Fatal issues.
    pub errors: Vec<String>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// Settings shared by every scenario of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Supervisor (admin) login.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Bound on each driver interaction and observation.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Bound on a whole scenario, teardown excluded.
    #[serde(default = "default_scenario_timeout_secs")]
    pub scenario_timeout_secs: u64,
    /// Screenshots of mismatches go here. Empty disables capture.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Longest entity name the module accepts.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_username() -> String {
    "Admin".to_string()
}

fn default_password() -> String {
    "admin123".to_string()
}

fn default_step_timeout_ms() -> u64 {
    5000
}

fn default_scenario_timeout_secs() -> u64 {
    300
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_max_name_len() -> usize {
    50
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: default_username(),
            password: default_password(),
            step_timeout_ms: default_step_timeout_ms(),
            scenario_timeout_secs: default_scenario_timeout_secs(),
            artifact_dir: default_artifact_dir(),
            max_name_len: default_max_name_len(),
        }
    }
}

impl HarnessConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml_str(&content).map_err(|e| Error::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn number<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
        }

        if let Some(v) = lookup("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("VALID_USERNAME") {
            self.username = v;
        }
        if let Some(v) = lookup("VALID_PASSWORD") {
            self.password = v;
        }
        if let Some(v) = lookup("HARNESS_STEP_TIMEOUT_MS") {
            self.step_timeout_ms = number("HARNESS_STEP_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("HARNESS_SCENARIO_TIMEOUT_SECS") {
            self.scenario_timeout_secs = number("HARNESS_SCENARIO_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("HARNESS_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HARNESS_MAX_NAME_LEN") {
            self.max_name_len = number("HARNESS_MAX_NAME_LEN", v)?;
        }
        Ok(())
    }

    pub fn supervisor(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }

    /// Artifact directory, or None when capture is disabled.
    pub fn artifact_dir(&self) -> Option<PathBuf> {
        if self.artifact_dir.as_os_str().is_empty() {
            None
        } else {
            Some(self.artifact_dir.clone())
        }
    }
}

impl Validate for HarnessConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.username.trim().is_empty() {
            result.add_error("username cannot be empty");
        }
        if self.password.is_empty() {
            result.add_error("password cannot be empty");
        }
        if self.step_timeout_ms == 0 {
            result.add_error("step_timeout_ms must be greater than zero");
        }
        if self.max_name_len == 0 {
            result.add_error("max_name_len must be greater than zero");
        }
        if self.step_timeout() >= self.scenario_timeout() {
            result.add_error("step_timeout_ms must be less than scenario_timeout_secs");
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            result.add_warning(format!("base_url '{}' is not an http(s) URL", self.base_url));
        }
        if self.step_timeout() < Duration::from_millis(500) {
            result.add_warning("step timeout under 500ms may report slow pages as timeouts");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_valid());
        assert_eq!(config.step_timeout(), Duration::from_secs(5));
        assert_eq!(config.artifact_dir(), Some(PathBuf::from("screenshots")));
    }

    #[test]
    fn toml_fills_missing_keys_with_defaults() {
        let config = HarnessConfig::from_toml_str("step_timeout_ms = 2000\nmax_name_len = 40\n").unwrap();
        assert_eq!(config.step_timeout_ms, 2000);
        assert_eq!(config.max_name_len, 40);
        assert_eq!(config.username, "Admin");
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("VALID_USERNAME", "supervisor"),
            ("HARNESS_STEP_TIMEOUT_MS", "750"),
            ("HARNESS_ARTIFACT_DIR", ""),
        ]
        .into_iter()
        .collect();
        let mut config = HarnessConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.supervisor().username, "supervisor");
        assert_eq!(config.step_timeout(), Duration::from_millis(750));
        assert_eq!(config.artifact_dir(), None);
    }

    #[test]
    fn non_numeric_override_is_config_error() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_overrides(|k| (k == "HARNESS_MAX_NAME_LEN").then(|| "fifty".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn step_timeout_must_fit_in_scenario() {
        let config = HarnessConfig {
            step_timeout_ms: 10_000,
            scenario_timeout_secs: 5,
            ..Default::default()
        };
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.into_result().is_err());
    }

    #[test]
    fn short_step_timeout_warns() {
        let config = HarnessConfig {
            step_timeout_ms: 100,
            ..Default::default()
        };
        let warnings = config.validate().into_result().unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
