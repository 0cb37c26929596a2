//! Debug and fail-fast switches for harness runs.
//!
//! Environment variables:
//! - `HARNESS_DEBUG=1` - Verbose logging, including every poll of page text
//! - `HARNESS_FAIL_FAST=1` - Stop the suite after the first failing scenario
//!
//! When HARNESS_FAIL_FAST is enabled, scenarios run one at a time and the
//! suite stops after the first failure; that scenario still tears down.

use std::sync::OnceLock;

static DEBUG_CONFIG: OnceLock<DebugConfig> = OnceLock::new();

/// Debug and fail-fast configuration.
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub debug_mode: bool,
    pub fail_fast: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

impl DebugConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            debug_mode: flag("HARNESS_DEBUG"),
            fail_fast: flag("HARNESS_FAIL_FAST"),
        }
    }
}

/// Gets the global debug configuration, read once from the environment.
pub fn get_config() -> &'static DebugConfig {
    DEBUG_CONFIG.get_or_init(DebugConfig::from_env)
}

pub fn is_debug() -> bool {
    get_config().debug_mode
}

pub fn is_fail_fast() -> bool {
    get_config().fail_fast
}

/// Logs at debug level when HARNESS_DEBUG is enabled.
#[macro_export]
macro_rules! harness_debug {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug() {
            tracing::debug!($($arg)*);
        }
    };
}
