//! Database configuration
//!
//! A small, serializable knob set applied at construction. Everything has
//! a default; `DatabaseConfig::default()` is a working configuration.

use serde::{Deserialize, Serialize};

/// Construction-time database options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Emit one structured log event per mutation and transaction boundary
    #[serde(default)]
    pub log_events: bool,

    /// Default case behavior for LIKE patterns; individual operators can
    /// override it
    #[serde(default = "default_like_case_insensitive")]
    pub like_case_insensitive: bool,
}

fn default_like_case_insensitive() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            log_events: false,
            like_case_insensitive: true,
        }
    }
}
