// novin/src/config.rs
//
// SDK configuration. Everything the orchestrator wires together is set here;
// Default gives the full on-device profile (100-token burst bucket, 60 s
// chain window, 1000-record audit ring, in-memory persistence).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: &str = "1.0.0";

/// Degradation modes, strongest to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkMode {
    /// All reasoners, learning enabled.
    Full,
    /// All reasoners, user-pattern learning and dampening disabled.
    Degraded,
    /// Rule engine only.
    Minimal,
    /// Always returns `standard` with confidence 0.5; surfaces no errors.
    Emergency,
}

impl std::fmt::Display for SdkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full      => write!(f, "full"),
            Self::Degraded  => write!(f, "degraded"),
            Self::Minimal   => write!(f, "minimal"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub mode:              SdkMode,
    /// Token bucket burst capacity.
    pub max_tokens:        f64,
    /// Token bucket refill, tokens per second.
    pub refill_rate:       f64,
    /// Chain buffer sliding window, seconds.
    pub chain_window_secs: i64,
    /// Chain buffer entry cap.
    pub chain_capacity:    usize,
    /// Audit ring cap.
    pub audit_capacity:    usize,
    /// User-pattern learning rate, (0,1).
    pub learning_rate:     f64,
    /// Directory for the key-value store. None → in-memory only.
    pub state_dir:         Option<PathBuf>,
    /// Override for the packaged rule set.
    pub rules_path:        Option<PathBuf>,
    pub config_version:    String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            mode:              SdkMode::Full,
            max_tokens:        100.0,
            refill_rate:       100.0,
            chain_window_secs: 60,
            chain_capacity:    100,
            audit_capacity:    1000,
            learning_rate:     0.05,
            state_dir:         None,
            rules_path:        None,
            config_version:    CONFIG_VERSION.to_string(),
        }
    }
}
