//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the dispatch engine's
//! runtime behavior.
//!
//! ## Environment Variables
//!
//! ### `MIDSTACK_SPIN_LIMIT`
//!
//! Consecutive synchronous scan steps a dispatch performs before yielding
//! to the cooperative scheduler. Accepts decimal (`100`) or hexadecimal
//! (`0x64`) values. Default: `100`.
//!
//! The constant is empirical: large pass-through stacks scan many layers
//! without invoking any of them, and the guard keeps one request from
//! monopolizing the scheduler while it does. Lower values trade throughput
//! for fairness under heavy interleaving.
//!
//! ### `MIDSTACK_ENV`
//!
//! The application environment name (`development`, `production`, ...),
//! picked up by [`Settings`](crate::app::Settings) construction.
//! Default: `development`.
//!
//! ## Usage
//!
//! ```rust
//! use midstack::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Spin limit: {}", config.spin_limit);
//! ```

use std::env;

/// Default synchronous re-entry limit before the dispatch loop yields.
pub const DEFAULT_SPIN_LIMIT: usize = 100;

/// Default application environment name.
pub const DEFAULT_ENV: &str = "development";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Synchronous scan steps before yielding (default: 100).
    pub spin_limit: usize,
    /// Application environment name (default: `development`).
    pub env: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            env: DEFAULT_ENV.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let spin_limit = env::var("MIDSTACK_SPIN_LIMIT")
            .ok()
            .and_then(|val| parse_count(&val))
            .unwrap_or(DEFAULT_SPIN_LIMIT);
        let env = env::var("MIDSTACK_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
        Self { spin_limit, env }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal count.
fn parse_count(val: &str) -> Option<usize> {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
