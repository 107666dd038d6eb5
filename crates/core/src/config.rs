use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StupidError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STUPID_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STUPID_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            queue: QueueConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  queue:       backing={}, btree_order={}, array_initial_capacity={}, poll_timeout_ms={}",
            self.queue.backing,
            self.queue.btree_order,
            self.queue.array_initial_capacity,
            self.queue.poll_timeout_ms
        );
    }
}

// ── Queue ─────────────────────────────────────────────────────

/// Smallest branching factor that still lets internal nodes keep half
/// occupancy after a merge.
pub const MIN_BTREE_ORDER: usize = 4;

/// Which backing store a blocking queue wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBacking {
    /// Priority order, rank queries available.
    BTree,
    /// FIFO circular buffer.
    Array,
}

impl fmt::Display for QueueBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueBacking::BTree => f.write_str("btree"),
            QueueBacking::Array => f.write_str("array"),
        }
    }
}

impl FromStr for QueueBacking {
    type Err = StupidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btree" => Ok(QueueBacking::BTree),
            "array" => Ok(QueueBacking::Array),
            other => Err(StupidError::Config(format!("unknown queue backing: {other}"))),
        }
    }
}

/// Work queue tuning, typically parsed from env or TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Backing store for blocking queues built from this config.
    #[serde(default = "default_backing")]
    pub backing: QueueBacking,
    /// B-tree branching factor (max entries per node).
    #[serde(default = "default_btree_order")]
    pub btree_order: usize,
    /// Starting (and minimum) capacity of the circular buffer.
    #[serde(default = "default_array_initial_capacity")]
    pub array_initial_capacity: usize,
    /// How long consumers wait in a single bounded poll.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_backing() -> QueueBacking { QueueBacking::BTree }
fn default_btree_order() -> usize { 64 }
fn default_array_initial_capacity() -> usize { 16 }
fn default_poll_timeout_ms() -> u64 { 100 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backing: default_backing(),
            btree_order: default_btree_order(),
            array_initial_capacity: default_array_initial_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        let backing = match profiled_env_opt(p, "QUEUE_BACKING") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default queue backing");
                default_backing()
            }),
            None => default_backing(),
        };
        Self {
            backing,
            btree_order: profiled_env_usize(p, "QUEUE_BTREE_ORDER", default_btree_order()),
            array_initial_capacity: profiled_env_usize(
                p,
                "QUEUE_ARRAY_INITIAL_CAPACITY",
                default_array_initial_capacity(),
            ),
            poll_timeout_ms: profiled_env_u64(p, "QUEUE_POLL_TIMEOUT_MS", default_poll_timeout_ms()),
        }
    }

    /// Reject values the queues cannot be built with.
    pub fn validate(&self) -> Result<(), StupidError> {
        if self.btree_order < MIN_BTREE_ORDER {
            return Err(StupidError::Config(format!(
                "btree_order must be at least {MIN_BTREE_ORDER}, got {}",
                self.btree_order
            )));
        }
        if self.array_initial_capacity == 0 {
            return Err(StupidError::Config(
                "array_initial_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_timeout_ms)
    }
}
