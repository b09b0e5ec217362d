// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime settings for the orchestrator.
///
/// Serde-friendly with per-field defaults so a host application can embed it
/// in its own settings file; the core never reads a file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub btrfs_program: String,
    pub lsblk_program: String,
    /// Privilege-escalation command placed before the btrfs binary
    pub privilege_prefix: Vec<String>,
    /// Run without the prefix when the process is already root
    pub skip_prefix_when_root: bool,
    /// Timeout for operations that take the target lock
    pub timeout_secs: u64,
    /// Timeout for queries and control operations
    pub query_timeout_secs: u64,
    /// Check device parameters against a fresh catalog snapshot
    pub verify_devices: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            btrfs_program: "btrfs".to_string(),
            lsblk_program: "lsblk".to_string(),
            privilege_prefix: vec!["pkexec".to_string()],
            skip_prefix_when_root: true,
            timeout_secs: 6 * 60 * 60,
            query_timeout_secs: 60,
            verify_devices: false,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `BTRFS_OPS_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparseable values are ignored
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("BTRFS_OPS_BTRFS").filter(|v| !v.trim().is_empty()) {
            self.btrfs_program = value.trim().to_string();
        }
        if let Some(value) = lookup("BTRFS_OPS_LSBLK").filter(|v| !v.trim().is_empty()) {
            self.lsblk_program = value.trim().to_string();
        }
        if let Some(value) = lookup("BTRFS_OPS_PRIVILEGE_PREFIX") {
            self.privilege_prefix = value.split_whitespace().map(ToString::to_string).collect();
        }
        if let Some(secs) = parse_override(&lookup, "BTRFS_OPS_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        if let Some(secs) = parse_override(&lookup, "BTRFS_OPS_QUERY_TIMEOUT_SECS") {
            self.query_timeout_secs = secs;
        }
        if let Some(value) = lookup("BTRFS_OPS_VERIFY_DEVICES") {
            self.verify_devices = matches!(value.trim(), "1" | "true" | "yes");
        }
        self
    }

    /// Timeout for an invocation, by whether it holds the target lock
    pub fn timeout_for(&self, exclusive: bool) -> Duration {
        if exclusive {
            Duration::from_secs(self.timeout_secs)
        } else {
            Duration::from_secs(self.query_timeout_secs)
        }
    }
}

fn parse_override(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
