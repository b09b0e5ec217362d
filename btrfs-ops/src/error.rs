// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use btrfs_sys::SysError;
use btrfs_types::MaintenanceDomain;
use serde::Serialize;
use thiserror::Error;

/// One violated parameter constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Violation {
    MissingParam { name: String },
    InvalidValue { name: String, reason: String },
}

impl Violation {
    pub fn missing(name: &str) -> Self {
        Self::MissingParam {
            name: name.to_string(),
        }
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn param(&self) -> &str {
        match self {
            Self::MissingParam { name } | Self::InvalidValue { name, .. } => name,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParam { name } => write!(f, "missing parameter '{name}'"),
            Self::InvalidValue { name, reason } => write!(f, "invalid value for '{name}': {reason}"),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for orchestration operations
#[derive(Error, Debug)]
pub enum OpsError {
    #[error(transparent)]
    Discovery(#[from] SysError),

    #[error("Unknown operation: {domain} {subcommand}")]
    UnknownOperation {
        domain: MaintenanceDomain,
        subcommand: String,
    },

    #[error("Validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    #[error("Operation registry inconsistent: {}", .0.join("; "))]
    RegistryDrift(Vec<String>),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl OpsError {
    pub fn unknown(domain: MaintenanceDomain, subcommand: &str) -> Self {
        Self::UnknownOperation {
            domain,
            subcommand: subcommand.to_string(),
        }
    }

    /// Violations carried by a validation error, empty for other errors
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OpsError>;
