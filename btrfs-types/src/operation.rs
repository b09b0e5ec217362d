// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of btrfs maintenance operations.
///
/// The set is fixed at compile time and maps one-to-one onto the command
/// groups of the `btrfs` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceDomain {
    Device,
    Balance,
    Quota,
    Restore,
    Scrub,
    Filesystem,
    Property,
    Rescue,
    Subvolume,
}

impl MaintenanceDomain {
    pub const ALL: [MaintenanceDomain; 9] = [
        Self::Device,
        Self::Balance,
        Self::Quota,
        Self::Restore,
        Self::Scrub,
        Self::Filesystem,
        Self::Property,
        Self::Rescue,
        Self::Subvolume,
    ];

    /// Command group token as understood by `btrfs`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Balance => "balance",
            Self::Quota => "quota",
            Self::Restore => "restore",
            Self::Scrub => "scrub",
            Self::Filesystem => "filesystem",
            Self::Property => "property",
            Self::Rescue => "rescue",
            Self::Subvolume => "subvolume",
        }
    }
}

impl fmt::Display for MaintenanceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain name that is not one of the fixed set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown maintenance domain: {0}")]
pub struct UnknownDomain(pub String);

impl FromStr for MaintenanceDomain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

/// Shape of a single schema parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Block device reference; bare names are resolved to `/dev/<name>`
    Device,
    /// Filesystem path (mount point, directory, file)
    Path,
    /// Free-form token such as a size or property name
    Text,
    /// Boolean switch, emitted as its `cli_token` when set
    Flag,
}

/// Declared contract for one parameter of a subcommand.
///
/// `cli_token` is the literal the parameter maps to: for flags it is the flag
/// itself, for value parameters it is an option name emitted before the
/// value. Value parameters without a token are positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub cli_token: Option<&'static str>,
}

impl ParameterSpec {
    pub const fn positional(name: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            name,
            kind,
            required,
            cli_token: None,
        }
    }

    pub const fn option(name: &'static str, kind: ParamKind, required: bool, token: &'static str) -> Self {
        Self {
            name,
            kind,
            required,
            cli_token: Some(token),
        }
    }

    pub const fn flag(name: &'static str, token: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Flag,
            required: false,
            cli_token: Some(token),
        }
    }
}

/// Parameter contract for a `(domain, subcommand)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSchema {
    pub domain: MaintenanceDomain,
    pub subcommand: &'static str,
    /// Fixed tokens following the program name, e.g. `["subvolume", "create"]`
    pub literals: Vec<&'static str>,
    /// Parameters in emission order
    pub params: Vec<ParameterSpec>,
    /// Whether the operation must hold the per-target lock while running
    pub exclusive: bool,
    /// Name of the parameter identifying the filesystem or device acted upon
    pub target: Option<&'static str>,
}

impl OperationSchema {
    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter().filter(|param| param.required)
    }
}

/// A value supplied by the caller for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ParamValue {
    Text(String),
    Flag(bool),
}

/// One user action: which operation to run and with what parameters.
///
/// Built per call and handed to the builder by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub domain: MaintenanceDomain,
    pub subcommand: String,
    pub params: BTreeMap<String, ParamValue>,
}

impl OperationRequest {
    pub fn new(domain: MaintenanceDomain, subcommand: impl Into<String>) -> Self {
        Self {
            domain,
            subcommand: subcommand.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(name.to_string(), ParamValue::Text(value.into()));
        self
    }

    /// Set a text parameter only when a value is present
    pub fn with_optional_text(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with_text(name, value),
            None => self,
        }
    }

    pub fn with_flag(mut self, name: &str, set: bool) -> Self {
        self.params.insert(name.to_string(), ParamValue::Flag(set));
        self
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.params.get(name) {
            Some(ParamValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// A fully resolved, shell-free argument vector.
///
/// Every element of `args` is an opaque token handed to the process as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Filesystem or device the invocation acts on, used as the lock key
    pub target: Option<String>,
    /// Whether the invocation must be serialized against its target
    pub exclusive: bool,
}

impl CommandInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            target: None,
            exclusive: false,
        }
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}
