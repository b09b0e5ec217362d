// SPDX-License-Identifier: GPL-3.0-only

//! Validated btrfs maintenance operations
//!
//! This crate turns typed requests into `btrfs` invocations and runs them:
//!
//! - **registry**: which subcommands exist and what parameters they take
//! - **builder**: validation and argument-vector rendering
//! - **locks**: one exclusive operation per mount path or device at a time
//! - **facades**: the `Orchestrator` and one facade per maintenance domain
//! - **poll**: background `status` polling for balance and scrub
//!
//! # Example
//!
//! ```no_run
//! use btrfs_ops::{Orchestrator, OrchestratorConfig};
//!
//! # async fn run() -> btrfs_ops::Result<()> {
//! let orchestrator = Orchestrator::from_config(OrchestratorConfig::from_env())?;
//! let result = orchestrator.subvolume().create("/mnt/data/@home").await?;
//! println!("{:?}: {}", result.outcome, result.stderr);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod facades;
pub mod locks;
pub mod poll;
pub mod registry;

pub use builder::CommandBuilder;
pub use config::OrchestratorConfig;
pub use error::{OpsError, Result, Violation};
pub use facades::{
    BalanceOps, DeviceOps, FACADE_OPERATIONS, FilesystemOps, Orchestrator, PropertyOps, QuotaOps,
    RescueOps, RestoreOps, RestoreOptions, ScrubOps, SubvolumeOps,
};
pub use locks::{TargetGuard, TargetLocks};
pub use poll::{PollHandle, StatusPoller};
pub use registry::Registry;

pub use btrfs_sys::{Executor, PrivilegedExecutor};
pub use btrfs_types::{
    BlockDevice, CommandInvocation, MaintenanceDomain, OperationRequest, OperationResult,
    OperationSchema, Outcome, ParamValue,
};
