// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system access for btrfs maintenance
//!
//! This crate owns everything that touches the running system:
//! - Block device and mount point discovery through `lsblk`
//! - Spawning the `btrfs` tool (optionally behind a privilege-escalation
//!   prefix) and capturing its output
//! - Classifying process results into an `Outcome`
//!
//! Nothing here knows which subcommands exist; argument vectors arrive fully
//! built from `btrfs-ops`.

pub mod catalog;
pub mod classify;
pub mod error;
pub mod executor;

pub use catalog::{DeviceCatalog, parse_lsblk, parse_size};
pub use classify::classify;
pub use error::{Result, SysError};
pub use executor::{Executor, PrivilegedExecutor};
