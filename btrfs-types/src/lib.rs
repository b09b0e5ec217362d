// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for btrfs maintenance orchestration
//!
//! These types are shared by every layer of the stack:
//!
//! - **btrfs-sys**: produces `BlockDevice` snapshots and `OperationResult`s
//! - **btrfs-ops**: declares `OperationSchema`s and turns `OperationRequest`s
//!   into `CommandInvocation`s
//! - front-ends: consume results for display
//!
//! Everything here is plain data. No type in this crate talks to the system.

pub mod device;
pub mod operation;
pub mod result;

pub use device::*;
pub use operation::*;
pub use result::*;
