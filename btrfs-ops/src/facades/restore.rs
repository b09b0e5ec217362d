// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Restore;
use btrfs_types::{OperationRequest, OperationResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Orchestrator;
use crate::error::{OpsError, Result, Violation};

/// Switches for `btrfs restore`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreOptions {
    /// List what would be restored without writing anything
    pub dry_run: bool,
    pub ignore_errors: bool,
    pub overwrite: bool,
    /// Restore owner, mode and timestamps
    pub metadata: bool,
    pub symlinks: bool,
    /// Also restore snapshots
    pub snapshots: bool,
}

/// Recover files from a damaged, unmounted filesystem
pub struct RestoreOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> RestoreOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    /// Copy files from `device` into the directory `path`.
    ///
    /// Both are required; when either is absent nothing runs and every
    /// missing one is reported.
    pub async fn restore(
        &self,
        device: Option<&str>,
        path: Option<&str>,
        options: RestoreOptions,
    ) -> Result<OperationResult> {
        let missing: Vec<Violation> = [("device", device), ("path", path)]
            .into_iter()
            .filter(|(_, value)| value.is_none_or(|value| value.trim().is_empty()))
            .map(|(name, _)| Violation::missing(name))
            .collect();

        if !missing.is_empty() {
            debug!("Refusing restore: {} argument(s) missing", missing.len());
            return Err(OpsError::Validation(missing));
        }

        let request = OperationRequest::new(Restore, "restore")
            .with_flag("dry_run", options.dry_run)
            .with_flag("ignore_errors", options.ignore_errors)
            .with_flag("overwrite", options.overwrite)
            .with_flag("metadata", options.metadata)
            .with_flag("symlinks", options.symlinks)
            .with_flag("snapshots", options.snapshots)
            .with_optional_text("device", device)
            .with_optional_text("path", path);

        self.orchestrator.submit(request).await
    }
}
