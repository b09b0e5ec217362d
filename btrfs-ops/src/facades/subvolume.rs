// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Subvolume;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs subvolume` operations
pub struct SubvolumeOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> SubvolumeOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    pub async fn create(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Subvolume, "create").with_text("path", path))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Subvolume, "delete").with_text("path", path))
            .await
    }

    pub async fn list(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Subvolume, "list").with_text("path", path))
            .await
    }

    /// Snapshot `source` to `dest`. Locks on the source subvolume.
    pub async fn snapshot(&self, source: &str, dest: &str, readonly: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Subvolume, "snapshot")
                    .with_flag("readonly", readonly)
                    .with_text("source", source)
                    .with_text("dest", dest),
            )
            .await
    }
}
