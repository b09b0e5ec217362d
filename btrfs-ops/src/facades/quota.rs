// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Quota;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs quota` operations
pub struct QuotaOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> QuotaOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    pub async fn enable(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Quota, "enable").with_text("path", path))
            .await
    }

    pub async fn disable(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Quota, "disable").with_text("path", path))
            .await
    }

    /// Rescan qgroup usage; with `wait` the call returns once the rescan is done
    pub async fn rescan(&self, path: &str, wait: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Quota, "rescan")
                    .with_flag("wait", wait)
                    .with_text("path", path),
            )
            .await
    }
}
