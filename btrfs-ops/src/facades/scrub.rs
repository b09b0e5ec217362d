// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Scrub;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs scrub` operations on a mount path or device
pub struct ScrubOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> ScrubOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    /// Start a scrub; `readonly` reports errors without repairing them
    pub async fn start(&self, target: &str, readonly: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Scrub, "start")
                    .with_flag("readonly", readonly)
                    .with_text("target", target),
            )
            .await
    }

    pub async fn cancel(&self, target: &str) -> Result<OperationResult> {
        self.simple("cancel", target).await
    }

    pub async fn resume(&self, target: &str) -> Result<OperationResult> {
        self.simple("resume", target).await
    }

    pub async fn status(&self, target: &str) -> Result<OperationResult> {
        self.simple("status", target).await
    }

    async fn simple(&self, subcommand: &str, target: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Scrub, subcommand).with_text("target", target))
            .await
    }
}
