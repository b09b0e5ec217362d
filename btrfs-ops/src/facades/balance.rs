// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Balance;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs balance` operations.
///
/// `start` and `resume` block until the balance finishes and hold the
/// target lock meanwhile; `pause`, `cancel` and `status` do not lock so
/// they can reach a running balance.
pub struct BalanceOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> BalanceOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    pub async fn start(&self, path: &str, full_balance: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Balance, "start")
                    .with_flag("full", full_balance)
                    .with_text("path", path),
            )
            .await
    }

    pub async fn pause(&self, path: &str) -> Result<OperationResult> {
        self.simple("pause", path).await
    }

    pub async fn cancel(&self, path: &str) -> Result<OperationResult> {
        self.simple("cancel", path).await
    }

    pub async fn resume(&self, path: &str) -> Result<OperationResult> {
        self.simple("resume", path).await
    }

    pub async fn status(&self, path: &str) -> Result<OperationResult> {
        self.simple("status", path).await
    }

    async fn simple(&self, subcommand: &str, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Balance, subcommand).with_text("path", path))
            .await
    }
}
