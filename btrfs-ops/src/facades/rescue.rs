// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Rescue;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs rescue` operations.
///
/// Most of these act on an unmounted device and lock on it.
/// `create-control-device` and `clear-uuid-tree` take no device.
pub struct RescueOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> RescueOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    pub async fn chunk_recover(&self, device: &str) -> Result<OperationResult> {
        self.on_device("chunk-recover", device).await
    }

    pub async fn super_recover(&self, device: &str) -> Result<OperationResult> {
        self.on_device("super-recover", device).await
    }

    pub async fn zero_log(&self, device: &str) -> Result<OperationResult> {
        self.on_device("zero-log", device).await
    }

    pub async fn fix_device_size(&self, device: &str) -> Result<OperationResult> {
        self.on_device("fix-device-size", device).await
    }

    /// Create `/dev/btrfs-control`
    pub async fn create_control_device(&self) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Rescue, "create-control-device"))
            .await
    }

    pub async fn clear_ino_cache(&self, device: &str) -> Result<OperationResult> {
        self.on_device("clear-ino-cache", device).await
    }

    /// Clear the free space cache; `version` is `v1` or `v2`
    pub async fn clear_space_cache(&self, version: &str, device: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Rescue, "clear-space-cache")
                    .with_text("version", version)
                    .with_text("device", device),
            )
            .await
    }

    pub async fn clear_uuid_tree(&self) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Rescue, "clear-uuid-tree"))
            .await
    }

    async fn on_device(&self, subcommand: &str, device: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Rescue, subcommand).with_text("device", device))
            .await
    }
}
