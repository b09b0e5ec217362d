// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Device;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs device` operations
pub struct DeviceOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> DeviceOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    /// Add `device` to the filesystem mounted at `mount`
    pub async fn add(&self, device: &str, mount: &str, force: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "add")
                    .with_flag("force", force)
                    .with_text("device", device)
                    .with_text("mount", mount),
            )
            .await
    }

    pub async fn remove(&self, device: &str, mount: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "remove")
                    .with_text("device", device)
                    .with_text("mount", mount),
            )
            .await
    }

    /// Scan one device, or all devices when `device` is `None`
    pub async fn scan(&self, device: Option<&str>) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Device, "scan").with_optional_text("device", device))
            .await
    }

    /// Error counters for a mount or device; `reset` zeroes them afterwards
    pub async fn stats(&self, target: &str, reset: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "stats")
                    .with_flag("reset", reset)
                    .with_text("target", target),
            )
            .await
    }

    pub async fn usage(&self, mount: &str, raw_bytes: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "usage")
                    .with_flag("raw", raw_bytes)
                    .with_text("mount", mount),
            )
            .await
    }

    /// Replace `source` (a device path or devid) with `device` and wait for
    /// the copy to finish. Holds the lock on `mount` throughout.
    pub async fn replace(
        &self,
        source: &str,
        device: &str,
        mount: &str,
        force: bool,
    ) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "replace")
                    .with_flag("force", force)
                    .with_text("source", source)
                    .with_text("device", device)
                    .with_text("mount", mount),
            )
            .await
    }

    /// Progress of a running replace; `once` prints a single line instead of following
    pub async fn replace_status(&self, mount: &str, once: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Device, "replace-status")
                    .with_flag("once", once)
                    .with_text("mount", mount),
            )
            .await
    }

    pub async fn replace_cancel(&self, mount: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Device, "replace-cancel").with_text("mount", mount))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::testing::{RecordingExecutor, orchestrator};
    use crate::error::Violation;

    #[tokio::test]
    async fn add_places_force_before_positionals() {
        let executor = RecordingExecutor::default();
        let orchestrator = orchestrator(executor.clone());

        orchestrator.device().add("sdc", "/mnt/pool", true).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![vec!["device", "add", "-f", "/dev/sdc", "/mnt/pool"]]
        );
    }

    #[tokio::test]
    async fn scan_without_device_scans_everything() {
        let executor = RecordingExecutor::default();
        let orchestrator = orchestrator(executor.clone());

        orchestrator.device().scan(None).await.unwrap();
        orchestrator.device().stats("/mnt/pool", true).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![
                vec!["device", "scan"],
                vec!["device", "stats", "-z", "/mnt/pool"],
            ]
        );
    }

    #[tokio::test]
    async fn replace_runs_in_foreground_and_locks_the_mount() {
        let executor = RecordingExecutor::with_delay(Duration::from_millis(100));
        let orchestrator = Arc::new(orchestrator(executor.clone()));

        let replace = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .device()
                    .replace("/dev/sdb", "sdd", "/mnt/pool", true)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(orchestrator.locks().is_locked("/mnt/pool"));

        orchestrator.device().replace_status("/mnt/pool", true).await.unwrap();
        orchestrator.device().replace_cancel("/mnt/pool").await.unwrap();
        replace.await.unwrap().unwrap();

        assert_eq!(
            executor.calls(),
            vec![
                vec!["replace", "start", "-B", "-f", "/dev/sdb", "/dev/sdd", "/mnt/pool"],
                vec!["replace", "status", "-1", "/mnt/pool"],
                vec!["replace", "cancel", "/mnt/pool"],
            ]
        );
    }

    #[tokio::test]
    async fn replace_reports_every_missing_argument() {
        let executor = RecordingExecutor::default();
        let orchestrator = orchestrator(executor.clone());

        let error = orchestrator
            .device()
            .replace("", "", "/mnt/pool", false)
            .await
            .unwrap_err();
        let names: Vec<_> = error.violations().iter().map(Violation::param).collect();
        assert_eq!(names, vec!["source", "device"]);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn remove_requires_both_device_and_mount() {
        let executor = RecordingExecutor::default();
        let orchestrator = orchestrator(executor.clone());

        let error = orchestrator.device().remove(" ", "").await.unwrap_err();
        assert_eq!(error.violations().len(), 2);
        assert!(executor.calls().is_empty());
    }
}
