// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Filesystem;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs filesystem` operations
pub struct FilesystemOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> FilesystemOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    pub async fn df(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Filesystem, "df").with_text("path", path))
            .await
    }

    pub async fn du(&self, path: &str, summarize: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Filesystem, "du")
                    .with_flag("summarize", summarize)
                    .with_text("path", path),
            )
            .await
    }

    /// Show one filesystem by path, label or UUID, or all of them
    pub async fn show(&self, target: Option<&str>) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Filesystem, "show").with_optional_text("target", target))
            .await
    }

    pub async fn sync(&self, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Filesystem, "sync").with_text("path", path))
            .await
    }

    pub async fn defragment(&self, path: &str, recursive: bool) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Filesystem, "defragment")
                    .with_flag("recursive", recursive)
                    .with_text("path", path),
            )
            .await
    }

    /// Resize the filesystem at `path`.
    ///
    /// `size` is passed to btrfs as-is: an absolute size (`20g`), a relative
    /// one (`+1g`, `-500m`), `max`, optionally prefixed with `devid:`.
    pub async fn resize(&self, size: &str, path: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Filesystem, "resize")
                    .with_text("size", size)
                    .with_text("path", path),
            )
            .await
    }

    /// Create a swapfile at `path`, with btrfs' default size unless `size` is given
    pub async fn mkswapfile(&self, path: &str, size: Option<&str>) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Filesystem, "mkswapfile")
                    .with_optional_text("size", size)
                    .with_text("path", path),
            )
            .await
    }
}
