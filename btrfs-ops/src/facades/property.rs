// SPDX-License-Identifier: GPL-3.0-only

use btrfs_sys::Executor;
use btrfs_types::MaintenanceDomain::Property;
use btrfs_types::{OperationRequest, OperationResult};

use super::Orchestrator;
use crate::error::Result;

/// `btrfs property` operations on a subvolume, file, device or filesystem
pub struct PropertyOps<'a, E: Executor> {
    orchestrator: &'a Orchestrator<E>,
}

impl<'a, E: Executor> PropertyOps<'a, E> {
    pub(super) fn new(orchestrator: &'a Orchestrator<E>) -> Self {
        Self { orchestrator }
    }

    /// Read one property, or all of them when `name` is `None`
    pub async fn get(&self, object: &str, name: Option<&str>) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Property, "get")
                    .with_text("object", object)
                    .with_optional_text("name", name),
            )
            .await
    }

    pub async fn set(&self, object: &str, name: &str, value: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(
                OperationRequest::new(Property, "set")
                    .with_text("object", object)
                    .with_text("name", name)
                    .with_text("value", value),
            )
            .await
    }

    pub async fn list(&self, object: &str) -> Result<OperationResult> {
        self.orchestrator
            .submit(OperationRequest::new(Property, "list").with_text("object", object))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{RecordingExecutor, orchestrator};

    #[tokio::test]
    async fn set_passes_object_name_value() {
        let executor = RecordingExecutor::default();
        let orchestrator = orchestrator(executor.clone());

        orchestrator
            .property()
            .set("/mnt/data/@home", "ro", "true")
            .await
            .unwrap();
        orchestrator.property().get("/mnt/data/@home", None).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![
                vec!["property", "set", "/mnt/data/@home", "ro", "true"],
                vec!["property", "get", "/mnt/data/@home"],
            ]
        );
    }
}
