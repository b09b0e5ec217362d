// SPDX-License-Identifier: GPL-3.0-only

//! Orchestrator and per-domain facades
//!
//! Every facade call follows the same path: build a request, validate it
//! into an invocation, take the target lock when the operation is exclusive,
//! and hand the invocation to the executor. Facades only add typed
//! parameters and the few pre-conditions the schemas cannot express.

mod balance;
mod device;
mod filesystem;
mod property;
mod quota;
mod rescue;
mod restore;
mod scrub;
mod subvolume;

pub use balance::BalanceOps;
pub use device::DeviceOps;
pub use filesystem::FilesystemOps;
pub use property::PropertyOps;
pub use quota::QuotaOps;
pub use rescue::RescueOps;
pub use restore::{RestoreOps, RestoreOptions};
pub use scrub::ScrubOps;
pub use subvolume::SubvolumeOps;

use btrfs_sys::{DeviceCatalog, Executor, PrivilegedExecutor};
use btrfs_types::MaintenanceDomain::{
    self, Balance, Device, Filesystem, Property, Quota, Rescue, Restore, Scrub, Subvolume,
};
use btrfs_types::{BlockDevice, CommandInvocation, OperationRequest, OperationResult};
use tracing::{debug, info};

use crate::builder::CommandBuilder;
use crate::config::OrchestratorConfig;
use crate::error::{OpsError, Result};
use crate::locks::TargetLocks;
use crate::registry::Registry;

/// Every operation reachable through a facade method
pub const FACADE_OPERATIONS: &[(MaintenanceDomain, &str)] = &[
    (Device, "add"),
    (Device, "remove"),
    (Device, "scan"),
    (Device, "stats"),
    (Device, "usage"),
    (Device, "replace"),
    (Device, "replace-status"),
    (Device, "replace-cancel"),
    (Balance, "start"),
    (Balance, "pause"),
    (Balance, "cancel"),
    (Balance, "resume"),
    (Balance, "status"),
    (Quota, "enable"),
    (Quota, "disable"),
    (Quota, "rescan"),
    (Restore, "restore"),
    (Scrub, "start"),
    (Scrub, "cancel"),
    (Scrub, "resume"),
    (Scrub, "status"),
    (Filesystem, "df"),
    (Filesystem, "du"),
    (Filesystem, "show"),
    (Filesystem, "sync"),
    (Filesystem, "defragment"),
    (Filesystem, "resize"),
    (Filesystem, "mkswapfile"),
    (Property, "get"),
    (Property, "set"),
    (Property, "list"),
    (Rescue, "chunk-recover"),
    (Rescue, "super-recover"),
    (Rescue, "zero-log"),
    (Rescue, "fix-device-size"),
    (Rescue, "create-control-device"),
    (Rescue, "clear-ino-cache"),
    (Rescue, "clear-space-cache"),
    (Rescue, "clear-uuid-tree"),
    (Subvolume, "create"),
    (Subvolume, "delete"),
    (Subvolume, "list"),
    (Subvolume, "snapshot"),
];

/// Entry point for all btrfs maintenance operations.
///
/// Safe to share between tasks behind an `Arc`; concurrent exclusive
/// operations on the same target are serialized by the lock table.
pub struct Orchestrator<E: Executor> {
    config: OrchestratorConfig,
    builder: CommandBuilder,
    executor: E,
    locks: TargetLocks,
    catalog: DeviceCatalog,
}

impl Orchestrator<PrivilegedExecutor> {
    /// Orchestrator running the real `btrfs` behind the configured prefix
    pub fn from_config(config: OrchestratorConfig) -> Result<Self> {
        let executor = PrivilegedExecutor::new(config.privilege_prefix.clone())
            .skip_prefix_when_root(config.skip_prefix_when_root);
        Self::new(config, executor)
    }
}

impl<E: Executor> Orchestrator<E> {
    /// Create an orchestrator, refusing to start if the registry is
    /// inconsistent or lacks an operation some facade calls.
    pub fn new(config: OrchestratorConfig, executor: E) -> Result<Self> {
        let registry = Registry::global();
        registry.validate()?;
        registry.ensure_covers(FACADE_OPERATIONS)?;

        Ok(Self {
            builder: CommandBuilder::new(config.btrfs_program.clone()),
            catalog: DeviceCatalog::new(config.lsblk_program.clone()),
            locks: TargetLocks::new(),
            executor,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    pub fn locks(&self) -> &TargetLocks {
        &self.locks
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Validate and run one request.
    ///
    /// Validation failures and unknown operations are returned as errors
    /// without touching the executor. Everything that happens after the
    /// process is spawned is reported in the `OperationResult`.
    pub async fn submit(&self, request: OperationRequest) -> Result<OperationResult> {
        info!(
            domain = %request.domain,
            subcommand = %request.subcommand,
            "Dispatching operation"
        );

        let invocation = if self.config.verify_devices {
            let devices = self.devices().await?;
            self.builder.build_with_devices(request, &devices)?
        } else {
            self.builder.build(request)?
        };

        Ok(self.execute(invocation).await)
    }

    async fn execute(&self, invocation: CommandInvocation) -> OperationResult {
        let timeout = self.config.timeout_for(invocation.exclusive);

        let _guard = match (invocation.exclusive, invocation.target.as_deref()) {
            (true, Some(target)) => Some(self.locks.acquire(target).await),
            _ => None,
        };

        debug!(argv = ?invocation.argv(), ?timeout, "Executing invocation");
        self.executor.run(&invocation, timeout).await
    }

    /// Fresh snapshot of the system's block devices
    pub async fn devices(&self) -> Result<Vec<BlockDevice>> {
        let catalog = self.catalog.clone();
        let devices = tokio::task::spawn_blocking(move || catalog.list_devices())
            .await
            .map_err(|e| OpsError::Task(e.to_string()))??;
        Ok(devices)
    }

    /// Absolute mount points currently in use
    pub async fn mounted_paths(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.clone();
        let paths = tokio::task::spawn_blocking(move || catalog.list_mounted_paths())
            .await
            .map_err(|e| OpsError::Task(e.to_string()))??;
        Ok(paths)
    }

    pub fn device(&self) -> DeviceOps<'_, E> {
        DeviceOps::new(self)
    }

    pub fn balance(&self) -> BalanceOps<'_, E> {
        BalanceOps::new(self)
    }

    pub fn quota(&self) -> QuotaOps<'_, E> {
        QuotaOps::new(self)
    }

    pub fn restore(&self) -> RestoreOps<'_, E> {
        RestoreOps::new(self)
    }

    pub fn scrub(&self) -> ScrubOps<'_, E> {
        ScrubOps::new(self)
    }

    pub fn filesystem(&self) -> FilesystemOps<'_, E> {
        FilesystemOps::new(self)
    }

    pub fn property(&self) -> PropertyOps<'_, E> {
        PropertyOps::new(self)
    }

    pub fn rescue(&self) -> RescueOps<'_, E> {
        RescueOps::new(self)
    }

    pub fn subvolume(&self) -> SubvolumeOps<'_, E> {
        SubvolumeOps::new(self)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use btrfs_sys::Executor;
    use btrfs_types::{CommandInvocation, OperationResult, Outcome};

    use super::Orchestrator;
    use crate::config::OrchestratorConfig;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Started(Vec<String>),
        Finished(Vec<String>),
    }

    /// Executor that records what it was asked to run instead of running it
    #[derive(Clone, Default)]
    pub struct RecordingExecutor {
        events: Arc<Mutex<Vec<Event>>>,
        timeouts: Arc<Mutex<Vec<Duration>>>,
        delay: Option<Duration>,
        stdout: String,
    }

    impl RecordingExecutor {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn with_stdout(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                ..Self::default()
            }
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        /// Argument vectors (without the program) in start order
        pub fn calls(&self) -> Vec<Vec<String>> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Started(args) => Some(args),
                    Event::Finished(_) => None,
                })
                .collect()
        }

        pub fn timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> OperationResult {
            self.events
                .lock()
                .unwrap()
                .push(Event::Started(invocation.args.clone()));
            self.timeouts.lock().unwrap().push(timeout);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.events
                .lock()
                .unwrap()
                .push(Event::Finished(invocation.args.clone()));

            OperationResult {
                exit_code: Some(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
                outcome: Outcome::Success,
                duration_ms: 0,
            }
        }
    }

    pub fn orchestrator(executor: RecordingExecutor) -> Orchestrator<RecordingExecutor> {
        Orchestrator::new(OrchestratorConfig::default(), executor).expect("builtin registry")
    }
}
