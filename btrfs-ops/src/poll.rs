// SPDX-License-Identifier: GPL-3.0-only

//! Periodic status polling for long-running balance and scrub jobs

use std::sync::Arc;
use std::time::Duration;

use btrfs_sys::Executor;
use btrfs_types::{MaintenanceDomain, OperationRequest, OperationResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{OpsError, Result};
use crate::facades::Orchestrator;

const RESULT_BUFFER: usize = 16;

/// Spawns background tasks that run `status` on an interval
pub struct StatusPoller;

impl StatusPoller {
    /// Poll `balance status` or `scrub status` for `target` every `interval`.
    ///
    /// The request is validated once up front; a bad target fails here
    /// instead of inside the task.
    pub fn spawn<E: Executor + 'static>(
        orchestrator: Arc<Orchestrator<E>>,
        domain: MaintenanceDomain,
        target: &str,
        interval: Duration,
    ) -> Result<PollHandle> {
        let request = status_request(domain, target)?;
        orchestrator.builder().build(request.clone())?;

        let (sender, receiver) = mpsc::channel(RESULT_BUFFER);
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let target = target.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // Not raced against the token: a dispatched status call finishes.
                let result = match orchestrator.submit(request.clone()).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Stopping {} status polling for {}: {}", domain, target, e);
                        break;
                    }
                };

                if sender.send(result).await.is_err() {
                    debug!("Status receiver for {} dropped", target);
                    break;
                }
            }

            debug!("{} status polling for {} stopped", domain, target);
        });

        Ok(PollHandle {
            results: receiver,
            cancel_token,
            task,
        })
    }
}

fn status_request(domain: MaintenanceDomain, target: &str) -> Result<OperationRequest> {
    let param = match domain {
        MaintenanceDomain::Balance => "path",
        MaintenanceDomain::Scrub => "target",
        other => {
            return Err(OpsError::Unsupported(format!(
                "status polling is only available for balance and scrub, not {other}"
            )));
        }
    };
    Ok(OperationRequest::new(domain, "status").with_text(param, target))
}

/// Handle to a running poller
pub struct PollHandle {
    results: mpsc::Receiver<OperationResult>,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Next status result; `None` once polling has stopped
    pub async fn recv(&mut self) -> Option<OperationResult> {
        self.results.recv().await
    }

    /// Stop polling after the in-flight status call, if any
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel and wait for the polling task to exit
    pub async fn stop(self) -> Result<()> {
        self.cancel_token.cancel();
        drop(self.results);
        self.task.await.map_err(|e| OpsError::Task(e.to_string()))
    }
}
