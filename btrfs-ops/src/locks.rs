// SPDX-License-Identifier: GPL-3.0-only

//! Per-target mutual exclusion
//!
//! At most one exclusive invocation runs against a given mount path or
//! device at a time. Guards are owned and released on drop, so every exit
//! path (including timeouts and cancelled callers) frees the target.
//! Entries are removed once nobody holds or waits for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Held while an exclusive invocation runs against `target`
#[derive(Debug)]
pub struct TargetGuard {
    target: String,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TargetGuard {
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let lock = OwnedMutexGuard::mutex(&guard).clone();
        drop(guard);

        let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the table entry and `lock` remain: no holder, no waiter.
        if let Some(entry) = table.get(&self.target)
            && Arc::ptr_eq(entry, &lock)
            && Arc::strong_count(&lock) == 2
        {
            table.remove(&self.target);
        }

        debug!(target = %self.target, "Released target lock");
    }
}

/// Table of per-target locks, created on first use
#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: LockTable,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `target` is free and take it
    pub async fn acquire(&self, target: &str) -> TargetGuard {
        let key = normalize_target(target);
        let lock = self.lock_for(&key);

        debug!(target = %key, "Waiting for target lock");
        let guard = lock.lock_owned().await;
        debug!(target = %key, "Acquired target lock");

        TargetGuard {
            target: key,
            table: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Whether an exclusive invocation currently holds `target`
    pub fn is_locked(&self, target: &str) -> bool {
        let key = normalize_target(target);
        let locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .get(&key)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of targets currently held or waited for
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Lock key for a target: trailing slashes are ignored, `/` stays `/`
pub fn normalize_target(target: &str) -> String {
    let trimmed = target.trim();
    let stripped = trimmed.trim_end_matches('/');
    if stripped.is_empty() && trimmed.starts_with('/') {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trailing_slashes_share_a_key() {
        assert_eq!(normalize_target("/mnt/data/"), "/mnt/data");
        assert_eq!(normalize_target("/mnt/data"), "/mnt/data");
        assert_eq!(normalize_target("/"), "/");
        assert_eq!(normalize_target("//"), "/");
    }

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let locks = Arc::new(TargetLocks::new());
        let guard = locks.acquire("/mnt/data").await;
        assert!(locks.is_locked("/mnt/data/"));

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("/mnt/data/").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .expect("contender task");
        assert!(!locks.is_locked("/mnt/data"));
    }

    #[tokio::test]
    async fn distinct_targets_do_not_block() {
        let locks = TargetLocks::new();
        let _first = locks.acquire("/mnt/a").await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire("/mnt/b")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn released_targets_are_forgotten() {
        let locks = TargetLocks::new();
        for index in 0..10 {
            let _guard = locks.acquire(&format!("/mnt/disk{index}")).await;
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_someone_waits() {
        let locks = Arc::new(TargetLocks::new());
        let guard = locks.acquire("/mnt/data").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("/mnt/data").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.tracked(), 1, "waiter still needs the entry");

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }
}
