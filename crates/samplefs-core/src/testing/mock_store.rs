// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte store decorator that injects failures
//!
//! Operation names match the [`ByteStore`] method names: `store`, `read`,
//! `read_at`, `write_at`, `truncate`, `size` and `release`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::storage::ByteStore;
use crate::types::ContentId;

pub type ErrorFn = Arc<dyn Fn() -> FsError + Send + Sync>;

/// Decides, per call, whether to fail. Receives the operation name and how
/// many times it was called before.
pub type FaultPredicate = Arc<dyn Fn(&str, u64) -> Option<FsError> + Send + Sync>;

#[derive(Default)]
pub enum FailureBehavior {
    #[default]
    AlwaysSucceed,
    /// `count` calls of `op` succeed, every later one fails
    FailAfter {
        op: &'static str,
        count: u64,
        error_fn: ErrorFn,
    },
    /// The first `count` calls of `op` fail
    FailFor {
        op: &'static str,
        count: u64,
        error_fn: ErrorFn,
    },
    AlwaysFail {
        op: &'static str,
        error_fn: ErrorFn,
    },
    Custom(FaultPredicate),
}

impl FailureBehavior {
    fn fault(&self, op: &str, seen: u64) -> Option<FsError> {
        match self {
            FailureBehavior::AlwaysSucceed => None,
            FailureBehavior::FailAfter {
                op: target,
                count,
                error_fn,
            } => (op == *target && seen >= *count).then(|| error_fn()),
            FailureBehavior::FailFor {
                op: target,
                count,
                error_fn,
            } => (op == *target && seen < *count).then(|| error_fn()),
            FailureBehavior::AlwaysFail {
                op: target,
                error_fn,
            } => (op == *target).then(|| error_fn()),
            FailureBehavior::Custom(predicate) => predicate(op, seen),
        }
    }
}

/// Wraps a real store; every call is counted and may be failed according to
/// the configured [`FailureBehavior`].
pub struct FailingStore {
    inner: Arc<dyn ByteStore>,
    behavior: Mutex<FailureBehavior>,
    calls: Mutex<HashMap<&'static str, u64>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn ByteStore>) -> Self {
        Self::with_behavior(inner, FailureBehavior::AlwaysSucceed)
    }

    pub fn with_behavior(inner: Arc<dyn ByteStore>, behavior: FailureBehavior) -> Self {
        Self {
            inner,
            behavior: Mutex::new(behavior),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_behavior(&self, behavior: FailureBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn call_count(&self, op: &str) -> u64 {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    pub fn reset_counters(&self) {
        self.calls.lock().clear();
    }

    fn check(&self, op: &'static str) -> FsResult<()> {
        let seen = {
            let mut calls = self.calls.lock();
            let counter = calls.entry(op).or_insert(0);
            let seen = *counter;
            *counter += 1;
            seen
        };
        match self.behavior.lock().fault(op, seen) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ByteStore for FailingStore {
    fn store(&self, bytes: &[u8]) -> FsResult<ContentId> {
        self.check("store")?;
        self.inner.store(bytes)
    }

    fn read(&self, id: ContentId) -> FsResult<Vec<u8>> {
        self.check("read")?;
        self.inner.read(id)
    }

    fn read_at(&self, id: ContentId, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        self.check("read_at")?;
        self.inner.read_at(id, offset, buf)
    }

    fn write_at(&self, id: ContentId, offset: u64, data: &[u8]) -> FsResult<usize> {
        self.check("write_at")?;
        self.inner.write_at(id, offset, data)
    }

    fn truncate(&self, id: ContentId, new_len: u64) -> FsResult<()> {
        self.check("truncate")?;
        self.inner.truncate(id, new_len)
    }

    fn size(&self, id: ContentId) -> FsResult<u64> {
        self.check("size")?;
        self.inner.size(id)
    }

    fn release(&self, id: ContentId) -> FsResult<()> {
        self.check("release")?;
        self.inner.release(id)
    }
}

pub fn out_of_memory() -> FsError {
    FsError::OutOfMemory
}

pub fn io_error() -> FsError {
    FsError::Io(io::Error::from_raw_os_error(libc::EIO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn wrap(behavior: FailureBehavior) -> FailingStore {
        FailingStore::with_behavior(Arc::new(InMemoryStore::new()), behavior)
    }

    #[test]
    fn counts_calls_when_succeeding() {
        let store = FailingStore::new(Arc::new(InMemoryStore::new()));
        let id = store.store(b"abc").unwrap();
        assert_eq!(store.size(id).unwrap(), 3);
        assert_eq!(store.call_count("store"), 1);
        assert_eq!(store.call_count("size"), 1);
        assert_eq!(store.call_count("read"), 0);

        store.reset_counters();
        assert_eq!(store.call_count("store"), 0);
    }

    #[test]
    fn fail_after_lets_the_first_calls_through() {
        let store = wrap(FailureBehavior::FailAfter {
            op: "write_at",
            count: 2,
            error_fn: Arc::new(io_error),
        });
        let id = store.store(b"").unwrap();
        assert!(store.write_at(id, 0, b"a").is_ok());
        assert!(store.write_at(id, 1, b"b").is_ok());
        assert!(matches!(store.write_at(id, 2, b"c"), Err(FsError::Io(_))));
        assert_eq!(store.read(id).unwrap(), b"ab");
    }

    #[test]
    fn fail_for_recovers() {
        let store = wrap(FailureBehavior::FailFor {
            op: "store",
            count: 2,
            error_fn: Arc::new(out_of_memory),
        });
        assert!(matches!(store.store(b"a"), Err(FsError::OutOfMemory)));
        assert!(matches!(store.store(b"b"), Err(FsError::OutOfMemory)));
        assert!(store.store(b"c").is_ok());
    }

    #[test]
    fn custom_predicate_sees_call_numbers() {
        let store = wrap(FailureBehavior::Custom(Arc::new(|op: &str, seen: u64| {
            (op == "release" && seen % 2 == 1).then(io_error)
        })));
        let a = store.store(b"a").unwrap();
        let b = store.store(b"b").unwrap();
        assert!(store.release(a).is_ok());
        assert!(store.release(b).is_err());
        assert!(store.release(b).is_ok());
    }

    #[test]
    fn behavior_can_change_at_runtime() {
        let store = FailingStore::new(Arc::new(InMemoryStore::new()));
        let id = store.store(b"x").unwrap();
        store.set_behavior(FailureBehavior::AlwaysFail {
            op: "truncate",
            error_fn: Arc::new(out_of_memory),
        });
        assert!(store.truncate(id, 0).is_err());
        store.set_behavior(FailureBehavior::AlwaysSucceed);
        assert!(store.truncate(id, 0).is_ok());
    }
}
