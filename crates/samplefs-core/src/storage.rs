// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte storage for file contents and symlink targets

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{FsError, FsResult};
use crate::types::ContentId;

/// Opaque byte store the namespace keeps file data and link targets in
#[cfg_attr(test, mockall::automock)]
pub trait ByteStore: Send + Sync {
    /// Store a new object and return its handle
    fn store(&self, bytes: &[u8]) -> FsResult<ContentId>;
    /// Whole contents of an object
    fn read(&self, id: ContentId) -> FsResult<Vec<u8>>;
    fn read_at(&self, id: ContentId, offset: u64, buf: &mut [u8]) -> FsResult<usize>;
    /// Write at `offset`, zero-filling any gap past the current end
    fn write_at(&self, id: ContentId, offset: u64, data: &[u8]) -> FsResult<usize>;
    fn truncate(&self, id: ContentId, new_len: u64) -> FsResult<()>;
    fn size(&self, id: ContentId) -> FsResult<u64>;
    /// Drop an object; its handle becomes invalid
    fn release(&self, id: ContentId) -> FsResult<()>;
}

/// In-memory byte store
pub struct InMemoryStore {
    next_id: AtomicU64,
    data: Mutex<HashMap<ContentId, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.data.lock().len()
    }

    pub fn bytes_in_memory(&self) -> u64 {
        self.data.lock().values().map(|v| v.len() as u64).sum()
    }
}

impl ByteStore for InMemoryStore {
    fn store(&self, bytes: &[u8]) -> FsResult<ContentId> {
        let id = ContentId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut content = Vec::new();
        content.try_reserve_exact(bytes.len()).map_err(|_| FsError::OutOfMemory)?;
        content.extend_from_slice(bytes);
        self.data.lock().insert(id, content);
        Ok(id)
    }

    fn read(&self, id: ContentId) -> FsResult<Vec<u8>> {
        self.data.lock().get(&id).cloned().ok_or(FsError::NotFound)
    }

    fn read_at(&self, id: ContentId, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        let data = self.data.lock();
        let content = data.get(&id).ok_or(FsError::NotFound)?;

        let start = offset as usize;
        if start >= content.len() {
            return Ok(0);
        }

        let end = std::cmp::min(start + buf.len(), content.len());
        let bytes_to_copy = end - start;
        buf[..bytes_to_copy].copy_from_slice(&content[start..end]);
        Ok(bytes_to_copy)
    }

    fn write_at(&self, id: ContentId, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mut storage_data = self.data.lock();
        let content = storage_data.get_mut(&id).ok_or(FsError::NotFound)?;

        let start = usize::try_from(offset).map_err(|_| FsError::InvalidArgument)?;
        let end = start.checked_add(data.len()).ok_or(FsError::InvalidArgument)?;

        if end > content.len() {
            content
                .try_reserve(end - content.len())
                .map_err(|_| FsError::OutOfMemory)?;
            content.resize(end, 0);
        }

        content[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn truncate(&self, id: ContentId, new_len: u64) -> FsResult<()> {
        let mut data = self.data.lock();
        let content = data.get_mut(&id).ok_or(FsError::NotFound)?;
        let new_len = usize::try_from(new_len).map_err(|_| FsError::InvalidArgument)?;
        if new_len > content.len() {
            content
                .try_reserve(new_len - content.len())
                .map_err(|_| FsError::OutOfMemory)?;
        }
        content.resize(new_len, 0);
        Ok(())
    }

    fn size(&self, id: ContentId) -> FsResult<u64> {
        let data = self.data.lock();
        data.get(&id).map(|c| c.len() as u64).ok_or(FsError::NotFound)
    }

    fn release(&self, id: ContentId) -> FsResult<()> {
        self.data.lock().remove(&id).map(|_| ()).ok_or(FsError::NotFound)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_read_back() {
        let store = InMemoryStore::new();
        let id = store.store(b"/target/path").unwrap();
        assert_eq!(store.read(id).unwrap(), b"/target/path");
        assert_eq!(store.size(id).unwrap(), 12);
    }

    #[test]
    fn write_past_end_zero_fills() {
        let store = InMemoryStore::new();
        let id = store.store(b"ab").unwrap();
        store.write_at(id, 4, b"cd").unwrap();
        assert_eq!(store.read(id).unwrap(), b"ab\0\0cd");

        let mut buf = [0u8; 8];
        let n = store.read_at(id, 3, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"\0cd");
        assert_eq!(store.read_at(id, 10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn truncate_shrinks_and_grows() {
        let store = InMemoryStore::new();
        let id = store.store(b"hello world").unwrap();
        store.truncate(id, 5).unwrap();
        assert_eq!(store.read(id).unwrap(), b"hello");
        store.truncate(id, 7).unwrap();
        assert_eq!(store.read(id).unwrap(), b"hello\0\0");
    }

    #[test]
    fn release_invalidates_handle() {
        let store = InMemoryStore::new();
        let id = store.store(b"x").unwrap();
        assert_eq!(store.object_count(), 1);
        store.release(id).unwrap();
        assert_eq!(store.object_count(), 0);
        assert!(matches!(store.read(id), Err(FsError::NotFound)));
        assert!(matches!(store.release(id), Err(FsError::NotFound)));
    }
}
