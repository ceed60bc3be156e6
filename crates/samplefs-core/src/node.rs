// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node ownership and lifetime
//!
//! The [`NodeStore`] holds the only authoritative strong reference to each
//! node. Directory entries name children by [`NodeId`] and callers hold
//! counted references through [`NodeStore::retain`]. A node is destroyed once
//! both its link count and its reference count reach zero.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::casefold::CaseFolder;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{FsError, FsResult};
use crate::index::DirectoryIndex;
use crate::storage::ByteStore;
use crate::types::{
    Attributes, ContentId, Credentials, FileTimes, NodeId, NodeType, PERMISSION_BITS, S_IFDIR,
    S_IFLNK, S_IFMT, S_IFREG,
};

/// What to allocate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// `parent` is `None` for the root, which is its own parent
    Directory { parent: Option<NodeId> },
    RegularFile,
    Symlink,
    /// The mode's file-type bits select FIFO, socket, or device
    Special { rdev: u64 },
}

enum NodePayload {
    Directory(RwLock<DirectoryIndex>),
    RegularFile,
    Symlink,
    Special { rdev: u64 },
}

/// Mutable attributes of a node
#[derive(Clone, Debug)]
pub struct NodeMeta {
    /// Full mode word, file-type bits included
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub times: FileTimes,
    /// Containing directory; only tracked for directories
    pub parent: Option<NodeId>,
}

pub struct Node {
    id: NodeId,
    payload: NodePayload,
    content: OnceLock<ContentId>,
    nlink: AtomicU32,
    refs: AtomicU32,
    meta: Mutex<NodeMeta>,
}

impl Node {
    fn new(id: NodeId, kind: NodeKind, owner: Credentials, mode: u32, folder: CaseFolder) -> Self {
        let perms = mode & PERMISSION_BITS;
        let (payload, mode, nlink, parent) = match kind {
            NodeKind::Directory { parent } => (
                NodePayload::Directory(RwLock::new(DirectoryIndex::new(folder))),
                S_IFDIR | perms,
                2,
                Some(parent.unwrap_or(id)),
            ),
            NodeKind::RegularFile => (NodePayload::RegularFile, S_IFREG | perms, 1, None),
            NodeKind::Symlink => (NodePayload::Symlink, S_IFLNK | perms, 1, None),
            NodeKind::Special { rdev } => {
                (NodePayload::Special { rdev }, (mode & S_IFMT) | perms, 1, None)
            }
        };

        Self {
            id,
            payload,
            content: OnceLock::new(),
            nlink: AtomicU32::new(nlink),
            refs: AtomicU32::new(1),
            meta: Mutex::new(NodeMeta {
                mode,
                uid: owner.uid,
                gid: owner.gid,
                size: 0,
                times: FileTimes::now(),
                parent,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        match self.payload {
            NodePayload::Directory(_) => NodeType::Directory,
            NodePayload::RegularFile => NodeType::RegularFile,
            NodePayload::Symlink => NodeType::Symlink,
            NodePayload::Special { .. } => NodeType::Special,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.payload, NodePayload::Directory(_))
    }

    pub fn nlink(&self) -> u32 {
        self.nlink.load(Ordering::Acquire)
    }

    /// Outstanding caller references
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// The directory's index, or `NotADirectory`
    pub fn directory(&self) -> FsResult<&RwLock<DirectoryIndex>> {
        match &self.payload {
            NodePayload::Directory(index) => Ok(index),
            _ => Err(FsError::NotADirectory),
        }
    }

    /// Byte-store handle of a file or symlink
    pub fn content(&self) -> Option<ContentId> {
        self.content.get().copied()
    }

    pub fn rdev(&self) -> u64 {
        match self.payload {
            NodePayload::Special { rdev } => rdev,
            _ => 0,
        }
    }

    pub fn meta(&self) -> MutexGuard<'_, NodeMeta> {
        self.meta.lock()
    }

    /// Set modify and change time to now
    pub fn touch(&self) {
        let now = crate::types::current_timestamp();
        let mut meta = self.meta.lock();
        meta.times.mtime = now;
        meta.times.ctime = now;
    }

    pub fn touch_ctime(&self) {
        self.meta.lock().times.ctime = crate::types::current_timestamp();
    }

    pub fn attributes(&self) -> Attributes {
        let meta = self.meta.lock();
        Attributes {
            id: self.id,
            node_type: self.node_type(),
            mode: meta.mode,
            uid: meta.uid,
            gid: meta.gid,
            nlink: self.nlink(),
            size: meta.size,
            rdev: self.rdev(),
            times: meta.times,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.node_type())
            .field("nlink", &self.nlink())
            .field("refs", &self.refs())
            .finish()
    }
}

/// Owner of every node of one mount
pub struct NodeStore {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
    next_id: AtomicU64,
    max_nodes: Option<usize>,
    folder: CaseFolder,
    store: Arc<dyn ByteStore>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl NodeStore {
    pub fn new(
        folder: CaseFolder,
        store: Arc<dyn ByteStore>,
        diagnostics: Arc<dyn DiagnosticSink>,
        max_nodes: Option<usize>,
    ) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_nodes,
            folder,
            store,
            diagnostics,
        }
    }

    pub fn byte_store(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    /// Create a node owned by `owner`. Link count starts at 1 (2 for a
    /// directory) and the caller holds one reference, to be given back with
    /// [`NodeStore::release`].
    pub fn allocate(&self, kind: NodeKind, owner: Credentials, mode: u32) -> FsResult<Arc<Node>> {
        let mut nodes = self.nodes.write();
        if self.max_nodes.is_some_and(|max| nodes.len() >= max) {
            debug!(target: "samplefs", "node limit reached at {}", nodes.len());
            return Err(FsError::OutOfMemory);
        }
        nodes.try_reserve(1).map_err(|_| FsError::OutOfMemory)?;

        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = Arc::new(Node::new(id, kind, owner, mode, self.folder));
        nodes.insert(id, Arc::clone(&node));
        debug!(target: "samplefs", "allocated {} node {}", node.node_type(), id);
        Ok(node)
    }

    /// Store `bytes` as the node's content
    pub fn attach_content(&self, node: &Node, bytes: &[u8]) -> FsResult<()> {
        let content = self.store.store(bytes)?;
        if node.content.set(content).is_err() {
            let _ = self.store.release(content);
            return Err(FsError::InvalidArgument);
        }
        node.meta().size = bytes.len() as u64;
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> FsResult<Arc<Node>> {
        self.nodes.read().get(&id).cloned().ok_or(FsError::NotFound)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Count of live directories
    pub fn directory_count(&self) -> usize {
        self.nodes.read().values().filter(|n| n.is_dir()).count()
    }

    pub fn retain(&self, id: NodeId) -> FsResult<()> {
        // The read guard keeps a concurrent destroy from slipping in between
        // the lookup and the increment.
        let nodes = self.nodes.read();
        let node = nodes.get(&id).ok_or(FsError::NotFound)?;
        node.refs.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn release(&self, id: NodeId) -> FsResult<()> {
        let node = self.get(id)?;
        node.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
            .map_err(|_| FsError::InvalidArgument)?;
        self.destroy_if_unused(id);
        Ok(())
    }

    /// Add a link. A node whose links already dropped to zero cannot gain new ones.
    pub fn link(&self, id: NodeId) -> FsResult<u32> {
        let node = self.get(id)?;
        let prev = node
            .nlink
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 {
                    None
                } else {
                    n.checked_add(1)
                }
            })
            .map_err(|n| if n == 0 { FsError::NotFound } else { FsError::InvalidArgument })?;
        Ok(prev + 1)
    }

    /// Drop a link and return the remaining count. Taking a directory's last
    /// link requires its index to be empty.
    pub fn unlink(&self, id: NodeId) -> FsResult<u32> {
        let node = self.get(id)?;
        let mut current = node.nlink.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(FsError::NotFound);
            }
            if current == 1 {
                if let NodePayload::Directory(index) = &node.payload {
                    if !index.read().is_empty() {
                        return Err(FsError::DirectoryNotEmpty);
                    }
                }
            }
            match node.nlink.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let remaining = current - 1;
        if remaining == 0 {
            self.destroy_if_unused(id);
        }
        Ok(remaining)
    }

    /// Undo an allocation whose creation failed part way
    pub fn abandon(&self, id: NodeId) {
        if let Ok(node) = self.get(id) {
            node.nlink.store(0, Ordering::Release);
            let _ = self.release(id);
        }
    }

    /// Zero the link count regardless of contents; returns true when the node
    /// was destroyed as a result.
    pub(crate) fn drop_links(&self, id: NodeId) -> bool {
        match self.get(id) {
            Ok(node) => {
                node.nlink.store(0, Ordering::Release);
                self.destroy_if_unused(id)
            }
            Err(_) => false,
        }
    }

    /// Destroy every remaining node, retained or not; returns how many there were.
    pub(crate) fn evict_all(&self) -> usize {
        let drained: Vec<Arc<Node>> = self.nodes.write().drain().map(|(_, n)| n).collect();
        for node in &drained {
            self.release_payload(node);
        }
        drained.len()
    }

    fn destroy_if_unused(&self, id: NodeId) -> bool {
        let removed = {
            let mut nodes = self.nodes.write();
            match nodes.get(&id) {
                Some(node) if node.nlink() == 0 && node.refs() == 0 => nodes.remove(&id),
                _ => None,
            }
        };
        match removed {
            Some(node) => {
                self.release_payload(&node);
                debug!(target: "samplefs", "destroyed node {}", id);
                true
            }
            None => false,
        }
    }

    fn release_payload(&self, node: &Node) {
        if let Some(content) = node.content() {
            if let Err(err) = self.store.release(content) {
                self.diagnostics.report(&Diagnostic::ReleaseFailed {
                    id: node.id,
                    error: err.to_string(),
                });
            }
        }
    }
}
