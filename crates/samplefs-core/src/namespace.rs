// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mounted namespace and its operations
//!
//! A [`Namespace`] is produced by [`Namespace::mount`] and torn down by
//! [`Namespace::unmount`] (or on drop). Every operation after unmount fails
//! with [`FsError::NotMounted`].
//!
//! Lock order: directory indexes first, in ascending [`NodeId`] order when two
//! are held, then the node table. Cross-directory renames additionally hold
//! the namespace rename lock for the whole operation.

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{CachePolicy, MountConfig};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingDiagnostics};
use crate::error::{FsError, FsResult};
use crate::index::{validate_name, DirectoryIndex};
use crate::node::{Node, NodeKind, NodeStore};
use crate::options::parse_mount_options;
use crate::resolver::{NameResolver, Resolution};
use crate::storage::{ByteStore, InMemoryStore};
use crate::types::{
    current_timestamp, Attributes, ContentId, Credentials, DirEntry, NodeId, NodeType, SetAttr,
    StatFs, NAME_MAX, PERMISSION_BITS, S_IFBLK, S_IFCHR, S_IFIFO, S_IFMT, S_IFREG, S_IFSOCK,
    S_ISGID,
};

/// `statfs` magic number, "samp"
pub const SAMPLEFS_MAGIC: u32 = 0x7361_6d70;

/// Directory size grows by this much per created entry. It is a counter, not
/// a byte count.
pub const DIR_ENTRY_SIZE: u64 = 0x20;

pub const BLOCK_SIZE: u32 = 4096;

/// Longest accepted symlink target
pub const PATH_MAX: usize = 4096;

const ROOT_MODE: u32 = 0o755;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MountState {
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
}

impl std::fmt::Display for MountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MountState::Unmounted => "unmounted",
            MountState::Mounting => "mounting",
            MountState::Mounted => "mounted",
            MountState::Unmounting => "unmounting",
        };
        f.write_str(s)
    }
}

/// Everything a mount needs besides its option string
pub struct MountParams {
    pub store: Arc<dyn ByteStore>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    /// Upper bound on live nodes; allocation beyond it is `OutOfMemory`
    pub max_nodes: Option<usize>,
    /// Owner of the root directory
    pub root_owner: Credentials,
    pub cache_policy: CachePolicy,
}

impl Default for MountParams {
    fn default() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            diagnostics: Arc::new(TracingDiagnostics),
            max_nodes: None,
            root_owner: Credentials::ROOT,
            cache_policy: CachePolicy::default(),
        }
    }
}

/// Snapshot rendered by [`Namespace::debug_info`]
#[derive(Clone, Debug, Serialize)]
pub struct DebugInfo {
    pub state: MountState,
    pub root: NodeId,
    pub config: MountConfig,
    pub nodes: usize,
    pub directories: usize,
    pub lookups: u64,
    pub negative_lookups: u64,
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Display Debugging Information")?;
        writeln!(f, "state: {}", self.state)?;
        writeln!(f, "root: {}", self.root)?;
        writeln!(f, "case insensitive: {}", self.config.case_insensitive)?;
        writeln!(f, "iocharset: {}", self.config.code_table.name())?;
        writeln!(f, "rsize: {}", self.config.rsize)?;
        writeln!(f, "wsize: {}", self.config.wsize)?;
        writeln!(f, "nodes: {} ({} directories)", self.nodes, self.directories)?;
        write!(f, "lookups: {} ({} not found, none cached)", self.lookups, self.negative_lookups)
    }
}

struct Mount {
    config: Arc<MountConfig>,
    nodes: NodeStore,
    resolver: NameResolver,
    root: NodeId,
    rename_lock: Mutex<()>,
}

/// One mounted in-memory namespace
pub struct Namespace {
    state: Mutex<MountState>,
    mount: RwLock<Option<Mount>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Namespace {
    /// Parse `options`, build the configuration and allocate the root. On
    /// failure nothing of the mount survives.
    pub fn mount(options: &str, params: MountParams) -> FsResult<Self> {
        let MountParams {
            store,
            diagnostics,
            max_nodes,
            root_owner,
            cache_policy,
        } = params;
        debug!(target: "samplefs", "{} -> {}", MountState::Unmounted, MountState::Mounting);

        let mut config = MountConfig::default();
        parse_mount_options(options, &mut config, diagnostics.as_ref());
        let config = Arc::new(config);

        let nodes = NodeStore::new(config.case_folder(), store, Arc::clone(&diagnostics), max_nodes);
        // The allocation reference is kept as the mount's own hold on the root.
        let root = nodes
            .allocate(NodeKind::Directory { parent: None }, root_owner, ROOT_MODE)
            .map_err(|err| {
                info!(target: "samplefs", "mount failed: {}", err);
                err
            })?
            .id();

        info!(
            target: "samplefs",
            "mounted samplefs (case_insensitive={}, iocharset={})",
            config.case_insensitive,
            config.code_table.name()
        );
        diagnostics.report(&Diagnostic::Mounted { root });

        Ok(Self {
            state: Mutex::new(MountState::Mounted),
            mount: RwLock::new(Some(Mount {
                config,
                nodes,
                resolver: NameResolver::new(cache_policy),
                root,
                rename_lock: Mutex::new(()),
            })),
            diagnostics,
        })
    }

    /// Tear the namespace down. Calling it again is a no-op.
    pub fn unmount(&self) {
        let Some(mount) = self.mount.write().take() else {
            debug!(target: "samplefs", "unmount of an unmounted namespace ignored");
            return;
        };
        *self.state.lock() = MountState::Unmounting;

        let (released, busy) = mount.teardown();
        if busy > 0 {
            self.diagnostics.report(&Diagnostic::BusyNodesAfterUnmount { count: busy });
        }
        self.diagnostics.report(&Diagnostic::Unmounted {
            released: released + busy,
        });

        *self.state.lock() = MountState::Unmounted;
        info!(target: "samplefs", "unmounted samplefs");
    }

    pub fn state(&self) -> MountState {
        *self.state.lock()
    }

    pub fn is_mounted(&self) -> bool {
        self.state() == MountState::Mounted
    }

    fn mounted(&self) -> FsResult<MappedRwLockReadGuard<'_, Mount>> {
        RwLockReadGuard::try_map(self.mount.read(), Option::as_ref)
            .map_err(|_| FsError::NotMounted)
    }

    pub fn root(&self) -> FsResult<NodeId> {
        Ok(self.mounted()?.root)
    }

    pub fn config(&self) -> FsResult<Arc<MountConfig>> {
        Ok(Arc::clone(&self.mounted()?.config))
    }

    pub fn cache_policy(&self) -> FsResult<CachePolicy> {
        Ok(*self.mounted()?.resolver.policy())
    }

    /// Live node count, zero once unmounted
    pub fn node_count(&self) -> usize {
        self.mounted().map(|m| m.nodes.len()).unwrap_or(0)
    }

    /// Resolve one name in `parent` without turning a miss into an error
    pub fn resolve(&self, parent: NodeId, name: &[u8]) -> FsResult<Resolution> {
        let mount = self.mounted()?;
        mount.resolver.resolve_in(&mount.nodes, parent, name)
    }

    /// How long a host may cache `resolution`; zero for misses
    pub fn retention(&self, resolution: &Resolution) -> FsResult<Duration> {
        Ok(self.mounted()?.resolver.retention(resolution))
    }

    pub fn lookup(&self, parent: NodeId, name: &[u8]) -> FsResult<Attributes> {
        let mount = self.mounted()?;
        let id = mount.resolver.resolve_in(&mount.nodes, parent, name)?.into_result()?;
        Ok(mount.nodes.get(id)?.attributes())
    }

    /// Walk a slash-separated path from the root. `.` and `..` are honored and
    /// symlinks are not followed.
    pub fn lookup_path(&self, path: impl AsRef<[u8]>) -> FsResult<NodeId> {
        self.mounted()?.lookup_path(path.as_ref())
    }

    pub fn create(
        &self,
        parent: NodeId,
        name: &[u8],
        mode: u32,
        caller: Credentials,
    ) -> FsResult<Attributes> {
        self.mounted()?
            .create_entry(parent, name, NodeKind::RegularFile, mode, caller, Some(b""))
    }

    pub fn mkdir(
        &self,
        parent: NodeId,
        name: &[u8],
        mode: u32,
        caller: Credentials,
    ) -> FsResult<Attributes> {
        let kind = NodeKind::Directory {
            parent: Some(parent),
        };
        self.mounted()?.create_entry(parent, name, kind, mode, caller, None)
    }

    /// Create a FIFO, socket or device node. A regular-file type (or none)
    /// creates an empty file; directory and symlink types are refused.
    pub fn mknod(
        &self,
        parent: NodeId,
        name: &[u8],
        mode: u32,
        rdev: u64,
        caller: Credentials,
    ) -> FsResult<Attributes> {
        let mount = self.mounted()?;
        match mode & S_IFMT {
            0 => mount.create_entry(
                parent,
                name,
                NodeKind::RegularFile,
                S_IFREG | mode,
                caller,
                Some(b""),
            ),
            t if t == S_IFREG => {
                mount.create_entry(parent, name, NodeKind::RegularFile, mode, caller, Some(b""))
            }
            t if t == S_IFIFO || t == S_IFSOCK || t == S_IFCHR || t == S_IFBLK => {
                mount.create_entry(parent, name, NodeKind::Special { rdev }, mode, caller, None)
            }
            _ => Err(FsError::InvalidArgument),
        }
    }

    pub fn symlink(
        &self,
        parent: NodeId,
        name: &[u8],
        target: &[u8],
        caller: Credentials,
    ) -> FsResult<Attributes> {
        if target.is_empty() {
            return Err(FsError::InvalidArgument);
        }
        if target.len() > PATH_MAX {
            return Err(FsError::NameTooLong);
        }
        self.mounted()?
            .create_entry(parent, name, NodeKind::Symlink, 0o777, caller, Some(target))
    }

    /// Add a hard link to `node` named `new_name` in `new_parent`
    pub fn link(&self, node: NodeId, new_parent: NodeId, new_name: &[u8]) -> FsResult<Attributes> {
        self.mounted()?.link(node, new_parent, new_name)
    }

    pub fn unlink(&self, parent: NodeId, name: &[u8]) -> FsResult<()> {
        self.mounted()?.unlink(parent, name)
    }

    pub fn rmdir(&self, parent: NodeId, name: &[u8]) -> FsResult<()> {
        self.mounted()?.rmdir(parent, name)
    }

    /// Move an entry. An occupied target is `AlreadyExists`; nothing is
    /// replaced.
    pub fn rename(
        &self,
        old_parent: NodeId,
        old_name: &[u8],
        new_parent: NodeId,
        new_name: &[u8],
    ) -> FsResult<()> {
        self.mounted()?.rename(old_parent, old_name, new_parent, new_name)
    }

    pub fn getattr(&self, node: NodeId) -> FsResult<Attributes> {
        Ok(self.mounted()?.nodes.get(node)?.attributes())
    }

    pub fn setattr(&self, node: NodeId, changes: &SetAttr) -> FsResult<Attributes> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(node)?;
        {
            let mut meta = node.meta();
            if let Some(mode) = changes.mode {
                meta.mode = (meta.mode & S_IFMT) | (mode & PERMISSION_BITS);
            }
            if let Some(uid) = changes.uid {
                meta.uid = uid;
            }
            if let Some(gid) = changes.gid {
                meta.gid = gid;
            }
            if let Some(atime) = changes.atime {
                meta.times.atime = atime;
            }
            if let Some(mtime) = changes.mtime {
                meta.times.mtime = mtime;
            }
            meta.times.ctime = current_timestamp();
        }
        Ok(node.attributes())
    }

    pub fn readlink(&self, node: NodeId) -> FsResult<Vec<u8>> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(node)?;
        if node.node_type() != NodeType::Symlink {
            return Err(FsError::InvalidArgument);
        }
        let content = node.content().ok_or(FsError::NotFound)?;
        mount.nodes.byte_store().read(content)
    }

    /// Entries of a directory in listing order, without `.` and `..`
    pub fn readdir(&self, dir: NodeId) -> FsResult<Vec<DirEntry>> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(dir)?;
        let index = node.directory()?.read();
        Ok(index
            .iter()
            .filter_map(|(name, id)| {
                mount.nodes.get(id).ok().map(|child| DirEntry {
                    name: name.to_vec(),
                    id,
                    node_type: child.node_type(),
                })
            })
            .collect())
    }

    pub fn read(&self, node: NodeId, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(node)?;
        let content = file_content(&node)?;
        mount.nodes.byte_store().read_at(content, offset, buf)
    }

    pub fn write(&self, node: NodeId, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(node)?;
        let content = file_content(&node)?;

        // Holding the metadata lock keeps the recorded size in step with the store.
        let mut meta = node.meta();
        let written = mount.nodes.byte_store().write_at(content, offset, data)?;
        meta.size = meta.size.max(offset + written as u64);
        let now = current_timestamp();
        meta.times.mtime = now;
        meta.times.ctime = now;
        Ok(written)
    }

    pub fn truncate(&self, node: NodeId, len: u64) -> FsResult<()> {
        let mount = self.mounted()?;
        let node = mount.nodes.get(node)?;
        let content = file_content(&node)?;

        let mut meta = node.meta();
        mount.nodes.byte_store().truncate(content, len)?;
        meta.size = len;
        let now = current_timestamp();
        meta.times.mtime = now;
        meta.times.ctime = now;
        Ok(())
    }

    /// Take a counted reference; the node outlives its last link until released
    pub fn retain(&self, node: NodeId) -> FsResult<()> {
        self.mounted()?.nodes.retain(node)
    }

    pub fn release(&self, node: NodeId) -> FsResult<()> {
        self.mounted()?.nodes.release(node)
    }

    pub fn statfs(&self) -> FsResult<StatFs> {
        let mount = self.mounted()?;
        Ok(StatFs {
            magic: SAMPLEFS_MAGIC,
            block_size: BLOCK_SIZE,
            name_max: NAME_MAX as u32,
            files: mount.nodes.len() as u64,
            time_granularity_ns: 1,
        })
    }

    pub fn debug_info(&self) -> FsResult<DebugInfo> {
        let mount = self.mounted()?;
        Ok(DebugInfo {
            state: self.state(),
            root: mount.root,
            config: MountConfig::clone(&mount.config),
            nodes: mount.nodes.len(),
            directories: mount.nodes.directory_count(),
            lookups: mount.resolver.hits() + mount.resolver.misses(),
            negative_lookups: mount.resolver.misses(),
        })
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn file_content(node: &Node) -> FsResult<ContentId> {
    match node.node_type() {
        NodeType::RegularFile => node.content().ok_or(FsError::NotFound),
        NodeType::Directory => Err(FsError::IsADirectory),
        _ => Err(FsError::InvalidArgument),
    }
}

type IndexGuard<'a> = RwLockWriteGuard<'a, DirectoryIndex>;

/// Write-lock two distinct directories in ascending id order
fn write_pair<'a>(a: &'a Node, b: &'a Node) -> FsResult<(IndexGuard<'a>, IndexGuard<'a>)> {
    let (index_a, index_b) = (a.directory()?, b.directory()?);
    if a.id() < b.id() {
        let guard_a = index_a.write();
        Ok((guard_a, index_b.write()))
    } else {
        let guard_b = index_b.write();
        Ok((index_a.write(), guard_b))
    }
}

impl Mount {
    fn lookup_path(&self, path: &[u8]) -> FsResult<NodeId> {
        let mut current = self.root;
        for component in path.split(|b| *b == b'/') {
            match component {
                b"" => {}
                b"." => {
                    self.nodes.get(current)?.directory()?;
                }
                b".." => {
                    let node = self.nodes.get(current)?;
                    node.directory()?;
                    current = node.meta().parent.unwrap_or(self.root);
                }
                name => {
                    current = self.resolver.resolve_in(&self.nodes, current, name)?.into_result()?;
                }
            }
        }
        Ok(current)
    }

    /// Shared creation path: confirm the name is free, allocate, inherit a
    /// setgid parent's group, store content, insert, then account the entry
    /// on the parent. All of it under the parent's write lock.
    fn create_entry(
        &self,
        parent: NodeId,
        name: &[u8],
        kind: NodeKind,
        mode: u32,
        caller: Credentials,
        content: Option<&[u8]>,
    ) -> FsResult<Attributes> {
        validate_name(name)?;
        let dir = self.nodes.get(parent)?;
        let mut index = dir.directory()?.write();
        if index.is_removed() {
            return Err(FsError::NotFound);
        }
        if self.resolver.resolve(&index, name)?.is_found() {
            return Err(FsError::AlreadyExists);
        }

        let mut owner = caller;
        let mut mode = mode;
        {
            let parent_meta = dir.meta();
            if parent_meta.mode & S_ISGID != 0 {
                owner.gid = parent_meta.gid;
                if matches!(kind, NodeKind::Directory { .. }) {
                    mode |= S_ISGID;
                }
            }
        }

        let node = self.nodes.allocate(kind, owner, mode)?;
        let id = node.id();
        if let Some(bytes) = content {
            if let Err(err) = self.nodes.attach_content(&node, bytes) {
                debug!(target: "samplefs", "storing content of {} failed, rolling back: {}", id, err);
                self.nodes.abandon(id);
                return Err(err);
            }
        }
        if let Err(err) = index.insert(name, id) {
            self.nodes.abandon(id);
            return Err(err);
        }
        if node.is_dir() {
            if let Err(err) = self.nodes.link(parent) {
                let _ = index.remove(name);
                self.nodes.abandon(id);
                return Err(err);
            }
        }
        {
            let mut parent_meta = dir.meta();
            let now = current_timestamp();
            parent_meta.times.mtime = now;
            parent_meta.times.ctime = now;
            parent_meta.size += DIR_ENTRY_SIZE;
        }
        drop(index);

        let attrs = node.attributes();
        self.nodes.release(id)?;
        debug!(
            target: "samplefs",
            "created {} {:?} as {} in {}",
            attrs.node_type,
            String::from_utf8_lossy(name),
            id,
            parent
        );
        Ok(attrs)
    }

    fn link(&self, id: NodeId, new_parent: NodeId, new_name: &[u8]) -> FsResult<Attributes> {
        validate_name(new_name)?;
        let node = self.nodes.get(id)?;
        if node.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let dir = self.nodes.get(new_parent)?;
        {
            let mut index = dir.directory()?.write();
            if index.is_removed() {
                return Err(FsError::NotFound);
            }
            if self.resolver.resolve(&index, new_name)?.is_found() {
                return Err(FsError::AlreadyExists);
            }
            self.nodes.link(id)?;
            if let Err(err) = index.insert(new_name, id) {
                let _ = self.nodes.unlink(id);
                return Err(err);
            }
        }
        dir.touch();
        node.touch_ctime();
        Ok(node.attributes())
    }

    fn unlink(&self, parent: NodeId, name: &[u8]) -> FsResult<()> {
        let dir = self.nodes.get(parent)?;
        let child = {
            let mut index = dir.directory()?.write();
            let child = self.resolver.resolve(&index, name)?.into_result()?;
            let child_node = self.nodes.get(child)?;
            if child_node.is_dir() {
                return Err(FsError::IsADirectory);
            }
            index.remove(name)?;
            child_node.touch_ctime();
            child
        };
        dir.touch();
        self.nodes.unlink(child)?;
        Ok(())
    }

    fn rmdir(&self, parent: NodeId, name: &[u8]) -> FsResult<()> {
        let dir = self.nodes.get(parent)?;
        let child = self.resolver.resolve_in(&self.nodes, parent, name)?.into_result()?;
        let child_node = self.nodes.get(child)?;
        if !child_node.is_dir() {
            return Err(FsError::NotADirectory);
        }

        {
            let (mut parent_index, mut child_index) = write_pair(&dir, &child_node)?;
            // The entry may have moved while no lock was held.
            if parent_index.lookup(name) != Some(child) {
                return Err(FsError::NotFound);
            }
            if !child_index.is_empty() {
                return Err(FsError::DirectoryNotEmpty);
            }
            child_index.mark_removed();
            parent_index.remove(name)?;
        }
        dir.touch();

        // Self link and the parent's entry, then the child's `..` on the parent.
        self.nodes.unlink(child)?;
        self.nodes.unlink(child)?;
        self.nodes.unlink(parent)?;
        Ok(())
    }

    fn rename(
        &self,
        old_parent: NodeId,
        old_name: &[u8],
        new_parent: NodeId,
        new_name: &[u8],
    ) -> FsResult<()> {
        validate_name(new_name)?;
        if old_name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }

        if old_parent == new_parent {
            let dir = self.nodes.get(old_parent)?;
            let child = {
                let mut index = dir.directory()?.write();
                let child = self.resolver.resolve(&index, old_name)?.into_result()?;
                index.rename_within(old_name, new_name)?;
                child
            };
            dir.touch();
            if let Ok(node) = self.nodes.get(child) {
                node.touch_ctime();
            }
            return Ok(());
        }

        let _serial = self.rename_lock.lock();
        let old_dir = self.nodes.get(old_parent)?;
        let new_dir = self.nodes.get(new_parent)?;
        let child = self.resolver.resolve_in(&self.nodes, old_parent, old_name)?.into_result()?;
        let child_node = self.nodes.get(child)?;
        if child_node.is_dir() && self.is_ancestor(child, new_parent)? {
            return Err(FsError::InvalidArgument);
        }

        {
            let (mut old_index, mut new_index) = write_pair(&old_dir, &new_dir)?;
            if old_index.lookup(old_name) != Some(child) {
                return Err(FsError::NotFound);
            }
            if self.resolver.resolve(&new_index, new_name)?.is_found() {
                return Err(FsError::AlreadyExists);
            }
            new_index.insert(new_name, child)?;
            old_index.remove(old_name)?;
        }
        old_dir.touch();
        new_dir.touch();
        child_node.touch_ctime();

        if child_node.is_dir() {
            child_node.meta().parent = Some(new_parent);
            self.nodes.link(new_parent)?;
            self.nodes.unlink(old_parent)?;
        }
        debug!(target: "samplefs", "moved {} from {} to {}", child, old_parent, new_parent);
        Ok(())
    }

    /// Whether `ancestor` is `id` or lies on the parent chain above it
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> FsResult<bool> {
        let mut current = id;
        loop {
            if current == ancestor {
                return Ok(true);
            }
            if current == self.root {
                return Ok(false);
            }
            let parent = self.nodes.get(current)?.meta().parent;
            match parent {
                Some(next) if next != current => current = next,
                _ => return Ok(false),
            }
        }
    }

    /// Unlink everything reachable from the root, children before parents,
    /// then force out whatever callers still hold. Returns (released, busy).
    fn teardown(self) -> (usize, usize) {
        let mut released = 0;
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if self.nodes.drop_links(id) {
                    released += 1;
                }
                continue;
            }
            let Ok(node) = self.nodes.get(id) else {
                continue;
            };
            stack.push((id, true));
            if let Ok(index) = node.directory() {
                let mut index = index.write();
                index.mark_removed();
                stack.extend(index.drain().into_iter().map(|(_, child)| (child, false)));
            }
        }

        if self.nodes.release(self.root).is_ok() && !self.nodes.contains(self.root) {
            released += 1;
        }
        let busy = self.nodes.evict_all();
        debug!(target: "samplefs", "teardown released {} nodes, evicted {}", released, busy);
        (released, busy)
    }
}
