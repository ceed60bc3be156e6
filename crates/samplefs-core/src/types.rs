// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for samplefs

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// File-type mask of a mode word
pub const S_IFMT: u32 = libc::S_IFMT as u32;
pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
pub const S_IFREG: u32 = libc::S_IFREG as u32;
pub const S_IFLNK: u32 = libc::S_IFLNK as u32;
pub const S_IFCHR: u32 = libc::S_IFCHR as u32;
pub const S_IFBLK: u32 = libc::S_IFBLK as u32;
pub const S_IFIFO: u32 = libc::S_IFIFO as u32;
pub const S_IFSOCK: u32 = libc::S_IFSOCK as u32;
pub const S_ISGID: u32 = libc::S_ISGID as u32;

/// Permission and set-id bits of a mode word
pub const PERMISSION_BITS: u32 = 0o7777;

/// Longest accepted path component, in bytes
pub const NAME_MAX: usize = 255;

/// Opaque node identifier, unique for the lifetime of a mount
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to bytes held by the byte store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub u64);

impl ContentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Node kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Directory,
    RegularFile,
    Symlink,
    /// FIFO, socket, or device node; the mode's file-type bits tell which
    Special,
}

impl NodeType {
    /// Classify the file-type bits of a mode word. A zero type means regular file.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            0 => Some(NodeType::RegularFile),
            t if t == S_IFREG => Some(NodeType::RegularFile),
            t if t == S_IFDIR => Some(NodeType::Directory),
            t if t == S_IFLNK => Some(NodeType::Symlink),
            t if t == S_IFIFO || t == S_IFSOCK || t == S_IFCHR || t == S_IFBLK => {
                Some(NodeType::Special)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeType::Directory => "directory",
            NodeType::RegularFile => "file",
            NodeType::Symlink => "symlink",
            NodeType::Special => "special",
        };
        f.write_str(s)
    }
}

/// Identity of the caller on whose behalf a node is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub const ROOT: Credentials = Credentials { uid: 0, gid: 0 };

    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::ROOT
    }
}

/// Node timestamps, in nanoseconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTimes {
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileTimes {
    pub fn now() -> Self {
        let now = current_timestamp();
        Self {
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}

/// Current wall-clock time with nanosecond granularity
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Node attributes
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Full mode word, file-type bits included
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub size: u64,
    pub rdev: u64,
    pub times: FileTimes,
}

impl Attributes {
    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    pub fn permissions(&self) -> u32 {
        self.mode & PERMISSION_BITS
    }
}

/// Attribute changes applied by `Namespace::setattr`; `None` leaves a field untouched
#[derive(Clone, Debug, Default)]
pub struct SetAttr {
    /// Permission bits only; file-type bits are ignored
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub atime: Option<i64>,
    pub mtime: Option<i64>,
}

/// Directory entry information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub id: NodeId,
    pub node_type: NodeType,
}

impl DirEntry {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Filesystem statistics
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatFs {
    pub magic: u32,
    pub block_size: u32,
    pub name_max: u32,
    pub files: u64,
    pub time_granularity_ns: u32,
}
