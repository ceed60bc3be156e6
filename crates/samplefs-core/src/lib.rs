// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! samplefs core: a volatile, memory-only hierarchical namespace
//!
//! Nodes (directories, regular files, symlinks, special files) live in a
//! [`NodeStore`]; each directory owns a [`DirectoryIndex`] whose names compare
//! byte-exactly or case-folded depending on the mount's [`MountConfig`].
//! A [`Namespace`] ties one mount together, from option parsing to teardown.

pub mod casefold;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod index;
pub mod namespace;
pub mod node;
pub mod options;
pub mod resolver;
pub mod storage;
pub mod testing;
pub mod types;

pub use casefold::{CaseFolder, CodeTable, ISO8859_1, UTF8};
pub use config::{CachePolicy, MountConfig};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticSink, TracingDiagnostics};
pub use error::{FsError, FsResult};
pub use index::DirectoryIndex;
pub use namespace::{
    DebugInfo, MountParams, MountState, Namespace, BLOCK_SIZE, DIR_ENTRY_SIZE, SAMPLEFS_MAGIC,
};
pub use node::{Node, NodeKind, NodeStore};
pub use options::parse_mount_options;
pub use resolver::{NameResolver, Resolution};
pub use storage::{ByteStore, InMemoryStore};
pub use types::*;
