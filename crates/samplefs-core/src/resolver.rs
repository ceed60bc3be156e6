// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Single-component name resolution
//!
//! A miss yields [`Resolution::NotFound`], which hosts must not retain: its
//! retention is always zero, whatever the configured entry TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::CachePolicy;
use crate::error::{FsError, FsResult};
use crate::index::DirectoryIndex;
use crate::node::NodeStore;
use crate::types::{NodeId, NAME_MAX};

/// Outcome of resolving one name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn node(self) -> Option<NodeId> {
        match self {
            Resolution::Found(id) => Some(id),
            Resolution::NotFound => None,
        }
    }

    pub fn into_result(self) -> FsResult<NodeId> {
        self.node().ok_or(FsError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct NameResolver {
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NameResolver {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look `name` up in an already locked directory index
    pub fn resolve(&self, index: &DirectoryIndex, name: &[u8]) -> FsResult<Resolution> {
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        match index.lookup(name) {
            Some(id) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Resolution::Found(id))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(Resolution::NotFound)
            }
        }
    }

    /// Take the directory's read lock and resolve `name` in it
    pub fn resolve_in(&self, nodes: &NodeStore, dir: NodeId, name: &[u8]) -> FsResult<Resolution> {
        let node = nodes.get(dir)?;
        let index = node.directory()?.read();
        if index.is_removed() {
            return Ok(Resolution::NotFound);
        }
        self.resolve(&index, name)
    }

    /// How long a host may keep `resolution` in its own cache
    pub fn retention(&self, resolution: &Resolution) -> Duration {
        match resolution {
            Resolution::Found(_) => self.policy.entry_ttl,
            Resolution::NotFound => self.policy.negative_ttl(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Failed lookups, each discarded on creation
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
