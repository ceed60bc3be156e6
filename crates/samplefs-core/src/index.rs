// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-directory name index
//!
//! Keys hash and compare through the directory's [`CaseFolder`], so with case
//! folding active `File.txt` and `FILE.TXT` land in the same bucket and are the
//! same key. The spelling a name was inserted with is kept for listing. Entries
//! enumerate in insertion order.

use indexmap::{Equivalent, IndexMap};
use std::hash::{Hash, Hasher};

use crate::casefold::CaseFolder;
use crate::error::{FsError, FsResult};
use crate::types::{NodeId, NAME_MAX};

struct IndexKey {
    name: Box<[u8]>,
    folder: CaseFolder,
}

impl Hash for IndexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.folder.name_hash(&self.name));
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.folder.names_equal(&self.name, &other.name)
    }
}

impl Eq for IndexKey {}

/// Borrowed lookup key; hashes exactly like [`IndexKey`]
struct Probe<'a> {
    name: &'a [u8],
    folder: CaseFolder,
}

impl Hash for Probe<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.folder.name_hash(self.name));
    }
}

impl Equivalent<IndexKey> for Probe<'_> {
    fn equivalent(&self, key: &IndexKey) -> bool {
        self.folder.names_equal(self.name, &key.name)
    }
}

/// Check a name before it is stored: length first, then shape.
pub fn validate_name(name: &[u8]) -> FsResult<()> {
    if name.len() > NAME_MAX {
        return Err(FsError::NameTooLong);
    }
    if name.is_empty() || name == b"." || name == b".." || name.contains(&b'/') || name.contains(&0)
    {
        return Err(FsError::InvalidArgument);
    }
    Ok(())
}

/// Name-to-child mapping owned by one directory node
pub struct DirectoryIndex {
    folder: CaseFolder,
    entries: IndexMap<IndexKey, NodeId>,
    /// Set once the directory itself has been removed; no further inserts
    removed: bool,
}

impl DirectoryIndex {
    pub fn new(folder: CaseFolder) -> Self {
        Self {
            folder,
            entries: IndexMap::new(),
            removed: false,
        }
    }

    pub fn case_folder(&self) -> CaseFolder {
        self.folder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn probe<'a>(&self, name: &'a [u8]) -> Probe<'a> {
        Probe {
            name,
            folder: self.folder,
        }
    }

    pub fn insert(&mut self, name: &[u8], child: NodeId) -> FsResult<()> {
        validate_name(name)?;
        if self.removed {
            return Err(FsError::NotFound);
        }
        if self.entries.contains_key(&self.probe(name)) {
            return Err(FsError::AlreadyExists);
        }
        self.entries.insert(
            IndexKey {
                name: name.into(),
                folder: self.folder,
            },
            child,
        );
        Ok(())
    }

    pub fn lookup(&self, name: &[u8]) -> Option<NodeId> {
        self.entries.get(&self.probe(name)).copied()
    }

    /// Stored spelling and child of the entry matching `name`
    pub fn entry(&self, name: &[u8]) -> Option<(&[u8], NodeId)> {
        self.entries.get_key_value(&self.probe(name)).map(|(k, v)| (&*k.name, *v))
    }

    pub fn remove(&mut self, name: &[u8]) -> FsResult<NodeId> {
        self.entries.shift_remove(&self.probe(name)).ok_or(FsError::NotFound)
    }

    /// Rename an entry in place. Renaming onto an occupied name fails; a
    /// rename between two case-equal spellings of the same entry rewrites the
    /// stored spelling.
    pub fn rename_within(&mut self, old_name: &[u8], new_name: &[u8]) -> FsResult<()> {
        validate_name(new_name)?;
        let same_entry = self.folder.names_equal(old_name, new_name);
        if !same_entry && self.lookup(new_name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let child = self.remove(old_name)?;
        self.entries.insert(
            IndexKey {
                name: new_name.into(),
                folder: self.folder,
            },
            child,
        );
        Ok(())
    }

    /// Entries in listing order
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], NodeId)> + '_ {
        self.entries.iter().map(|(k, v)| (&*k.name, *v))
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn drain(&mut self) -> Vec<(Box<[u8]>, NodeId)> {
        self.entries.drain(..).map(|(k, v)| (k.name, v)).collect()
    }
}

impl std::fmt::Debug for DirectoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(name, id)| (String::from_utf8_lossy(name), id)))
            .finish()
    }
}
