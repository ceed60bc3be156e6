// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-mount configuration

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::casefold::{CaseFolder, CodeTable};

/// Tunables of one mount, produced by the option parser and frozen once the
/// mount completes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MountConfig {
    /// Case-insensitive name comparison (`nocase` / `ignorecase`)
    pub case_insensitive: bool,
    /// Read size hint in bytes; 0 means unset
    pub rsize: u32,
    /// Write size hint in bytes; 0 means unset
    pub wsize: u32,
    /// Table used for case folding
    #[serde(serialize_with = "serialize_code_table")]
    pub code_table: &'static CodeTable,
}

fn serialize_code_table<S: Serializer>(
    table: &&'static CodeTable,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(table.name())
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            rsize: 0,
            wsize: 0,
            code_table: CodeTable::default_table(),
        }
    }
}

impl MountConfig {
    /// Comparison policy for directory lookups on this mount
    pub fn case_folder(&self) -> CaseFolder {
        if self.case_insensitive {
            CaseFolder::folding(self.code_table)
        } else {
            CaseFolder::EXACT
        }
    }

    pub fn rsize(&self) -> Option<u32> {
        (self.rsize > 0).then_some(self.rsize)
    }

    pub fn wsize(&self) -> Option<u32> {
        (self.wsize > 0).then_some(self.wsize)
    }
}

/// Retention hints for hosts that keep their own lookup cache (e.g. a FUSE
/// adapter answering `lookup` with entry timeouts).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    pub entry_ttl: Duration,
    pub attr_ttl: Duration,
}

impl CachePolicy {
    /// Failed lookups are never retained.
    pub const fn negative_ttl(&self) -> Duration {
        Duration::ZERO
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(1),
            attr_ttl: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casefold::ISO8859_1;

    #[test]
    fn default_config_is_case_sensitive_and_unset() {
        let config = MountConfig::default();
        assert!(!config.case_insensitive);
        assert_eq!(config.rsize(), None);
        assert_eq!(config.wsize(), None);
        assert!(!config.case_folder().is_folding());
    }

    #[test]
    fn case_folder_follows_flag_and_table() {
        let config = MountConfig {
            case_insensitive: true,
            code_table: &ISO8859_1,
            ..Default::default()
        };
        let folder = config.case_folder();
        assert!(folder.is_folding());
        assert_eq!(folder.fold(0xC0), 0xE0);
    }

    #[test]
    fn config_serializes_table_by_name() {
        let config = MountConfig {
            rsize: 4096,
            ..Default::default()
        };
        let json = serde_json::to_value(&config).expect("serialize config");
        assert_eq!(json["rsize"], 4096);
        assert_eq!(json["code_table"], "utf8");
    }

    #[test]
    fn negative_ttl_is_always_zero() {
        let policy = CachePolicy {
            entry_ttl: Duration::from_secs(30),
            attr_ttl: Duration::from_secs(30),
        };
        assert_eq!(policy.negative_ttl(), Duration::ZERO);
    }
}
