// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte-wise case folding over a mount's code table
//!
//! Folding is a plain table lookup: no locale rules, no multi-byte
//! normalization. Two names are case-equal when they have the same length and
//! fold to the same bytes position by position.

/// A 256-entry lower-casing table for one character set
pub struct CodeTable {
    name: &'static str,
    lower: [u8; 256],
}

const fn ascii_lower() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = if i >= b'A' as usize && i <= b'Z' as usize {
            (i + 0x20) as u8
        } else {
            i as u8
        };
        i += 1;
    }
    table
}

const fn latin1_lower() -> [u8; 256] {
    let mut table = ascii_lower();
    let mut i = 0xC0;
    while i <= 0xDE {
        // 0xD7 is the multiplication sign, not a letter
        if i != 0xD7 {
            table[i] = (i + 0x20) as u8;
        }
        i += 1;
    }
    table
}

/// UTF-8 names: only ASCII letters fold, multi-byte sequences pass through
pub static UTF8: CodeTable = CodeTable {
    name: "utf8",
    lower: ascii_lower(),
};

/// ISO 8859-1 (Latin-1)
pub static ISO8859_1: CodeTable = CodeTable {
    name: "iso8859-1",
    lower: latin1_lower(),
};

impl CodeTable {
    /// The table a mount starts with
    pub fn default_table() -> &'static CodeTable {
        &UTF8
    }

    /// Look up a table by its charset name, ignoring ASCII case
    pub fn by_name(name: &str) -> Option<&'static CodeTable> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(&UTF8),
            "iso8859-1" | "iso-8859-1" | "latin1" => Some(&ISO8859_1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn to_lower(&self, byte: u8) -> u8 {
        self.lower[byte as usize]
    }
}

impl std::fmt::Debug for CodeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CodeTable").field(&self.name).finish()
    }
}

impl PartialEq for CodeTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Case policy of a mount: identity when case-sensitive, table lookup otherwise
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaseFolder {
    table: Option<&'static CodeTable>,
}

impl CaseFolder {
    /// Byte-exact comparison
    pub const EXACT: CaseFolder = CaseFolder { table: None };

    pub fn folding(table: &'static CodeTable) -> Self {
        Self { table: Some(table) }
    }

    pub fn is_folding(&self) -> bool {
        self.table.is_some()
    }

    #[inline]
    pub fn fold(&self, byte: u8) -> u8 {
        match self.table {
            Some(table) => table.to_lower(byte),
            None => byte,
        }
    }

    /// Equality under this policy
    pub fn names_equal(&self, a: &[u8], b: &[u8]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.fold(*x) == self.fold(*y))
    }

    /// Name hash over folded bytes, so case-equal names always hash alike.
    ///
    /// Uses the classic dcache mixing step `(h + (c << 4) + (c >> 4)) * 11`.
    pub fn name_hash(&self, name: &[u8]) -> u64 {
        let mut hash: u64 = 0;
        for &byte in name {
            let c = self.fold(byte) as u64;
            hash = hash.wrapping_add(c << 4).wrapping_add(c >> 4).wrapping_mul(11);
        }
        hash
    }
}

impl Default for CaseFolder {
    fn default() -> Self {
        Self::EXACT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_total_and_identity_when_exact() {
        for b in 0..=255u8 {
            assert_eq!(CaseFolder::EXACT.fold(b), b);
            // every byte has a defined image
            let _ = CaseFolder::folding(&ISO8859_1).fold(b);
        }
    }

    #[test]
    fn utf8_table_folds_ascii_only() {
        let folder = CaseFolder::folding(&UTF8);
        assert_eq!(folder.fold(b'A'), b'a');
        assert_eq!(folder.fold(b'z'), b'z');
        assert_eq!(folder.fold(b'@'), b'@');
        assert_eq!(folder.fold(0xC3), 0xC3);
    }

    #[test]
    fn latin1_table_folds_accented_capitals() {
        let folder = CaseFolder::folding(&ISO8859_1);
        assert_eq!(folder.fold(0xC9), 0xE9); // É -> é
        assert_eq!(folder.fold(0xD7), 0xD7); // ×
        assert_eq!(folder.fold(0xDF), 0xDF); // ß has no capital here
    }

    #[test]
    fn names_equal_requires_equal_length() {
        let folder = CaseFolder::folding(&UTF8);
        assert!(folder.names_equal(b"File.TXT", b"file.txt"));
        assert!(!folder.names_equal(b"file", b"files"));
        assert!(!CaseFolder::EXACT.names_equal(b"File", b"file"));
    }

    #[test]
    fn case_equal_names_share_a_hash() {
        let folder = CaseFolder::folding(&UTF8);
        assert_eq!(folder.name_hash(b"README.md"), folder.name_hash(b"readme.MD"));
        assert_ne!(
            CaseFolder::EXACT.name_hash(b"README.md"),
            CaseFolder::EXACT.name_hash(b"readme.md")
        );
    }

    #[test]
    fn tables_resolve_by_name() {
        assert_eq!(CodeTable::by_name("UTF-8").map(|t| t.name()), Some("utf8"));
        assert_eq!(CodeTable::by_name("latin1").map(|t| t.name()), Some("iso8859-1"));
        assert!(CodeTable::by_name("koi8-r").is_none());
    }
}
