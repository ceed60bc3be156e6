// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mount option parsing
//!
//! Options are a comma-separated list of `key` or `key=value` tokens. Parsing
//! is best effort: unknown keys become diagnostics, bad values are dropped, and
//! nothing here can fail a mount.

use tracing::{debug, info};

use crate::casefold::CodeTable;
use crate::config::MountConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Apply `options` to `config`, reporting unrecognized tokens to `diagnostics`.
pub fn parse_mount_options(
    options: &str,
    config: &mut MountConfig,
    diagnostics: &dyn DiagnosticSink,
) {
    if options.is_empty() {
        return;
    }
    info!(target: "samplefs", "parsing mount options {}", options);

    for token in options.split(',') {
        if token.is_empty() {
            continue;
        }
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (token, None),
        };

        if key.eq_ignore_ascii_case("rsize") {
            if let Some(size) = value.and_then(parse_size) {
                config.rsize = size;
                info!(target: "samplefs", "rsize {}", size);
            } else {
                debug!(target: "samplefs", "ignoring rsize value {:?}", value);
            }
        } else if key.eq_ignore_ascii_case("wsize") {
            if let Some(size) = value.and_then(parse_size) {
                config.wsize = size;
                info!(target: "samplefs", "wsize {}", size);
            } else {
                debug!(target: "samplefs", "ignoring wsize value {:?}", value);
            }
        } else if key.eq_ignore_ascii_case("nocase") || key.eq_ignore_ascii_case("ignorecase") {
            config.case_insensitive = true;
            info!(target: "samplefs", "ignore case");
        } else if key.eq_ignore_ascii_case("iocharset") {
            let name = value.unwrap_or_default();
            match CodeTable::by_name(name) {
                Some(table) => {
                    config.code_table = table;
                    info!(target: "samplefs", "iocharset {}", table.name());
                }
                None => diagnostics.report(&Diagnostic::UnknownCharset {
                    name: name.to_string(),
                }),
            }
        } else {
            diagnostics.report(&Diagnostic::BadMountOption {
                option: token.to_string(),
            });
        }
    }
}

/// A positive size that fits in `u32`; anything else is ignored by the caller
fn parse_size(value: &str) -> Option<u32> {
    parse_c_ulong(value)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
}

/// Unsigned integer with C `strtoul(.., 0)` prefixes: `0x` hex, leading `0`
/// octal, decimal otherwise. Parsing stops at the first non-digit; `None` when
/// no digit was consumed or the value overflows.
fn parse_c_ulong(value: &str) -> Option<u64> {
    let bytes = value.as_bytes();
    let (radix, digits) = match bytes {
        [b'0', b'x' | b'X', rest @ ..] if rest.first().is_some_and(u8::is_ascii_hexdigit) => {
            (16, rest)
        }
        [b'0', ..] => (8, bytes),
        _ => (10, bytes),
    };

    let mut result: u64 = 0;
    let mut consumed = 0;
    for &b in digits {
        let Some(digit) = (b as char).to_digit(radix) else {
            break;
        };
        result = result.checked_mul(radix as u64)?.checked_add(digit as u64)?;
        consumed += 1;
    }
    (consumed > 0).then_some(result)
}
