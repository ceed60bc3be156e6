// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Diagnostics emitted by mount-option parsing and the mount lifecycle.
//!
//! Diagnostics never change control flow; they are reported to a sink and the
//! operation carries on.

use parking_lot::Mutex;

use crate::types::NodeId;

/// A human-readable event worth surfacing to an operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// An option token that is not recognized
    BadMountOption { option: String },
    /// `iocharset=` named a table that does not exist
    UnknownCharset { name: String },
    Mounted { root: NodeId },
    Unmounted { released: usize },
    /// Nodes still retained by callers when the mount was torn down
    BusyNodesAfterUnmount { count: usize },
    /// Releasing stored bytes for a destroyed node failed
    ReleaseFailed { id: NodeId, error: String },
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::Mounted { .. } | Diagnostic::Unmounted { .. })
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::BadMountOption { option } => write!(f, "bad mount option {}", option),
            Diagnostic::UnknownCharset { name } => {
                write!(f, "unknown iocharset {}, keeping default", name)
            }
            Diagnostic::Mounted { root } => write!(f, "mounted, root node {}", root),
            Diagnostic::Unmounted { released } => {
                write!(f, "unmounted, released {} nodes", released)
            }
            Diagnostic::BusyNodesAfterUnmount { count } => {
                write!(f, "{} busy nodes after unmount", count)
            }
            Diagnostic::ReleaseFailed { id, error } => {
                write!(f, "failed to release storage of node {}: {}", id, error)
            }
        }
    }
}

/// Receiver of diagnostics
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: forwards every diagnostic to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, diagnostic: &Diagnostic) {
        if diagnostic.is_warning() {
            tracing::warn!(target: "samplefs", "{}", diagnostic);
        } else {
            tracing::info!(target: "samplefs", "{}", diagnostic);
        }
    }
}

/// Sink that keeps every diagnostic in memory, also forwarding to `tracing`
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.entries.lock().iter().filter(|d| d.is_warning()).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report(&self, diagnostic: &Diagnostic) {
        TracingDiagnostics.report(diagnostic);
        self.entries.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_separates_warnings() {
        let sink = CollectingDiagnostics::new();
        sink.report(&Diagnostic::Mounted { root: NodeId(1) });
        sink.report(&Diagnostic::BadMountOption {
            option: "bogus=1".to_string(),
        });

        assert_eq!(sink.entries().len(), 2);
        assert_eq!(
            sink.warnings(),
            vec![Diagnostic::BadMountOption {
                option: "bogus=1".to_string()
            }]
        );

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn display_names_the_offending_option() {
        let diag = Diagnostic::BadMountOption {
            option: "bogus=1".to_string(),
        };
        assert_eq!(diag.to_string(), "bad mount option bogus=1");
    }
}
