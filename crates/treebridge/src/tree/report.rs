// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-row reports and printable tree summaries.

use crate::error::BranchError;
use std::fmt;

/// Outcome of a successful `fill` or `get_entry`.
///
/// The engine call succeeded; branches listed in `branch_errors` were
/// skipped (their previous buffer contents were committed, or their host
/// value was left as it was).
#[derive(Debug, Default)]
pub struct RowReport {
    /// Bytes reported by the engine.
    pub bytes: i64,
    pub branch_errors: Vec<BranchError>,
}

impl RowReport {
    /// No branch failed.
    pub fn is_clean(&self) -> bool {
        self.branch_errors.is_empty()
    }
}

/// One line of a [`TreeSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSummary {
    pub name: String,
    /// Engine type (class name or scalar typedef).
    pub type_name: String,
    pub mode: String,
    pub enabled: bool,
    /// Current buffer capacity in bytes.
    pub buffer_capacity: usize,
}

/// Printable description of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub name: String,
    pub title: String,
    pub entries: i64,
    pub branches: Vec<BranchSummary>,
    pub leaves: Vec<String>,
}

const RULE: &str =
    "******************************************************************************";

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "*Tree    :{:<10}: {}", self.name, self.title)?;
        writeln!(f, "*Entries :{:>10}", self.entries)?;
        writeln!(f, "{}", RULE)?;
        for (i, b) in self.branches.iter().enumerate() {
            writeln!(
                f,
                "*Br {:>4} :{:<10}: {} ({}){}",
                i,
                b.name,
                b.type_name,
                b.mode,
                if b.enabled { "" } else { " [disabled]" }
            )?;
            writeln!(f, "*         | buffer {} bytes", b.buffer_capacity)?;
        }
        if !self.leaves.is_empty() {
            writeln!(f, "*Leaves  : {}", self.leaves.join(", "))?;
        }
        write!(f, "{}", RULE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = TreeSummary {
            name: "tree".into(),
            title: "my tree title".into(),
            entries: 10,
            branches: vec![BranchSummary {
                name: "evt_i".into(),
                type_name: "Long64_t".into(),
                mode: "leaf evt_i/L".into(),
                enabled: false,
                buffer_capacity: 8,
            }],
            leaves: vec!["evt_i".into()],
        };
        let text = summary.to_string();
        assert!(text.contains("*Tree    :tree      : my tree title"));
        assert!(text.contains("*Entries :        10"));
        assert!(text.contains("evt_i     : Long64_t (leaf evt_i/L) [disabled]"));
        assert!(text.ends_with(RULE));
    }
}
