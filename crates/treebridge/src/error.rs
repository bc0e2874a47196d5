// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the marshaling layer.
//!
//! Errors fall in two groups: failures that abort the call that raised them
//! (`UnsupportedKind`, `DuplicateBranch`, `TreeClosed`, `EngineFailure`, ...)
//! and per-branch failures collected during `fill` / `get_entry`
//! (`FieldMismatch`, `HostBorrowed`, `Engine`), which are reported in a
//! [`BranchError`] batch without stopping sibling branches.

use crate::engine::EngineError;
use std::fmt;

/// Engine row-level operation that reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    /// `commit_row` (write one row).
    Commit,
    /// `fetch_row` (read one row).
    Fetch,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineOp::Commit => write!(f, "commit_row"),
            EngineOp::Fetch => write!(f, "fetch_row"),
        }
    }
}

/// Error raised by a single branch during `fill` or `get_entry`.
#[derive(Debug)]
pub struct BranchError {
    /// Branch name.
    pub branch: String,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for BranchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch [{}]: {}", self.branch, self.error)
    }
}

/// Errors returned by treebridge operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Type Errors
    // ========================================================================
    /// A type (or one of its fields) cannot be described with a supported kind.
    UnsupportedKind {
        /// Host type path.
        type_name: String,
        /// Offending field, if the failure is field-specific.
        field: Option<String>,
        /// Human-readable reason.
        reason: String,
    },
    /// A value's runtime shape diverges from its cached descriptor.
    FieldMismatch {
        /// Dotted path of the field (`evt.hits[2].e`).
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    // ========================================================================
    // Tree Errors
    // ========================================================================
    /// Branch name already bound with an incompatible type or mode.
    DuplicateBranch {
        /// Branch name.
        name: String,
        /// Type currently bound under that name.
        existing: String,
        /// Type the caller tried to bind.
        requested: String,
    },
    /// Branch name not bound in this tree.
    UnknownBranch(String),
    /// Operation attempted after the tree was closed.
    TreeClosed,
    /// Operation requires an engine-side tree that has not been created yet.
    TreeUnbound,
    /// Host value is already borrowed elsewhere and cannot be accessed.
    HostBorrowed {
        /// Branch name.
        branch: String,
    },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// Row commit/fetch returned a non-positive byte count.
    ///
    /// Per-branch errors collected before the engine call are carried along.
    EngineFailure {
        /// Failing operation.
        operation: EngineOp,
        /// Byte count reported by the engine.
        bytes: i64,
        /// Branch errors collected during the same call.
        branch_errors: Vec<BranchError>,
    },
    /// The engine rejected a collaborator call (class registration, branch creation).
    Engine(EngineError),
    /// The engine is borrowed through [`Session::engine`](crate::Session::engine)
    /// or [`Session::engine_mut`](crate::Session::engine_mut) and cannot be used.
    EngineBusy,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration value is invalid.
    Config(String),
    /// Configuration file not found at the given path.
    ConfigFileNotFound(String),
    /// I/O error with underlying cause.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedKind {
                type_name,
                field: Some(field),
                reason,
            } => write!(f, "Unsupported kind in {}.{}: {}", type_name, field, reason),
            Error::UnsupportedKind {
                type_name,
                field: None,
                reason,
            } => write!(f, "Unsupported kind {}: {}", type_name, reason),
            Error::FieldMismatch { field, reason } => {
                write!(f, "Field mismatch at {}: {}", field, reason)
            }
            Error::DuplicateBranch {
                name,
                existing,
                requested,
            } => write!(
                f,
                "Duplicate branch [{}]: bound to {}, cannot rebind to {}",
                name, existing, requested
            ),
            Error::UnknownBranch(name) => write!(f, "Unknown branch [{}]", name),
            Error::TreeClosed => write!(f, "Tree is closed"),
            Error::TreeUnbound => write!(f, "Tree is not bound to an engine tree"),
            Error::HostBorrowed { branch } => {
                write!(f, "Host value of branch [{}] is already borrowed", branch)
            }
            Error::EngineBusy => write!(f, "Engine is already borrowed by the caller"),
            Error::EngineFailure {
                operation,
                bytes,
                branch_errors,
            } => {
                write!(f, "Engine {} failed (returned {})", operation, bytes)?;
                if !branch_errors.is_empty() {
                    write!(f, ", {} branch error(s)", branch_errors.len())?;
                }
                Ok(())
            }
            Error::Engine(e) => write!(f, "Engine error: {}", e),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Engine(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Error::Engine(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl Error {
    pub(crate) fn unsupported(
        type_name: impl Into<String>,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Error::UnsupportedKind {
            type_name: type_name.into(),
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::FieldMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for treebridge operations.
pub type Result<T> = std::result::Result<T, Error>;
