// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage engine collaborator.
//!
//! The marshaling layer reaches the columnar engine only through the
//! [`Engine`] trait: class registration, branch creation against a pinned
//! buffer, and row-level commit/fetch. [`MemoryEngine`] is an in-memory
//! implementation.
//!
//! # Protocol
//!
//! ```text
//! register_class(name, desc)            once per class, nested first
//! create_tree(name, title) -> tree
//! create_branch(tree, spec) -> branch   engine keeps spec.buffer
//! loop {
//!     host encodes into buffers
//!     commit_row(tree) -> bytes         engine copies buffer.used bytes
//! }
//! fetch_row(tree, i) -> bytes           engine loads row i into buffers
//! ```
//!
//! Row-level calls report failure with a non-positive byte count.

mod memory;

pub use memory::MemoryEngine;

use crate::types::descriptor::{ScalarKind, TypeDescriptor};
use crate::types::naming::scalar_for_code;
use crate::value::buffer::BufferHandle;
use std::fmt;

/// Engine-side tree identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeHandle(pub u64);

/// Engine-side branch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchHandle(pub u64);

/// Engine type of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode<'a> {
    /// Registered class name (composite mode).
    Class(&'a str),
    /// Leaf list `[name/]X` (leaf mode).
    Leaf(&'a str),
}

impl fmt::Display for TypeCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCode::Class(name) => write!(f, "class {}", name),
            TypeCode::Leaf(code) => write!(f, "leaf {}", code),
        }
    }
}

/// Arguments of [`Engine::create_branch`].
#[derive(Debug, Clone)]
pub struct BranchSpec<'a> {
    pub name: &'a str,
    pub type_code: TypeCode<'a>,
    /// Buffer the engine reads on commit and writes on fetch.
    pub buffer: BufferHandle,
    pub buffer_size_hint: u32,
    pub split_level: u32,
}

/// Storage engine operations used by trees.
pub trait Engine {
    /// Create a new, empty tree.
    fn create_tree(&mut self, name: &str, title: &str) -> Result<TreeHandle, EngineError>;

    /// Find an existing tree by name.
    fn open_tree(&self, name: &str) -> Option<TreeHandle>;

    /// Detach the tree from every buffer. Committed rows stay readable
    /// through [`Engine::open_tree`].
    fn release_tree(&mut self, tree: TreeHandle);

    /// Title given at creation.
    fn tree_title(&self, tree: TreeHandle) -> Option<String>;

    /// Declare a class so branches can use it as their type.
    ///
    /// Re-registering the same class is a no-op; a different layout under
    /// an existing name is a conflict.
    fn register_class(&mut self, name: &str, desc: &TypeDescriptor) -> Result<(), EngineError>;

    /// Create a branch, or re-point an existing branch of the same type at a new buffer.
    fn create_branch(
        &mut self,
        tree: TreeHandle,
        spec: BranchSpec<'_>,
    ) -> Result<BranchHandle, EngineError>;

    /// Append one row from the current buffer contents. Returns bytes written.
    fn commit_row(&mut self, tree: TreeHandle) -> i64;

    /// Load row `index` into the buffers of enabled branches. Returns bytes read.
    fn fetch_row(&mut self, tree: TreeHandle, index: i64) -> i64;

    /// Committed row count, or -1 for an unknown tree.
    fn entry_count(&self, tree: TreeHandle) -> i64;

    /// Enable or disable reading of branches matching `pattern`
    /// (exact name, or prefix followed by `*`). Returns true if any matched.
    fn set_branch_enabled(&mut self, tree: TreeHandle, pattern: &str, enabled: bool) -> bool;

    /// Leaf names of the tree, in branch order.
    fn list_leaves(&self, tree: TreeHandle) -> Vec<String>;
}

/// Branch name pattern: exact, `prefix*`, or `*`.
pub fn matches_branch(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Parsed leaf list `[name/]X`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCode {
    /// Leaf name, if given.
    pub name: Option<String>,
    pub kind: ScalarKind,
}

impl LeafCode {
    pub fn parse(code: &str) -> Result<Self, EngineError> {
        let (name, type_char) = match code.rsplit_once('/') {
            Some((name, tc)) if !name.is_empty() => (Some(name.to_string()), tc),
            Some(_) => return Err(EngineError::InvalidLeafCode(code.to_string())),
            None => (None, code),
        };
        let mut chars = type_char.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => scalar_for_code(c)
                .map(|kind| Self { name, kind })
                .ok_or_else(|| EngineError::InvalidLeafCode(code.to_string())),
            _ => Err(EngineError::InvalidLeafCode(code.to_string())),
        }
    }
}

/// Errors reported by engine collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Tree handle not known to the engine.
    UnknownTree(TreeHandle),
    /// A tree with this name already exists.
    TreeExists(String),
    /// Branch refers to a class that was never registered.
    UnknownClass(String),
    /// Class name registered with a different layout.
    ClassConflict {
        name: String,
        existing: String,
        requested: String,
    },
    /// Leaf list is not `[name/]X` with a known type code.
    InvalidLeafCode(String),
    /// Branch exists with a different type.
    BranchTypeConflict {
        branch: String,
        existing: String,
        requested: String,
    },
    /// New branches cannot be added to a tree that already has rows.
    BranchAfterRows { branch: String, rows: i64 },
    /// Buffer cannot hold the fixed part of one row.
    BufferTooSmall {
        branch: String,
        capacity: usize,
        required: usize,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownTree(handle) => write!(f, "Unknown tree handle {}", handle.0),
            EngineError::TreeExists(name) => write!(f, "Tree '{}' already exists", name),
            EngineError::UnknownClass(name) => write!(f, "Class '{}' is not registered", name),
            EngineError::ClassConflict {
                name,
                existing,
                requested,
            } => write!(
                f,
                "Class '{}' already registered for {}, cannot register {}",
                name, existing, requested
            ),
            EngineError::InvalidLeafCode(code) => write!(f, "Invalid leaf list '{}'", code),
            EngineError::BranchTypeConflict {
                branch,
                existing,
                requested,
            } => write!(
                f,
                "Branch '{}' has type {}, cannot rebind as {}",
                branch, existing, requested
            ),
            EngineError::BranchAfterRows { branch, rows } => write!(
                f,
                "Cannot add branch '{}' to a tree with {} rows",
                branch, rows
            ),
            EngineError::BufferTooSmall {
                branch,
                capacity,
                required,
            } => write!(
                f,
                "Buffer of branch '{}' holds {} bytes, row needs at least {}",
                branch, capacity, required
            ),
        }
    }
}

impl std::error::Error for EngineError {}
