// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory columnar engine.
//!
//! Each branch stores its rows as one byte column plus row offsets. Rows are
//! copied verbatim from the branch buffer on commit and back into it on
//! fetch, so any layout the host writes is read back bit for bit.

use super::{
    matches_branch, BranchHandle, BranchSpec, Engine, EngineError, LeafCode, TreeHandle, TypeCode,
};
use crate::types::descriptor::{FieldKind, TypeDescriptor};
use crate::types::naming::{foreign_type_name, scalar_type_name};
use crate::value::buffer::BufferHandle;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredType {
    Class(String),
    Leaf(LeafCode),
}

impl StoredType {
    fn same_type(&self, other: &StoredType) -> bool {
        match (self, other) {
            (StoredType::Class(a), StoredType::Class(b)) => a == b,
            (StoredType::Leaf(a), StoredType::Leaf(b)) => a.kind == b.kind,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            StoredType::Class(name) => format!("class {}", name),
            StoredType::Leaf(code) => format!("leaf {}", scalar_type_name(code.kind)),
        }
    }
}

struct MemBranch {
    handle: BranchHandle,
    name: String,
    stored: StoredType,
    split_level: u32,
    buffer: Option<BufferHandle>,
    enabled: bool,
    data: Vec<u8>,
    /// Row start offsets into `data`, plus the end offset.
    offsets: Vec<usize>,
}

impl MemBranch {
    fn row(&self, index: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        self.data.get(start..end)
    }
}

struct MemTree {
    name: String,
    title: String,
    branches: Vec<MemBranch>,
    rows: i64,
}

/// In-memory [`Engine`].
pub struct MemoryEngine {
    trees: HashMap<TreeHandle, MemTree>,
    classes: HashMap<String, TypeDescriptor>,
    next_handle: u64,
    fail_commits: u32,
    fail_fetches: u32,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            classes: HashMap::new(),
            next_handle: 1,
            fail_commits: 0,
            fail_fetches: 0,
        }
    }

    /// Make the next `n` calls to `commit_row` fail (return 0) without storing anything.
    pub fn fail_next_commits(&mut self, n: u32) {
        self.fail_commits = n;
    }

    /// Make the next `n` calls to `fetch_row` fail (return 0) without loading anything.
    pub fn fail_next_fetches(&mut self, n: u32) {
        self.fail_fetches = n;
    }

    /// Registered class, if any.
    pub fn class(&self, name: &str) -> Option<&TypeDescriptor> {
        self.classes.get(name)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Member declarations of a registered class (`"Double_t e"`).
    pub fn class_members(&self, name: &str) -> Option<Vec<String>> {
        let desc = self.classes.get(name)?;
        Some(
            desc.fields()
                .iter()
                .map(|f| format!("{} {}", foreign_type_name(&f.kind), f.name))
                .collect(),
        )
    }

    /// Stored bytes of one row of one branch.
    pub fn stored_row(&self, tree: TreeHandle, branch: &str, index: usize) -> Option<&[u8]> {
        self.trees
            .get(&tree)?
            .branches
            .iter()
            .find(|b| b.name == branch)?
            .row(index)
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn class_leaves(&self, prefix: &str, desc: &TypeDescriptor, levels: u32, out: &mut Vec<String>) {
        for field in desc.fields() {
            let name = format!("{}.{}", prefix, field.name);
            match &field.kind {
                FieldKind::Composite(nested) if levels > 1 => {
                    self.class_leaves(&name, nested, levels - 1, out);
                }
                _ => out.push(name),
            }
        }
    }
}

impl Engine for MemoryEngine {
    fn create_tree(&mut self, name: &str, title: &str) -> Result<TreeHandle, EngineError> {
        if self.open_tree(name).is_some() {
            return Err(EngineError::TreeExists(name.to_string()));
        }
        let handle = TreeHandle(self.next_handle());
        self.trees.insert(
            handle,
            MemTree {
                name: name.to_string(),
                title: title.to_string(),
                branches: Vec::new(),
                rows: 0,
            },
        );
        log::debug!("[MemoryEngine::create_tree] '{}' -> {:?}", name, handle);
        Ok(handle)
    }

    fn open_tree(&self, name: &str) -> Option<TreeHandle> {
        self.trees
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(handle, _)| *handle)
    }

    fn release_tree(&mut self, tree: TreeHandle) {
        if let Some(t) = self.trees.get_mut(&tree) {
            for branch in &mut t.branches {
                branch.buffer = None;
                branch.enabled = true;
            }
            log::debug!("[MemoryEngine::release_tree] '{}' detached", t.name);
        }
    }

    fn tree_title(&self, tree: TreeHandle) -> Option<String> {
        self.trees.get(&tree).map(|t| t.title.clone())
    }

    fn register_class(&mut self, name: &str, desc: &TypeDescriptor) -> Result<(), EngineError> {
        if let Some(existing) = self.classes.get(name) {
            if existing.name() != desc.name() || existing.foreign_size() != desc.foreign_size() {
                return Err(EngineError::ClassConflict {
                    name: name.to_string(),
                    existing: existing.name().to_string(),
                    requested: desc.name().to_string(),
                });
            }
            return Ok(());
        }
        self.classes.insert(name.to_string(), desc.clone());
        log::debug!(
            "[MemoryEngine::register_class] {} ({} fields, {} bytes)",
            name,
            desc.fields().len(),
            desc.foreign_size()
        );
        Ok(())
    }

    fn create_branch(
        &mut self,
        tree: TreeHandle,
        spec: BranchSpec<'_>,
    ) -> Result<BranchHandle, EngineError> {
        let (stored, fixed) = match spec.type_code {
            TypeCode::Class(class) => {
                let desc = self
                    .classes
                    .get(class)
                    .ok_or_else(|| EngineError::UnknownClass(class.to_string()))?;
                (StoredType::Class(class.to_string()), desc.foreign_size())
            }
            TypeCode::Leaf(code) => {
                let leaf = LeafCode::parse(code)?;
                let size = leaf.kind.size();
                (StoredType::Leaf(leaf), size)
            }
        };
        if spec.buffer.capacity() < fixed {
            return Err(EngineError::BufferTooSmall {
                branch: spec.name.to_string(),
                capacity: spec.buffer.capacity(),
                required: fixed,
            });
        }

        let handle = BranchHandle(self.next_handle());
        let t = self
            .trees
            .get_mut(&tree)
            .ok_or(EngineError::UnknownTree(tree))?;

        if let Some(existing) = t.branches.iter_mut().find(|b| b.name == spec.name) {
            if !existing.stored.same_type(&stored) {
                return Err(EngineError::BranchTypeConflict {
                    branch: spec.name.to_string(),
                    existing: existing.stored.describe(),
                    requested: stored.describe(),
                });
            }
            log::debug!(
                "[MemoryEngine::create_branch] '{}' re-pointed at buffer {}",
                spec.name,
                spec.buffer.id()
            );
            existing.buffer = Some(spec.buffer);
            return Ok(existing.handle);
        }

        if t.rows > 0 {
            return Err(EngineError::BranchAfterRows {
                branch: spec.name.to_string(),
                rows: t.rows,
            });
        }

        log::debug!(
            "[MemoryEngine::create_branch] '{}' {} (bufsize {}, split {})",
            spec.name,
            spec.type_code,
            spec.buffer_size_hint,
            spec.split_level
        );
        t.branches.push(MemBranch {
            handle,
            name: spec.name.to_string(),
            stored,
            split_level: spec.split_level,
            buffer: Some(spec.buffer),
            enabled: true,
            data: Vec::new(),
            offsets: vec![0],
        });
        Ok(handle)
    }

    fn commit_row(&mut self, tree: TreeHandle) -> i64 {
        if self.fail_commits > 0 {
            self.fail_commits -= 1;
            log::debug!("[MemoryEngine::commit_row] injected failure");
            return 0;
        }
        let Some(t) = self.trees.get_mut(&tree) else {
            return -1;
        };
        if t.branches.iter().any(|b| b.buffer.is_none()) {
            log::warn!(
                "[MemoryEngine::commit_row] tree '{}' has detached branches",
                t.name
            );
            return -1;
        }

        let mut bytes = 0i64;
        for branch in &mut t.branches {
            if let Some(buffer) = &branch.buffer {
                let row = buffer.row_bytes();
                bytes += row.len() as i64;
                branch.data.extend_from_slice(&row);
                branch.offsets.push(branch.data.len());
            }
        }
        t.rows += 1;
        bytes
    }

    fn fetch_row(&mut self, tree: TreeHandle, index: i64) -> i64 {
        if self.fail_fetches > 0 {
            self.fail_fetches -= 1;
            log::debug!("[MemoryEngine::fetch_row] injected failure");
            return 0;
        }
        let Some(t) = self.trees.get(&tree) else {
            return -1;
        };
        if index < 0 || index >= t.rows {
            return 0;
        }

        let mut bytes = 0i64;
        for branch in t.branches.iter().filter(|b| b.enabled) {
            let (Some(buffer), Some(row)) = (&branch.buffer, branch.row(index as usize)) else {
                continue;
            };
            // A row that does not fit leaves `buffer.required()` set.
            buffer.load_row(row);
            bytes += row.len() as i64;
        }
        bytes
    }

    fn entry_count(&self, tree: TreeHandle) -> i64 {
        self.trees.get(&tree).map_or(-1, |t| t.rows)
    }

    fn set_branch_enabled(&mut self, tree: TreeHandle, pattern: &str, enabled: bool) -> bool {
        let Some(t) = self.trees.get_mut(&tree) else {
            return false;
        };
        let mut matched = false;
        for branch in t
            .branches
            .iter_mut()
            .filter(|b| matches_branch(pattern, &b.name))
        {
            branch.enabled = enabled;
            matched = true;
        }
        matched
    }

    fn list_leaves(&self, tree: TreeHandle) -> Vec<String> {
        let Some(t) = self.trees.get(&tree) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for branch in &t.branches {
            match &branch.stored {
                StoredType::Leaf(code) => {
                    out.push(code.name.clone().unwrap_or_else(|| branch.name.clone()));
                }
                StoredType::Class(class) => match self.classes.get(class) {
                    Some(desc) if branch.split_level > 0 => {
                        self.class_leaves(&branch.name, desc, branch.split_level, &mut out);
                    }
                    _ => out.push(branch.name.clone()),
                },
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;
    use crate::value::buffer::PinnedBuffer;

    #[repr(C)]
    #[derive(Default)]
    struct Det {
        e: f64,
        t: f64,
    }
    crate::record!(Det { e, t });

    #[repr(C)]
    #[derive(Default)]
    struct Event {
        i: i64,
        a: Det,
    }
    crate::record!(Event { i, a });

    fn leaf_spec<'a>(name: &'a str, code: &'a str, buffer: &BufferHandle) -> BranchSpec<'a> {
        BranchSpec {
            name,
            type_code: TypeCode::Leaf(code),
            buffer: buffer.clone(),
            buffer_size_hint: 32_000,
            split_level: 0,
        }
    }

    #[test]
    fn test_commit_and_fetch_rows() {
        let mut engine = MemoryEngine::new();
        let tree = engine.create_tree("t", "test").expect("tree");
        let buf = PinnedBuffer::new(8);
        engine
            .create_branch(tree, leaf_spec("x", "x/D", &buf))
            .expect("branch");

        for v in [1.0f64, 2.0, 3.0] {
            buf.load_row(&v.to_le_bytes());
            assert_eq!(engine.commit_row(tree), 8);
        }
        assert_eq!(engine.entry_count(tree), 3);
        assert_eq!(engine.stored_row(tree, "x", 1), Some(&2.0f64.to_le_bytes()[..]));

        assert_eq!(engine.fetch_row(tree, 0), 8);
        assert_eq!(buf.row_bytes(), 1.0f64.to_le_bytes().to_vec());
        assert_eq!(engine.fetch_row(tree, 3), 0);
        assert_eq!(engine.fetch_row(tree, -1), 0);
    }

    #[test]
    fn test_branch_rules() {
        let mut engine = MemoryEngine::new();
        let tree = engine.create_tree("t", "").expect("tree");
        assert!(matches!(
            engine.create_tree("t", ""),
            Err(EngineError::TreeExists(_))
        ));

        let buf = PinnedBuffer::new(8);
        engine
            .create_branch(tree, leaf_spec("x", "x/D", &buf))
            .expect("branch");
        assert!(matches!(
            engine.create_branch(tree, leaf_spec("x", "x/I", &buf)),
            Err(EngineError::BranchTypeConflict { .. })
        ));
        assert!(matches!(
            engine.create_branch(tree, leaf_spec("bad", "bad/Q", &buf)),
            Err(EngineError::InvalidLeafCode(_))
        ));
        assert!(matches!(
            engine.create_branch(tree, leaf_spec("y", "y/D", &PinnedBuffer::new(4))),
            Err(EngineError::BufferTooSmall { .. })
        ));

        buf.load_row(&[0u8; 8]);
        assert_eq!(engine.commit_row(tree), 8);
        assert!(matches!(
            engine.create_branch(tree, leaf_spec("z", "z/D", &buf)),
            Err(EngineError::BranchAfterRows { rows: 1, .. })
        ));
        // Same name and type: re-pointed, not rejected.
        let other = PinnedBuffer::new(16);
        assert!(engine.create_branch(tree, leaf_spec("x", "x/D", &other)).is_ok());
        engine.fetch_row(tree, 0);
        assert_eq!(other.used(), 8);
    }

    #[test]
    fn test_fetch_reports_truncated_rows() {
        let mut engine = MemoryEngine::new();
        let tree = engine.create_tree("t", "").expect("tree");
        let wide = PinnedBuffer::new(16);
        engine
            .create_branch(tree, leaf_spec("x", "x/D", &wide))
            .expect("branch");
        wide.load_row(&[7u8; 12]);
        engine.commit_row(tree);

        let narrow = PinnedBuffer::new(8);
        engine
            .create_branch(tree, leaf_spec("x", "x/D", &narrow))
            .expect("rebind");
        assert_eq!(engine.fetch_row(tree, 0), 12);
        assert_eq!(narrow.required(), Some(12));
    }

    #[test]
    fn test_class_registration_and_leaves() {
        let registry = TypeRegistry::new();
        let event = registry.describe::<Event>().expect("describe");
        let det = registry.describe::<Det>().expect("describe");

        let mut engine = MemoryEngine::new();
        engine.register_class("Det", &det).expect("register");
        engine.register_class("Event", &event).expect("register");
        engine.register_class("Event", &event).expect("idempotent");
        assert!(matches!(
            engine.register_class("Event", &det),
            Err(EngineError::ClassConflict { .. })
        ));
        assert_eq!(engine.class_count(), 2);
        assert_eq!(
            engine.class_members("Det"),
            Some(vec!["Double_t e".to_string(), "Double_t t".to_string()])
        );
        assert_eq!(engine.class_members("Nope"), None);

        let tree = engine.create_tree("t", "").expect("tree");
        for (name, split) in [("split", 32), ("flat", 0), ("shallow", 1)] {
            let spec = BranchSpec {
                name,
                type_code: TypeCode::Class("Event"),
                buffer: PinnedBuffer::new(event.foreign_size()),
                buffer_size_hint: 32_000,
                split_level: split,
            };
            engine.create_branch(tree, spec).expect("branch");
        }
        assert!(matches!(
            engine.create_branch(
                tree,
                BranchSpec {
                    name: "missing",
                    type_code: TypeCode::Class("Nope"),
                    buffer: PinnedBuffer::new(8),
                    buffer_size_hint: 0,
                    split_level: 0,
                }
            ),
            Err(EngineError::UnknownClass(_))
        ));

        assert_eq!(
            engine.list_leaves(tree),
            vec![
                "split.i",
                "split.a.e",
                "split.a.t",
                "flat",
                "shallow.i",
                "shallow.a",
            ]
        );
    }

    #[test]
    fn test_disabled_branches_not_fetched() {
        let mut engine = MemoryEngine::new();
        let tree = engine.create_tree("t", "").expect("tree");
        let a = PinnedBuffer::new(8);
        let b = PinnedBuffer::new(8);
        engine.create_branch(tree, leaf_spec("a", "D", &a)).expect("a");
        engine.create_branch(tree, leaf_spec("b", "D", &b)).expect("b");
        a.load_row(&[1u8; 8]);
        b.load_row(&[2u8; 8]);
        engine.commit_row(tree);
        a.load_row(&[0u8; 8]);
        b.load_row(&[0u8; 8]);

        assert!(engine.set_branch_enabled(tree, "b", false));
        assert!(!engine.set_branch_enabled(tree, "zz", false));
        assert_eq!(engine.fetch_row(tree, 0), 8);
        assert_eq!(a.row_bytes(), vec![1u8; 8]);
        assert_eq!(b.row_bytes(), vec![0u8; 8]);
        assert_eq!(engine.list_leaves(tree), vec!["a", "b"]);
    }

    #[test]
    fn test_injected_failures() {
        let mut engine = MemoryEngine::new();
        let tree = engine.create_tree("t", "").expect("tree");
        let buf = PinnedBuffer::new(1);
        engine.create_branch(tree, leaf_spec("f", "O", &buf)).expect("f");
        buf.load_row(&[1]);

        engine.fail_next_commits(1);
        assert_eq!(engine.commit_row(tree), 0);
        assert_eq!(engine.entry_count(tree), 0);
        assert_eq!(engine.commit_row(tree), 1);

        engine.fail_next_fetches(1);
        assert_eq!(engine.fetch_row(tree, 0), 0);
        assert_eq!(engine.fetch_row(tree, 0), 1);
        assert_eq!(engine.entry_count(TreeHandle(999)), -1);
    }
}
