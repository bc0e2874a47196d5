// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trees: ordered branch bindings driven against the engine.
//!
//! # Fill / GetEntry
//!
//! ```text
//! fill():
//!   for each branch (insertion order): encode host -> buffer
//!       buffer replaced?  -> create_branch again with the new buffer
//!       failure           -> collected, siblings continue
//!   commit_row() once; bytes <= 0 -> EngineFailure(Commit)
//!
//! get_entry(i):
//!   fetch_row(i); bytes <= 0 -> EngineFailure(Fetch), nothing decoded
//!   row too large for a buffer? -> grow, create_branch again, fetch once more
//!   for each enabled branch: decode buffer -> host; failures collected
//! ```
//!
//! # State
//!
//! `Unbound -> Bound -> Closed`. A tree from `Session::create_tree` is
//! Unbound until its first branch is bound; `Session::open_tree` yields a
//! Bound tree. Dropping a Bound tree closes it.

mod branch;
mod report;

pub use branch::{BindMode, BranchBinding};
pub use report::{BranchSummary, RowReport, TreeSummary};

use crate::config::TreeConfig;
use crate::engine::{matches_branch, Engine, EngineError, TreeHandle};
use crate::error::{BranchError, EngineOp, Error, Result};
use crate::session::SessionContext;
use crate::types::Reflect;
use crate::value::{HostField, RootType, ValueBinding};
use std::collections::HashMap;

/// Lifecycle state of a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// No engine tree yet.
    Unbound,
    /// Attached to an engine tree.
    Bound,
    /// Closed; every operation fails with [`Error::TreeClosed`].
    Closed,
}

#[derive(Debug, Clone, Copy)]
enum Attachment {
    Unbound,
    Bound(TreeHandle),
    Closed,
}

/// Ordered set of branch bindings over one engine tree.
pub struct Tree<E: Engine> {
    ctx: SessionContext<E>,
    config: TreeConfig,
    name: String,
    title: String,
    attachment: Attachment,
    branches: Vec<BranchBinding>,
    index: HashMap<String, usize>,
}

impl<E: Engine> Tree<E> {
    pub(crate) fn new(ctx: SessionContext<E>, name: &str, title: &str, config: TreeConfig) -> Self {
        Self {
            ctx,
            config,
            name: name.to_string(),
            title: title.to_string(),
            attachment: Attachment::Unbound,
            branches: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn attach(
        ctx: SessionContext<E>,
        name: &str,
        handle: TreeHandle,
        config: TreeConfig,
    ) -> Self {
        let title = ctx
            .engine()
            .ok()
            .and_then(|engine| engine.tree_title(handle))
            .unwrap_or_default();
        let mut tree = Self::new(ctx, name, &title, config);
        tree.attachment = Attachment::Bound(handle);
        log::info!("[Tree::open] '{}' attached ({:?})", name, handle);
        tree
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn state(&self) -> TreeState {
        match self.attachment {
            Attachment::Unbound => TreeState::Unbound,
            Attachment::Bound(_) => TreeState::Bound,
            Attachment::Closed => TreeState::Closed,
        }
    }

    /// Engine tree handle, once bound.
    pub fn handle(&self) -> Option<TreeHandle> {
        match self.attachment {
            Attachment::Bound(handle) => Some(handle),
            _ => None,
        }
    }

    /// Bind `field` to the branch `name`.
    ///
    /// Composite mode describes `S`, registers its classes with the engine
    /// and creates a branch of the translated class name. Leaf mode creates
    /// a branch typed by the given leaf list; `S` must be a scalar. The list's
    /// type code is the caller's to keep consistent with `S`.
    ///
    /// Binding a name again with the same root type and mode replaces the
    /// host value (this is how a reader attaches values to a reopened tree);
    /// anything else fails with [`Error::DuplicateBranch`].
    pub fn bind_branch<T: 'static, S: Reflect>(
        &mut self,
        name: &str,
        field: HostField<T, S>,
        mode: BindMode,
    ) -> Result<()> {
        if let Attachment::Closed = self.attachment {
            return Err(Error::TreeClosed);
        }

        let (root, class) = match &mode {
            BindMode::Composite => {
                let desc = self.ctx.registry.describe::<S>()?;
                let class = self.ctx.announce(&desc)?;
                (RootType::Composite(desc), Some(class))
            }
            BindMode::Leaf { .. } => (RootType::Leaf(self.ctx.registry.leaf_kind::<S>()?), None),
        };
        let tree = self.ensure_bound()?;

        if let Some(&i) = self.index.get(name) {
            let existing = &mut self.branches[i];
            if !existing.accepts(&root, &mode) {
                return Err(Error::DuplicateBranch {
                    name: name.to_string(),
                    existing: format!("{} ({})", existing.root(), existing.mode()),
                    requested: format!("{} ({})", root, mode),
                });
            }
            existing.binding.replace_host(Box::new(field));
            existing.issue(&mut *self.ctx.engine_mut()?, tree, &self.config)?;
            log::debug!("[Tree::bind_branch] '{}' rebound to a new host value", name);
            return Ok(());
        }

        let binding = ValueBinding::new(Box::new(field), root, &self.config);
        let mut branch = BranchBinding::new(name, binding, mode, class);
        // An opened tree may already store this name with another type.
        match branch.issue(&mut *self.ctx.engine_mut()?, tree, &self.config) {
            Ok(_) => {}
            Err(EngineError::BranchTypeConflict { existing, .. }) => {
                return Err(Error::DuplicateBranch {
                    name: name.to_string(),
                    existing,
                    requested: format!("{} ({})", branch.root(), branch.mode()),
                });
            }
            Err(e) => return Err(e.into()),
        }
        log::debug!(
            "[Tree::bind_branch] '{}' bound as {} ({})",
            name,
            branch.root(),
            branch.mode()
        );
        self.index.insert(name.to_string(), self.branches.len());
        self.branches.push(branch);
        Ok(())
    }

    /// Bind a whole composite value.
    pub fn bind_composite<T: 'static, S: Reflect>(
        &mut self,
        name: &str,
        field: HostField<T, S>,
    ) -> Result<()> {
        self.bind_branch(name, field, BindMode::Composite)
    }

    /// Bind one scalar with an explicit leaf list (`"evt_i/L"`).
    pub fn bind_leaf<T: 'static, S: Reflect>(
        &mut self,
        name: &str,
        field: HostField<T, S>,
        code: &str,
    ) -> Result<()> {
        self.bind_branch(
            name,
            field,
            BindMode::Leaf {
                code: code.to_string(),
            },
        )
    }

    /// Encode every branch and commit one row.
    pub fn fill(&mut self) -> Result<RowReport> {
        let tree = self.bound()?;
        let mut branch_errors = Vec::new();
        let mut engine = self.ctx.engine_mut()?;

        for branch in &mut self.branches {
            match branch.encoder.encode(&mut branch.binding) {
                Ok(outcome) if outcome.reallocated => {
                    log::debug!(
                        "[Tree::fill] '{}' buffer grown to {} bytes, rebinding",
                        branch.name,
                        branch.binding.buffer().capacity()
                    );
                    if let Err(e) = branch.issue(&mut *engine, tree, &self.config) {
                        branch_errors.push(BranchError {
                            branch: branch.name.clone(),
                            error: e.into(),
                        });
                    }
                }
                Ok(_) => {}
                Err(error) => branch_errors.push(BranchError {
                    branch: branch.name.clone(),
                    error,
                }),
            }
        }
        for e in &branch_errors {
            log::warn!("[Tree::fill] {}", e);
        }

        let bytes = engine.commit_row(tree);
        if bytes <= 0 {
            log::warn!("[Tree::fill] commit_row on '{}' returned {}", self.name, bytes);
            return Err(Error::EngineFailure {
                operation: EngineOp::Commit,
                bytes,
                branch_errors,
            });
        }
        Ok(RowReport {
            bytes,
            branch_errors,
        })
    }

    /// Fetch row `index` and decode it into every enabled branch's host value.
    pub fn get_entry(&mut self, index: i64) -> Result<RowReport> {
        let tree = self.bound()?;
        let mut branch_errors = Vec::new();
        let mut engine = self.ctx.engine_mut()?;

        let mut bytes = engine.fetch_row(tree, index);
        if bytes <= 0 {
            return Err(Error::EngineFailure {
                operation: EngineOp::Fetch,
                bytes,
                branch_errors,
            });
        }

        // Rows larger than a buffer: grow, re-point and fetch once more.
        let mut skipped = vec![false; self.branches.len()];
        let mut regrown = false;
        for (i, branch) in self.branches.iter_mut().enumerate() {
            let Some(required) = branch.binding.buffer().required() else {
                continue;
            };
            if !branch.enabled {
                continue;
            }
            branch.binding.grow(required);
            regrown = true;
            if let Err(e) = branch.issue(&mut *engine, tree, &self.config) {
                skipped[i] = true;
                branch_errors.push(BranchError {
                    branch: branch.name.clone(),
                    error: e.into(),
                });
            }
        }
        if regrown {
            log::debug!("[Tree::get_entry] buffers grown, fetching row {} again", index);
            bytes = engine.fetch_row(tree, index);
            if bytes <= 0 {
                return Err(Error::EngineFailure {
                    operation: EngineOp::Fetch,
                    bytes,
                    branch_errors,
                });
            }
        }
        drop(engine);

        for (i, branch) in self.branches.iter_mut().enumerate() {
            if !branch.enabled || skipped[i] {
                continue;
            }
            if let Err(error) = branch.decoder.decode(&mut branch.binding) {
                branch_errors.push(BranchError {
                    branch: branch.name.clone(),
                    error,
                });
            }
        }
        for e in &branch_errors {
            log::warn!("[Tree::get_entry] {}", e);
        }
        Ok(RowReport {
            bytes,
            branch_errors,
        })
    }

    /// Committed row count.
    pub fn entry_count(&self) -> Result<i64> {
        let tree = self.bound()?;
        Ok(self.ctx.engine()?.entry_count(tree))
    }

    /// Enable or disable reading of branches matching `pattern` (exact
    /// name, `prefix*` or `*`). Disabled branches are neither loaded by the
    /// engine nor decoded. Returns true if any branch matched.
    ///
    /// An exact name that matches nothing fails with [`Error::UnknownBranch`].
    pub fn set_branch_enabled(&mut self, pattern: &str, enabled: bool) -> Result<bool> {
        let tree = self.bound()?;
        let matched = self
            .ctx
            .engine_mut()?
            .set_branch_enabled(tree, pattern, enabled);
        if !matched && !pattern.ends_with('*') && !self.index.contains_key(pattern) {
            return Err(Error::UnknownBranch(pattern.to_string()));
        }
        for branch in self
            .branches
            .iter_mut()
            .filter(|b| matches_branch(pattern, &b.name))
        {
            branch.enabled = enabled;
        }
        Ok(matched)
    }

    /// Bound branch names, in insertion order.
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn branch(&self, name: &str) -> Option<&BranchBinding> {
        self.index.get(name).map(|&i| &self.branches[i])
    }

    /// Engine leaf names.
    pub fn leaves(&self) -> Result<Vec<String>> {
        let tree = self.bound()?;
        Ok(self.ctx.engine()?.list_leaves(tree))
    }

    /// Printable summary of the tree.
    pub fn summary(&self) -> Result<TreeSummary> {
        let tree = self.bound()?;
        let engine = self.ctx.engine()?;
        Ok(TreeSummary {
            name: self.name.clone(),
            title: self.title.clone(),
            entries: engine.entry_count(tree),
            branches: self
                .branches
                .iter()
                .map(|b| BranchSummary {
                    name: b.name.clone(),
                    type_name: b.root().to_string(),
                    mode: b.mode().to_string(),
                    enabled: b.enabled,
                    buffer_capacity: b.binding.buffer().capacity(),
                })
                .collect(),
            leaves: engine.list_leaves(tree),
        })
    }

    /// Detach from the engine. Later operations fail with [`Error::TreeClosed`].
    pub fn close(&mut self) -> Result<()> {
        match self.attachment {
            Attachment::Closed => return Err(Error::TreeClosed),
            Attachment::Bound(tree) => {
                self.ctx.engine_mut()?.release_tree(tree);
                log::info!("[Tree::close] '{}' closed", self.name);
            }
            Attachment::Unbound => {}
        }
        self.attachment = Attachment::Closed;
        Ok(())
    }

    fn bound(&self) -> Result<TreeHandle> {
        match self.attachment {
            Attachment::Bound(tree) => Ok(tree),
            Attachment::Unbound => Err(Error::TreeUnbound),
            Attachment::Closed => Err(Error::TreeClosed),
        }
    }

    fn ensure_bound(&mut self) -> Result<TreeHandle> {
        match self.attachment {
            Attachment::Bound(tree) => Ok(tree),
            Attachment::Closed => Err(Error::TreeClosed),
            Attachment::Unbound => {
                let tree = self
                    .ctx
                    .engine_mut()?
                    .create_tree(&self.name, &self.title)?;
                self.attachment = Attachment::Bound(tree);
                log::info!("[Tree::bind] '{}' created ({:?})", self.name, tree);
                Ok(tree)
            }
        }
    }
}

impl<E: Engine> Drop for Tree<E> {
    fn drop(&mut self) {
        if let Attachment::Bound(tree) = self.attachment {
            if let Ok(mut engine) = self.ctx.engine.try_borrow_mut() {
                engine.release_tree(tree);
                log::debug!("[Tree::drop] '{}' released", self.name);
            }
        }
    }
}
