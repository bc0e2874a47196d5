// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named branch bindings.

use crate::config::TreeConfig;
use crate::engine::{BranchHandle, BranchSpec, Engine, EngineError, TreeHandle, TypeCode};
use crate::value::{Decoder, Encoder, RootType, ValueBinding};
use std::fmt;

/// How a host value is laid out over a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindMode {
    /// Whole composite value as one branch of a registered class.
    Composite,
    /// One scalar as its own branch, typed by a leaf list (`"evt_i/L"`).
    Leaf { code: String },
}

impl fmt::Display for BindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindMode::Composite => write!(f, "composite"),
            BindMode::Leaf { code } => write!(f, "leaf {}", code),
        }
    }
}

/// A branch name with its value binding, codec and mode.
pub struct BranchBinding {
    pub(crate) name: String,
    pub(crate) binding: ValueBinding,
    pub(crate) encoder: Encoder,
    pub(crate) decoder: Decoder,
    pub(crate) mode: BindMode,
    /// Class name for composite branches.
    pub(crate) class: Option<String>,
    pub(crate) enabled: bool,
    pub(crate) handle: Option<BranchHandle>,
}

impl BranchBinding {
    pub(crate) fn new(
        name: &str,
        binding: ValueBinding,
        mode: BindMode,
        class: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            binding,
            encoder: Encoder::new(name),
            decoder: Decoder::new(name),
            mode,
            class,
            enabled: true,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> &BindMode {
        &self.mode
    }

    pub fn root(&self) -> &RootType {
        self.binding.root()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn binding(&self) -> &ValueBinding {
        &self.binding
    }

    /// Same root type and mode.
    pub(crate) fn accepts(&self, root: &RootType, mode: &BindMode) -> bool {
        self.binding.root().same_type(root) && self.mode == *mode
    }

    /// Point the engine at this binding's current buffer.
    pub(crate) fn issue<E: Engine>(
        &mut self,
        engine: &mut E,
        tree: TreeHandle,
        config: &TreeConfig,
    ) -> Result<BranchHandle, EngineError> {
        let (type_code, split_level) = match (&self.mode, &self.class) {
            (BindMode::Leaf { code }, _) => (TypeCode::Leaf(code), 0),
            (BindMode::Composite, Some(class)) => (TypeCode::Class(class), config.split_level),
            (BindMode::Composite, None) => (TypeCode::Class(""), config.split_level),
        };
        let handle = engine.create_branch(
            tree,
            BranchSpec {
                name: &self.name,
                type_code,
                buffer: self.binding.buffer().clone(),
                buffer_size_hint: config.buffer_size,
                split_level,
            },
        )?;
        self.handle = Some(handle);
        Ok(handle)
    }
}

impl fmt::Debug for BranchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchBinding")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("root", self.binding.root())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
