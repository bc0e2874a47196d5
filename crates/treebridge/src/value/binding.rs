// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding of one host value to one engine buffer.

use crate::config::TreeConfig;
use crate::types::descriptor::{align_up, FieldKind, ScalarKind, TypeDescriptor};
use crate::types::naming::{scalar_type_name, translate_name};
use crate::value::buffer::{BufferHandle, PinnedBuffer};
use crate::value::host::HostAccess;
use std::fmt;
use std::sync::Arc;

/// Root type of a binding.
#[derive(Debug, Clone)]
pub enum RootType {
    /// Whole composite value (composite-mode branch).
    Composite(Arc<TypeDescriptor>),
    /// Single scalar (leaf-mode branch).
    Leaf(ScalarKind),
}

impl RootType {
    /// Bytes of the fixed region of a row.
    pub fn fixed_size(&self) -> usize {
        match self {
            RootType::Composite(desc) => desc.foreign_size(),
            RootType::Leaf(kind) => kind.size(),
        }
    }

    /// Same host type on both sides.
    pub fn same_type(&self, other: &RootType) -> bool {
        match (self, other) {
            (RootType::Composite(a), RootType::Composite(b)) => a.identity() == b.identity(),
            (RootType::Leaf(a), RootType::Leaf(b)) => a == b,
            _ => false,
        }
    }

    /// Bytes reserved up front for variable-length fields.
    fn reserve(&self, config: &TreeConfig) -> usize {
        fn kind_reserve(kind: &FieldKind, config: &TreeConfig) -> usize {
            match kind {
                FieldKind::Scalar(_) | FieldKind::Array { .. } => 0,
                FieldKind::Sequence { element, .. } => {
                    element.foreign_align() - 1 + config.sequence_capacity * element.foreign_size()
                }
                FieldKind::Text => config.text_capacity,
                FieldKind::Composite(desc) => desc
                    .fields()
                    .iter()
                    .map(|f| kind_reserve(&f.kind, config))
                    .sum(),
            }
        }

        match self {
            RootType::Composite(desc) => desc
                .fields()
                .iter()
                .map(|f| kind_reserve(&f.kind, config))
                .sum(),
            RootType::Leaf(_) => 0,
        }
    }
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootType::Composite(desc) => write!(f, "{}", translate_name(desc)),
            RootType::Leaf(kind) => write!(f, "{}", scalar_type_name(*kind)),
        }
    }
}

/// Buffer sizing rules captured from the tree configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub(crate) growth_factor: usize,
    pub(crate) max_sequence_len: u32,
}

/// A live host value, its root type and the pinned buffer the engine uses.
pub struct ValueBinding {
    pub(crate) host: Box<dyn HostAccess>,
    pub(crate) root: RootType,
    pub(crate) buffer: BufferHandle,
    pub(crate) generation: u64,
    pub(crate) limits: Limits,
}

impl fmt::Debug for ValueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBinding")
            .field("root", &self.root)
            .field("capacity", &self.buffer.capacity())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ValueBinding {
    pub(crate) fn new(host: Box<dyn HostAccess>, root: RootType, config: &TreeConfig) -> Self {
        let fixed_size = root.fixed_size();
        let capacity = fixed_size + root.reserve(config);
        Self {
            host,
            root,
            buffer: PinnedBuffer::zeroed_row(capacity, fixed_size),
            generation: 0,
            limits: Limits {
                growth_factor: config.growth_factor.max(2),
                max_sequence_len: config.max_sequence_len,
            },
        }
    }

    pub fn root(&self) -> &RootType {
        &self.root
    }

    pub fn buffer(&self) -> &BufferHandle {
        &self.buffer
    }

    /// Bumped every time the buffer is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn replace_host(&mut self, host: Box<dyn HostAccess>) {
        self.host = host;
    }

    /// Replace the buffer with one of at least `needed` bytes.
    pub(crate) fn grow(&mut self, needed: usize) {
        grow_buffer(&mut self.buffer, &mut self.generation, self.limits, needed);
    }
}

pub(crate) fn grow_buffer(
    buffer: &mut BufferHandle,
    generation: &mut u64,
    limits: Limits,
    needed: usize,
) {
    let capacity = needed.max(buffer.capacity().saturating_mul(limits.growth_factor));
    log::debug!(
        "[ValueBinding::grow] buffer {} capacity {} -> {}",
        buffer.id(),
        buffer.capacity(),
        capacity
    );
    // The current row survives, so a failed encode still commits it.
    *buffer = PinnedBuffer::with_row(align_up(capacity, 8), &buffer.row_bytes());
    *generation += 1;
}
