// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for runtime field layout.
//!
//! A [`TypeDescriptor`] records, for one host composite type, its ordered
//! fields with their kind and host byte offset, plus the layout the same
//! value takes in an engine buffer (the *foreign* layout).
//!
//! Foreign layout rules: little-endian, natural alignment. Arrays and nested
//! composites are inline. Sequences and text take an 8-byte header
//! `{ len: u32, data_offset: u32 }`; their payload lives in the tail of the
//! buffer, after the fixed region.

use crate::error::{Error, Result};
use crate::types::reflect::SequenceOps;
use std::any::TypeId;
use std::sync::Arc;

/// Size of the fixed-region header of a sequence or text field.
pub const VAR_HEADER_SIZE: usize = 8;

/// Alignment of the fixed-region header of a sequence or text field.
pub const VAR_HEADER_ALIGN: usize = 4;

/// Round `value` up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    /// Width in bytes (host and foreign representations agree).
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Natural alignment.
    pub const fn alignment(self) -> usize {
        self.size()
    }
}

/// Kind of a field, as a tagged variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Fixed-width scalar.
    Scalar(ScalarKind),
    /// Fixed-length array (`[E; N]`).
    Array { element: Box<FieldKind>, len: usize },
    /// Variable-length sequence (`Vec<E>`).
    Sequence {
        element: Box<FieldKind>,
        ops: SequenceOps,
    },
    /// UTF-8 text (`String`).
    Text,
    /// Nested composite.
    Composite(Arc<TypeDescriptor>),
}

impl FieldKind {
    /// Bytes the field occupies in host memory.
    pub fn host_size(&self) -> usize {
        match self {
            Self::Scalar(k) => k.size(),
            Self::Array { element, len } => element.host_size() * len,
            Self::Sequence { ops, .. } => ops.vec_size(),
            Self::Text => std::mem::size_of::<String>(),
            Self::Composite(desc) => desc.size(),
        }
    }

    /// Bytes the field occupies in the fixed region of a buffer.
    pub fn foreign_size(&self) -> usize {
        match self {
            Self::Scalar(k) => k.size(),
            Self::Array { element, len } => element.foreign_size() * len,
            Self::Sequence { .. } | Self::Text => VAR_HEADER_SIZE,
            Self::Composite(desc) => desc.foreign_size(),
        }
    }

    /// Alignment of the field in the fixed region of a buffer.
    pub fn foreign_align(&self) -> usize {
        match self {
            Self::Scalar(k) => k.alignment(),
            Self::Array { element, .. } => element.foreign_align(),
            Self::Sequence { .. } | Self::Text => VAR_HEADER_ALIGN,
            Self::Composite(desc) => desc.foreign_align(),
        }
    }

    /// True if the field (or anything nested in it) has a variable length.
    pub fn is_variable(&self) -> bool {
        match self {
            Self::Scalar(_) => false,
            Self::Array { element, .. } => element.is_variable(),
            Self::Sequence { .. } | Self::Text => true,
            Self::Composite(desc) => desc.is_variable(),
        }
    }
}

/// Stable key of a described host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdentity {
    type_id: TypeId,
    path: &'static str,
}

impl TypeIdentity {
    pub fn new(type_id: TypeId, path: &'static str) -> Self {
        Self { type_id, path }
    }

    /// In-process type key.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Host type path (`module::Type`), stable across runs.
    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// Field of a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Byte offset within the host value.
    pub offset: usize,
    /// Byte offset within the fixed region of the buffer.
    pub foreign_offset: usize,
}

/// Structural description of a host composite type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    identity: TypeIdentity,
    size: usize,
    align: usize,
    fields: Vec<FieldDescriptor>,
    foreign_size: usize,
    foreign_align: usize,
    variable: bool,
}

impl TypeDescriptor {
    /// Build a descriptor from `(name, kind, host offset)` triples in declaration order.
    ///
    /// Fails with [`Error::UnsupportedKind`] when host offsets are not
    /// monotonic and non-overlapping, or a field runs past the type's size.
    pub fn from_parts(
        identity: TypeIdentity,
        size: usize,
        align: usize,
        parts: Vec<(String, FieldKind, usize)>,
    ) -> Result<Self> {
        let mut fields = Vec::with_capacity(parts.len());
        let mut host_end = 0usize;
        let mut cursor = 0usize;
        let mut foreign_align = 1usize;
        let mut variable = false;

        for (name, kind, offset) in parts {
            if offset < host_end {
                return Err(Error::unsupported(
                    identity.path(),
                    Some(&name),
                    format!(
                        "offset {} overlaps previous field ending at {} (fields must be listed in layout order, use #[repr(C)])",
                        offset, host_end
                    ),
                ));
            }
            host_end = offset + kind.host_size();
            if host_end > size {
                return Err(Error::unsupported(
                    identity.path(),
                    Some(&name),
                    format!("field ends at {} past type size {}", host_end, size),
                ));
            }

            let field_align = kind.foreign_align();
            cursor = align_up(cursor, field_align);
            let field_size = kind.foreign_size();
            foreign_align = foreign_align.max(field_align);
            variable |= kind.is_variable();
            fields.push(FieldDescriptor {
                name,
                kind,
                offset,
                foreign_offset: cursor,
            });
            cursor += field_size;
        }

        Ok(Self {
            identity,
            size,
            align,
            fields,
            foreign_size: align_up(cursor, foreign_align),
            foreign_align,
            variable,
        })
    }

    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Host type path.
    pub fn name(&self) -> &'static str {
        self.identity.path()
    }

    /// Host size in bytes (`size_of::<T>()`).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Host alignment (`align_of::<T>()`).
    pub fn align(&self) -> usize {
        self.align
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Size of the fixed region of a buffer holding this type.
    pub fn foreign_size(&self) -> usize {
        self.foreign_size
    }

    pub fn foreign_align(&self) -> usize {
        self.foreign_align
    }

    /// True if any field (recursively) is a sequence or text.
    pub fn is_variable(&self) -> bool {
        self.variable
    }

    /// Nested composite descriptors, innermost first, without duplicates.
    pub fn nested(&self) -> Vec<Arc<TypeDescriptor>> {
        fn visit(kind: &FieldKind, out: &mut Vec<Arc<TypeDescriptor>>) {
            match kind {
                FieldKind::Composite(desc) => {
                    for field in desc.fields() {
                        visit(&field.kind, out);
                    }
                    if !out.iter().any(|d| d.identity == desc.identity) {
                        out.push(Arc::clone(desc));
                    }
                }
                FieldKind::Array { element, .. } | FieldKind::Sequence { element, .. } => {
                    visit(element, out);
                }
                FieldKind::Scalar(_) | FieldKind::Text => {}
            }
        }

        let mut out = Vec::new();
        for field in &self.fields {
            visit(&field.kind, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TypeIdentity {
        TypeIdentity::new(TypeId::of::<u8>(), "tests::Layout")
    }

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ScalarKind::Bool.size(), 1);
        assert_eq!(ScalarKind::I16.size(), 2);
        assert_eq!(ScalarKind::F32.size(), 4);
        assert_eq!(ScalarKind::U64.alignment(), 8);
    }

    #[test]
    fn test_foreign_layout_alignment() {
        let desc = TypeDescriptor::from_parts(
            identity(),
            24,
            8,
            vec![
                ("flag".into(), FieldKind::Scalar(ScalarKind::Bool), 0),
                ("id".into(), FieldKind::Scalar(ScalarKind::I64), 8),
                ("w".into(), FieldKind::Scalar(ScalarKind::F32), 16),
            ],
        )
        .expect("layout");

        let offsets: Vec<_> = desc.fields().iter().map(|f| f.foreign_offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(desc.foreign_size(), 24);
        assert_eq!(desc.foreign_align(), 8);
        assert!(!desc.is_variable());
    }

    #[test]
    fn test_overlapping_offsets_rejected() {
        let err = TypeDescriptor::from_parts(
            identity(),
            16,
            8,
            vec![
                ("a".into(), FieldKind::Scalar(ScalarKind::I64), 8),
                ("b".into(), FieldKind::Scalar(ScalarKind::I64), 0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedKind { field: Some(ref f), .. } if f == "b"));
    }

    #[test]
    fn test_array_foreign_size() {
        let kind = FieldKind::Array {
            element: Box::new(FieldKind::Scalar(ScalarKind::F64)),
            len: 3,
        };
        assert_eq!(kind.foreign_size(), 24);
        assert_eq!(kind.foreign_align(), 8);
        assert_eq!(kind.host_size(), 24);
    }
}
