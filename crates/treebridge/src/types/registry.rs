// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent registry of host type descriptors.
//!
//! The registry ensures that introspecting a host type happens only once
//! per [`TypeId`]. Subsequent lookups are served from a read-locked map.
//! Entries are never removed. A secondary dashmap keeps track of the types
//! that were registered explicitly (as opposed to discovered lazily while
//! binding a branch).

use crate::error::{Error, Result};
use crate::types::descriptor::{FieldKind, ScalarKind, TypeDescriptor, TypeIdentity};
use crate::types::reflect::{RecordShape, Reflect, Shape};
use dashmap::DashSet;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Registry hit/miss statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
    /// Time spent building the last missed descriptor.
    pub last_miss_ns: u64,
}

/// Registry of [`TypeDescriptor`]s keyed by host type identity.
///
/// Share it between sessions as `Arc<TypeRegistry>`.
pub struct TypeRegistry {
    inner: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    explicit: DashSet<TypeId>,
    stats: RwLock<LookupStats>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            explicit: DashSet::new(),
            stats: RwLock::new(LookupStats::default()),
        }
    }

    /// Describe `T` and mark it as explicitly registered. Idempotent.
    pub fn register<T: Reflect>(&self) -> Result<Arc<TypeDescriptor>> {
        let desc = self.describe::<T>()?;
        if self.explicit.insert(TypeId::of::<T>()) {
            log::debug!("[TypeRegistry::register] registered {}", desc.name());
        }
        Ok(desc)
    }

    /// Return the descriptor of `T`, introspecting it on first use.
    ///
    /// Fails with [`Error::UnsupportedKind`] when `T` is not a composite or
    /// one of its fields (recursively) cannot be mapped.
    pub fn describe<T: Reflect>(&self) -> Result<Arc<TypeDescriptor>> {
        if let Some(hit) = self.get(TypeId::of::<T>()) {
            self.record_hit();
            return Ok(hit);
        }

        let start = Instant::now();
        let built = match T::shape() {
            Shape::Record(rec) => self.build_record(rec, &mut Vec::new()),
            Shape::Opaque { type_name, reason } => Err(Error::unsupported(type_name, None, reason)),
            _ => Err(Error::unsupported(
                std::any::type_name::<T>(),
                None,
                "composite branches require a record type",
            )),
        };
        self.record_miss(start);

        if let Err(ref e) = built {
            log::debug!("[TypeRegistry::describe] {}", e);
        }
        built
    }

    /// Scalar kind of `S`, for leaf-mode branches.
    pub fn leaf_kind<S: Reflect>(&self) -> Result<ScalarKind> {
        match S::shape() {
            Shape::Scalar(kind) => Ok(kind),
            _ => Err(Error::unsupported(
                std::any::type_name::<S>(),
                None,
                "leaf branches require a scalar type",
            )),
        }
    }

    /// Cached descriptor for `type_id`, if any.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().get(&type_id).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// True if `T` went through [`TypeRegistry::register`].
    pub fn is_explicit<T: 'static>(&self) -> bool {
        self.explicit.contains(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        *self.stats.read()
    }

    fn build_record(
        &self,
        rec: RecordShape,
        in_progress: &mut Vec<TypeId>,
    ) -> Result<Arc<TypeDescriptor>> {
        if let Some(hit) = self.get(rec.type_id) {
            return Ok(hit);
        }
        if in_progress.contains(&rec.type_id) {
            return Err(Error::unsupported(
                rec.path,
                None,
                "cyclic composite (type contains itself)",
            ));
        }

        in_progress.push(rec.type_id);
        let parts = self.build_fields(&rec, in_progress);
        in_progress.pop();

        let desc = TypeDescriptor::from_parts(
            TypeIdentity::new(rec.type_id, rec.path),
            rec.size,
            rec.align,
            parts?,
        )?;

        // A concurrent describe may have won the race; keep the first entry.
        let mut map = self.inner.write();
        let entry = map.entry(rec.type_id).or_insert_with(|| Arc::new(desc));
        Ok(Arc::clone(entry))
    }

    fn build_fields(
        &self,
        rec: &RecordShape,
        in_progress: &mut Vec<TypeId>,
    ) -> Result<Vec<(String, FieldKind, usize)>> {
        let mut parts = Vec::with_capacity(rec.fields.len());
        for field in &rec.fields {
            let kind = self.field_kind(rec.path, field.name, (field.shape)(), in_progress)?;
            parts.push((field.name.to_string(), kind, field.offset));
        }
        Ok(parts)
    }

    fn field_kind(
        &self,
        owner: &'static str,
        field: &str,
        shape: Shape,
        in_progress: &mut Vec<TypeId>,
    ) -> Result<FieldKind> {
        match shape {
            Shape::Scalar(kind) => Ok(FieldKind::Scalar(kind)),
            Shape::Text => Ok(FieldKind::Text),
            Shape::Array { element, len } => Ok(FieldKind::Array {
                element: Box::new(self.element_kind(owner, field, *element, in_progress)?),
                len,
            }),
            Shape::Sequence { element, ops } => Ok(FieldKind::Sequence {
                element: Box::new(self.element_kind(owner, field, *element, in_progress)?),
                ops,
            }),
            Shape::Record(rec) => Ok(FieldKind::Composite(self.build_record(rec, in_progress)?)),
            Shape::Opaque { type_name, reason } => Err(Error::unsupported(
                owner,
                Some(field),
                format!("{}: {}", type_name, reason),
            )),
        }
    }

    /// Array and sequence elements: scalars or fixed-layout composites.
    fn element_kind(
        &self,
        owner: &'static str,
        field: &str,
        shape: Shape,
        in_progress: &mut Vec<TypeId>,
    ) -> Result<FieldKind> {
        match shape {
            Shape::Scalar(kind) => Ok(FieldKind::Scalar(kind)),
            Shape::Record(rec) => {
                let desc = self.build_record(rec, in_progress)?;
                if desc.is_variable() {
                    return Err(Error::unsupported(
                        owner,
                        Some(field),
                        format!(
                            "element type {} has variable-length fields",
                            desc.name()
                        ),
                    ));
                }
                Ok(FieldKind::Composite(desc))
            }
            Shape::Opaque { type_name, reason } => Err(Error::unsupported(
                owner,
                Some(field),
                format!("{}: {}", type_name, reason),
            )),
            Shape::Text | Shape::Array { .. } | Shape::Sequence { .. } => Err(Error::unsupported(
                owner,
                Some(field),
                "elements must be scalars or fixed-layout composites",
            )),
        }
    }

    fn record_hit(&self) {
        let mut stats = self.stats.write();
        stats.hits = stats.hits.saturating_add(1);
    }

    fn record_miss(&self, start: Instant) {
        let mut stats = self.stats.write();
        stats.misses = stats.misses.saturating_add(1);
        stats.last_miss_ns = start.elapsed().as_nanos() as u64;
    }
}
