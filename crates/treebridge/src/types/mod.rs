// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host type introspection, descriptors, registry and engine naming.

pub mod descriptor;
pub mod naming;
pub mod reflect;
pub mod registry;

pub use descriptor::{FieldDescriptor, FieldKind, ScalarKind, TypeDescriptor, TypeIdentity};
pub use naming::{foreign_type_name, leaf_code, leaf_list, translate_name};
pub use reflect::{FieldShape, RecordShape, Reflect, SequenceOps, Shape};
pub use registry::{LookupStats, TypeRegistry};
