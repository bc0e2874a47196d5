// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-side reflection primitives.
//!
//! Host types expose their shape through [`Reflect`]. Scalars, `String`,
//! fixed arrays and `Vec` are covered here; composite records implement it
//! with the [`record!`](crate::record) macro, which reads field offsets with
//! `core::mem::offset_of!` and field types from the struct definition.
//!
//! ```rust
//! use treebridge::record;
//!
//! #[repr(C)]
//! #[derive(Default)]
//! struct Det {
//!     e: f64,
//!     t: f64,
//! }
//! record!(Det { e, t });
//! ```

use crate::types::descriptor::ScalarKind;
use std::any::TypeId;
use std::fmt;

/// Types whose memory can be walked by the marshaling layer.
///
/// # Safety
///
/// The returned [`Shape`] must describe the implementing type exactly:
/// scalar kinds must match the type's width and representation, record
/// offsets must be the real field offsets and each field shape must be the
/// shape of the field's type. The encoder and decoder read and write host
/// memory through these descriptions. Use [`record!`](crate::record) rather
/// than implementing this by hand.
pub unsafe trait Reflect: 'static {
    fn shape() -> Shape;
}

/// Shape of a host type as reported by [`Reflect`].
#[derive(Debug)]
pub enum Shape {
    Scalar(ScalarKind),
    Text,
    Array {
        element: Box<Shape>,
        len: usize,
    },
    Sequence {
        element: Box<Shape>,
        ops: SequenceOps,
    },
    Record(RecordShape),
    /// A type the marshaling layer cannot represent.
    Opaque {
        type_name: &'static str,
        reason: &'static str,
    },
}

/// Shape of a composite record.
#[derive(Debug)]
pub struct RecordShape {
    pub type_id: TypeId,
    /// `module_path!()::Type`
    pub path: &'static str,
    pub size: usize,
    pub align: usize,
    /// Fields in declaration order.
    pub fields: Vec<FieldShape>,
}

/// One field of a [`RecordShape`].
///
/// The field's own shape is produced lazily so that self-referential
/// records can be detected instead of recursing forever.
#[derive(Debug)]
pub struct FieldShape {
    pub name: &'static str,
    pub offset: usize,
    pub shape: fn() -> Shape,
}

/// Host access table for a `Vec<E>` field.
#[derive(Clone, Copy)]
pub struct SequenceOps {
    vec_type: TypeId,
    vec_size: usize,
    elem_size: usize,
    len: unsafe fn(*const u8) -> usize,
    data: unsafe fn(*const u8) -> *const u8,
    data_mut: unsafe fn(*mut u8) -> *mut u8,
    resize: unsafe fn(*mut u8, usize),
}

impl SequenceOps {
    pub fn of<E: Reflect + Default>() -> Self {
        Self {
            vec_type: TypeId::of::<Vec<E>>(),
            vec_size: std::mem::size_of::<Vec<E>>(),
            elem_size: std::mem::size_of::<E>(),
            len: vec_len::<E>,
            data: vec_data::<E>,
            data_mut: vec_data_mut::<E>,
            resize: vec_resize::<E>,
        }
    }

    /// `size_of::<Vec<E>>()`
    pub fn vec_size(&self) -> usize {
        self.vec_size
    }

    /// `size_of::<E>()`, the host stride between elements.
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// # Safety
    /// `vec` must point to a live `Vec<E>` of the type this table was built for.
    pub(crate) unsafe fn len(&self, vec: *const u8) -> usize {
        unsafe { (self.len)(vec) }
    }

    /// # Safety
    /// Same contract as [`SequenceOps::len`].
    pub(crate) unsafe fn data(&self, vec: *const u8) -> *const u8 {
        unsafe { (self.data)(vec) }
    }

    /// # Safety
    /// Same contract as [`SequenceOps::len`], with exclusive access.
    pub(crate) unsafe fn data_mut(&self, vec: *mut u8) -> *mut u8 {
        unsafe { (self.data_mut)(vec) }
    }

    /// # Safety
    /// Same contract as [`SequenceOps::data_mut`].
    pub(crate) unsafe fn resize(&self, vec: *mut u8, len: usize) {
        unsafe { (self.resize)(vec, len) }
    }
}

impl PartialEq for SequenceOps {
    fn eq(&self, other: &Self) -> bool {
        self.vec_type == other.vec_type
    }
}

impl fmt::Debug for SequenceOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceOps")
            .field("vec_size", &self.vec_size)
            .field("elem_size", &self.elem_size)
            .finish_non_exhaustive()
    }
}

unsafe fn vec_len<E>(vec: *const u8) -> usize {
    unsafe { (*vec.cast::<Vec<E>>()).len() }
}

unsafe fn vec_data<E>(vec: *const u8) -> *const u8 {
    unsafe { (*vec.cast::<Vec<E>>()).as_ptr().cast() }
}

unsafe fn vec_data_mut<E>(vec: *mut u8) -> *mut u8 {
    unsafe { (*vec.cast::<Vec<E>>()).as_mut_ptr().cast() }
}

unsafe fn vec_resize<E: Default>(vec: *mut u8, len: usize) {
    unsafe { (*vec.cast::<Vec<E>>()).resize_with(len, E::default) }
}

/// Shape accessor for a field, typed from a pointer to it.
#[doc(hidden)]
pub fn field_shape<F: Reflect>(_field: *const F) -> fn() -> Shape {
    F::shape
}

macro_rules! impl_reflect_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            unsafe impl Reflect for $ty {
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

impl_reflect_scalar!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

unsafe impl Reflect for String {
    fn shape() -> Shape {
        Shape::Text
    }
}

unsafe impl<E: Reflect, const N: usize> Reflect for [E; N] {
    fn shape() -> Shape {
        Shape::Array {
            element: Box::new(E::shape()),
            len: N,
        }
    }
}

unsafe impl<E: Reflect + Default> Reflect for Vec<E> {
    fn shape() -> Shape {
        Shape::Sequence {
            element: Box::new(E::shape()),
            ops: SequenceOps::of::<E>(),
        }
    }
}

macro_rules! impl_reflect_opaque {
    ($($ty:ty => $reason:expr),* $(,)?) => {
        $(
            unsafe impl Reflect for $ty {
                fn shape() -> Shape {
                    Shape::Opaque {
                        type_name: stringify!($ty),
                        reason: $reason,
                    }
                }
            }
        )*
    };
}

impl_reflect_opaque!(
    usize => "platform-width integer has no fixed engine width",
    isize => "platform-width integer has no fixed engine width",
    char => "no engine character type, use u32 or String",
);

unsafe impl<T: 'static> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::Opaque {
            type_name: std::any::type_name::<Option<T>>(),
            reason: "optional values have no engine representation",
        }
    }
}

unsafe impl<T: 'static> Reflect for Box<T> {
    fn shape() -> Shape {
        Shape::Opaque {
            type_name: std::any::type_name::<Box<T>>(),
            reason: "pointer fields cannot be copied into a row",
        }
    }
}

/// Implement [`Reflect`] for a struct by listing its fields in layout order.
///
/// Listed fields are marshaled; unlisted fields are left alone. The struct
/// must be `'static` and should be `#[repr(C)]` so that declaration order
/// and layout order agree (out-of-order offsets are rejected when the type
/// is described).
#[macro_export]
macro_rules! record {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        unsafe impl $crate::types::Reflect for $ty {
            fn shape() -> $crate::types::Shape {
                let uninit = ::core::mem::MaybeUninit::<$ty>::uninit();
                let _base = uninit.as_ptr();
                $crate::types::Shape::Record($crate::types::RecordShape {
                    type_id: ::core::any::TypeId::of::<$ty>(),
                    path: concat!(module_path!(), "::", stringify!($ty)),
                    size: ::core::mem::size_of::<$ty>(),
                    align: ::core::mem::align_of::<$ty>(),
                    fields: vec![$(
                        $crate::types::FieldShape {
                            name: stringify!($field),
                            offset: ::core::mem::offset_of!($ty, $field),
                            // SAFETY: only the field address is computed, nothing is read.
                            shape: $crate::types::reflect::field_shape(unsafe {
                                ::core::ptr::addr_of!((*_base).$field)
                            }),
                        }
                    ),*],
                })
            }
        }
    };
}
