// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host value handles.
//!
//! The host program keeps ownership of its values through a [`HostValue`]
//! (a shared, interior-mutable handle). A branch is bound to a
//! [`HostField`]: the handle plus a projection selecting the part of the
//! value the branch reads and writes. The marshaling layer only touches the
//! value while it holds the `RefCell` borrow, during `fill` and `get_entry`.

use crate::types::Reflect;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Shared handle on a host value.
pub struct HostValue<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> Clone for HostValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HostValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostValue").field(&self.cell).finish()
    }
}

impl<T: Default + 'static> Default for HostValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

fn whole<T>(value: &mut T) -> &mut T {
    value
}

impl<T: 'static> HostValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
        }
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.cell.replace(value)
    }

    /// Clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    /// Bind the whole value.
    pub fn whole(&self) -> HostField<T, T>
    where
        T: Reflect,
    {
        HostField {
            value: self.clone(),
            project: whole::<T>,
        }
    }

    /// Bind one part of the value, selected by `project`.
    ///
    /// ```rust
    /// use treebridge::HostValue;
    ///
    /// #[derive(Default)]
    /// struct Event { i: i64, e: f64 }
    ///
    /// let evt = HostValue::new(Event::default());
    /// let energy = evt.field(|e| &mut e.e);
    /// # let _ = energy;
    /// ```
    pub fn field<S: Reflect>(&self, project: fn(&mut T) -> &mut S) -> HostField<T, S> {
        HostField {
            value: self.clone(),
            project,
        }
    }
}

/// A host value plus the projection a branch is bound to.
pub struct HostField<T, S> {
    value: HostValue<T>,
    project: fn(&mut T) -> &mut S,
}

impl<T, S> HostField<T, S> {
    /// Handle on the whole host value.
    pub fn value(&self) -> &HostValue<T> {
        &self.value
    }
}

impl<T, S> Clone for HostField<T, S> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            project: self.project,
        }
    }
}

/// Type-erased access to the bound part of a host value.
pub(crate) trait HostAccess {
    /// Run `f` with a pointer to the bound part, holding an exclusive borrow.
    ///
    /// Returns `None` (without running `f`) if the value is already borrowed.
    fn with_raw_mut(&self, f: &mut dyn FnMut(*mut u8)) -> Option<()>;
}

impl<T: 'static, S: 'static> HostAccess for HostField<T, S> {
    fn with_raw_mut(&self, f: &mut dyn FnMut(*mut u8)) -> Option<()> {
        let mut guard = self.value.cell.try_borrow_mut().ok()?;
        let part: &mut S = (self.project)(&mut *guard);
        f(std::ptr::from_mut(part).cast::<u8>());
        Some(())
    }
}
