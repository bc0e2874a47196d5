// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-address buffers shared with the engine.
//!
//! A [`PinnedBuffer`] is allocated once with a fixed capacity and never
//! resized, so the address handed to the engine at `create_branch` stays
//! valid for as long as the buffer lives. Growing means allocating a new
//! buffer and re-issuing `create_branch` with it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle on a pinned buffer.
pub type BufferHandle = Rc<PinnedBuffer>;

/// Fixed-capacity byte region exchanged with the engine.
#[derive(Debug)]
pub struct PinnedBuffer {
    id: u64,
    bytes: RefCell<Box<[u8]>>,
    used: Cell<usize>,
    required: Cell<Option<usize>>,
}

impl PinnedBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> BufferHandle {
        Self::with_row(capacity, &[])
    }

    /// Allocate a buffer whose current row is `row_len` zero bytes.
    ///
    /// An all-zero fixed region decodes as an empty value.
    pub fn zeroed_row(capacity: usize, row_len: usize) -> BufferHandle {
        let buffer = Self::new(capacity.max(row_len));
        buffer.used.set(row_len);
        buffer
    }

    /// Allocate a zeroed buffer of `capacity` bytes holding a copy of `row`.
    pub(crate) fn with_row(capacity: usize, row: &[u8]) -> BufferHandle {
        let mut bytes = vec![0u8; capacity.max(row.len())].into_boxed_slice();
        bytes[..row.len()].copy_from_slice(row);
        Rc::new(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            bytes: RefCell::new(bytes),
            used: Cell::new(row.len()),
            required: Cell::new(None),
        })
    }

    /// Process-unique buffer id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start address of the region; constant for the buffer's lifetime.
    pub fn address(&self) -> *const u8 {
        self.bytes.borrow().as_ptr()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.borrow().len()
    }

    /// Bytes of the current row.
    pub fn used(&self) -> usize {
        self.used.get()
    }

    /// Capacity the last loaded row needed, if it did not fit.
    pub fn required(&self) -> Option<usize> {
        self.required.get()
    }

    /// Copy of the current row bytes.
    pub fn row_bytes(&self) -> Vec<u8> {
        self.bytes.borrow()[..self.used.get()].to_vec()
    }

    /// Engine side of a fetch: load one row into the buffer.
    ///
    /// Returns the number of bytes loaded. A row larger than the capacity
    /// is not copied; the buffer records the size it needs instead and
    /// returns 0.
    pub fn load_row(&self, row: &[u8]) -> usize {
        if row.len() > self.capacity() {
            self.required.set(Some(row.len()));
            return 0;
        }
        self.bytes.borrow_mut()[..row.len()].copy_from_slice(row);
        self.used.set(row.len());
        self.required.set(None);
        row.len()
    }

    pub(crate) fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.bytes.borrow()[..self.used.get()])
    }

    /// Host side of an encode: write `len` bytes starting at the row start.
    pub(crate) fn write_row(&self, len: usize, f: impl FnOnce(&mut [u8])) {
        let mut bytes = self.bytes.borrow_mut();
        let row = &mut bytes[..len];
        row.fill(0);
        f(row);
        self.used.set(len);
        self.required.set(None);
    }
}
