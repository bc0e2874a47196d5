// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoder and decoder between host memory and engine buffers.
//!
//! Both directions run in two phases. The encoder first *measures* the host
//! value (validating every field and computing the row length), then
//! *writes* it; the decoder first *checks* the row (headers, bounds, bool
//! bytes, UTF-8), then *applies* it to the host value. The second phase
//! cannot fail, so an error leaves the previous buffer contents or the
//! previous host value untouched.
//!
//! # Row layout
//!
//! ```text
//! +---------------------------+-------------------------------------+
//! | fixed region              | tail                                |
//! | scalars, arrays, nested   | sequence / text payloads, packed in |
//! | composites inline;        | declaration order, each aligned to  |
//! | {len u32, offset u32} for | its element alignment               |
//! | sequences and text        |                                     |
//! +---------------------------+-------------------------------------+
//! ```
//!
//! All values are little-endian; offsets are relative to the row start.

use crate::error::{Error, Result};
use crate::types::descriptor::{align_up, FieldKind, ScalarKind, TypeDescriptor, VAR_HEADER_SIZE};
use crate::value::binding::{grow_buffer, Limits, RootType, ValueBinding};
use crate::value::buffer::BufferHandle;
use std::fmt::Write as _;

/// Result of one encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOutcome {
    /// Row length written to the buffer.
    pub bytes: usize,
    /// The buffer was replaced to fit the row; the engine must be re-pointed.
    pub reallocated: bool,
}

/// Copies a bound host value into its buffer.
#[derive(Debug, Clone)]
pub struct Encoder {
    label: String,
}

impl Encoder {
    /// `label` prefixes field paths in error messages (the branch name).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Copy the host value into the binding's buffer.
    ///
    /// Fails with [`Error::FieldMismatch`] when a sequence or text field is
    /// longer than the configured limit, and with [`Error::HostBorrowed`]
    /// when the host value is borrowed elsewhere.
    pub fn encode(&self, binding: &mut ValueBinding) -> Result<EncodeOutcome> {
        let ValueBinding {
            host,
            root,
            buffer,
            generation,
            limits,
        } = binding;

        let mut outcome = None;
        host.with_raw_mut(&mut |ptr| {
            outcome = Some(self.encode_into(root, ptr.cast_const(), buffer, generation, *limits));
        });
        outcome.ok_or_else(|| Error::HostBorrowed {
            branch: self.label.clone(),
        })?
    }

    fn encode_into(
        &self,
        root: &RootType,
        host: *const u8,
        buffer: &mut BufferHandle,
        generation: &mut u64,
        limits: Limits,
    ) -> Result<EncodeOutcome> {
        let len = match root {
            RootType::Leaf(kind) => kind.size(),
            RootType::Composite(desc) => {
                let mut path = FieldPath::new(&self.label);
                let mut tail = desc.foreign_size();
                // SAFETY: `host` points to a live value described by `desc`.
                unsafe { measure_fields(desc, host, &mut path, &mut tail, limits.max_sequence_len)? };
                tail
            }
        };
        if u32::try_from(len).is_err() {
            return Err(Error::mismatch(
                self.label.as_str(),
                format!("row of {} bytes exceeds the 4 GiB row limit", len),
            ));
        }

        let reallocated = len > buffer.capacity();
        if reallocated {
            grow_buffer(buffer, generation, limits, len);
        }

        buffer.write_row(len, |row| match root {
            // SAFETY: same pointer, validated by the measure pass.
            RootType::Leaf(kind) => unsafe { store_scalar(*kind, host, row) },
            RootType::Composite(desc) => {
                let mut tail = desc.foreign_size();
                unsafe { write_fields(desc, host, row, 0, &mut tail) };
            }
        });
        Ok(EncodeOutcome {
            bytes: len,
            reallocated,
        })
    }
}

/// Copies the row held in a binding's buffer into the host value.
#[derive(Debug, Clone)]
pub struct Decoder {
    label: String,
}

impl Decoder {
    /// `label` prefixes field paths in error messages (the branch name).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Overwrite the host value with the buffer's current row.
    ///
    /// Host sequences are resized to the decoded length. Fails with
    /// [`Error::FieldMismatch`] when the row is malformed for the bound type.
    pub fn decode(&self, binding: &mut ValueBinding) -> Result<()> {
        let ValueBinding {
            host, root, buffer, ..
        } = binding;

        buffer.with_bytes(|row| {
            self.check(root, row)?;
            host.with_raw_mut(&mut |ptr| {
                // SAFETY: `ptr` points to a live value described by `root`
                // and `row` passed the check pass.
                unsafe { apply_root(root, row, ptr) };
            })
            .ok_or_else(|| Error::HostBorrowed {
                branch: self.label.clone(),
            })
        })
    }

    fn check(&self, root: &RootType, row: &[u8]) -> Result<()> {
        let fixed = root.fixed_size();
        if row.len() < fixed {
            return Err(Error::mismatch(
                self.label.as_str(),
                format!("row holds {} bytes, fixed layout needs {}", row.len(), fixed),
            ));
        }
        let mut path = FieldPath::new(&self.label);
        match root {
            RootType::Leaf(kind) => check_scalar(*kind, row, 0, &path),
            RootType::Composite(desc) => check_fields(desc, row, 0, &mut path),
        }
    }
}

/// Dotted field path used in error messages (`evt.hits[2].e`).
struct FieldPath {
    buf: String,
}

impl FieldPath {
    fn new(root: &str) -> Self {
        Self {
            buf: root.to_string(),
        }
    }

    fn push_field(&mut self, name: &str) -> usize {
        let mark = self.buf.len();
        self.buf.push('.');
        self.buf.push_str(name);
        mark
    }

    fn push_index(&mut self, index: usize) -> usize {
        let mark = self.buf.len();
        let _ = write!(self.buf, "[{}]", index);
        mark
    }

    fn pop(&mut self, mark: usize) {
        self.buf.truncate(mark);
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::mismatch(self.buf.as_str(), reason)
    }
}

// ============================================================================
// Encode
// ============================================================================

unsafe fn measure_fields(
    desc: &TypeDescriptor,
    host: *const u8,
    path: &mut FieldPath,
    tail: &mut usize,
    max_len: u32,
) -> Result<()> {
    for field in desc.fields() {
        let mark = path.push_field(&field.name);
        unsafe { measure_kind(&field.kind, host.add(field.offset), path, tail, max_len)? };
        path.pop(mark);
    }
    Ok(())
}

unsafe fn measure_kind(
    kind: &FieldKind,
    host: *const u8,
    path: &mut FieldPath,
    tail: &mut usize,
    max_len: u32,
) -> Result<()> {
    match kind {
        // Array elements have a fixed layout.
        FieldKind::Scalar(_) | FieldKind::Array { .. } => Ok(()),
        FieldKind::Sequence { element, ops } => {
            let len = unsafe { ops.len(host) };
            check_len(len, max_len, path, "sequence")?;
            *tail = align_up(*tail, element.foreign_align()) + len * element.foreign_size();
            Ok(())
        }
        FieldKind::Text => {
            let text = unsafe { &*host.cast::<String>() };
            check_len(text.len(), max_len, path, "text")?;
            *tail += text.len();
            Ok(())
        }
        FieldKind::Composite(desc) => unsafe { measure_fields(desc, host, path, tail, max_len) },
    }
}

fn check_len(len: usize, max_len: u32, path: &FieldPath, what: &str) -> Result<()> {
    if len > max_len as usize {
        return Err(path.error(format!(
            "{} length {} exceeds limit {}",
            what, len, max_len
        )));
    }
    Ok(())
}

unsafe fn write_fields(
    desc: &TypeDescriptor,
    host: *const u8,
    row: &mut [u8],
    base: usize,
    tail: &mut usize,
) {
    for field in desc.fields() {
        unsafe {
            write_kind(
                &field.kind,
                host.add(field.offset),
                row,
                base + field.foreign_offset,
                tail,
            );
        }
    }
}

unsafe fn write_kind(kind: &FieldKind, host: *const u8, row: &mut [u8], at: usize, tail: &mut usize) {
    match kind {
        FieldKind::Scalar(k) => unsafe { store_scalar(*k, host, &mut row[at..]) },
        FieldKind::Array { element, len } => {
            let (host_stride, row_stride) = (element.host_size(), element.foreign_size());
            for i in 0..*len {
                unsafe { write_kind(element, host.add(i * host_stride), row, at + i * row_stride, tail) };
            }
        }
        FieldKind::Sequence { element, ops } => {
            let len = unsafe { ops.len(host) };
            let data = unsafe { ops.data(host) };
            let start = align_up(*tail, element.foreign_align());
            let row_stride = element.foreign_size();
            *tail = start + len * row_stride;
            for i in 0..len {
                unsafe {
                    write_kind(element, data.add(i * ops.elem_size()), row, start + i * row_stride, tail);
                }
            }
            write_header(row, at, len, start);
        }
        FieldKind::Text => {
            let text = unsafe { &*host.cast::<String>() };
            let start = *tail;
            row[start..start + text.len()].copy_from_slice(text.as_bytes());
            *tail += text.len();
            write_header(row, at, text.len(), start);
        }
        FieldKind::Composite(desc) => unsafe { write_fields(desc, host, row, at, tail) },
    }
}

fn write_header(row: &mut [u8], at: usize, len: usize, offset: usize) {
    row[at..at + 4].copy_from_slice(&(len as u32).to_le_bytes());
    row[at + 4..at + 8].copy_from_slice(&(offset as u32).to_le_bytes());
}

/// Host (native-endian) scalar to row (little-endian).
unsafe fn store_scalar(kind: ScalarKind, src: *const u8, dst: &mut [u8]) {
    let n = kind.size();
    let dst = &mut dst[..n];
    unsafe { std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), n) };
    if cfg!(target_endian = "big") {
        dst.reverse();
    }
}

// ============================================================================
// Decode
// ============================================================================

fn check_fields(desc: &TypeDescriptor, row: &[u8], base: usize, path: &mut FieldPath) -> Result<()> {
    for field in desc.fields() {
        let mark = path.push_field(&field.name);
        check_kind(&field.kind, row, base + field.foreign_offset, path)?;
        path.pop(mark);
    }
    Ok(())
}

fn check_kind(kind: &FieldKind, row: &[u8], at: usize, path: &mut FieldPath) -> Result<()> {
    match kind {
        FieldKind::Scalar(k) => check_scalar(*k, row, at, path),
        FieldKind::Array { element, len } => {
            let stride = element.foreign_size();
            for i in 0..*len {
                let mark = path.push_index(i);
                check_kind(element, row, at + i * stride, path)?;
                path.pop(mark);
            }
            Ok(())
        }
        FieldKind::Sequence { element, .. } => {
            let (len, offset) = read_header(row, at, path)?;
            let stride = element.foreign_size();
            let end = len.checked_mul(stride).and_then(|n| n.checked_add(offset));
            if !matches!(end, Some(end) if end <= row.len()) {
                return Err(path.error(format!(
                    "sequence of {} elements at offset {} overruns row of {} bytes",
                    len,
                    offset,
                    row.len()
                )));
            }
            for i in 0..len {
                let mark = path.push_index(i);
                check_kind(element, row, offset + i * stride, path)?;
                path.pop(mark);
            }
            Ok(())
        }
        FieldKind::Text => {
            let (len, offset) = read_header(row, at, path)?;
            let bytes = offset
                .checked_add(len)
                .and_then(|end| row.get(offset..end))
                .ok_or_else(|| {
                    path.error(format!(
                        "text of {} bytes at offset {} overruns row of {} bytes",
                        len,
                        offset,
                        row.len()
                    ))
                })?;
            std::str::from_utf8(bytes)
                .map_err(|e| path.error(format!("invalid UTF-8 text: {}", e)))?;
            Ok(())
        }
        FieldKind::Composite(desc) => check_fields(desc, row, at, path),
    }
}

fn check_scalar(kind: ScalarKind, row: &[u8], at: usize, path: &FieldPath) -> Result<()> {
    let Some(bytes) = row.get(at..at + kind.size()) else {
        return Err(path.error(format!("row truncated at offset {}", at)));
    };
    if kind == ScalarKind::Bool && bytes[0] > 1 {
        return Err(path.error(format!("invalid bool byte {:#04x}", bytes[0])));
    }
    Ok(())
}

fn read_header(row: &[u8], at: usize, path: &FieldPath) -> Result<(usize, usize)> {
    row.get(at..at + VAR_HEADER_SIZE)
        .map(|_| header(row, at))
        .ok_or_else(|| path.error(format!("header truncated at offset {}", at)))
}

fn header(row: &[u8], at: usize) -> (usize, usize) {
    let len = u32::from_le_bytes([row[at], row[at + 1], row[at + 2], row[at + 3]]);
    let offset = u32::from_le_bytes([row[at + 4], row[at + 5], row[at + 6], row[at + 7]]);
    (len as usize, offset as usize)
}

unsafe fn apply_root(root: &RootType, row: &[u8], host: *mut u8) {
    match root {
        RootType::Leaf(kind) => unsafe { load_scalar(*kind, row, host) },
        RootType::Composite(desc) => unsafe { apply_fields(desc, row, 0, host) },
    }
}

unsafe fn apply_fields(desc: &TypeDescriptor, row: &[u8], base: usize, host: *mut u8) {
    for field in desc.fields() {
        unsafe {
            apply_kind(
                &field.kind,
                row,
                base + field.foreign_offset,
                host.add(field.offset),
            );
        }
    }
}

unsafe fn apply_kind(kind: &FieldKind, row: &[u8], at: usize, host: *mut u8) {
    match kind {
        FieldKind::Scalar(k) => unsafe { load_scalar(*k, &row[at..], host) },
        FieldKind::Array { element, len } => {
            let (host_stride, row_stride) = (element.host_size(), element.foreign_size());
            for i in 0..*len {
                unsafe { apply_kind(element, row, at + i * row_stride, host.add(i * host_stride)) };
            }
        }
        FieldKind::Sequence { element, ops } => {
            let (len, offset) = header(row, at);
            let row_stride = element.foreign_size();
            unsafe { ops.resize(host, len) };
            let data = unsafe { ops.data_mut(host) };
            for i in 0..len {
                unsafe {
                    apply_kind(element, row, offset + i * row_stride, data.add(i * ops.elem_size()));
                }
            }
        }
        FieldKind::Text => {
            let (len, offset) = header(row, at);
            let text = unsafe { &mut *host.cast::<String>() };
            text.clear();
            text.push_str(std::str::from_utf8(&row[offset..offset + len]).unwrap_or_default());
        }
        FieldKind::Composite(desc) => unsafe { apply_fields(desc, row, at, host) },
    }
}

/// Row (little-endian) scalar to host (native-endian).
unsafe fn load_scalar(kind: ScalarKind, src: &[u8], dst: *mut u8) {
    let n = kind.size();
    let mut bytes = [0u8; 8];
    bytes[..n].copy_from_slice(&src[..n]);
    if cfg!(target_endian = "big") {
        bytes[..n].reverse();
    }
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, n) };
}
