// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host values, pinned buffers and the codec between them.

pub mod binding;
pub mod buffer;
pub mod codec;
pub mod host;

pub use binding::{RootType, ValueBinding};
pub use buffer::{BufferHandle, PinnedBuffer};
pub use codec::{Decoder, EncodeOutcome, Encoder};
pub use host::{HostField, HostValue};
