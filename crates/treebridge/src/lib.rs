// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # treebridge - native Rust records over columnar tree storage
//!
//! Marshals a program's own structs (scalars, fixed arrays, `Vec`s,
//! `String`s and nested structs) to and from a columnar, append-only
//! storage engine organised as named, independently typed *branches* of a
//! *tree*.
//!
//! ## Quick Start
//!
//! ```rust
//! use treebridge::{record, HostValue, MemoryEngine, Session};
//!
//! #[repr(C)]
//! #[derive(Default, Debug, Clone, PartialEq)]
//! struct Det { e: f64, t: f64 }
//! record!(Det { e, t });
//!
//! #[repr(C)]
//! #[derive(Default, Debug, Clone, PartialEq)]
//! struct Event { i: i64, a: Det, b: Det }
//! record!(Event { i, a, b });
//!
//! # fn main() -> treebridge::Result<()> {
//! let session = Session::new(MemoryEngine::new());
//!
//! // Write
//! let evt = HostValue::new(Event::default());
//! let mut tree = session.create_tree("tree", "my tree title");
//! tree.bind_composite("evt", evt.whole())?;
//! for i in 0..10 {
//!     let mut e = evt.borrow_mut();
//!     e.i = i;
//!     e.a.e = i as f64 * 0.5;
//!     drop(e);
//!     tree.fill()?;
//! }
//! tree.close()?;
//!
//! // Read back
//! let mut reader = session.open_tree("tree").expect("tree exists");
//! let out = HostValue::new(Event::default());
//! reader.bind_composite("evt", out.whole())?;
//! reader.get_entry(3)?;
//! assert_eq!(out.borrow().i, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  Session  ->  Tree  ->  BranchBinding (name, mode, enabled)    |
//! +---------------------------------------------------------------+
//! |  ValueBinding: HostField + RootType + PinnedBuffer             |
//! |  Encoder / Decoder (two-phase, field by field)                 |
//! +---------------------------------------------------------------+
//! |  TypeRegistry -> TypeDescriptor   (Reflect / record!)          |
//! |  naming: class names, leaf codes                               |
//! +---------------------------------------------------------------+
//! |  Engine trait   (MemoryEngine)                                 |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`session`] - entry point, class registration, tree creation
//! - [`tree`] - branch binding, `fill` / `get_entry`
//! - [`value`] - host handles, pinned buffers, encoder / decoder
//! - [`types`] - reflection, descriptors, registry, naming
//! - [`engine`] - engine trait and the in-memory engine
//! - [`config`] - tree configuration (YAML with `config-loaders`)

pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod tree;
pub mod types;
pub mod value;

pub use config::TreeConfig;
pub use engine::{Engine, EngineError, MemoryEngine};
pub use error::{BranchError, EngineOp, Error, Result};
pub use session::Session;
pub use tree::{BindMode, RowReport, Tree, TreeState, TreeSummary};
pub use types::{Reflect, ScalarKind, TypeDescriptor, TypeRegistry};
pub use value::{HostField, HostValue};
