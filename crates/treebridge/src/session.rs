// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session: engine handle, type registry and configuration.
//!
//! A [`Session`] is the entry point. It owns the engine, shares a
//! [`TypeRegistry`] (which may be shared further between sessions), tells
//! the engine about classes once, and creates or reopens trees.
//!
//! ```rust
//! use treebridge::{record, HostValue, MemoryEngine, Session};
//!
//! #[repr(C)]
//! #[derive(Default, Clone)]
//! struct Det { e: f64, t: f64 }
//! record!(Det { e, t });
//!
//! # fn main() -> treebridge::Result<()> {
//! let session = Session::new(MemoryEngine::new());
//! let det = HostValue::new(Det::default());
//!
//! let mut tree = session.create_tree("tree", "detector hits");
//! tree.bind_composite("det", det.whole())?;
//! for i in 0..10 {
//!     det.borrow_mut().e = f64::from(i);
//!     tree.fill()?;
//! }
//! assert_eq!(tree.entry_count()?, 10);
//! # Ok(())
//! # }
//! ```

use crate::config::TreeConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::tree::Tree;
use crate::types::naming::translate_name;
use crate::types::{Reflect, TypeDescriptor, TypeRegistry};
use std::any::TypeId;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

/// State shared by a session and its trees.
pub(crate) struct SessionContext<E> {
    pub(crate) engine: Rc<RefCell<E>>,
    pub(crate) registry: Arc<TypeRegistry>,
    announced: Rc<RefCell<HashSet<TypeId>>>,
}

impl<E> Clone for SessionContext<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Rc::clone(&self.engine),
            registry: Arc::clone(&self.registry),
            announced: Rc::clone(&self.announced),
        }
    }
}

impl<E: Engine> SessionContext<E> {
    /// Shared engine access; [`Error::EngineBusy`] while the caller holds
    /// [`Session::engine_mut`].
    pub(crate) fn engine(&self) -> Result<Ref<'_, E>> {
        self.engine.try_borrow().map_err(|_| Error::EngineBusy)
    }

    /// Exclusive engine access; [`Error::EngineBusy`] while the caller holds
    /// any engine borrow.
    pub(crate) fn engine_mut(&self) -> Result<RefMut<'_, E>> {
        self.engine.try_borrow_mut().map_err(|_| Error::EngineBusy)
    }

    /// Register `desc` and every nested composite with the engine (nested
    /// first, once per session). Returns the class name of `desc`.
    pub(crate) fn announce(&self, desc: &Arc<TypeDescriptor>) -> Result<String> {
        let mut announced = self.announced.borrow_mut();
        for d in desc.nested().iter().chain(iter::once(desc)) {
            let type_id = d.identity().type_id();
            if announced.contains(&type_id) {
                continue;
            }
            let class = translate_name(d);
            self.engine_mut()?.register_class(&class, d)?;
            announced.insert(type_id);
            log::debug!("[Session::announce] class {} registered", class);
        }
        Ok(translate_name(desc))
    }
}

/// Engine plus type registry plus default tree configuration.
pub struct Session<E: Engine> {
    ctx: SessionContext<E>,
    config: TreeConfig,
}

impl<E: Engine> Session<E> {
    /// Session with a private registry and the default configuration.
    pub fn new(engine: E) -> Self {
        Self {
            ctx: SessionContext {
                engine: Rc::new(RefCell::new(engine)),
                registry: Arc::new(TypeRegistry::new()),
                announced: Rc::new(RefCell::new(HashSet::new())),
            },
            config: TreeConfig::default(),
        }
    }

    /// Session sharing `registry`, with a validated configuration.
    pub fn with_registry(
        engine: E,
        registry: Arc<TypeRegistry>,
        config: TreeConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut session = Self::new(engine);
        session.ctx.registry = registry;
        session.config = config;
        Ok(session)
    }

    /// Direct engine access. Tree operations started while the guard is
    /// alive fail with [`Error::EngineBusy`].
    pub fn engine(&self) -> Ref<'_, E> {
        self.ctx.engine.borrow()
    }

    pub fn engine_mut(&self) -> RefMut<'_, E> {
        self.ctx.engine.borrow_mut()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.ctx.registry
    }

    /// Default configuration of new trees.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Register `T` in the registry and its classes with the engine.
    ///
    /// Idempotent. Binding a composite branch does the same implicitly.
    pub fn register<T: Reflect>(&self) -> Result<Arc<TypeDescriptor>> {
        let desc = self.ctx.registry.register::<T>()?;
        self.ctx.announce(&desc)?;
        Ok(desc)
    }

    /// New tree, created in the engine when its first branch is bound.
    pub fn create_tree(&self, name: &str, title: &str) -> Tree<E> {
        self.create_tree_with_config(name, title, self.config.clone())
    }

    pub fn create_tree_with_config(&self, name: &str, title: &str, config: TreeConfig) -> Tree<E> {
        Tree::new(self.ctx.clone(), name, title, config)
    }

    /// Attach to an existing engine tree, e.g. to read it back.
    ///
    /// Bind host values to its branches with the same names and types used
    /// when writing, then call [`Tree::get_entry`]. `None` if the engine has
    /// no such tree or is borrowed by the caller.
    pub fn open_tree(&self, name: &str) -> Option<Tree<E>> {
        let handle = self.ctx.engine().ok()?.open_tree(name)?;
        Some(Tree::attach(
            self.ctx.clone(),
            name,
            handle,
            self.config.clone(),
        ))
    }
}
