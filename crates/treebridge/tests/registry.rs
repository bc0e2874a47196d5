// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registration: idempotence, naming, rejected types, configuration.

use std::sync::Arc;
use std::thread;
use treebridge::types::translate_name;
use treebridge::{record, Error, HostValue, MemoryEngine, Session, TypeRegistry};

#[repr(C)]
#[derive(Default, Debug, Clone, PartialEq)]
struct Det {
    e: f64,
    t: f64,
}
record!(Det { e, t });

#[repr(C)]
#[derive(Default, Debug, Clone, PartialEq)]
struct Event {
    i: i64,
    a: Det,
    b: Det,
}
record!(Event { i, a, b });

#[repr(C)]
#[derive(Default, Debug, Clone)]
struct Node {
    weight: f32,
    children: Vec<Node>,
}
record!(Node { weight, children });

#[repr(C)]
#[derive(Default)]
struct WithUsize {
    n: usize,
}
record!(WithUsize { n });

#[repr(C)]
#[derive(Default)]
struct WithChar {
    c: char,
}
record!(WithChar { c });

#[repr(C)]
#[derive(Default)]
struct WithOption {
    maybe: Option<i32>,
}
record!(WithOption { maybe });

#[repr(C)]
#[derive(Default)]
struct WithNames {
    names: Vec<String>,
}
record!(WithNames { names });

#[repr(C)]
#[derive(Default)]
struct WithBox {
    inner: Box<Det>,
}
record!(WithBox { inner });

#[repr(C)]
#[derive(Default, Clone)]
struct Sample {
    tag: String,
}
record!(Sample { tag });

#[repr(C)]
#[derive(Default)]
struct WithSamples {
    samples: Vec<Sample>,
}
record!(WithSamples { samples });

fn rejected_field(err: Error) -> Option<String> {
    match err {
        Error::UnsupportedKind { field, .. } => field,
        other => panic!("expected UnsupportedKind, got {:?}", other),
    }
}

#[test]
fn test_register_is_idempotent_and_name_is_stable() {
    let session = Session::new(MemoryEngine::new());
    let first = session.register::<Event>().expect("register");
    let second = session.register::<Event>().expect("register again");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(translate_name(&first), translate_name(&second));
    assert_eq!(session.engine().class_count(), 2);
    assert_eq!(session.registry().len(), 2);
}

#[test]
fn test_shared_registry_across_threads() {
    let registry = Arc::new(TypeRegistry::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.describe::<Event>().expect("describe"))
        })
        .collect();
    let descs: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    // Every thread sees the same descriptor once the race is settled.
    let cached = registry.describe::<Event>().expect("cached");
    assert!(descs.iter().all(|d| d.identity() == cached.identity()));
    assert_eq!(registry.len(), 2);
    assert!(registry.stats().hits >= 1);
}

#[test]
fn test_unsupported_fields_are_rejected() {
    let registry = TypeRegistry::new();
    assert_eq!(
        rejected_field(registry.describe::<WithUsize>().unwrap_err()).as_deref(),
        Some("n")
    );
    assert_eq!(
        rejected_field(registry.describe::<WithChar>().unwrap_err()).as_deref(),
        Some("c")
    );
    assert_eq!(
        rejected_field(registry.describe::<WithOption>().unwrap_err()).as_deref(),
        Some("maybe")
    );
    assert_eq!(
        rejected_field(registry.describe::<WithNames>().unwrap_err()).as_deref(),
        Some("names")
    );
    assert_eq!(
        rejected_field(registry.describe::<WithBox>().unwrap_err()).as_deref(),
        Some("inner")
    );
    assert_eq!(
        rejected_field(registry.describe::<WithSamples>().unwrap_err()).as_deref(),
        Some("samples")
    );
    assert!(matches!(
        registry.describe::<f64>(),
        Err(Error::UnsupportedKind { field: None, .. })
    ));
}

#[test]
fn test_cyclic_type_is_rejected() {
    let registry = TypeRegistry::new();
    let err = registry.describe::<Node>().unwrap_err();
    match err {
        Error::UnsupportedKind { reason, .. } => assert!(reason.contains("cyclic")),
        other => panic!("expected UnsupportedKind, got {:?}", other),
    }
    assert!(registry.get(std::any::TypeId::of::<Node>()).is_none());
}

#[test]
fn test_rejected_type_cannot_be_bound() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(WithNames::default());
    let mut tree = session.create_tree("bad", "");
    assert!(matches!(
        tree.bind_composite("names", value.whole()),
        Err(Error::UnsupportedKind { .. })
    ));
    assert!(tree.branch_names().is_empty());
    assert_eq!(session.engine().class_count(), 0);
}

#[cfg(feature = "config-loaders")]
mod yaml {
    use std::io::Write;
    use treebridge::{Error, MemoryEngine, Session, TreeConfig, TypeRegistry};

    #[test]
    fn test_session_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "split_level: 0").expect("write");
        writeln!(file, "sequence_capacity: 4").expect("write");
        writeln!(file, "max_sequence_len: 1000").expect("write");

        let config = TreeConfig::from_yaml_file(file.path()).expect("config");
        assert_eq!(config.split_level, 0);
        assert_eq!(config.sequence_capacity, 4);
        assert_eq!(config.max_sequence_len, 1000);
        assert_eq!(config.buffer_size, TreeConfig::default().buffer_size);

        let session = Session::with_registry(
            MemoryEngine::new(),
            std::sync::Arc::new(TypeRegistry::new()),
            config,
        )
        .expect("session");
        assert_eq!(session.config().split_level, 0);
    }

    #[test]
    fn test_yaml_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            TreeConfig::from_yaml_file(&missing),
            Err(Error::ConfigFileNotFound(_))
        ));
        assert!(matches!(
            TreeConfig::from_yaml_str("growth_factor: 1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            TreeConfig::from_yaml_str("buffer_sise: 10"),
            Err(Error::Config(_))
        ));
    }
}
