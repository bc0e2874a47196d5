// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf-mode branches: one scalar per branch, typed by a leaf list.

use treebridge::{record, Error, HostValue, MemoryEngine, Session};

const ENTRIES: i64 = 10;

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

/// Standard normal sample (Box-Muller).
fn norm(rng: &mut fastrand::Rng) -> f64 {
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn generate(count: i64, seed: u64) -> Vec<Event> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|i| Event {
            i,
            a: Det {
                e: norm(&mut rng),
                t: norm(&mut rng),
            },
            b: Det {
                e: norm(&mut rng),
                t: norm(&mut rng),
            },
        })
        .collect()
}

fn bind_leaves(tree: &mut treebridge::Tree<MemoryEngine>, evt: &HostValue<Event>) {
    tree.bind_leaf("evt_i", evt.field(|e| &mut e.i), "evt_i/L")
        .expect("bind evt_i");
    tree.bind_leaf("evt_a_e", evt.field(|e| &mut e.a.e), "evt_a_e/D")
        .expect("bind evt_a_e");
    tree.bind_leaf("evt_a_t", evt.field(|e| &mut e.a.t), "evt_a_t/D")
        .expect("bind evt_a_t");
    tree.bind_leaf("evt_b_e", evt.field(|e| &mut e.b.e), "evt_b_e/D")
        .expect("bind evt_b_e");
    tree.bind_leaf("evt_b_t", evt.field(|e| &mut e.b.t), "evt_b_t/D")
        .expect("bind evt_b_t");
}

#[test]
fn test_leaf_branches_round_trip_bit_exact() {
    let session = Session::new(MemoryEngine::new());
    let events = generate(ENTRIES, 1);

    let evt = HostValue::new(Event::default());
    let mut tree = session.create_tree("tree", "my tree title");
    bind_leaves(&mut tree, &evt);

    for expected in &events {
        evt.replace(expected.clone());
        let report = tree.fill().expect("fill");
        assert!(report.is_clean());
        // 8 bytes per leaf.
        assert_eq!(report.bytes, 5 * 8);
    }
    assert_eq!(tree.entry_count().expect("count"), ENTRIES);

    for (index, expected) in events.iter().enumerate() {
        evt.replace(Event::default());
        let report = tree.get_entry(index as i64).expect("get_entry");
        assert!(report.is_clean());

        let got = evt.get();
        assert_eq!(got.i, expected.i);
        assert_eq!(got.a.e.to_bits(), expected.a.e.to_bits());
        assert_eq!(got.a.t.to_bits(), expected.a.t.to_bits());
        assert_eq!(got.b.e.to_bits(), expected.b.e.to_bits());
        assert_eq!(got.b.t.to_bits(), expected.b.t.to_bits());
    }
}

#[test]
fn test_leaf_branches_reopened_by_reader() {
    let session = Session::new(MemoryEngine::new());
    let events = generate(ENTRIES, 7);

    {
        let evt = HostValue::new(Event::default());
        let mut writer = session.create_tree("tree", "leaves");
        bind_leaves(&mut writer, &evt);
        for expected in &events {
            evt.replace(expected.clone());
            writer.fill().expect("fill");
        }
        // Dropping the writer closes it.
    }

    let mut reader = session.open_tree("tree").expect("tree exists");
    assert_eq!(reader.title(), "leaves");
    let out = HostValue::new(Event::default());
    bind_leaves(&mut reader, &out);
    assert_eq!(reader.entry_count().expect("count"), ENTRIES);
    assert_eq!(
        reader.leaves().expect("leaves"),
        vec!["evt_i", "evt_a_e", "evt_a_t", "evt_b_e", "evt_b_t"]
    );

    reader.get_entry(ENTRIES - 1).expect("last entry");
    assert_eq!(out.get(), events[(ENTRIES - 1) as usize]);

    assert!(matches!(
        reader.get_entry(ENTRIES),
        Err(Error::EngineFailure { bytes: 0, .. })
    ));
}

#[test]
fn test_leaf_kind_must_be_scalar() {
    let session = Session::new(MemoryEngine::new());
    let evt = HostValue::new(Event::default());
    let mut tree = session.create_tree("tree", "");

    let err = tree
        .bind_leaf("evt_a", evt.field(|e| &mut e.a), "evt_a/D")
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedKind { .. }));

    let err = tree
        .bind_leaf("evt_i", evt.field(|e| &mut e.i), "evt_i/Q")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Engine(treebridge::EngineError::InvalidLeafCode(_))
    ));
    assert!(tree.branch_names().is_empty());
}
