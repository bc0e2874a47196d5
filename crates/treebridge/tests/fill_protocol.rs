// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Row protocol: entry counts, per-branch failures, engine failures,
//! branch status and tree lifecycle.

use treebridge::engine::EngineError;
use treebridge::{record, EngineOp, Error, HostValue, MemoryEngine, Session, TreeConfig, TreeState};

#[repr(C)]
#[derive(Default, Debug, Clone, PartialEq)]
struct Track {
    id: i64,
    vals: Vec<f64>,
}
record!(Track { id, vals });

fn track(id: i64, n: usize) -> Track {
    Track {
        id,
        vals: (0..n).map(|k| k as f64 + id as f64 / 10.0).collect(),
    }
}

#[test]
fn test_entry_count_matches_fills() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(Track::default());
    let mut tree = session.create_tree("count", "");
    tree.bind_composite("trk", value.whole()).expect("bind");

    for i in 0..25 {
        value.replace(track(i, (i % 4) as usize));
        assert!(tree.fill().expect("fill").bytes > 0);
    }
    assert_eq!(tree.entry_count().expect("count"), 25);
}

#[test]
fn test_failing_branch_does_not_stop_siblings() {
    let session = Session::new(MemoryEngine::new());
    let config = TreeConfig::default().with_max_sequence_len(4);
    let value = HostValue::new(track(0, 2));
    let mut tree = session.create_tree_with_config("partial", "", config);
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.bind_leaf("id", value.field(|t| &mut t.id), "id/L")
        .expect("bind");

    assert!(tree.fill().expect("row 0").is_clean());

    value.replace(track(1, 5));
    let report = tree.fill().expect("row 1 is still committed");
    assert_eq!(report.branch_errors.len(), 1);
    assert_eq!(report.branch_errors[0].branch, "trk");
    assert!(matches!(
        report.branch_errors[0].error,
        Error::FieldMismatch { ref field, .. } if field == "trk.vals"
    ));
    assert_eq!(tree.entry_count().expect("count"), 2);

    // The failed branch kept its previous row; its sibling moved on.
    value.replace(Track::default());
    tree.get_entry(1).expect("get_entry");
    let got = value.get();
    assert_eq!(got.vals, track(0, 2).vals);
    assert_eq!(got.id, 1);
}

#[test]
fn test_failed_first_encode_commits_empty_value() {
    let session = Session::new(MemoryEngine::new());
    let config = TreeConfig::default().with_max_sequence_len(1);
    let value = HostValue::new(track(7, 2));
    let mut tree = session.create_tree_with_config("first", "", config);
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.bind_leaf("id", value.field(|t| &mut t.id), "id/L")
        .expect("bind");

    let report = tree.fill().expect("row 0 is still committed");
    assert_eq!(report.branch_errors.len(), 1);
    assert_eq!(report.branch_errors[0].branch, "trk");

    value.replace(track(3, 3));
    let report = tree.get_entry(0).expect("get_entry");
    assert!(report.is_clean());
    assert_eq!(value.get(), Track { id: 7, vals: vec![] });
}

#[test]
fn test_commit_failure_carries_branch_errors() {
    let session = Session::new(MemoryEngine::new());
    let config = TreeConfig::default().with_max_sequence_len(1);
    let value = HostValue::new(track(3, 1));
    let mut tree = session.create_tree_with_config("commit", "", config);
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.fill().expect("fill");

    value.replace(track(4, 3));
    session.engine_mut().fail_next_commits(1);
    match tree.fill() {
        Err(Error::EngineFailure {
            operation,
            bytes,
            branch_errors,
        }) => {
            assert_eq!(operation, EngineOp::Commit);
            assert_eq!(bytes, 0);
            assert_eq!(branch_errors.len(), 1);
            assert_eq!(branch_errors[0].branch, "trk");
        }
        other => panic!("expected commit failure, got {:?}", other),
    }
    assert_eq!(tree.entry_count().expect("count"), 1);

    // The next commit goes through.
    value.replace(track(5, 1));
    assert!(tree.fill().expect("fill").is_clean());
    assert_eq!(tree.entry_count().expect("count"), 2);
}

#[test]
fn test_fetch_failure_leaves_host_untouched() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(track(1, 2));
    let mut tree = session.create_tree("fetch", "");
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.fill().expect("fill");

    value.replace(track(9, 9));
    session.engine_mut().fail_next_fetches(1);
    let err = tree.get_entry(0).unwrap_err();
    assert!(matches!(
        err,
        Error::EngineFailure {
            operation: EngineOp::Fetch,
            bytes: 0,
            ..
        }
    ));
    assert_eq!(value.get(), track(9, 9));

    assert!(matches!(
        tree.get_entry(-1),
        Err(Error::EngineFailure { bytes: 0, .. })
    ));
    tree.get_entry(0).expect("retry");
    assert_eq!(value.get(), track(1, 2));
}

#[test]
fn test_disabled_branch_is_not_decoded() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(track(1, 3));
    let mut tree = session.create_tree("status", "");
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.bind_leaf("trk_id", value.field(|t| &mut t.id), "trk_id/L")
        .expect("bind");
    tree.fill().expect("fill");

    assert!(tree.set_branch_enabled("trk", false).expect("status"));
    assert!(!tree.branch("trk").expect("branch").is_enabled());
    value.replace(track(7, 1));
    tree.get_entry(0).expect("get_entry");
    let got = value.get();
    assert_eq!(got.id, 1);
    assert_eq!(got.vals, track(7, 1).vals);

    // Patterns switch several branches at once.
    assert!(tree.set_branch_enabled("trk*", true).expect("status"));
    assert!(tree.branch("trk").expect("branch").is_enabled());
    tree.get_entry(0).expect("get_entry");
    assert_eq!(value.get(), track(1, 3));

    assert!(!tree.set_branch_enabled("none*", false).expect("status"));
    assert!(matches!(
        tree.set_branch_enabled("none", false),
        Err(Error::UnknownBranch(ref name)) if name == "none"
    ));
}

#[test]
fn test_borrowed_host_is_reported_per_branch() {
    let session = Session::new(MemoryEngine::new());
    let busy = HostValue::new(track(1, 1));
    let free = HostValue::new(2.5f64);
    let mut tree = session.create_tree("borrowed", "");
    tree.bind_composite("busy", busy.whole()).expect("bind");
    tree.bind_leaf("free", free.whole(), "free/D").expect("bind");
    tree.fill().expect("fill");

    let guard = busy.borrow();
    free.replace(3.5);
    let report = tree.fill().expect("fill");
    drop(guard);
    assert_eq!(report.branch_errors.len(), 1);
    assert!(matches!(
        report.branch_errors[0].error,
        Error::HostBorrowed { ref branch } if branch == "busy"
    ));

    free.replace(0.0);
    tree.get_entry(1).expect("get_entry");
    assert_eq!(free.get(), 3.5);
}

#[test]
fn test_borrowed_host_on_read_spares_siblings() {
    let session = Session::new(MemoryEngine::new());
    let busy = HostValue::new(track(1, 2));
    let free = HostValue::new(2.5f64);
    let mut tree = session.create_tree("borrowed_read", "");
    tree.bind_composite("busy", busy.whole()).expect("bind");
    tree.bind_leaf("free", free.whole(), "free/D").expect("bind");
    tree.fill().expect("fill");

    busy.replace(track(9, 0));
    free.replace(0.0);
    let guard = busy.borrow();
    let report = tree.get_entry(0).expect("get_entry");
    drop(guard);

    assert_eq!(report.branch_errors.len(), 1);
    assert_eq!(report.branch_errors[0].branch, "busy");
    assert!(matches!(
        report.branch_errors[0].error,
        Error::HostBorrowed { ref branch } if branch == "busy"
    ));
    assert_eq!(free.get(), 2.5);
    assert_eq!(busy.get(), track(9, 0));
}

#[test]
fn test_lifecycle_errors() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(track(1, 1));

    let mut tree = session.create_tree("life", "");
    assert_eq!(tree.state(), TreeState::Unbound);
    assert!(matches!(tree.get_entry(0), Err(Error::TreeUnbound)));
    assert!(matches!(tree.set_branch_enabled("*", false), Err(Error::TreeUnbound)));
    assert!(matches!(tree.leaves(), Err(Error::TreeUnbound)));

    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.fill().expect("fill");

    // New branches cannot join a tree that already has rows.
    let err = tree
        .bind_leaf("late", value.field(|t| &mut t.id), "late/L")
        .unwrap_err();
    assert!(matches!(err, Error::Engine(EngineError::BranchAfterRows { .. })));
    assert_eq!(tree.branch_names(), vec!["trk"]);

    let err = tree
        .bind_leaf("trk", value.field(|t| &mut t.id), "trk/L")
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateBranch { .. }));

    tree.close().expect("close");
    assert!(matches!(tree.fill(), Err(Error::TreeClosed)));
    assert!(matches!(tree.entry_count(), Err(Error::TreeClosed)));
    assert!(matches!(tree.summary(), Err(Error::TreeClosed)));

    // Same name in the engine is taken.
    let mut again = session.create_tree("life", "");
    let err = again.bind_composite("trk", value.whole()).unwrap_err();
    assert!(matches!(err, Error::Engine(EngineError::TreeExists(_))));
}

#[test]
fn test_dropped_writer_can_be_reopened() {
    let session = Session::new(MemoryEngine::new());
    {
        let value = HostValue::new(track(0, 0));
        let mut tree = session.create_tree("dropped", "kept rows");
        tree.bind_composite("trk", value.whole()).expect("bind");
        for i in 0..3 {
            value.replace(track(i, 2));
            tree.fill().expect("fill");
        }
    }

    let mut reader = session.open_tree("dropped").expect("tree");
    assert_eq!(reader.state(), TreeState::Bound);
    assert_eq!(reader.title(), "kept rows");
    assert_eq!(reader.entry_count().expect("count"), 3);

    // Released buffers are detached until rebound.
    assert!(matches!(
        reader.fill(),
        Err(Error::EngineFailure {
            operation: EngineOp::Commit,
            ..
        })
    ));

    let out = HostValue::new(Track::default());
    reader.bind_composite("trk", out.whole()).expect("bind");
    reader.get_entry(2).expect("get_entry");
    assert_eq!(out.get(), track(2, 2));

    let summary = reader.summary().expect("summary").to_string();
    assert!(summary.contains("*Entries :         3"));
}

#[test]
fn test_borrowed_engine_is_reported() {
    let session = Session::new(MemoryEngine::new());
    let value = HostValue::new(track(1, 1));
    let mut tree = session.create_tree("engine_busy", "");
    tree.bind_composite("trk", value.whole()).expect("bind");
    tree.fill().expect("fill");

    // Shared access still allows reads.
    let guard = session.engine();
    assert!(matches!(tree.fill(), Err(Error::EngineBusy)));
    assert!(matches!(tree.get_entry(0), Err(Error::EngineBusy)));
    assert_eq!(tree.entry_count().expect("count"), 1);
    drop(guard);

    {
        let _guard = session.engine_mut();
        assert!(matches!(tree.entry_count(), Err(Error::EngineBusy)));
        assert!(matches!(tree.summary(), Err(Error::EngineBusy)));
        assert!(session.open_tree("engine_busy").is_none());
    }
    tree.fill().expect("fill");
    assert_eq!(tree.entry_count().expect("count"), 2);
}

#[test]
fn test_reopened_branch_keeps_its_type() {
    let session = Session::new(MemoryEngine::new());
    {
        let x = HostValue::new(1.5f64);
        let mut tree = session.create_tree("typed", "");
        tree.bind_leaf("x", x.whole(), "x/D").expect("bind");
        tree.fill().expect("fill");
    }

    let mut reader = session.open_tree("typed").expect("tree");
    let wrong = HostValue::new(0i64);
    let err = reader.bind_leaf("x", wrong.whole(), "x/L").unwrap_err();
    assert!(matches!(err, Error::DuplicateBranch { ref name, .. } if name == "x"));
    assert!(reader.branch_names().is_empty());

    let right = HostValue::new(0.0f64);
    reader.bind_leaf("x", right.whole(), "x/D").expect("bind");
    reader.get_entry(0).expect("get_entry");
    assert_eq!(right.get(), 1.5);
}
