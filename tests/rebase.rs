//! Provisional-identifier rebasing and history bookkeeping.

use graft::{Database, PropertyValue};

#[test]
fn provisional_nodes_are_renumbered_past_main_growth() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let main = db.session("g").expect("main");
    for _ in 0..13 {
        main.create_node(&["Seed"], &[]).expect("seed node");
    }

    // Forked at next-node-id 13: local creations are numbered 13, 14.
    let mut late = db.session("g").expect("late");
    late.new_change();
    let p1 = late
        .create_node(&["X1"], &[("k", PropertyValue::from(1_i64))])
        .expect("first provisional");
    let p2 = late.create_node(&["X2"], &[]).expect("second provisional");
    assert_eq!((p1, p2), (13, 14));

    // Another change wins two more main entities first.
    let mut early = db.session("g").expect("early");
    early.new_change();
    early.create_node(&["Y1"], &[]).expect("y1");
    early.create_node(&["Y2"], &[]).expect("y2");
    early.commit().expect("early commit");
    early.submit().expect("early accepted");

    late.commit().expect("late commit");
    late.submit().expect("late accepted");

    // The provisional nodes continued main's counter: 13, 14 became 15, 16.
    let n15 = main.get_node(15).expect("get 15").expect("exists");
    let n16 = main.get_node(16).expect("get 16").expect("exists");
    assert_eq!(n15.labels, vec!["X1".to_string()]);
    assert_eq!(n15.properties.get("k"), Some(&PropertyValue::Int(1)));
    assert_eq!(n16.labels, vec!["X2".to_string()]);
    assert_eq!(main.node_count().expect("count"), 17);
}

#[test]
fn edge_endpoints_are_rewritten_to_rebased_ids() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let main = db.session("g").expect("main");
    main.create_node(&["Seed"], &[]).expect("node 0");

    let mut late = db.session("g").expect("late");
    late.new_change();
    let local = late.create_node(&["Local"], &[]).expect("provisional node");
    late.create_edge("LINKS", 0, local, &[]).expect("edge to provisional");

    let mut early = db.session("g").expect("early");
    early.new_change();
    early.create_node(&["Fast"], &[]).expect("fast node");
    early.commit().expect("early commit");
    early.submit().expect("early accepted");

    late.commit().expect("late commit");
    late.submit().expect("late accepted");

    // local id 1 was rebased to 2; the edge's target must follow it.
    let edge = main.get_edge(0).expect("get edge").expect("exists");
    assert_eq!(edge.source, 0);
    assert_eq!(edge.target, 2);
    assert_eq!(edge.type_name, "LINKS");
    assert!(main.get_node(2).expect("get").is_some());
}

#[test]
fn identifiers_are_never_reused_after_tombstoning() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let session = db.session("g").expect("session");

    for i in 0..3 {
        assert_eq!(session.create_node(&[], &[]).expect("node"), i);
    }
    session.delete_nodes(&[2]).expect("delete node 2");
    assert!(session.get_node(2).expect("get").is_none());

    // The next allocation continues past the tombstoned id.
    assert_eq!(session.create_node(&[], &[]).expect("node"), 3);
    assert!(session.get_node(2).expect("get").is_none());
}

#[test]
fn history_deltas_match_net_entity_changes() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let session = db.session("g").expect("session");

    for _ in 0..4 {
        session.create_node(&[], &[]).expect("node");
    }
    session.create_edge("E", 0, 1, &[]).expect("edge 0");
    session.create_edge("E", 1, 2, &[]).expect("edge 1");

    // Deleting node 1 cascades over both edges in one submission.
    session.delete_nodes(&[1]).expect("delete");

    let history = session.history();
    assert_eq!(history.len(), 7);
    let last = history.last().expect("entry");
    assert_eq!(last.node_delta, -1);
    assert_eq!(last.edge_delta, -2);
    assert_eq!(last.part_count, 1);

    let node_total: i64 = history.iter().map(|e| e.node_delta).sum();
    let edge_total: i64 = history.iter().map(|e| e.edge_delta).sum();
    assert_eq!(node_total, session.node_count().expect("nodes") as i64);
    assert_eq!(edge_total, session.edge_count().expect("edges") as i64);
}

#[test]
fn multi_commit_changes_submit_their_cumulative_effect() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let main = db.session("g").expect("main");
    main.create_node(&["Seed"], &[]).expect("node 0");

    let mut session = db.session("g").expect("session");
    session.new_change();
    session.create_node(&["First"], &[]).expect("first");
    session.commit().expect("first commit");
    // A later commit with nothing new to seal is a no-op.
    assert!(session.commit().expect("idempotent commit").is_none());
    session.submit().expect("accepted");

    let history = main.history();
    let last = history.last().expect("entry");
    assert_eq!(last.node_delta, 1);
    assert_eq!(last.part_count, 1);
    assert_eq!(main.node_count().expect("count"), 2);
}

#[test]
fn cascades_within_one_submission_net_out() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let main = db.session("g").expect("main");
    for _ in 0..2 {
        main.create_node(&[], &[]).expect("seed");
    }

    // One change creates an edge onto node 1 and then deletes node 1; the
    // cascade tombstones the just-created edge inside the same submission.
    let mut session = db.session("g").expect("session");
    session.new_change();
    session.create_edge("E", 0, 1, &[]).expect("edge");
    session.delete_nodes(&[1]).expect("delete endpoint");
    session.commit().expect("commit");
    session.submit().expect("accepted");

    assert_eq!(main.node_count().expect("nodes"), 1);
    assert_eq!(main.edge_count().expect("edges"), 0);
    let last = main.history().last().cloned().expect("entry");
    assert_eq!(last.node_delta, -1);
    assert_eq!(last.edge_delta, 0);
}
