//! Conflict-detection scenarios for the submission protocol.

use graft::{ChangeState, Database, GraphError, Session};

/// Ten nodes and two edges; edge 1 connects node 8 to node 9.
fn seed_graph(db: &Database) -> Session {
    db.create_graph("g").expect("create graph");
    let session = db.session("g").expect("session");
    for i in 0..10 {
        let id = session.create_node(&["Person"], &[]).expect("seed node");
        assert_eq!(id, i);
    }
    let e0 = session.create_edge("KNOWS", 0, 1, &[]).expect("edge 0");
    let e1 = session.create_edge("KNOWS", 8, 9, &[]).expect("edge 1");
    assert_eq!((e0, e1), (0, 1));
    session
}

#[test]
fn delete_delete_conflicts_cite_the_modified_entity() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");
    let mut c = db.session("g").expect("c");

    let change_a = a.new_change();
    let change_b = b.new_change();
    let change_c = c.new_change();

    // A deletes node 9, cascading a tombstone onto edge 1, and wins.
    a.delete_nodes(&[9]).expect("a deletes node 9");
    a.commit().expect("a commit");
    a.submit().expect("a submit accepted");
    assert_eq!(a.change_state(change_a).expect("state"), ChangeState::Submitted);

    // B, forked before A submitted, deletes the same node.
    b.delete_nodes(&[9]).expect("b deletes node 9");
    b.commit().expect("b commit");
    let err = b.submit().expect_err("b must be rejected");
    assert_eq!(
        err.to_string(),
        "This change attempted to delete Node 9 (which is now Node 9 on main) \
         which has been modified on main."
    );
    assert!(matches!(err, GraphError::Conflict(_)));
    assert_eq!(b.change_state(change_b).expect("state"), ChangeState::Rejected);

    // C, also forked before A, deletes the edge A's cascade tombstoned.
    c.delete_edges(&[1]).expect("c deletes edge 1");
    c.commit().expect("c commit");
    let err = c.submit().expect_err("c must be rejected");
    assert_eq!(
        err.to_string(),
        "This change attempted to delete Edge 1 (which is now Edge 1 on main) \
         which has been modified on main."
    );
    assert_eq!(c.change_state(change_c).expect("state"), ChangeState::Rejected);

    // The rejection diagnostic stays inspectable on the change.
    let reason = c.rejection(change_c).expect("rejection").expect("present");
    assert!(reason.contains("Edge 1"));
}

#[test]
fn create_after_delete_is_rejected() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");

    // A stages an edge between nodes 3 and 4 but does not submit yet.
    a.new_change();
    a.create_edge("KNOWS", 3, 4, &[]).expect("a stages edge");

    // B deletes node 3 and wins.
    b.new_change();
    b.delete_nodes(&[3]).expect("b deletes node 3");
    b.commit().expect("b commit");
    b.submit().expect("b submit accepted");

    a.commit().expect("a commit");
    let err = a.submit().expect_err("a must be rejected");
    assert_eq!(
        err.to_string(),
        "This change attempted to create an edge with source Node 3 (which is now \
         Node 3 on main) which has been modified on main."
    );
}

#[test]
fn create_after_delete_reports_target_endpoint() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");

    a.new_change();
    a.create_edge("KNOWS", 3, 4, &[]).expect("a stages edge");

    b.new_change();
    b.delete_nodes(&[4]).expect("b deletes node 4");
    b.commit().expect("b commit");
    b.submit().expect("b submit accepted");

    a.commit().expect("a commit");
    let err = a.submit().expect_err("a must be rejected");
    assert_eq!(
        err.to_string(),
        "This change attempted to create an edge with target Node 4 (which is now \
         Node 4 on main) which has been modified on main."
    );
}

#[test]
fn delete_after_create_is_rejected_citing_the_new_edge() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");

    // B forks before A creates its edge.
    b.new_change();

    // A creates an edge incident to node 2 and wins.
    a.new_change();
    a.create_edge("KNOWS", 1, 2, &[]).expect("a creates edge");
    a.commit().expect("a commit");
    a.submit().expect("a submit accepted");

    // The new edge got the next main edge id.
    let new_edge = 2;

    b.delete_nodes(&[2]).expect("b deletes node 2");
    b.commit().expect("b commit");
    let err = b.submit().expect_err("b must be rejected");
    assert_eq!(
        err.to_string(),
        format!(
            "Submit rejected: Commits on main have created an edge (ID: {new_edge}) \
             incident to Node 2, which this Change attempts to delete."
        )
    );
}

#[test]
fn first_submit_wins_in_either_order() {
    for flip in [false, true] {
        let db = Database::new();
        seed_graph(&db);

        let mut a = db.session("g").expect("a");
        let mut b = db.session("g").expect("b");
        let change_a = a.new_change();
        let change_b = b.new_change();

        a.delete_nodes(&[5]).expect("a deletes");
        b.delete_nodes(&[5]).expect("b deletes");
        a.commit().expect("a commit");
        b.commit().expect("b commit");

        let (first, second) = if flip { (&mut b, &mut a) } else { (&mut a, &mut b) };
        first.submit().expect("first submission accepted");
        second.submit().expect_err("second submission rejected");

        let state_a = a.change_state(change_a).expect("a state");
        let state_b = b.change_state(change_b).expect("b state");
        let mut states = [state_a, state_b];
        states.sort_by_key(|s| format!("{s:?}"));
        assert_eq!(states, [ChangeState::Rejected, ChangeState::Submitted]);

        // Exactly one tombstone ever landed on main.
        let deleted: i64 = db
            .load_graph("g")
            .expect("graph")
            .history()
            .iter()
            .map(|e| e.node_delta)
            .sum();
        assert_eq!(deleted, 10 - 1);
    }
}

#[test]
fn rejected_change_cannot_be_resubmitted() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");

    a.new_change();
    b.new_change();
    a.delete_nodes(&[7]).expect("a deletes");
    b.delete_nodes(&[7]).expect("b deletes");
    a.commit().expect("a commit");
    b.commit().expect("b commit");
    a.submit().expect("a accepted");
    b.submit().expect_err("b rejected");

    let err = b.submit().expect_err("resubmission is invalid");
    assert!(matches!(err, GraphError::InvalidState(_)));

    // The caller recovers by forking a fresh change against the new head.
    let mut retry = db.session("g").expect("retry");
    retry.new_change();
    retry.delete_nodes(&[6]).expect("retry deletes another node");
    retry.commit().expect("retry commit");
    retry.submit().expect("retry accepted");
}

#[test]
fn rejected_change_refuses_further_work() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");
    a.new_change();
    b.new_change();
    a.delete_nodes(&[3]).expect("a deletes");
    b.delete_nodes(&[3]).expect("b deletes");
    a.commit().expect("a commit");
    b.commit().expect("b commit");
    a.submit().expect("a accepted");
    b.submit().expect_err("b rejected");

    // Rejected is terminal: the change accepts no further mutations and
    // cannot be committed again.
    let err = b.create_node(&["Person"], &[]).expect_err("mutate rejected change");
    assert!(matches!(err, GraphError::InvalidState(_)));
    let err = b.delete_nodes(&[4]).expect_err("delete via rejected change");
    assert!(matches!(err, GraphError::InvalidState(_)));
    let err = b.commit().expect_err("recommit rejected change");
    assert!(matches!(err, GraphError::InvalidState(_)));
}

#[test]
fn unrelated_changes_merge_in_any_order() {
    let db = Database::new();
    seed_graph(&db);

    let mut a = db.session("g").expect("a");
    let mut b = db.session("g").expect("b");
    a.new_change();
    b.new_change();

    a.create_node(&["TeamA"], &[]).expect("a node");
    b.create_node(&["TeamB"], &[]).expect("b node");
    a.commit().expect("a commit");
    b.commit().expect("b commit");

    b.submit().expect("b accepted");
    a.submit().expect("a accepted too");

    let main = db.session("g").expect("main");
    assert_eq!(main.node_count().expect("count"), 12);
}
