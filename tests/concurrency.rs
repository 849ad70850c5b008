//! Concurrent submission behavior across threads.

use graft::{ChangeState, Database, GraphError};
use rand::Rng;
use std::thread;
use std::time::Duration;

#[test]
fn exactly_one_contending_deleter_wins() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");
    let seed = db.session("g").expect("seed session");
    for _ in 0..4 {
        seed.create_node(&["Target"], &[]).expect("seed node");
    }

    // Stage every contender against the same head before any submission
    // races; only the submissions themselves run concurrently.
    const CONTENDERS: usize = 8;
    let mut contenders = Vec::new();
    for _ in 0..CONTENDERS {
        let mut session = db.session("g").expect("session");
        session.new_change();
        session.delete_nodes(&[2]).expect("stage delete");
        session.commit().expect("commit");
        contenders.push(session);
    }

    let outcomes: Vec<Result<(), GraphError>> = thread::scope(|scope| {
        let handles: Vec<_> = contenders
            .into_iter()
            .map(|mut session| {
                scope.spawn(move || {
                    let jitter = rand::thread_rng().gen_range(0..3);
                    thread::sleep(Duration::from_millis(jitter));
                    session.submit().map(|_| ())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert!(matches!(err, GraphError::Conflict(_)), "unexpected: {err}");
        }
    }

    let main = db.session("g").expect("main");
    assert_eq!(main.node_count().expect("count"), 3);
    assert!(main.get_node(2).expect("get").is_none());

    // Every losing change ended Rejected, the winner Submitted.
    let states = main.list_changes();
    let submitted = states
        .iter()
        .filter(|(_, s)| *s == ChangeState::Submitted)
        .count();
    let rejected = states
        .iter()
        .filter(|(_, s)| *s == ChangeState::Rejected)
        .count();
    assert_eq!(submitted, 1);
    assert_eq!(rejected, CONTENDERS - 1);
}

#[test]
fn independent_concurrent_changes_all_land() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");

    const WRITERS: usize = 6;
    thread::scope(|scope| {
        for i in 0..WRITERS {
            let db = &db;
            scope.spawn(move || {
                let mut session = db.session("g").expect("session");
                session.new_change();
                let label = format!("Writer{i}");
                session.create_node(&[label.as_str()], &[]).expect("node");
                session.commit().expect("commit");
                session.submit().expect("independent changes never conflict");
            });
        }
    });

    let main = db.session("g").expect("main");
    assert_eq!(main.node_count().expect("count"), WRITERS);
    assert_eq!(main.history().len(), WRITERS);
    assert_eq!(main.labels().len(), WRITERS);
}

#[test]
fn concurrent_main_writes_are_serialized() {
    let db = Database::new();
    db.create_graph("g").expect("create graph");

    const WRITERS: usize = 4;
    const PER_WRITER: usize = 25;
    thread::scope(|scope| {
        for _ in 0..WRITERS {
            let db = &db;
            scope.spawn(move || {
                let session = db.session("g").expect("session");
                for _ in 0..PER_WRITER {
                    session.create_node(&["N"], &[]).expect("node");
                }
            });
        }
    });

    let main = db.session("g").expect("main");
    let total = WRITERS * PER_WRITER;
    assert_eq!(main.node_count().expect("count"), total);
    // Dense ids: every id below the total resolves, none above it.
    assert!(main.get_node((total - 1) as u64).expect("get").is_some());
    assert!(main.get_node(total as u64).expect("get").is_none());
}
