//! graft: a versioned property-graph store.
//!
//! Concurrent clients open independent, isolated units of mutation
//! ("changes"), edit them locally, seal their mutations into commits, and
//! attempt to merge them onto a single shared "main" line of history. The
//! submission protocol is first-submit-wins: a submission is checked for
//! conflicts against everything accepted on main since the change was
//! forked, accepted mutations are rebased into main's global identifier
//! space, and rejected submissions leave the change in a terminal
//! `Rejected` state carrying the triggering diagnostic.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;

pub use db::{
    ChangeState, Config, Context, Database, Graph, HistoryEntry, Session,
};
pub use error::{GraphError, Result};
pub use logging::init_logging;
pub use model::{
    ChangeId, CommitHash, Edge, EdgeId, EdgeTypeId, LabelId, Node, NodeId, PropertyTypeId,
    PropertyValue, ValueType,
};
