//! A named graph: one versioned main line plus its open changes.
//!
//! Main's entity store, schema registry, and history ledger live together
//! behind a single reader-writer lock with a narrow surface: reads take the
//! shared side and observe a stable snapshot, while the submission critical
//! section takes the exclusive side. Open changes are independent sandboxes
//! managed by the [`ChangeManager`]; they never touch the locked state until
//! they are submitted.

use crate::db::change::{Change, ChangeManager, ChangeState};
use crate::db::config::Config;
use crate::db::entities::EntityStore;
use crate::db::history::HistoryEntry;
use crate::db::schema::SchemaRegistry;
use crate::db::submit;
use crate::error::Result;
use crate::model::{
    ChangeId, CommitHash, Edge, EdgeId, EdgeTypeId, LabelId, Node, NodeId, PropertyTypeId,
    PropertyValue, ValueType,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// The context a session routes its operations to: main's head snapshot or
/// a specific open change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Main,
    Change(ChangeId),
}

/// Main's versioned state. Only the submission coordinator mutates it, and
/// only under the graph's exclusive write section.
#[derive(Debug)]
pub(crate) struct GraphInner {
    pub(crate) entities: EntityStore,
    pub(crate) schema: SchemaRegistry,
    pub(crate) history: crate::db::history::HistoryStore,
}

/// A named property graph with versioned main history and isolated changes.
#[derive(Debug)]
pub struct Graph {
    name: String,
    inner: RwLock<GraphInner>,
    changes: ChangeManager,
}

impl Graph {
    pub(crate) fn new(name: &str, config: &Config) -> Self {
        Self {
            name: name.to_string(),
            inner: RwLock::new(GraphInner {
                entities: EntityStore::default(),
                schema: SchemaRegistry::new(config),
                history: crate::db::history::HistoryStore::default(),
            }),
            changes: ChangeManager::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current main head position: the number of accepted submissions.
    pub fn head_position(&self) -> u64 {
        self.inner.read().history.head_position()
    }

    // Change lifecycle -----------------------------------------------------

    /// Forks a new change from main's current head.
    pub fn new_change(&self) -> ChangeId {
        // Snapshot the fork point before touching the change map; every
        // other path locks the map first and the inner state second.
        let (head, next_node, next_edge) = {
            let inner = self.inner.read();
            (
                inner.history.head_position(),
                inner.entities.next_node_id(),
                inner.entities.next_edge_id(),
            )
        };
        self.changes.create(head, next_node, next_edge)
    }

    pub fn has_change(&self, id: ChangeId) -> bool {
        self.changes.contains(id)
    }

    pub fn change_state(&self, id: ChangeId) -> Result<ChangeState> {
        self.changes.with(id, |c| Ok(c.state()))
    }

    /// The diagnostic that rejected a change, if it has been rejected.
    pub fn rejection(&self, id: ChangeId) -> Result<Option<String>> {
        self.changes.with(id, |c| Ok(c.rejection().map(str::to_string)))
    }

    pub fn list_changes(&self) -> Vec<(ChangeId, ChangeState)> {
        self.changes.list()
    }

    /// Discards a change without submitting it. Has no effect on main.
    pub fn delete_change(&self, id: ChangeId) -> Result<()> {
        self.changes.remove(id)
    }

    /// Seals the change's pending mutations into an immutable local commit.
    pub fn commit(&self, id: ChangeId) -> Result<Option<CommitHash>> {
        self.changes.with(id, |c| c.commit(&self.name))
    }

    /// Attempts to merge a committed change onto main. First-submit-wins:
    /// on conflict the change transitions to `Rejected` and cannot be
    /// retried.
    pub fn submit(&self, id: ChangeId) -> Result<CommitHash> {
        self.changes.with(id, |c| {
            let mut inner = self.inner.write();
            submit::submit_change(&self.name, &mut inner, c)
        })
    }

    // Mutation -------------------------------------------------------------

    /// Creates a node in the given context. In a change this stages the
    /// creation and returns a provisional identifier; on main it is applied
    /// as a single-mutation submission and returns the final identifier.
    pub fn create_node(
        &self,
        ctx: Context,
        labels: &[&str],
        properties: &[(&str, PropertyValue)],
    ) -> Result<NodeId> {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let properties = to_bag(properties);
        match ctx {
            Context::Change(id) => self
                .changes
                .with(id, |c| c.create_node(labels, properties)),
            Context::Main => self
                .autocommit(|c, _| c.create_node(labels, properties))
                .map(|(id, _)| id),
        }
    }

    pub fn create_edge(
        &self,
        ctx: Context,
        type_name: &str,
        source: NodeId,
        target: NodeId,
        properties: &[(&str, PropertyValue)],
    ) -> Result<EdgeId> {
        let type_name = type_name.to_string();
        let properties = to_bag(properties);
        match ctx {
            Context::Change(id) => self.changes.with(id, |c| {
                let inner = self.inner.read();
                c.create_edge(&inner.entities, type_name, source, target, properties)
            }),
            Context::Main => self
                .autocommit(|c, entities| {
                    c.create_edge(entities, type_name, source, target, properties)
                })
                .map(|(id, _)| id),
        }
    }

    pub fn delete_nodes(&self, ctx: Context, ids: &[NodeId]) -> Result<()> {
        match ctx {
            Context::Change(id) => self.changes.with(id, |c| {
                let inner = self.inner.read();
                c.delete_nodes(&inner.entities, ids)
            }),
            Context::Main => self
                .autocommit(|c, entities| c.delete_nodes(entities, ids))
                .map(|_| ()),
        }
    }

    pub fn delete_edges(&self, ctx: Context, ids: &[EdgeId]) -> Result<()> {
        match ctx {
            Context::Change(id) => self.changes.with(id, |c| {
                let inner = self.inner.read();
                c.delete_edges(&inner.entities, ids)
            }),
            Context::Main => self
                .autocommit(|c, entities| c.delete_edges(entities, ids))
                .map(|_| ()),
        }
    }

    /// Runs a mutation against main as an ephemeral single-commit change
    /// submitted under the exclusive section. The change forks at the
    /// current head, so its submission can never conflict, and provisional
    /// identifiers equal the final main identifiers.
    fn autocommit<R>(
        &self,
        f: impl FnOnce(&mut Change, &EntityStore) -> Result<R>,
    ) -> Result<(R, CommitHash)> {
        let mut inner = self.inner.write();
        let mut change = Change::new(
            self.changes.allocate_id(),
            inner.history.head_position(),
            inner.entities.next_node_id(),
            inner.entities.next_edge_id(),
        );
        let out = f(&mut change, &inner.entities)?;
        change.commit(&self.name)?;
        let hash = submit::submit_change(&self.name, &mut inner, &mut change)?;
        Ok((out, hash))
    }

    // Reads ----------------------------------------------------------------

    pub fn get_node(&self, ctx: Context, id: NodeId) -> Result<Option<Node>> {
        match ctx {
            Context::Main => {
                let inner = self.inner.read();
                let head = inner.history.head_position();
                Ok(materialize_node(&inner, id, head))
            }
            Context::Change(cid) => self.changes.with(cid, |c| {
                if c.is_provisional_node(id) {
                    return Ok(c.local_node(id).map(|pending| Node {
                        id,
                        labels: pending.labels.clone(),
                        properties: pending.properties.clone(),
                    }));
                }
                if c.deletes_node(id) {
                    return Ok(None);
                }
                let inner = self.inner.read();
                Ok(materialize_node(&inner, id, c.base_head()))
            }),
        }
    }

    pub fn get_edge(&self, ctx: Context, id: EdgeId) -> Result<Option<Edge>> {
        match ctx {
            Context::Main => {
                let inner = self.inner.read();
                let head = inner.history.head_position();
                Ok(materialize_edge(&inner, id, head))
            }
            Context::Change(cid) => self.changes.with(cid, |c| {
                if c.is_provisional_edge(id) {
                    return Ok(c.local_edge(id).map(|pending| Edge {
                        id,
                        type_name: pending.type_name.clone(),
                        source: pending.source,
                        target: pending.target,
                        properties: pending.properties.clone(),
                    }));
                }
                if c.deletes_edge(id) {
                    return Ok(None);
                }
                let inner = self.inner.read();
                Ok(materialize_edge(&inner, id, c.base_head()))
            }),
        }
    }

    pub fn node_count(&self, ctx: Context) -> Result<usize> {
        match ctx {
            Context::Main => {
                let inner = self.inner.read();
                let head = inner.history.head_position();
                Ok(inner.entities.node_count_at(head))
            }
            Context::Change(cid) => self.changes.with(cid, |c| {
                let inner = self.inner.read();
                let base = inner.entities.node_count_at(c.base_head());
                Ok(base + c.created_node_count() - c.deleted_node_count())
            }),
        }
    }

    pub fn edge_count(&self, ctx: Context) -> Result<usize> {
        match ctx {
            Context::Main => {
                let inner = self.inner.read();
                let head = inner.history.head_position();
                Ok(inner.entities.edge_count_at(head))
            }
            Context::Change(cid) => self.changes.with(cid, |c| {
                let inner = self.inner.read();
                let base = inner.entities.edge_count_at(c.base_head());
                Ok(base + c.created_edge_count() - c.deleted_edge_count())
            }),
        }
    }

    // Metadata -------------------------------------------------------------

    pub fn labels(&self) -> Vec<(LabelId, String)> {
        self.inner.read().schema.labels()
    }

    pub fn edge_types(&self) -> Vec<(EdgeTypeId, String)> {
        self.inner.read().schema.edge_types()
    }

    pub fn property_types(&self) -> Vec<(PropertyTypeId, String, ValueType)> {
        self.inner.read().schema.property_types()
    }

    /// Ordered history of accepted submissions, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.read().history.read().cloned().collect()
    }
}

fn to_bag(properties: &[(&str, PropertyValue)]) -> BTreeMap<String, PropertyValue> {
    properties
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn materialize_node(inner: &GraphInner, id: NodeId, pos: u64) -> Option<Node> {
    let stored = inner.entities.get_node(id, pos)?;
    let labels = stored
        .labels
        .iter()
        .filter_map(|&l| inner.schema.label_name(l).map(str::to_string))
        .collect();
    let properties = stored
        .properties
        .iter()
        .filter_map(|(&pid, value)| {
            inner
                .schema
                .property_type_name(pid)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect();
    Some(Node { id, labels, properties })
}

fn materialize_edge(inner: &GraphInner, id: EdgeId, pos: u64) -> Option<Edge> {
    let stored = inner.entities.get_edge(id, pos)?;
    let type_name = inner
        .schema
        .edge_type_name(stored.edge_type)
        .unwrap_or_default()
        .to_string();
    let properties = stored
        .properties
        .iter()
        .filter_map(|(&pid, value)| {
            inner
                .schema
                .property_type_name(pid)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect();
    Some(Edge {
        id,
        type_name,
        source: stored.source,
        target: stored.target,
        properties,
    })
}
