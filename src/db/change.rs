//! Change lifecycle: isolated units of mutation forked from main.
//!
//! A change captures main's head position at fork time and accumulates an
//! ordered mutation log plus a local overlay used to answer reads in its
//! context. New entities receive provisional identifiers drawn from a
//! change-local counter that starts at main's fork-time watermark, so they
//! are disjoint from everything visible at fork and are translated into
//! main's global space only when the change is submitted.
//!
//! The lifecycle is an explicit state machine:
//! `Open -> Committed -> { Submitted | Rejected }`, where the last two are
//! terminal. A rejected change retains the diagnostic that rejected it and
//! can never be resubmitted; the caller forks a new change instead.

use crate::db::commit::Commit;
use crate::db::entities::EntityStore;
use crate::db::mutation::{Mutation, MutationLog};
use crate::error::{GraphError, Result};
use crate::model::{ChangeId, CommitHash, EdgeId, NodeId, PropertyValue};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Lifecycle state of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    /// Accepting mutations.
    Open,
    /// Pending mutations sealed into commits; eligible for submission.
    Committed,
    /// Accepted onto main. Terminal.
    Submitted,
    /// Rejected by conflict detection. Terminal; holds the diagnostic.
    Rejected,
}

/// A node created locally within a change, keyed by its provisional id.
#[derive(Debug, Clone)]
pub(crate) struct PendingNode {
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// An edge created locally within a change, keyed by its provisional id.
#[derive(Debug, Clone)]
pub(crate) struct PendingEdge {
    pub type_name: String,
    pub source: NodeId,
    pub target: NodeId,
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug)]
pub(crate) struct Change {
    id: ChangeId,
    state: ChangeState,
    /// Main head position at fork time.
    base_head: u64,
    /// Fork-time watermarks: identifiers at or above these are provisional.
    fork_next_node: NodeId,
    fork_next_edge: EdgeId,
    /// Change-local provisional counters, starting at the watermarks.
    next_node: NodeId,
    next_edge: EdgeId,
    pending: MutationLog,
    commits: Vec<Commit>,
    /// Local overlay answering reads in this change's context.
    created_nodes: BTreeMap<NodeId, PendingNode>,
    created_edges: BTreeMap<EdgeId, PendingEdge>,
    deleted_nodes: FxHashSet<NodeId>,
    deleted_edges: FxHashSet<EdgeId>,
    rejection: Option<String>,
}

impl Change {
    pub(crate) fn new(
        id: ChangeId,
        base_head: u64,
        fork_next_node: NodeId,
        fork_next_edge: EdgeId,
    ) -> Self {
        Self {
            id,
            state: ChangeState::Open,
            base_head,
            fork_next_node,
            fork_next_edge,
            next_node: fork_next_node,
            next_edge: fork_next_edge,
            pending: MutationLog::default(),
            commits: Vec::new(),
            created_nodes: BTreeMap::new(),
            created_edges: BTreeMap::new(),
            deleted_nodes: FxHashSet::default(),
            deleted_edges: FxHashSet::default(),
            rejection: None,
        }
    }

    pub(crate) fn id(&self) -> ChangeId {
        self.id
    }

    pub(crate) fn state(&self) -> ChangeState {
        self.state
    }

    pub(crate) fn base_head(&self) -> u64 {
        self.base_head
    }

    pub(crate) fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    pub(crate) fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub(crate) fn is_provisional_node(&self, id: NodeId) -> bool {
        id >= self.fork_next_node
    }

    pub(crate) fn is_provisional_edge(&self, id: EdgeId) -> bool {
        id >= self.fork_next_edge
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state != ChangeState::Open {
            return Err(GraphError::InvalidState(format!(
                "Change {} is {:?}; mutations are only valid while Open",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Stages a node creation and returns its provisional identifier.
    pub(crate) fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: BTreeMap<String, PropertyValue>,
    ) -> Result<NodeId> {
        self.ensure_open()?;
        let id = self.next_node;
        self.next_node += 1;
        self.created_nodes.insert(
            id,
            PendingNode {
                labels: labels.clone(),
                properties: properties.clone(),
            },
        );
        self.pending.push(Mutation::CreateNode {
            id,
            labels,
            properties,
        });
        Ok(id)
    }

    /// Stages an edge creation between endpoints that are either visible on
    /// main at the fork point or were created within this change.
    pub(crate) fn create_edge(
        &mut self,
        entities: &EntityStore,
        type_name: String,
        source: NodeId,
        target: NodeId,
        properties: BTreeMap<String, PropertyValue>,
    ) -> Result<EdgeId> {
        self.ensure_open()?;
        self.check_endpoint(entities, source)?;
        self.check_endpoint(entities, target)?;
        let id = self.next_edge;
        self.next_edge += 1;
        self.created_edges.insert(
            id,
            PendingEdge {
                type_name: type_name.clone(),
                source,
                target,
                properties: properties.clone(),
            },
        );
        self.pending.push(Mutation::CreateEdge {
            id,
            type_name,
            source,
            target,
            properties,
        });
        Ok(id)
    }

    fn check_endpoint(&self, entities: &EntityStore, id: NodeId) -> Result<()> {
        if self.is_provisional_node(id) {
            if !self.created_nodes.contains_key(&id) {
                return Err(GraphError::NotFound(format!("Node {id}")));
            }
        } else if !entities.node_visible(id, self.base_head) || self.deleted_nodes.contains(&id) {
            return Err(GraphError::NotFound(format!("Node {id}")));
        }
        Ok(())
    }

    /// Stages node deletions. Deleting a node cascades to every edge
    /// incident to it in this change's view, including edges created
    /// locally.
    pub(crate) fn delete_nodes(&mut self, entities: &EntityStore, ids: &[NodeId]) -> Result<()> {
        self.ensure_open()?;
        for &id in ids {
            if self.is_provisional_node(id) {
                return Err(GraphError::InvalidArgument(format!(
                    "cannot delete Node {id}: it was created in this change"
                )));
            }
            if !entities.node_visible(id, self.base_head) || self.deleted_nodes.contains(&id) {
                return Err(GraphError::NotFound(format!("Node {id}")));
            }
        }
        for &id in ids {
            for eid in entities.visible_incident_edges(id, self.base_head) {
                self.deleted_edges.insert(eid);
            }
            let local_incident: Vec<EdgeId> = self
                .created_edges
                .iter()
                .filter(|(_, e)| e.source == id || e.target == id)
                .map(|(&eid, _)| eid)
                .collect();
            for eid in local_incident {
                self.created_edges.remove(&eid);
            }
            self.deleted_nodes.insert(id);
        }
        self.pending.push(Mutation::DeleteNodes { ids: ids.to_vec() });
        Ok(())
    }

    /// Stages edge deletions.
    pub(crate) fn delete_edges(&mut self, entities: &EntityStore, ids: &[EdgeId]) -> Result<()> {
        self.ensure_open()?;
        for &id in ids {
            if self.is_provisional_edge(id) {
                return Err(GraphError::InvalidArgument(format!(
                    "cannot delete Edge {id}: it was created in this change"
                )));
            }
            if !entities.edge_visible(id, self.base_head) || self.deleted_edges.contains(&id) {
                return Err(GraphError::NotFound(format!("Edge {id}")));
            }
        }
        for &id in ids {
            self.deleted_edges.insert(id);
        }
        self.pending.push(Mutation::DeleteEdges { ids: ids.to_vec() });
        Ok(())
    }

    /// Seals pending mutations into an immutable commit and transitions the
    /// change to `Committed`. Returns the new commit's identifier, or `None`
    /// when there was nothing new to seal (a later `commit` on an already
    /// committed change is a no-op).
    pub(crate) fn commit(&mut self, graph: &str) -> Result<Option<CommitHash>> {
        match self.state {
            ChangeState::Open => {}
            ChangeState::Committed => return Ok(None),
            ChangeState::Submitted | ChangeState::Rejected => {
                return Err(GraphError::InvalidState(format!(
                    "Change {} is {:?} and cannot be committed",
                    self.id, self.state
                )));
            }
        }
        if self.pending.is_empty() && !self.commits.is_empty() {
            self.state = ChangeState::Committed;
            return Ok(None);
        }
        debug!(change = self.id, pending = self.pending.len(), "sealing pending mutations");
        let ops = self.pending.drain();
        let commit = Commit::seal(graph, self.id, self.commits.len(), ops);
        let hash = commit.hash;
        debug!(
            change = self.id,
            commit = hash,
            ops = commit.ops.len(),
            "sealed local commit"
        );
        self.commits.push(commit);
        self.state = ChangeState::Committed;
        Ok(Some(hash))
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.state = ChangeState::Submitted;
    }

    pub(crate) fn mark_rejected(&mut self, reason: String) {
        self.state = ChangeState::Rejected;
        self.rejection = Some(reason);
    }

    // Overlay accessors used to answer reads in this change's context.

    pub(crate) fn local_node(&self, id: NodeId) -> Option<&PendingNode> {
        self.created_nodes.get(&id)
    }

    pub(crate) fn local_edge(&self, id: EdgeId) -> Option<&PendingEdge> {
        self.created_edges.get(&id)
    }

    pub(crate) fn deletes_node(&self, id: NodeId) -> bool {
        self.deleted_nodes.contains(&id)
    }

    pub(crate) fn deletes_edge(&self, id: EdgeId) -> bool {
        self.deleted_edges.contains(&id)
    }

    pub(crate) fn created_node_count(&self) -> usize {
        self.created_nodes.len()
    }

    pub(crate) fn created_edge_count(&self) -> usize {
        self.created_edges.len()
    }

    pub(crate) fn deleted_node_count(&self) -> usize {
        self.deleted_nodes.len()
    }

    pub(crate) fn deleted_edge_count(&self) -> usize {
        self.deleted_edges.len()
    }
}

/// Creates and tracks the open changes of one graph.
///
/// Each change sits behind its own mutex inside a concurrent map, so any
/// number of changes can be mutated and committed concurrently without
/// blocking each other or reads of main; only submission contends, on the
/// graph's exclusive write section.
#[derive(Debug, Default)]
pub(crate) struct ChangeManager {
    changes: DashMap<ChangeId, Mutex<Change>>,
    next_id: AtomicU64,
}

impl ChangeManager {
    /// Allocates a change id without registering a change; used for the
    /// ephemeral autocommit changes that back direct mutations of main.
    pub(crate) fn allocate_id(&self) -> ChangeId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn create(
        &self,
        base_head: u64,
        fork_next_node: NodeId,
        fork_next_edge: EdgeId,
    ) -> ChangeId {
        let id = self.allocate_id();
        self.changes
            .insert(id, Mutex::new(Change::new(id, base_head, fork_next_node, fork_next_edge)));
        debug!(
            change = id,
            base_head, fork_next_node, fork_next_edge, "change created"
        );
        id
    }

    pub(crate) fn contains(&self, id: ChangeId) -> bool {
        self.changes.contains_key(&id)
    }

    /// Runs `f` with exclusive access to the change, or `NotFound`.
    pub(crate) fn with<R>(
        &self,
        id: ChangeId,
        f: impl FnOnce(&mut Change) -> Result<R>,
    ) -> Result<R> {
        let entry = self
            .changes
            .get(&id)
            .ok_or_else(|| GraphError::NotFound(format!("Change {id}")))?;
        let mut change = entry.lock();
        f(&mut change)
    }

    pub(crate) fn list(&self) -> Vec<(ChangeId, ChangeState)> {
        let mut out: Vec<(ChangeId, ChangeState)> = self
            .changes
            .iter()
            .map(|entry| (*entry.key(), entry.lock().state()))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    /// Discards a change. Discarding never touches main, regardless of how
    /// much work the change had staged.
    pub(crate) fn remove(&self, id: ChangeId) -> Result<()> {
        self.changes
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GraphError::NotFound(format!("Change {id}")))?;
        debug!(change = id, "change discarded");
        Ok(())
    }
}
