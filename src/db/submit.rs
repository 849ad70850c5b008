//! Submission coordination: merging a committed change onto main.
//!
//! A submission runs entirely inside the graph's exclusive write section:
//!
//! 1. the main delta is computed from the history journals accepted after
//!    the change's fork point,
//! 2. the change's mutations are checked against that delta in order, and
//!    the first conflict rejects the change terminally,
//! 3. provisional identifiers are rebased into main's global space through
//!    a translation table that continues main's counters,
//! 4. the rebased mutations are applied to the entity store and one history
//!    entry is appended, advancing HEAD.
//!
//! Conflicts are resolved strictly by submission order: whichever change
//! reaches the apply step first wins, regardless of fork or commit order.

use crate::db::change::{Change, ChangeState};
use crate::db::entities::{LabelSet, PropertyBag};
use crate::db::graph::GraphInner;
use crate::db::history::{HistoryEntry, HistoryStore, SubmissionJournal};
use crate::db::mutation::Mutation;
use crate::error::{GraphError, Result};
use crate::model::{CommitHash, EdgeId, EdgeTypeId, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

/// Everything that changed on main since a change's fork point.
struct MainDelta {
    tombstoned_nodes: FxHashSet<NodeId>,
    tombstoned_edges: FxHashSet<EdgeId>,
    new_edges: Vec<(EdgeId, NodeId, NodeId)>,
}

impl MainDelta {
    fn collect(history: &HistoryStore, base_head: u64) -> Self {
        let mut delta = Self {
            tombstoned_nodes: FxHashSet::default(),
            tombstoned_edges: FxHashSet::default(),
            new_edges: Vec::new(),
        };
        for entry in history.entries_since(base_head) {
            delta.tombstoned_nodes.extend(entry.journal.deleted_nodes.iter().copied());
            delta.tombstoned_edges.extend(entry.journal.deleted_edges.iter().copied());
            delta.new_edges.extend(entry.journal.created_edges.iter().copied());
        }
        delta
    }

    fn new_edge_incident_to(&self, node: NodeId) -> Option<EdgeId> {
        self.new_edges
            .iter()
            .find(|&&(_, src, tgt)| src == node || tgt == node)
            .map(|&(eid, _, _)| eid)
    }
}

/// Rebased mutation, ready to apply to the entity store.
enum ApplyOp {
    AddNode {
        id: NodeId,
        labels: LabelSet,
        properties: PropertyBag,
    },
    AddEdge {
        id: EdgeId,
        edge_type: EdgeTypeId,
        source: NodeId,
        target: NodeId,
        properties: PropertyBag,
    },
    RemoveNodes {
        ids: Vec<NodeId>,
    },
    RemoveEdges {
        ids: Vec<EdgeId>,
    },
}

/// Attempts to merge a committed change onto main. Must be called with
/// exclusive access to the graph's versioned state.
pub(crate) fn submit_change(
    graph: &str,
    inner: &mut GraphInner,
    change: &mut Change,
) -> Result<CommitHash> {
    if change.state() != ChangeState::Committed {
        return Err(GraphError::InvalidState(format!(
            "Change {} is {:?}; only a Committed change can be submitted",
            change.id(),
            change.state()
        )));
    }
    let tip = change
        .commits()
        .last()
        .map(|c| c.hash)
        .ok_or_else(|| {
            GraphError::InvalidState(format!("Change {} has no sealed commits", change.id()))
        })?;

    let delta = MainDelta::collect(&inner.history, change.base_head());
    if let Some(message) = find_conflict(change, &delta) {
        warn!(graph, change = change.id(), %message, "submission rejected");
        change.mark_rejected(message.clone());
        return Err(GraphError::Conflict(message));
    }

    // Schema names are staged and rebasing happens before the entity store
    // is touched; a capacity failure publishes nothing on main, not even
    // the names resolved before the failing one.
    let ops = resolve(inner, change)?;

    let pos = inner.history.head_position() + 1;
    let mut journal = SubmissionJournal::default();
    for op in ops {
        match op {
            ApplyOp::AddNode { id, labels, properties } => {
                let assigned = inner.entities.add_node(labels, properties, pos);
                debug_assert_eq!(assigned, id);
                journal.created_nodes.push(id);
            }
            ApplyOp::AddEdge { id, edge_type, source, target, properties } => {
                let assigned = inner.entities.add_edge(edge_type, source, target, properties, pos);
                debug_assert_eq!(assigned, id);
                journal.created_edges.push((id, source, target));
            }
            ApplyOp::RemoveNodes { ids } => {
                for id in ids {
                    let cascaded = inner.entities.tombstone_node(id, pos);
                    journal.deleted_nodes.insert(id);
                    journal.deleted_edges.extend(cascaded);
                }
            }
            ApplyOp::RemoveEdges { ids } => {
                for id in ids {
                    inner.entities.tombstone_edge(id, pos);
                    journal.deleted_edges.insert(id);
                }
            }
        }
    }

    let node_delta = journal.created_nodes.len() as i64 - journal.deleted_nodes.len() as i64;
    let edge_delta = journal.created_edges.len() as i64 - journal.deleted_edges.len() as i64;
    let part_count = change.commits().len() as u32;
    inner.history.append(HistoryEntry {
        commit: tip,
        node_delta,
        edge_delta,
        part_count,
        journal,
    });
    change.mark_submitted();
    info!(
        graph,
        change = change.id(),
        commit = tip,
        node_delta,
        edge_delta,
        part_count,
        "change submitted"
    );
    Ok(tip)
}

/// Walks the change's sealed mutations in order and returns the first
/// conflict diagnostic against the main delta, if any.
fn find_conflict(change: &Change, delta: &MainDelta) -> Option<String> {
    for commit in change.commits() {
        for op in &commit.ops {
            match op {
                Mutation::CreateNode { .. } => {}
                Mutation::CreateEdge { source, target, .. } => {
                    // Main identifiers never shift during rebase, so the
                    // pre- and post-rebase ids in the diagnostic coincide.
                    if !change.is_provisional_node(*source)
                        && delta.tombstoned_nodes.contains(source)
                    {
                        return Some(format!(
                            "This change attempted to create an edge with source Node {source} \
                             (which is now Node {source} on main) which has been modified on main."
                        ));
                    }
                    if !change.is_provisional_node(*target)
                        && delta.tombstoned_nodes.contains(target)
                    {
                        return Some(format!(
                            "This change attempted to create an edge with target Node {target} \
                             (which is now Node {target} on main) which has been modified on main."
                        ));
                    }
                }
                Mutation::DeleteNodes { ids } => {
                    for id in ids {
                        if delta.tombstoned_nodes.contains(id) {
                            return Some(format!(
                                "This change attempted to delete Node {id} \
                                 (which is now Node {id} on main) which has been modified on main."
                            ));
                        }
                        if let Some(eid) = delta.new_edge_incident_to(*id) {
                            return Some(format!(
                                "Submit rejected: Commits on main have created an edge \
                                 (ID: {eid}) incident to Node {id}, which this Change attempts \
                                 to delete."
                            ));
                        }
                    }
                }
                Mutation::DeleteEdges { ids } => {
                    for id in ids {
                        if delta.tombstoned_edges.contains(id) {
                            return Some(format!(
                                "This change attempted to delete Edge {id} \
                                 (which is now Edge {id} on main) which has been modified on main."
                            ));
                        }
                    }
                }
            }
        }
    }
    None
}

/// Resolves schema names through a staged batch and translates provisional
/// identifiers into main's global space. The translation table continues
/// main's counters, in the order the entities were created within the
/// change. The batch is published only when the whole pass succeeds.
fn resolve(inner: &mut GraphInner, change: &Change) -> Result<Vec<ApplyOp>> {
    let mut batch = inner.schema.begin_batch();
    let mut node_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut next_node = inner.entities.next_node_id();
    let mut next_edge = inner.entities.next_edge_id();
    let mut out = Vec::new();

    for commit in change.commits() {
        for op in &commit.ops {
            match op {
                Mutation::CreateNode { id, labels, properties } => {
                    let mut label_set = LabelSet::new();
                    for label in labels {
                        label_set.push(inner.schema.resolve_label(&mut batch, label)?);
                    }
                    let mut bag = PropertyBag::new();
                    for (name, value) in properties {
                        let pid = inner.schema.resolve_property_type(
                            &mut batch,
                            name,
                            value.value_type(),
                        )?;
                        bag.insert(pid, value.clone());
                    }
                    let new_id = next_node;
                    next_node += 1;
                    node_map.insert(*id, new_id);
                    out.push(ApplyOp::AddNode {
                        id: new_id,
                        labels: label_set,
                        properties: bag,
                    });
                }
                Mutation::CreateEdge { id: _, type_name, source, target, properties } => {
                    let edge_type = inner.schema.resolve_edge_type(&mut batch, type_name)?;
                    let mut bag = PropertyBag::new();
                    for (name, value) in properties {
                        let pid = inner.schema.resolve_property_type(
                            &mut batch,
                            name,
                            value.value_type(),
                        )?;
                        bag.insert(pid, value.clone());
                    }
                    let source = rebase_node(change, &node_map, *source)?;
                    let target = rebase_node(change, &node_map, *target)?;
                    let new_id = next_edge;
                    next_edge += 1;
                    out.push(ApplyOp::AddEdge {
                        id: new_id,
                        edge_type,
                        source,
                        target,
                        properties: bag,
                    });
                }
                Mutation::DeleteNodes { ids } => {
                    // Deletions always name pre-fork main identifiers.
                    out.push(ApplyOp::RemoveNodes { ids: ids.clone() });
                }
                Mutation::DeleteEdges { ids } => {
                    out.push(ApplyOp::RemoveEdges { ids: ids.clone() });
                }
            }
        }
    }
    inner.schema.apply_batch(batch);
    Ok(out)
}

fn rebase_node(change: &Change, node_map: &FxHashMap<NodeId, NodeId>, id: NodeId) -> Result<NodeId> {
    if change.is_provisional_node(id) {
        node_map
            .get(&id)
            .copied()
            .ok_or_else(|| GraphError::NotFound(format!("Node {id}")))
    } else {
        Ok(id)
    }
}
