//! The authoritative node/edge tables for a graph's main line.
//!
//! Entities are stored append-only: an identifier is the index of its record
//! and is never reused. Deletion writes a tombstone stamped with the history
//! position at which it took effect, so a snapshot at any position can be
//! reconstructed: an entity is visible at position `pos` iff it was created
//! at or before `pos` and not tombstoned at or before `pos`.
//!
//! All mutation here happens either through the submission coordinator's
//! apply step (under the graph's exclusive write section) or never; open
//! changes keep their own working sets and do not touch this store.

use crate::model::{EdgeId, EdgeTypeId, LabelId, NodeId, PropertyTypeId, PropertyValue};
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub(crate) type LabelSet = SmallVec<[LabelId; 4]>;
pub(crate) type PropertyBag = BTreeMap<PropertyTypeId, PropertyValue>;

#[derive(Debug, Clone)]
pub(crate) struct StoredNode {
    pub labels: LabelSet,
    pub properties: PropertyBag,
    pub created_pos: u64,
    pub deleted_pos: Option<u64>,
    out_edges: Vec<EdgeId>,
    in_edges: Vec<EdgeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredEdge {
    pub edge_type: EdgeTypeId,
    pub source: NodeId,
    pub target: NodeId,
    pub properties: PropertyBag,
    pub created_pos: u64,
    pub deleted_pos: Option<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct EntityStore {
    nodes: Vec<StoredNode>,
    edges: Vec<StoredEdge>,
}

impl EntityStore {
    /// Next node identifier main would allocate. Also the provisional-space
    /// watermark captured by a change at fork time.
    pub(crate) fn next_node_id(&self) -> NodeId {
        self.nodes.len() as NodeId
    }

    pub(crate) fn next_edge_id(&self) -> EdgeId {
        self.edges.len() as EdgeId
    }

    pub(crate) fn add_node(&mut self, labels: LabelSet, properties: PropertyBag, pos: u64) -> NodeId {
        let id = self.next_node_id();
        self.nodes.push(StoredNode {
            labels,
            properties,
            created_pos: pos,
            deleted_pos: None,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        });
        id
    }

    pub(crate) fn add_edge(
        &mut self,
        edge_type: EdgeTypeId,
        source: NodeId,
        target: NodeId,
        properties: PropertyBag,
        pos: u64,
    ) -> EdgeId {
        let id = self.next_edge_id();
        self.edges.push(StoredEdge {
            edge_type,
            source,
            target,
            properties,
            created_pos: pos,
            deleted_pos: None,
        });
        if let Some(node) = self.nodes.get_mut(source as usize) {
            node.out_edges.push(id);
        }
        if let Some(node) = self.nodes.get_mut(target as usize) {
            node.in_edges.push(id);
        }
        id
    }

    pub(crate) fn node_visible(&self, id: NodeId, pos: u64) -> bool {
        self.nodes
            .get(id as usize)
            .is_some_and(|n| n.created_pos <= pos && n.deleted_pos.map_or(true, |d| d > pos))
    }

    pub(crate) fn edge_visible(&self, id: EdgeId, pos: u64) -> bool {
        self.edges
            .get(id as usize)
            .is_some_and(|e| e.created_pos <= pos && e.deleted_pos.map_or(true, |d| d > pos))
    }

    pub(crate) fn get_node(&self, id: NodeId, pos: u64) -> Option<&StoredNode> {
        if self.node_visible(id, pos) {
            self.nodes.get(id as usize)
        } else {
            None
        }
    }

    pub(crate) fn get_edge(&self, id: EdgeId, pos: u64) -> Option<&StoredEdge> {
        if self.edge_visible(id, pos) {
            self.edges.get(id as usize)
        } else {
            None
        }
    }

    /// Edges incident to `id` that are visible at `pos`, outgoing and
    /// incoming. This is the closure a node deletion cascades over.
    pub(crate) fn visible_incident_edges(&self, id: NodeId, pos: u64) -> Vec<EdgeId> {
        let Some(node) = self.nodes.get(id as usize) else {
            return Vec::new();
        };
        let mut incident: Vec<EdgeId> = node
            .out_edges
            .iter()
            .chain(node.in_edges.iter())
            .copied()
            .filter(|&eid| self.edge_visible(eid, pos))
            .collect();
        incident.sort_unstable();
        incident.dedup();
        incident
    }

    /// Tombstones a node as of `pos`, cascading to every incident edge still
    /// alive at `pos`. Returns the edge identifiers tombstoned by the
    /// cascade, in ascending order.
    pub(crate) fn tombstone_node(&mut self, id: NodeId, pos: u64) -> Vec<EdgeId> {
        // Computed at `pos` so edges created earlier in the same apply pass
        // are part of the closure.
        let incident = self.visible_incident_edges(id, pos);
        for &eid in &incident {
            if let Some(edge) = self.edges.get_mut(eid as usize) {
                if edge.deleted_pos.is_none() {
                    edge.deleted_pos = Some(pos);
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(id as usize) {
            if node.deleted_pos.is_none() {
                node.deleted_pos = Some(pos);
            }
        }
        incident
    }

    pub(crate) fn tombstone_edge(&mut self, id: EdgeId, pos: u64) {
        if let Some(edge) = self.edges.get_mut(id as usize) {
            if edge.deleted_pos.is_none() {
                edge.deleted_pos = Some(pos);
            }
        }
    }

    pub(crate) fn node_count_at(&self, pos: u64) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.created_pos <= pos && n.deleted_pos.map_or(true, |d| d > pos))
            .count()
    }

    pub(crate) fn edge_count_at(&self, pos: u64) -> usize {
        self.edges
            .iter()
            .filter(|e| e.created_pos <= pos && e.deleted_pos.map_or(true, |d| d > pos))
            .count()
    }
}
