//! Per-change ordered mutation record.
//!
//! Mutations reference either identifiers that existed on main at the
//! change's fork point, or provisional identifiers drawn from the change's
//! local space (at or above the fork watermark). Conflict detection at
//! submit time walks this log in order.

use crate::model::{EdgeId, NodeId, PropertyValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    CreateNode {
        /// Provisional identifier assigned from the change-local counter.
        id: NodeId,
        labels: Vec<String>,
        properties: BTreeMap<String, PropertyValue>,
    },
    CreateEdge {
        /// Provisional identifier assigned from the change-local counter.
        id: EdgeId,
        type_name: String,
        /// Endpoints may be pre-fork main identifiers or provisional ones.
        source: NodeId,
        target: NodeId,
        properties: BTreeMap<String, PropertyValue>,
    },
    DeleteNodes {
        ids: Vec<NodeId>,
    },
    DeleteEdges {
        ids: Vec<EdgeId>,
    },
}

/// Ordered record of a change's uncommitted mutations.
#[derive(Debug, Default)]
pub(crate) struct MutationLog {
    ops: Vec<Mutation>,
}

impl MutationLog {
    pub(crate) fn push(&mut self, op: Mutation) {
        self.ops.push(op);
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.ops)
    }
}
