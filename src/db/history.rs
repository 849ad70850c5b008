//! Append-only ledger of accepted submissions to main.
//!
//! Each accepted submission appends exactly one entry. Besides the
//! aggregate counts surfaced through metadata queries, an entry carries the
//! journal of entity identifiers it created and tombstoned; the union of
//! the journals after a change's fork point is the `main delta` the
//! submission coordinator checks conflicts against. Keeping the journal on
//! the entry makes that an index lookup instead of a table scan.

use crate::model::{CommitHash, EdgeId, NodeId};
use rustc_hash::FxHashSet;

/// Changed-identifier journal for one accepted submission.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubmissionJournal {
    pub created_nodes: Vec<NodeId>,
    /// Created edges with their endpoints, for the incident-edge conflict
    /// check against later node deletions.
    pub created_edges: Vec<(EdgeId, NodeId, NodeId)>,
    pub deleted_nodes: FxHashSet<NodeId>,
    pub deleted_edges: FxHashSet<EdgeId>,
}

/// One accepted submission on main.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Identifier of the submitted change's tip commit.
    pub commit: CommitHash,
    /// Net node count delta: nodes created minus nodes tombstoned.
    pub node_delta: i64,
    /// Net edge count delta: edges created minus edges tombstoned,
    /// including edges tombstoned by node-deletion cascades.
    pub edge_delta: i64,
    /// Number of sealed commits covered by the submission.
    pub part_count: u32,
    pub(crate) journal: SubmissionJournal,
}

/// Append-only history for one graph. The head position is the number of
/// accepted submissions; it only ever advances by whole entries.
#[derive(Debug, Default)]
pub(crate) struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub(crate) fn head_position(&self) -> u64 {
        self.entries.len() as u64
    }

    pub(crate) fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Ordered entries, oldest first.
    pub(crate) fn read(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Entries accepted after history position `pos`.
    pub(crate) fn entries_since(&self, pos: u64) -> &[HistoryEntry] {
        &self.entries[pos as usize..]
    }
}
