//! Sealed local commits.
//!
//! A commit is the immutable snapshot of a change's pending mutations at the
//! moment of `commit`. Several commits may accumulate in one change before
//! submission; the submission covers their cumulative effect in order.

use crate::db::mutation::Mutation;
use crate::model::{ChangeId, CommitHash};
use xxhash_rust::xxh64::xxh64;

#[derive(Debug)]
pub(crate) struct Commit {
    pub hash: CommitHash,
    pub ops: Vec<Mutation>,
}

impl Commit {
    /// Seals `ops` into an immutable commit. The hash is an identifier, not
    /// a content address: it only needs to be stable and unique within the
    /// store, and is compared by equality.
    pub(crate) fn seal(graph: &str, change: ChangeId, seq: usize, ops: Vec<Mutation>) -> Self {
        let tag = format!("{graph}/{change}/{seq}/{}", ops.len());
        Self {
            hash: xxh64(tag.as_bytes(), 0x67_72_61_66),
            ops,
        }
    }
}
