//! Error handling for graft operations.
//!
//! All public APIs return `Result<T, GraphError>`. Conflict and capacity
//! diagnostics carry a literal message naming the entity kind and the
//! identifiers involved; those messages are part of the observable contract
//! and are displayed verbatim.

use thiserror::Error;

/// Result type for graft operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while operating on the store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Unknown graph, change, or entity reference.
    #[error("{0} not found")]
    NotFound(String),

    /// Operation attempted on a change in the wrong lifecycle state,
    /// e.g. mutating a change that has already been committed, or
    /// submitting a change twice.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A schema identifier space (labels, edge types, property types)
    /// is exhausted. Identifier spaces have a fixed per-graph capacity
    /// and released identifiers are never reclaimed.
    #[error("{0}")]
    Capacity(String),

    /// Submission rejected by conflict detection against main.
    ///
    /// Surfaced only at submit time and terminal for the change: the
    /// change transitions to `Rejected` holding this diagnostic, and the
    /// caller must fork a fresh change to retry the work.
    #[error("{0}")]
    Conflict(String),

    /// Malformed input, e.g. a duplicate graph name or an edge endpoint
    /// that cannot be referenced from the active context.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
