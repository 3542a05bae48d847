//! Error conditions raised by the command algebra, the scheduler, and the
//! summarized 2-3 tree.
//!
//! Per the design, these are programmer errors or fatal internal invariant
//! violations, not recoverable runtime conditions: there is no retry and no
//! surfacing to end users beyond returning the condition synchronously from
//! the offending call.

use thiserror::Error;

/// Something a caller did that the command algebra or scheduler cannot
/// tolerate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `add(k, _)` was observed for a key already present in the pre-step
    /// snapshot.
    #[error("add() for key already present in the pre-step snapshot")]
    KeyAlreadyPresent,

    /// `group_by` was asked to group by a key type that is itself a
    /// collection, violating the typed precondition that group keys be
    /// opaque primitives.
    #[error("group_by key type must be an opaque primitive, not a collection")]
    NonPrimitiveGroupKey,

    /// `compose_list` observed a structural mismatch between its id
    /// sequence and its value mapping (an id referenced by the sequence
    /// with no corresponding mapping entry, or vice versa).
    #[error("compose_list: id sequence and value mapping are structurally inconsistent")]
    SequenceMapArityMismatch,

    /// The summarized 2-3 tree's internal integrity check failed: unequal
    /// leaf depths, a node with other than two or three children, or a
    /// summary that does not equal the fold of its children's summaries.
    /// This is fatal; it indicates a prior bug corrupted the structure.
    #[error("summarized 2-3 tree invariant violated: {0}")]
    TreeInvariantViolated(&'static str),

    /// Construction of a dependency cycle in the scheduler graph was
    /// attempted. The scheduler does not support cycles.
    #[error("attempted to construct a cyclic dependency in the reactive graph")]
    CyclicDependency,
}

/// A `Result` alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
