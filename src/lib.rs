//! Incremental view maintenance over immutable collections.
//!
//! A consumer composes a dataflow [`scheduler::Graph`] of [`reactive::Reactive`]
//! collections — ordered sequences, keyed mappings, append logs, tuples,
//! primitives, and weighted Z-sets/Z-maps — and receives, each time an
//! [`input::ChangeInput`] changes, a compact command describing what
//! changed. Operators under [`operators`] consume commands and emit
//! commands, so refresh cost is proportional to the size of the change, not
//! the size of the collection.
//!
//! ```text
//! materialized          = changes.accumulate(initial, ops.apply)
//! previous_materialized = materialized.delay(initial)
//! ```
//!
//! These two equalities, from [`reactive::Reactive`], are the crate's
//! central idea; everything else is operators built on top of them.

pub mod command;
pub mod error;
pub mod input;
pub mod operators;
pub mod reactive;
pub mod scheduler;
pub mod tree;

pub use command::{
    Id, IdGen, LateBoundOps, LogCmd, LogOps, MappingCmd, MappingOps, Operations, PrimitiveCmd,
    PrimitiveOps, SequenceCmd, SequenceOps, ZMap, ZMapOps, ZSet, ZSetOps,
};
pub use error::{Error, Result};
pub use input::{ChangeInput, LogInput};
pub use reactive::Reactive;
pub use scheduler::{Graph, Node};
