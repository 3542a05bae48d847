//! The reactive-collection wrapper (spec §4.3.1).
//!
//! A `Reactive<State, Ops>` pairs a container's current snapshot with its
//! command stream and the operations witness that interprets it. The two
//! defining equalities —
//!
//! ```text
//! materialized          = changes.accumulate(initial, ops.apply)
//! previous_materialized = materialized.delay(initial)
//! ```
//!
//! — are exactly how `Reactive::new` is built below; they are not merely
//! documentation, they are the implementation.

use crate::command::Operations;
use crate::scheduler::{Graph, Node};

/// A reactive collection: a container value kept current by a command
/// stream, plus the witness that knows how to apply that stream.
pub struct Reactive<State, Ops: Operations<State>> {
    /// The snapshot as of the most recently completed step.
    pub materialized: Node<State>,
    /// `materialized` delayed by one step.
    pub previous_materialized: Node<State>,
    /// This step's command batch (the monoid identity if nothing changed).
    pub changes: Node<Ops::Cmd>,
    /// The command-algebra witness for `State`.
    pub operations: Ops,
}

impl<State, Ops> Clone for Reactive<State, Ops>
where
    Ops: Operations<State> + Clone,
{
    fn clone(&self) -> Self {
        Reactive {
            materialized: self.materialized.clone(),
            previous_materialized: self.previous_materialized.clone(),
            changes: self.changes.clone(),
            operations: self.operations.clone(),
        }
    }
}

impl<State, Ops> Reactive<State, Ops>
where
    State: Clone + PartialEq + 'static,
    Ops: Operations<State> + 'static,
{
    /// Builds a reactive collection from its change stream and witness.
    ///
    /// `materialized` is `changes.accumulate(initial, ops.apply)`;
    /// `previous_materialized` is `materialized.delay(initial)`. Both are
    /// load-bearing equalities (spec §4.3.1) and are exercised directly by
    /// this module's tests.
    pub fn new(graph: &Graph, ops: Ops, changes: Node<Ops::Cmd>, initial: State) -> Self {
        let apply_ops = ops.clone();
        let materialized = graph.accumulate(&changes, initial.clone(), move |state, cmd| apply_ops.apply(state, cmd));
        let previous_materialized = graph.delay(&materialized, initial);
        Reactive { materialized, previous_materialized, changes, operations: ops }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> State {
        self.materialized.value()
    }

    /// The snapshot as of one step ago.
    pub fn previous_snapshot(&self) -> State {
        self.previous_materialized.value()
    }

    /// This step's command batch.
    pub fn changes(&self) -> Ops::Cmd {
        self.changes.value()
    }
}
