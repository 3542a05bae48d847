//! Externally-driven change inputs (spec §4.4): a source node owning
//! `pending`/`current` command buffers, published atomically at each step.
//!
//! `ChangeInput`'s node is dirtied only when something is pushed (not every
//! step): pushing a command appends it to `pending` and arms the node for
//! the next cycle. At that step the node's `recompute` drains `pending`
//! into `current` via `merge`. Publishing a non-empty batch re-arms the
//! node for one further cycle, so the step after publishes `current` back
//! to `empty()` — without this, a consumer reading `changes()` on a step
//! where nothing new was pushed would see last cycle's batch again.

use std::cell::RefCell;
use std::rc::Rc;

use crate::command::Operations;
use crate::scheduler::{Graph, Node};

/// A change-input source for a container whose command type is `Cmd`.
pub struct ChangeInput<State, Ops: Operations<State>> {
    graph: Graph,
    node: Node<Ops::Cmd>,
    pending: Rc<RefCell<Vec<Ops::Cmd>>>,
}

impl<State: 'static, Ops: Operations<State> + 'static> ChangeInput<State, Ops> {
    /// Creates a change input whose batch starts out empty.
    pub fn new(graph: &Graph, ops: Ops) -> Self {
        let pending: Rc<RefCell<Vec<Ops::Cmd>>> = Rc::new(RefCell::new(Vec::new()));
        let pending_read = pending.clone();
        let ops_read = ops.clone();
        let empty = ops.empty();
        let graph_in_recompute = graph.clone();
        let self_handle: Rc<RefCell<Option<Node<Ops::Cmd>>>> = Rc::new(RefCell::new(None));
        let self_handle_recompute = self_handle.clone();
        let node = graph.make_source(empty, move |_current| {
            let batch: Vec<_> = pending_read.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                return (ops_read.empty(), false);
            }
            let merged = batch.into_iter().fold(ops_read.empty(), |acc, cmd| ops_read.merge(acc, cmd));
            let changed = !ops_read.is_empty(&merged);
            if changed {
                if let Some(node) = self_handle_recompute.borrow().as_ref() {
                    graph_in_recompute.mark_dirty_next_step(node);
                }
            }
            (merged, changed)
        });
        *self_handle.borrow_mut() = Some(node.clone());
        ChangeInput { graph: graph.clone(), node, pending }
    }

    /// The node downstream operators read this input's batch from.
    pub fn changes(&self) -> Node<Ops::Cmd> {
        self.node.clone()
    }

    /// Appends one command to the pending batch and arms this input to
    /// publish it on the next `graph.step()`.
    pub fn push_command(&self, cmd: Ops::Cmd) {
        self.pending.borrow_mut().push(cmd);
        self.graph.mark_dirty_next_step(&self.node);
    }
}

/// A log-shaped change input, additionally exposing `push`/`push_all`
/// (spec §4.4's "sequence-of-items source that maps onto the log
/// container").
pub struct LogInput<T: Clone + 'static> {
    inner: ChangeInput<Vec<T>, crate::command::log::LogOps<T>>,
}

impl<T: Clone + std::fmt::Debug + PartialEq + 'static> LogInput<T> {
    /// Creates an empty log input.
    pub fn new(graph: &Graph) -> Self {
        LogInput { inner: ChangeInput::new(graph, crate::command::log::LogOps::new()) }
    }

    /// The node downstream operators read this input's append batch from.
    pub fn changes(&self) -> Node<crate::command::log::LogCmd<T>> {
        self.inner.changes()
    }

    /// Appends a single entry, to be published on the next step.
    pub fn push(&self, value: T) {
        self.push_all(std::iter::once(value));
    }

    /// Appends a batch of entries, to be published on the next step.
    pub fn push_all(&self, values: impl IntoIterator<Item = T>) {
        self.inner.push_command(crate::command::log::LogCmd(values.into_iter().collect()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::log::LogOps;

    #[test]
    fn pushed_batch_is_visible_after_one_step_then_resets() {
        let graph = Graph::new();
        let input = ChangeInput::<Vec<i32>, LogOps<i32>>::new(&graph, LogOps::new());
        let changes = input.changes();
        assert!(changes.value().is_empty());

        input.push_command(crate::command::log::LogCmd(vec![1, 2]));
        graph.step();
        assert_eq!(changes.value().0, vec![1, 2]);

        graph.step();
        assert!(changes.value().is_empty());
    }

    #[test]
    fn log_input_push_and_push_all() {
        let graph = Graph::new();
        let input = LogInput::<i32>::new(&graph);
        input.push(1);
        input.push_all([2, 3]);
        graph.step();
        assert_eq!(input.changes().value().0, vec![1, 2, 3]);
    }
}
