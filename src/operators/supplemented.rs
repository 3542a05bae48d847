//! Operators named in spec.md §6's operator list without their own
//! dedicated subsection, specified to the detail level the rest of §4.3
//! establishes and implemented here in one module since none of them needs
//! more than a single derived node.

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::command::log::{LogCmd, LogOps};
use crate::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};
use crate::command::sequence::{SequenceCmd, SequenceOp, SequenceOps};
use crate::command::tuple::{TupleCmd2, TupleOps2};
use crate::command::{Id, Operations};
use crate::operators::decompose::{compose_list, decompose_list};
use crate::operators::sequence_map::sequence_map;
use crate::reactive::Reactive;
use crate::scheduler::Graph;

/// Projects slot 0 of a reactive 2-tuple.
pub fn project_tuple_0<T0, O0, T1, O1>(graph: &Graph, source: &Reactive<(T0, T1), TupleOps2<T0, O0, T1, O1>>) -> Reactive<T0, O0>
where
    T0: Clone + Debug + PartialEq + 'static,
    O0: Operations<T0> + Clone + 'static,
    O0::Cmd: PartialEq,
    T1: Clone + Debug + 'static,
    O1: Operations<T1> + Clone + 'static,
{
    let combined = graph.map(&source.changes, |cmd: &TupleCmd2<O0::Cmd, O1::Cmd>| cmd.0.clone());
    Reactive::new(graph, source.operations.slot0.clone(), combined, source.snapshot().0)
}

/// Projects slot 1 of a reactive 2-tuple.
pub fn project_tuple_1<T0, O0, T1, O1>(graph: &Graph, source: &Reactive<(T0, T1), TupleOps2<T0, O0, T1, O1>>) -> Reactive<T1, O1>
where
    T0: Clone + Debug + 'static,
    O0: Operations<T0> + Clone + 'static,
    T1: Clone + Debug + PartialEq + 'static,
    O1: Operations<T1> + Clone + 'static,
    O1::Cmd: PartialEq,
{
    let combined = graph.map(&source.changes, |cmd: &TupleCmd2<O0::Cmd, O1::Cmd>| cmd.1.clone());
    Reactive::new(graph, source.operations.slot1.clone(), combined, source.snapshot().1)
}

/// The primitive instance of `map_list`/`map_map`: translates every
/// `replace` pointwise with a pure function. There is no per-element
/// substream to build, so none of `map_map`'s height-ordering mitigation
/// applies here.
pub fn map_primitive<T, U, F>(graph: &Graph, source: &Reactive<T, PrimitiveOps<T>>, mut f: F) -> Reactive<U, PrimitiveOps<U>>
where
    T: Clone + Debug + PartialEq + 'static,
    U: Clone + Debug + PartialEq + 'static,
    F: FnMut(&T) -> U + 'static,
{
    let combined = graph.map(&source.changes, move |cmd: &PrimitiveCmd<T>| match cmd {
        PrimitiveCmd::Empty => PrimitiveCmd::Empty,
        PrimitiveCmd::Replace(v) => PrimitiveCmd::Replace(f(v)),
    });
    Reactive::new(graph, PrimitiveOps::new(), combined, f(&source.snapshot()))
}

/// Projects one key out of a mapping into an optional primitive, recomputed
/// whenever a batch touches that key (`add`, `update`, `delete`, or an
/// outer `clear`).
pub fn get_key_map<K, V, VOps>(graph: &Graph, source: &Reactive<MapState<K, V>, MappingOps<K, V, VOps>>, key: K) -> Reactive<Option<V>, PrimitiveOps<Option<V>>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
{
    let key_for_combine = key.clone();
    let combined = graph.zip(&source.changes, &source.materialized, move |cmd: &MappingCmd<K, V, VOps::Cmd>, state: &MapState<K, V>| {
        let touched = cmd.0.iter().any(|op| match op {
            MappingOp::Add { key: k, .. } | MappingOp::Update { key: k, .. } | MappingOp::Delete { key: k } => k == &key_for_combine,
            MappingOp::Clear => true,
        });
        if touched {
            PrimitiveCmd::Replace(state.get(&key_for_combine).cloned())
        } else {
            PrimitiveCmd::Empty
        }
    });
    let initial = source.snapshot().get(&key).cloned();
    Reactive::new(graph, PrimitiveOps::new(), combined, initial)
}

/// As [`get_key_map`], for a mapping the caller guarantees holds at most one
/// entry (used internally by `sequence_map`'s singleton-map framing).
pub fn get_single_map_value<K, V, VOps>(graph: &Graph, source: &Reactive<MapState<K, V>, MappingOps<K, V, VOps>>) -> Reactive<Option<V>, PrimitiveOps<Option<V>>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
{
    let combined = graph.zip(&source.changes, &source.materialized, move |cmd: &MappingCmd<K, V, VOps::Cmd>, state: &MapState<K, V>| {
        if cmd.0.is_empty() {
            PrimitiveCmd::Empty
        } else {
            PrimitiveCmd::Replace(state.values().next().cloned())
        }
    });
    let initial = source.snapshot().values().next().cloned();
    Reactive::new(graph, PrimitiveOps::new(), combined, initial)
}

/// Materializes a mapping as an order-stable sequence of its entries: the
/// mapping-to-sequence inverse of `decompose_list`'s map side. Order is
/// insertion order of the underlying `add` commands; `delete` removes the
/// matching entry wherever it currently sits; `update` rewrites the value
/// slot in place, leaving the key slot untouched.
pub fn flatten_map<K, V, VOps>(
    graph: &Graph,
    source: &Reactive<MapState<K, V>, MappingOps<K, V, VOps>>,
    value_ops: VOps,
) -> Reactive<Vec<(K, V)>, SequenceOps<(K, V), TupleOps2<K, PrimitiveOps<K>, V, VOps>>>
where
    K: Clone + Eq + Hash + Debug + PartialEq + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
{
    let order: Rc<RefCell<Vec<K>>> = Rc::new(RefCell::new(Vec::new()));
    let order_for_combine = order.clone();
    let combined = graph.map(&source.changes, move |cmd: &MappingCmd<K, V, VOps::Cmd>| {
        let mut out = Vec::new();
        let mut order = order_for_combine.borrow_mut();
        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, value } => {
                    order.push(key.clone());
                    let at = order.len() - 1;
                    out.push(SequenceOp::Insert { at, value: (key.clone(), value.clone()) });
                }
                MappingOp::Update { key, cmd } => {
                    if let Some(at) = order.iter().position(|k| k == key) {
                        out.push(SequenceOp::Update { at, cmd: TupleCmd2(PrimitiveCmd::Empty, cmd.clone()) });
                    }
                }
                MappingOp::Delete { key } => {
                    if let Some(at) = order.iter().position(|k| k == key) {
                        order.remove(at);
                        out.push(SequenceOp::Remove { at });
                    }
                }
                MappingOp::Clear => {
                    order.clear();
                    out.push(SequenceOp::Clear);
                }
            }
        }
        SequenceCmd(out)
    });
    let element_ops = TupleOps2::new(PrimitiveOps::new(), value_ops);
    Reactive::new(graph, SequenceOps::new(element_ops), combined, Vec::new())
}

/// The sequence analogue of `sequence_map`: flattens a sequence of reactive
/// values into a sequence of their current values, tracking each slot's
/// inner reactive by a stable identity rather than by key. Built from
/// `decompose_list` (for the stable identity), `sequence_map` (for the
/// per-identity liveness tracking) and `compose_list` (to reassemble the
/// original, possibly-reordered positions) — the same three-operator
/// composition `map_list` uses for `map_map`.
///
/// `presence` is a structural sequence of unit slots: `insert`/`remove`/
/// `move`/`clear` describe which identities exist and where, exactly as
/// `sequence_map`'s `source` describes which keys exist. `f` builds (or, on
/// an `update` at a slot, rebuilds) that slot's `Reactive<V>`.
pub fn sequence_list<V, VOps, F>(
    graph: &Graph,
    presence: &Reactive<Vec<()>, SequenceOps<(), PrimitiveOps<()>>>,
    f: F,
) -> Reactive<Vec<V>, SequenceOps<V, crate::command::LateBoundOps<V, VOps>>>
where
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
    F: FnMut(&Graph, Id) -> Reactive<V, VOps> + 'static,
{
    let (id_sequence, id_presence_map) = decompose_list(graph, presence, PrimitiveOps::<()>::new());
    let mut f = f;
    let flattened = sequence_map(graph, &id_presence_map, move |g, id: &Id| f(g, *id));
    compose_list(graph, &id_sequence, &flattened)
}

/// Folds an append log into a running accumulated value, left-to-right over
/// each batch's `append` commands, emitting `replace(new_accum)` whenever a
/// batch is non-empty.
pub fn fold_log<T, A, F>(graph: &Graph, log: &Reactive<Vec<T>, LogOps<T>>, init: A, mut f: F) -> Reactive<A, PrimitiveOps<A>>
where
    T: Clone + Debug + PartialEq + 'static,
    A: Clone + Debug + PartialEq + 'static,
    F: FnMut(A, &T) -> A + 'static,
{
    let running = Rc::new(RefCell::new(init.clone()));
    let running_for_combine = running.clone();
    let combined = graph.map(&log.changes, move |cmd: &LogCmd<T>| {
        if cmd.0.is_empty() {
            return PrimitiveCmd::Empty;
        }
        let mut acc = running_for_combine.borrow_mut();
        for item in &cmd.0 {
            *acc = f(acc.clone(), item);
        }
        PrimitiveCmd::Replace(acc.clone())
    });
    Reactive::new(graph, PrimitiveOps::new(), combined, init)
}

/// `fold_log` specialized to a running count, matching the teacher's
/// `count` operator being a named specialization of `group`
/// (`operators/count.rs`).
pub fn length_log<T>(graph: &Graph, log: &Reactive<Vec<T>, LogOps<T>>) -> Reactive<usize, PrimitiveOps<usize>>
where
    T: Clone + Debug + PartialEq + 'static,
{
    fold_log(graph, log, 0usize, |n, _| n + 1)
}

/// The log-container instance of `map_list`/`map_map`: translates each
/// `append` batch element-wise with a pure function. Log entries are never
/// updated or removed, so there is no per-element substream to build early
/// and none of `map_map`'s height-ordering mitigation is needed.
pub fn map_log<T, U, F>(graph: &Graph, log: &Reactive<Vec<T>, LogOps<T>>, mut f: F) -> Reactive<Vec<U>, LogOps<U>>
where
    T: Clone + Debug + PartialEq + 'static,
    U: Clone + Debug + PartialEq + 'static,
    F: FnMut(&T) -> U + 'static,
{
    let combined = graph.map(&log.changes, move |cmd: &LogCmd<T>| LogCmd(cmd.0.iter().map(|t| f(t)).collect()));
    Reactive::new(graph, LogOps::new(), combined, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ChangeInput, LogInput};

    #[test]
    fn map_primitive_translates_each_replace() {
        let graph = Graph::new();
        let input = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
        let source = Reactive::new(&graph, PrimitiveOps::new(), input.changes(), 0);
        let doubled = map_primitive(&graph, &source, |x| x * 2);
        assert_eq!(doubled.snapshot(), 0);

        input.push_command(PrimitiveCmd::Replace(5));
        graph.step();
        assert_eq!(doubled.snapshot(), 10);

        input.push_command(PrimitiveCmd::Empty);
        graph.step();
        assert_eq!(doubled.snapshot(), 10, "empty command must not recompute");
    }

    #[test]
    fn get_key_map_tracks_one_key_as_optional() {
        let graph = Graph::new();
        let input = ChangeInput::<MapState<&'static str, i32>, MappingOps<&'static str, i32, PrimitiveOps<i32>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), input.changes(), MapState::default());

        let projected = get_key_map(&graph, &source, "a");
        assert_eq!(projected.snapshot(), None);

        input.push_command(MappingCmd(vec![MappingOp::Add { key: "a", value: 1 }, MappingOp::Add { key: "b", value: 2 }]));
        graph.step();
        assert_eq!(projected.snapshot(), Some(1));

        input.push_command(MappingCmd(vec![MappingOp::Update { key: "b", cmd: PrimitiveCmd::Replace(9) }]));
        graph.step();
        assert_eq!(projected.snapshot(), Some(1), "untouched key must not recompute, but must keep its value");

        input.push_command(MappingCmd(vec![MappingOp::Delete { key: "a" }]));
        graph.step();
        assert_eq!(projected.snapshot(), None);
    }

    #[test]
    fn flatten_map_preserves_insertion_order_across_deletes() {
        let graph = Graph::new();
        let input = ChangeInput::<MapState<&'static str, i32>, MappingOps<&'static str, i32, PrimitiveOps<i32>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), input.changes(), MapState::default());
        let flattened = flatten_map(&graph, &source, PrimitiveOps::<i32>::new());

        input.push_command(MappingCmd(vec![
            MappingOp::Add { key: "a", value: 1 },
            MappingOp::Add { key: "b", value: 2 },
            MappingOp::Add { key: "c", value: 3 },
        ]));
        graph.step();
        assert_eq!(flattened.snapshot(), vec![("a", 1), ("b", 2), ("c", 3)]);

        input.push_command(MappingCmd(vec![MappingOp::Delete { key: "b" }]));
        graph.step();
        assert_eq!(flattened.snapshot(), vec![("a", 1), ("c", 3)]);
    }

    #[test]
    fn fold_log_and_length_log_accumulate_over_appends() {
        let graph = Graph::new();
        let log = LogInput::<i32>::new(&graph);
        let reactive_log = Reactive::new(&graph, LogOps::<i32>::new(), log.changes(), Vec::new());

        let sum = fold_log(&graph, &reactive_log, 0, |acc, x| acc + x);
        let len = length_log(&graph, &reactive_log);

        log.push_all([1, 2, 3]);
        graph.step();
        assert_eq!(sum.snapshot(), 6);
        assert_eq!(len.snapshot(), 3);

        log.push(4);
        graph.step();
        assert_eq!(sum.snapshot(), 10);
        assert_eq!(len.snapshot(), 4);
    }

    #[test]
    fn map_log_translates_each_appended_entry() {
        let graph = Graph::new();
        let log = LogInput::<i32>::new(&graph);
        let reactive_log = Reactive::new(&graph, LogOps::<i32>::new(), log.changes(), Vec::new());

        let doubled = map_log(&graph, &reactive_log, |x| x * 2);

        log.push_all([1, 2, 3]);
        graph.step();
        assert_eq!(doubled.snapshot(), vec![2, 4, 6]);
    }
}
