//! `map_list` / `map_map` (spec §4.3.4): per-key/per-element reactive
//! derivation, `f` invoked exactly once per identity.
//!
//! The hard part is the height-ordering hazard spec §9 calls out: the batch
//! assembler must read each newly-created per-key substream's already
//! up-to-date `changes`/`materialized` *this same step*, not the next one.
//! This module follows design (a) from §9: an "ensure children exist" node
//! (`ensure`, a direct dependent of the source) creates new per-key
//! substreams — each wired directly off the source's own `changes` node, so
//! it steps in the same height-ordered pass as `ensure` — and a second
//! "assemble" node reads the (by-then up to date) cache. `assemble`'s height
//! is raised past every substream's height as substreams are created
//! ([`crate::scheduler::Node::raise_height_above`]), so it always steps
//! after them regardless of how deep `f` builds its own reactive chain.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use crate::command::sequence::SequenceOps;
use crate::command::{LateBoundOps, Operations};
use crate::operators::decompose::{compose_list, decompose_list};
use crate::reactive::Reactive;
use crate::scheduler::{Graph, Node};

struct Entry<V, VOps: Operations<V>, Y, YOps: Operations<Y>> {
    #[allow(dead_code)] // kept alive so its substreams keep stepping; never read directly.
    v: Reactive<V, VOps>,
    y: Reactive<Y, YOps>,
}

type Cache<K, V, VOps, Y, YOps> = Rc<RefCell<FnvHashMap<K, Entry<V, VOps, Y, YOps>>>>;

/// Derives a reactive mapping by invoking `f` once per key, the moment that
/// key first appears, and wiring the resulting `Reactive<Y>` to surface its
/// own updates as `update(key, _)` commands in the output.
pub fn map_map<K, V, VOps, Y, YOps, F>(
    graph: &Graph,
    source: &Reactive<MapState<K, V>, MappingOps<K, V, VOps>>,
    value_ops: VOps,
    mut f: F,
) -> Reactive<MapState<K, Y>, MappingOps<K, Y, LateBoundOps<Y, YOps>>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
    Y: Clone + Debug + PartialEq + 'static,
    YOps: Operations<Y> + Clone + 'static,
    YOps::Cmd: PartialEq,
    F: FnMut(&Graph, &Reactive<V, VOps>) -> Reactive<Y, YOps> + 'static,
{
    let cache: Cache<K, V, VOps, Y, YOps> = Rc::new(RefCell::new(FnvHashMap::default()));
    let y_ops: LateBoundOps<Y, YOps> = LateBoundOps::unbound();

    let pending_child_height = Rc::new(Cell::new(0usize));
    let assemble_handle: Rc<RefCell<Option<Node<MappingCmd<K, Y, YOps::Cmd>>>>> = Rc::new(RefCell::new(None));

    let graph_in_ensure = graph.clone();
    let source_changes = source.changes.clone();
    let cache_in_ensure = cache.clone();
    let y_ops_in_ensure = y_ops.clone();
    let pending_in_ensure = pending_child_height.clone();
    let assemble_in_ensure = assemble_handle.clone();

    let ensure = graph.map(&source.changes, move |cmd: &MappingCmd<K, V, VOps::Cmd>| {
        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, value } => {
                    if cache_in_ensure.borrow().contains_key(key) {
                        continue;
                    }
                    let key_for_filter = key.clone();
                    let value_ops_for_filter = value_ops.clone();
                    let key_changes = graph_in_ensure.map(&source_changes, move |outer: &MappingCmd<K, V, VOps::Cmd>| {
                        let mut acc = value_ops_for_filter.empty();
                        for inner in &outer.0 {
                            if let MappingOp::Update { key: k, cmd } = inner {
                                if k == &key_for_filter {
                                    acc = value_ops_for_filter.merge(acc, cmd.clone());
                                }
                            }
                        }
                        acc
                    });
                    let v_reactive = Reactive::new(&graph_in_ensure, value_ops.clone(), key_changes, value.clone());
                    let y_reactive = f(&graph_in_ensure, &v_reactive);
                    y_ops_in_ensure.bind(y_reactive.operations.clone());

                    let child_height = y_reactive.materialized.height().max(y_reactive.changes.height());
                    pending_in_ensure.set(pending_in_ensure.get().max(child_height));
                    if let Some(assemble_node) = assemble_in_ensure.borrow().as_ref() {
                        assemble_node.raise_height_above(child_height);
                    }

                    cache_in_ensure.borrow_mut().insert(key.clone(), Entry { v: v_reactive, y: y_reactive });
                }
                MappingOp::Delete { key } => {
                    cache_in_ensure.borrow_mut().remove(key);
                }
                MappingOp::Clear => {
                    cache_in_ensure.borrow_mut().clear();
                }
                MappingOp::Update { .. } => {}
            }
        }
        cmd.clone()
    });

    let cache_in_assemble = cache.clone();
    let y_ops_in_assemble = y_ops.clone();
    let assemble = graph.map(&ensure, move |cmd: &MappingCmd<K, V, VOps::Cmd>| {
        let mut out = Vec::new();
        let cache = cache_in_assemble.borrow();
        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, .. } => {
                    if let Some(entry) = cache.get(key) {
                        out.push(MappingOp::Add { key: key.clone(), value: entry.y.snapshot() });
                    }
                }
                MappingOp::Delete { key } => out.push(MappingOp::Delete { key: key.clone() }),
                MappingOp::Clear => out.push(MappingOp::Clear),
                MappingOp::Update { key, .. } => {
                    if let Some(entry) = cache.get(key) {
                        let child_cmd = entry.y.changes();
                        if !y_ops_in_assemble.is_empty(&child_cmd) {
                            out.push(MappingOp::Update { key: key.clone(), cmd: child_cmd });
                        }
                    }
                }
            }
        }
        MappingCmd(out)
    });

    *assemble_handle.borrow_mut() = Some(assemble.clone());
    assemble.raise_height_above(pending_child_height.get());

    Reactive::new(graph, MappingOps::new(y_ops), assemble, FnvHashMap::default())
}

/// Derives a reactive sequence by invoking `f` once per element-identity.
///
/// Implemented atop [`decompose_list`]/[`map_map`]/[`compose_list`]: the
/// source is split into a stable id-sequence and an id-keyed value map,
/// `f` is applied per-identity over the id-map, and the result is recomposed
/// into a sequence in the original (possibly reordered) positions.
pub fn map_list<T, VOps, Y, YOps, F>(
    graph: &Graph,
    source: &Reactive<Vec<T>, SequenceOps<T, VOps>>,
    value_ops: VOps,
    f: F,
) -> Reactive<Vec<Y>, SequenceOps<Y, LateBoundOps<Y, YOps>>>
where
    T: Clone + Debug + PartialEq + 'static,
    VOps: Operations<T> + Clone + 'static,
    VOps::Cmd: PartialEq,
    Y: Clone + Debug + PartialEq + 'static,
    YOps: Operations<Y> + Clone + 'static,
    YOps::Cmd: PartialEq,
    F: FnMut(&Graph, &Reactive<T, VOps>) -> Reactive<Y, YOps> + 'static,
{
    let (id_sequence, id_map) = decompose_list(graph, source, value_ops);
    let mapped = map_map(graph, &id_map, id_map.operations.value.clone(), f);
    compose_list(graph, &id_sequence, &mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};
    use crate::command::sequence::{SequenceCmd, SequenceOp};
    use crate::input::ChangeInput;

    #[test]
    fn map_map_invokes_constructor_once_per_key_and_forwards_updates() {
        let graph = Graph::new();
        let input = ChangeInput::<MapState<&'static str, i32>, MappingOps<&'static str, i32, PrimitiveOps<i32>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), input.changes(), FnvHashMap::default());

        let invocations = Rc::new(Cell::new(0usize));
        let invocations_for_f = invocations.clone();
        let doubled = map_map(&graph, &source, PrimitiveOps::<i32>::new(), move |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
            invocations_for_f.set(invocations_for_f.get() + 1);
            let changes = g.map(&v.changes, |c: &PrimitiveCmd<i32>| c.clone());
            Reactive::new(g, PrimitiveOps::new(), changes, v.snapshot() * 2)
        });

        input.push_command(MappingCmd(vec![MappingOp::Add { key: "a", value: 3 }]));
        graph.step();
        assert_eq!(doubled.snapshot().get("a"), Some(&6));
        assert_eq!(invocations.get(), 1);

        input.push_command(MappingCmd(vec![MappingOp::Update { key: "a", cmd: PrimitiveCmd::Replace(5) }]));
        graph.step();
        assert_eq!(doubled.snapshot().get("a"), Some(&10));
        assert_eq!(invocations.get(), 1, "f must not be invoked again on update");
    }

    #[test]
    fn map_list_preserves_order_and_maps_each_element() {
        let graph = Graph::new();
        let input = ChangeInput::<Vec<i32>, SequenceOps<i32, PrimitiveOps<i32>>>::new(&graph, SequenceOps::new(PrimitiveOps::new()));
        let source = Reactive::new(&graph, SequenceOps::new(PrimitiveOps::new()), input.changes(), Vec::new());

        let squared = map_list(&graph, &source, PrimitiveOps::<i32>::new(), |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
            let value = v.snapshot();
            let changes = g.map(&v.changes, |_: &PrimitiveCmd<i32>| PrimitiveCmd::Empty);
            Reactive::new(g, PrimitiveOps::new(), changes, value * value)
        });

        input.push_command(SequenceCmd(vec![
            SequenceOp::Insert { at: 0, value: 2 },
            SequenceOp::Insert { at: 1, value: 3 },
        ]));
        graph.step();
        assert_eq!(squared.snapshot(), vec![4, 9]);
    }
}
