//! `sequence_map` (spec §4.3.8): flattens a map whose values are themselves
//! live reactives into a reactive map of their current values.
//!
//! A `Reactive<V, VOps>` can't be stored as a `MappingOp`'s value directly —
//! `Operations::State` needs `Clone + PartialEq`, and a live node handle
//! has no meaningful equality. So the public shape here mirrors `map_map`'s
//! "invoke once per key" idiom instead of literally threading
//! `Reactive<map<K, Reactive<V>>>` through the command algebra: `source` is
//! a presence map (`add`/`delete`/`clear` track which keys exist; `update`
//! is the rebind signal spec scenario 5 describes — "replaces the inner
//! reactive") and `f` is invoked to build or rebuild that key's `Reactive<V>`
//! the moment it's needed.
//!
//! The spec's tree-merge-spine is one way to let a growing set of per-key
//! reactives report their own changes without per-step rescanning; this
//! crate's scheduler only exposes height-raising for a post-construction
//! dependency (`Node::raise_height_above`), not dependency *removal*, so a
//! literal spine would still need to rescan on key removal anyway. Given
//! that, `assemble` here scans its whole cache every time it's dirtied
//! (structurally, or because some child's own `.changes()` fired) rather
//! than threading per-node summaries through the tree — the same
//! simplicity-over-asymptotics tradeoff `group_by_list`'s `global_order`
//! mirror makes. [`Graph::add_dynamic_dependent`] is what lets `assemble`
//! be dirtied by a child's own schedule at all, a small addition to the
//! scheduler grounded in the same "dependency set grows after construction"
//! concern `raise_height_above` already addresses for height.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};
use crate::command::{LateBoundOps, Operations};
use crate::reactive::Reactive;
use crate::scheduler::{Graph, Node};

type Cache<K, V, VOps> = Rc<RefCell<FnvHashMap<K, Reactive<V, VOps>>>>;

/// Flattens a presence map into a reactive map of live values, invoking `f`
/// once per key to build its `Reactive<V>` (and again on an `update`, which
/// rebinds that key to a freshly built one).
pub fn sequence_map<K, V, VOps, F>(
    graph: &Graph,
    source: &Reactive<MapState<K, ()>, MappingOps<K, (), PrimitiveOps<()>>>,
    mut f: F,
) -> Reactive<MapState<K, V>, MappingOps<K, V, LateBoundOps<V, VOps>>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
    F: FnMut(&Graph, &K) -> Reactive<V, VOps> + 'static,
{
    let cache: Cache<K, V, VOps> = Rc::new(RefCell::new(FnvHashMap::default()));
    let v_ops: LateBoundOps<V, VOps> = LateBoundOps::unbound();

    let pending_child_height = Rc::new(Cell::new(0usize));
    let assemble_handle: Rc<RefCell<Option<Node<MappingCmd<K, V, VOps::Cmd>>>>> = Rc::new(RefCell::new(None));

    let graph_in_ensure = graph.clone();
    let cache_in_ensure = cache.clone();
    let v_ops_in_ensure = v_ops.clone();
    let pending_in_ensure = pending_child_height.clone();
    let assemble_in_ensure = assemble_handle.clone();

    let bind_child = move |key: &K, v_reactive: Reactive<V, VOps>, cache: &Cache<K, V, VOps>| {
        v_ops_in_ensure.bind(v_reactive.operations.clone());
        let child_height = v_reactive.materialized.height().max(v_reactive.changes.height());
        pending_in_ensure.set(pending_in_ensure.get().max(child_height));
        if let Some(assemble_node) = assemble_in_ensure.borrow().as_ref() {
            assemble_node.raise_height_above(child_height);
            graph_in_ensure.add_dynamic_dependent(&v_reactive.changes, assemble_node);
        }
        cache.borrow_mut().insert(key.clone(), v_reactive);
    };

    let graph_in_f = graph.clone();
    let cache_for_ensure = cache.clone();
    let ensure = graph.map(&source.changes, move |cmd: &MappingCmd<K, (), PrimitiveCmd<()>>| {
        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, .. } => {
                    let v_reactive = f(&graph_in_f, key);
                    bind_child(key, v_reactive, &cache_for_ensure);
                }
                MappingOp::Update { key, .. } => {
                    let v_reactive = f(&graph_in_f, key);
                    bind_child(key, v_reactive, &cache_for_ensure);
                }
                MappingOp::Delete { key } => {
                    cache_for_ensure.borrow_mut().remove(key);
                }
                MappingOp::Clear => {
                    cache_for_ensure.borrow_mut().clear();
                }
            }
        }
        cmd.clone()
    });

    let cache_in_assemble = cache.clone();
    let v_ops_in_assemble = v_ops.clone();
    let assemble = graph.map(&ensure, move |cmd: &MappingCmd<K, (), PrimitiveCmd<()>>| {
        let mut out = Vec::new();
        let mut handled: FnvHashMap<K, ()> = FnvHashMap::default();
        let cache = cache_in_assemble.borrow();

        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, .. } => {
                    if let Some(entry) = cache.get(key) {
                        out.push(MappingOp::Add { key: key.clone(), value: entry.snapshot() });
                    }
                    handled.insert(key.clone(), ());
                }
                MappingOp::Update { key, .. } => {
                    // Rebinding to a fresh reactive shares nothing
                    // incremental with the old one; drop the old entry and
                    // insert the new one's current value wholesale.
                    if let Some(entry) = cache.get(key) {
                        out.push(MappingOp::Delete { key: key.clone() });
                        out.push(MappingOp::Add { key: key.clone(), value: entry.snapshot() });
                    }
                    handled.insert(key.clone(), ());
                }
                MappingOp::Delete { key } => {
                    out.push(MappingOp::Delete { key: key.clone() });
                    handled.insert(key.clone(), ());
                }
                MappingOp::Clear => out.push(MappingOp::Clear),
            }
        }

        for (key, entry) in cache.iter() {
            if handled.contains_key(key) {
                continue;
            }
            let child_cmd = entry.changes();
            if !v_ops_in_assemble.is_empty(&child_cmd) {
                out.push(MappingOp::Update { key: key.clone(), cmd: child_cmd });
            }
        }

        MappingCmd(out)
    });

    *assemble_handle.borrow_mut() = Some(assemble.clone());
    assemble.raise_height_above(pending_child_height.get());

    Reactive::new(graph, MappingOps::new(v_ops), assemble, FnvHashMap::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ChangeInput;

    #[test]
    fn sequence_map_tracks_each_keys_own_reactive_independently() {
        let graph = Graph::new();
        let presence = ChangeInput::<MapState<&'static str, ()>, MappingOps<&'static str, (), PrimitiveOps<()>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), presence.changes(), FnvHashMap::default());

        let a_input = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
        let a_changes = a_input.changes();
        let b_input = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
        let b_changes = b_input.changes();

        let flattened = sequence_map(&graph, &source, move |g, key: &&'static str| {
            let changes = if *key == "a" { a_changes.clone() } else { b_changes.clone() };
            Reactive::new(g, PrimitiveOps::new(), changes, 0)
        });

        presence.push_command(MappingCmd(vec![MappingOp::Add { key: "a", value: () }, MappingOp::Add { key: "b", value: () }]));
        graph.step();
        assert_eq!(flattened.snapshot().get("a"), Some(&0));
        assert_eq!(flattened.snapshot().get("b"), Some(&0));

        a_input.push_command(PrimitiveCmd::Replace(7));
        graph.step();
        assert_eq!(flattened.snapshot().get("a"), Some(&7));
        assert_eq!(flattened.snapshot().get("b"), Some(&0), "b's own reactive did not fire, must be untouched");
    }

    #[test]
    fn sequence_map_rebind_replaces_the_tracked_reactive() {
        let graph = Graph::new();
        let presence = ChangeInput::<MapState<&'static str, ()>, MappingOps<&'static str, (), PrimitiveOps<()>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), presence.changes(), FnvHashMap::default());

        let first = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
        let first_changes = first.changes();
        let second = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
        let second_changes = second.changes();
        let use_second = Rc::new(Cell::new(false));
        let use_second_for_f = use_second.clone();

        let flattened = sequence_map(&graph, &source, move |g, _key: &&'static str| {
            if use_second_for_f.get() {
                Reactive::new(g, PrimitiveOps::new(), second_changes.clone(), 2)
            } else {
                Reactive::new(g, PrimitiveOps::new(), first_changes.clone(), 1)
            }
        });

        presence.push_command(MappingCmd(vec![MappingOp::Add { key: "a", value: () }]));
        graph.step();
        assert_eq!(flattened.snapshot().get("a"), Some(&1));

        use_second.set(true);
        presence.push_command(MappingCmd(vec![MappingOp::Update { key: "a", cmd: PrimitiveCmd::Replace(()) }]));
        graph.step();
        assert_eq!(flattened.snapshot().get("a"), Some(&2));

        first.push_command(PrimitiveCmd::Replace(11));
        graph.step();
        assert_eq!(flattened.snapshot().get("a"), Some(&2), "old reactive should no longer be tracked after rebind");
    }
}
