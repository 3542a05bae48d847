//! `group_by_map` / `group_by_list` (spec §4.3.6): partitions a mapping or
//! sequence into a mapping from group key to the subset sharing that key.
//! `key_fn` is invoked once per element-identity, exactly like `map_map`'s
//! `f` — this module's "ensure"/"assemble" split is the same shape as
//! [`crate::operators::map::map_map`], generalized so `assemble` also tracks
//! group membership and the empty/non-empty, same-group/moved-group
//! transitions spec §4.3.6 calls for.
//!
//! `group_by_list` is built on `group_by_map` over the id-keyed map that
//! [`crate::operators::decompose::decompose_list`] produces: each group's
//! member-id map is then re-ordered into a `Vec<X>` following the original
//! source order, via [`project_ordered`], which tracks each element's
//! global position through a plain mirrored `Vec<Id>` rather than a second
//! summarized tree — per-group member counts are small relative to the
//! collection, and a second tree keyed on a *subset* of ids would need a
//! variable-shape summary the fixed `Summary` trait doesn't model cleanly.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use crate::command::primitive::PrimitiveOps;
use crate::command::sequence::{SequenceCmd, SequenceOp, SequenceOps};
use crate::command::{Id, LateBoundOps, Operations};
use crate::operators::decompose::decompose_list;
use crate::operators::map::map_map;
use crate::reactive::Reactive;
use crate::scheduler::{Graph, Node};

struct GroupEntry<V, VOps: Operations<V>, G> {
    #[allow(dead_code)] // kept alive so its substreams keep stepping; never read directly.
    v: Reactive<V, VOps>,
    group_reactive: Reactive<G, PrimitiveOps<G>>,
    current_group: RefCell<G>,
}

type Cache<K, V, VOps, G> = Rc<RefCell<FnvHashMap<K, GroupEntry<V, VOps, G>>>>;
type Members<G, K> = FnvHashMap<G, FnvHashMap<K, ()>>;

/// Removes `key` from `group`'s member set, emitting an outer `delete` if
/// the group becomes empty or an outer `update(group, inner delete)`
/// otherwise.
fn remove_member<K, V, G, C>(members: &mut Members<G, K>, group: &G, key: &K, out: &mut Vec<MappingOp<G, MapState<K, V>, MappingCmd<K, V, C>>>)
where
    K: Clone + Eq + Hash,
    G: Clone + Eq + Hash,
{
    let Some(group_members) = members.get_mut(group) else { return };
    group_members.remove(key);
    if group_members.is_empty() {
        members.remove(group);
        out.push(MappingOp::Delete { key: group.clone() });
    } else {
        out.push(MappingOp::Update { key: group.clone(), cmd: MappingCmd(vec![MappingOp::Delete { key: key.clone() }]) });
    }
}

/// Partitions `source`'s entries into a mapping from group key (computed by
/// `key_fn`, invoked once per key) to the sub-mapping of entries sharing it.
pub fn group_by_map<K, V, VOps, G, F>(
    graph: &Graph,
    source: &Reactive<MapState<K, V>, MappingOps<K, V, VOps>>,
    value_ops: VOps,
    mut key_fn: F,
) -> Reactive<MapState<G, MapState<K, V>>, MappingOps<G, MapState<K, V>, MappingOps<K, V, VOps>>>
where
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + Debug + PartialEq + 'static,
    VOps: Operations<V> + Clone + 'static,
    VOps::Cmd: PartialEq,
    G: Clone + Eq + Hash + Debug + 'static,
    F: FnMut(&Graph, &Reactive<V, VOps>) -> Reactive<G, PrimitiveOps<G>> + 'static,
{
    let cache: Cache<K, V, VOps, G> = Rc::new(RefCell::new(FnvHashMap::default()));
    let members: Rc<RefCell<Members<G, K>>> = Rc::new(RefCell::new(FnvHashMap::default()));

    let pending_child_height = Rc::new(Cell::new(0usize));
    type AssembleCmd<K, V, VOps, G> = MappingCmd<G, MapState<K, V>, MappingCmd<K, V, <VOps as Operations<V>>::Cmd>>;
    let assemble_handle: Rc<RefCell<Option<Node<AssembleCmd<K, V, VOps, G>>>>> = Rc::new(RefCell::new(None));

    let result_value_ops = value_ops.clone();

    let graph_in_ensure = graph.clone();
    let source_changes = source.changes.clone();
    let cache_in_ensure = cache.clone();
    let pending_in_ensure = pending_child_height.clone();
    let assemble_in_ensure = assemble_handle.clone();

    let ensure = graph.map(&source.changes, move |cmd: &MappingCmd<K, V, VOps::Cmd>| {
        for op in &cmd.0 {
            if let MappingOp::Add { key, value } = op {
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
                let group_reactive = key_fn(&graph_in_ensure, &v_reactive);

                let child_height = group_reactive.materialized.height().max(group_reactive.changes.height());
                pending_in_ensure.set(pending_in_ensure.get().max(child_height));
                if let Some(assemble_node) = assemble_in_ensure.borrow().as_ref() {
                    assemble_node.raise_height_above(child_height);
                }

                let current_group = group_reactive.snapshot();
                cache_in_ensure
                    .borrow_mut()
                    .insert(key.clone(), GroupEntry { v: v_reactive, group_reactive, current_group: RefCell::new(current_group) });
            }
        }
        cmd.clone()
    });

    let cache_in_assemble = cache.clone();
    let members_in_assemble = members.clone();
    let assemble = graph.map(&ensure, move |cmd: &MappingCmd<K, V, VOps::Cmd>| {
        let mut out = Vec::new();
        let cache = cache_in_assemble.borrow();
        let mut members = members_in_assemble.borrow_mut();

        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, value } => {
                    let Some(entry) = cache.get(key) else { continue };
                    let group = entry.group_reactive.snapshot();
                    *entry.current_group.borrow_mut() = group.clone();
                    let group_members = members.entry(group.clone()).or_default();
                    let was_empty = group_members.is_empty();
                    group_members.insert(key.clone(), ());
                    if was_empty {
                        let mut inner = FnvHashMap::default();
                        inner.insert(key.clone(), value.clone());
                        out.push(MappingOp::Add { key: group, value: inner });
                    } else {
                        out.push(MappingOp::Update {
                            key: group,
                            cmd: MappingCmd(vec![MappingOp::Add { key: key.clone(), value: value.clone() }]),
                        });
                    }
                }
                MappingOp::Delete { key } => {
                    if let Some(entry) = cache.get(key) {
                        let group = entry.current_group.borrow().clone();
                        remove_member(&mut members, &group, key, &mut out);
                    }
                }
                MappingOp::Clear => {
                    out.push(MappingOp::Clear);
                    members.clear();
                }
                MappingOp::Update { key, cmd } => {
                    let Some(entry) = cache.get(key) else { continue };
                    let new_group = entry.group_reactive.snapshot();
                    let old_group = entry.current_group.borrow().clone();
                    if new_group != old_group {
                        *entry.current_group.borrow_mut() = new_group.clone();
                        remove_member(&mut members, &old_group, key, &mut out);
                        let value = entry.v.snapshot();
                        let group_members = members.entry(new_group.clone()).or_default();
                        let was_empty = group_members.is_empty();
                        group_members.insert(key.clone(), ());
                        if was_empty {
                            let mut inner = FnvHashMap::default();
                            inner.insert(key.clone(), value);
                            out.push(MappingOp::Add { key: new_group, value: inner });
                        } else {
                            out.push(MappingOp::Update {
                                key: new_group,
                                cmd: MappingCmd(vec![MappingOp::Add { key: key.clone(), value }]),
                            });
                        }
                    } else {
                        out.push(MappingOp::Update {
                            key: old_group,
                            cmd: MappingCmd(vec![MappingOp::Update { key: key.clone(), cmd: cmd.clone() }]),
                        });
                    }
                }
            }
        }
        drop(cache);
        MappingCmd(out)
    });

    *assemble_handle.borrow_mut() = Some(assemble.clone());
    assemble.raise_height_above(pending_child_height.get());

    Reactive::new(graph, MappingOps::new(MappingOps::new(result_value_ops)), assemble, FnvHashMap::default())
}

/// Re-orders a group's id-keyed member map into a `Vec<X>` following
/// `global_order`'s current sequence, tracking the group's own member order
/// in a small mirrored `Vec<Id>`.
fn project_ordered<X, VOps>(
    graph: &Graph,
    global_order: &Rc<RefCell<Vec<Id>>>,
    member_map: &Reactive<MapState<Id, X>, MappingOps<Id, X, VOps>>,
) -> Reactive<Vec<X>, SequenceOps<X, VOps>>
where
    X: Clone + Debug + PartialEq + 'static,
    VOps: Operations<X> + Clone + 'static,
    VOps::Cmd: PartialEq,
{
    let global_order = global_order.clone();
    let value_ops = member_map.operations.value.clone();
    let local_order: Rc<RefCell<Vec<Id>>> = Rc::new(RefCell::new(Vec::new()));

    let changes = graph.zip(&member_map.changes, &member_map.materialized, move |cmd: &MappingCmd<Id, X, VOps::Cmd>, values: &MapState<Id, X>| {
        build_group_sequence_batch(cmd, values, &global_order.borrow(), &mut local_order.borrow_mut())
    });

    Reactive::new(graph, SequenceOps::new(value_ops), changes, Vec::new())
}

fn build_group_sequence_batch<X: Clone, C: Clone>(
    cmd: &MappingCmd<Id, X, C>,
    values: &MapState<Id, X>,
    global_order: &[Id],
    local_order: &mut Vec<Id>,
) -> SequenceCmd<X, C> {
    let mut out = Vec::new();
    for op in &cmd.0 {
        match op {
            MappingOp::Add { key, value } => {
                let global_pos = global_order.iter().position(|id| id == key).unwrap_or(global_order.len());
                let dest = local_order.iter().filter(|id| global_order.iter().position(|g| g == *id).unwrap_or(usize::MAX) < global_pos).count();
                local_order.insert(dest, *key);
                out.push(SequenceOp::Insert { at: dest, value: value.clone() });
            }
            MappingOp::Delete { key } => {
                if let Some(dest) = local_order.iter().position(|id| id == key) {
                    local_order.remove(dest);
                    out.push(SequenceOp::Remove { at: dest });
                }
            }
            MappingOp::Update { key, cmd } => {
                if let Some(dest) = local_order.iter().position(|id| id == key) {
                    out.push(SequenceOp::Update { at: dest, cmd: cmd.clone() });
                } else if let Some(value) = values.get(key) {
                    // The key's own value reactive produced an update before
                    // this group ever saw an `Add` for it (construction-time
                    // eager recompute); treat it as the initial insert.
                    let global_pos = global_order.iter().position(|id| id == key).unwrap_or(global_order.len());
                    let dest = local_order
                        .iter()
                        .filter(|id| global_order.iter().position(|g| g == *id).unwrap_or(usize::MAX) < global_pos)
                        .count();
                    local_order.insert(dest, *key);
                    out.push(SequenceOp::Insert { at: dest, value: value.clone() });
                }
            }
            MappingOp::Clear => {
                local_order.clear();
                out.push(SequenceOp::Clear);
            }
        }
    }
    SequenceCmd(out)
}

fn apply_id_seq_to_vec(cmd: &SequenceCmd<Id, crate::command::primitive::PrimitiveCmd<Id>>, order: &mut Vec<Id>) {
    for op in &cmd.0 {
        match op {
            SequenceOp::Insert { at, value: id } => order.insert(*at, *id),
            SequenceOp::Remove { at } => {
                if *at < order.len() {
                    order.remove(*at);
                }
            }
            SequenceOp::Move { from, to } => {
                if *from < order.len() {
                    let id = order.remove(*from);
                    order.insert((*to).min(order.len()), id);
                }
            }
            SequenceOp::Update { .. } => {}
            SequenceOp::Clear => order.clear(),
        }
    }
}

/// Partitions `source`'s elements into a mapping from group key to the
/// sub-sequence of elements sharing it, in original source order.
pub fn group_by_list<X, XOps, G, F>(
    graph: &Graph,
    source: &Reactive<Vec<X>, SequenceOps<X, XOps>>,
    value_ops: XOps,
    key_fn: F,
) -> Reactive<MapState<G, Vec<X>>, MappingOps<G, Vec<X>, LateBoundOps<Vec<X>, SequenceOps<X, XOps>>>>
where
    X: Clone + Debug + PartialEq + 'static,
    XOps: Operations<X> + Clone + 'static,
    XOps::Cmd: PartialEq,
    G: Clone + Eq + Hash + Debug + 'static,
    F: FnMut(&Graph, &Reactive<X, XOps>) -> Reactive<G, PrimitiveOps<G>> + 'static,
{
    let (id_sequence, id_map) = decompose_list(graph, source, value_ops.clone());
    let grouped = group_by_map(graph, &id_map, value_ops.clone(), key_fn);

    let global_order: Rc<RefCell<Vec<Id>>> = Rc::new(RefCell::new(Vec::new()));
    let global_order_for_update = global_order.clone();
    // The scheduler's dependents lists hold only `Weak` references; this node
    // has no downstream reader of its own output, so it needs an explicit
    // strong holder. Captured below, it lives as long as the per-group
    // substreams do.
    let order_node = graph.map(&id_sequence.changes, move |cmd| {
        apply_id_seq_to_vec(cmd, &mut global_order_for_update.borrow_mut());
        cmd.clone()
    });

    map_map(graph, &grouped, MappingOps::new(value_ops), move |g, member_map| {
        let _keep_alive = &order_node;
        project_ordered(g, &global_order, member_map)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ChangeInput;

    #[test]
    fn group_by_map_partitions_by_parity() {
        let graph = Graph::new();
        let input = ChangeInput::<MapState<i32, i32>, MappingOps<i32, i32, PrimitiveOps<i32>>>::new(
            &graph,
            MappingOps::new(PrimitiveOps::new()),
        );
        let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), input.changes(), FnvHashMap::default());

        let grouped = group_by_map(&graph, &source, PrimitiveOps::<i32>::new(), |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
            let value = v.snapshot();
            let changes = g.map(&v.changes, |c: &crate::command::primitive::PrimitiveCmd<i32>| match c {
                crate::command::primitive::PrimitiveCmd::Replace(n) => crate::command::primitive::PrimitiveCmd::Replace(n % 2),
                crate::command::primitive::PrimitiveCmd::Empty => crate::command::primitive::PrimitiveCmd::Empty,
            });
            Reactive::new(g, PrimitiveOps::new(), changes, value % 2)
        });

        input.push_command(MappingCmd(vec![
            MappingOp::Add { key: 1, value: 10 },
            MappingOp::Add { key: 2, value: 11 },
            MappingOp::Add { key: 3, value: 12 },
        ]));
        graph.step();

        let snapshot = grouped.snapshot();
        assert_eq!(snapshot.get(&0).map(|m| m.len()), Some(2));
        assert_eq!(snapshot.get(&1).map(|m| m.len()), Some(1));
    }

    #[test]
    fn group_by_list_preserves_within_group_order_after_a_move() {
        // spec §8 scenario 2.
        let graph = Graph::new();
        let input = ChangeInput::<Vec<i32>, SequenceOps<i32, PrimitiveOps<i32>>>::new(&graph, SequenceOps::new(PrimitiveOps::new()));
        let source = Reactive::new(&graph, SequenceOps::new(PrimitiveOps::new()), input.changes(), Vec::new());

        let grouped = group_by_list(&graph, &source, PrimitiveOps::<i32>::new(), |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
            let value = v.snapshot();
            let changes = g.map(&v.changes, |c: &crate::command::primitive::PrimitiveCmd<i32>| match c {
                crate::command::primitive::PrimitiveCmd::Replace(n) => {
                    crate::command::primitive::PrimitiveCmd::Replace(if n % 2 == 0 { "even" } else { "odd" })
                }
                crate::command::primitive::PrimitiveCmd::Empty => crate::command::primitive::PrimitiveCmd::Empty,
            });
            Reactive::new(g, PrimitiveOps::new(), changes, if value % 2 == 0 { "even" } else { "odd" })
        });

        input.push_command(SequenceCmd(vec![
            SequenceOp::Insert { at: 0, value: 1 },
            SequenceOp::Insert { at: 1, value: 3 },
            SequenceOp::Insert { at: 2, value: 5 },
            SequenceOp::Insert { at: 3, value: 2 },
            SequenceOp::Insert { at: 4, value: 4 },
        ]));
        graph.step();
        assert_eq!(grouped.snapshot().get("odd"), Some(&vec![1, 3, 5]));
        assert_eq!(grouped.snapshot().get("even"), Some(&vec![2, 4]));

        input.push_command(SequenceCmd(vec![SequenceOp::Move { from: 2, to: 0 }]));
        graph.step();
        assert_eq!(grouped.snapshot().get("odd"), Some(&vec![5, 1, 3]));
        assert_eq!(grouped.snapshot().get("even"), Some(&vec![2, 4]));
    }
}
