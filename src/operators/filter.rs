//! `filter_list` (spec §4.3.5): keeps only the elements for which a
//! per-element predicate reactive currently reads `true`, preserving source
//! order and translating source positions to destination positions through
//! a tree keyed by the decomposed element identity.
//!
//! Built on [`crate::operators::decompose::decompose_list`] for stable
//! per-element identity and [`crate::operators::map::map_map`] for the
//! predicate's once-per-identity derivation — the same "ensure substreams
//! exist, then assemble" shape `map_map` uses, so `filter_list` inherits its
//! height-ordering guarantee for free rather than re-deriving it.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::command::mapping::{MapState, MappingOp};
use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};
use crate::command::sequence::{SequenceCmd, SequenceOp, SequenceOps};
use crate::command::{Id, Operations};
use crate::operators::decompose::decompose_list;
use crate::operators::map::map_map;
use crate::reactive::Reactive;
use crate::scheduler::{Graph, Node};
use crate::tree::{Summary, Tree};

/// Per-leaf summary: how many elements precede a position (`total`) and how
/// many of those are currently selected (`selected`). `selected` is exactly
/// the destination index of the next selected element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SelectionSummary {
    total: usize,
    selected: usize,
}

impl Summary for SelectionSummary {
    fn identity() -> Self {
        SelectionSummary { total: 0, selected: 0 }
    }

    fn combine(&self, other: &Self) -> Self {
        SelectionSummary { total: self.total + other.total, selected: self.selected + other.selected }
    }
}

fn summarize_selected(selected: &bool) -> SelectionSummary {
    SelectionSummary { total: 1, selected: if *selected { 1 } else { 0 } }
}

/// Keeps only the elements of `source` for which `predicate` currently holds
/// `true`, in source order.
///
/// `predicate` is invoked once per element identity (not once per batch),
/// exactly like `map_map`'s `f`; it returns a `Reactive<bool, _>` that may
/// itself depend on other reactive state.
pub fn filter_list<X, XOps, P>(
    graph: &Graph,
    source: &Reactive<Vec<X>, SequenceOps<X, XOps>>,
    value_ops: XOps,
    predicate: P,
) -> Reactive<Vec<X>, SequenceOps<X, XOps>>
where
    X: Clone + Debug + PartialEq + 'static,
    XOps: Operations<X> + Clone + 'static,
    XOps::Cmd: PartialEq,
    P: FnMut(&Graph, &Reactive<X, XOps>) -> Reactive<bool, PrimitiveOps<bool>> + 'static,
{
    let (id_sequence, id_map) = decompose_list(graph, source, value_ops.clone());
    let predicate_map = map_map(graph, &id_map, value_ops.clone(), predicate);

    let tree: Rc<RefCell<Tree<bool, SelectionSummary>>> = Rc::new(RefCell::new(Tree::new(summarize_selected)));

    let id_seq_changes = id_sequence.changes.clone();
    let id_map_changes = id_map.changes.clone();
    let pred_changes = predicate_map.changes.clone();
    let id_map_materialized = id_map.materialized.clone();

    let id_seq_for_height = id_seq_changes.clone();
    let id_map_for_height = id_map_changes.clone();
    let pred_for_height = pred_changes.clone();
    let id_map_mat_for_height = id_map_materialized.clone();

    let self_handle: Rc<RefCell<Option<Node<SequenceCmd<X, XOps::Cmd>>>>> = Rc::new(RefCell::new(None));
    let self_in_combined = self_handle.clone();
    let tree_in_combined = tree.clone();

    let combined = graph.zip4(&id_seq_changes, &id_map_changes, &pred_changes, &id_map_materialized, move |seq_cmd, map_cmd, pred_cmd, values| {
        if let Some(me) = self_in_combined.borrow().as_ref() {
            me.raise_height_above(id_seq_for_height.height());
            me.raise_height_above(id_map_for_height.height());
            me.raise_height_above(pred_for_height.height());
            me.raise_height_above(id_map_mat_for_height.height());
        }
        build_filter_batch(seq_cmd, map_cmd, pred_cmd, values, &mut tree_in_combined.borrow_mut())
    });

    *self_handle.borrow_mut() = Some(combined.clone());

    Reactive::new(graph, SequenceOps::new(value_ops), combined, Vec::new())
}

fn build_filter_batch<X, C>(
    seq_cmd: &SequenceCmd<Id, PrimitiveCmd<Id>>,
    map_cmd: &crate::command::mapping::MappingCmd<Id, X, C>,
    pred_cmd: &crate::command::mapping::MappingCmd<Id, bool, PrimitiveCmd<bool>>,
    values: &MapState<Id, X>,
    tree: &mut Tree<bool, SelectionSummary>,
) -> SequenceCmd<X, C>
where
    X: Clone,
    C: Clone,
{
    let mut out = Vec::new();

    let added_values: FnvHashMap<Id, X> = map_cmd
        .0
        .iter()
        .filter_map(|op| match op {
            MappingOp::Add { key, value } => Some((*key, value.clone())),
            _ => None,
        })
        .collect();

    let initial_selection: FnvHashMap<Id, bool> = pred_cmd
        .0
        .iter()
        .filter_map(|op| match op {
            MappingOp::Add { key, value } => Some((*key, *value)),
            _ => None,
        })
        .collect();

    let mut inserted_this_batch: FnvHashMap<Id, ()> = FnvHashMap::default();

    for op in &seq_cmd.0 {
        match op {
            SequenceOp::Insert { at, value: id } => {
                inserted_this_batch.insert(*id, ());
                let selected = initial_selection.get(id).copied().unwrap_or(false);
                tree.insert(*id, selected, |prefix: &SelectionSummary| prefix.total >= *at);
                if selected {
                    if let Some(value) = added_values.get(id).or_else(|| values.get(id)) {
                        let dest = tree.prefix_summary_by_id(*id).map(|s| s.selected).unwrap_or(0);
                        out.push(SequenceOp::Insert { at: dest, value: value.clone() });
                    }
                }
            }
            SequenceOp::Remove { at } => {
                if let Some(id) = tree.find_by_threshold(|s: &SelectionSummary| s.total > *at) {
                    let prefix = tree.prefix_summary_by_id(id).unwrap_or_else(SelectionSummary::identity);
                    if let Some(true) = tree.remove(id) {
                        out.push(SequenceOp::Remove { at: prefix.selected });
                    }
                }
            }
            SequenceOp::Move { from, to } => {
                if let Some(id) = tree.find_by_threshold(|s: &SelectionSummary| s.total > *from) {
                    let old_prefix = tree.prefix_summary_by_id(id).unwrap_or_else(SelectionSummary::identity);
                    if let Some(selected) = tree.remove(id) {
                        tree.insert(id, selected, |prefix: &SelectionSummary| prefix.total >= *to);
                        if selected {
                            let new_prefix = tree.prefix_summary_by_id(id).unwrap_or_else(SelectionSummary::identity);
                            if new_prefix.selected != old_prefix.selected {
                                out.push(SequenceOp::Move { from: old_prefix.selected, to: new_prefix.selected });
                            }
                        }
                    }
                }
            }
            SequenceOp::Update { .. } => {}
            SequenceOp::Clear => {
                *tree = Tree::new(summarize_selected);
                out.push(SequenceOp::Clear);
            }
        }
    }

    for op in &pred_cmd.0 {
        if let MappingOp::Update { key: id, cmd: PrimitiveCmd::Replace(new_selected) } = op {
            if inserted_this_batch.contains_key(id) {
                continue;
            }
            if let Some(old_selected) = tree.update(*id, *new_selected) {
                if old_selected == *new_selected {
                    continue;
                }
                let prefix = tree.prefix_summary_by_id(*id).unwrap_or_else(SelectionSummary::identity);
                if *new_selected {
                    if let Some(value) = values.get(id) {
                        out.push(SequenceOp::Insert { at: prefix.selected, value: value.clone() });
                    }
                } else {
                    out.push(SequenceOp::Remove { at: prefix.selected });
                }
            }
        }
    }

    for op in &map_cmd.0 {
        if let MappingOp::Update { key: id, cmd } = op {
            if inserted_this_batch.contains_key(id) {
                continue;
            }
            if tree.peek(*id) == Some(true) {
                let prefix = tree.prefix_summary_by_id(*id).unwrap_or_else(SelectionSummary::identity);
                out.push(SequenceOp::Update { at: prefix.selected, cmd: cmd.clone() });
            }
        }
    }

    SequenceCmd(out)
}
