//! `decompose_list` / `compose_list` (spec §4.3.3): stable identity
//! assignment over a sequence, and its inverse.
//!
//! `decompose_list` turns a `Reactive<sequence<T>>` into a pair — an id
//! sequence and an id-keyed map of values — minting a fresh [`Id`] per
//! insertion and keeping it stable across updates and moves. `compose_list`
//! reassembles the pair into a sequence, taking care not to double-apply an
//! update addressed to an id that was *also* inserted in the same batch
//! (§8's round-trip scenario 4).

use fnv::FnvHashMap;

use crate::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};
use crate::command::sequence::{SequenceCmd, SequenceOp, SequenceOps};
use crate::command::{Id, IdGen, Operations};
use crate::reactive::Reactive;
use crate::scheduler::Graph;

type IdSeqOps = SequenceOps<Id, PrimitiveOps<Id>>;
type IdSeqCmd = SequenceCmd<Id, PrimitiveCmd<Id>>;

/// Splits a reactive sequence into a reactive id-sequence and a reactive
/// id-keyed map of the original values.
///
/// `value_ops` is the element's own operations witness, needed because the
/// map side carries `Cmd(T)` payloads for `update`.
pub fn decompose_list<T, VOps>(
    graph: &Graph,
    source: &Reactive<Vec<T>, SequenceOps<T, VOps>>,
    value_ops: VOps,
) -> (Reactive<Vec<Id>, IdSeqOps>, Reactive<MapState<Id, T>, MappingOps<Id, T, VOps>>)
where
    T: Clone + std::fmt::Debug + PartialEq + 'static,
    VOps: Operations<T> + 'static,
    VOps::Cmd: PartialEq,
{
    let id_gen = IdGen::new();
    let mut ids: Vec<Id> = Vec::new();

    let combined = graph.map(&source.changes, move |cmd: &SequenceCmd<T, VOps::Cmd>| {
        decompose_batch(cmd, &id_gen, &mut ids)
    });

    let id_cmd_node = graph.map(&combined, |pair: &(IdSeqCmd, MappingCmd<Id, T, VOps::Cmd>)| pair.0.clone());
    let map_cmd_node = graph.map(&combined, |pair: &(IdSeqCmd, MappingCmd<Id, T, VOps::Cmd>)| pair.1.clone());

    let id_sequence = Reactive::new(graph, SequenceOps::new(PrimitiveOps::new()), id_cmd_node, Vec::new());
    let id_map = Reactive::new(graph, MappingOps::new(value_ops), map_cmd_node, FnvHashMap::default());

    (id_sequence, id_map)
}

/// Translates one batch of sequence commands into the parallel (id-sequence,
/// id-map) command pair, mutating the running `ids` positional index as it
/// goes so `update`/`remove`/`move` can resolve the id currently at a given
/// position — including ids minted by an earlier `insert` in this same
/// batch.
fn decompose_batch<T: Clone, C>(
    cmd: &SequenceCmd<T, C>,
    id_gen: &IdGen,
    ids: &mut Vec<Id>,
) -> (IdSeqCmd, MappingCmd<Id, T, C>) {
    let mut seq_out = Vec::new();
    let mut map_out = Vec::new();

    for op in &cmd.0 {
        match op {
            SequenceOp::Insert { at, value } => {
                let id = id_gen.next();
                ids.insert(*at, id);
                seq_out.push(SequenceOp::Insert { at: *at, value: id });
                map_out.push(MappingOp::Add { key: id, value: value.clone() });
            }
            SequenceOp::Update { at, cmd } => {
                if let Some(&id) = ids.get(*at) {
                    map_out.push(MappingOp::Update { key: id, cmd: cmd.clone() });
                }
            }
            SequenceOp::Remove { at } => {
                if *at < ids.len() {
                    let id = ids.remove(*at);
                    seq_out.push(SequenceOp::Remove { at: *at });
                    map_out.push(MappingOp::Delete { key: id });
                }
            }
            SequenceOp::Move { from, to } => {
                if *from < ids.len() {
                    let id = ids.remove(*from);
                    ids.insert((*to).min(ids.len()), id);
                    seq_out.push(SequenceOp::Move { from: *from, to: *to });
                }
            }
            SequenceOp::Clear => {
                ids.clear();
                seq_out.push(SequenceOp::Clear);
                map_out.push(MappingOp::Clear);
            }
        }
    }

    (SequenceCmd(seq_out), MappingCmd(map_out))
}

/// Reassembles a decomposed reactive sequence from its id-sequence and
/// id-keyed value map.
pub fn compose_list<T, VOps>(
    graph: &Graph,
    id_sequence: &Reactive<Vec<Id>, IdSeqOps>,
    id_map: &Reactive<MapState<Id, T>, MappingOps<Id, T, VOps>>,
) -> Reactive<Vec<T>, SequenceOps<T, VOps>>
where
    T: Clone + std::fmt::Debug + PartialEq + 'static,
    VOps: Operations<T> + 'static,
    VOps::Cmd: PartialEq,
{
    let seq_ops = SequenceOps::new(id_map.operations.value.clone());

    let ids_seq_changes = id_sequence.changes.clone();
    let map_changes = id_map.changes.clone();
    let ids_before = id_sequence.materialized.clone();

    let combined = graph.zip3(&ids_seq_changes, &map_changes, &ids_before, move |seq_cmd, map_cmd, ids_before| {
        compose_batch(seq_cmd, map_cmd, ids_before)
    });

    Reactive::new(graph, seq_ops, combined, Vec::new())
}

/// Builds one output batch for `compose_list`: structural commands from the
/// id-sequence drive `insert`/`remove`/`move`/`clear`; map `update`
/// commands become `update(i, cmd)` by looking up the id's current
/// position — except for ids inserted in this very batch, whose `add` in
/// the map already carries the post-batch value, so an update for that id
/// is never re-applied on top of it (spec §4.3.3, §8 scenario 4).
fn compose_batch<T: Clone, C>(
    seq_cmd: &IdSeqCmd,
    map_cmd: &MappingCmd<Id, T, C>,
    ids_before: &[Id],
) -> SequenceCmd<T, C> {
    let mut positions: Vec<Id> = ids_before.to_vec();
    let mut inserted_this_batch: FnvHashMap<Id, ()> = FnvHashMap::default();
    let mut out = Vec::new();

    let added_values: FnvHashMap<Id, T> = map_cmd
        .0
        .iter()
        .filter_map(|op| match op {
            MappingOp::Add { key, value } => Some((*key, value.clone())),
            _ => None,
        })
        .collect();

    for op in &seq_cmd.0 {
        match op {
            SequenceOp::Insert { at, value: id } => {
                positions.insert(*at, *id);
                inserted_this_batch.insert(*id, ());
                if let Some(value) = added_values.get(id) {
                    out.push(SequenceOp::Insert { at: *at, value: value.clone() });
                }
            }
            SequenceOp::Remove { at } => {
                if *at < positions.len() {
                    positions.remove(*at);
                    out.push(SequenceOp::Remove { at: *at });
                }
            }
            SequenceOp::Move { from, to } => {
                if *from < positions.len() {
                    let id = positions.remove(*from);
                    positions.insert((*to).min(positions.len()), id);
                    out.push(SequenceOp::Move { from: *from, to: *to });
                }
            }
            SequenceOp::Update { .. } => {}
            SequenceOp::Clear => {
                positions.clear();
                out.push(SequenceOp::Clear);
            }
        }
    }

    for op in &map_cmd.0 {
        if let MappingOp::Update { key, cmd } = op {
            if inserted_this_batch.contains_key(key) {
                continue;
            }
            if let Some(at) = positions.iter().position(|id| id == key) {
                out.push(SequenceOp::Update { at, cmd: cmd.clone() });
            }
        }
    }

    SequenceCmd(out)
}
