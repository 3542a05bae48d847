//! The command algebra instance for an unordered mapping with unique keys
//! (spec §3.1: "Mapping from `K` to `V`").
//!
//! Mapping commands carry no relative ordering constraint except that
//! `Add(k, _)` must not be emitted for a key already present in the
//! pre-batch snapshot (spec §3.2, §4.1). A batch containing `Delete(k)`
//! followed later by `Add(k, v)` nets out to replacement.

use std::hash::Hash;

use fnv::FnvHashMap;

use super::Operations;

/// One edit to a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOp<K, V, C> {
    /// Insert `value` under `key`. `key` must be absent in the pre-step
    /// snapshot as observed by the producer (spec §3.2); checked with
    /// `debug_assert!` by [`MappingOps::apply`].
    Add { key: K, value: V },
    /// Apply an element-level command to the value currently under `key`.
    Update { key: K, cmd: C },
    /// Remove the entry under `key`, if present.
    Delete { key: K },
    /// Discard all entries.
    Clear,
}

/// A batch of [`MappingOp`]s, applied in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingCmd<K, V, C>(pub Vec<MappingOp<K, V, C>>);

impl<K, V, C> MappingCmd<K, V, C> {
    /// The empty batch.
    pub fn empty() -> Self {
        MappingCmd(Vec::new())
    }

    /// A batch containing a single op.
    pub fn single(op: MappingOp<K, V, C>) -> Self {
        MappingCmd(vec![op])
    }

    /// True if this batch has no ops.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A mapping state: keys unique, unordered. Backed by an `fnv`-hashed map,
/// matching the teacher's pervasive use of `fnv` for key hashing
/// (`hashable.rs`).
pub type MapState<K, V> = FnvHashMap<K, V>;

/// The operations witness for a mapping from `K` to `V`, parameterized by
/// the value-level witness `VOps`.
#[derive(Debug, Clone)]
pub struct MappingOps<K, V, VOps: Operations<V>> {
    /// The witness for the value type, threaded through `Update`.
    pub value: VOps,
    _marker: std::marker::PhantomData<(K, V)>,
}

impl<K, V, VOps: Operations<V>> MappingOps<K, V, VOps> {
    /// Creates a mapping witness wrapping a value witness.
    pub fn new(value: VOps) -> Self {
        MappingOps { value, _marker: std::marker::PhantomData }
    }
}

impl<K, V, VOps> Operations<MapState<K, V>> for MappingOps<K, V, VOps>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
    V: Clone + std::fmt::Debug,
    VOps: Operations<V>,
{
    type Cmd = MappingCmd<K, V, VOps::Cmd>;

    fn apply(&self, state: &MapState<K, V>, cmd: &Self::Cmd) -> MapState<K, V> {
        let mut out = state.clone();
        for op in &cmd.0 {
            match op {
                MappingOp::Add { key, value } => {
                    debug_assert!(
                        !out.contains_key(key),
                        "add() for key {:?} already present in the pre-step snapshot",
                        key
                    );
                    out.insert(key.clone(), value.clone());
                }
                MappingOp::Update { key, cmd } => {
                    if let Some(existing) = out.get(key) {
                        let updated = self.value.apply(existing, cmd);
                        out.insert(key.clone(), updated);
                    }
                    // An update addressed to an absent key is dropped
                    // (spec §4.3.4: "presence is tracked so that updates
                    // addressed to an absent key are dropped").
                }
                MappingOp::Delete { key } => { out.remove(key); }
                MappingOp::Clear => out.clear(),
            }
        }
        out
    }

    fn merge(&self, mut first: Self::Cmd, mut second: Self::Cmd) -> Self::Cmd {
        first.0.append(&mut second.0);
        first
    }

    fn empty(&self) -> Self::Cmd {
        MappingCmd::empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, _current: &MapState<K, V>, target: &MapState<K, V>) -> Self::Cmd {
        let mut ops = vec![MappingOp::Clear];
        ops.extend(target.iter().map(|(k, v)| MappingOp::Add { key: k.clone(), value: v.clone() }));
        MappingCmd(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::primitive::PrimitiveOps;

    fn ops() -> MappingOps<&'static str, i32, PrimitiveOps<i32>> {
        MappingOps::new(PrimitiveOps::new())
    }

    #[test]
    fn delete_then_add_nets_to_replacement() {
        let ops = ops();
        let mut s0 = MapState::default();
        s0.insert("a", 1);
        let cmd = MappingCmd(vec![
            MappingOp::Delete { key: "a" },
            MappingOp::Add { key: "a", value: 2 },
        ]);
        let s1 = ops.apply(&s0, &cmd);
        assert_eq!(s1.get("a"), Some(&2));
    }

    #[test]
    fn update_to_absent_key_is_dropped() {
        let ops = ops();
        let s0 = MapState::default();
        let cmd = MappingCmd::single(MappingOp::Update {
            key: "missing",
            cmd: crate::command::primitive::PrimitiveCmd::Replace(9),
        });
        let s1 = ops.apply(&s0, &cmd);
        assert!(s1.is_empty());
    }

    #[test]
    fn merge_then_apply_equals_sequential_apply() {
        let ops = ops();
        let mut s0 = MapState::default();
        s0.insert("a", 1);
        let c1 = MappingCmd::single(MappingOp::Add { key: "b", value: 2 });
        let c2 = MappingCmd::single(MappingOp::Delete { key: "a" });
        let merged = ops.merge(c1.clone(), c2.clone());
        let sequential = ops.apply(&ops.apply(&s0, &c1), &c2);
        assert_eq!(ops.apply(&s0, &merged), sequential);
    }
}
