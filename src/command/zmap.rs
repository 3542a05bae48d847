//! The command algebra instance for a weighted mapping from `K` to a Z-set
//! of `V` (spec §3.1: "Z-map from `K` to Z-set of `V`"), built directly on
//! [`ZSet`].
//!
//! A Z-map row that reduces to an empty Z-set is absent, never stored
//! (spec §3.2's weight normalization invariant extended to rows).

use std::hash::Hash;

use fnv::FnvHashMap;

use super::zset::ZSet;
use super::Operations;

/// A weighted mapping from `K` to a Z-set of `V`. Rows whose Z-set is empty
/// are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZMap<K: Eq + Hash, V: Eq + Hash>(FnvHashMap<K, ZSet<V>>);

impl<K: Eq + Hash, V: Eq + Hash> Default for ZMap<K, V> {
    fn default() -> Self {
        ZMap(FnvHashMap::default())
    }
}

impl<K: Clone + Eq + Hash, V: Clone + Eq + Hash> ZMap<K, V> {
    /// The empty Z-map.
    pub fn empty() -> Self {
        ZMap::default()
    }

    /// A Z-map with a single non-empty row.
    pub fn singleton_row(key: K, row: ZSet<V>) -> Self {
        let mut map = ZMap::default();
        if !row.is_empty() {
            map.0.insert(key, row);
        }
        map
    }

    /// The Z-set currently stored under `key` (empty if absent).
    pub fn row(&self, key: &K) -> ZSet<V> {
        self.0.get(key).cloned().unwrap_or_default()
    }

    /// Iterates the Z-map's non-empty rows.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &ZSet<V>)> {
        self.0.iter()
    }

    /// True if there are no non-empty rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unions `other`'s rows into `self`, row by row, dropping any row that
    /// reduces to empty.
    pub fn union_in_place(&mut self, other: &ZMap<K, V>) {
        for (key, row) in other.0.iter() {
            let merged = self.row(key).union(row);
            if merged.is_empty() {
                self.0.remove(key);
            } else {
                self.0.insert(key.clone(), merged);
            }
        }
    }

    /// Returns the union of `self` and `other`.
    pub fn union(&self, other: &ZMap<K, V>) -> ZMap<K, V> {
        let mut out = self.clone();
        out.union_in_place(other);
        out
    }

    /// Returns `self` with every row's weights negated.
    pub fn negate(&self) -> ZMap<K, V> {
        ZMap(self.0.iter().map(|(k, row)| (k.clone(), row.negate())).collect())
    }
}

/// The operations witness for a Z-map from `K` to a Z-set of `V`.
#[derive(Debug, Clone, Default)]
pub struct ZMapOps<K, V>(std::marker::PhantomData<(K, V)>);

impl<K, V> ZMapOps<K, V> {
    /// Creates the witness.
    pub fn new() -> Self {
        ZMapOps(std::marker::PhantomData)
    }
}

impl<K, V> Operations<ZMap<K, V>> for ZMapOps<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
    V: Clone + Eq + Hash + std::fmt::Debug,
{
    type Cmd = ZMap<K, V>;

    fn apply(&self, state: &ZMap<K, V>, cmd: &Self::Cmd) -> ZMap<K, V> {
        state.union(cmd)
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        first.union(&second)
    }

    fn empty(&self) -> Self::Cmd {
        ZMap::empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, current: &ZMap<K, V>, target: &ZMap<K, V>) -> Self::Cmd {
        current.negate().union(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_row_after_union_is_dropped() {
        let mut m = ZMap::singleton_row("k", ZSet::singleton("v", 1));
        m.union_in_place(&ZMap::singleton_row("k", ZSet::singleton("v", -1)));
        assert!(m.is_empty());
    }

    #[test]
    fn replace_brings_any_current_to_target() {
        let ops = ZMapOps::<&str, &str>::new();
        let current = ZMap::singleton_row("k", ZSet::singleton("a", 1));
        let target = ZMap::singleton_row("k", ZSet::singleton("b", 2));
        let cmd = ops.replace(&current, &target);
        assert_eq!(ops.apply(&current, &cmd), target);
    }
}
