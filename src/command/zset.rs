//! The command algebra instance for a weighted multiset of `T` with signed
//! integer weights (spec §3.1: "Z-set of `T`"), one instance of the command
//! algebra in its own right (spec §1).
//!
//! A Z-set's only command shape is "another Z-set to union" (spec §3.1's
//! container table); there is no `clear` primitive. Entries with weight `0`
//! are absent, never materialized with a stored zero (spec §3.2's weight
//! normalization invariant).

use std::hash::Hash;

use fnv::FnvHashMap;

use super::Operations;

/// A weighted multiset: each distinct value maps to a non-zero signed
/// weight. Weight-`0` entries are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZSet<T: Eq + Hash>(FnvHashMap<T, i64>);

impl<T: Eq + Hash> Default for ZSet<T> {
    fn default() -> Self {
        ZSet(FnvHashMap::default())
    }
}

impl<T: Clone + Eq + Hash> ZSet<T> {
    /// The empty Z-set.
    pub fn empty() -> Self {
        ZSet::default()
    }

    /// A Z-set with a single `(value, weight)` entry, or empty if `weight`
    /// is `0`.
    pub fn singleton(value: T, weight: i64) -> Self {
        let mut set = ZSet::default();
        if weight != 0 {
            set.0.insert(value, weight);
        }
        set
    }

    /// The weight of `value` (`0` if absent).
    pub fn weight(&self, value: &T) -> i64 {
        self.0.get(value).copied().unwrap_or(0)
    }

    /// Iterates the Z-set's non-zero `(value, weight)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&T, i64)> {
        self.0.iter().map(|(v, w)| (v, *w))
    }

    /// The number of distinct non-zero entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no non-zero entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unions `other` into `self`, summing weights and dropping any entry
    /// whose accumulated weight reaches `0`.
    pub fn union_in_place(&mut self, other: &ZSet<T>) {
        for (value, weight) in other.0.iter() {
            let entry = self.0.entry(value.clone()).or_insert(0);
            *entry += weight;
            if *entry == 0 {
                self.0.remove(value);
            }
        }
    }

    /// Returns the union of `self` and `other`, consolidating weights.
    pub fn union(&self, other: &ZSet<T>) -> ZSet<T> {
        let mut out = self.clone();
        out.union_in_place(other);
        out
    }

    /// Returns `self` with every weight negated — the Z-set one unions in
    /// to cancel `self` out entirely.
    pub fn negate(&self) -> ZSet<T> {
        ZSet(self.0.iter().map(|(v, w)| (v.clone(), -w)).collect())
    }
}

impl<T: Clone + Eq + Hash> FromIterator<(T, i64)> for ZSet<T> {
    fn from_iter<I: IntoIterator<Item = (T, i64)>>(iter: I) -> Self {
        let mut set = ZSet::default();
        for (value, weight) in iter {
            set.union_in_place(&ZSet::singleton(value, weight));
        }
        set
    }
}

/// The operations witness for a Z-set of `T`.
#[derive(Debug, Clone, Default)]
pub struct ZSetOps<T>(std::marker::PhantomData<T>);

impl<T> ZSetOps<T> {
    /// Creates the witness.
    pub fn new() -> Self {
        ZSetOps(std::marker::PhantomData)
    }
}

impl<T: Clone + Eq + Hash + std::fmt::Debug> Operations<ZSet<T>> for ZSetOps<T> {
    type Cmd = ZSet<T>;

    fn apply(&self, state: &ZSet<T>, cmd: &Self::Cmd) -> ZSet<T> {
        state.union(cmd)
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        first.union(&second)
    }

    fn empty(&self) -> Self::Cmd {
        ZSet::empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, current: &ZSet<T>, target: &ZSet<T>) -> Self::Cmd {
        // "difference from current, union with target" (spec §4.1).
        current.negate().union(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_drops_zero_weights() {
        let mut a = ZSet::singleton("x", 3);
        a.union_in_place(&ZSet::singleton("x", -3));
        assert!(a.is_empty());
    }

    #[test]
    fn replace_brings_any_current_to_target() {
        let ops = ZSetOps::<&str>::new();
        let current = ZSet::from_iter([("a", 2), ("b", 1)]);
        let target = ZSet::from_iter([("b", 5), ("c", 1)]);
        let cmd = ops.replace(&current, &target);
        assert_eq!(ops.apply(&current, &cmd), target);
    }

    #[test]
    fn merge_then_apply_equals_sequential_apply() {
        let ops = ZSetOps::<&str>::new();
        let s0 = ZSet::singleton("a", 1);
        let c1 = ZSet::singleton("b", 2);
        let c2 = ZSet::singleton("a", -1);
        let merged = ops.merge(c1.clone(), c2.clone());
        let sequential = ops.apply(&ops.apply(&s0, &c1), &c2);
        assert_eq!(ops.apply(&s0, &merged), sequential);
    }
}
