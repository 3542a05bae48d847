//! The command algebra instance for an opaque, atomic primitive value
//! (spec §3.1: "Primitive `T`").

use super::Operations;

/// A command against a primitive value: either nothing, or a full
/// replacement.
///
/// `replace(None)` is distinct from `empty`: a primitive can meaningfully
/// hold `Option<T>` so that "cleared" and "unchanged" are both expressible,
/// matching spec §3.2's "empty ≠ null state" invariant at the leaf level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveCmd<T> {
    /// No change this step.
    Empty,
    /// Replace the current value.
    Replace(T),
}

impl<T: Clone + std::fmt::Debug> PrimitiveCmd<T> {
    /// True for [`PrimitiveCmd::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, PrimitiveCmd::Empty)
    }
}

/// The operations witness for a primitive container of `T`.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveOps<T>(std::marker::PhantomData<T>);

impl<T> PrimitiveOps<T> {
    /// Creates the witness. There is no per-`T` configuration; this exists
    /// so callers have a value to pass to `Reactive::new`.
    pub fn new() -> Self {
        PrimitiveOps(std::marker::PhantomData)
    }
}

impl<T: Clone + std::fmt::Debug> Operations<T> for PrimitiveOps<T> {
    type Cmd = PrimitiveCmd<T>;

    fn apply(&self, state: &T, cmd: &Self::Cmd) -> T {
        match cmd {
            PrimitiveCmd::Empty => state.clone(),
            PrimitiveCmd::Replace(v) => v.clone(),
        }
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        // Later command wins; an empty second leaves the first in place.
        match second {
            PrimitiveCmd::Empty => first,
            replace => replace,
        }
    }

    fn empty(&self) -> Self::Cmd {
        PrimitiveCmd::Empty
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, _current: &T, target: &T) -> Self::Cmd {
        PrimitiveCmd::Replace(target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_last_non_empty_replace() {
        let ops = PrimitiveOps::<i32>::new();
        let merged = ops.merge(PrimitiveCmd::Replace(1), PrimitiveCmd::Replace(2));
        assert_eq!(ops.apply(&0, &merged), 2);
    }

    #[test]
    fn empty_is_identity() {
        let ops = PrimitiveOps::<i32>::new();
        let e = ops.empty();
        assert_eq!(ops.apply(&7, &e), 7);
    }

    #[test]
    fn apply_merge_matches_sequential_apply() {
        let ops = PrimitiveOps::<i32>::new();
        let c1 = PrimitiveCmd::Replace(3);
        let c2 = PrimitiveCmd::Empty;
        let merged = ops.merge(c1.clone(), c2.clone());
        let seq = ops.apply(&ops.apply(&0, &c1), &c2);
        assert_eq!(ops.apply(&0, &merged), seq);
    }
}
