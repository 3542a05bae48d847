//! The command algebra instance for fixed-arity tuples (spec §3.1:
//! "Fixed-arity tuple `(T0,...,Tn-1)`").
//!
//! A tuple command carries one per-slot command; any subset of slots may be
//! the identity command for that slot, so there is no separate `Option`
//! wrapper — each slot's own `empty()` already means "this slot did not
//! change." Arities 2 through 4 are provided; larger tuples are
//! uncommon enough in practice that callers compose nested pairs instead
//! (`((T0, T1), T2)`) rather than this crate hand-rolling every arity.

use super::Operations;

/// The command type for a 2-tuple: one per-slot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleCmd2<C0, C1>(pub C0, pub C1);

/// The operations witness for a 2-tuple `(T0, T1)`.
#[derive(Debug, Clone)]
pub struct TupleOps2<T0, O0: Operations<T0>, T1, O1: Operations<T1>> {
    /// Witness for slot 0.
    pub slot0: O0,
    /// Witness for slot 1.
    pub slot1: O1,
    _marker: std::marker::PhantomData<(T0, T1)>,
}

impl<T0, O0: Operations<T0>, T1, O1: Operations<T1>> TupleOps2<T0, O0, T1, O1> {
    /// Creates a 2-tuple witness from its per-slot witnesses.
    pub fn new(slot0: O0, slot1: O1) -> Self {
        TupleOps2 { slot0, slot1, _marker: std::marker::PhantomData }
    }
}

impl<T0, O0, T1, O1> Operations<(T0, T1)> for TupleOps2<T0, O0, T1, O1>
where
    T0: Clone + std::fmt::Debug,
    T1: Clone + std::fmt::Debug,
    O0: Operations<T0>,
    O1: Operations<T1>,
{
    type Cmd = TupleCmd2<O0::Cmd, O1::Cmd>;

    fn apply(&self, state: &(T0, T1), cmd: &Self::Cmd) -> (T0, T1) {
        (self.slot0.apply(&state.0, &cmd.0), self.slot1.apply(&state.1, &cmd.1))
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        TupleCmd2(self.slot0.merge(first.0, second.0), self.slot1.merge(first.1, second.1))
    }

    fn empty(&self) -> Self::Cmd {
        TupleCmd2(self.slot0.empty(), self.slot1.empty())
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        self.slot0.is_empty(&cmd.0) && self.slot1.is_empty(&cmd.1)
    }

    fn replace(&self, current: &(T0, T1), target: &(T0, T1)) -> Self::Cmd {
        TupleCmd2(
            self.slot0.replace(&current.0, &target.0),
            self.slot1.replace(&current.1, &target.1),
        )
    }
}

/// The command type for a 3-tuple: one per-slot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleCmd3<C0, C1, C2>(pub C0, pub C1, pub C2);

/// The operations witness for a 3-tuple `(T0, T1, T2)`.
#[derive(Debug, Clone)]
pub struct TupleOps3<T0, O0: Operations<T0>, T1, O1: Operations<T1>, T2, O2: Operations<T2>> {
    /// Witness for slot 0.
    pub slot0: O0,
    /// Witness for slot 1.
    pub slot1: O1,
    /// Witness for slot 2.
    pub slot2: O2,
    _marker: std::marker::PhantomData<(T0, T1, T2)>,
}

impl<T0, O0: Operations<T0>, T1, O1: Operations<T1>, T2, O2: Operations<T2>> TupleOps3<T0, O0, T1, O1, T2, O2> {
    /// Creates a 3-tuple witness from its per-slot witnesses.
    pub fn new(slot0: O0, slot1: O1, slot2: O2) -> Self {
        TupleOps3 { slot0, slot1, slot2, _marker: std::marker::PhantomData }
    }
}

impl<T0, O0, T1, O1, T2, O2> Operations<(T0, T1, T2)> for TupleOps3<T0, O0, T1, O1, T2, O2>
where
    T0: Clone + std::fmt::Debug,
    T1: Clone + std::fmt::Debug,
    T2: Clone + std::fmt::Debug,
    O0: Operations<T0>,
    O1: Operations<T1>,
    O2: Operations<T2>,
{
    type Cmd = TupleCmd3<O0::Cmd, O1::Cmd, O2::Cmd>;

    fn apply(&self, state: &(T0, T1, T2), cmd: &Self::Cmd) -> (T0, T1, T2) {
        (
            self.slot0.apply(&state.0, &cmd.0),
            self.slot1.apply(&state.1, &cmd.1),
            self.slot2.apply(&state.2, &cmd.2),
        )
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        TupleCmd3(
            self.slot0.merge(first.0, second.0),
            self.slot1.merge(first.1, second.1),
            self.slot2.merge(first.2, second.2),
        )
    }

    fn empty(&self) -> Self::Cmd {
        TupleCmd3(self.slot0.empty(), self.slot1.empty(), self.slot2.empty())
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        self.slot0.is_empty(&cmd.0) && self.slot1.is_empty(&cmd.1) && self.slot2.is_empty(&cmd.2)
    }

    fn replace(&self, current: &(T0, T1, T2), target: &(T0, T1, T2)) -> Self::Cmd {
        TupleCmd3(
            self.slot0.replace(&current.0, &target.0),
            self.slot1.replace(&current.1, &target.1),
            self.slot2.replace(&current.2, &target.2),
        )
    }
}

/// The command type for a 4-tuple: one per-slot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleCmd4<C0, C1, C2, C3>(pub C0, pub C1, pub C2, pub C3);

/// The operations witness for a 4-tuple `(T0, T1, T2, T3)`.
#[derive(Debug, Clone)]
pub struct TupleOps4<T0, O0: Operations<T0>, T1, O1: Operations<T1>, T2, O2: Operations<T2>, T3, O3: Operations<T3>> {
    /// Witness for slot 0.
    pub slot0: O0,
    /// Witness for slot 1.
    pub slot1: O1,
    /// Witness for slot 2.
    pub slot2: O2,
    /// Witness for slot 3.
    pub slot3: O3,
    _marker: std::marker::PhantomData<(T0, T1, T2, T3)>,
}

impl<T0, O0: Operations<T0>, T1, O1: Operations<T1>, T2, O2: Operations<T2>, T3, O3: Operations<T3>>
    TupleOps4<T0, O0, T1, O1, T2, O2, T3, O3>
{
    /// Creates a 4-tuple witness from its per-slot witnesses.
    pub fn new(slot0: O0, slot1: O1, slot2: O2, slot3: O3) -> Self {
        TupleOps4 { slot0, slot1, slot2, slot3, _marker: std::marker::PhantomData }
    }
}

impl<T0, O0, T1, O1, T2, O2, T3, O3> Operations<(T0, T1, T2, T3)> for TupleOps4<T0, O0, T1, O1, T2, O2, T3, O3>
where
    T0: Clone + std::fmt::Debug,
    T1: Clone + std::fmt::Debug,
    T2: Clone + std::fmt::Debug,
    T3: Clone + std::fmt::Debug,
    O0: Operations<T0>,
    O1: Operations<T1>,
    O2: Operations<T2>,
    O3: Operations<T3>,
{
    type Cmd = TupleCmd4<O0::Cmd, O1::Cmd, O2::Cmd, O3::Cmd>;

    fn apply(&self, state: &(T0, T1, T2, T3), cmd: &Self::Cmd) -> (T0, T1, T2, T3) {
        (
            self.slot0.apply(&state.0, &cmd.0),
            self.slot1.apply(&state.1, &cmd.1),
            self.slot2.apply(&state.2, &cmd.2),
            self.slot3.apply(&state.3, &cmd.3),
        )
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        TupleCmd4(
            self.slot0.merge(first.0, second.0),
            self.slot1.merge(first.1, second.1),
            self.slot2.merge(first.2, second.2),
            self.slot3.merge(first.3, second.3),
        )
    }

    fn empty(&self) -> Self::Cmd {
        TupleCmd4(self.slot0.empty(), self.slot1.empty(), self.slot2.empty(), self.slot3.empty())
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        self.slot0.is_empty(&cmd.0)
            && self.slot1.is_empty(&cmd.1)
            && self.slot2.is_empty(&cmd.2)
            && self.slot3.is_empty(&cmd.3)
    }

    fn replace(&self, current: &(T0, T1, T2, T3), target: &(T0, T1, T2, T3)) -> Self::Cmd {
        TupleCmd4(
            self.slot0.replace(&current.0, &target.0),
            self.slot1.replace(&current.1, &target.1),
            self.slot2.replace(&current.2, &target.2),
            self.slot3.replace(&current.3, &target.3),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::primitive::{PrimitiveCmd, PrimitiveOps};

    #[test]
    fn tuple2_applies_slots_independently() {
        let ops = TupleOps2::new(PrimitiveOps::<i32>::new(), PrimitiveOps::<&str>::new());
        let cmd = TupleCmd2(PrimitiveCmd::Replace(5), PrimitiveCmd::Empty);
        assert_eq!(ops.apply(&(1, "a"), &cmd), (5, "a"));
    }

    #[test]
    fn tuple3_empty_is_identity() {
        let ops = TupleOps3::new(
            PrimitiveOps::<i32>::new(),
            PrimitiveOps::<i32>::new(),
            PrimitiveOps::<i32>::new(),
        );
        let e = ops.empty();
        assert!(ops.is_empty(&e));
        assert_eq!(ops.apply(&(1, 2, 3), &e), (1, 2, 3));
    }
}
