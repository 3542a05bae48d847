//! The command algebra instance for a 0-indexed, positional sequence
//! (spec §3.1: "Ordered sequence of `T`").
//!
//! Command order matters within a batch: `insert` shifts later indices up,
//! `remove` shifts later indices down, `move` relocates in place, and each
//! command's indices refer to the state *after* all earlier commands in the
//! same batch (spec §4.1).

use super::Operations;

/// One positional edit to a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOp<T, C> {
    /// Insert `value` so it occupies index `at`, shifting later elements up.
    Insert { at: usize, value: T },
    /// Apply an element-level command to the value currently at `at`.
    Update { at: usize, cmd: C },
    /// Remove the element currently at `at`, shifting later elements down.
    Remove { at: usize },
    /// Relocate the element at `from` to occupy `to`.
    Move { from: usize, to: usize },
    /// Discard all elements.
    Clear,
}

/// A batch of [`SequenceOp`]s, applied in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCmd<T, C>(pub Vec<SequenceOp<T, C>>);

impl<T, C> SequenceCmd<T, C> {
    /// The empty batch.
    pub fn empty() -> Self {
        SequenceCmd(Vec::new())
    }

    /// A batch containing a single op.
    pub fn single(op: SequenceOp<T, C>) -> Self {
        SequenceCmd(vec![op])
    }

    /// True if this batch has no ops.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The operations witness for a sequence of `T`, parameterized by the
/// element-level witness `EOps` used to apply `Update` commands.
#[derive(Debug, Clone)]
pub struct SequenceOps<T, EOps: Operations<T>> {
    /// The witness for the element type, threaded through `Update`.
    pub element: EOps,
    _marker: std::marker::PhantomData<T>,
}

impl<T, EOps: Operations<T>> SequenceOps<T, EOps> {
    /// Creates a sequence witness wrapping an element witness.
    pub fn new(element: EOps) -> Self {
        SequenceOps { element, _marker: std::marker::PhantomData }
    }
}

impl<T: Clone + std::fmt::Debug, EOps: Operations<T>> Operations<Vec<T>> for SequenceOps<T, EOps> {
    type Cmd = SequenceCmd<T, EOps::Cmd>;

    fn apply(&self, state: &Vec<T>, cmd: &Self::Cmd) -> Vec<T> {
        let mut out = state.clone();
        for op in &cmd.0 {
            match op {
                SequenceOp::Insert { at, value } => out.insert(*at, value.clone()),
                SequenceOp::Update { at, cmd } => {
                    let updated = self.element.apply(&out[*at], cmd);
                    out[*at] = updated;
                }
                SequenceOp::Remove { at } => { out.remove(*at); }
                SequenceOp::Move { from, to } => {
                    let value = out.remove(*from);
                    out.insert(*to, value);
                }
                SequenceOp::Clear => out.clear(),
            }
        }
        out
    }

    fn merge(&self, mut first: Self::Cmd, mut second: Self::Cmd) -> Self::Cmd {
        first.0.append(&mut second.0);
        first
    }

    fn empty(&self) -> Self::Cmd {
        SequenceCmd::empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, _current: &Vec<T>, target: &Vec<T>) -> Self::Cmd {
        let mut ops = vec![SequenceOp::Clear];
        ops.extend(target.iter().enumerate().map(|(i, v)| SequenceOp::Insert { at: i, value: v.clone() }));
        SequenceCmd(ops)
    }
}
