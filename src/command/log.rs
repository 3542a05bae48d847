//! The command algebra instance for an append-only, insertion-ordered log
//! (spec §3.1: "Append-only log of `T`").
//!
//! The only command is `append`, carried as a finite batch of new entries;
//! there is no mutation of previously-appended entries.

use super::Operations;

/// A batch of entries appended to a log in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCmd<T>(pub Vec<T>);

impl<T> LogCmd<T> {
    /// The empty batch.
    pub fn empty() -> Self {
        LogCmd(Vec::new())
    }

    /// True if this batch appends nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The operations witness for an append log of `T`.
#[derive(Debug, Clone, Default)]
pub struct LogOps<T>(std::marker::PhantomData<T>);

impl<T> LogOps<T> {
    /// Creates the witness.
    pub fn new() -> Self {
        LogOps(std::marker::PhantomData)
    }
}

impl<T: Clone + std::fmt::Debug + PartialEq> Operations<Vec<T>> for LogOps<T> {
    type Cmd = LogCmd<T>;

    fn apply(&self, state: &Vec<T>, cmd: &Self::Cmd) -> Vec<T> {
        let mut out = state.clone();
        out.extend(cmd.0.iter().cloned());
        out
    }

    fn merge(&self, mut first: Self::Cmd, mut second: Self::Cmd) -> Self::Cmd {
        first.0.append(&mut second.0);
        first
    }

    fn empty(&self) -> Self::Cmd {
        LogCmd::empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        cmd.is_empty()
    }

    fn replace(&self, current: &Vec<T>, target: &Vec<T>) -> Self::Cmd {
        // A log has no `clear`; `target` must extend `current` (the only
        // legal evolution of an append-only log). Replace appends the
        // suffix beyond what `current` already holds.
        debug_assert!(target.len() >= current.len() && target[..current.len()] == current[..]);
        LogCmd(target[current.len()..].to_vec())
    }
}
