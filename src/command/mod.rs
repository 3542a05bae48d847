//! The command algebra (spec §3, §4.1).
//!
//! Every container kind the crate supports — sequence, mapping, append log,
//! fixed-arity tuple, opaque primitive, and the weighted Z-set/Z-map pair —
//! is described by an [`Operations`] witness: a value, not just a trait
//! bound, because a witness for a container of some element type `T` may
//! itself be built from a witness for `T` (a sequence of reactives needs the
//! element's own operations to apply `update(i, Cmd(T))`).
//!
//! `Operations<State>::Cmd` is the command type for `State`; it forms a
//! monoid under [`Operations::merge`] with identity [`Operations::empty`],
//! and [`Operations::apply`] is compatible with that monoid:
//! `apply(s, merge(c1, c2)) == apply(apply(s, c1), c2)` and
//! `apply(s, empty()) == s`. These two identities are tested for every
//! concrete witness in this module.

pub mod primitive;
pub mod sequence;
pub mod mapping;
pub mod log;
pub mod tuple;
pub mod zset;
pub mod zmap;

pub use primitive::{PrimitiveCmd, PrimitiveOps};
pub use sequence::{SequenceCmd, SequenceOps};
pub use mapping::{MappingCmd, MappingOps};
pub use log::{LogCmd, LogOps};
pub use zset::{ZSet, ZSetOps};
pub use zmap::{ZMap, ZMapOps};

/// The command-algebra witness for a container holding values of type
/// `State`.
///
/// A witness is a plain value (commonly a zero-sized marker, or one
/// carrying a nested element witness) so that operators can construct and
/// pass it around before any element of the container has been observed —
/// see the "operations-witness proxies for late-bound element types" design
/// note (spec §9).
pub trait Operations<State>: Clone {
    /// The command type that drives changes to `State`.
    type Cmd: Clone + std::fmt::Debug;

    /// Applies a command to a state, producing the new state. Total, pure.
    fn apply(&self, state: &State, cmd: &Self::Cmd) -> State;

    /// Sequentially composes two commands: `apply(s, merge(c1,c2)) ==
    /// apply(apply(s,c1), c2)`.
    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd;

    /// The identity command: `apply(s, empty()) == s`.
    fn empty(&self) -> Self::Cmd;

    /// True if `cmd` is observationally the identity command. Implementations
    /// need not special-case every identity-shaped command, but `empty()`
    /// itself must always answer `true`.
    fn is_empty(&self, cmd: &Self::Cmd) -> bool;

    /// A command that, applied to `current`, rebuilds `target` regardless of
    /// what `current` actually is.
    ///
    /// For containers with a `clear`-like primitive (sequence, mapping) this
    /// ignores `current` entirely: clear, then reconstruct. Z-sets and
    /// Z-maps have no `clear` primitive — their only command is "another
    /// Z-set/Z-map to union" (spec §3.1) — so their witness computes the
    /// difference `target - current` and unions that in, per spec §4.1:
    /// "replacement is expressed as difference from current, union with
    /// target."
    fn replace(&self, current: &State, target: &State) -> Self::Cmd;
}

/// A forwarding witness for an element type whose concrete operations are
/// not known until the first element actually appears (spec §9's
/// "operations-witness proxies for late-bound element types", needed by
/// `map_map`/`map_list`: the per-element witness comes from invoking the
/// caller's `f`, which has not run yet when the operator is constructed
/// over an empty source).
///
/// [`LateBoundOps::bind`] is called once, by the first invocation of `f`;
/// every later call is a no-op (the witness never changes once observed).
/// Structural queries that do not need the underlying witness value would
/// be answerable even before binding, but since every concrete witness in
/// this crate needs an instance to build even `empty()` meaningfully for
/// nested containers, [`LateBoundOps`] simply defers all of
/// [`Operations`] to the bound witness and panics if none has been bound
/// yet — a condition that cannot arise from this crate's own operators,
/// since they only ever produce non-identity commands after binding a
/// witness for the element that made them non-empty.
pub struct LateBoundOps<T, Ops: Operations<T>> {
    inner: std::rc::Rc<std::cell::RefCell<Option<Ops>>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, Ops: Operations<T>> Clone for LateBoundOps<T, Ops> {
    fn clone(&self) -> Self {
        LateBoundOps { inner: self.inner.clone(), _marker: std::marker::PhantomData }
    }
}

impl<T, Ops: Operations<T>> Default for LateBoundOps<T, Ops> {
    fn default() -> Self {
        LateBoundOps { inner: std::rc::Rc::new(std::cell::RefCell::new(None)), _marker: std::marker::PhantomData }
    }
}

impl<T, Ops: Operations<T>> LateBoundOps<T, Ops> {
    /// Creates a witness with nothing bound yet.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Binds the concrete witness, if this is the first call.
    pub fn bind(&self, ops: Ops) {
        let mut slot = self.inner.borrow_mut();
        if slot.is_none() {
            *slot = Some(ops);
        }
    }

    fn bound(&self) -> std::cell::Ref<'_, Ops> {
        std::cell::Ref::map(self.inner.borrow(), |slot| {
            slot.as_ref().expect("LateBoundOps interrogated before any element bound a concrete witness")
        })
    }
}

impl<T, Ops: Operations<T> + Clone> Operations<T> for LateBoundOps<T, Ops> {
    type Cmd = Ops::Cmd;

    fn apply(&self, state: &T, cmd: &Self::Cmd) -> T {
        self.bound().apply(state, cmd)
    }

    fn merge(&self, first: Self::Cmd, second: Self::Cmd) -> Self::Cmd {
        self.bound().merge(first, second)
    }

    fn empty(&self) -> Self::Cmd {
        self.bound().empty()
    }

    fn is_empty(&self, cmd: &Self::Cmd) -> bool {
        self.bound().is_empty(cmd)
    }

    fn replace(&self, current: &T, target: &T) -> Self::Cmd {
        self.bound().replace(current, target)
    }
}

/// A fresh, unique identity token (spec §3.2, §4.3.3).
///
/// Tokens are minted by [`crate::operators::decompose::decompose_list`] and
/// are never reused after removal, for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mints fresh [`Id`] values, one at a time, in increasing order.
#[derive(Debug, Default)]
pub struct IdGen {
    next: std::cell::Cell<u64>,
}

impl IdGen {
    /// Creates a generator whose first minted id is `1` (`0` is reserved as
    /// a sentinel some callers find convenient for "no id").
    pub fn new() -> Self {
        IdGen { next: std::cell::Cell::new(1) }
    }

    /// Mints a fresh, never-before-returned id.
    pub fn next(&self) -> Id {
        let id = self.next.get();
        self.next.set(id + 1);
        Id(id)
    }
}
