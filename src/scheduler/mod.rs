//! The stepped, height-ordered reactive scheduler (spec §4.2, §5).
//!
//! The graph is a DAG of nodes, each with a strictly increasing **height**:
//! every node's height exceeds the maximum height of its inputs. A step
//! processes dirty nodes in ascending-height order; a node's `step` may
//! dirty higher-height descendants for the same cycle, but never a
//! lower-height one. There is no parallelism within a step and no
//! cancellation — every step runs to completion synchronously.
//!
//! Unlike the teacher crate, this scheduler is not `timely`: there is no
//! cross-worker progress tracking, no capabilities, no frontier. It is the
//! minimal single-threaded mechanism the rest of the crate needs to give
//! every reactive collection a `step`-delimited `materialized` /
//! `previous_materialized` pair.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Type-erased scheduling surface every node exposes to its [`Graph`].
///
/// Implemented once, by [`NodeInner`]; callers interact with the typed
/// [`Node`] wrapper instead.
trait StepNode {
    fn height(&self) -> usize;
    fn raise_height(&self, at_least: usize);
    fn is_dirty(&self) -> bool;
    fn set_dirty(&self);
    fn clear_dirty(&self);
    fn step(&self);
}

struct NodeInner<T> {
    value: RefCell<T>,
    /// Usually fixed at construction. Raised past its originally-declared
    /// inputs only by operators with a dynamically-growing dependency set
    /// (`map_map`/`map_list`'s per-key assembler, §4.3.4/§9) via
    /// [`Node::raise_height_above`].
    height: Cell<usize>,
    dirty: Cell<bool>,
    dependents: RefCell<Vec<Weak<dyn StepNode>>>,
    /// Recomputes this node's value from its (already-stepped) inputs.
    /// Returns `true` if the value actually changed, so dependents should
    /// be dirtied for the remainder of this cycle.
    recompute: RefCell<Box<dyn FnMut(&T) -> (T, bool)>>,
}

impl<T: 'static> StepNode for NodeInner<T> {
    fn height(&self) -> usize {
        self.height.get()
    }

    fn raise_height(&self, at_least: usize) {
        if at_least > self.height.get() {
            self.height.set(at_least);
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn set_dirty(&self) {
        self.dirty.set(true);
    }

    fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    fn step(&self) {
        let (new_value, changed) = {
            let current = self.value.borrow();
            (self.recompute.borrow_mut())(&current)
        };
        *self.value.borrow_mut() = new_value;
        if changed {
            for dep in self.dependents.borrow().iter() {
                if let Some(dep) = dep.upgrade() {
                    dep.set_dirty();
                }
            }
        }
    }
}

/// A handle to one node's current value, stable across steps.
///
/// Cloning a `Node` is cheap (an `Rc` clone); both clones observe the same
/// underlying cell.
pub struct Node<T> {
    inner: Rc<NodeInner<T>>,
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Node { inner: self.inner.clone() }
    }
}

impl<T: Clone + 'static> Node<T> {
    /// The node's height in the graph.
    pub fn height(&self) -> usize {
        self.inner.height.get()
    }

    /// The value as of the most recently completed step.
    pub fn value(&self) -> T {
        self.inner.value.borrow().clone()
    }

    fn as_step_node(&self) -> Rc<dyn StepNode> {
        self.inner.clone() as Rc<dyn StepNode>
    }

    fn add_dependent(&self, dependent: &Rc<dyn StepNode>) {
        self.inner.dependents.borrow_mut().push(Rc::downgrade(dependent));
    }

    /// Raises this node's height past `other_height` if it does not already
    /// exceed it, leaving it unchanged otherwise.
    ///
    /// For a node whose dependency set grows after construction (an
    /// assembler reading an ever-growing set of per-key substreams, §9's
    /// "ensure children exist" design note), the declared height from
    /// `make_node` only accounts for the inputs known at construction time.
    /// Operators that later add a dependency taller than that must call
    /// this so the height invariant keeps holding.
    pub(crate) fn raise_height_above(&self, other_height: usize) {
        self.inner.raise_height(other_height + 1);
    }
}

/// The reactive graph: owns the registry of nodes and runs the step cycle.
///
/// `Graph` is an `Rc`-backed handle; cloning it yields another handle to
/// the same graph, the way a `timely::Worker` handle is shared across the
/// operators built on it.
#[derive(Clone)]
pub struct Graph {
    inner: Rc<GraphInner>,
}

struct GraphInner {
    nodes: RefCell<Vec<Weak<dyn StepNode>>>,
    /// Nodes to dirty at the *start* of the next `step()`, distinct from
    /// mid-cycle propagation (spec §4.2.2's `mark_dirty_next_step`).
    next_cycle: RefCell<Vec<Weak<dyn StepNode>>>,
    /// Nodes dirtied at the start of *every* `step()`, regardless of whether
    /// their declared inputs reported a change. `delay` nodes register here:
    /// `previous_materialized` must advance to `materialized`'s prior value
    /// every cycle, even on a cycle where `materialized` itself is unchanged.
    always_dirty: RefCell<Vec<Weak<dyn StepNode>>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Graph {
            inner: Rc::new(GraphInner {
                nodes: RefCell::new(Vec::new()),
                next_cycle: RefCell::new(Vec::new()),
                always_dirty: RefCell::new(Vec::new()),
            }),
        }
    }

    fn next_height(&self, input_heights: &[usize]) -> usize {
        input_heights.iter().copied().max().map(|h| h + 1).unwrap_or(0)
    }

    fn register<T: Clone + 'static>(&self, node: &Node<T>) {
        self.inner.nodes.borrow_mut().push(Rc::downgrade(&node.as_step_node()));
    }

    fn queue_dirty_next_cycle<T: Clone + 'static>(&self, node: &Node<T>) {
        self.inner.next_cycle.borrow_mut().push(Rc::downgrade(&node.as_step_node()));
    }

    fn register_always_dirty<T: Clone + 'static>(&self, node: &Node<T>) {
        self.inner.always_dirty.borrow_mut().push(Rc::downgrade(&node.as_step_node()));
    }

    /// Runs one step cycle: nodes queued via [`Graph::queue_dirty_next_cycle`]
    /// (change-inputs re-arming themselves, or an external push) are marked
    /// dirty, then every dirty node is stepped in ascending-height order.
    /// Propagation within the cycle may dirty higher-height nodes, which are
    /// then also stepped in the same pass; a node's own dirty flag is
    /// cleared immediately after it steps.
    pub fn step(&self) {
        for pending in self.inner.next_cycle.borrow_mut().drain(..) {
            if let Some(node) = pending.upgrade() {
                node.set_dirty();
            }
        }
        for always in self.inner.always_dirty.borrow().iter() {
            if let Some(node) = always.upgrade() {
                node.set_dirty();
            }
        }

        let mut nodes: Vec<Rc<dyn StepNode>> =
            self.inner.nodes.borrow().iter().filter_map(Weak::upgrade).collect();
        nodes.sort_by_key(|n| n.height());

        let mut stepped = 0usize;
        for node in &nodes {
            if node.is_dirty() {
                node.step();
                node.clear_dirty();
                stepped += 1;
            }
        }
        tracing::debug!(total = nodes.len(), stepped, "graph step complete");

        self.inner.nodes.borrow_mut().retain(|w| w.strong_count() > 0);
        self.inner.always_dirty.borrow_mut().retain(|w| w.strong_count() > 0);
    }

    #[cfg(debug_assertions)]
    fn check_height_invariant(&self, node_height: usize, input_heights: &[usize]) {
        for &h in input_heights {
            debug_assert!(h < node_height, "node height {node_height} does not exceed input height {h}");
        }
    }

    fn make_node<T: Clone + 'static>(
        &self,
        initial: T,
        input_heights: &[usize],
        recompute: impl FnMut(&T) -> (T, bool) + 'static,
    ) -> Node<T> {
        let height = self.next_height(input_heights);
        #[cfg(debug_assertions)]
        self.check_height_invariant(height, input_heights);
        let node = Node {
            inner: Rc::new(NodeInner {
                value: RefCell::new(initial),
                height: Cell::new(height),
                dirty: Cell::new(false),
                dependents: RefCell::new(Vec::new()),
                recompute: RefCell::new(Box::new(recompute)),
            }),
        };
        self.register(&node);
        node
    }

    /// A height-0 node with no inputs, whose `recompute` closure is
    /// responsible for its own notion of "did this change" — used by
    /// [`crate::input::ChangeInput`] to swap `pending` into `current` each
    /// step without the crate duplicating the height/dependent bookkeeping
    /// `make_node` already provides.
    pub(crate) fn make_source<T: Clone + 'static>(
        &self,
        initial: T,
        recompute: impl FnMut(&T) -> (T, bool) + 'static,
    ) -> Node<T> {
        self.make_node(initial, &[], recompute)
    }

    pub(crate) fn mark_dirty_next_step<T: Clone + 'static>(&self, node: &Node<T>) {
        self.queue_dirty_next_cycle(node);
    }

    /// Registers `dependent` to be dirtied whenever `input` changes, without
    /// going through one of the `map`/`zip` family.
    ///
    /// For an operator whose set of inputs grows after `dependent` is
    /// already built — `sequence_map`'s assembler gaining a new per-key
    /// reactive to watch as keys are added, the same "dependency set grows
    /// after construction" concern [`Node::raise_height_above`] addresses
    /// for height.
    pub(crate) fn add_dynamic_dependent<A: Clone + 'static, B: Clone + 'static>(&self, input: &Node<A>, dependent: &Node<B>) {
        input.add_dependent(&dependent.as_step_node());
    }

    /// Produces a node whose value is `f` applied to `input`'s value,
    /// recomputed whenever `input` changes.
    pub fn map<A, B>(&self, input: &Node<A>, mut f: impl FnMut(&A) -> B + 'static) -> Node<B>
    where
        A: Clone + 'static,
        B: Clone + PartialEq + 'static,
    {
        let input = input.clone();
        let initial = f(&input.value());
        let node = self.make_node(initial, &[input.height()], move |current| {
            let new_value = f(&input.value());
            let changed = new_value != *current;
            (new_value, changed)
        });
        input.add_dependent(&node.as_step_node());
        node
    }

    /// A stateful left fold over `input`'s successive values:
    /// `state_0 = init`, `state_i = f(state_{i-1}, input_i)`.
    pub fn accumulate<A, S>(&self, input: &Node<A>, init: S, mut f: impl FnMut(&S, &A) -> S + 'static) -> Node<S>
    where
        A: Clone + 'static,
        S: Clone + PartialEq + 'static,
    {
        let input = input.clone();
        let node = self.make_node(init, &[input.height()], move |current| {
            let new_value = f(current, &input.value());
            let changed = new_value != *current;
            (new_value, changed)
        });
        input.add_dependent(&node.as_step_node());
        node
    }

    /// A one-step delay: the first value is `init`; every later value is
    /// `input`'s value as of the *previous* step.
    ///
    /// Unlike the other combinators, `delay` must advance every single
    /// cycle — `previous_materialized` at step `k` must equal `materialized`
    /// at step `k - 1` even on a cycle where `materialized` itself didn't
    /// change, so this node cannot rely solely on `input` dirtying it. It
    /// registers itself to be force-dirtied at the start of every
    /// `Graph::step`, in addition to being a normal dependent of `input`.
    pub fn delay<A>(&self, input: &Node<A>, init: A) -> Node<A>
    where
        A: Clone + PartialEq + 'static,
    {
        let input = input.clone();
        // The delay node reads `input`'s value lazily each time it steps,
        // which is always one cycle after `input` published that value
        // (height ordering guarantees `input` has already stepped this
        // cycle by the time a `delay` node one level higher is reached —
        // but `delay` must see what `input` held *before this cycle's
        // update*, so it captures a shadow copy set at construction and
        // updated from its own recompute's previous output).
        let shadow = Rc::new(RefCell::new(input.value()));
        let node = self.make_node(init, &[input.height()], {
            let shadow = shadow.clone();
            move |current| {
                let delayed = shadow.borrow().clone();
                *shadow.borrow_mut() = input.value();
                let changed = delayed != *current;
                (delayed, changed)
            }
        });
        input.add_dependent(&node.as_step_node());
        self.register_always_dirty(&node);
        node
    }

    /// Combines two nodes' values with `f`, recomputed when either changes.
    pub fn zip<A, B, C>(&self, a: &Node<A>, b: &Node<B>, mut f: impl FnMut(&A, &B) -> C + 'static) -> Node<C>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        C: Clone + PartialEq + 'static,
    {
        let (a, b) = (a.clone(), b.clone());
        let initial = f(&a.value(), &b.value());
        let node = self.make_node(initial, &[a.height(), b.height()], move |current| {
            let new_value = f(&a.value(), &b.value());
            let changed = new_value != *current;
            (new_value, changed)
        });
        a.add_dependent(&node.as_step_node());
        b.add_dependent(&node.as_step_node());
        node
    }

    /// Combines three nodes' values with `f`.
    pub fn zip3<A, B, C, D>(
        &self,
        a: &Node<A>,
        b: &Node<B>,
        c: &Node<C>,
        mut f: impl FnMut(&A, &B, &C) -> D + 'static,
    ) -> Node<D>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        C: Clone + 'static,
        D: Clone + PartialEq + 'static,
    {
        let (a, b, c) = (a.clone(), b.clone(), c.clone());
        let initial = f(&a.value(), &b.value(), &c.value());
        let node = self.make_node(initial, &[a.height(), b.height(), c.height()], move |current| {
            let new_value = f(&a.value(), &b.value(), &c.value());
            let changed = new_value != *current;
            (new_value, changed)
        });
        a.add_dependent(&node.as_step_node());
        b.add_dependent(&node.as_step_node());
        c.add_dependent(&node.as_step_node());
        node
    }

    /// Combines four nodes' values with `f`.
    pub fn zip4<A, B, C, D, E>(
        &self,
        a: &Node<A>,
        b: &Node<B>,
        c: &Node<C>,
        d: &Node<D>,
        mut f: impl FnMut(&A, &B, &C, &D) -> E + 'static,
    ) -> Node<E>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        C: Clone + 'static,
        D: Clone + 'static,
        E: Clone + PartialEq + 'static,
    {
        let (a, b, c, d) = (a.clone(), b.clone(), c.clone(), d.clone());
        let initial = f(&a.value(), &b.value(), &c.value(), &d.value());
        let node =
            self.make_node(initial, &[a.height(), b.height(), c.height(), d.height()], move |current| {
                let new_value = f(&a.value(), &b.value(), &c.value(), &d.value());
                let changed = new_value != *current;
                (new_value, changed)
            });
        a.add_dependent(&node.as_step_node());
        b.add_dependent(&node.as_step_node());
        c.add_dependent(&node.as_step_node());
        d.add_dependent(&node.as_step_node());
        node
    }

    /// Flattens a node-of-nodes: `input`'s value is itself a `Node<A>`, and
    /// the result tracks whichever inner node `input` currently points to.
    ///
    /// This implementation re-reads the inner node's value only when
    /// `input` itself changes (i.e. when the *choice* of inner node
    /// changes); it is sufficient for the crate's own use, which only ever
    /// flattens a node whose inner target is rebuilt together with the
    /// switch (spec §4.2.3 lists `flatten`/`bind` as available combinators
    /// without a named operator depending on deeper dynamic-switch
    /// semantics).
    pub fn flatten<A>(&self, input: &Node<Node<A>>) -> Node<A>
    where
        A: Clone + PartialEq + 'static,
    {
        let input = input.clone();
        let initial = input.value().value();
        let node = self.make_node(initial, &[input.height()], move |current| {
            let new_value = input.value().value();
            let changed = new_value != *current;
            (new_value, changed)
        });
        input.add_dependent(&node.as_step_node());
        node
    }

    /// Dynamically switches to a new computation each time `input` changes:
    /// `f` is invoked with `input`'s new value to produce the node the
    /// result should track until the next change.
    pub fn bind<A, B>(&self, input: &Node<A>, mut f: impl FnMut(&A) -> Node<B> + 'static) -> Node<B>
    where
        A: Clone + 'static,
        B: Clone + PartialEq + 'static,
    {
        let input = input.clone();
        let initial = f(&input.value()).value();
        let node = self.make_node(initial, &[input.height()], move |current| {
            let new_value = f(&input.value()).value();
            let changed = new_value != *current;
            (new_value, changed)
        });
        input.add_dependent(&node.as_step_node());
        node
    }
}
