//! The six seeded end-to-end scenarios from spec.md §8, run against the
//! public crate surface rather than through any operator's own unit tests,
//! the way the teacher's `tests/group.rs`/`tests/join.rs` exercise whole
//! dataflows rather than individual fragments.

use reactive_collections::command::mapping::{MapState, MappingCmd, MappingOp, MappingOps};
use reactive_collections::command::primitive::{PrimitiveCmd, PrimitiveOps};
use reactive_collections::command::sequence::{SequenceCmd, SequenceOp, SequenceOps};
use reactive_collections::input::ChangeInput;
use reactive_collections::operators::{compose_list, decompose_list, filter_list, group_by_list, join_map, sequence_map};
use reactive_collections::{Graph, Id, IdGen, Reactive};

/// Scenario 1: filter_list with dynamic insert crossing threshold.
#[test]
fn filter_list_dynamic_insert_crossing_threshold() {
    let graph = Graph::new();
    let input = ChangeInput::<Vec<i32>, SequenceOps<i32, PrimitiveOps<i32>>>::new(&graph, SequenceOps::new(PrimitiveOps::new()));
    let source = Reactive::new(&graph, SequenceOps::new(PrimitiveOps::new()), input.changes(), Vec::new());

    let above_five = filter_list(&graph, &source, PrimitiveOps::<i32>::new(), |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
        let value = v.snapshot();
        let changes = g.map(&v.changes, |cmd: &PrimitiveCmd<i32>| match cmd {
            PrimitiveCmd::Replace(n) => PrimitiveCmd::Replace(*n > 5),
            PrimitiveCmd::Empty => PrimitiveCmd::Empty,
        });
        Reactive::new(g, PrimitiveOps::new(), changes, value > 5)
    });

    input.push_command(SequenceCmd(vec![SequenceOp::Insert { at: 0, value: 3 }]));
    graph.step();
    assert_eq!(above_five.snapshot(), Vec::<i32>::new());

    input.push_command(SequenceCmd(vec![SequenceOp::Insert { at: 0, value: 3 }]));
    graph.step();
    assert_eq!(above_five.snapshot(), Vec::<i32>::new());

    input.push_command(SequenceCmd(vec![SequenceOp::Update { at: 0, cmd: PrimitiveCmd::Replace(10) }]));
    graph.step();
    assert_eq!(above_five.snapshot(), vec![10]);
}

/// Scenario 2: group_by_list move preserves within-group order.
#[test]
fn group_by_list_move_preserves_within_group_order() {
    let graph = Graph::new();
    let input = ChangeInput::<Vec<i32>, SequenceOps<i32, PrimitiveOps<i32>>>::new(&graph, SequenceOps::new(PrimitiveOps::new()));
    let source = Reactive::new(&graph, SequenceOps::new(PrimitiveOps::new()), input.changes(), Vec::new());

    let grouped = group_by_list(&graph, &source, PrimitiveOps::<i32>::new(), |g, v: &Reactive<i32, PrimitiveOps<i32>>| {
        let value = v.snapshot();
        let changes = g.map(&v.changes, |cmd: &PrimitiveCmd<i32>| match cmd {
            PrimitiveCmd::Replace(n) => PrimitiveCmd::Replace(if n % 2 == 0 { "even" } else { "odd" }),
            PrimitiveCmd::Empty => PrimitiveCmd::Empty,
        });
        Reactive::new(g, PrimitiveOps::new(), changes, if value % 2 == 0 { "even" } else { "odd" })
    });

    input.push_command(SequenceCmd(vec![
        SequenceOp::Insert { at: 0, value: 1 },
        SequenceOp::Insert { at: 1, value: 3 },
        SequenceOp::Insert { at: 2, value: 5 },
        SequenceOp::Insert { at: 3, value: 2 },
        SequenceOp::Insert { at: 4, value: 4 },
    ]));
    graph.step();
    assert_eq!(grouped.snapshot().get("odd"), Some(&vec![1, 3, 5]));
    assert_eq!(grouped.snapshot().get("even"), Some(&vec![2, 4]));

    // source becomes [5,1,3,2,4]
    input.push_command(SequenceCmd(vec![SequenceOp::Move { from: 2, to: 0 }]));
    graph.step();
    assert_eq!(grouped.snapshot().get("odd"), Some(&vec![5, 1, 3]));
    assert_eq!(grouped.snapshot().get("even"), Some(&vec![2, 4]));
}

/// Scenario 3: join_map incremental product. Inner keys are identity
/// tokens (spec §3.2), minted here the same way `decompose_list` would —
/// `a`/`b`/`p`/`q`/`c`/`r` name the values the spec scenario assigns them.
#[test]
fn join_map_incremental_product() {
    let graph = Graph::new();
    let left_input = ChangeInput::<MapState<&'static str, MapState<Id, i32>>, MappingOps<&'static str, MapState<Id, i32>, MappingOps<Id, i32, PrimitiveOps<i32>>>>::new(
        &graph,
        MappingOps::new(MappingOps::new(PrimitiveOps::new())),
    );
    let right_input = ChangeInput::<MapState<&'static str, MapState<Id, &'static str>>, MappingOps<&'static str, MapState<Id, &'static str>, MappingOps<Id, &'static str, PrimitiveOps<&'static str>>>>::new(
        &graph,
        MappingOps::new(MappingOps::new(PrimitiveOps::new())),
    );

    let left = Reactive::new(&graph, MappingOps::new(MappingOps::new(PrimitiveOps::new())), left_input.changes(), MapState::default());
    let right = Reactive::new(&graph, MappingOps::new(MappingOps::new(PrimitiveOps::new())), right_input.changes(), MapState::default());

    let joined = join_map(&graph, &left, &right);

    let ids = IdGen::new();
    let a = ids.next();
    let b = ids.next();
    let p = ids.next();
    let q = ids.next();

    let mut left_x = MapState::default();
    left_x.insert(a, 1);
    left_x.insert(b, 2);
    left_input.push_command(MappingCmd(vec![MappingOp::Add { key: "x", value: left_x }]));

    let mut right_x = MapState::default();
    right_x.insert(p, "h");
    right_x.insert(q, "w");
    right_input.push_command(MappingCmd(vec![MappingOp::Add { key: "x", value: right_x }]));
    graph.step();

    let snapshot = joined.snapshot();
    assert_eq!(snapshot.get("x").map(|inner| inner.len()), Some(4));

    let c = ids.next();
    let r = ids.next();
    left_input.push_command(MappingCmd(vec![MappingOp::Update {
        key: "x",
        cmd: MappingCmd(vec![MappingOp::Add { key: c, value: 3 }]),
    }]));
    right_input.push_command(MappingCmd(vec![MappingOp::Update {
        key: "x",
        cmd: MappingCmd(vec![MappingOp::Add { key: r, value: "!" }]),
    }]));
    graph.step();

    let snapshot = joined.snapshot();
    let inner = snapshot.get("x").expect("key x still matched");
    assert_eq!(inner.len(), 9);
    assert_eq!(inner.get(&(a, r)), Some(&(1, "!")));
    assert_eq!(inner.get(&(b, r)), Some(&(2, "!")));
    assert_eq!(inner.get(&(c, p)), Some(&(3, "h")));
    assert_eq!(inner.get(&(c, q)), Some(&(3, "w")));
    assert_eq!(inner.get(&(c, r)), Some(&(3, "!")));
}

/// Scenario 4: compose_list(decompose_list(...)) round-trip with nested
/// lists, insert and update of the same element in one batch.
#[test]
fn decompose_compose_round_trip_with_nested_lists() {
    let graph = Graph::new();
    let input = ChangeInput::<Vec<Vec<i32>>, SequenceOps<Vec<i32>, SequenceOps<i32, PrimitiveOps<i32>>>>::new(
        &graph,
        SequenceOps::new(SequenceOps::new(PrimitiveOps::new())),
    );
    let source = Reactive::new(&graph, SequenceOps::new(SequenceOps::new(PrimitiveOps::new())), input.changes(), Vec::new());
    let (id_seq, id_map) = decompose_list(&graph, &source, SequenceOps::new(PrimitiveOps::new()));
    let recomposed = compose_list(&graph, &id_seq, &id_map);

    input.push_command(SequenceCmd(vec![
        SequenceOp::Insert { at: 0, value: vec![1, 2, 3] },
        SequenceOp::Update { at: 0, cmd: SequenceCmd(vec![SequenceOp::Insert { at: 3, value: 4 }]) },
    ]));
    graph.step();
    assert_eq!(recomposed.snapshot(), vec![vec![1, 2, 3, 4]]);
}

/// Scenario 5: sequence_map structural + value change in one batch.
#[test]
fn sequence_map_structural_and_value_change_in_one_batch() {
    let graph = Graph::new();
    let presence = ChangeInput::<MapState<&'static str, ()>, MappingOps<&'static str, (), PrimitiveOps<()>>>::new(
        &graph,
        MappingOps::new(PrimitiveOps::new()),
    );
    let source = Reactive::new(&graph, MappingOps::new(PrimitiveOps::new()), presence.changes(), MapState::default());

    let old_input = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
    let new_input = ChangeInput::<i32, PrimitiveOps<i32>>::new(&graph, PrimitiveOps::new());
    let old_changes = old_input.changes();
    let new_changes = new_input.changes();
    let rebound = std::rc::Rc::new(std::cell::Cell::new(false));
    let rebound_for_f = rebound.clone();

    let flattened = sequence_map(&graph, &source, move |g, _key: &&'static str| {
        if rebound_for_f.get() {
            Reactive::new(g, PrimitiveOps::new(), new_changes.clone(), 2)
        } else {
            Reactive::new(g, PrimitiveOps::new(), old_changes.clone(), 1)
        }
    });

    presence.push_command(MappingCmd(vec![MappingOp::Add { key: "a", value: () }]));
    graph.step();
    assert_eq!(flattened.snapshot().get("a"), Some(&1));

    rebound.set(true);
    presence.push_command(MappingCmd(vec![MappingOp::Update { key: "a", cmd: PrimitiveCmd::Replace(()) }]));
    graph.step();
    assert_eq!(flattened.snapshot().get("a"), Some(&2));

    old_input.push_command(PrimitiveCmd::Replace(11));
    new_input.push_command(PrimitiveCmd::Replace(22));
    graph.step();
    assert_eq!(flattened.snapshot().get("a"), Some(&22));
}
