//! Evaluator tests against a populated world.

use rts_behavior::prelude::*;
use rts_behavior::script::{ActionSequence, FinderNode, NumericNode};
use rts_test_utils::fixtures::{
    item_of, name, new_simulation, node, num, slot, spawn_named, GameSetBuilder,
};

struct Fixture {
    sim: Simulation,
    units: Vec<ObjectId>,
}

/// Five peasants in a row with ranks 3, 1, 4, 1, 5.
fn fixture() -> Fixture {
    let gs = GameSetBuilder::new()
        .items(&["Rank", "Seen"])
        .character("Peasant", 1.0)
        .equation("Loop", node("EQUATION", vec![name("Loop")]))
        .equation("Double", node("MULTIPLICATION", vec![item_of("Rank", slot("SELF")), num(2.0)]))
        .build();
    let mut sim = new_simulation(gs);
    let rank = sim.gameset().item_named("Rank").unwrap();
    let mut units = Vec::new();
    for (i, r) in [3.0, 1.0, 4.0, 1.0, 5.0].into_iter().enumerate() {
        let id = spawn_named(&mut sim, "Peasant", 10.0 + i as f32, 10.0);
        sim.world_mut().set_item(id, rank, r);
        units.push(id);
    }
    Fixture { sim, units }
}

fn finder(f: &Fixture, arg: &Arg) -> FinderNode {
    FinderNode::compile(arg, f.sim.gameset().symbols()).unwrap()
}

fn everyone_near() -> Arg {
    node("WITHIN_RADIUS", vec![slot("SELF"), num(50.0), name("Character")])
}

#[test]
fn test_filter_sees_each_candidate_and_restores_slot() {
    let mut f = fixture();
    let query = finder(
        &f,
        &node(
            "FILTER",
            vec![everyone_near(), node("GREATER_THAN", vec![item_of("Rank", slot("CANDIDATE")), num(2.0)])],
        ),
    );
    let units = f.units.clone();
    let (ctx, world) = f.sim.split();
    let _self = ctx.bind(Slot::SelfObject, Some(units[0]));
    let _outer = ctx.bind(Slot::Candidate, Some(units[1]));

    let first = query.eval(&ctx, world).unwrap();
    assert_eq!(first, vec![units[0], units[2], units[4]]);
    assert_eq!(ctx.raw(Slot::Candidate), Some(units[1]));

    // No mutation in between: same ordered result.
    assert_eq!(query.eval(&ctx, world).unwrap(), first);
}

#[test]
fn test_slot_restored_after_failing_nested_evaluation() {
    let mut f = fixture();
    let query = finder(&f, &node("FILTER", vec![everyone_near(), node("FROBNICATE", vec![])]));
    let units = f.units.clone();
    let (ctx, world) = f.sim.split();
    let _self = ctx.bind(Slot::SelfObject, Some(units[0]));
    {
        let _inner = ctx.bind(Slot::Candidate, Some(units[3]));
        let err = query.eval(&ctx, world).unwrap_err();
        assert!(matches!(err, GameError::UnknownNode { .. }));
        assert_eq!(ctx.raw(Slot::Candidate), Some(units[3]));
    }
    assert_eq!(ctx.raw(Slot::Candidate), None);
    assert_eq!(ctx.raw(Slot::SelfObject), Some(units[0]));
}

#[test]
fn test_empty_query_is_not_an_error() {
    let mut f = fixture();
    let query = finder(&f, &node("WITHIN_RADIUS", vec![slot("TARGET"), num(50.0)]));
    let rank = NumericNode::compile(&item_of("Rank", slot("TARGET")), f.sim.gameset().symbols()).unwrap();
    let (ctx, world) = f.sim.split();
    assert!(query.eval(&ctx, world).unwrap().is_empty());
    assert_eq!(rank.eval(&ctx, world).unwrap(), 0.0);
}

#[test]
fn test_equation_recursion_is_fatal_and_recovers_depth() {
    let mut f = fixture();
    let symbols = f.sim.gameset().symbols();
    let looping = NumericNode::compile(&node("EQUATION", vec![name("Loop")]), symbols).unwrap();
    let double = NumericNode::compile(&node("EQUATION", vec![name("Double")]), symbols).unwrap();
    let units = f.units.clone();
    let (ctx, world) = f.sim.split();
    let _self = ctx.bind(Slot::SelfObject, Some(units[4]));

    let err = looping.eval(&ctx, world).unwrap_err();
    assert!(matches!(err, GameError::EquationRecursion { .. }));
    assert_eq!(double.eval(&ctx, world).unwrap(), 10.0);
}

#[test]
fn test_sequence_on_destroyed_self_is_a_no_op() {
    let mut f = fixture();
    let sequence = ActionSequence::compile(
        &[node("INCREASE_ITEM", vec![name("Seen"), slot("SELF"), num(1.0)])],
        f.sim.gameset().symbols(),
    )
    .unwrap();
    let gone = f.units[0];
    f.sim.world_mut().remove_object(gone);
    let (ctx, world) = f.sim.split();
    let _self = ctx.bind(Slot::SelfObject, Some(gone));
    sequence.run(&ctx, world).unwrap();
    assert!(!world.contains(gone));
    assert_eq!(ctx.read(Slot::SelfObject, world), None);
}
