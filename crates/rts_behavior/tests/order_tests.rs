//! Order queue tests.
//!
//! Drive small rulesets through `Simulation::tick` and check the order,
//! task and trigger state machines from the outside.

use proptest::prelude::*;
use rts_behavior::gameset::defs::{
    ObjectDef, OrderAssignmentDef, OrderDef, ReactionDef, TaskDef, TaskKindDef, TriggerDef,
    TriggerKindDef,
};
use rts_behavior::orders::ProcessState;
use rts_behavior::prelude::*;
use rts_test_utils::determinism::strategies::arb_tick_overshoots;
use rts_test_utils::fixtures::{
    bump_own_item, item_of, name, new_simulation, node, num, set_own_item, slot, spawn_named,
    GameSetBuilder,
};

// =============================================================================
// Helpers
// =============================================================================

fn assign(sim: &mut Simulation, object: ObjectId, order: &str, mode: AssignMode) -> Option<OrderId> {
    let bp = sim.gameset().order_named(order).unwrap();
    sim.assign_order(object, OrderRequest::new(bp, mode)).unwrap()
}

fn item(sim: &Simulation, object: ObjectId, item: &str) -> f32 {
    let id = sim.gameset().item_named(item).unwrap();
    sim.world().get_item(object, id)
}

fn set(sim: &mut Simulation, object: ObjectId, item: &str, value: f32) {
    let id = sim.gameset().item_named(item).unwrap();
    sim.world_mut().set_item(object, id, value);
}

fn live_orders(sim: &Simulation, object: ObjectId) -> usize {
    sim.world().get(object).map_or(0, |o| o.orders.len())
}

fn current_order(sim: &Simulation, object: ObjectId) -> Option<(OrderBlueprintId, ProcessState)> {
    sim.world()
        .get(object)?
        .orders
        .current_order()
        .map(|o| (o.blueprint_id(), o.state()))
}

fn idle_count(events: &[TickEvents], object: ObjectId) -> usize {
    events
        .iter()
        .flat_map(|e| &e.notifications)
        .filter(|n| matches!(n, Notification::Idle { object: o } if *o == object))
        .count()
}

/// `Step = Step * 10 + digit`, so the value spells the order sequences ran in.
fn record_step(digit: f32) -> Arg {
    node(
        "SET_ITEM",
        vec![
            name("Step"),
            slot("SELF"),
            node(
                "ADDITION",
                vec![
                    node("MULTIPLICATION", vec![item_of("Step", slot("SELF")), num(10.0)]),
                    num(digit),
                ],
            ),
        ],
    )
}

/// A task that follows its owner forever.
fn hold_task(name: &str) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        target: Some(slot("SELF")),
        ..Default::default()
    }
}

fn rules() -> GameSetBuilder {
    GameSetBuilder::new()
        .items(&[
            "Step", "Cancelled", "Terminated", "TaskCancelled", "Resumed", "Flag", "Hits", "Fires",
            "Idled",
        ])
        .character("Peasant", 2.0)
        .object(ObjectDef {
            name: "Worker".to_string(),
            class: ObjectClass::Character,
            speed: 2.0,
            reactions: vec!["CountIdle".to_string()],
            ..Default::default()
        })
        .reaction(ReactionDef {
            name: "CountIdle".to_string(),
            events: vec!["ON_IDLE".to_string()],
            actions: vec![bump_own_item("Idled", 1.0)],
            ..Default::default()
        })
        .object(ObjectDef {
            name: "Hut".to_string(),
            class: ObjectClass::Building,
            ..Default::default()
        })
        .object(ObjectDef {
            name: "Arrow".to_string(),
            class: ObjectClass::Missile,
            ..Default::default()
        })
        .task(TaskDef {
            name: "A".to_string(),
            kind: TaskKindDef::FaceTowards,
            termination_sequence: vec![set_own_item("Step", 1.0)],
            ..Default::default()
        })
        .task(TaskDef {
            name: "B".to_string(),
            start_sequence: vec![record_step(2.0)],
            termination_sequence: vec![record_step(3.0)],
            ..Default::default()
        })
        .task(TaskDef {
            resumption_sequence: vec![bump_own_item("Resumed", 1.0)],
            cancellation_sequence: vec![bump_own_item("TaskCancelled", 1.0)],
            ..hold_task("Hold")
        })
        .task(TaskDef {
            name: "Watch".to_string(),
            identify_target_each_cycle: true,
            target: Some(node(
                "FILTER",
                vec![
                    node("WITHIN_RADIUS", vec![slot("SELF"), num(100.0), name("Building")]),
                    node("GREATER_THAN", vec![item_of("Flag", slot("CANDIDATE")), num(0.0)]),
                ],
            )),
            ..Default::default()
        })
        .task(TaskDef {
            name: "Fly".to_string(),
            kind: TaskKindDef::Missile { speed: None },
            triggers: vec![TriggerDef {
                kind: TriggerKindDef::Collision,
                actions: vec![node("INCREASE_ITEM", vec![name("Hits"), slot("LEVEL"), num(1.0)])],
            }],
            ..Default::default()
        })
        .task(TaskDef {
            triggers: vec![TriggerDef {
                kind: TriggerKindDef::Timer { period: num(0.25) },
                actions: vec![bump_own_item("Fires", 1.0)],
            }],
            ..hold_task("Tick")
        })
        .task(TaskDef {
            start_sequence: vec![record_step(2.0)],
            triggers: vec![TriggerDef {
                kind: TriggerKindDef::Timer { period: num(0.0) },
                actions: vec![record_step(4.0)],
            }],
            ..hold_task("Beat")
        })
        .simple_order("Two", &["A", "B"])
        .simple_order("Pulse", &["A", "Beat"])
        .order(OrderDef {
            name: "Chain".to_string(),
            tasks: vec!["A".to_string()],
            termination_sequence: vec![node("ASSIGN_ORDER_VIA", vec![name("ThenHold"), slot("SELF")])],
            ..Default::default()
        })
        .assignment(OrderAssignmentDef {
            name: "ThenHold".to_string(),
            order: "Hold".to_string(),
            mode: AssignMode::DoLast,
            ..Default::default()
        })
        .order(OrderDef {
            name: "Hold".to_string(),
            tasks: vec!["Hold".to_string()],
            cancellation_sequence: vec![bump_own_item("Cancelled", 1.0)],
            termination_sequence: vec![bump_own_item("Terminated", 1.0)],
            ..Default::default()
        })
        .order(OrderDef {
            name: "Channel".to_string(),
            tasks: vec!["Hold".to_string()],
            uninterruptible: true,
            ..Default::default()
        })
        .simple_order("Poke", &["A"])
        .simple_order("Watch", &["Watch"])
        .simple_order("Fly", &["Fly"])
        .simple_order("Clock", &["Tick"])
}

fn setup() -> (Simulation, ObjectId) {
    let mut sim = new_simulation(rules().build());
    let peasant = spawn_named(&mut sim, "Peasant", 10.0, 10.0);
    (sim, peasant)
}

// =============================================================================
// Sequencing
// =============================================================================

#[test]
fn test_do_first_two_tasks_then_single_idle() {
    let (mut sim, x) = setup();
    assert!(assign(&mut sim, x, "Two", AssignMode::DoFirst).is_some());

    // A finishes on its first step.
    let first = sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Step"), 1.0);
    assert!(first.went_idle.is_empty());

    // B starts, then updates, then terminates, all on the next tick.
    let second = sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Step"), 123.0);
    assert_eq!(second.went_idle, vec![x]);
    assert_eq!(current_order(&sim, x), None);

    let mut events = vec![first, second];
    events.extend(sim.run(5).unwrap());
    assert_eq!(idle_count(&events, x), 1);
}

#[test]
fn test_next_task_starts_before_its_first_update() {
    let (mut sim, x) = setup();
    assign(&mut sim, x, "Pulse", AssignMode::DoLast);

    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Step"), 1.0);
    let beat = sim.world().get(x).unwrap().orders.current_order().unwrap().current_task().unwrap();
    assert_eq!(beat.state(), ProcessState::Uninitialised);

    // Start sequence (2), then the zero-period timer on the first update (4).
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Step"), 124.0);
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Step"), 1244.0);
}

#[test]
fn test_follow_up_order_from_termination_is_not_idle() {
    let mut sim = new_simulation(rules().build());
    let x = spawn_named(&mut sim, "Worker", 10.0, 10.0);
    assign(&mut sim, x, "Chain", AssignMode::DoLast);

    let first = sim.tick().unwrap();
    let hold = sim.gameset().order_named("Hold").unwrap();
    assert!(first.went_idle.is_empty());
    assert_eq!(idle_count(std::slice::from_ref(&first), x), 0);
    assert_eq!(item(&sim, x, "Idled"), 0.0);
    assert_eq!(live_orders(&sim, x), 1);
    assert_eq!(current_order(&sim, x).map(|c| c.0), Some(hold));

    let mut events = vec![first];
    events.extend(sim.run(3).unwrap());
    assert_eq!(idle_count(&events, x), 0);
    assert_eq!(live_orders(&sim, x), 1);

    // Dropping the follow-up is the real falling edge.
    sim.apply_order_op(x, OrderOp::CancelCurrentOrder).unwrap();
    let events = sim.run(3).unwrap();
    assert_eq!(idle_count(&events, x), 1);
    assert_eq!(item(&sim, x, "Idled"), 1.0);
}

#[test]
fn test_do_first_suspends_and_resumes_running_order() {
    let (mut sim, x) = setup();
    assign(&mut sim, x, "Hold", AssignMode::DoLast);
    sim.tick().unwrap();
    assert_eq!(current_order(&sim, x).map(|c| c.1), Some(ProcessState::Processing));

    assign(&mut sim, x, "Two", AssignMode::DoFirst);
    let hold = sim.gameset().order_named("Hold").unwrap();
    let suspended = sim.world().get(x).unwrap().orders.orders().any(|o| {
        o.blueprint_id() == hold && o.state() == ProcessState::Suspended
    });
    assert!(suspended);

    let events = sim.run(4).unwrap();
    assert_eq!(item(&sim, x, "Step"), 123.0);
    assert_eq!(item(&sim, x, "Resumed"), 1.0);
    assert_eq!(current_order(&sim, x), Some((hold, ProcessState::Processing)));
    assert_eq!(idle_count(&events, x), 0);
}

#[test]
fn test_uninterruptible_order_refuses_do_first() {
    let (mut sim, x) = setup();
    assign(&mut sim, x, "Channel", AssignMode::DoLast);
    sim.tick().unwrap();
    let channel = sim.gameset().order_named("Channel").unwrap();
    let before = current_order(&sim, x);
    assert_eq!(before, Some((channel, ProcessState::Processing)));

    assert_eq!(assign(&mut sim, x, "Poke", AssignMode::DoFirst), None);
    assert_eq!(assign(&mut sim, x, "Poke", AssignMode::ForgetEverythingElse), None);
    assert_eq!(current_order(&sim, x), before);
    assert_eq!(live_orders(&sim, x), 1);

    // Queuing behind it is still allowed.
    assert!(assign(&mut sim, x, "Poke", AssignMode::DoLast).is_some());
    assert_eq!(live_orders(&sim, x), 2);
}

#[test]
fn test_uninterruptible_order_yields_before_it_starts() {
    let (mut sim, x) = setup();
    assign(&mut sim, x, "Channel", AssignMode::DoLast);
    let channel = sim.gameset().order_named("Channel").unwrap();
    let poke = sim.gameset().order_named("Poke").unwrap();
    assert_eq!(current_order(&sim, x), Some((channel, ProcessState::Uninitialised)));

    assert!(assign(&mut sim, x, "Poke", AssignMode::DoFirst).is_some());
    assert_eq!(current_order(&sim, x).map(|c| c.0), Some(poke));
    assert_eq!(live_orders(&sim, x), 2);

    sim.run(2).unwrap();
    assert_eq!(item(&sim, x, "Step"), 1.0);
    assert_eq!(current_order(&sim, x), Some((channel, ProcessState::Processing)));
}

#[test]
fn test_forget_everything_else_cancels_each_order_once() {
    let (mut sim, x) = setup();
    for _ in 0..3 {
        assign(&mut sim, x, "Hold", AssignMode::DoLast);
    }
    sim.tick().unwrap();
    assert_eq!(live_orders(&sim, x), 3);

    assign(&mut sim, x, "Poke", AssignMode::ForgetEverythingElse);
    let poke = sim.gameset().order_named("Poke").unwrap();
    assert_eq!(live_orders(&sim, x), 1);
    assert_eq!(sim.world().get(x).unwrap().orders.orders().count(), 1);
    assert_eq!(current_order(&sim, x).map(|c| c.0), Some(poke));
    assert_eq!(item(&sim, x, "Cancelled"), 3.0);
    // Only the first order's task had started.
    assert_eq!(item(&sim, x, "TaskCancelled"), 1.0);
}

#[test]
fn test_cancel_and_terminate_are_idempotent() {
    let (mut sim, x) = setup();
    assign(&mut sim, x, "Hold", AssignMode::DoLast);
    sim.tick().unwrap();

    sim.apply_order_op(x, OrderOp::CancelCurrentOrder).unwrap();
    sim.apply_order_op(x, OrderOp::CancelCurrentOrder).unwrap();
    sim.apply_order_op(x, OrderOp::TerminateCurrentOrder).unwrap();
    assert_eq!(item(&sim, x, "Cancelled"), 1.0);
    assert_eq!(item(&sim, x, "TaskCancelled"), 1.0);
    assert_eq!(item(&sim, x, "Terminated"), 0.0);

    let events = sim.run(3).unwrap();
    assert_eq!(events[0].went_idle, vec![x]);
    assert_eq!(idle_count(&events, x), 1);
}

// =============================================================================
// Targets
// =============================================================================

#[test]
fn test_retarget_moves_referencer_link() {
    let (mut sim, x) = setup();
    let a = spawn_named(&mut sim, "Hut", 12.0, 10.0);
    let b = spawn_named(&mut sim, "Hut", 14.0, 10.0);
    set(&mut sim, a, "Flag", 1.0);
    assign(&mut sim, x, "Watch", AssignMode::DoLast);

    sim.tick().unwrap();
    assert_eq!(sim.world().referencers(a), &[x]);
    assert!(sim.world().referencers(b).is_empty());

    set(&mut sim, a, "Flag", 0.0);
    set(&mut sim, b, "Flag", 1.0);
    sim.tick().unwrap();
    assert!(sim.world().referencers(a).is_empty());
    assert_eq!(sim.world().referencers(b), &[x]);

    sim.world_mut().remove_object(x);
    assert!(sim.world().referencers(b).is_empty());
}

#[test]
fn test_missile_without_target_removes_owner() {
    let (mut sim, _) = setup();
    let arrow = spawn_named(&mut sim, "Arrow", 5.0, 5.0);
    let level = sim.level().unwrap();
    assign(&mut sim, arrow, "Fly", AssignMode::DoLast);

    let events = sim.tick().unwrap();
    assert!(!sim.world().contains(arrow));
    assert_eq!(item(&sim, level, "Hits"), 0.0);
    assert!(events
        .notifications
        .iter()
        .any(|n| matches!(n, Notification::ObjectRemoved { object } if *object == arrow)));
    assert!(!events
        .notifications
        .iter()
        .any(|n| matches!(n, Notification::PositionSet { object, .. } if *object == arrow)));
    assert!(events.went_idle.is_empty());

    // Nothing left to do for it afterwards.
    sim.run(3).unwrap();
}

// =============================================================================
// Timers
// =============================================================================

fn timer_reference(sim: &Simulation, object: ObjectId) -> GameTime {
    sim.world()
        .get(object)
        .and_then(|o| o.orders.current_order())
        .and_then(|o| o.current_task())
        .map(|t| t.triggers()[0].reference())
        .unwrap()
}

proptest! {
    /// Late ticks never push the timer's reference past start + N * period.
    #[test]
    fn prop_timer_reference_advances_by_whole_periods(overshoots in arb_tick_overshoots(80, 120)) {
        let (mut sim, x) = setup();
        assign(&mut sim, x, "Clock", AssignMode::DoLast);
        sim.tick().unwrap();
        let start = timer_reference(&sim, x);
        prop_assert_eq!(start, sim.now());

        for ms in overshoots {
            sim.world_mut().advance_clock(Fixed::from_num(ms) / Fixed::from_num(1000));
            sim.tick().unwrap();
        }

        let fires = item(&sim, x, "Fires") as i32;
        let period = Fixed::from_num(0.25);
        prop_assert_eq!(timer_reference(&sim, x), start + period * Fixed::from_num(fires));
        prop_assert!(timer_reference(&sim, x) <= sim.now());
    }
}
