//! Task kinds and triggers.
//!
//! Animation-driven triggers, spawning, missile flight, object creation
//! and the order-distributing actions, each driven through ticks.

use rts_behavior::gameset::defs::{
    AttachmentPointDef, CommandDef, ModelDef, ObjectDef, OrderAssignmentDef, TaskDef,
    TaskKindDef, TriggerDef, TriggerKindDef,
};
use rts_behavior::prelude::*;
use rts_test_utils::fixtures::{
    bump_own_item, item_of, name, new_simulation, node, num, slot, spawn_named, GameSetBuilder,
};

// =============================================================================
// Helpers
// =============================================================================

fn item(sim: &Simulation, object: ObjectId, item: &str) -> f32 {
    let id = sim.gameset().item_named(item).unwrap();
    sim.world().get_item(object, id)
}

fn set(sim: &mut Simulation, object: ObjectId, item: &str, value: f32) {
    let id = sim.gameset().item_named(item).unwrap();
    sim.world_mut().set_item(object, id, value);
}

fn assign(sim: &mut Simulation, object: ObjectId, order: &str, target: Option<ObjectId>) {
    let bp = sim.gameset().order_named(order).unwrap();
    let request = OrderRequest::new(bp, AssignMode::DoLast).with_target(target);
    assert!(sim.assign_order(object, request).unwrap().is_some());
}

fn command(sim: &mut Simulation, command: &str, object: ObjectId) {
    let id = sim.gameset().command_named(command).unwrap();
    sim.execute_command(id, object, None, AssignMode::DoLast).unwrap();
}

fn newest(sim: &Simulation) -> ObjectId {
    *sim.world().sorted_ids().last().unwrap()
}

fn bump(item: &str, of: Arg) -> Arg {
    node("INCREASE_ITEM", vec![name(item), of, num(1.0)])
}

fn hold(name: &str, triggers: Vec<TriggerDef>) -> TaskDef {
    TaskDef {
        name: name.to_string(),
        target: Some(slot("SELF")),
        triggers,
        ..Default::default()
    }
}

fn trigger(kind: TriggerKindDef, item: &str) -> TriggerDef {
    TriggerDef {
        kind,
        actions: vec![bump_own_item(item, 1.0)],
    }
}

fn near(class: &str) -> Arg {
    node("WITHIN_RADIUS", vec![slot("SELF"), num(100.0), name(class)])
}

fn rules() -> GameSetBuilder {
    GameSetBuilder::new()
        .items(&[
            "Loops", "Strikes", "Progress", "Ready", "Step", "Hits", "Landed", "Fires", "Flag",
        ])
        .character("Peasant", 2.0)
        .object(ObjectDef {
            name: "Smith".to_string(),
            class: ObjectClass::Character,
            // Half-second cycle; the hand is "on" from 0.22 s to 0.32 s.
            default_model: Some(ModelDef {
                duration: 0.5,
                attachment_points: vec![AttachmentPointDef {
                    tag: "Hand".to_string(),
                    on: vec![(0.22, 0.32)],
                    ..Default::default()
                }],
            }),
            ..Default::default()
        })
        .object(ObjectDef {
            name: "Hut".to_string(),
            class: ObjectClass::Building,
            ..Default::default()
        })
        .object(ObjectDef {
            name: "Barracks".to_string(),
            class: ObjectClass::Building,
            ..Default::default()
        })
        .object(ObjectDef {
            name: "Arrow".to_string(),
            class: ObjectClass::Missile,
            ..Default::default()
        })
        .sequence("Pulse", vec![bump_own_item("Fires", 1.0)])
        .task(hold("Hammer", vec![trigger(TriggerKindDef::AnimationLoop, "Loops")]))
        .task(hold(
            "Strike",
            vec![trigger(
                TriggerKindDef::AttachmentPoint {
                    tag: "Hand".to_string(),
                },
                "Strikes",
            )],
        ))
        .task(TaskDef {
            sync_fraction: Some(item_of("Progress", slot("SELF"))),
            ..hold("Pace", vec![trigger(TriggerKindDef::AnimationLoop, "Loops")])
        })
        .task(TaskDef {
            name: "Train".to_string(),
            kind: TaskKindDef::Spawn {
                blueprint: "Peasant".to_string(),
                condition: item_of("Ready", slot("SELF")),
                position: None,
                post_creation_sequence: vec![
                    node(
                        "SET_ITEM",
                        vec![name("Step"), slot("SELF"), node("OBJECT_ID", vec![slot("CREATOR")])],
                    ),
                    bump("Hits", slot("CREATOR")),
                ],
            },
            ..Default::default()
        })
        .task(TaskDef {
            name: "Shoot".to_string(),
            kind: TaskKindDef::Missile { speed: None },
            triggers: vec![
                TriggerDef {
                    kind: TriggerKindDef::Collision,
                    actions: vec![bump("Hits", slot("COLLISION_SUBJECT"))],
                },
                TriggerDef {
                    kind: TriggerKindDef::StruckFloor,
                    actions: vec![bump("Landed", slot("LEVEL"))],
                },
            ],
            ..Default::default()
        })
        .task(hold("Guard", vec![]))
        .simple_order("Hammer", &["Hammer"])
        .simple_order("Strike", &["Strike"])
        .simple_order("Pace", &["Pace"])
        .simple_order("Train", &["Train"])
        .simple_order("Shoot", &["Shoot"])
        .simple_order("Guard", &["Guard"])
        .assignment(OrderAssignmentDef {
            name: "Spread".to_string(),
            order: "Guard".to_string(),
            target: Some(near("Building")),
            distribute: true,
            ..Default::default()
        })
        .assignment(OrderAssignmentDef {
            name: "Focus".to_string(),
            order: "Guard".to_string(),
            target: Some(near("Building")),
            ..Default::default()
        })
        .command(CommandDef {
            name: "Spread".to_string(),
            start_sequence: vec![node("ASSIGN_ORDER_VIA", vec![name("Spread"), near("Character")])],
            order: None,
        })
        .command(CommandDef {
            name: "Focus".to_string(),
            start_sequence: vec![node("ASSIGN_ORDER_VIA", vec![name("Focus"), near("Character")])],
            order: None,
        })
        .command(CommandDef {
            name: "Ripple".to_string(),
            start_sequence: vec![node(
                "EXECUTE_SEQUENCE_OVER_PERIOD",
                vec![name("Pulse"), near("Building"), num(1.0)],
            )],
            order: None,
        })
        .command(CommandDef {
            name: "Build".to_string(),
            start_sequence: vec![
                node(
                    "CREATE_OBJECT",
                    vec![
                        name("Hut"),
                        slot("LEVEL"),
                        node("LOCATION_OF", vec![slot("SELF")]),
                        Arg::List(vec![
                            node(
                                "SET_ITEM",
                                vec![
                                    name("Step"),
                                    slot("SELF"),
                                    node("OBJECT_ID", vec![slot("CREATOR")]),
                                ],
                            ),
                            bump("Hits", slot("CREATOR")),
                        ]),
                    ],
                ),
                // The creator slot is only bound inside the post-creation list.
                node(
                    "SET_ITEM",
                    vec![name("Flag"), slot("SELF"), node("NUM_OBJECTS", vec![slot("CREATOR")])],
                ),
            ],
            order: None,
        })
        .command(CommandDef {
            name: "Loose".to_string(),
            start_sequence: vec![node(
                "CREATE_OBJECT",
                vec![
                    name("Arrow"),
                    slot("LEVEL"),
                    node("ABSOLUTE_POSITION", vec![num(10.0), num(0.0), num(10.0)]),
                ],
            )],
            order: None,
        })
}

fn sim() -> Simulation {
    new_simulation(rules().build())
}

// =============================================================================
// Animation triggers
// =============================================================================

#[test]
fn test_animation_loop_fires_once_per_cycle() {
    let mut sim = sim();
    let smith = spawn_named(&mut sim, "Smith", 10.0, 10.0);
    assign(&mut sim, smith, "Hammer", None);

    // Cycles complete at 0.5, 1.0, 1.5 and 2.0 s.
    sim.run(45).unwrap();
    assert_eq!(item(&sim, smith, "Loops"), 4.0);
    sim.run(10).unwrap();
    assert_eq!(item(&sim, smith, "Loops"), 5.0);
}

#[test]
fn test_animation_loop_follows_sync_fraction() {
    let mut sim = sim();
    let x = spawn_named(&mut sim, "Peasant", 10.0, 10.0);
    assign(&mut sim, x, "Pace", None);
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Loops"), 0.0);

    set(&mut sim, x, "Progress", 0.5);
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Loops"), 0.0);

    set(&mut sim, x, "Progress", 1.0);
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Loops"), 1.0);
    sim.run(3).unwrap();
    assert_eq!(item(&sim, x, "Loops"), 1.0);

    set(&mut sim, x, "Progress", 0.2);
    sim.tick().unwrap();
    set(&mut sim, x, "Progress", 1.0);
    sim.tick().unwrap();
    assert_eq!(item(&sim, x, "Loops"), 2.0);
}

#[test]
fn test_attachment_point_fires_once_per_switch_on() {
    let mut sim = sim();
    let smith = spawn_named(&mut sim, "Smith", 10.0, 10.0);
    assign(&mut sim, smith, "Strike", None);

    // The hand is on for two ticks of every cycle but fires once per cycle.
    sim.run(4).unwrap();
    assert_eq!(item(&sim, smith, "Strikes"), 0.0);
    sim.run(2).unwrap();
    assert_eq!(item(&sim, smith, "Strikes"), 1.0);
    sim.run(4).unwrap();
    assert_eq!(item(&sim, smith, "Strikes"), 1.0);

    // Switch-ons at 0.22, 0.72, 1.22, 1.72 and 2.22 s.
    sim.run(35).unwrap();
    assert_eq!(item(&sim, smith, "Strikes"), 5.0);
}

// =============================================================================
// Spawning and creation
// =============================================================================

#[test]
fn test_spawn_task_waits_for_condition_then_creates() {
    let mut sim = sim();
    let barracks = spawn_named(&mut sim, "Barracks", 30.0, 30.0);
    assign(&mut sim, barracks, "Train", None);

    sim.run(3).unwrap();
    assert_eq!(newest(&sim), barracks);
    assert_eq!(sim.world().order_count(barracks), 1);

    set(&mut sim, barracks, "Ready", 1.0);
    let events = sim.tick().unwrap();
    let recruit = newest(&sim);
    assert_ne!(recruit, barracks);

    let obj = sim.world().get(recruit).unwrap();
    assert_eq!(obj.blueprint, sim.gameset().object_blueprint_named("Peasant"));
    assert_eq!(obj.position, Vec3::new(30.0, 0.0, 30.0));
    assert_eq!(obj.parent, sim.level());
    assert_eq!(obj.creator, Some(barracks));
    assert_eq!(item(&sim, recruit, "Step"), barracks.0 as f32);
    assert_eq!(item(&sim, barracks, "Hits"), 1.0);
    assert_eq!(events.went_idle, vec![barracks]);
}

#[test]
fn test_create_object_runs_post_creation_as_new_object() {
    let mut sim = sim();
    let x = spawn_named(&mut sim, "Peasant", 12.0, 8.0);
    command(&mut sim, "Build", x);

    let hut = newest(&sim);
    assert_ne!(hut, x);
    let obj = sim.world().get(hut).unwrap();
    assert_eq!(obj.creator, Some(x));
    assert_eq!(obj.position, Vec3::new(12.0, 0.0, 8.0));
    assert_eq!(item(&sim, hut, "Step"), x.0 as f32);
    assert_eq!(item(&sim, x, "Hits"), 1.0);
    assert_eq!(item(&sim, x, "Flag"), 0.0);
}

// =============================================================================
// Missiles
// =============================================================================

#[test]
fn test_missile_from_shooter_position_hits_target_only() {
    let mut sim = sim();
    let shooter = spawn_named(&mut sim, "Peasant", 10.0, 10.0);
    let hut = spawn_named(&mut sim, "Hut", 40.0, 10.0);
    let arrow = spawn_named(&mut sim, "Arrow", 10.0, 10.0);
    let level = sim.level().unwrap();
    assign(&mut sim, arrow, "Shoot", Some(hut));

    sim.tick().unwrap();
    assert_eq!(item(&sim, shooter, "Hits"), 0.0);
    assert!(sim.world().contains(arrow));

    // About a second of flight at the default speed.
    sim.run(40).unwrap();
    assert_eq!(item(&sim, shooter, "Hits"), 0.0);
    assert_eq!(item(&sim, hut, "Hits"), 1.0);
    assert_eq!(item(&sim, level, "Landed"), 0.0);
    assert_eq!(sim.world().order_count(arrow), 0);
}

#[test]
fn test_missile_never_hits_its_creator() {
    let mut sim = sim();
    // Stands just ahead of the launch point, under the rising arc.
    let shooter = spawn_named(&mut sim, "Peasant", 12.0, 10.0);
    let hut = spawn_named(&mut sim, "Hut", 40.0, 10.0);
    command(&mut sim, "Loose", shooter);
    let arrow = newest(&sim);
    assert_eq!(sim.world().get(arrow).unwrap().creator, Some(shooter));
    assign(&mut sim, arrow, "Shoot", Some(hut));

    sim.run(41).unwrap();
    assert_eq!(item(&sim, shooter, "Hits"), 0.0);
    assert_eq!(item(&sim, hut, "Hits"), 1.0);
}

#[test]
fn test_missile_strikes_floor_when_target_is_gone() {
    let mut sim = sim();
    let hut = spawn_named(&mut sim, "Hut", 40.0, 10.0);
    let arrow = spawn_named(&mut sim, "Arrow", 10.0, 10.0);
    let level = sim.level().unwrap();
    assign(&mut sim, arrow, "Shoot", Some(hut));
    sim.tick().unwrap();
    sim.world_mut().remove_object(hut);

    sim.run(40).unwrap();
    assert_eq!(item(&sim, level, "Landed"), 1.0);
    assert_eq!(sim.world().order_count(arrow), 0);
    let pos = sim.world().get(arrow).unwrap().position;
    assert!(pos.x > 38.0 && pos.x < 42.0, "landed at {pos:?}");
}

// =============================================================================
// Spreading work
// =============================================================================

#[test]
fn test_sequence_over_period_spreads_selves() {
    let mut sim = sim();
    let x = spawn_named(&mut sim, "Peasant", 10.0, 10.0);
    let huts: Vec<_> = (0..4)
        .map(|i| spawn_named(&mut sim, "Hut", 20.0 + 2.0 * i as f32, 10.0))
        .collect();
    command(&mut sim, "Ripple", x);

    let fired = |sim: &Simulation| -> Vec<f32> { huts.iter().map(|h| item(sim, *h, "Fires")).collect() };

    // Due at 0, 0.25, 0.5 and 0.75 s.
    sim.run(3).unwrap();
    assert_eq!(fired(&sim), vec![1.0, 0.0, 0.0, 0.0]);
    sim.run(5).unwrap();
    assert_eq!(fired(&sim), vec![1.0, 1.0, 0.0, 0.0]);
    sim.run(5).unwrap();
    assert_eq!(fired(&sim), vec![1.0, 1.0, 1.0, 0.0]);
    sim.run(5).unwrap();
    assert_eq!(fired(&sim), vec![1.0, 1.0, 1.0, 1.0]);
    sim.run(20).unwrap();
    assert_eq!(fired(&sim), vec![1.0, 1.0, 1.0, 1.0]);
    assert_eq!(item(&sim, x, "Fires"), 0.0);
}

#[test]
fn test_assign_order_via_distributes_round_robin() {
    let mut sim = sim();
    let player = sim.create_player();
    let units: Vec<_> = (0..3)
        .map(|i| spawn_named(&mut sim, "Peasant", 10.0 + i as f32, 10.0))
        .collect();
    let h0 = spawn_named(&mut sim, "Hut", 30.0, 10.0);
    let h1 = spawn_named(&mut sim, "Hut", 32.0, 10.0);

    command(&mut sim, "Spread", player);
    assert_eq!(sim.world().referencers(h0), &[units[0], units[2]]);
    assert_eq!(sim.world().referencers(h1), &[units[1]]);

    sim.run(2).unwrap();
    assert_eq!(sim.world().referencers(h0), &[units[0], units[2]]);
    assert_eq!(sim.world().referencers(h1), &[units[1]]);
}

#[test]
fn test_assign_order_via_without_distribution_shares_first_target() {
    let mut sim = sim();
    let player = sim.create_player();
    let units: Vec<_> = (0..3)
        .map(|i| spawn_named(&mut sim, "Peasant", 10.0 + i as f32, 10.0))
        .collect();
    let h0 = spawn_named(&mut sim, "Hut", 30.0, 10.0);
    let h1 = spawn_named(&mut sim, "Hut", 32.0, 10.0);

    command(&mut sim, "Focus", player);
    assert_eq!(sim.world().referencers(h0), units.as_slice());
    assert!(sim.world().referencers(h1).is_empty());
}
