//! Task runtime state and the per-kind behaviour.
//!
//! A [`Task`] is the unit of work inside an order. It runs through
//! `Uninitialised -> Processing <-> Suspended` and ends `Cancelled` or
//! `Terminated`. Kind-specific behaviour lives in `on_start`/`on_update`;
//! everything else is shared.

use crate::error::{GameError, Result};
use crate::ids::{ObjectId, TaskBlueprintId, TaskId};
use crate::math::{time_to_f32, OrientedPosition, Vec3};
use crate::script::action::run_post_creation;
use crate::script::{ExecutionContext, Slot};
use crate::world::World;

use super::blueprint::{TaskBlueprint, TaskKind, TriggerKind};
use super::missile::{self, MissileFlight};
use super::trigger::Trigger;
use super::ProcessState;

/// Target movement (in world units) that makes a following task re-issue
/// its movement command.
const DRIFT_TOLERANCE: f32 = 0.5;

/// Heading change (radians) below which facing is left alone.
const FACING_TOLERANCE: f32 = 1e-3;

/// Outcome of one task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStep {
    /// Keep running next tick.
    Continue,
    /// The task is finished; terminate it and advance the order.
    Terminate,
}

/// Which animation a task last applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AnimationPick {
    #[default]
    Unset,
    Default,
    Entry(usize),
}

/// Runtime state of one task.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    blueprint: TaskBlueprintId,
    owner: ObjectId,
    state: ProcessState,
    target: Option<ObjectId>,
    destination: Option<Vec3>,
    triggers: Vec<Trigger>,
    triggers_running: bool,
    proximity_satisfied: bool,
    last_destination: Option<Vec3>,
    animation: AnimationPick,
    missile: Option<MissileFlight>,
}

impl Task {
    /// Create an uninitialised task.
    #[must_use]
    pub fn new(id: TaskId, blueprint: TaskBlueprintId, owner: ObjectId, triggers: usize) -> Self {
        Self {
            id,
            blueprint,
            owner,
            state: ProcessState::Uninitialised,
            target: None,
            destination: None,
            triggers: vec![Trigger::default(); triggers],
            triggers_running: false,
            proximity_satisfied: false,
            last_destination: None,
            animation: AnimationPick::Unset,
            missile: None,
        }
    }

    /// Task id within its order.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Blueprint index.
    #[must_use]
    pub const fn blueprint_id(&self) -> TaskBlueprintId {
        self.blueprint
    }

    /// Object running the task.
    #[must_use]
    pub const fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Current target, which may have been destroyed since it was set.
    #[must_use]
    pub const fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// Destination supplied with the order, if any.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Whether the proximity requirement is currently met.
    #[must_use]
    pub const fn proximity_satisfied(&self) -> bool {
        self.proximity_satisfied
    }

    /// Trigger states, in blueprint order.
    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub(crate) fn set_destination(&mut self, destination: Option<Vec3>) {
        self.destination = destination;
    }

    fn blueprint<'g>(&self, ctx: &ExecutionContext<'g>) -> Result<&'g TaskBlueprint> {
        ctx.gameset()
            .task(self.blueprint)
            .ok_or_else(|| GameError::InvalidState(format!("missing task blueprint {}", self.blueprint.0)))
    }

    /// Retarget the task, keeping the referencer lists in step: the owner
    /// leaves the old target's list before joining the new one.
    pub fn set_target(&mut self, world: &mut World, target: Option<ObjectId>) {
        if self.target == target {
            return;
        }
        if let Some(old) = self.target.take() {
            world.remove_referencer(old, self.owner);
        }
        if let Some(new) = target {
            world.add_referencer(new, self.owner);
        }
        self.target = target;
    }

    /// Drop the target link. Called when the task is discarded.
    pub fn release(&mut self, world: &mut World) {
        self.set_target(world, None);
    }

    /// Return to `Uninitialised` so the task can run again, keeping its
    /// target.
    pub(crate) fn reset(&mut self) {
        self.state = ProcessState::Uninitialised;
        self.stop_triggers();
        self.proximity_satisfied = false;
        self.last_destination = None;
        self.animation = AnimationPick::Unset;
        self.missile = None;
    }

    // --- State machine ---------------------------------------------------

    /// One tick of work. Resumes or starts the task first if needed.
    pub(crate) fn process(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        previous_target: Option<ObjectId>,
    ) -> Result<TaskStep> {
        match self.state {
            ProcessState::Cancelled | ProcessState::Terminated => return Ok(TaskStep::Continue),
            ProcessState::Suspended => self.resume(ctx, world)?,
            ProcessState::Uninitialised => {
                if self.start(ctx, world, previous_target)? == TaskStep::Terminate {
                    return Ok(TaskStep::Terminate);
                }
            }
            ProcessState::Processing => {}
        }
        if !world.contains(self.owner) || self.state != ProcessState::Processing {
            return Ok(TaskStep::Continue);
        }
        self.on_update(ctx, world)
    }

    /// Begin work: resolve the target, run the start sequence and the
    /// kind's start hook. A no-op if the task is already working.
    pub(crate) fn start(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        previous_target: Option<ObjectId>,
    ) -> Result<TaskStep> {
        if self.state.is_working() {
            return Ok(TaskStep::Continue);
        }
        let bp = self.blueprint(ctx)?;
        self.state = ProcessState::Processing;
        self.proximity_satisfied = false;
        self.last_destination = None;
        self.animation = AnimationPick::Unset;

        // A target supplied with the order wins over the finder.
        let has_target = self.target.is_some_and(|t| Self::acceptable(bp, t, world));
        if bp.use_previous_target {
            self.set_target(world, previous_target);
        } else if let (false, Some(finder)) = (has_target, &bp.target) {
            let found = self.first_acceptable(bp, finder.eval(ctx, world)?, world);
            self.set_target(world, found);
        }
        tracing::debug!(owner = %self.owner, task = %bp.name, target = ?self.target, "task started");

        let _target = ctx.bind(Slot::Target, self.target);
        bp.start_sequence.run(ctx, world)?;
        if !world.contains(self.owner) {
            return Ok(TaskStep::Continue);
        }
        if let Some(animation) = bp.default_animation {
            if bp.proximity_animations.is_empty() {
                world.set_animation(self.owner, Some(animation), false, None);
                self.animation = AnimationPick::Default;
            }
        }
        if bp.triggers_start_immediately() {
            self.start_triggers(bp, ctx, world)?;
        }
        self.on_start(bp, ctx, world)
    }

    /// Pause: stop triggers and movement.
    pub(crate) fn suspend(&mut self, world: &mut World) {
        if self.state != ProcessState::Processing {
            return;
        }
        self.state = ProcessState::Suspended;
        self.stop_triggers();
        world.stop_movement(self.owner);
        tracing::debug!(owner = %self.owner, task = self.id.0, "task suspended");
    }

    /// Continue after a suspension: run the resumption sequence and let
    /// proximity effects re-evaluate from scratch.
    pub(crate) fn resume(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        if self.state != ProcessState::Suspended {
            return Ok(());
        }
        let bp = self.blueprint(ctx)?;
        self.state = ProcessState::Processing;
        self.proximity_satisfied = false;
        self.last_destination = None;
        self.animation = AnimationPick::Unset;
        tracing::debug!(owner = %self.owner, task = %bp.name, "task resumed");
        let _target = ctx.bind(Slot::Target, self.target);
        bp.resumption_sequence.run(ctx, world)?;
        if bp.triggers_start_immediately() {
            self.start_triggers(bp, ctx, world)?;
        }
        if let TaskKind::Move { .. } = bp.kind {
            // Movement was stopped by the suspension.
            self.on_start(bp, ctx, world)?;
        }
        Ok(())
    }

    /// Cancel. Returns `false` if the task was already done.
    pub(crate) fn cancel(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<bool> {
        self.finish(ctx, world, ProcessState::Cancelled)
    }

    /// Terminate. Returns `false` if the task was already done. Advancing
    /// the order is the caller's job.
    pub(crate) fn terminate(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<bool> {
        self.finish(ctx, world, ProcessState::Terminated)
    }

    fn finish(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        end: ProcessState,
    ) -> Result<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        let started = self.state != ProcessState::Uninitialised;
        self.state = end;
        self.stop_triggers();
        if !started {
            return Ok(true);
        }
        world.stop_movement(self.owner);
        let bp = self.blueprint(ctx)?;
        tracing::debug!(owner = %self.owner, task = %bp.name, state = ?end, "task finished");
        let _target = ctx.bind(Slot::Target, self.target);
        match end {
            ProcessState::Cancelled => bp.cancellation_sequence.run(ctx, world)?,
            _ => bp.termination_sequence.run(ctx, world)?,
        }
        Ok(true)
    }

    // --- Triggers --------------------------------------------------------

    fn start_triggers(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &World,
    ) -> Result<()> {
        let _target = ctx.bind(Slot::Target, self.target);
        for (trigger, tbp) in self.triggers.iter_mut().zip(&bp.triggers) {
            trigger.init(tbp, bp.sync_fraction.as_ref(), ctx, world)?;
        }
        self.triggers_running = true;
        Ok(())
    }

    fn stop_triggers(&mut self) {
        self.triggers_running = false;
        for trigger in &mut self.triggers {
            trigger.reset();
        }
    }

    fn update_triggers(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<()> {
        if !self.triggers_running {
            return Ok(());
        }
        let _target = ctx.bind(Slot::Target, self.target);
        for (trigger, tbp) in self.triggers.iter_mut().zip(&bp.triggers) {
            if !world.contains(self.owner) {
                break;
            }
            trigger.update(tbp, bp.sync_fraction.as_ref(), ctx, world)?;
        }
        Ok(())
    }

    fn fire_triggers(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        kind: fn(&TriggerKind) -> bool,
    ) -> Result<()> {
        let _target = ctx.bind(Slot::Target, self.target);
        for (trigger, tbp) in self.triggers.iter_mut().zip(&bp.triggers) {
            if kind(&tbp.kind) && world.contains(self.owner) {
                trigger.fire(tbp, ctx, world)?;
            }
        }
        Ok(())
    }

    // --- Kind hooks ------------------------------------------------------

    fn first_acceptable(
        &self,
        bp: &TaskBlueprint,
        candidates: Vec<ObjectId>,
        world: &World,
    ) -> Option<ObjectId> {
        candidates
            .into_iter()
            .find(|id| Self::acceptable(bp, *id, world))
    }

    fn acceptable(bp: &TaskBlueprint, id: ObjectId, world: &World) -> bool {
        world
            .get(id)
            .is_some_and(|o| !(bp.reject_terminated_target && o.terminated))
    }

    fn on_start(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<TaskStep> {
        match &bp.kind {
            TaskKind::ObjectReference => Ok(TaskStep::Continue),
            TaskKind::Move { destination } => {
                let dest = match (self.destination, destination) {
                    (Some(d), _) => Some(d),
                    (None, Some(node)) => {
                        let _target = ctx.bind(Slot::Target, self.target);
                        Some(node.eval(ctx, world)?.position)
                    }
                    (None, None) => self
                        .target
                        .and_then(|t| world.get(t))
                        .map(|o| o.position),
                };
                let Some(dest) = dest else {
                    tracing::warn!(owner = %self.owner, task = %bp.name, "move task has no destination");
                    return Ok(TaskStep::Terminate);
                };
                if let Some(actual) = world.start_movement(self.owner, dest) {
                    self.last_destination = Some(actual);
                    if world.is_moving(self.owner) {
                        let _target = ctx.bind(Slot::Target, self.target);
                        bp.movement_started_sequence.run(ctx, world)?;
                    }
                }
                Ok(TaskStep::Continue)
            }
            TaskKind::Missile { speed } => {
                let Some(target) = self.target.filter(|t| world.contains(*t)) else {
                    tracing::debug!(owner = %self.owner, "missile has no target, removing it");
                    world.remove_object(self.owner);
                    return Ok(TaskStep::Continue);
                };
                let speed = match speed {
                    Some(node) => node.eval(ctx, world)?,
                    None => world.config().default_missile_speed,
                };
                self.launch(world, target, speed);
                Ok(TaskStep::Continue)
            }
            TaskKind::FaceTowards => {
                if let Some(target) = self.target {
                    self.face(world, target);
                }
                Ok(TaskStep::Terminate)
            }
            TaskKind::Spawn { .. } => Ok(TaskStep::Continue),
        }
    }

    fn on_update(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<TaskStep> {
        let bp = self.blueprint(ctx)?;
        match &bp.kind {
            TaskKind::ObjectReference => self.update_object_reference(bp, ctx, world),
            TaskKind::Move { .. } => {
                self.update_triggers(bp, ctx, world)?;
                if world.is_moving(self.owner) {
                    Ok(TaskStep::Continue)
                } else {
                    Ok(TaskStep::Terminate)
                }
            }
            TaskKind::Missile { .. } => self.update_missile(bp, ctx, world),
            TaskKind::FaceTowards => Ok(TaskStep::Terminate),
            TaskKind::Spawn {
                blueprint,
                condition,
                position,
                post_creation,
            } => {
                self.update_triggers(bp, ctx, world)?;
                if !world.contains(self.owner) {
                    return Ok(TaskStep::Continue);
                }
                let _target = ctx.bind(Slot::Target, self.target);
                if condition.eval(ctx, world)? <= 0.0 {
                    return Ok(TaskStep::Continue);
                }
                let at = match position {
                    Some(node) => node.eval(ctx, world)?,
                    None => world.get(self.owner).map_or(OrientedPosition::IDENTITY, |o| {
                        OrientedPosition {
                            position: o.position,
                            rotation: o.orientation,
                        }
                    }),
                };
                let Some(object_bp) = ctx.gameset().object_blueprint(*blueprint) else {
                    return Err(GameError::InvalidState(format!(
                        "missing object blueprint {}",
                        blueprint.0
                    )));
                };
                let parent = world
                    .player_of(self.owner)
                    .or_else(|| world.get(self.owner).and_then(|o| o.parent));
                let mut spawn = object_bp.spawn(*blueprint);
                spawn.parent = parent;
                spawn.position = at.position;
                spawn.orientation = at.rotation;
                spawn.creator = Some(self.owner);
                let created = world.create_object(spawn);
                tracing::debug!(owner = %self.owner, created = %created, "spawn task completed");
                run_post_creation(ctx, world, post_creation, created, Some(self.owner))?;
                Ok(TaskStep::Terminate)
            }
        }
    }

    fn update_object_reference(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<TaskStep> {
        let current_ok = self.target.is_some_and(|t| Self::acceptable(bp, t, world));
        if bp.identify_target_each_cycle || !current_ok {
            let found = match &bp.target {
                Some(finder) => {
                    let _target = ctx.bind(Slot::Target, self.target);
                    self.first_acceptable(bp, finder.eval(ctx, world)?, world)
                }
                None => self.target.filter(|_| current_ok),
            };
            if found != self.target {
                self.set_target(world, found);
                if found.is_some() {
                    tracing::debug!(owner = %self.owner, target = ?found, "task acquired new target");
                    self.proximity_satisfied = false;
                    self.last_destination = None;
                    let _target = ctx.bind(Slot::Target, found);
                    bp.start_sequence.run(ctx, world)?;
                }
            }
        }

        let Some(target) = self.target.filter(|t| Self::acceptable(bp, *t, world)) else {
            return Ok(TaskStep::Terminate);
        };
        let (Some(owner_pos), Some(target_pos)) = (
            world.get(self.owner).map(|o| o.position),
            world.get(target).map(|o| o.position),
        ) else {
            return Ok(TaskStep::Continue);
        };
        let _target = ctx.bind(Slot::Target, Some(target));

        if bp.face_target && target != self.owner {
            self.face(world, target);
        }

        let satisfied = match &bp.proximity {
            Some(node) => owner_pos.distance_xz(target_pos) <= node.eval(ctx, world)?,
            None => true,
        };

        if satisfied {
            if world.is_moving(self.owner) {
                world.stop_movement(self.owner);
            }
            if !self.proximity_satisfied {
                self.proximity_satisfied = true;
                self.last_destination = None;
                bp.proximity_satisfied_sequence.run(ctx, world)?;
                if !world.contains(self.owner) {
                    return Ok(TaskStep::Continue);
                }
                self.start_triggers(bp, ctx, world)?;
            }
            self.select_proximity_animation(bp, ctx, world)?;
            self.update_triggers(bp, ctx, world)?;
        } else {
            if self.proximity_satisfied {
                self.proximity_satisfied = false;
                self.stop_triggers();
            }
            let drifted = self
                .last_destination
                .map_or(true, |d| d.distance_xz(target_pos) > DRIFT_TOLERANCE);
            if drifted {
                let was_moving = world.is_moving(self.owner);
                if world.start_movement(self.owner, target_pos).is_some() {
                    self.last_destination = Some(target_pos);
                    if !was_moving && world.is_moving(self.owner) {
                        bp.movement_started_sequence.run(ctx, world)?;
                        self.apply_animation(bp, world, AnimationPick::Default);
                    }
                }
            }
        }
        Ok(TaskStep::Continue)
    }

    /// Re-scan the proximity list every tick; only a changed choice reaches
    /// the object, so an unchanged choice never restarts its animation.
    fn select_proximity_animation(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<()> {
        if bp.proximity_animations.is_empty() && bp.default_animation.is_none() {
            return Ok(());
        }
        let mut pick = AnimationPick::Default;
        for (i, choice) in bp.proximity_animations.iter().enumerate() {
            if choice.condition.eval(ctx, world)? > 0.0 {
                pick = AnimationPick::Entry(i);
                break;
            }
        }
        self.apply_animation(bp, world, pick);
        Ok(())
    }

    fn apply_animation(&mut self, bp: &TaskBlueprint, world: &mut World, pick: AnimationPick) {
        if pick == self.animation {
            return;
        }
        let animation = match pick {
            AnimationPick::Entry(i) => bp.proximity_animations.get(i).map(|c| c.animation),
            AnimationPick::Default | AnimationPick::Unset => bp.default_animation,
        };
        if animation.is_none() && pick == AnimationPick::Default && self.animation == AnimationPick::Unset {
            return;
        }
        self.animation = pick;
        let sync = bp.sync_fraction.as_ref().map(|_| self.id);
        world.set_animation(self.owner, animation, false, sync);
    }

    fn face(&self, world: &mut World, target: ObjectId) {
        let (Some(from), Some(to)) = (
            world.get(self.owner).map(|o| (o.position, o.orientation)),
            world.get(target).map(|o| o.position),
        ) else {
            return;
        };
        let dir = to - from.0;
        if dir.normalize_xz() == Vec3::ZERO {
            return;
        }
        let heading = dir.heading();
        if (from.1.y - heading).abs() > FACING_TOLERANCE {
            world.set_orientation(self.owner, Vec3::new(from.1.x, heading, from.1.z));
        }
    }

    fn launch(&mut self, world: &mut World, target: ObjectId, speed: f32) {
        let (Some(origin), Some(target_pos)) = (
            world.get(self.owner).map(|o| o.position),
            world.get(target).map(|o| o.position),
        ) else {
            return;
        };
        let gravity = world.config().gravity;
        let lead = missile::flight_time(origin, target_pos, speed);
        let predicted = target_pos + world.velocity(target) * lead;
        let velocity = missile::launch_velocity(origin, predicted, speed, gravity);
        self.missile = Some(MissileFlight {
            origin,
            velocity,
            launch_time: world.now(),
        });
        world.set_orientation(self.owner, Vec3::new(0.0, velocity.heading(), 0.0));
        tracing::debug!(owner = %self.owner, target = %target, "missile launched");
    }

    fn update_missile(
        &mut self,
        bp: &TaskBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<TaskStep> {
        let Some(flight) = self.missile else {
            return Ok(TaskStep::Continue);
        };
        let gravity = world.config().gravity;
        let radius = world.config().missile_hit_radius;
        let t = time_to_f32(world.now() - flight.launch_time);
        let position = missile::position_at(flight.origin, flight.velocity, gravity, t);
        world.set_position(self.owner, position);

        self.update_triggers(bp, ctx, world)?;
        if !world.contains(self.owner) {
            return Ok(TaskStep::Continue);
        }

        // Nothing collides until the missile has left its launch point.
        let launcher = world.get(self.owner).and_then(|o| o.creator);
        let airborne = t > 0.0 && position.distance(flight.origin) > radius;
        let hit = if airborne {
            world
                .objects_within(position, radius)
                .into_iter()
                .filter(|id| *id != self.owner && Some(*id) != launcher)
                .find(|id| world.get(*id).is_some_and(|o| o.position.distance(position) <= radius))
        } else {
            None
        };
        if let Some(subject) = hit {
            tracing::debug!(owner = %self.owner, subject = %subject, "missile collided");
            let _subject = ctx.bind(Slot::CollisionSubject, Some(subject));
            self.fire_triggers(bp, ctx, world, |k| matches!(k, TriggerKind::Collision))?;
            return Ok(TaskStep::Terminate);
        }
        if t > 0.0 && position.y <= 0.0 {
            tracing::debug!(owner = %self.owner, "missile struck floor");
            self.fire_triggers(bp, ctx, world, |k| matches!(k, TriggerKind::StruckFloor))?;
            return Ok(TaskStep::Terminate);
        }
        Ok(TaskStep::Continue)
    }
}
