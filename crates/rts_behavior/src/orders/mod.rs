//! Orders and the per-object order queue.
//!
//! An [`Order`] runs its tasks one after another; an
//! [`OrderConfiguration`] is the queue of orders an object holds. Both
//! follow the same `Uninitialised -> Processing <-> Suspended` state machine
//! as [`Task`], ending `Cancelled` or `Terminated`.
//!
//! While an object's orders are being processed its configuration is
//! checked out of the [`World`]. Order operations addressed to it in that
//! window (from its own triggers, say) are queued with
//! [`World::defer_order_op`] and applied right after the processing step;
//! [`apply`] and [`with_orders`] take care of that.

pub mod blueprint;
pub mod missile;
pub mod task;
pub mod trigger;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub use blueprint::{
    AnimationChoice, OrderBlueprint, TaskBlueprint, TaskKind, TriggerBlueprint, TriggerKind,
};
pub use missile::MissileFlight;
pub use task::{Task, TaskStep};
pub use trigger::Trigger;

use crate::error::{GameError, Result};
use crate::ids::{ObjectId, OrderBlueprintId, OrderId, TaskId};
use crate::math::Vec3;
use crate::script::{ExecutionContext, Slot};
use crate::world::{Notification, World};

/// Lifecycle state shared by orders and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Created but not started.
    #[default]
    Uninitialised,
    /// Running.
    Processing,
    /// Paused by a higher-priority order.
    Suspended,
    /// Aborted.
    Cancelled,
    /// Completed.
    Terminated,
}

impl ProcessState {
    /// Cancelled or terminated.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Cancelled | Self::Terminated)
    }

    /// Started and not yet done.
    #[must_use]
    pub const fn is_working(self) -> bool {
        matches!(self, Self::Processing | Self::Suspended)
    }
}

/// Where a newly assigned order goes in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignMode {
    /// In front, suspending the current order.
    DoFirst,
    /// At the back.
    #[default]
    DoLast,
    /// Cancel everything, then do first.
    ForgetEverythingElse,
}

impl AssignMode {
    /// Parse a ruleset tag such as `DO_FIRST`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "DO_FIRST" => Some(Self::DoFirst),
            "DO_LAST" => Some(Self::DoLast),
            "FORGET_EVERYTHING_ELSE" => Some(Self::ForgetEverythingElse),
            _ => None,
        }
    }
}

/// Everything needed to assign an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Order to instantiate.
    pub blueprint: OrderBlueprintId,
    /// Queue placement.
    pub mode: AssignMode,
    /// Target for the first task.
    pub target: Option<ObjectId>,
    /// Destination for the first task.
    pub destination: Option<Vec3>,
    /// Start the order during assignment instead of on the next tick.
    pub start_now: bool,
    /// Object that gave the order.
    pub giver: Option<ObjectId>,
}

impl OrderRequest {
    /// A request with no target, destination or giver.
    #[must_use]
    pub fn new(blueprint: OrderBlueprintId, mode: AssignMode) -> Self {
        Self {
            blueprint,
            mode,
            target: None,
            destination: None,
            start_now: false,
            giver: None,
        }
    }

    /// Set the first task's target.
    #[must_use]
    pub fn with_target(mut self, target: Option<ObjectId>) -> Self {
        self.target = target;
        self
    }

    /// Set the first task's destination.
    #[must_use]
    pub fn with_destination(mut self, destination: Vec3) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Record who gave the order.
    #[must_use]
    pub fn given_by(mut self, giver: Option<ObjectId>) -> Self {
        self.giver = giver;
        self
    }

    /// Start immediately on assignment.
    #[must_use]
    pub fn starting_now(mut self) -> Self {
        self.start_now = true;
        self
    }
}

/// An operation on an object's order queue.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOp {
    /// Add an order.
    Assign(OrderRequest),
    /// Cancel the current order.
    CancelCurrentOrder,
    /// Terminate the current order.
    TerminateCurrentOrder,
    /// Terminate the current order's current task.
    TerminateCurrentTask,
}

/// Runtime state of one order.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    blueprint: OrderBlueprintId,
    owner: ObjectId,
    state: ProcessState,
    tasks: Vec<Task>,
    current: usize,
    giver: Option<ObjectId>,
    previous_target: Option<ObjectId>,
}

impl Order {
    /// Order id, unique per object.
    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.id
    }

    /// Blueprint index.
    #[must_use]
    pub const fn blueprint_id(&self) -> OrderBlueprintId {
        self.blueprint
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Tasks, in blueprint order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Index of the active task.
    #[must_use]
    pub const fn current_task_index(&self) -> usize {
        self.current
    }

    /// The active task.
    #[must_use]
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current)
    }

    fn blueprint<'g>(&self, ctx: &ExecutionContext<'g>) -> Result<&'g OrderBlueprint> {
        ctx.gameset()
            .order(self.blueprint)
            .ok_or_else(|| GameError::InvalidState(format!("missing order blueprint {}", self.blueprint.0)))
    }

    /// Run the start sequence. A no-op if already working.
    pub(crate) fn start(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        if self.state.is_working() || self.state.is_done() {
            return Ok(());
        }
        let bp = self.blueprint(ctx)?;
        self.state = ProcessState::Processing;
        tracing::debug!(owner = %self.owner, order = %bp.name, "order started");
        let _giver = ctx.bind(Slot::OrderGiver, self.giver);
        bp.start_sequence.run(ctx, world)
    }

    pub(crate) fn suspend(&mut self, world: &mut World) {
        if self.state != ProcessState::Processing {
            return;
        }
        self.state = ProcessState::Suspended;
        if let Some(task) = self.tasks.get_mut(self.current) {
            task.suspend(world);
        }
        tracing::debug!(owner = %self.owner, order = self.id.0, "order suspended");
    }

    /// One tick of work on the current task.
    pub(crate) fn process(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        match self.state {
            ProcessState::Cancelled | ProcessState::Terminated => return Ok(()),
            ProcessState::Suspended => {
                // The task resumes itself on its next process call.
                self.state = ProcessState::Processing;
                tracing::debug!(owner = %self.owner, order = self.id.0, "order resumed");
            }
            ProcessState::Uninitialised => self.start(ctx, world)?,
            ProcessState::Processing => {}
        }
        if self.state.is_done() || !world.contains(self.owner) {
            return Ok(());
        }
        if self.tasks.is_empty() {
            self.terminate(ctx, world)?;
            return Ok(());
        }
        let _giver = ctx.bind(Slot::OrderGiver, self.giver);
        let index = self.current;
        let step = self.tasks[index].process(ctx, world, self.previous_target)?;
        if step == TaskStep::Terminate {
            self.terminate_task(ctx, world, index)?;
        }
        Ok(())
    }

    /// Terminate task `index` and, if it was the active one, move on.
    pub(crate) fn terminate_task(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        index: usize,
    ) -> Result<()> {
        let Some(task) = self.tasks.get_mut(index) else {
            return Ok(());
        };
        if task.terminate(ctx, world)? && index == self.current && !self.state.is_done() {
            self.advance_to_next_task(ctx, world)?;
        }
        Ok(())
    }

    fn advance_to_next_task(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<()> {
        self.previous_target = self.tasks.get(self.current).and_then(Task::target);
        let mut next = self.current + 1;
        if next >= self.tasks.len() {
            if !self.blueprint(ctx)?.cycle {
                return self.terminate(ctx, world).map(|_| ());
            }
            next = 0;
        }
        self.current = next;
        self.tasks[next].reset();
        Ok(())
    }

    /// Cancel. Returns `false` if the order was already done.
    pub fn cancel(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        self.state = ProcessState::Cancelled;
        let bp = self.blueprint(ctx)?;
        tracing::debug!(owner = %self.owner, order = %bp.name, "order cancelled");
        let _giver = ctx.bind(Slot::OrderGiver, self.giver);
        if let Some(task) = self.tasks.get_mut(self.current) {
            task.cancel(ctx, world)?;
        }
        bp.cancellation_sequence.run(ctx, world)?;
        Ok(true)
    }

    /// Terminate. Returns `false` if the order was already done.
    pub fn terminate(&mut self, ctx: &ExecutionContext<'_>, world: &mut World) -> Result<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        self.state = ProcessState::Terminated;
        let bp = self.blueprint(ctx)?;
        tracing::debug!(owner = %self.owner, order = %bp.name, "order terminated");
        let _giver = ctx.bind(Slot::OrderGiver, self.giver);
        if let Some(task) = self.tasks.get_mut(self.current) {
            task.terminate(ctx, world)?;
        }
        bp.termination_sequence.run(ctx, world)?;
        Ok(true)
    }

    /// Drop every task's target link.
    pub(crate) fn release(&mut self, world: &mut World) {
        for task in &mut self.tasks {
            task.release(world);
        }
    }
}

/// Queue of orders held by one object.
#[derive(Debug, Clone, Default)]
pub struct OrderConfiguration {
    orders: VecDeque<Order>,
    busy: bool,
    next_order_id: u32,
    next_task_id: u32,
}

impl OrderConfiguration {
    /// Number of orders not yet done.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.iter().filter(|o| !o.state.is_done()).count()
    }

    /// No order left to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The order that runs next tick, if any.
    #[must_use]
    pub fn current_order(&self) -> Option<&Order> {
        self.orders.iter().find(|o| !o.state.is_done())
    }

    fn current_order_mut(&mut self) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| !o.state.is_done())
    }

    /// Every queued order, including finished ones awaiting removal.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Whether the object counted as busy at the end of its last step.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Add an order.
    ///
    /// Returns the new order's id, or `None` if a running uninterruptible
    /// order refused a do-first or forget-everything-else assignment.
    pub fn add_order(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        owner: ObjectId,
        request: OrderRequest,
    ) -> Result<Option<OrderId>> {
        let gameset = ctx.gameset();
        let bp = gameset.order(request.blueprint).ok_or_else(|| {
            GameError::InvalidState(format!("missing order blueprint {}", request.blueprint.0))
        })?;
        let _self = ctx.bind(Slot::SelfObject, Some(owner));

        if request.mode != AssignMode::DoLast {
            if let Some(head) = self.current_order().filter(|o| o.state.is_working()) {
                let locked = gameset.order(head.blueprint).is_some_and(|b| b.uninterruptible);
                if locked {
                    tracing::warn!(
                        object = %owner,
                        order = %bp.name,
                        "current order cannot be interrupted, assignment ignored"
                    );
                    return Ok(None);
                }
            }
        }

        if request.mode == AssignMode::ForgetEverythingElse {
            for order in &mut self.orders {
                order.cancel(ctx, world)?;
            }
            for mut order in self.orders.drain(..) {
                order.release(world);
            }
        }

        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        let mut tasks = Vec::with_capacity(bp.tasks.len());
        for task_bp in &bp.tasks {
            let triggers = gameset.task(*task_bp).map_or(0, |t| t.triggers.len());
            tasks.push(Task::new(TaskId(self.next_task_id), *task_bp, owner, triggers));
            self.next_task_id += 1;
        }
        if let Some(first) = tasks.first_mut() {
            first.set_target(world, request.target);
            first.set_destination(request.destination);
        }
        let mut order = Order {
            id,
            blueprint: request.blueprint,
            owner,
            state: ProcessState::Uninitialised,
            tasks,
            current: 0,
            giver: request.giver,
            previous_target: None,
        };

        tracing::debug!(object = %owner, order = %bp.name, mode = ?request.mode, "order assigned");
        world.notify(Notification::OrderAssigned {
            object: owner,
            order: request.blueprint,
            mode: request.mode,
        });

        match request.mode {
            AssignMode::DoLast => self.orders.push_back(order),
            AssignMode::DoFirst | AssignMode::ForgetEverythingElse => {
                let ahead_working = self.current_order().is_some_and(|o| o.state.is_working());
                if let Some(head) = self.current_order_mut() {
                    head.suspend(world);
                }
                if request.start_now && !ahead_working {
                    order.start(ctx, world)?;
                }
                self.orders.push_front(order);
            }
        }
        self.busy = true;
        Ok(Some(id))
    }

    /// One tick: drop finished orders, then process the current one.
    ///
    /// Call [`OrderConfiguration::idle_edge`] once operations queued during
    /// the step have been applied.
    pub fn process(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        owner: ObjectId,
    ) -> Result<()> {
        let _self = ctx.bind(Slot::SelfObject, Some(owner));
        while self.orders.front().is_some_and(|o| o.state.is_done()) {
            if let Some(mut done) = self.orders.pop_front() {
                done.release(world);
            }
        }
        if let Some(front) = self.orders.front_mut() {
            front.process(ctx, world)?;
        }
        Ok(())
    }

    /// Record whether the object is busy now. Returns `true` exactly when
    /// it was busy at the previous call and has no order left.
    pub fn idle_edge(&mut self) -> bool {
        let busy = !self.is_empty();
        let went_idle = self.busy && !busy;
        self.busy = busy;
        went_idle
    }

    /// Apply a queued operation.
    pub fn apply(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
        owner: ObjectId,
        op: OrderOp,
    ) -> Result<Option<OrderId>> {
        let _self = ctx.bind(Slot::SelfObject, Some(owner));
        match op {
            OrderOp::Assign(request) => return self.add_order(ctx, world, owner, request),
            OrderOp::CancelCurrentOrder => {
                self.cancel_current_order(ctx, world)?;
            }
            OrderOp::TerminateCurrentOrder => {
                self.terminate_current_order(ctx, world)?;
            }
            OrderOp::TerminateCurrentTask => {
                self.terminate_current_task(ctx, world)?;
            }
        }
        Ok(None)
    }

    /// Cancel the current order. Returns `false` if there was none.
    pub fn cancel_current_order(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<bool> {
        match self.current_order_mut() {
            Some(order) => order.cancel(ctx, world),
            None => Ok(false),
        }
    }

    /// Terminate the current order. Returns `false` if there was none.
    pub fn terminate_current_order(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<bool> {
        match self.current_order_mut() {
            Some(order) => order.terminate(ctx, world),
            None => Ok(false),
        }
    }

    /// Terminate the current task of the current order, advancing the
    /// order.
    pub fn terminate_current_task(
        &mut self,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<()> {
        let Some(order) = self.current_order_mut() else {
            return Ok(());
        };
        let index = order.current;
        let _giver = ctx.bind(Slot::OrderGiver, order.giver);
        order.terminate_task(ctx, world, index)
    }

    /// Drop every order without running sequences, releasing task targets.
    pub fn release(&mut self, world: &mut World, owner: ObjectId) {
        if self.orders.is_empty() {
            return;
        }
        tracing::trace!(object = %owner, orders = self.orders.len(), "releasing orders");
        for mut order in self.orders.drain(..) {
            order.release(world);
        }
        self.busy = false;
    }
}

/// Run `f` on an object's checked-out order configuration, then apply
/// any operations queued for the object meanwhile.
///
/// Returns `Ok(None)` if the object does not exist or its configuration is
/// already checked out.
pub fn with_orders<R>(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    object: ObjectId,
    f: impl FnOnce(&mut OrderConfiguration, &mut World) -> Result<R>,
) -> Result<Option<R>> {
    let Some(mut orders) = world.take_orders(object) else {
        return Ok(None);
    };
    let result = f(&mut orders, world);
    world.restore_orders(object, orders);
    let value = result?;
    drain_deferred(ctx, world, object)?;
    Ok(Some(value))
}

fn drain_deferred(ctx: &ExecutionContext<'_>, world: &mut World, object: ObjectId) -> Result<()> {
    let passes = world.config().max_deferred_order_passes;
    for _ in 0..passes {
        let ops = world.take_deferred_orders(object);
        if ops.is_empty() {
            return Ok(());
        }
        let Some(mut orders) = world.take_orders(object) else {
            return Ok(());
        };
        let mut result = Ok(());
        for op in ops {
            if !world.contains(object) {
                break;
            }
            if let Err(err) = orders.apply(ctx, world, object, op) {
                result = Err(err);
                break;
            }
        }
        world.restore_orders(object, orders);
        result?;
    }
    let dropped = world.take_deferred_orders(object);
    if !dropped.is_empty() {
        tracing::warn!(
            object = %object,
            dropped = dropped.len(),
            "order operations kept re-queueing themselves, dropping the rest"
        );
    }
    Ok(())
}

/// Apply an order operation to an object, queueing it if the object's
/// orders are being processed right now.
///
/// A missing object is a warning, not an error.
pub fn apply(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    object: ObjectId,
    op: OrderOp,
) -> Result<Option<OrderId>> {
    if !world.contains(object) {
        tracing::warn!(object = %object, ?op, "order operation on missing object");
        return Ok(None);
    }
    if world.orders_checked_out(object) {
        world.defer_order_op(object, op);
        return Ok(None);
    }
    with_orders(ctx, world, object, |orders, world| {
        orders.apply(ctx, world, object, op)
    })
    .map(Option::flatten)
}

/// Assign an order to an object. Shorthand for [`apply`] with
/// [`OrderOp::Assign`].
pub fn assign(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    object: ObjectId,
    request: OrderRequest,
) -> Result<Option<OrderId>> {
    apply(ctx, world, object, OrderOp::Assign(request))
}
