//! Scoped binding environment for evaluators and actions.
//!
//! An [`ExecutionContext`] maps a fixed set of roles ([`Slot`]) to the
//! object currently playing that role. Bindings are overridden with
//! [`ExecutionContext::bind`], which hands back a guard that restores the
//! previous binding when dropped, on every exit path including `?`.
//!
//! Slots hold plain [`ObjectId`]s. Reading a slot through
//! [`ExecutionContext::read`] checks the id against the world, so a binding
//! to an object destroyed in the meantime reads as empty.

use std::cell::Cell;

use crate::error::{GameError, Result};
use crate::gameset::GameSet;
use crate::ids::ObjectId;
use crate::world::World;

/// Named roles an object can play during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The object executing the current sequence or evaluation.
    SelfObject,
    /// Element under test inside filter and grade nodes.
    Candidate,
    /// Object that created the object being set up.
    Creator,
    /// Target of the current task.
    Target,
    /// Object that assigned the current order.
    OrderGiver,
    /// Object that invoked an `EXECUTE_SEQUENCE`.
    SequenceExecutor,
    /// Object hit by a missile.
    CollisionSubject,
    /// Object picked by a player command.
    SelectedObject,
    /// Sender of the event being reacted to.
    PackageSender,
    /// Self before a `CHAIN` node rebound it.
    ChainOriginalSelf,
}

impl Slot {
    /// Number of slots.
    pub const COUNT: usize = 10;

    /// Every slot, in declaration order.
    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::SelfObject,
        Slot::Candidate,
        Slot::Creator,
        Slot::Target,
        Slot::OrderGiver,
        Slot::SequenceExecutor,
        Slot::CollisionSubject,
        Slot::SelectedObject,
        Slot::PackageSender,
        Slot::ChainOriginalSelf,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Binding environment shared by one evaluation or action run.
///
/// Carries the ruleset so evaluators can resolve equations, sequences and
/// blueprints by index. The world is passed alongside, never stored, so
/// actions can take it mutably while the context is borrowed.
#[derive(Debug)]
pub struct ExecutionContext<'g> {
    gameset: &'g GameSet,
    slots: [Cell<Option<ObjectId>>; Slot::COUNT],
    equation_depth: Cell<u32>,
    max_equation_depth: u32,
}

impl<'g> ExecutionContext<'g> {
    /// Default limit on nested equation references.
    pub const DEFAULT_EQUATION_DEPTH: u32 = 64;

    /// Create a context with every slot empty.
    #[must_use]
    pub fn new(gameset: &'g GameSet) -> Self {
        Self::with_equation_limit(gameset, Self::DEFAULT_EQUATION_DEPTH)
    }

    /// Create a context with a custom equation recursion limit.
    #[must_use]
    pub fn with_equation_limit(gameset: &'g GameSet, max_equation_depth: u32) -> Self {
        Self {
            gameset,
            slots: Default::default(),
            equation_depth: Cell::new(0),
            max_equation_depth,
        }
    }

    /// The ruleset this context evaluates against.
    #[must_use]
    pub fn gameset(&self) -> &'g GameSet {
        self.gameset
    }

    /// Override `slot` until the returned guard is dropped.
    #[must_use = "the binding is restored as soon as the guard is dropped"]
    pub fn bind(&self, slot: Slot, object: Option<ObjectId>) -> SlotGuard<'_> {
        let cell = &self.slots[slot.index()];
        let previous = cell.replace(object);
        SlotGuard { cell, previous }
    }

    /// The raw binding, without checking whether the object still exists.
    #[must_use]
    pub fn raw(&self, slot: Slot) -> Option<ObjectId> {
        self.slots[slot.index()].get()
    }

    /// The currently visible object in `slot`, or `None` if the slot is
    /// empty or its object has since been destroyed.
    #[must_use]
    pub fn read(&self, slot: Slot, world: &World) -> Option<ObjectId> {
        self.raw(slot).filter(|id| world.contains(*id))
    }

    /// Shorthand for reading [`Slot::SelfObject`].
    #[must_use]
    pub fn self_object(&self, world: &World) -> Option<ObjectId> {
        self.read(Slot::SelfObject, world)
    }

    /// Enter an equation, failing once the nesting limit is exceeded.
    pub(crate) fn enter_equation(&self, name: &str) -> Result<EquationGuard<'_>> {
        let depth = self.equation_depth.get();
        if depth >= self.max_equation_depth {
            tracing::error!(equation = name, depth, "equation recursion limit reached");
            return Err(GameError::EquationRecursion {
                equation: name.to_string(),
                depth: self.max_equation_depth,
            });
        }
        self.equation_depth.set(depth + 1);
        Ok(EquationGuard {
            depth: &self.equation_depth,
        })
    }
}

/// Restores a slot's previous binding on drop.
#[derive(Debug)]
pub struct SlotGuard<'c> {
    cell: &'c Cell<Option<ObjectId>>,
    previous: Option<ObjectId>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.previous);
    }
}

/// Decrements the equation depth on drop.
#[derive(Debug)]
pub(crate) struct EquationGuard<'c> {
    depth: &'c Cell<u32>,
}

impl Drop for EquationGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
