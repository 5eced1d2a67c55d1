//! The gameset script interpreter.
//!
//! Three evaluator families ([`NumericNode`], [`FinderNode`],
//! [`PositionNode`]) read the world; [`ActionNode`]s change it. All of
//! them are compiled once from the generic [`Arg`] tree and evaluated
//! against an [`ExecutionContext`] that carries the current slot bindings.

pub mod action;
pub mod args;
pub mod context;
pub mod event;
pub mod finder;
pub mod numeric;
pub mod position;

pub use action::{ActionNode, ActionSequence, ItemOp, OrderAction};
pub use args::Arg;
pub use context::{ExecutionContext, Slot, SlotGuard};
pub use event::send_event;
pub use finder::{FinderNode, Grade};
pub use numeric::{BinaryOp, NumericNode, ObjectMetric, UnaryOp};
pub use position::PositionNode;
