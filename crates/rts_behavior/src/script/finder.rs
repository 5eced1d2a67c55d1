//! Object query evaluators ("finders").
//!
//! A finder evaluates to an ordered list of live object ids without
//! duplicates. Set operations keep the order of their first operand;
//! spatial and tree walks return ascending ids.

use std::collections::HashSet;

use rand::seq::index;

use crate::error::{GameError, Result};
use crate::gameset::Symbols;
use crate::ids::ObjectId;
use crate::world::{ObjectClass, World};

use super::args::{Arg, ArgCursor};
use super::context::{ExecutionContext, Slot};
use super::numeric::NumericNode;

const FAMILY: &str = "finder";

/// Which end of a graded list to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    /// Highest values first.
    Top,
    /// Lowest values first.
    Bottom,
}

/// A compiled object query.
#[derive(Debug, Clone)]
pub enum FinderNode {
    /// The object bound to a context slot.
    Slot(Slot),
    /// A fixed object id.
    SpecificId(ObjectId),
    /// Player owning each object found.
    Player(Box<FinderNode>),
    /// Parent of each object found.
    Parent(Box<FinderNode>),
    /// The level object.
    Level,
    /// Objects whose tasks target any object found.
    Referencers(Box<FinderNode>),
    /// All descendants of the objects found, optionally of one class.
    Subordinates {
        /// Roots of the walk.
        of: Box<FinderNode>,
        /// Keep only this class.
        class: Option<ObjectClass>,
    },
    /// Objects found by any operand.
    Union(Vec<FinderNode>),
    /// Objects found by every operand.
    Intersection(Vec<FinderNode>),
    /// Each stage runs with self bound to each result of the previous one.
    Chain(Vec<FinderNode>),
    /// Result of the first operand that finds anything.
    Alternative(Vec<FinderNode>),
    /// Objects for which the condition holds, with candidate bound.
    Filter(Box<FinderNode>, NumericNode),
    /// Like `Filter` but stops after `count` matches.
    FilterFirst {
        /// Maximum number of matches.
        count: usize,
        /// Objects to test.
        of: Box<FinderNode>,
        /// Condition, with candidate bound.
        condition: NumericNode,
    },
    /// The `count` best objects by a grading value, with candidate bound.
    GradeSelect {
        /// Which end to keep.
        grade: Grade,
        /// How many to keep.
        count: usize,
        /// Objects to grade.
        of: Box<FinderNode>,
        /// Grading value.
        value: NumericNode,
    },
    /// `count` objects picked at random, in their original order.
    RandomSelection {
        /// How many to pick.
        count: usize,
        /// Objects to pick from.
        of: Box<FinderNode>,
    },
    /// Interactable objects within `radius` of any centre object.
    WithinRadius {
        /// Centre objects.
        centre: Box<FinderNode>,
        /// Search radius.
        radius: NumericNode,
        /// Keep only this class.
        class: Option<ObjectClass>,
    },
    /// Always empty.
    Nothing,
    /// Placeholder for an unrecognised kind. Evaluating it is an error.
    Unknown(String),
}

fn slot_for(tag: &str) -> Option<Slot> {
    Some(match tag {
        "SELF" => Slot::SelfObject,
        "CANDIDATE" => Slot::Candidate,
        "CREATOR" => Slot::Creator,
        "TARGET" => Slot::Target,
        "ORDER_GIVER" => Slot::OrderGiver,
        "SEQUENCE_EXECUTOR" => Slot::SequenceExecutor,
        "COLLISION_SUBJECT" => Slot::CollisionSubject,
        "SELECTED_OBJECT" => Slot::SelectedObject,
        "PACKAGE_SENDER" => Slot::PackageSender,
        "CHAIN_ORIGINAL_SELF" => Slot::ChainOriginalSelf,
        _ => return None,
    })
}

fn count_arg(cur: &mut ArgCursor<'_>) -> Result<usize> {
    let v = cur.literal()?;
    if v < 0.0 || v.fract() != 0.0 {
        return Err(cur.error(format!("count must be a non-negative integer, got {v}")));
    }
    Ok(v as usize)
}

fn class_arg(cur: &mut ArgCursor<'_>) -> Result<Option<ObjectClass>> {
    let Some(arg) = cur.next_opt() else {
        return Ok(None);
    };
    match arg {
        Arg::Name(name) => ObjectClass::from_tag(name)
            .map(Some)
            .ok_or_else(|| cur.error(format!("unknown object class '{name}'"))),
        other => Err(cur.error(format!("expected a class name, found {}", other.describe()))),
    }
}

/// Append `id` unless already present.
fn push_unique(out: &mut Vec<ObjectId>, seen: &mut HashSet<ObjectId>, id: ObjectId) {
    if seen.insert(id) {
        out.push(id);
    }
}

impl FinderNode {
    /// Compile an argument into a finder.
    ///
    /// A bare name is shorthand for a no-argument node such as `SELF`.
    pub fn compile(arg: &Arg, symbols: &Symbols) -> Result<Self> {
        match arg {
            Arg::Node(kind, args) => Self::compile_node(kind, args, symbols),
            Arg::Name(kind) => Self::compile_node(kind, &[], symbols),
            other => Err(GameError::malformed(
                FAMILY,
                "<value>",
                format!("expected a finder node, found {}", other.describe()),
            )),
        }
    }

    fn compile_node(kind: &str, args: &[Arg], symbols: &Symbols) -> Result<Self> {
        let tag = kind.to_ascii_uppercase();
        let mut cur = ArgCursor::new(FAMILY, kind, args);
        let find = |cur: &mut ArgCursor<'_>| -> Result<Box<Self>> {
            Ok(Box::new(Self::compile(cur.next()?, symbols)?))
        };
        let find_or_self = |cur: &mut ArgCursor<'_>| -> Result<Box<Self>> {
            match cur.next_opt() {
                Some(arg) => Ok(Box::new(Self::compile(arg, symbols)?)),
                None => Ok(Box::new(Self::Slot(Slot::SelfObject))),
            }
        };
        let rest = |cur: &mut ArgCursor<'_>| -> Result<Vec<Self>> {
            let mut out = Vec::new();
            while let Some(arg) = cur.next_opt() {
                out.push(Self::compile(arg, symbols)?);
            }
            if out.is_empty() {
                return Err(cur.error("needs at least one operand"));
            }
            Ok(out)
        };

        let node = if let Some(slot) = slot_for(&tag) {
            Self::Slot(slot)
        } else {
            match tag.as_str() {
                "SPECIFIC_ID" => Self::SpecificId(ObjectId(count_arg(&mut cur)? as u32)),
                "PLAYER" => Self::Player(find_or_self(&mut cur)?),
                "PARENT" => Self::Parent(find_or_self(&mut cur)?),
                "LEVEL" => Self::Level,
                "REFERENCERS" => Self::Referencers(find_or_self(&mut cur)?),
                "SUBORDINATES" => Self::Subordinates {
                    of: find(&mut cur)?,
                    class: class_arg(&mut cur)?,
                },
                "UNION" => Self::Union(rest(&mut cur)?),
                "INTERSECTION" => Self::Intersection(rest(&mut cur)?),
                "CHAIN" => Self::Chain(rest(&mut cur)?),
                "ALTERNATIVE" => Self::Alternative(rest(&mut cur)?),
                "FILTER" => {
                    let of = find(&mut cur)?;
                    Self::Filter(of, NumericNode::compile(cur.next()?, symbols)?)
                }
                "FILTER_FIRST" => {
                    let count = count_arg(&mut cur)?;
                    let of = find(&mut cur)?;
                    Self::FilterFirst {
                        count,
                        of,
                        condition: NumericNode::compile(cur.next()?, symbols)?,
                    }
                }
                "GRADE_SELECT" => {
                    let grade = match cur.name()?.to_ascii_uppercase().as_str() {
                        "TOP" => Grade::Top,
                        "BOTTOM" => Grade::Bottom,
                        other => return Err(cur.error(format!("expected TOP or BOTTOM, found '{other}'"))),
                    };
                    let count = count_arg(&mut cur)?;
                    let of = find(&mut cur)?;
                    Self::GradeSelect {
                        grade,
                        count,
                        of,
                        value: NumericNode::compile(cur.next()?, symbols)?,
                    }
                }
                "RANDOM_SELECTION" => {
                    let count = count_arg(&mut cur)?;
                    Self::RandomSelection {
                        count,
                        of: find(&mut cur)?,
                    }
                }
                "WITHIN_RADIUS" => {
                    let centre = find(&mut cur)?;
                    let radius = NumericNode::compile(cur.next()?, symbols)?;
                    Self::WithinRadius {
                        centre,
                        radius,
                        class: class_arg(&mut cur)?,
                    }
                }
                "NOTHING" => Self::Nothing,
                _ => {
                    tracing::warn!(kind, "unknown finder node, compiled as placeholder");
                    return Ok(Self::Unknown(kind.to_string()));
                }
            }
        };
        cur.finish()?;
        Ok(node)
    }

    /// Evaluate against the world.
    pub fn eval(&self, ctx: &ExecutionContext<'_>, world: &World) -> Result<Vec<ObjectId>> {
        Ok(match self {
            Self::Slot(slot) => ctx.read(*slot, world).into_iter().collect(),
            Self::SpecificId(id) => Some(*id).filter(|id| world.contains(*id)).into_iter().collect(),
            Self::Player(of) => {
                Self::map_unique(of.eval(ctx, world)?, |id| world.player_of(id))
            }
            Self::Parent(of) => Self::map_unique(of.eval(ctx, world)?, |id| {
                world.get(id).and_then(|o| o.parent)
            }),
            Self::Level => world.level().into_iter().collect(),
            Self::Referencers(of) => {
                let mut out: Vec<ObjectId> = Vec::new();
                for id in of.eval(ctx, world)? {
                    out.extend(world.referencers(id).iter().copied().filter(|r| world.contains(*r)));
                }
                out.sort_unstable();
                out.dedup();
                out
            }
            Self::Subordinates { of, class } => {
                let mut out = Vec::new();
                let mut stack = of.eval(ctx, world)?;
                while let Some(id) = stack.pop() {
                    let Some(obj) = world.get(id) else { continue };
                    for child in &obj.children {
                        if let Some(c) = world.get(*child) {
                            if class.map_or(true, |k| c.class == k) {
                                out.push(*child);
                            }
                            stack.push(*child);
                        }
                    }
                }
                out.sort_unstable();
                out.dedup();
                out
            }
            Self::Union(parts) => {
                let mut out = Vec::new();
                let mut seen = HashSet::new();
                for part in parts {
                    for id in part.eval(ctx, world)? {
                        push_unique(&mut out, &mut seen, id);
                    }
                }
                out
            }
            Self::Intersection(parts) => {
                let (first, others) = parts
                    .split_first()
                    .ok_or_else(|| GameError::malformed(FAMILY, "INTERSECTION", "no operands"))?;
                let mut out = first.eval(ctx, world)?;
                for part in others {
                    let keep: HashSet<ObjectId> = part.eval(ctx, world)?.into_iter().collect();
                    out.retain(|id| keep.contains(id));
                }
                out
            }
            Self::Chain(stages) => {
                let original = ctx.raw(Slot::SelfObject);
                let _original = ctx.bind(Slot::ChainOriginalSelf, original);
                let mut current: Option<Vec<ObjectId>> = None;
                for stage in stages {
                    current = Some(match current {
                        None => stage.eval(ctx, world)?,
                        Some(inputs) => {
                            let mut out = Vec::new();
                            let mut seen = HashSet::new();
                            for id in inputs {
                                let _self = ctx.bind(Slot::SelfObject, Some(id));
                                for found in stage.eval(ctx, world)? {
                                    push_unique(&mut out, &mut seen, found);
                                }
                            }
                            out
                        }
                    });
                }
                current.unwrap_or_default()
            }
            Self::Alternative(options) => {
                for option in options {
                    let found = option.eval(ctx, world)?;
                    if !found.is_empty() {
                        return Ok(found);
                    }
                }
                Vec::new()
            }
            Self::Filter(of, condition) => {
                Self::filter(of.eval(ctx, world)?, usize::MAX, condition, ctx, world)?
            }
            Self::FilterFirst {
                count,
                of,
                condition,
            } => Self::filter(of.eval(ctx, world)?, *count, condition, ctx, world)?,
            Self::GradeSelect {
                grade,
                count,
                of,
                value,
            } => {
                let mut graded = Vec::new();
                for id in of.eval(ctx, world)? {
                    let _candidate = ctx.bind(Slot::Candidate, Some(id));
                    graded.push((id, value.eval(ctx, world)?));
                }
                // Stable: equal grades keep input order.
                match grade {
                    Grade::Top => graded.sort_by(|a, b| b.1.total_cmp(&a.1)),
                    Grade::Bottom => graded.sort_by(|a, b| a.1.total_cmp(&b.1)),
                }
                graded.into_iter().take(*count).map(|(id, _)| id).collect()
            }
            Self::RandomSelection { count, of } => {
                let found = of.eval(ctx, world)?;
                if *count >= found.len() {
                    found
                } else {
                    let mut picked =
                        world.with_rng(|rng| index::sample(rng, found.len(), *count).into_vec());
                    picked.sort_unstable();
                    picked.into_iter().map(|i| found[i]).collect()
                }
            }
            Self::WithinRadius {
                centre,
                radius,
                class,
            } => {
                let radius = radius.eval(ctx, world)?;
                let mut out = Vec::new();
                for id in centre.eval(ctx, world)? {
                    let Some(obj) = world.get(id) else { continue };
                    out.extend(
                        world
                            .objects_within(obj.position, radius)
                            .into_iter()
                            .filter(|f| class.map_or(true, |k| world.get(*f).is_some_and(|o| o.class == k))),
                    );
                }
                out.sort_unstable();
                out.dedup();
                out
            }
            Self::Nothing => Vec::new(),
            Self::Unknown(kind) => {
                tracing::error!(kind = %kind, "unknown finder node evaluated");
                return Err(GameError::UnknownNode {
                    family: FAMILY,
                    kind: kind.clone(),
                });
            }
        })
    }

    fn map_unique(
        found: Vec<ObjectId>,
        f: impl Fn(ObjectId) -> Option<ObjectId>,
    ) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for id in found.into_iter().filter_map(f) {
            push_unique(&mut out, &mut seen, id);
        }
        out
    }

    fn filter(
        found: Vec<ObjectId>,
        limit: usize,
        condition: &NumericNode,
        ctx: &ExecutionContext<'_>,
        world: &World,
    ) -> Result<Vec<ObjectId>> {
        let mut out = Vec::new();
        for id in found {
            if out.len() >= limit {
                break;
            }
            let _candidate = ctx.bind(Slot::Candidate, Some(id));
            if condition.eval(ctx, world)? > 0.0 {
                out.push(id);
            }
        }
        Ok(out)
    }
}
