//! Numeric evaluators.
//!
//! Every node evaluates to an `f32`; booleans are `1.0`/`0.0` and any value
//! `> 0` counts as true.

use rand::Rng;

use crate::error::{GameError, Result};
use crate::gameset::Symbols;
use crate::ids::{EquationId, ItemId, ObjectBlueprintId, ObjectId};
use crate::math::time_to_f32;
use crate::world::{ObjectClass, World};

use super::args::{Arg, ArgCursor};
use super::context::ExecutionContext;
use super::finder::FinderNode;

const FAMILY: &str = "numeric";

/// Per-object metric read from the first object a finder returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectMetric {
    /// Object id, or 0 when nothing was found.
    Id,
    /// Number of objects found (not just the first).
    Count,
    /// Length of the referencer list.
    Referencers,
    /// Orders not yet done.
    Orders,
    /// No orders left.
    Idle,
    /// Currently moving.
    Moving,
    /// Disabled flag.
    Disabled,
    /// Terminated flag.
    Terminated,
}

impl ObjectMetric {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "OBJECT_ID" => Self::Id,
            "NUM_OBJECTS" => Self::Count,
            "NUM_REFERENCERS" => Self::Referencers,
            "NUM_ORDERS" => Self::Orders,
            "IS_IDLE" => Self::Idle,
            "IS_MOVING" => Self::Moving,
            "IS_DISABLED" => Self::Disabled,
            "IS_TERMINATED" => Self::Terminated,
            _ => return None,
        })
    }

    fn measure(self, found: &[ObjectId], world: &World) -> f32 {
        if self == Self::Count {
            return found.len() as f32;
        }
        let Some(id) = found.first().copied() else {
            return 0.0;
        };
        let Some(obj) = world.get(id) else {
            return 0.0;
        };
        match self {
            Self::Id => id.raw() as f32,
            Self::Count => found.len() as f32,
            Self::Referencers => obj.referencers.len() as f32,
            Self::Orders => world.order_count(id) as f32,
            Self::Idle => truth(world.order_count(id) == 0),
            Self::Moving => truth(obj.movement.is_moving()),
            Self::Disabled => truth(obj.disabled),
            Self::Terminated => truth(obj.terminated),
        }
    }
}

/// One-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-a`
    Negate,
    /// `a <= 0`
    Not,
    /// `|a|`
    Abs,
    /// `a == 0`
    IsZero,
    /// `a > 0`
    IsPositive,
    /// `a < 0`
    IsNegative,
    /// Round half away from zero.
    Round,
    /// Round down.
    Floor,
    /// Round up.
    Ceil,
    /// Uniform in `[0, a)`.
    RandomUpTo,
}

impl UnaryOp {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "NEGATE" => Self::Negate,
            "NOT" => Self::Not,
            "ABS" | "ABSOLUTE_VALUE" => Self::Abs,
            "IS_ZERO" => Self::IsZero,
            "IS_POSITIVE" => Self::IsPositive,
            "IS_NEGATIVE" => Self::IsNegative,
            "ROUND" => Self::Round,
            "FLOOR" => Self::Floor,
            "CEIL" => Self::Ceil,
            "RANDOM_UP_TO" => Self::RandomUpTo,
            _ => return None,
        })
    }

    fn apply(self, a: f32, world: &World) -> f32 {
        match self {
            Self::Negate => -a,
            Self::Not => truth(a <= 0.0),
            Self::Abs => a.abs(),
            Self::IsZero => truth(a == 0.0),
            Self::IsPositive => truth(a > 0.0),
            Self::IsNegative => truth(a < 0.0),
            Self::Round => a.round(),
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::RandomUpTo => {
                if a > 0.0 {
                    world.with_rng(|rng| rng.gen::<f32>() * a)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Two-operand operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`, 0 when `b` is 0.
    Div,
    /// Remainder, 0 when `b` is 0.
    Mod,
    /// Smaller operand.
    Min,
    /// Larger operand.
    Max,
    /// Both true.
    And,
    /// Either true.
    Or,
    /// `a < b`
    Less,
    /// `a <= b`
    LessOrEqual,
    /// `a > b`
    Greater,
    /// `a >= b`
    GreaterOrEqual,
    /// `a == b`
    Equals,
    /// Uniform integer in `[min(a, b), max(a, b)]`.
    RandomInteger,
}

impl BinaryOp {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "ADDITION" => Self::Add,
            "SUBTRACTION" => Self::Sub,
            "MULTIPLICATION" => Self::Mul,
            "DIVISION" => Self::Div,
            "MODULO" => Self::Mod,
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "AND" => Self::And,
            "OR" => Self::Or,
            "LESS_THAN" => Self::Less,
            "LESS_THAN_OR_EQUAL_TO" => Self::LessOrEqual,
            "GREATER_THAN" => Self::Greater,
            "GREATER_THAN_OR_EQUAL_TO" => Self::GreaterOrEqual,
            "EQUALS" => Self::Equals,
            "RANDOM_INTEGER" => Self::RandomInteger,
            _ => return None,
        })
    }

    fn apply(self, a: f32, b: f32, world: &World) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            Self::Mod => {
                if b == 0.0 {
                    0.0
                } else {
                    a % b
                }
            }
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::And => truth(a > 0.0 && b > 0.0),
            Self::Or => truth(a > 0.0 || b > 0.0),
            Self::Less => truth(a < b),
            Self::LessOrEqual => truth(a <= b),
            Self::Greater => truth(a > b),
            Self::GreaterOrEqual => truth(a >= b),
            Self::Equals => truth(a == b),
            Self::RandomInteger => {
                let lo = a.min(b).ceil() as i32;
                let hi = a.max(b).floor() as i32;
                if lo >= hi {
                    lo as f32
                } else {
                    world.with_rng(|rng| rng.gen_range(lo..=hi)) as f32
                }
            }
        }
    }
}

/// A compiled numeric expression.
#[derive(Debug, Clone)]
pub enum NumericNode {
    /// Literal, including folded defined values.
    Constant(f32),
    /// Item value of the first object found; 0 when nothing is found.
    ItemValue {
        /// Item to read.
        item: ItemId,
        /// Objects to read from.
        finder: Box<FinderNode>,
    },
    /// A property of the objects found.
    Metric(ObjectMetric, Box<FinderNode>),
    /// Whether two finders return the same set.
    IsIdenticalTo(Box<FinderNode>, Box<FinderNode>),
    /// Whether the first object found has the given blueprint.
    ObjectType {
        /// Blueprint to compare against.
        blueprint: ObjectBlueprintId,
        /// Object to test.
        finder: Box<FinderNode>,
    },
    /// Whether the first object found has the given class.
    ObjectClass {
        /// Class to compare against.
        class: ObjectClass,
        /// Object to test.
        finder: Box<FinderNode>,
    },
    /// Whether every object of the first set is in the second.
    IsSubsetOf(Box<FinderNode>, Box<FinderNode>),
    /// Ground distance between the first objects of two finders.
    DistanceBetween(Box<FinderNode>, Box<FinderNode>),
    /// Simulation time in seconds.
    CurrentTime,
    /// Reference to a named equation, looked up at evaluation time.
    Equation(EquationId),
    /// One-operand operator.
    Unary(UnaryOp, Box<NumericNode>),
    /// Two-operand operator.
    Binary(BinaryOp, Box<NumericNode>, Box<NumericNode>),
    /// `if c > 0 then a else b`; only the chosen branch is evaluated.
    IfThenElse(Box<NumericNode>, Box<NumericNode>, Box<NumericNode>),
    /// `lo <= x <= hi`
    IsBetween(Box<NumericNode>, Box<NumericNode>, Box<NumericNode>),
    /// Linear interpolation from `a` to `b` as `t` goes from 0 to `tmax`.
    Interpolate(
        Box<NumericNode>,
        Box<NumericNode>,
        Box<NumericNode>,
        Box<NumericNode>,
    ),
    /// Placeholder for an unrecognised kind. Evaluating it is an error.
    Unknown(String),
}

impl Default for NumericNode {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

fn truth(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl NumericNode {
    /// Compile an argument into a numeric node.
    ///
    /// A bare number is a constant and a bare name is a defined value.
    pub fn compile(arg: &Arg, symbols: &Symbols) -> Result<Self> {
        match arg {
            Arg::Num(v) => Ok(Self::Constant(*v)),
            Arg::Name(name) => symbols.defined_value(name).map(Self::Constant).ok_or_else(|| {
                GameError::UnresolvedReference {
                    category: "defined value",
                    name: name.clone(),
                }
            }),
            Arg::List(_) => Err(GameError::malformed(
                FAMILY,
                "<list>",
                "expected a numeric node, found a list",
            )),
            Arg::Node(kind, args) => Self::compile_node(kind, args, symbols),
        }
    }

    fn compile_node(kind: &str, args: &[Arg], symbols: &Symbols) -> Result<Self> {
        let tag = kind.to_ascii_uppercase();
        let mut cur = ArgCursor::new(FAMILY, kind, args);
        let num = |cur: &mut ArgCursor<'_>| -> Result<Box<Self>> {
            Ok(Box::new(Self::compile(cur.next()?, symbols)?))
        };
        let find = |cur: &mut ArgCursor<'_>| -> Result<Box<FinderNode>> {
            Ok(Box::new(FinderNode::compile(cur.next()?, symbols)?))
        };

        let node = if let Some(metric) = ObjectMetric::from_tag(&tag) {
            Self::Metric(metric, find(&mut cur)?)
        } else if let Some(op) = UnaryOp::from_tag(&tag) {
            Self::Unary(op, num(&mut cur)?)
        } else if let Some(op) = BinaryOp::from_tag(&tag) {
            let a = num(&mut cur)?;
            Self::Binary(op, a, num(&mut cur)?)
        } else {
            match tag.as_str() {
                "CONSTANT" => Self::Constant(cur.literal()?),
                "DEFINED_VALUE" => {
                    let name = cur.name()?;
                    let value = symbols.defined_value(name).ok_or_else(|| {
                        GameError::UnresolvedReference {
                            category: "defined value",
                            name: name.to_string(),
                        }
                    })?;
                    Self::Constant(value)
                }
                "ITEM_VALUE" => Self::ItemValue {
                    item: symbols.items.resolve(cur.name()?)?,
                    finder: find(&mut cur)?,
                },
                "IS_IDENTICAL_TO" => {
                    let a = find(&mut cur)?;
                    Self::IsIdenticalTo(a, find(&mut cur)?)
                }
                "OBJECT_TYPE" => Self::ObjectType {
                    blueprint: symbols.objects.resolve(cur.name()?)?,
                    finder: find(&mut cur)?,
                },
                "OBJECT_CLASS" => {
                    let name = cur.name()?;
                    let class = ObjectClass::from_tag(name)
                        .ok_or_else(|| cur.error(format!("unknown object class '{name}'")))?;
                    Self::ObjectClass {
                        class,
                        finder: find(&mut cur)?,
                    }
                }
                "IS_SUBSET_OF" => {
                    let a = find(&mut cur)?;
                    Self::IsSubsetOf(a, find(&mut cur)?)
                }
                "DISTANCE_BETWEEN" => {
                    let a = find(&mut cur)?;
                    Self::DistanceBetween(a, find(&mut cur)?)
                }
                "CURRENT_TIME" => Self::CurrentTime,
                "EQUATION" => Self::Equation(symbols.equations.resolve(cur.name()?)?),
                "IF_THEN_ELSE" => {
                    let c = num(&mut cur)?;
                    let a = num(&mut cur)?;
                    Self::IfThenElse(c, a, num(&mut cur)?)
                }
                "IS_BETWEEN" => {
                    let x = num(&mut cur)?;
                    let lo = num(&mut cur)?;
                    Self::IsBetween(x, lo, num(&mut cur)?)
                }
                "INTERPOLATE" => {
                    let a = num(&mut cur)?;
                    let b = num(&mut cur)?;
                    let t = num(&mut cur)?;
                    Self::Interpolate(a, b, t, num(&mut cur)?)
                }
                _ => {
                    tracing::warn!(kind, "unknown numeric node, compiled as placeholder");
                    return Ok(Self::Unknown(kind.to_string()));
                }
            }
        };
        cur.finish()?;
        Ok(node)
    }

    /// Evaluate against the world.
    pub fn eval(&self, ctx: &ExecutionContext<'_>, world: &World) -> Result<f32> {
        Ok(match self {
            Self::Constant(v) => *v,
            Self::ItemValue { item, finder } => finder
                .eval(ctx, world)?
                .first()
                .map_or(0.0, |id| world.get_item(*id, *item)),
            Self::Metric(metric, finder) => metric.measure(&finder.eval(ctx, world)?, world),
            Self::IsIdenticalTo(a, b) => {
                let mut a = a.eval(ctx, world)?;
                let mut b = b.eval(ctx, world)?;
                a.sort_unstable();
                b.sort_unstable();
                truth(a == b)
            }
            Self::ObjectType { blueprint, finder } => {
                let found = finder.eval(ctx, world)?;
                truth(
                    found
                        .first()
                        .and_then(|id| world.get(*id))
                        .is_some_and(|o| o.blueprint == Some(*blueprint)),
                )
            }
            Self::ObjectClass { class, finder } => {
                let found = finder.eval(ctx, world)?;
                truth(
                    found
                        .first()
                        .and_then(|id| world.get(*id))
                        .is_some_and(|o| o.class == *class),
                )
            }
            Self::IsSubsetOf(a, b) => {
                let a = a.eval(ctx, world)?;
                let b = b.eval(ctx, world)?;
                truth(a.iter().all(|id| b.contains(id)))
            }
            Self::DistanceBetween(a, b) => {
                let a = a.eval(ctx, world)?;
                let b = b.eval(ctx, world)?;
                match (
                    a.first().and_then(|id| world.get(*id)),
                    b.first().and_then(|id| world.get(*id)),
                ) {
                    (Some(a), Some(b)) => a.position.distance_xz(b.position),
                    _ => 0.0,
                }
            }
            Self::CurrentTime => time_to_f32(world.now()),
            Self::Equation(id) => {
                let symbols = ctx.gameset().symbols();
                let name = symbols.equations.name(*id);
                let _depth = ctx.enter_equation(name)?;
                let body = ctx.gameset().equation(*id).ok_or_else(|| {
                    GameError::UnresolvedReference {
                        category: "equation",
                        name: name.to_string(),
                    }
                })?;
                body.eval(ctx, world)?
            }
            Self::Unary(op, a) => op.apply(a.eval(ctx, world)?, world),
            Self::Binary(op, a, b) => {
                let a = a.eval(ctx, world)?;
                op.apply(a, b.eval(ctx, world)?, world)
            }
            Self::IfThenElse(c, a, b) => {
                if c.eval(ctx, world)? > 0.0 {
                    a.eval(ctx, world)?
                } else {
                    b.eval(ctx, world)?
                }
            }
            Self::IsBetween(x, lo, hi) => {
                let x = x.eval(ctx, world)?;
                let lo = lo.eval(ctx, world)?;
                truth(lo <= x && x <= hi.eval(ctx, world)?)
            }
            Self::Interpolate(a, b, t, tmax) => {
                let a = a.eval(ctx, world)?;
                let b = b.eval(ctx, world)?;
                let t = t.eval(ctx, world)?;
                let tmax = tmax.eval(ctx, world)?;
                if tmax <= 0.0 {
                    b
                } else {
                    a + (b - a) * (t / tmax)
                }
            }
            Self::Unknown(kind) => {
                tracing::error!(kind = %kind, "unknown numeric node evaluated");
                return Err(GameError::UnknownNode {
                    family: FAMILY,
                    kind: kind.clone(),
                });
            }
        })
    }

    /// Evaluate as a condition: `> 0` is true.
    pub fn is_true(&self, ctx: &ExecutionContext<'_>, world: &World) -> Result<bool> {
        Ok(self.eval(ctx, world)? > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::gameset::GameSet;
    use crate::world::ObjectSpawn;

    fn compile(arg: &Arg) -> NumericNode {
        NumericNode::compile(arg, GameSet::default().symbols()).unwrap()
    }

    fn eval(node: &NumericNode) -> f32 {
        let gs = GameSet::default();
        let world = World::new(&SimulationConfig::default());
        node.eval(&ExecutionContext::new(&gs), &world).unwrap()
    }

    fn bin(kind: &str, a: f32, b: f32) -> Arg {
        Arg::node(kind, vec![Arg::Num(a), Arg::Num(b)])
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(&compile(&bin("ADDITION", 2.0, 3.0))), 5.0);
        assert_eq!(eval(&compile(&bin("SUBTRACTION", 2.0, 3.0))), -1.0);
        assert_eq!(eval(&compile(&bin("MULTIPLICATION", 2.0, 3.0))), 6.0);
        assert_eq!(eval(&compile(&bin("DIVISION", 3.0, 2.0))), 1.5);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(eval(&compile(&bin("DIVISION", 3.0, 0.0))), 0.0);
        assert_eq!(eval(&compile(&bin("MODULO", 3.0, 0.0))), 0.0);
    }

    #[test]
    fn test_comparisons_are_zero_or_one() {
        assert_eq!(eval(&compile(&bin("LESS_THAN", 1.0, 2.0))), 1.0);
        assert_eq!(eval(&compile(&bin("GREATER_THAN", 1.0, 2.0))), 0.0);
        assert_eq!(eval(&compile(&bin("EQUALS", 2.0, 2.0))), 1.0);
        assert_eq!(eval(&compile(&bin("AND", 1.0, -1.0))), 0.0);
        assert_eq!(eval(&compile(&bin("OR", 1.0, -1.0))), 1.0);
    }

    #[test]
    fn test_if_then_else_picks_branch() {
        let node = compile(&Arg::node(
            "IF_THEN_ELSE",
            vec![Arg::Num(0.0), Arg::Num(1.0), Arg::Num(2.0)],
        ));
        assert_eq!(eval(&node), 2.0);
    }

    #[test]
    fn test_interpolate() {
        let node = compile(&Arg::node(
            "INTERPOLATE",
            vec![Arg::Num(10.0), Arg::Num(20.0), Arg::Num(1.0), Arg::Num(4.0)],
        ));
        assert_eq!(eval(&node), 12.5);
    }

    #[test]
    fn test_defined_values_fold_to_constants() {
        let mut gs = GameSet::default();
        gs.symbols.define_value("Speed", 4.0).unwrap();
        let node = NumericNode::compile(&Arg::name("speed"), gs.symbols()).unwrap();
        assert!(matches!(node, NumericNode::Constant(v) if v == 4.0));
        let err = NumericNode::compile(&Arg::name("missing"), gs.symbols()).unwrap_err();
        assert!(matches!(err, GameError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_unknown_kind_fails_only_when_evaluated() {
        let node = compile(&Arg::node("SOMETHING_NEW", vec![Arg::Num(1.0)]));
        let gs = GameSet::default();
        let world = World::new(&SimulationConfig::default());
        let err = node.eval(&ExecutionContext::new(&gs), &world).unwrap_err();
        assert!(matches!(err, GameError::UnknownNode { family: "numeric", .. }));
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let err = NumericNode::compile(
            &Arg::node("NEGATE", vec![Arg::Num(1.0), Arg::Num(2.0)]),
            GameSet::default().symbols(),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::MalformedNode { .. }));
    }

    #[test]
    fn test_item_value_of_empty_finder_is_zero() {
        let mut gs = GameSet::default();
        gs.symbols.items.declare("Health").unwrap();
        let node = NumericNode::compile(
            &Arg::node("ITEM_VALUE", vec![Arg::name("Health"), Arg::node("NOTHING", vec![])]),
            gs.symbols(),
        )
        .unwrap();
        let world = World::new(&SimulationConfig::default());
        assert_eq!(node.eval(&ExecutionContext::new(&gs), &world).unwrap(), 0.0);
    }

    #[test]
    fn test_metrics_read_first_object() {
        let gs = GameSet::default();
        let mut world = World::new(&SimulationConfig::default());
        let id = world.create_object(ObjectSpawn::of_class(ObjectClass::Character));
        world.set_terminated(id, true);
        let ctx = ExecutionContext::new(&gs);
        let _self = ctx.bind(crate::script::Slot::SelfObject, Some(id));
        let node = NumericNode::compile(
            &Arg::node("IS_TERMINATED", vec![Arg::node("SELF", vec![])]),
            gs.symbols(),
        )
        .unwrap();
        assert_eq!(node.eval(&ctx, &world).unwrap(), 1.0);
        let idle = NumericNode::compile(
            &Arg::node("IS_IDLE", vec![Arg::node("SELF", vec![])]),
            gs.symbols(),
        )
        .unwrap();
        assert_eq!(idle.eval(&ctx, &world).unwrap(), 1.0);
    }

    #[test]
    fn test_random_is_seeded() {
        let node = compile(&Arg::node("RANDOM_UP_TO", vec![Arg::Num(100.0)]));
        let gs = GameSet::default();
        let a = World::new(&SimulationConfig::default());
        let b = World::new(&SimulationConfig::default());
        let ctx = ExecutionContext::new(&gs);
        let x = node.eval(&ctx, &a).unwrap();
        assert_eq!(x, node.eval(&ctx, &b).unwrap());
        assert!((0.0..100.0).contains(&x));
    }
}
