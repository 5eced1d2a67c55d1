//! Position evaluators.
//!
//! Every node yields an [`OrientedPosition`]. Anchors are finders; an
//! anchor that finds nothing stands at the origin with no rotation.

use crate::error::{GameError, Result};
use crate::gameset::Symbols;
use crate::ids::ObjectBlueprintId;
use crate::math::{OrientedPosition, Vec3};
use crate::world::World;

use super::args::{Arg, ArgCursor};
use super::context::ExecutionContext;
use super::finder::FinderNode;
use super::numeric::NumericNode;

const FAMILY: &str = "position";

/// A compiled position expression.
#[derive(Debug, Clone)]
pub enum PositionNode {
    /// Mean position of the objects found, facing like the first one.
    LocationOf(FinderNode),
    /// Fixed coordinates with an optional heading in degrees.
    Absolute {
        /// Coordinates.
        x: NumericNode,
        /// Height.
        y: NumericNode,
        /// Coordinates.
        z: NumericNode,
        /// Heading in degrees.
        heading: Option<NumericNode>,
    },
    /// Centre of the map.
    CentreOfMap,
    /// `distance` from `from` on the side facing `subject`.
    ThisSideOf {
        /// Object whose side is meant.
        subject: FinderNode,
        /// Reference object.
        from: FinderNode,
        /// Distance from the reference object.
        distance: NumericNode,
    },
    /// `distance` beyond `from` as seen from `subject`.
    TheOtherSideOf {
        /// Viewpoint.
        subject: FinderNode,
        /// Reference object.
        from: FinderNode,
        /// Distance beyond the reference object.
        distance: NumericNode,
    },
    /// `distance` from `from` along the ground towards `to`.
    Towards {
        /// Start point.
        from: FinderNode,
        /// Direction object.
        to: FinderNode,
        /// Distance to travel.
        distance: NumericNode,
    },
    /// `distance` from `from` along the ground away from `to`.
    AwayFrom {
        /// Start point.
        from: FinderNode,
        /// Object to move away from.
        to: FinderNode,
        /// Distance to travel.
        distance: NumericNode,
    },
    /// `distance` ahead of the anchor along its heading.
    InFrontOf(FinderNode, NumericNode),
    /// Anchor plus a fixed offset.
    OffsetFrom {
        /// Anchor.
        anchor: FinderNode,
        /// Offset along X.
        x: NumericNode,
        /// Offset along Y.
        y: NumericNode,
        /// Offset along Z.
        z: NumericNode,
    },
    /// `length` from the anchor, turned `angle` degrees from its heading.
    OutAtAngle {
        /// Anchor.
        anchor: FinderNode,
        /// Turn in degrees.
        angle: NumericNode,
        /// Distance.
        length: NumericNode,
    },
    /// Closest point where a blueprint's footprint fits.
    NearestValidPositionFor {
        /// Blueprint whose footprint must fit.
        blueprint: ObjectBlueprintId,
        /// Desired position.
        at: Box<PositionNode>,
    },
    /// World position of an attachment point on the first object found.
    AttachmentPoint {
        /// Attachment point tag.
        tag: String,
        /// Object carrying the model.
        of: FinderNode,
    },
    /// Placeholder for an unrecognised kind. Evaluating it is an error.
    Unknown(String),
}

impl PositionNode {
    /// Compile an argument into a position node.
    pub fn compile(arg: &Arg, symbols: &Symbols) -> Result<Self> {
        let Arg::Node(kind, args) = arg else {
            return Err(GameError::malformed(
                FAMILY,
                "<value>",
                format!("expected a position node, found {}", arg.describe()),
            ));
        };
        let mut cur = ArgCursor::new(FAMILY, kind, args);
        let find = |cur: &mut ArgCursor<'_>| -> Result<FinderNode> {
            FinderNode::compile(cur.next()?, symbols)
        };
        let num = |cur: &mut ArgCursor<'_>| -> Result<NumericNode> {
            NumericNode::compile(cur.next()?, symbols)
        };

        let node = match kind.to_ascii_uppercase().as_str() {
            "LOCATION_OF" => Self::LocationOf(find(&mut cur)?),
            "ABSOLUTE_POSITION" => Self::Absolute {
                x: num(&mut cur)?,
                y: num(&mut cur)?,
                z: num(&mut cur)?,
                heading: match cur.next_opt() {
                    Some(arg) => Some(NumericNode::compile(arg, symbols)?),
                    None => None,
                },
            },
            "CENTRE_OF_MAP" => Self::CentreOfMap,
            "THIS_SIDE_OF" => Self::ThisSideOf {
                subject: find(&mut cur)?,
                from: find(&mut cur)?,
                distance: num(&mut cur)?,
            },
            "THE_OTHER_SIDE_OF" => Self::TheOtherSideOf {
                subject: find(&mut cur)?,
                from: find(&mut cur)?,
                distance: num(&mut cur)?,
            },
            "TOWARDS" => Self::Towards {
                from: find(&mut cur)?,
                to: find(&mut cur)?,
                distance: num(&mut cur)?,
            },
            "AWAY_FROM" => Self::AwayFrom {
                from: find(&mut cur)?,
                to: find(&mut cur)?,
                distance: num(&mut cur)?,
            },
            "IN_FRONT_OF" => {
                let anchor = find(&mut cur)?;
                Self::InFrontOf(anchor, num(&mut cur)?)
            }
            "OFFSET_FROM" => Self::OffsetFrom {
                anchor: find(&mut cur)?,
                x: num(&mut cur)?,
                y: num(&mut cur)?,
                z: num(&mut cur)?,
            },
            "OUT_AT_ANGLE" => Self::OutAtAngle {
                anchor: find(&mut cur)?,
                angle: num(&mut cur)?,
                length: num(&mut cur)?,
            },
            "NEAREST_VALID_POSITION_FOR" => Self::NearestValidPositionFor {
                blueprint: symbols.objects.resolve(cur.name()?)?,
                at: Box::new(Self::compile(cur.next()?, symbols)?),
            },
            "ATTACHMENT_POINT" => Self::AttachmentPoint {
                tag: cur.name()?.to_string(),
                of: find(&mut cur)?,
            },
            _ => {
                tracing::warn!(kind = %kind, "unknown position node, compiled as placeholder");
                return Ok(Self::Unknown(kind.clone()));
            }
        };
        cur.finish()?;
        Ok(node)
    }

    /// Evaluate against the world.
    pub fn eval(&self, ctx: &ExecutionContext<'_>, world: &World) -> Result<OrientedPosition> {
        Ok(match self {
            Self::LocationOf(finder) => anchor(finder, ctx, world)?,
            Self::Absolute { x, y, z, heading } => {
                let position = Vec3::new(x.eval(ctx, world)?, y.eval(ctx, world)?, z.eval(ctx, world)?);
                let heading = match heading {
                    Some(h) => h.eval(ctx, world)?.to_radians(),
                    None => 0.0,
                };
                OrientedPosition::facing(position, heading)
            }
            Self::CentreOfMap => {
                let (w, h) = world.tiles().extent();
                OrientedPosition::at(Vec3::new(w / 2.0, 0.0, h / 2.0))
            }
            Self::ThisSideOf {
                subject,
                from,
                distance,
            } => {
                let o = anchor(subject, ctx, world)?.position;
                let p = anchor(from, ctx, world)?.position;
                let d = (o - p).normalize();
                OrientedPosition::facing(p + d * distance.eval(ctx, world)?, d.heading())
            }
            Self::TheOtherSideOf {
                subject,
                from,
                distance,
            } => {
                let o = anchor(subject, ctx, world)?.position;
                let p = anchor(from, ctx, world)?.position;
                let d = (p - o).normalize();
                OrientedPosition::facing(p + d * distance.eval(ctx, world)?, d.heading())
            }
            Self::Towards { from, to, distance } => {
                let o = anchor(from, ctx, world)?.position;
                let p = anchor(to, ctx, world)?.position;
                let d = (p - o).normalize_xz();
                OrientedPosition::facing(o + d * distance.eval(ctx, world)?, d.heading())
            }
            Self::AwayFrom { from, to, distance } => {
                let o = anchor(from, ctx, world)?.position;
                let p = anchor(to, ctx, world)?.position;
                let d = (o - p).normalize_xz();
                OrientedPosition::facing(o + d * distance.eval(ctx, world)?, d.heading())
            }
            Self::InFrontOf(finder, distance) => {
                let mut at = anchor(finder, ctx, world)?;
                at.position += Vec3::from_heading(at.heading()) * distance.eval(ctx, world)?;
                at
            }
            Self::OffsetFrom { anchor: a, x, y, z } => {
                let mut at = anchor(a, ctx, world)?;
                at.position += Vec3::new(x.eval(ctx, world)?, y.eval(ctx, world)?, z.eval(ctx, world)?);
                at
            }
            Self::OutAtAngle {
                anchor: a,
                angle,
                length,
            } => {
                let mut at = anchor(a, ctx, world)?;
                at.rotation.y -= angle.eval(ctx, world)?.to_radians();
                at.position += Vec3::from_heading(at.rotation.y) * length.eval(ctx, world)?;
                at
            }
            Self::NearestValidPositionFor { blueprint, at } => {
                let mut wanted = at.eval(ctx, world)?;
                let footprint = ctx
                    .gameset()
                    .object_blueprint(*blueprint)
                    .and_then(|bp| bp.footprint);
                if let Some(footprint) = footprint {
                    match world.tiles().nearest_free(wanted.position, footprint) {
                        Some(free) => wanted.position = free,
                        None => {
                            tracing::warn!(blueprint = blueprint.0, "no free tiles for footprint");
                        }
                    }
                }
                wanted
            }
            Self::AttachmentPoint { tag, of } => {
                let found = of.eval(ctx, world)?;
                let Some(obj) = found.first().and_then(|id| world.get(*id)) else {
                    return Ok(OrientedPosition::IDENTITY);
                };
                let base = OrientedPosition {
                    position: obj.position,
                    rotation: obj.orientation,
                };
                let offset = obj
                    .blueprint
                    .and_then(|bp| ctx.gameset().object_blueprint(bp))
                    .and_then(|bp| bp.model(obj.animation.animation))
                    .and_then(|model| model.attachment(tag))
                    .map(|point| point.offset);
                match offset {
                    Some(offset) => OrientedPosition {
                        position: base.position + offset.rotate_y(base.heading()),
                        rotation: base.rotation,
                    },
                    None => base,
                }
            }
            Self::Unknown(kind) => {
                tracing::error!(kind = %kind, "unknown position node evaluated");
                return Err(GameError::UnknownNode {
                    family: FAMILY,
                    kind: kind.clone(),
                });
            }
        })
    }
}

/// Mean position of the objects found, with the first object's rotation.
fn anchor(finder: &FinderNode, ctx: &ExecutionContext<'_>, world: &World) -> Result<OrientedPosition> {
    let found = finder.eval(ctx, world)?;
    let objects: Vec<_> = found.iter().filter_map(|id| world.get(*id)).collect();
    let Some(first) = objects.first() else {
        return Ok(OrientedPosition::IDENTITY);
    };
    let mut sum = Vec3::ZERO;
    for obj in &objects {
        sum += obj.position;
    }
    Ok(OrientedPosition {
        position: sum / objects.len() as f32,
        rotation: first.orientation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::gameset::GameSet;
    use crate::script::Slot;
    use crate::world::{ObjectClass, ObjectSpawn};

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    struct Fixture {
        gs: GameSet,
        world: World,
        a: crate::ids::ObjectId,
        b: crate::ids::ObjectId,
    }

    fn fixture() -> Fixture {
        let gs = GameSet::default();
        let mut world = World::new(&SimulationConfig::default());
        let a = world.create_object(ObjectSpawn::of_class(ObjectClass::Character).at(Vec3::new(10.0, 0.0, 10.0)));
        let b = world.create_object(ObjectSpawn::of_class(ObjectClass::Character).at(Vec3::new(20.0, 0.0, 10.0)));
        Fixture { gs, world, a, b }
    }

    fn eval(f: &Fixture, arg: Arg) -> OrientedPosition {
        let node = PositionNode::compile(&arg, f.gs.symbols()).unwrap();
        let ctx = ExecutionContext::new(&f.gs);
        let _self = ctx.bind(Slot::SelfObject, Some(f.a));
        let _target = ctx.bind(Slot::Target, Some(f.b));
        node.eval(&ctx, &f.world).unwrap()
    }

    fn me() -> Arg {
        Arg::node("SELF", vec![])
    }

    fn it() -> Arg {
        Arg::node("TARGET", vec![])
    }

    #[test]
    fn test_empty_anchor_is_identity() {
        let f = fixture();
        let at = eval(&f, Arg::node("LOCATION_OF", vec![Arg::node("NOTHING", vec![])]));
        assert_eq!(at, OrientedPosition::IDENTITY);
    }

    #[test]
    fn test_location_of_averages() {
        let f = fixture();
        let at = eval(&f, Arg::node("LOCATION_OF", vec![Arg::node("UNION", vec![me(), it()])]));
        assert!(close(at.position, Vec3::new(15.0, 0.0, 10.0)));
    }

    #[test]
    fn test_towards_and_away() {
        let f = fixture();
        let towards = eval(&f, Arg::node("TOWARDS", vec![me(), it(), Arg::Num(4.0)]));
        assert!(close(towards.position, Vec3::new(14.0, 0.0, 10.0)));
        let away = eval(&f, Arg::node("AWAY_FROM", vec![me(), it(), Arg::Num(4.0)]));
        assert!(close(away.position, Vec3::new(6.0, 0.0, 10.0)));
    }

    #[test]
    fn test_sides_of_target() {
        let f = fixture();
        let this_side = eval(&f, Arg::node("THIS_SIDE_OF", vec![me(), it(), Arg::Num(2.0)]));
        assert!(close(this_side.position, Vec3::new(18.0, 0.0, 10.0)));
        let other = eval(&f, Arg::node("THE_OTHER_SIDE_OF", vec![me(), it(), Arg::Num(2.0)]));
        assert!(close(other.position, Vec3::new(22.0, 0.0, 10.0)));
    }

    #[test]
    fn test_in_front_follows_heading() {
        let mut f = fixture();
        // Heading 0 faces -Z.
        let at = eval(&f, Arg::node("IN_FRONT_OF", vec![me(), Arg::Num(3.0)]));
        assert!(close(at.position, Vec3::new(10.0, 0.0, 7.0)));
        f.world.set_orientation(f.a, Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        let at = eval(&f, Arg::node("IN_FRONT_OF", vec![me(), Arg::Num(3.0)]));
        assert!(close(at.position, Vec3::new(13.0, 0.0, 10.0)));
    }

    #[test]
    fn test_offset_and_centre() {
        let f = fixture();
        let at = eval(
            &f,
            Arg::node("OFFSET_FROM", vec![me(), Arg::Num(1.0), Arg::Num(2.0), Arg::Num(3.0)]),
        );
        assert!(close(at.position, Vec3::new(11.0, 2.0, 13.0)));
        let (w, h) = f.world.tiles().extent();
        let centre = eval(&f, Arg::node("CENTRE_OF_MAP", vec![]));
        assert!(close(centre.position, Vec3::new(w / 2.0, 0.0, h / 2.0)));
    }

    #[test]
    fn test_unknown_position_kind_fails_on_eval() {
        let f = fixture();
        let node = PositionNode::compile(&Arg::node("SOMEWHERE", vec![]), f.gs.symbols()).unwrap();
        let ctx = ExecutionContext::new(&f.gs);
        assert!(node.eval(&ctx, &f.world).is_err());
    }
}
