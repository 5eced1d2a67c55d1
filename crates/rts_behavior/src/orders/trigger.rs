//! Per-task trigger state.
//!
//! A [`Trigger`] holds only the reference state of one
//! [`TriggerBlueprint`]; the blueprint owns the condition and the actions.
//! `init` captures the reference, `update` runs once per tick while the
//! owning task's triggers are active and fires the actions when the
//! condition is met.

use crate::error::Result;
use crate::math::{time_from_f32, time_to_f32, GameTime};
use crate::script::{ExecutionContext, NumericNode};
use crate::world::World;

use super::blueprint::{TriggerBlueprint, TriggerKind};

/// Runtime state of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trigger {
    reference: GameTime,
    cycles_seen: i64,
    last_fraction: f32,
    initialised: bool,
}

/// Advance a timer.
///
/// Returns the new reference time if the timer fires at `now`. The
/// reference moves forward by exactly one period per firing, so late ticks
/// never push later firings back.
#[must_use]
pub fn timer_fires(reference: GameTime, now: GameTime, period: GameTime) -> Option<GameTime> {
    if now - reference >= period {
        Some(reference + period.max(GameTime::ZERO))
    } else {
        None
    }
}

impl Trigger {
    /// Timer reference time.
    #[must_use]
    pub const fn reference(&self) -> GameTime {
        self.reference
    }

    /// Whether `init` has run since the trigger was created or reset.
    #[must_use]
    pub const fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Capture reference state.
    pub fn init(
        &mut self,
        blueprint: &TriggerBlueprint,
        sync_fraction: Option<&NumericNode>,
        ctx: &ExecutionContext<'_>,
        world: &World,
    ) -> Result<()> {
        let now = world.now();
        self.reference = now;
        self.initialised = true;
        if let TriggerKind::AnimationLoop = blueprint.kind {
            self.last_fraction = match sync_fraction {
                Some(f) => f.eval(ctx, world)?,
                None => 0.0,
            };
            self.cycles_seen = animation_cycles(ctx, world, now).unwrap_or(0);
        }
        Ok(())
    }

    /// Poll the condition and run the actions if it is met.
    ///
    /// Collision and struck-floor triggers are fired by the missile task
    /// through [`Trigger::fire`] and do nothing here.
    pub fn update(
        &mut self,
        blueprint: &TriggerBlueprint,
        sync_fraction: Option<&NumericNode>,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<()> {
        if !self.initialised {
            self.init(blueprint, sync_fraction, ctx, world)?;
        }
        let now = world.now();
        let fires = match &blueprint.kind {
            TriggerKind::Timer { period } => {
                let period = time_from_f32(period.eval(ctx, world)?);
                match timer_fires(self.reference, now, period) {
                    Some(next) => {
                        self.reference = next;
                        true
                    }
                    None => false,
                }
            }
            TriggerKind::AnimationLoop => match sync_fraction {
                Some(f) => {
                    let fraction = f.eval(ctx, world)?;
                    let crossed = self.last_fraction < 1.0 && fraction >= 1.0;
                    self.last_fraction = fraction;
                    crossed
                }
                None => match animation_cycles(ctx, world, now) {
                    Some(cycles) if cycles > self.cycles_seen => {
                        self.cycles_seen = cycles;
                        true
                    }
                    Some(cycles) => {
                        // The animation was restarted.
                        self.cycles_seen = self.cycles_seen.min(cycles);
                        false
                    }
                    None => false,
                },
            },
            TriggerKind::AttachmentPoint { tag } => {
                let from = self.reference;
                self.reference = now;
                attachment_switched_on(ctx, world, tag, from, now)
            }
            TriggerKind::Collision | TriggerKind::StruckFloor => false,
        };
        if fires {
            self.fire(blueprint, ctx, world)?;
        }
        Ok(())
    }

    /// Run the trigger's actions.
    pub fn fire(
        &mut self,
        blueprint: &TriggerBlueprint,
        ctx: &ExecutionContext<'_>,
        world: &mut World,
    ) -> Result<()> {
        tracing::trace!("trigger fired");
        blueprint.actions.run(ctx, world)
    }

    /// Forget reference state; the next update re-initialises.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Model duration and time into the current animation for self.
fn animation_clock(
    ctx: &ExecutionContext<'_>,
    world: &World,
    now: GameTime,
) -> Option<(f32, f32)> {
    let id = ctx.self_object(world)?;
    let obj = world.get(id)?;
    let blueprint = ctx.gameset().object_blueprint(obj.blueprint?)?;
    let model = blueprint.model(obj.animation.animation)?;
    let elapsed = time_to_f32(now - obj.animation.start_time);
    Some((model.duration, elapsed))
}

fn animation_cycles(ctx: &ExecutionContext<'_>, world: &World, now: GameTime) -> Option<i64> {
    let (duration, elapsed) = animation_clock(ctx, world, now)?;
    if duration <= 0.0 {
        return None;
    }
    Some((elapsed / duration).floor() as i64)
}

fn attachment_switched_on(
    ctx: &ExecutionContext<'_>,
    world: &World,
    tag: &str,
    from: GameTime,
    to: GameTime,
) -> bool {
    let Some(id) = ctx.self_object(world) else {
        return false;
    };
    let Some(obj) = world.get(id) else {
        return false;
    };
    let Some(model) = obj
        .blueprint
        .and_then(|bp| ctx.gameset().object_blueprint(bp))
        .and_then(|bp| bp.model(obj.animation.animation))
    else {
        return false;
    };
    let Some(point) = model.attachment(tag) else {
        return false;
    };
    let start = obj.animation.start_time;
    // Only the part of the window after the animation started counts.
    let from = time_to_f32(from.max(start) - start);
    let to = time_to_f32(to - start);
    let from = if from == 0.0 && to > 0.0 { -f32::EPSILON } else { from };
    point.turns_on_within(from, to, model.duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_timer_fires_on_period_boundary() {
        let p = Fixed::from_num(1);
        assert_eq!(timer_fires(Fixed::ZERO, Fixed::from_num(0.5), p), None);
        assert_eq!(timer_fires(Fixed::ZERO, Fixed::from_num(1), p), Some(p));
    }

    #[test]
    fn test_timer_does_not_drift_with_late_ticks() {
        let p = Fixed::from_num(1);
        let r0 = Fixed::from_num(3);
        // Fires late at 4.3: reference moves to 4.0, not 4.3.
        let r1 = timer_fires(r0, Fixed::from_num(4.3), p).unwrap();
        assert_eq!(r1, Fixed::from_num(4));
        // Catch-up is one period per update.
        let r2 = timer_fires(r1, Fixed::from_num(6.2), p).unwrap();
        assert_eq!(r2, Fixed::from_num(5));
    }

    #[test]
    fn test_oversized_period_never_fires() {
        let period = time_from_f32(1e15);
        assert_eq!(timer_fires(Fixed::ZERO, Fixed::from_num(1_000_000), period), None);
    }

    #[test]
    fn test_zero_period_fires_every_update() {
        let r = Fixed::from_num(2);
        assert_eq!(timer_fires(r, r, Fixed::ZERO), Some(r));
    }
}
