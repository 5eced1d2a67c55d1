//! Event delivery.

use crate::error::Result;
use crate::gameset::{GameSet, Reaction};
use crate::ids::{EventId, ObjectId};
use crate::world::{Notification, World};

use super::context::{ExecutionContext, Slot};
use super::numeric::NumericNode;

/// Deliver `event` to `object`.
///
/// Every reaction of the object's blueprint that the event triggers runs
/// with self bound to the receiver and package-sender bound to `sender`. A
/// reaction is triggered when it lists the event directly, or through a
/// package-receipt trigger that lists it and whose assessments are all
/// `> 0`. Sending to a missing object does nothing.
pub fn send_event(
    ctx: &ExecutionContext<'_>,
    world: &mut World,
    object: ObjectId,
    event: EventId,
    sender: Option<ObjectId>,
) -> Result<()> {
    let Some(blueprint) = world.get(object).map(|o| o.blueprint) else {
        return Ok(());
    };
    world.notify(Notification::EventSent {
        object,
        event,
        sender,
    });
    let Some(blueprint) = blueprint else {
        return Ok(());
    };

    let gameset = ctx.gameset();
    let _self = ctx.bind(Slot::SelfObject, Some(object));
    let _sender = ctx.bind(Slot::PackageSender, sender);
    for id in gameset.reactions_of(blueprint) {
        if !world.contains(object) {
            break;
        }
        let Some(reaction) = gameset.reaction(*id) else {
            continue;
        };
        if triggered_by(gameset, reaction, event, ctx, world)? {
            tracing::debug!(object = %object, reaction = %reaction.name, "reaction triggered");
            reaction.sequence.run(ctx, world)?;
        }
    }
    Ok(())
}

fn triggered_by(
    gameset: &GameSet,
    reaction: &Reaction,
    event: EventId,
    ctx: &ExecutionContext<'_>,
    world: &World,
) -> Result<bool> {
    if reaction.events.contains(&event) {
        return Ok(true);
    }
    for id in &reaction.package_triggers {
        let Some(trigger) = gameset.package_trigger(*id) else {
            continue;
        };
        if !trigger.events.contains(&event) {
            continue;
        }
        let mut passed = true;
        for equation in &trigger.assessments {
            if NumericNode::Equation(*equation).eval(ctx, world)? <= 0.0 {
                passed = false;
                break;
            }
        }
        if passed {
            return Ok(true);
        }
    }
    Ok(false)
}
