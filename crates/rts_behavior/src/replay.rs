//! Replay logs and observers.
//!
//! A [`ReplayLog`] stores every tick's notifications together with the
//! state hash after that tick. An [`ObserverState`] rebuilds the visible
//! state of the simulation from those notifications alone, the way a
//! remote client would.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::ids::{AnimationId, ItemId, ObjectBlueprintId, ObjectId, OrderBlueprintId};
use crate::math::{fixed_serde, GameTime, Vec3};
use crate::simulation::TickEvents;
use crate::world::{Notification, ObjectClass};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Notifications of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTick {
    /// Tick number.
    pub tick: u64,
    /// Simulation time at the end of the tick.
    #[serde(with = "fixed_serde")]
    pub time: GameTime,
    /// State changes, in order.
    pub notifications: Vec<Notification>,
    /// Simulation state hash after the tick.
    pub state_hash: u64,
}

/// A recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Random seed used for the run.
    pub seed: u64,
    /// Recorded ticks, in order.
    pub ticks: Vec<ReplayTick>,
}

impl ReplayLog {
    /// Start an empty log.
    #[must_use]
    pub fn new(scenario_id: impl Into<String>, seed: u64) -> Self {
        Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed,
            ticks: Vec::new(),
        }
    }

    /// Append one tick.
    pub fn record(&mut self, events: &TickEvents, state_hash: u64) {
        self.ticks.push(ReplayTick {
            tick: events.tick,
            time: events.time,
            notifications: events.notifications.clone(),
            state_hash,
        });
    }

    /// Last recorded tick number.
    #[must_use]
    pub fn final_tick(&self) -> u64 {
        self.ticks.last().map_or(0, |t| t.tick)
    }

    /// State hash after the last recorded tick.
    #[must_use]
    pub fn final_hash(&self) -> Option<u64> {
        self.ticks.last().map(|t| t.state_hash)
    }

    /// Total number of recorded notifications.
    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.ticks.iter().map(|t| t.notifications.len()).sum()
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))
    }

    /// Decode with bincode, checking the format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {}, got {}",
                REPLAY_VERSION, replay.version
            )));
        }
        Ok(replay)
    }

    /// Save the replay to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))
    }

    /// Load a replay from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// What an observer knows about one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedObject {
    /// Blueprint.
    pub blueprint: Option<ObjectBlueprintId>,
    /// Class.
    pub class: ObjectClass,
    /// Parent.
    pub parent: Option<ObjectId>,
    /// Items, as last set.
    pub items: BTreeMap<ItemId, f32>,
    /// Last known position.
    pub position: Vec3,
    /// Last known orientation.
    pub orientation: Vec3,
    /// Current animation and whether it plays once.
    pub animation: Option<(AnimationId, bool)>,
    /// Destination of the movement in progress.
    pub moving_to: Option<Vec3>,
    /// Terminated flag.
    pub terminated: bool,
    /// Disabled flag.
    pub disabled: bool,
    /// Most recently assigned order.
    pub last_order: Option<OrderBlueprintId>,
    /// Went idle since the last order assignment.
    pub idle: bool,
}

/// Client-side view rebuilt from notifications.
///
/// Every notification carries absolute values, so applying one twice
/// leaves the same state as applying it once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObserverState {
    objects: BTreeMap<ObjectId, ObservedObject>,
}

impl ObserverState {
    /// Empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observed object.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&ObservedObject> {
        self.objects.get(&id)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Apply one notification.
    pub fn apply(&mut self, notification: &Notification) {
        match notification {
            Notification::ObjectCreated {
                object,
                blueprint,
                class,
                parent,
                position,
            } => {
                let entry = self.objects.entry(*object).or_default();
                entry.blueprint = *blueprint;
                entry.class = *class;
                entry.parent = *parent;
                entry.position = *position;
            }
            Notification::ObjectRemoved { object } => {
                self.objects.remove(object);
            }
            Notification::EventSent { .. } => {}
            other => {
                let Some(obj) = self.objects.get_mut(&other.object()) else {
                    tracing::trace!(object = %other.object(), "notification for unknown object");
                    return;
                };
                apply_to_object(obj, other);
            }
        }
    }

    /// Apply every notification of a tick.
    pub fn apply_tick(&mut self, tick: &ReplayTick) {
        for n in &tick.notifications {
            self.apply(n);
        }
    }
}

fn apply_to_object(obj: &mut ObservedObject, notification: &Notification) {
    match notification {
        Notification::ItemSet { item, value, .. } => {
            obj.items.insert(*item, *value);
        }
        Notification::ParentSet { parent, .. } => obj.parent = *parent,
        Notification::PositionSet { position, .. } => obj.position = *position,
        Notification::OrientationSet { orientation, .. } => obj.orientation = *orientation,
        Notification::AnimationSet {
            animation, once, ..
        } => obj.animation = animation.map(|a| (a, *once)),
        Notification::MovementStarted { destination, .. } => obj.moving_to = Some(*destination),
        Notification::MovementStopped { position, .. } => {
            obj.moving_to = None;
            obj.position = *position;
        }
        Notification::FlagsSet {
            terminated,
            disabled,
            ..
        } => {
            obj.terminated = *terminated;
            obj.disabled = *disabled;
        }
        Notification::OrderAssigned { order, .. } => {
            obj.last_order = Some(*order);
            obj.idle = false;
        }
        Notification::Idle { .. } => obj.idle = true,
        Notification::ObjectCreated { .. }
        | Notification::ObjectRemoved { .. }
        | Notification::EventSent { .. } => {}
    }
}

/// Steps an [`ObserverState`] through a [`ReplayLog`].
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: ReplayLog,
    observer: ObserverState,
    /// Index of the next tick to apply.
    cursor: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Start playback from the beginning.
    #[must_use]
    pub fn new(replay: ReplayLog) -> Self {
        Self {
            replay,
            observer: ObserverState::new(),
            cursor: 0,
            paused: false,
        }
    }

    /// Apply the next recorded tick. Returns `false` when paused or
    /// finished.
    pub fn advance(&mut self) -> bool {
        if self.paused {
            return false;
        }
        let Some(tick) = self.replay.ticks.get(self.cursor) else {
            return false;
        };
        self.observer.apply_tick(tick);
        self.cursor += 1;
        true
    }

    /// Jump to just after tick `target_tick`, replaying from the start when
    /// seeking backwards.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        if target_tick > self.replay.final_tick() {
            return Err(GameError::InvalidState(format!(
                "Seek target {target_tick} beyond replay end {}",
                self.replay.final_tick()
            )));
        }
        if target_tick < self.current_tick() {
            self.observer = ObserverState::new();
            self.cursor = 0;
        }
        while let Some(tick) = self.replay.ticks.get(self.cursor) {
            if tick.tick > target_tick {
                break;
            }
            self.observer.apply_tick(tick);
            self.cursor += 1;
        }
        Ok(())
    }

    /// Number of the last applied tick; zero before the first.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.replay.ticks.get(i))
            .map_or(0, |t| t.tick)
    }

    /// Rebuilt state.
    #[must_use]
    pub const fn observer(&self) -> &ObserverState {
        &self.observer
    }

    /// The log being played.
    #[must_use]
    pub const fn replay(&self) -> &ReplayLog {
        &self.replay
    }

    /// Whether every tick has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.replay.ticks.len()
    }

    /// Pause or resume.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Playback progress as a percentage.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.replay.ticks.is_empty() {
            return 100.0;
        }
        self.cursor as f64 / self.replay.ticks.len() as f64 * 100.0
    }
}
