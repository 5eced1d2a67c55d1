//! Simulation object model.
//!
//! The [`World`] owns every [`GameObject`] keyed by a never-reused
//! [`ObjectId`]. All mutation goes through `World` methods so that the
//! spatial index, the tile map and the replicated [`Notification`] stream
//! stay consistent with object state.
//!
//! Iteration over objects always uses [`World::sorted_ids`] so that a tick
//! visits objects in the same order on every machine.

pub mod movement;
pub mod notify;
pub mod spatial;
pub mod tiles;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use movement::Movement;
pub use notify::Notification;
pub use spatial::SpatialGrid;
pub use tiles::{Footprint, TileMap};

use crate::config::SimulationConfig;
use crate::ids::{AnimationId, ItemId, ObjectBlueprintId, ObjectId, TaskId};
use crate::math::{GameTime, Vec3};
use crate::orders::{OrderConfiguration, OrderOp};
use crate::scheduler::Scheduler;

/// Broad category of a simulation object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectClass {
    /// The level itself; root of the object tree.
    Level,
    /// A player (side).
    Player,
    /// A mobile unit.
    Character,
    /// A static structure with a footprint.
    Building,
    /// An invisible marker.
    Marker,
    /// A container of other objects.
    Container,
    /// Scenery.
    #[default]
    Prop,
    /// A group of characters.
    Army,
    /// A projectile.
    Missile,
}

impl ObjectClass {
    /// Every class, in declaration order.
    pub const ALL: [ObjectClass; 9] = [
        ObjectClass::Level,
        ObjectClass::Player,
        ObjectClass::Character,
        ObjectClass::Building,
        ObjectClass::Marker,
        ObjectClass::Container,
        ObjectClass::Prop,
        ObjectClass::Army,
        ObjectClass::Missile,
    ];

    /// Gameset tag for this class.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Level => "LEVEL",
            Self::Player => "PLAYER",
            Self::Character => "CHARACTER",
            Self::Building => "BUILDING",
            Self::Marker => "MARKER",
            Self::Container => "CONTAINER",
            Self::Prop => "PROP",
            Self::Army => "ARMY",
            Self::Missile => "MISSILE",
        }
    }

    /// Look a class up by its tag, ignoring case.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.tag().eq_ignore_ascii_case(tag))
    }
}

/// Animation currently applied to an object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationState {
    /// Animation tag, `None` for the default pose.
    pub animation: Option<AnimationId>,
    /// Play once instead of looping.
    pub once: bool,
    /// Simulation time the animation started.
    #[serde(with = "crate::math::fixed_serde")]
    pub start_time: GameTime,
    /// Task whose completion fraction drives the animation, if any.
    pub sync_task: Option<TaskId>,
}

/// Everything needed to bring a new object into the world.
#[derive(Debug, Clone, Default)]
pub struct ObjectSpawn {
    /// Object class.
    pub class: ObjectClass,
    /// Blueprint, if any.
    pub blueprint: Option<ObjectBlueprintId>,
    /// Parent in the object tree.
    pub parent: Option<ObjectId>,
    /// Initial position.
    pub position: Vec3,
    /// Initial orientation.
    pub orientation: Vec3,
    /// Initial item values.
    pub items: Vec<(ItemId, f32)>,
    /// Movement speed in units per second.
    pub speed: f32,
    /// Tile footprint, for buildings.
    pub footprint: Option<Footprint>,
    /// Object whose action or task created this one.
    pub creator: Option<ObjectId>,
}

impl ObjectSpawn {
    /// Spawn description with only a class set.
    #[must_use]
    pub fn of_class(class: ObjectClass) -> Self {
        Self {
            class,
            ..Default::default()
        }
    }

    /// Set the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the initial position.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Set the movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// A simulation object.
#[derive(Debug, Clone)]
pub struct GameObject {
    /// Object id.
    pub id: ObjectId,
    /// Blueprint the object was created from.
    pub blueprint: Option<ObjectBlueprintId>,
    /// Object class.
    pub class: ObjectClass,
    /// Parent in the object tree.
    pub parent: Option<ObjectId>,
    /// Object that created this one, if any.
    pub creator: Option<ObjectId>,
    /// Children in creation order.
    pub children: Vec<ObjectId>,
    items: HashMap<ItemId, f32>,
    /// World position.
    pub position: Vec3,
    /// Euler orientation; `y` is the heading.
    pub orientation: Vec3,
    /// Marked as terminated (dying).
    pub terminated: bool,
    /// Temporarily removed from interaction.
    pub disabled: bool,
    /// Owners of tasks currently targeting this object. One entry per task.
    pub referencers: Vec<ObjectId>,
    /// Queue of orders. Empty while checked out for processing.
    pub orders: OrderConfiguration,
    orders_checked_out: bool,
    checked_out_order_count: usize,
    /// Movement state.
    pub movement: Movement,
    /// Movement speed in units per second.
    pub speed: f32,
    /// Tile footprint, if the object occupies tiles.
    pub footprint: Option<Footprint>,
    /// Animation state.
    pub animation: AnimationState,
}

impl GameObject {
    /// Current value of an item; unset items read as zero.
    #[must_use]
    pub fn item(&self, item: ItemId) -> f32 {
        self.items.get(&item).copied().unwrap_or(0.0)
    }

    /// Whether orders are currently being processed for this object.
    #[must_use]
    pub const fn orders_checked_out(&self) -> bool {
        self.orders_checked_out
    }
}

/// Simulation clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    previous: GameTime,
    current: GameTime,
}

impl Clock {
    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> GameTime {
        self.current
    }

    /// Simulation time at the start of the previous tick.
    #[must_use]
    pub const fn previous(&self) -> GameTime {
        self.previous
    }

    /// Advance by one tick.
    pub fn advance(&mut self, dt: GameTime) {
        self.previous = self.current;
        self.current += dt;
    }
}

/// All simulation objects plus the shared runtime services they use.
#[derive(Debug)]
pub struct World {
    objects: HashMap<ObjectId, GameObject>,
    next_id: u32,
    level: Option<ObjectId>,
    clock: Clock,
    spatial: SpatialGrid,
    tiles: TileMap,
    rng: RefCell<StdRng>,
    notifications: Vec<Notification>,
    deferred_orders: BTreeMap<ObjectId, Vec<OrderOp>>,
    scheduler: Scheduler,
    config: SimulationConfig,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
            level: None,
            clock: Clock::default(),
            spatial: SpatialGrid::new(config.spatial_cell_size),
            tiles: TileMap::new(config.map_tiles.0, config.map_tiles.1, config.tile_size),
            rng: RefCell::new(StdRng::seed_from_u64(config.seed)),
            notifications: Vec::new(),
            deferred_orders: BTreeMap::new(),
            scheduler: Scheduler::default(),
            config: config.clone(),
        }
    }

    /// Configuration the world was created with.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulation clock.
    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> GameTime {
        self.clock.now()
    }

    /// Advance the clock by one tick.
    pub fn advance_clock(&mut self, dt: GameTime) {
        self.clock.advance(dt);
    }

    /// Delayed-sequence scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Delayed-sequence scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Tile occupancy.
    #[must_use]
    pub const fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    /// Run `f` with the world's random number generator.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        f(&mut self.rng.borrow_mut())
    }

    // --- Object lookup -------------------------------------------------

    /// Whether an object with this id is alive.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Borrow an object.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Mutably borrow an object.
    ///
    /// Changes made through this reference bypass notifications and the
    /// spatial index; prefer the dedicated setters.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether there are no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Ids of all live objects in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The level object, if one has been created.
    #[must_use]
    pub fn level(&self) -> Option<ObjectId> {
        self.level.filter(|id| self.contains(*id))
    }

    // --- Lifetime ------------------------------------------------------

    /// Create an object without a blueprint.
    pub fn spawn_bare(&mut self, class: ObjectClass) -> ObjectId {
        self.create_object(ObjectSpawn::of_class(class))
    }

    /// Create an object.
    ///
    /// A parent that does not exist is dropped with a warning.
    pub fn create_object(&mut self, spawn: ObjectSpawn) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let parent = spawn.parent.filter(|p| {
            let exists = self.contains(*p);
            if !exists {
                tracing::warn!(object = %id, parent = %p, "create_object: parent does not exist");
            }
            exists
        });
        if let Some(p) = parent {
            if let Some(parent_obj) = self.objects.get_mut(&p) {
                parent_obj.children.push(id);
            }
        }

        let object = GameObject {
            id,
            blueprint: spawn.blueprint,
            class: spawn.class,
            parent,
            creator: spawn.creator,
            children: Vec::new(),
            items: spawn.items.iter().copied().collect(),
            position: spawn.position,
            orientation: spawn.orientation,
            terminated: false,
            disabled: false,
            referencers: Vec::new(),
            orders: OrderConfiguration::default(),
            orders_checked_out: false,
            checked_out_order_count: 0,
            movement: Movement::default(),
            speed: spawn.speed,
            footprint: spawn.footprint,
            animation: AnimationState::default(),
        };
        self.objects.insert(id, object);
        self.spatial.insert(id, spawn.position);
        if spawn.class == ObjectClass::Building {
            if let Some(footprint) = spawn.footprint {
                self.tiles.set_occupied(spawn.position, footprint, true);
            }
        }
        if spawn.class == ObjectClass::Level && self.level.is_none() {
            self.level = Some(id);
        }

        self.notify(Notification::ObjectCreated {
            object: id,
            blueprint: spawn.blueprint,
            class: spawn.class,
            parent,
            position: spawn.position,
        });
        let mut items = spawn.items;
        items.sort_by_key(|(item, _)| *item);
        for (item, value) in items {
            self.notify(Notification::ItemSet {
                object: id,
                item,
                value,
            });
        }
        if spawn.orientation != Vec3::ZERO {
            self.notify(Notification::OrientationSet {
                object: id,
                orientation: spawn.orientation,
            });
        }
        tracing::debug!(object = %id, class = ?spawn.class, "object created");
        id
    }

    /// Remove an object and, recursively, all of its children.
    ///
    /// Task targets held by removed objects are released so that no live
    /// object keeps a referencer entry for a dead one. Returns `false` if
    /// the object did not exist.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let Some(root) = self.objects.get(&id) else {
            return false;
        };
        let root_parent = root.parent;

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            if let Some(obj) = self.objects.get(&doomed[i]) {
                doomed.extend(obj.children.iter().copied());
            }
            i += 1;
        }

        if let Some(parent) = root_parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }

        for victim in doomed {
            let Some(mut obj) = self.objects.remove(&victim) else {
                continue;
            };
            self.spatial.remove(victim, obj.position);
            if obj.class == ObjectClass::Building {
                if let Some(footprint) = obj.footprint {
                    self.tiles.set_occupied(obj.position, footprint, false);
                }
            }
            // A checked-out configuration is released when it is restored.
            obj.orders.release(self, victim);
            self.deferred_orders.remove(&victim);
            if self.level == Some(victim) {
                self.level = None;
            }
            self.notify(Notification::ObjectRemoved { object: victim });
            tracing::debug!(object = %victim, "object removed");
        }
        true
    }

    // --- Properties ----------------------------------------------------

    /// Item value of an object; zero if the object is gone.
    #[must_use]
    pub fn get_item(&self, id: ObjectId, item: ItemId) -> f32 {
        self.get(id).map_or(0.0, |obj| obj.item(item))
    }

    /// Set an item.
    pub fn set_item(&mut self, id: ObjectId, item: ItemId, value: f32) {
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        obj.items.insert(item, value);
        self.notify(Notification::ItemSet {
            object: id,
            item,
            value,
        });
    }

    /// Reparent an object. A missing new parent is a warning and a no-op.
    pub fn set_parent(&mut self, id: ObjectId, parent: ObjectId) {
        if !self.contains(parent) {
            tracing::warn!(object = %id, parent = %parent, "set_parent: parent does not exist");
            return;
        }
        // Refuse to make an object its own ancestor.
        let mut cursor = Some(parent);
        while let Some(c) = cursor {
            if c == id {
                tracing::warn!(object = %id, parent = %parent, "set_parent: would create a cycle");
                return;
            }
            cursor = self.get(c).and_then(|o| o.parent);
        }
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        let old = obj.parent.replace(parent);
        if old == Some(parent) {
            return;
        }
        if let Some(old_parent) = old.and_then(|p| self.objects.get_mut(&p)) {
            old_parent.children.retain(|c| *c != id);
        }
        if let Some(new_parent) = self.objects.get_mut(&parent) {
            new_parent.children.push(id);
        }
        self.notify(Notification::ParentSet {
            object: id,
            parent: Some(parent),
        });
    }

    /// Place an object.
    pub fn set_position(&mut self, id: ObjectId, position: Vec3) {
        if self.move_silently(id, position) {
            self.notify(Notification::PositionSet {
                object: id,
                position,
            });
        }
    }

    fn move_silently(&mut self, id: ObjectId, position: Vec3) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        let old = std::mem::replace(&mut obj.position, position);
        self.spatial.update(id, old, position);
        true
    }

    /// Rotate an object.
    pub fn set_orientation(&mut self, id: ObjectId, orientation: Vec3) {
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        obj.orientation = orientation;
        self.notify(Notification::OrientationSet {
            object: id,
            orientation,
        });
    }

    /// Set the terminated flag.
    pub fn set_terminated(&mut self, id: ObjectId, terminated: bool) {
        self.set_flags(id, |obj| obj.terminated = terminated);
    }

    /// Set the disabled flag.
    pub fn set_disabled(&mut self, id: ObjectId, disabled: bool) {
        self.set_flags(id, |obj| obj.disabled = disabled);
    }

    fn set_flags(&mut self, id: ObjectId, f: impl FnOnce(&mut GameObject)) {
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        f(obj);
        let (terminated, disabled) = (obj.terminated, obj.disabled);
        self.notify(Notification::FlagsSet {
            object: id,
            terminated,
            disabled,
        });
    }

    /// Nearest ancestor (or self) of class [`ObjectClass::Player`].
    #[must_use]
    pub fn player_of(&self, id: ObjectId) -> Option<ObjectId> {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let obj = self.get(c)?;
            if obj.class == ObjectClass::Player {
                return Some(c);
            }
            cursor = obj.parent;
        }
        None
    }

    /// Alive, not terminated and not disabled.
    #[must_use]
    pub fn is_interactable(&self, id: ObjectId) -> bool {
        self.get(id).is_some_and(|o| !o.terminated && !o.disabled)
    }

    /// Interactable objects within `radius` of `center` on the ground
    /// plane, in ascending id order.
    #[must_use]
    pub fn objects_within(&self, center: Vec3, radius: f32) -> Vec<ObjectId> {
        let mut found: Vec<_> = self
            .spatial
            .candidates(center, radius)
            .into_iter()
            .filter(|id| {
                self.get(*id).is_some_and(|o| {
                    !o.terminated && !o.disabled && o.position.distance_xz(center) <= radius
                })
            })
            .collect();
        found.sort();
        found
    }

    // --- Referencers ---------------------------------------------------

    /// Record that a task owned by `owner` targets `target`.
    pub fn add_referencer(&mut self, target: ObjectId, owner: ObjectId) {
        if let Some(obj) = self.objects.get_mut(&target) {
            obj.referencers.push(owner);
        }
    }

    /// Drop one referencer entry for `owner` from `target`.
    pub fn remove_referencer(&mut self, target: ObjectId, owner: ObjectId) {
        if let Some(obj) = self.objects.get_mut(&target) {
            if let Some(i) = obj.referencers.iter().position(|r| *r == owner) {
                obj.referencers.swap_remove(i);
            }
        }
    }

    /// Objects whose tasks currently target `id`.
    #[must_use]
    pub fn referencers(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id).map_or(&[][..], |o| o.referencers.as_slice())
    }

    // --- Orders --------------------------------------------------------

    /// Take an object's order configuration out for processing.
    ///
    /// Returns `None` if the object is gone or its configuration is already
    /// checked out.
    pub fn take_orders(&mut self, id: ObjectId) -> Option<OrderConfiguration> {
        let obj = self.objects.get_mut(&id)?;
        if obj.orders_checked_out {
            return None;
        }
        obj.orders_checked_out = true;
        obj.checked_out_order_count = obj.orders.len();
        Some(std::mem::take(&mut obj.orders))
    }

    /// Put a configuration back after processing. If the object was
    /// removed in the meantime, its tasks release their targets instead.
    pub fn restore_orders(&mut self, id: ObjectId, mut orders: OrderConfiguration) {
        match self.objects.get_mut(&id) {
            Some(obj) => {
                obj.orders = orders;
                obj.orders_checked_out = false;
            }
            None => orders.release(self, id),
        }
    }

    /// Whether an object's configuration is currently checked out.
    #[must_use]
    pub fn orders_checked_out(&self, id: ObjectId) -> bool {
        self.get(id).is_some_and(GameObject::orders_checked_out)
    }

    /// Number of unfinished orders, also while the configuration is
    /// checked out (then as of the moment it was taken).
    #[must_use]
    pub fn order_count(&self, id: ObjectId) -> usize {
        self.get(id).map_or(0, |o| {
            if o.orders_checked_out {
                o.checked_out_order_count
            } else {
                o.orders.len()
            }
        })
    }

    /// Queue an order operation for an object whose configuration is
    /// checked out.
    pub fn defer_order_op(&mut self, id: ObjectId, op: OrderOp) {
        self.deferred_orders.entry(id).or_default().push(op);
    }

    /// Take the queued order operations for an object.
    pub fn take_deferred_orders(&mut self, id: ObjectId) -> Vec<OrderOp> {
        self.deferred_orders.remove(&id).unwrap_or_default()
    }

    // --- Movement and animation ----------------------------------------

    /// Start moving towards `destination`, clamped to the map.
    ///
    /// Returns the destination actually used, or `None` if the object is
    /// gone. Objects without speed stay where they are.
    pub fn start_movement(&mut self, id: ObjectId, destination: Vec3) -> Option<Vec3> {
        let destination = self.tiles.clamp(destination);
        let now = self.now();
        let obj = self.objects.get_mut(&id)?;
        if obj.speed <= 0.0 {
            return Some(obj.position);
        }
        let from = obj.position;
        let speed = obj.speed;
        obj.movement.start(from, destination, now, speed);
        self.notify(Notification::MovementStarted {
            object: id,
            from,
            destination,
            start_time: now,
            speed,
        });
        Some(destination)
    }

    /// Stop an object where it currently is.
    pub fn stop_movement(&mut self, id: ObjectId) {
        let now = self.now();
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        if !obj.movement.is_moving() {
            return;
        }
        let (position, _) = obj.movement.position_at(now);
        obj.movement.stop();
        self.move_silently(id, position);
        self.notify(Notification::MovementStopped {
            object: id,
            position,
        });
    }

    /// Whether an object is moving.
    #[must_use]
    pub fn is_moving(&self, id: ObjectId) -> bool {
        self.get(id).is_some_and(|o| o.movement.is_moving())
    }

    /// Current velocity of an object.
    #[must_use]
    pub fn velocity(&self, id: ObjectId) -> Vec3 {
        self.get(id).map_or(Vec3::ZERO, |o| o.movement.velocity())
    }

    /// Advance every moving object to its position at the current time.
    pub fn update_movements(&mut self) {
        let now = self.now();
        for id in self.sorted_ids() {
            let Some(obj) = self.objects.get_mut(&id) else {
                continue;
            };
            if !obj.movement.is_moving() {
                continue;
            }
            let (position, arrived) = obj.movement.position_at(now);
            if arrived {
                obj.movement.stop();
            }
            self.move_silently(id, position);
            if arrived {
                self.notify(Notification::MovementStopped {
                    object: id,
                    position,
                });
            }
        }
    }

    /// Play an animation on an object.
    pub fn set_animation(
        &mut self,
        id: ObjectId,
        animation: Option<AnimationId>,
        once: bool,
        sync_task: Option<TaskId>,
    ) {
        let now = self.now();
        let Some(obj) = self.objects.get_mut(&id) else {
            return;
        };
        obj.animation = AnimationState {
            animation,
            once,
            start_time: now,
            sync_task,
        };
        self.notify(Notification::AnimationSet {
            object: id,
            animation,
            once,
            start_time: now,
        });
    }

    // --- Notifications -------------------------------------------------

    /// Record a replicable state change.
    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Notifications recorded since the last drain.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Take all pending notifications.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Hash of simulation-visible state, for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.clock.now().to_bits().hash(&mut hasher);
        for id in self.sorted_ids() {
            let Some(obj) = self.get(id) else { continue };
            id.hash(&mut hasher);
            obj.blueprint.hash(&mut hasher);
            obj.class.hash(&mut hasher);
            obj.parent.hash(&mut hasher);
            let mut items: Vec<_> = obj.items.iter().collect();
            items.sort_by_key(|(item, _)| **item);
            for (item, value) in items {
                item.hash(&mut hasher);
                value.to_bits().hash(&mut hasher);
            }
            for v in [obj.position, obj.orientation] {
                v.x.to_bits().hash(&mut hasher);
                v.y.to_bits().hash(&mut hasher);
                v.z.to_bits().hash(&mut hasher);
            }
            obj.terminated.hash(&mut hasher);
            obj.disabled.hash(&mut hasher);
            obj.orders.len().hash(&mut hasher);
        }
        hasher.finish()
    }
}
