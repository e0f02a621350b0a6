//! Accumulates trigger/collision/joint notifications raised during a step
//! and republishes them to subscribers once results are collected.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use crate::backend::{ColliderId, JointId, SimulationWorld};

/// Collector lifecycle: `Idle → Collecting` at step start, `→ Published`
/// once all three send passes ran, `→ Idle` when the frame ends.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Collecting,
    Published,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TouchKind {
    Begin,
    Persist,
    End,
}

#[derive(Clone, Debug)]
pub struct TriggerEvent {
    pub kind: TouchKind,
    pub trigger: ColliderId,
    pub other: ColliderId,
}

#[derive(Copy, Clone, Debug)]
pub struct ContactPoint {
    pub position: Vec3,
    pub normal: Vec3,
    pub impulse: f32,
}

#[derive(Clone, Debug)]
pub struct CollisionEvent {
    pub kind: TouchKind,
    pub collider0: ColliderId,
    pub collider1: ColliderId,
    /// Accumulated impulse applied by the contact solver; zero for
    /// suppressed (notify-only) pairs.
    pub impulse: Vec3,
    pub contacts: Vec<ContactPoint>,
}

impl CollisionEvent {
    fn involves(&self, collider: ColliderId) -> bool {
        self.collider0 == collider || self.collider1 == collider
    }
}

#[derive(Copy, Clone, Debug)]
pub struct JointBreakEvent {
    pub joint: JointId,
}

pub trait TriggerEventHandler: Send + Sync {
    fn on_trigger(&self, event: &TriggerEvent);
}

pub trait CollisionEventHandler: Send + Sync {
    fn on_collision(&self, event: &CollisionEvent);
}

pub trait JointEventHandler: Send + Sync {
    fn on_joint_break(&self, event: &JointBreakEvent);
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    triggers: Vec<TriggerEvent>,
    collisions: Vec<CollisionEvent>,
    joint_breaks: Vec<JointBreakEvent>,
    trigger_handlers: HashMap<ColliderId, Arc<dyn TriggerEventHandler>>,
    collision_handlers: HashMap<ColliderId, Arc<dyn CollisionEventHandler>>,
    joint_handlers: HashMap<JointId, Arc<dyn JointEventHandler>>,
}

/// Transient per-step event accumulator.
///
/// The backend appends through the `on_*` sinks while the step runs on a
/// worker thread; the owning thread publishes after fetch.
#[derive(Default)]
pub struct EventCollector {
    inner: Mutex<Inner>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Resets the accumulator at step start.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Collecting;
        inner.triggers.clear();
        inner.collisions.clear();
        inner.joint_breaks.clear();
    }

    pub fn subscribe_trigger(&self, collider: ColliderId, handler: Arc<dyn TriggerEventHandler>) {
        self.inner.lock().trigger_handlers.insert(collider, handler);
    }

    pub fn subscribe_collision(
        &self,
        collider: ColliderId,
        handler: Arc<dyn CollisionEventHandler>,
    ) {
        self.inner
            .lock()
            .collision_handlers
            .insert(collider, handler);
    }

    pub fn subscribe_joint(&self, joint: JointId, handler: Arc<dyn JointEventHandler>) {
        self.inner.lock().joint_handlers.insert(joint, handler);
    }

    /// Backend sink: trigger overlap raised during the step.
    pub fn on_trigger(&self, kind: TouchKind, trigger: ColliderId, other: ColliderId) {
        self.inner.lock().triggers.push(TriggerEvent {
            kind,
            trigger,
            other,
        });
    }

    /// Backend sink: contact raised during the step.
    pub fn on_contact(&self, event: CollisionEvent) {
        self.inner.lock().collisions.push(event);
    }

    /// Backend sink: joint broke during the step.
    pub fn on_joint_break(&self, joint: JointId) {
        self.inner.lock().joint_breaks.push(JointBreakEvent { joint });
    }

    /// Invalidates pending events referencing a collider that is being
    /// destroyed in the current flush, and drops its subscriptions.
    pub fn on_collider_removed(&self, collider: ColliderId) {
        let mut inner = self.inner.lock();
        inner
            .triggers
            .retain(|e| e.trigger != collider && e.other != collider);
        inner.collisions.retain(|e| !e.involves(collider));
        inner.trigger_handlers.remove(&collider);
        inner.collision_handlers.remove(&collider);
    }

    /// Invalidates pending events referencing a joint that is being
    /// destroyed in the current flush, and drops its subscription.
    pub fn on_joint_removed(&self, joint: JointId) {
        let mut inner = self.inner.lock();
        inner.joint_breaks.retain(|e| e.joint != joint);
        inner.joint_handlers.remove(&joint);
    }

    /// Folds the backend's reported touch pairs into begin/end events.
    pub fn collect_results(&self, world: &dyn SimulationWorld) {
        let results = world.fetch_results();
        let mut inner = self.inner.lock();
        for (trigger, other) in results.trigger_found {
            inner.triggers.push(TriggerEvent {
                kind: TouchKind::Begin,
                trigger,
                other,
            });
        }
        for (trigger, other) in results.trigger_lost {
            inner.triggers.push(TriggerEvent {
                kind: TouchKind::End,
                trigger,
                other,
            });
        }
        for (collider0, collider1) in results.touch_found {
            inner.collisions.push(CollisionEvent {
                kind: TouchKind::Begin,
                collider0,
                collider1,
                impulse: Vec3::ZERO,
                contacts: Vec::new(),
            });
        }
        for (collider0, collider1) in results.touch_lost {
            inner.collisions.push(CollisionEvent {
                kind: TouchKind::End,
                collider0,
                collider1,
                impulse: Vec3::ZERO,
                contacts: Vec::new(),
            });
        }
    }

    pub fn send_trigger_events(&self) {
        // Handlers may re-enter the collector; dispatch outside the lock
        let (events, handlers) = {
            let mut inner = self.inner.lock();
            (
                std::mem::take(&mut inner.triggers),
                inner.trigger_handlers.clone(),
            )
        };
        for event in &events {
            if let Some(handler) = handlers.get(&event.trigger) {
                handler.on_trigger(event);
            }
            if let Some(handler) = handlers.get(&event.other) {
                handler.on_trigger(event);
            }
        }
    }

    pub fn send_collision_events(&self) {
        let (events, handlers) = {
            let mut inner = self.inner.lock();
            (
                std::mem::take(&mut inner.collisions),
                inner.collision_handlers.clone(),
            )
        };
        for event in &events {
            if let Some(handler) = handlers.get(&event.collider0) {
                handler.on_collision(event);
            }
            if let Some(handler) = handlers.get(&event.collider1) {
                handler.on_collision(event);
            }
        }
    }

    pub fn send_joint_events(&self) {
        let (events, handlers) = {
            let mut inner = self.inner.lock();
            inner.phase = Phase::Published;
            (
                std::mem::take(&mut inner.joint_breaks),
                inner.joint_handlers.clone(),
            )
        };
        for event in &events {
            if let Some(handler) = handlers.get(&event.joint) {
                handler.on_joint_break(event);
            }
        }
    }

    /// Returns the collector to `Idle` once the frame's results are out.
    pub fn end_frame(&self) {
        self.inner.lock().phase = Phase::Idle;
    }
}
