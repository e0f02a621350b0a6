//! Opaque simulation backend abstraction.
//!
//! The scene never talks to a concrete physics engine directly. Everything it
//! needs is expressed through the narrow capability traits below, so an
//! alternate backend (or a recording mock in tests) can be swapped in without
//! touching scene code.

use core::fmt;
use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::error::SceneError;
use crate::events::EventCollector;
use crate::filter::{FilterData, FilterObjectFlags, FilterVerdict, PairFlags};
use crate::vehicles::{BatchEntry, DriveInputs, DriveType, TireFrictionTable};
use crate::vehicles::{WheelRaycastResult, WheelUpdateResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ActorId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ColliderId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct JointId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MaterialId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectId(pub u64);

/// Backend-side handle of a vehicle drive model.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DriveHandle(pub u64);

/// Backend-side handle of a character controller manager.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ControllerManagerId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ColliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColliderId({})", self.0)
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointId({})", self.0)
    }
}

/// World-space rigid transform reported by the backend.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub orientation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One actor whose transform changed during the last step.
#[derive(Copy, Clone, Debug)]
pub struct ActiveTransform {
    pub actor: ActorId,
    pub transform: Transform,
}

/// Touch pairs gathered by the backend while fetching step results.
///
/// Trigger pairs carry `(trigger, other)`; contact pairs are unordered.
#[derive(Clone, Debug, Default)]
pub struct StepResults {
    pub trigger_found: Vec<(ColliderId, ColliderId)>,
    pub trigger_lost: Vec<(ColliderId, ColliderId)>,
    pub touch_found: Vec<(ColliderId, ColliderId)>,
    pub touch_lost: Vec<(ColliderId, ColliderId)>,
}

/// Pair-filtering hook invoked by the backend per potentially-colliding
/// shape pair.
pub type PairFilter =
    fn(FilterObjectFlags, FilterData, FilterObjectFlags, FilterData) -> (FilterVerdict, PairFlags);

/// Everything needed to create one simulation world.
pub struct WorldDesc {
    pub gravity: Vec3,
    pub enable_ccd: bool,
    pub enable_adaptive_force: bool,
    pub bounce_threshold_velocity: f32,
    pub filter: PairFilter,
    /// Sink receiving trigger/contact/joint callbacks raised during a step.
    pub events: Arc<EventCollector>,
}

/// Kind tag resolved once when an actor owner is registered, replacing
/// runtime downcasts during transform propagation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActorKind {
    Static,
    Dynamic,
    Kinematic,
    Vehicle,
    Character,
}

/// Capability of an application-owned object to receive transform updates.
pub trait ActorOwner: Send + Sync {
    fn on_active_transform_changed(&self, transform: Transform);
}

/// Process-wide physics backend handle, explicitly threaded through scene
/// construction so scenes stay independently testable and destructible.
pub trait PhysicsBackend: Send + Sync {
    fn create_world(&self, desc: WorldDesc) -> Result<Arc<dyn SimulationWorld>, SceneError>;

    /// Default material used for drivable surfaces when none is configured.
    fn default_material(&self) -> MaterialId;
}

/// One live simulation world.
///
/// `step` is invoked from a worker thread while the owning thread may be
/// doing other work; every other method is called outside an in-flight step.
pub trait SimulationWorld: Send + Sync {
    /// Advances the world by `dt`, blocking until results are available.
    /// `scratch` is a reusable temporary memory block owned by the scene.
    fn step(&self, dt: f32, scratch: &mut [u8]);

    /// Returns the touch pairs found/lost during the last completed step.
    fn fetch_results(&self) -> StepResults;

    fn add_actor(&self, actor: ActorId);
    fn add_actors(&self, actors: &[ActorId]);
    fn remove_actors(&self, actors: &[ActorId]);
    fn put_to_sleep(&self, actor: ActorId);

    /// Releases a removed actor's backend resources.
    fn release_actor(&self, actor: ActorId);
    /// Clears the material's back-reference to its owning application object.
    /// Must be called before `release_material`.
    fn unlink_material_owner(&self, material: MaterialId);
    fn release_material(&self, material: MaterialId);
    fn release_object(&self, object: ObjectId);

    fn set_gravity(&self, gravity: Vec3);
    fn gravity(&self) -> Vec3;
    fn set_ccd_enabled(&self, enabled: bool);
    fn ccd_enabled(&self) -> bool;
    fn set_bounce_threshold_velocity(&self, velocity: f32);
    fn bounce_threshold_velocity(&self) -> f32;

    /// Enumerates actors whose transforms changed during the last step.
    fn active_actors(&self) -> Vec<ActiveTransform>;

    fn create_controller_manager(&self) -> Result<ControllerManagerId, SceneError>;
    fn release_controller_manager(&self, manager: ControllerManagerId);

    /// Feeds smoothed driver inputs into a vehicle drive model.
    fn apply_vehicle_inputs(&self, drive: DriveHandle, drive_type: DriveType, inputs: DriveInputs);

    /// (Re)builds the batched wheel raycast query for `capacity` wheels.
    /// Uses [`crate::filter::wheel_raycast_prefilter`] for shape masking.
    fn rebuild_wheel_batch(&self, capacity: usize);

    /// One batched suspension raycast across all wheels of `vehicles`.
    fn suspension_raycasts(&self, vehicles: &[BatchEntry], results: &mut [WheelRaycastResult]);

    /// One batched vehicle update producing per-wheel dynamic state.
    fn update_vehicles(
        &self,
        dt: f32,
        gravity: Vec3,
        frictions: &TireFrictionTable,
        vehicles: &[BatchEntry],
        results: &mut [WheelUpdateResult],
    );
}
