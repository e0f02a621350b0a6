//! Wheeled-vehicle simulation glue.
//!
//! Per frame the scene smooths driver input, runs one batched suspension
//! raycast plus one batched drive update across every active vehicle, and
//! synchronizes the resulting wheel states back onto bound colliders.

pub mod input;
pub mod pipeline;

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::backend::{ColliderId, DriveHandle, MaterialId, Transform};

pub use input::{SmoothedControls, SmoothingRates, KEY_SMOOTHING, PAD_SMOOTHING};
pub use pipeline::VehiclePipeline;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriveType {
    /// Classic four-wheel drive model.
    Drive4W,
    /// Arbitrary wheel-count drive model.
    DriveNw,
}

/// Raw driver input reported by the owning vehicle object.
#[derive(Copy, Clone, Debug, Default)]
pub struct VehicleControls {
    pub throttle: f32,
    pub brake: f32,
    pub steering: f32,
    pub handbrake: f32,
    /// Smooth analog ("pad") input rather than digital ("key") input.
    pub use_analog_steering: bool,
    /// Negative throttle brakes first, then reverses.
    pub use_reverse_as_brake: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GearState {
    pub current: i32,
    pub target: i32,
}

/// Smoothed inputs handed to the backend drive model.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DriveInputs {
    pub accel: f32,
    pub brake: f32,
    /// Signed steer after the forward-speed attenuation curve.
    pub steer: f32,
    pub handbrake: f32,
}

/// Per-wheel kinematic/dynamic state synchronized after each update.
#[derive(Clone, Debug, Default)]
pub struct WheelState {
    pub is_in_air: bool,
    pub tire_contact_collider: Option<ColliderId>,
    pub tire_contact_point: Vec3,
    pub tire_contact_normal: Vec3,
    pub tire_friction: f32,
    /// Degrees.
    pub steer_angle: f32,
    /// Degrees, negated wheel spin.
    pub rotation_angle: f32,
    pub suspension_offset: f32,
    pub suspension_trace_start: Vec3,
    pub suspension_trace_end: Vec3,
}

/// Raw per-wheel output of the backend's batched suspension raycast.
#[derive(Copy, Clone, Debug, Default)]
pub struct WheelRaycastResult {
    pub hit: bool,
    pub collider: Option<ColliderId>,
    pub position: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Raw per-wheel output of the backend's batched vehicle update.
#[derive(Copy, Clone, Debug, Default)]
pub struct WheelUpdateResult {
    pub is_in_air: bool,
    pub tire_contact_collider: Option<ColliderId>,
    pub tire_contact_point: Vec3,
    pub tire_contact_normal: Vec3,
    pub tire_friction: f32,
    /// Radians.
    pub steer_angle: f32,
    /// Radians, accumulated wheel spin.
    pub rotation_angle: f32,
    pub suspension_jounce: f32,
    pub suspension_line_start: Vec3,
    pub suspension_line_dir: Vec3,
    pub suspension_line_length: f32,
    pub longitudinal_slip: f32,
    pub lateral_slip: f32,
}

/// One vehicle entry in the shared batched update.
#[derive(Copy, Clone, Debug)]
pub struct BatchEntry {
    pub drive: DriveHandle,
    pub wheel_count: usize,
}

/// Tire-friction lookup: (tire compound, surface type) → friction scalar.
/// Currently a single drivable surface type with a fixed coefficient.
#[derive(Clone, Debug)]
pub struct TireFrictionTable {
    pub surface_material: MaterialId,
    pub surface_type: u32,
    pub type_pair_friction: f32,
}

impl TireFrictionTable {
    pub const DRIVABLE_SURFACE_FRICTION: f32 = 5.0;

    pub fn single_surface(material: MaterialId) -> Self {
        Self {
            surface_material: material,
            surface_type: 0,
            type_pair_friction: Self::DRIVABLE_SURFACE_FRICTION,
        }
    }
}

/// Capability of a bound wheel visual/collider to accept transform updates.
pub trait WheelCollider: Send + Sync {
    /// Backend shape pose in vehicle-local space.
    fn shape_local_pose(&self) -> Vec3;
    /// Collider center offset in its own local space.
    fn center(&self) -> Vec3;
    fn local_transform(&self) -> Transform;
    fn set_local_transform(&self, transform: Transform);
}

/// One wheel's binding to its visual/collider transform.
#[derive(Clone)]
pub struct WheelBinding {
    pub local_orientation: Quat,
    pub collider: Option<Arc<dyn WheelCollider>>,
}

impl Default for WheelBinding {
    fn default() -> Self {
        Self {
            local_orientation: Quat::IDENTITY,
            collider: None,
        }
    }
}

/// Capability of an application-owned vehicle object, resolved through the
/// scene's vehicle registry.
pub trait WheeledVehicle: Send + Sync {
    fn is_active_in_hierarchy(&self) -> bool;
    fn drive(&self) -> DriveHandle;
    fn drive_type(&self) -> DriveType;
    fn wheel_count(&self) -> usize;
    /// Signed forward speed in world units per second.
    fn forward_speed(&self) -> f32;
    fn gears(&self) -> GearState;
    /// Shifts both current and target gear.
    fn set_current_gear(&self, gear: i32);
    fn controls(&self) -> VehicleControls;
    /// Non-uniform world scale of the vehicle actor.
    fn scale(&self) -> Vec3;
    fn wheel_binding(&self, index: usize) -> WheelBinding;
    fn set_wheel_state(&self, index: usize, state: WheelState);
}
