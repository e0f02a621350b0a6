use glam::Vec3;
use serde::Deserialize;

use crate::stepper::RemainderPolicy;

/// Engine-wide physics settings collaborator.
///
/// Scene construction snapshots these values; getters on an unusable scene
/// (failed world creation) fall back to them as well.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Default gravity applied to new worlds, in world units per second squared.
    pub default_gravity: Vec3,
    /// Disables continuous collision detection on new worlds.
    pub disable_ccd: bool,
    /// Enables the backend's adaptive-force solver feature.
    pub enable_adaptive_force: bool,
    /// Relative velocity below which colliding objects do not bounce.
    pub bounce_threshold_velocity: f32,
    /// Upper clamp for a single frame delta passed to `simulate`.
    pub max_delta_time: f32,
    /// Splits large frame deltas into fixed-size substeps when enabled.
    pub enable_substepping: bool,
    /// Substep size used when substepping is enabled.
    pub substep_delta_time: f32,
    /// Maximum number of substeps per frame.
    pub max_substeps: u32,
    /// What to do with the frame-delta remainder left after full substeps.
    pub remainder_policy: RemainderPolicy,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            default_gravity: Vec3::new(0.0, -981.0, 0.0),
            disable_ccd: false,
            enable_adaptive_force: false,
            bounce_threshold_velocity: 200.0,
            max_delta_time: 0.1,
            enable_substepping: false,
            substep_delta_time: 1.0 / 120.0,
            max_substeps: 5,
            remainder_policy: RemainderPolicy::Absorb,
        }
    }
}

/// CPU topology hint used to size the internal worker pool.
#[derive(Clone, Copy, Debug)]
pub struct CpuInfo {
    pub core_count: usize,
}

impl CpuInfo {
    pub fn detect() -> Self {
        let core_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { core_count }
    }

    /// Worker pool size: one thread is left for the owning thread, capped at 4.
    pub fn worker_threads(&self) -> usize {
        self.core_count.saturating_sub(1).clamp(1, 4)
    }
}
