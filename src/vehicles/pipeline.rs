//! Per-frame vehicle update pipeline.

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::backend::{MaterialId, SimulationWorld};
use crate::vehicles::input::{
    resolve_drive_input, split_steer, steer_attenuation, KEY_SMOOTHING, PAD_SMOOTHING,
};
use crate::vehicles::{
    BatchEntry, DriveInputs, SmoothedControls, TireFrictionTable, WheelState, WheelRaycastResult,
    WheelUpdateResult, WheeledVehicle,
};

struct RegisteredVehicle {
    vehicle: Arc<dyn WheeledVehicle>,
    smoothed: SmoothedControls,
}

/// Drives batched suspension raycasts, tire-friction resolution and
/// wheel-state synchronization for all vehicles sharing one scene.
///
/// Shared wheel buffers grow to the largest concurrent wheel count seen so
/// far and never shrink; the batched raycast query is rebuilt only on growth.
#[derive(Default)]
pub struct VehiclePipeline {
    vehicles: Vec<RegisteredVehicle>,
    batch: Vec<BatchEntry>,
    /// Indices of the vehicles in this frame's batch, snapshotted during the
    /// input pass so the writeback pass stays aligned with the batch layout.
    active: Vec<usize>,
    batch_capacity: usize,
    query_results: Vec<WheelRaycastResult>,
    wheel_results: Vec<WheelUpdateResult>,
    frictions: Option<TireFrictionTable>,
}

impl VehiclePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, vehicle: Arc<dyn WheeledVehicle>) {
        self.vehicles.push(RegisteredVehicle {
            vehicle,
            smoothed: SmoothedControls::default(),
        });
    }

    pub fn remove(&mut self, vehicle: &Arc<dyn WheeledVehicle>) {
        self.vehicles
            .retain(|entry| !Arc::ptr_eq(&entry.vehicle, vehicle));
    }

    pub fn has_vehicles(&self) -> bool {
        !self.vehicles.is_empty()
    }

    /// High-water mark of the shared wheel buffers.
    pub fn batch_capacity(&self) -> usize {
        self.batch_capacity
    }

    /// Runs the full pipeline for one frame. Vehicles inactive in their
    /// hierarchy are skipped wholesale, leaving their previous state stale.
    pub fn update(
        &mut self,
        world: &dyn SimulationWorld,
        default_material: MaterialId,
        dt: f32,
        gravity: Vec3,
    ) {
        self.batch.clear();
        self.active.clear();
        let mut wheels_total = 0;

        // Input conditioning and steering update
        for (index, entry) in self.vehicles.iter_mut().enumerate() {
            let vehicle = entry.vehicle.as_ref();
            if !vehicle.is_active_in_hierarchy() {
                continue;
            }
            self.active.push(index);
            self.batch.push(BatchEntry {
                drive: vehicle.drive(),
                wheel_count: vehicle.wheel_count(),
            });
            wheels_total += vehicle.wheel_count();

            let controls = vehicle.controls();
            let decision = resolve_drive_input(
                controls.throttle,
                controls.brake,
                vehicle.forward_speed(),
                vehicle.gears(),
                controls.use_reverse_as_brake,
            );
            if let Some(gear) = decision.shift_gear {
                vehicle.set_current_gear(gear);
            }

            let (steer_left, steer_right) = split_steer(controls.steering);
            let raw = [
                decision.throttle,
                decision.brake,
                controls.handbrake,
                steer_left,
                steer_right,
            ];
            if controls.use_analog_steering {
                entry.smoothed.smooth(&PAD_SMOOTHING, raw, dt);
            } else {
                entry.smoothed.smooth_digital(&KEY_SMOOTHING, raw, dt);
            }

            let inputs = DriveInputs {
                accel: entry.smoothed.accel(),
                brake: entry.smoothed.brake(),
                steer: entry.smoothed.steer() * steer_attenuation(vehicle.forward_speed()),
                handbrake: entry.smoothed.handbrake(),
            };
            world.apply_vehicle_inputs(vehicle.drive(), vehicle.drive_type(), inputs);
        }

        if self.batch.is_empty() {
            return;
        }

        // Grow the shared buffers; capacity is a high-water mark
        if wheels_total > self.batch_capacity {
            self.batch_capacity = wheels_total;
            self.query_results
                .resize(wheels_total, WheelRaycastResult::default());
            self.wheel_results
                .resize(wheels_total, WheelUpdateResult::default());
            world.rebuild_wheel_batch(wheels_total);
        }

        let frictions = self
            .frictions
            .get_or_insert_with(|| TireFrictionTable::single_surface(default_material));

        world.suspension_raycasts(&self.batch, &mut self.query_results[..wheels_total]);
        world.update_vehicles(
            dt,
            gravity,
            frictions,
            &self.batch,
            &mut self.wheel_results[..wheels_total],
        );

        // Synchronize wheel state back onto the owning objects. Iterates the
        // snapshot taken during the input pass, not the live active flags:
        // a flag flipping between the two passes must not shift the offsets
        // into the shared result buffers.
        let mut offset = 0;
        for (&index, batch) in self.active.iter().zip(&self.batch) {
            let vehicle = self.vehicles[index].vehicle.as_ref();
            let results = &self.wheel_results[offset..offset + batch.wheel_count];
            offset += batch.wheel_count;

            for (index, per_wheel) in results.iter().enumerate() {
                let state = WheelState {
                    is_in_air: per_wheel.is_in_air,
                    tire_contact_collider: per_wheel.tire_contact_collider,
                    tire_contact_point: per_wheel.tire_contact_point,
                    tire_contact_normal: per_wheel.tire_contact_normal,
                    tire_friction: per_wheel.tire_friction,
                    steer_angle: per_wheel.steer_angle.to_degrees(),
                    rotation_angle: -per_wheel.rotation_angle.to_degrees(),
                    suspension_offset: per_wheel.suspension_jounce,
                    suspension_trace_start: per_wheel.suspension_line_start,
                    suspension_trace_end: per_wheel.suspension_line_start
                        + per_wheel.suspension_line_dir * per_wheel.suspension_line_length,
                };
                vehicle.set_wheel_state(index, state);

                let binding = vehicle.wheel_binding(index);
                let Some(collider) = binding.collider else {
                    continue;
                };

                // Compose steer yaw with wheel spin, compensate the vehicle's
                // non-uniform scale and the collider center offset
                let mut transform = collider.local_transform();
                transform.orientation = Quat::from_rotation_y(per_wheel.steer_angle)
                    * Quat::from_rotation_z(-per_wheel.rotation_angle)
                    * binding.local_orientation;
                transform.translation = collider.shape_local_pose() / vehicle.scale()
                    - transform.orientation * collider.center();
                collider.set_local_transform(transform);
            }
        }
    }
}
