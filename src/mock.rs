//! Recording mock backend used by scene and pipeline tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::Mutex;

use crate::backend::{
    ActiveTransform, ActorId, ControllerManagerId, DriveHandle, MaterialId, ObjectId,
    PhysicsBackend, SimulationWorld, StepResults, WorldDesc,
};
use crate::error::SceneError;
use crate::vehicles::{
    BatchEntry, DriveInputs, DriveType, GearState, TireFrictionTable, VehicleControls,
    WheelBinding, WheelRaycastResult, WheelState, WheelUpdateResult, WheeledVehicle,
};

#[derive(Default)]
pub struct MockWorld {
    gravity: Mutex<Vec3>,
    ccd: AtomicBool,
    bounce_threshold: Mutex<f32>,
    steps: Mutex<Vec<f32>>,
    live_actors: Mutex<Vec<ActorId>>,
    sleeping: Mutex<Vec<ActorId>>,
    released_actors: Mutex<Vec<ActorId>>,
    unlinked_materials: Mutex<Vec<MaterialId>>,
    released_materials: Mutex<Vec<MaterialId>>,
    released_objects: Mutex<Vec<ObjectId>>,
    active: Mutex<Vec<ActiveTransform>>,
    results: Mutex<StepResults>,
    batch_rebuilds: Mutex<Vec<usize>>,
    applied_inputs: Mutex<Vec<(DriveHandle, DriveInputs)>>,
    wheel_update: Mutex<WheelUpdateResult>,
    release_order: Mutex<Vec<&'static str>>,
    step_delay: Mutex<Duration>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_deltas(&self) -> Vec<f32> {
        self.steps.lock().clone()
    }

    pub fn live_actors(&self) -> Vec<ActorId> {
        self.live_actors.lock().clone()
    }

    pub fn sleeping(&self) -> Vec<ActorId> {
        self.sleeping.lock().clone()
    }

    pub fn released_actors(&self) -> Vec<ActorId> {
        self.released_actors.lock().clone()
    }

    pub fn unlinked_materials(&self) -> Vec<MaterialId> {
        self.unlinked_materials.lock().clone()
    }

    pub fn released_materials(&self) -> Vec<MaterialId> {
        self.released_materials.lock().clone()
    }

    pub fn released_objects(&self) -> Vec<ObjectId> {
        self.released_objects.lock().clone()
    }

    pub fn batch_rebuilds(&self) -> Vec<usize> {
        self.batch_rebuilds.lock().clone()
    }

    pub fn applied_inputs(&self) -> Vec<(DriveHandle, DriveInputs)> {
        self.applied_inputs.lock().clone()
    }

    pub fn release_order(&self) -> Vec<&'static str> {
        self.release_order.lock().clone()
    }

    pub fn set_active_actors(&self, active: Vec<ActiveTransform>) {
        *self.active.lock() = active;
    }

    pub fn set_step_results(&self, results: StepResults) {
        *self.results.lock() = results;
    }

    /// Template copied into every per-wheel slot by `update_vehicles`.
    pub fn set_wheel_update(&self, result: WheelUpdateResult) {
        *self.wheel_update.lock() = result;
    }

    /// Makes every `step` block for `delay`, keeping the step in flight long
    /// enough for other threads to race against it.
    pub fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.lock() = delay;
    }
}

impl SimulationWorld for MockWorld {
    fn step(&self, dt: f32, scratch: &mut [u8]) {
        assert_eq!(scratch.len(), crate::stepper::SCRATCH_BLOCK_SIZE);
        let delay = *self.step_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.steps.lock().push(dt);
    }

    fn fetch_results(&self) -> StepResults {
        std::mem::take(&mut *self.results.lock())
    }

    fn add_actor(&self, actor: ActorId) {
        self.live_actors.lock().push(actor);
    }

    fn add_actors(&self, actors: &[ActorId]) {
        self.live_actors.lock().extend_from_slice(actors);
    }

    fn remove_actors(&self, actors: &[ActorId]) {
        self.live_actors.lock().retain(|a| !actors.contains(a));
    }

    fn put_to_sleep(&self, actor: ActorId) {
        self.sleeping.lock().push(actor);
    }

    fn release_actor(&self, actor: ActorId) {
        self.released_actors.lock().push(actor);
    }

    fn unlink_material_owner(&self, material: MaterialId) {
        self.unlinked_materials.lock().push(material);
    }

    fn release_material(&self, material: MaterialId) {
        self.released_materials.lock().push(material);
    }

    fn release_object(&self, object: ObjectId) {
        self.released_objects.lock().push(object);
    }

    fn set_gravity(&self, gravity: Vec3) {
        *self.gravity.lock() = gravity;
    }

    fn gravity(&self) -> Vec3 {
        *self.gravity.lock()
    }

    fn set_ccd_enabled(&self, enabled: bool) {
        self.ccd.store(enabled, Ordering::SeqCst);
    }

    fn ccd_enabled(&self) -> bool {
        self.ccd.load(Ordering::SeqCst)
    }

    fn set_bounce_threshold_velocity(&self, velocity: f32) {
        *self.bounce_threshold.lock() = velocity;
    }

    fn bounce_threshold_velocity(&self) -> f32 {
        *self.bounce_threshold.lock()
    }

    fn active_actors(&self) -> Vec<ActiveTransform> {
        self.active.lock().clone()
    }

    fn create_controller_manager(&self) -> Result<ControllerManagerId, SceneError> {
        Ok(ControllerManagerId(1))
    }

    fn release_controller_manager(&self, _manager: ControllerManagerId) {
        self.release_order.lock().push("controller_manager");
    }

    fn apply_vehicle_inputs(&self, drive: DriveHandle, _drive_type: DriveType, inputs: DriveInputs) {
        self.applied_inputs.lock().push((drive, inputs));
    }

    fn rebuild_wheel_batch(&self, capacity: usize) {
        self.batch_rebuilds.lock().push(capacity);
    }

    fn suspension_raycasts(&self, vehicles: &[BatchEntry], results: &mut [WheelRaycastResult]) {
        let wheels: usize = vehicles.iter().map(|v| v.wheel_count).sum();
        assert_eq!(wheels, results.len());
        for result in results.iter_mut() {
            result.hit = true;
        }
    }

    fn update_vehicles(
        &self,
        _dt: f32,
        _gravity: Vec3,
        _frictions: &TireFrictionTable,
        vehicles: &[BatchEntry],
        results: &mut [WheelUpdateResult],
    ) {
        let wheels: usize = vehicles.iter().map(|v| v.wheel_count).sum();
        assert_eq!(wheels, results.len());
        let template = *self.wheel_update.lock();
        for result in results.iter_mut() {
            *result = template;
        }
    }
}

pub struct MockBackend {
    pub world: Arc<MockWorld>,
    pub fail_world_creation: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            world: Arc::new(MockWorld::new()),
            fail_world_creation: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            world: Arc::new(MockWorld::new()),
            fail_world_creation: true,
        }
    }
}

impl PhysicsBackend for MockBackend {
    fn create_world(&self, desc: WorldDesc) -> Result<Arc<dyn SimulationWorld>, SceneError> {
        if self.fail_world_creation {
            return Err(SceneError::WorldCreation("mock failure".into()));
        }
        self.world.set_gravity(desc.gravity);
        self.world.set_ccd_enabled(desc.enable_ccd);
        self.world
            .set_bounce_threshold_velocity(desc.bounce_threshold_velocity);
        Ok(self.world.clone())
    }

    fn default_material(&self) -> MaterialId {
        MaterialId(0)
    }
}

pub struct MockVehicle {
    drive: DriveHandle,
    wheel_count: usize,
    active: AtomicBool,
    forward_speed: Mutex<f32>,
    gears: Mutex<GearState>,
    controls: Mutex<VehicleControls>,
    scale: Mutex<Vec3>,
    bindings: Mutex<Vec<WheelBinding>>,
    states: Mutex<Vec<WheelState>>,
    state_writes: Mutex<usize>,
}

impl MockVehicle {
    pub fn new(drive: DriveHandle, wheel_count: usize) -> Self {
        Self {
            drive,
            wheel_count,
            active: AtomicBool::new(true),
            forward_speed: Mutex::new(0.0),
            gears: Mutex::new(GearState {
                current: 1,
                target: 1,
            }),
            controls: Mutex::new(VehicleControls::default()),
            scale: Mutex::new(Vec3::ONE),
            bindings: Mutex::new(vec![WheelBinding::default(); wheel_count]),
            states: Mutex::new(vec![WheelState::default(); wheel_count]),
            state_writes: Mutex::new(0),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn set_forward_speed(&self, speed: f32) {
        *self.forward_speed.lock() = speed;
    }

    pub fn set_controls(&self, controls: VehicleControls) {
        *self.controls.lock() = controls;
    }

    pub fn set_scale(&self, scale: Vec3) {
        *self.scale.lock() = scale;
    }

    pub fn set_wheel_binding(&self, index: usize, binding: WheelBinding) {
        self.bindings.lock()[index] = binding;
    }

    pub fn wheel_state(&self, index: usize) -> WheelState {
        self.states.lock()[index].clone()
    }

    pub fn wheel_state_writes(&self) -> usize {
        *self.state_writes.lock()
    }
}

impl WheeledVehicle for MockVehicle {
    fn is_active_in_hierarchy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn drive(&self) -> DriveHandle {
        self.drive
    }

    fn drive_type(&self) -> DriveType {
        DriveType::Drive4W
    }

    fn wheel_count(&self) -> usize {
        self.wheel_count
    }

    fn forward_speed(&self) -> f32 {
        *self.forward_speed.lock()
    }

    fn gears(&self) -> GearState {
        *self.gears.lock()
    }

    fn set_current_gear(&self, gear: i32) {
        let mut gears = self.gears.lock();
        gears.current = gear;
        gears.target = gear;
    }

    fn controls(&self) -> VehicleControls {
        *self.controls.lock()
    }

    fn scale(&self) -> Vec3 {
        *self.scale.lock()
    }

    fn wheel_binding(&self, index: usize) -> WheelBinding {
        self.bindings.lock()[index].clone()
    }

    fn set_wheel_state(&self, index: usize, state: WheelState) {
        self.states.lock()[index] = state;
        *self.state_writes.lock() += 1;
    }
}
