//! Scene façade: owns the stepper, the deferred mutation queues, the event
//! collector and the vehicle pipeline for one simulation world.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use glam::Vec3;
use log::error;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::backend::{
    ActorId, ActorKind, ActorOwner, ColliderId, ControllerManagerId, JointId, MaterialId,
    ObjectId, PhysicsBackend, SimulationWorld, WorldDesc,
};
use crate::config::{CpuInfo, PhysicsSettings};
use crate::events::EventCollector;
use crate::filter::filter_pair;
use crate::queue::{ActionKind, PendingChanges};
use crate::stepper::{FixedStepper, SCRATCH_BLOCK_SIZE};
use crate::vehicles::{VehiclePipeline, WheeledVehicle};

struct ActorBinding {
    kind: ActorKind,
    owner: Arc<dyn ActorOwner>,
}

/// Stepping state touched only by the owning thread.
#[derive(Default)]
struct StepState {
    stepper: Option<FixedStepper>,
    scratch: Option<Arc<Mutex<Vec<u8>>>>,
    last_delta_time: f32,
}

/// One physics simulation world.
///
/// A single designated owning thread drives `simulate`/`collect_results`;
/// any thread may call the mutation API concurrently with an in-flight step.
/// The step itself runs on an internal worker pool.
///
/// An actor removed and re-added within the same frame before a flush is not
/// reconciled: the last operation applied wins per queue.
pub struct PhysicsScene {
    name: String,
    settings: PhysicsSettings,
    backend: Arc<dyn PhysicsBackend>,
    world: Option<Arc<dyn SimulationWorld>>,
    dispatcher: Option<ThreadPool>,
    controller_manager: Option<ControllerManagerId>,
    events: Arc<EventCollector>,
    pending: PendingChanges,
    vehicles: Mutex<VehiclePipeline>,
    actor_owners: Mutex<HashMap<ActorId, ActorBinding>>,
    step: Mutex<StepState>,
    is_during_simulation: AtomicBool,
    auto_simulation: AtomicBool,
    owner_thread: ThreadId,
}

impl PhysicsScene {
    /// Creates a scene for `settings`, sizing the worker pool from `cpu`.
    ///
    /// Backend world creation failure is non-fatal: the error is logged and
    /// the scene is left unusable, with getters returning engine defaults
    /// and stepping degrading to a no-op.
    pub fn new(
        name: impl Into<String>,
        settings: &PhysicsSettings,
        cpu: CpuInfo,
        backend: Arc<dyn PhysicsBackend>,
    ) -> Self {
        let name = name.into();
        let events = Arc::new(EventCollector::new());

        let dispatcher = match ThreadPoolBuilder::new()
            .num_threads(cpu.worker_threads())
            .thread_name(|index| format!("physics-{index}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                error!("Failed to create physics dispatcher for scene '{name}': {err}");
                None
            }
        };

        let world = if dispatcher.is_some() {
            let desc = WorldDesc {
                gravity: settings.default_gravity,
                enable_ccd: !settings.disable_ccd,
                enable_adaptive_force: settings.enable_adaptive_force,
                bounce_threshold_velocity: settings.bounce_threshold_velocity,
                filter: filter_pair,
                events: events.clone(),
            };
            match backend.create_world(desc) {
                Ok(world) => Some(world),
                Err(err) => {
                    error!("Failed to create simulation world for scene '{name}': {err}");
                    None
                }
            }
        } else {
            None
        };

        let controller_manager = world.as_ref().and_then(|world| {
            match world.create_controller_manager() {
                Ok(manager) => Some(manager),
                Err(err) => {
                    error!("Failed to create controller manager for scene '{name}': {err}");
                    None
                }
            }
        });

        Self {
            name,
            settings: settings.clone(),
            backend,
            world,
            dispatcher,
            controller_manager,
            events,
            pending: PendingChanges::new(),
            vehicles: Mutex::new(VehiclePipeline::new()),
            actor_owners: Mutex::new(HashMap::new()),
            step: Mutex::new(StepState::default()),
            is_during_simulation: AtomicBool::new(false),
            auto_simulation: AtomicBool::new(true),
            owner_thread: thread::current().id(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_during_simulation(&self) -> bool {
        self.is_during_simulation.load(Ordering::Acquire)
    }

    pub fn auto_simulation(&self) -> bool {
        self.auto_simulation.load(Ordering::Relaxed)
    }

    pub fn set_auto_simulation(&self, value: bool) {
        self.auto_simulation.store(value, Ordering::Relaxed);
    }

    /// Effective delta of the last dispatched step.
    pub fn last_delta_time(&self) -> f32 {
        self.step.lock().last_delta_time
    }

    pub fn events(&self) -> &Arc<EventCollector> {
        &self.events
    }

    pub fn controller_manager(&self) -> Option<ControllerManagerId> {
        self.controller_manager
    }

    pub fn gravity(&self) -> Vec3 {
        match &self.world {
            Some(world) => world.gravity(),
            None => self.settings.default_gravity,
        }
    }

    pub fn set_gravity(&self, value: Vec3) {
        if let Some(world) = &self.world {
            world.set_gravity(value);
        }
    }

    pub fn ccd_enabled(&self) -> bool {
        match &self.world {
            Some(world) => world.ccd_enabled(),
            None => !self.settings.disable_ccd,
        }
    }

    pub fn set_ccd_enabled(&self, value: bool) {
        if let Some(world) = &self.world {
            world.set_ccd_enabled(value);
        }
    }

    pub fn bounce_threshold_velocity(&self) -> f32 {
        match &self.world {
            Some(world) => world.bounce_threshold_velocity(),
            None => self.settings.bounce_threshold_velocity,
        }
    }

    pub fn set_bounce_threshold_velocity(&self, value: f32) {
        if let Some(world) = &self.world {
            world.set_bounce_threshold_velocity(value);
        }
    }

    /// Registers the transform-propagation target for an actor. Resolved
    /// once here instead of downcasting per frame.
    pub fn bind_actor(&self, actor: ActorId, kind: ActorKind, owner: Arc<dyn ActorOwner>) {
        self.actor_owners
            .lock()
            .insert(actor, ActorBinding { kind, owner });
    }

    pub fn unbind_actor(&self, actor: ActorId) {
        self.actor_owners.lock().remove(&actor);
    }

    /// Adds an actor to the scene. Immediate when called from the owning
    /// thread outside a step, deferred otherwise.
    pub fn add_actor(&self, actor: ActorId) {
        let mut pending = self.pending.lock();
        if self.on_owner_thread() && !self.is_during_simulation() {
            if let Some(world) = &self.world {
                world.add_actor(actor);
                return;
            }
        }
        pending.new_actors.push(actor);
    }

    /// Adds a dynamic actor, optionally putting it to sleep on insertion.
    pub fn add_dynamic_actor(&self, actor: ActorId, put_to_sleep: bool) {
        let mut pending = self.pending.lock();
        if self.on_owner_thread() && !self.is_during_simulation() {
            if let Some(world) = &self.world {
                world.add_actor(actor);
                if put_to_sleep {
                    world.put_to_sleep(actor);
                }
                return;
            }
        }
        pending.new_actors.push(actor);
        if put_to_sleep {
            pending.actions.push((ActionKind::Sleep, actor));
        }
    }

    /// Queues an actor for removal. Its owner binding is unlinked eagerly so
    /// no further transform updates reach the owning object.
    pub fn remove_actor(&self, actor: ActorId) {
        self.actor_owners.lock().remove(&actor);
        self.pending.push_dead_actor(actor);
    }

    pub fn remove_collider(&self, collider: ColliderId) {
        self.pending.push_dead_collider(collider);
    }

    pub fn remove_joint(&self, joint: JointId) {
        self.pending.push_dead_joint(joint);
    }

    pub fn remove_material(&self, material: MaterialId) {
        self.pending.push_dead_material(material);
    }

    pub fn remove_object(&self, object: ObjectId) {
        self.pending.push_dead_object(object);
    }

    pub fn add_vehicle(&self, vehicle: Arc<dyn WheeledVehicle>) {
        self.vehicles.lock().add(vehicle);
    }

    pub fn remove_vehicle(&self, vehicle: &Arc<dyn WheeledVehicle>) {
        self.vehicles.lock().remove(vehicle);
    }

    /// Applies all pending mutations. Must not run while a step is in
    /// flight; invoked automatically at the start of every `simulate`.
    pub fn flush_requests(&self) {
        assert!(
            !self.is_during_simulation(),
            "flush_requests called while a step is in flight"
        );
        let changes = self.pending.take();
        if changes.is_empty() {
            return;
        }
        let Some(world) = &self.world else {
            return;
        };

        // Ordering below is a correctness invariant: colliders and joints are
        // reported to the event collector before anything is released, and
        // materials are unlinked from their owners before release.
        if !changes.new_actors.is_empty() {
            world.add_actors(&changes.new_actors);
        }

        for (kind, actor) in &changes.actions {
            match kind {
                ActionKind::Sleep => world.put_to_sleep(*actor),
            }
        }

        if !changes.dead_actors.is_empty() {
            world.remove_actors(&changes.dead_actors);
            for actor in &changes.dead_actors {
                world.release_actor(*actor);
            }
        }

        for collider in &changes.dead_colliders {
            self.events.on_collider_removed(*collider);
        }

        for joint in &changes.dead_joints {
            self.events.on_joint_removed(*joint);
        }

        for material in &changes.dead_materials {
            world.unlink_material_owner(*material);
            world.release_material(*material);
        }

        for object in &changes.dead_objects {
            world.release_object(*object);
        }
    }

    /// Flushes pending mutations and dispatches an asynchronous step of at
    /// most `max_delta_time`. Valid only from the owning thread while no
    /// step is in flight.
    pub fn simulate(&self, dt: f32) {
        assert!(
            self.on_owner_thread(),
            "simulate must be called from the owning thread"
        );
        assert!(!self.is_during_simulation(), "simulate is not reentrant");

        self.flush_requests();

        let (Some(world), Some(pool)) = (&self.world, &self.dispatcher) else {
            return;
        };

        let dt = dt.clamp(0.0, self.settings.max_delta_time);

        let mut step = self.step.lock();
        let scratch = step
            .scratch
            .get_or_insert_with(|| Arc::new(Mutex::new(vec![0u8; SCRATCH_BLOCK_SIZE])))
            .clone();
        let stepper = step.stepper.get_or_insert_with(FixedStepper::new);
        if self.settings.enable_substepping {
            stepper.setup_substeps(
                self.settings.substep_delta_time,
                self.settings.max_substeps,
                self.settings.remainder_policy,
            );
        } else {
            stepper.setup_fixed(dt);
        }

        // Cleared before dispatch; the backend raises events as soon as the
        // worker starts stepping
        self.events.clear();
        self.is_during_simulation.store(true, Ordering::Release);
        if !stepper.advance(world, dt, &scratch, pool) {
            // Delta too small to simulate
            self.is_during_simulation.store(false, Ordering::Release);
            self.events.end_frame();
            return;
        }
        stepper.render_done();
        step.last_delta_time = dt;
    }

    /// Blocks until the in-flight step completes, then synchronizes results:
    /// vehicles, active-actor transforms and accumulated events, in that
    /// order. No-op when no step is in flight.
    pub fn collect_results(&self) {
        if !self.is_during_simulation() {
            return;
        }
        assert!(
            self.on_owner_thread(),
            "collect_results must be called from the owning thread"
        );
        let Some(world) = &self.world else {
            self.is_during_simulation.store(false, Ordering::Release);
            return;
        };

        let mut step = self.step.lock();
        if let Some(stepper) = step.stepper.as_mut() {
            stepper.wait();
        }
        let dt = step.last_delta_time;
        drop(step);

        {
            let mut vehicles = self.vehicles.lock();
            if vehicles.has_vehicles() {
                vehicles.update(
                    world.as_ref(),
                    self.backend.default_material(),
                    dt,
                    world.gravity(),
                );
            }
        }

        let active = world.active_actors();
        if !active.is_empty() {
            let owners = self.actor_owners.lock();
            for entry in &active {
                if let Some(binding) = owners.get(&entry.actor) {
                    debug_assert!(binding.kind != ActorKind::Static);
                    binding.owner.on_active_transform_changed(entry.transform);
                }
            }
        }

        self.events.collect_results(world.as_ref());
        self.events.send_trigger_events();
        self.events.send_collision_events();
        self.events.send_joint_events();
        self.events.end_frame();

        self.is_during_simulation.store(false, Ordering::Release);
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner_thread
    }
}

impl Drop for PhysicsScene {
    fn drop(&mut self) {
        // Fixed release order: controller manager, dispatcher, stepper,
        // scratch memory, then the world itself
        if let Some(world) = &self.world {
            if let Some(manager) = self.controller_manager.take() {
                world.release_controller_manager(manager);
            }
        }
        self.dispatcher = None;
        {
            let mut step = self.step.lock();
            step.stepper = None;
            step.scratch = None;
        }
        self.world = None;
    }
}
