//! Physics scene core: asynchronous stepping, deferred scene mutation and
//! wheeled-vehicle updates over an opaque simulation backend.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod queue;
pub mod scene;
pub mod stepper;
pub mod vehicles;

#[cfg(test)]
mod mock;

// Re-export commonly used types
pub use backend::{
    ActiveTransform, ActorId, ActorKind, ActorOwner, ColliderId, ControllerManagerId,
    DriveHandle, JointId, MaterialId, ObjectId, PhysicsBackend, SimulationWorld, StepResults,
    Transform, WorldDesc,
};
pub use config::{CpuInfo, PhysicsSettings};
pub use error::SceneError;
pub use events::{
    CollisionEvent, CollisionEventHandler, EventCollector, JointBreakEvent, JointEventHandler,
    TouchKind, TriggerEvent, TriggerEventHandler,
};
pub use filter::{filter_pair, FilterData, FilterObjectFlags, FilterVerdict, PairFlags};
pub use scene::PhysicsScene;
pub use stepper::{FixedStepper, RemainderPolicy, MIN_SIMULATION_DELTA, SCRATCH_BLOCK_SIZE};
pub use vehicles::{
    DriveType, TireFrictionTable, VehicleControls, VehiclePipeline, WheelState, WheeledVehicle,
};
