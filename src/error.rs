use thiserror::Error;

/// Errors raised while building or driving a physics scene.
///
/// Construction failures are non-fatal to the process: the scene is left
/// without a live world and every stepping call degrades to a no-op.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Failed to create simulation world: {0}")]
    WorldCreation(String),

    #[error("Failed to create physics dispatcher: {0}")]
    DispatcherCreation(String),

    #[error("Simulation backend fault: {0}")]
    Backend(String),
}
