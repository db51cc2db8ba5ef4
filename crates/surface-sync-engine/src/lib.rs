pub mod editing;
pub mod error;
pub mod input;
pub mod model;
pub mod store;
pub mod surface;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use error::{EngineError, Result};
pub use input::{EditorEvent, InputCoordinator, InputIntent, InputType, IntentOutcome};
pub use model::*;
pub use store::{MemoryStore, NodeStore};
pub use surface::{MemorySurface, MutationRecord, SurfaceKey, SurfaceTree};
pub use surface_sync_config::Config;
