//! Host input handling.
//!
//! Pre-commit intents leave hints in [`hint`]; observed mutation batches are
//! sorted into change cases by [`classify`]; [`coordinator`] ties both to the
//! transaction engine and emits [`events`] for the renderer.

pub mod classify;
pub mod coordinator;
pub mod debug;
pub mod events;
pub mod hint;
pub mod intent;

pub use classify::{
    ChangeCase, ChangeMetadata, ClassifiedChange, ClassifyContext, MarkAction, MarkSignal,
    SignalSource, StructureChange, StructureShape, classify,
};
pub use coordinator::{InputCoordinator, IntentOutcome, ReentrancyPhase};
pub use debug::{DebugStatus, InputDebug};
pub use events::EditorEvent;
pub use hint::{HintTracker, InputHint};
pub use intent::{InputIntent, InputType};
