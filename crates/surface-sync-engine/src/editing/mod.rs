/*!
 * # Editing Core
 *
 * Everything that turns an observed surface edit into a model change.
 *
 * ## Pipeline
 *
 * ### 1. Flattening
 * - **`run_index`** maps the physical spans under one logical node onto a
 *   single offset space, skipping decoration-only subtrees
 * - Rebuilt on every call; the host mutates spans out of band
 *
 * ### 2. Delta recovery
 * - **`diff`** strips the common grapheme prefix/suffix of two snapshots and
 *   uses the caret to pick between equally minimal edits
 * - **`edit`** turns the result into a `TextEdit` applied through an
 *   `xi_rope::Delta`
 *
 * ### 3. Range upkeep
 * - **`remap`** carries marks and annotations through a `TextEdit`
 *
 * ### 4. Application
 * - **`commands`** defines the `Operation` set and executes each one against
 *   a copy-on-write overlay
 * - **`transaction`** runs operation lists atomically, collects inverses and
 *   resolves the post-edit caret
 * - **`history`** stacks transaction inverses for undo/redo
 *
 * ### 5. Caret
 * - **`selection_bridge`** converts selections between surface points and
 *   model positions
 *
 * ## Usage Pattern
 *
 * ```rust
 * use surface_sync_engine::editing::*;
 * use surface_sync_engine::model::{LogicalNode, ModelSelection, Position};
 * use surface_sync_engine::store::MemoryStore;
 *
 * let mut store = MemoryStore::new();
 * store
 *     .append_paragraph("p1", "paragraph", LogicalNode::text("t1", "Hello World"))
 *     .unwrap();
 *
 * let engine = TransactionEngine::new(store);
 * let mut history = History::default();
 *
 * let result = engine.apply(vec![Operation::InsertText {
 *     at: Position::new("t1", 6),
 *     text: "New ".to_string(),
 * }]);
 * assert_eq!(result.selection_after, Some(ModelSelection::caret("t1", 10)));
 * history.record(&result);
 *
 * history.undo(&engine);
 * engine.read(|store, _| assert_eq!(store.text_of("t1"), Some("Hello World")));
 * ```
 */

pub mod commands;
pub mod diff;
pub mod edit;
pub mod history;
pub mod remap;
pub mod run_index;
pub mod selection_bridge;
pub mod transaction;

pub use commands::{OpOutcome, Operation, TransactionContext, execute};
pub use diff::{ChangeType, DiffOptions, TextChange, diff, diff_with};
pub use edit::{EditType, TextEdit};
pub use history::{History, HistoryEntry};
pub use remap::{adjust, adjust_annotations, adjust_span};
pub use run_index::{Run, RunIndex, RunIndexOptions, convert_offset_with_runs};
pub use selection_bridge::{SurfacePoint, SurfaceSelection, to_model, to_surface};
pub use transaction::{
    Intercept, TransactionEngine, TransactionError, TransactionExtension, TransactionResult,
};
