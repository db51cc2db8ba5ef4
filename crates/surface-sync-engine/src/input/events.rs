use crate::editing::TransactionResult;
use crate::input::debug::InputDebug;
use crate::model::ModelSelection;

/// Notifications for the renderer and host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The model changed.
    ///
    /// `skip_render` is set when the surface already shows the change; a
    /// repaint would re-observe the engine's own writes.
    ContentChanged {
        skip_render: bool,
        transaction: TransactionResult,
        input_debug: Option<InputDebug>,
    },
    SelectionChanged {
        selection: Option<ModelSelection>,
        old_selection: Option<ModelSelection>,
    },
}

impl EditorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EditorEvent::ContentChanged { .. } => "content.changed",
            EditorEvent::SelectionChanged { .. } => "selection.changed",
        }
    }
}
