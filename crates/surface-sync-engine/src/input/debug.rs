use serde::{Deserialize, Serialize};

use crate::input::classify::ChangeCase;
use crate::input::intent::InputType;
use crate::model::ContentRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugStatus {
    Ok,
    /// The hinted range disagreed with the diff; the diff was applied.
    Mismatch,
    /// The change was classified but deliberately not applied.
    Skipped,
}

/// What the pipeline did with the last mutation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDebug {
    pub case: ChangeCase,
    pub input_type: Option<InputType>,
    pub used_input_hint: bool,
    pub classified_content_range: Option<ContentRange>,
    pub applied_content_range: Option<ContentRange>,
    pub status: DebugStatus,
    pub notes: Vec<String>,
}

impl InputDebug {
    pub fn new(case: ChangeCase) -> Self {
        Self {
            case,
            input_type: None,
            used_input_hint: false,
            classified_content_range: None,
            applied_content_range: None,
            status: DebugStatus::Ok,
            notes: Vec::new(),
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = DebugStatus::Skipped;
        self.note(reason);
    }
}
