use serde::{Deserialize, Serialize};

use crate::surface::SurfaceKey;

/// What a single surface mutation notification reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// The character data of a text node changed.
    CharacterData,
    /// Children were added to or removed from the target.
    ChildList {
        added: Vec<SurfaceKey>,
        removed: Vec<SurfaceKey>,
    },
    /// An attribute of the target element changed.
    Attributes { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub target: SurfaceKey,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn character_data(target: SurfaceKey) -> Self {
        Self {
            target,
            kind: MutationKind::CharacterData,
        }
    }

    pub fn child_list(target: SurfaceKey, added: Vec<SurfaceKey>, removed: Vec<SurfaceKey>) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList { added, removed },
        }
    }

    pub fn attributes(target: SurfaceKey, name: impl Into<String>) -> Self {
        Self {
            target,
            kind: MutationKind::Attributes { name: name.into() },
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.kind, MutationKind::ChildList { .. })
    }

    pub fn is_character_data(&self) -> bool {
        matches!(self.kind, MutationKind::CharacterData)
    }

    /// Added and removed nodes of a child-list mutation; empty otherwise.
    pub fn touched_children(&self) -> (&[SurfaceKey], &[SurfaceKey]) {
        match &self.kind {
            MutationKind::ChildList { added, removed } => (added.as_slice(), removed.as_slice()),
            _ => (&[], &[]),
        }
    }
}
