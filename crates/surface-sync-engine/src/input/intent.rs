use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::editing::SurfaceSelection;
use crate::model::MarkKind;

/// The host's name for an edit it is about to perform.
///
/// Names follow the `beforeinput` `inputType` vocabulary; anything else is
/// kept verbatim in [`InputType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputType {
    InsertText,
    InsertReplacementText,
    InsertFromPaste,
    InsertFromDrop,
    InsertCompositionText,
    InsertFromYank,
    InsertParagraph,
    InsertLineBreak,
    DeleteContentBackward,
    DeleteContentForward,
    DeleteWordBackward,
    DeleteWordForward,
    DeleteByCut,
    DeleteByDrag,
    HistoryUndo,
    HistoryRedo,
    FormatBold,
    FormatItalic,
    FormatUnderline,
    FormatStrikeThrough,
    Other(String),
}

const NAMES: &[(&str, InputType)] = &[
    ("insertText", InputType::InsertText),
    ("insertReplacementText", InputType::InsertReplacementText),
    ("insertFromPaste", InputType::InsertFromPaste),
    ("insertFromDrop", InputType::InsertFromDrop),
    ("insertCompositionText", InputType::InsertCompositionText),
    ("insertFromYank", InputType::InsertFromYank),
    ("insertParagraph", InputType::InsertParagraph),
    ("insertLineBreak", InputType::InsertLineBreak),
    ("deleteContentBackward", InputType::DeleteContentBackward),
    ("deleteContentForward", InputType::DeleteContentForward),
    ("deleteWordBackward", InputType::DeleteWordBackward),
    ("deleteWordForward", InputType::DeleteWordForward),
    ("deleteByCut", InputType::DeleteByCut),
    ("deleteByDrag", InputType::DeleteByDrag),
    ("historyUndo", InputType::HistoryUndo),
    ("historyRedo", InputType::HistoryRedo),
    ("formatBold", InputType::FormatBold),
    ("formatItalic", InputType::FormatItalic),
    ("formatUnderline", InputType::FormatUnderline),
    ("formatStrikeThrough", InputType::FormatStrikeThrough),
];

impl InputType {
    pub fn as_str(&self) -> &str {
        if let InputType::Other(name) = self {
            return name;
        }
        NAMES
            .iter()
            .find(|(_, input_type)| input_type == self)
            .map_or("", |(name, _)| name)
    }

    /// Intents whose effect is observed on the surface rather than applied
    /// up front; only these leave a hint behind.
    pub fn is_hintable(&self) -> bool {
        matches!(
            self,
            InputType::InsertText
                | InputType::InsertReplacementText
                | InputType::InsertFromPaste
                | InputType::InsertFromDrop
                | InputType::InsertCompositionText
                | InputType::InsertFromYank
        )
    }

    pub fn format_mark(&self) -> Option<MarkKind> {
        match self {
            InputType::FormatBold => Some(MarkKind::Bold),
            InputType::FormatItalic => Some(MarkKind::Italic),
            InputType::FormatUnderline => Some(MarkKind::Underline),
            InputType::FormatStrikeThrough => Some(MarkKind::Strikethrough),
            _ => None,
        }
    }
}

impl FromStr for InputType {
    type Err = Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map_or_else(|| InputType::Other(name.to_string()), |(_, input_type)| input_type.clone()))
    }
}

impl From<String> for InputType {
    fn from(name: String) -> Self {
        match name.parse() {
            Ok(input_type) => input_type,
            Err(never) => match never {},
        }
    }
}

impl From<InputType> for String {
    fn from(input_type: InputType) -> Self {
        input_type.as_str().to_string()
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-commit notification: what the host is about to do, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputIntent {
    pub input_type: InputType,
    /// Surface range the host will replace; the current selection if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_range: Option<SurfaceSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl InputIntent {
    pub fn new(input_type: InputType) -> Self {
        Self {
            input_type,
            target_range: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_target(mut self, target: SurfaceSelection) -> Self {
        self.target_range = Some(target);
        self
    }
}
