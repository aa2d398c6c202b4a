//! Typed build instructions extracted from artifact markup.

use serde::{Deserialize, Serialize};

/// Closed set of instructions the markup can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateFile,
    CreateFolder,
    RunCommand,
}

impl ActionKind {
    /// Maps a markup `type` attribute onto an action kind.
    ///
    /// Unknown values return `None` and the enclosing block is skipped.
    pub fn from_markup_type(value: &str) -> Option<Self> {
        Some(match value {
            "file" => Self::CreateFile,
            "folder" => Self::CreateFolder,
            "shell" => Self::RunCommand,
            _ => return None,
        })
    }

    /// Returns true for kinds that shape the file tree.
    pub fn is_tree_mutation(&self) -> bool {
        matches!(self, Self::CreateFile | Self::CreateFolder)
    }
}

/// One instruction parsed out of a markup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Slash-delimited project path. `None` for [`ActionKind::RunCommand`].
    pub path: Option<String>,
    /// File contents for file actions, command text for shell actions.
    pub payload: String,
    /// Position of the action within its markup document.
    pub sequence_index: usize,
}

impl Action {
    #[must_use]
    pub fn create_file(
        sequence_index: usize,
        path: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind: ActionKind::CreateFile,
            path: Some(path.into()),
            payload: payload.into(),
            sequence_index,
        }
    }

    #[must_use]
    pub fn create_folder(sequence_index: usize, path: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::CreateFolder,
            path: Some(path.into()),
            payload: String::new(),
            sequence_index,
        }
    }

    #[must_use]
    pub fn run_command(sequence_index: usize, command: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::RunCommand,
            path: None,
            payload: command.into(),
            sequence_index,
        }
    }
}
