use serde::{Deserialize, Serialize};

/// One `data:` frame of the chat stream.
///
/// `Done` and `Error` are terminal; nothing after them is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    Token {
        #[serde(default)]
        content: String,
    },
    Done,
    Error {
        #[serde(default, alias = "message")]
        error: Option<String>,
    },
}

impl ChatStreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}
