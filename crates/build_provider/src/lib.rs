//! Minimal provider-agnostic contract for template selection and one streamed
//! build run.
//!
//! This crate defines only the shared run lifecycle, transcript and template
//! types. It excludes transport details, wire payloads, and session
//! orchestration.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

/// Identifier for one provider run.
pub type RunId = u64;

/// Shared cancellation flag for a run.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a provider before any run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Project templates the classifier may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    React,
    Node,
}

impl TemplateKind {
    /// Classifies raw classifier output.
    ///
    /// The match is exact: no trimming, no case folding. `"React"`,
    /// `" react"` and `"vue"` are all rejected.
    #[must_use]
    pub fn from_classifier_output(answer: &str) -> Option<Self> {
        match answer {
            "react" => Some(Self::React),
            "node" => Some(Self::Node),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::React => "react",
            Self::Node => "node",
        }
    }
}

/// Seed material for a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSelection {
    /// Seed user messages placed ahead of the user's prompt.
    pub prompts: Vec<String>,
    /// Markup documents describing the template's base files.
    pub ui_prompts: Vec<String>,
}

/// Failure to obtain a template selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The classifier answered outside the supported template set.
    Rejected { answer: Option<String> },
    Transport(String),
    Cancelled,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { answer: Some(answer) } => write!(
                f,
                "access denied: prompt classified as unsupported template '{answer}'"
            ),
            Self::Rejected { answer: None } => {
                f.write_str("access denied: prompt does not map to a supported template")
            }
            Self::Transport(message) => write!(f, "template request failed: {message}"),
            Self::Cancelled => f.write_str("template request cancelled"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Input required to start a provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub messages: Vec<ChatMessage>,
}

/// Provider-emitted lifecycle event for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Started { run_id: RunId },
    Chunk { run_id: RunId, text: String },
    Finished { run_id: RunId },
    Failed { run_id: RunId, error: String },
    Cancelled { run_id: RunId },
}

impl RunEvent {
    /// Returns the run identifier associated with this event.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Started { run_id }
            | Self::Chunk { run_id, .. }
            | Self::Finished { run_id }
            | Self::Failed { run_id, .. }
            | Self::Cancelled { run_id } => *run_id,
        }
    }

    /// Returns true when this event terminates the run lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    /// Backend endpoint or script name, for display.
    pub target: String,
}

/// Provider interface for template selection and streamed build runs.
///
/// Both calls block the calling thread; hosts run them on worker threads.
pub trait BuildProvider: Send + Sync + 'static {
    /// Returns provider identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Classifies `prompt` and returns the template's seed material.
    fn select_template(
        &self,
        prompt: &str,
        cancel: CancelSignal,
    ) -> Result<TemplateSelection, TemplateError>;

    /// Streams one response for `req.messages` and emits lifecycle events in
    /// provider order.
    ///
    /// Exactly one terminal event is emitted per run. An `Err` return means
    /// the provider could not emit events at all.
    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String>;
}
