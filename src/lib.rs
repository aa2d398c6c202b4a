//! Streaming site builder core.
//!
//! Turns the artifact markup an LLM streams back into typed build steps and
//! folds those steps into a virtual project file tree.
//!
//! # Public API Overview
//! - Parse markup with [`parse_actions`] / [`parse_artifact`]. Both are pure
//!   and safe to call on any prefix of a streaming response.
//! - Wrap actions into [`Step`]s with [`pending_steps`].
//! - Fold pending steps into a [`FileTree`] with [`apply_pending_steps`], then
//!   mark the reported ids with [`mark_completed`].
//!
//! Invariant: the tree only ever changes through the projector, so every
//! intermediate tree is consistent with a prefix of the step list.

pub mod action;
pub mod markup;
pub mod projector;
pub mod step;
pub mod tree;

pub use crate::action::{Action, ActionKind};
pub use crate::markup::{
    parse_actions, parse_artifact, streaming_file_preview, strip_code_fence, ArtifactDocument,
    FilePreview,
};
pub use crate::projector::{apply_pending_steps, Projection};
pub use crate::step::{mark_completed, pending_steps, Step, StepId, StepStatus};
pub use crate::tree::{language_for_path, normalize_path, FileNode, FileTree, NodeKind};
