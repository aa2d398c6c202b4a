//! Execution bridge between the virtual file tree and a runnable preview.
//!
//! [`MountTree`] converts a [`site_builder::FileTree`] into the nested
//! `file`/`directory` mount format. A [`Sandbox`] accepts that mount, runs
//! commands and reports lifecycle events; [`PreviewRunner`] drives the
//! install-then-serve sequence on top of any sandbox. [`LocalSandbox`] is the
//! on-disk implementation backed by `tokio::process`.

pub mod error;
pub mod events;
pub mod local;
pub mod mount;
pub mod preview;
pub mod sandbox;

pub use error::{PreviewError, SandboxError};
pub use events::SandboxEvent;
pub use local::LocalSandbox;
pub use mount::{MountEntry, MountTree};
pub use preview::{PreviewRunner, PreviewState, DEFAULT_STARTUP_TIMEOUT};
pub use sandbox::{Sandbox, SandboxCommand, ServerHandle};
