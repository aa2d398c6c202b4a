use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SandboxError;
use crate::events::SandboxEvent;
use crate::mount::MountTree;

/// Program plus arguments, run from the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl SandboxCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn npm_install() -> Self {
        Self::new("npm", ["install"])
    }

    pub fn npm_run_dev() -> Self {
        Self::new("npm", ["run", "dev"])
    }
}

impl std::fmt::Display for SandboxCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Handle to a long-running server process.
pub trait ServerHandle: Send + Sync {
    /// Requests termination. Safe to call more than once.
    fn stop(&self);
}

/// Isolated environment that can host a mounted project.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Materializes `tree` at the sandbox root.
    async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError>;

    /// Runs `command` to completion, forwarding output lines and a final
    /// `Exit` to `events`. Returns the exit code.
    async fn run(
        &self,
        command: &SandboxCommand,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<Option<i32>, SandboxError>;

    /// Starts `command` in the background. Output, `ServerReady` and `Exit`
    /// are delivered on `events` as they happen.
    async fn spawn_server(
        &self,
        command: &SandboxCommand,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<Box<dyn ServerHandle>, SandboxError>;
}
