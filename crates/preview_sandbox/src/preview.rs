use std::sync::Arc;
use std::time::Duration;

use site_builder::FileTree;
use tokio::sync::mpsc;

use crate::error::PreviewError;
use crate::events::SandboxEvent;
use crate::mount::MountTree;
use crate::sandbox::{Sandbox, SandboxCommand, ServerHandle};

/// Upper bound on the wait for the dev server to report ready.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Mounting,
    Installing,
    Starting,
    Ready { port: u16, url: String },
    Failed(String),
}

/// Drives mount, `npm install` and `npm run dev` on top of a sandbox.
///
/// Every failure leaves the runner in [`PreviewState::Failed`]; [`retry`]
/// re-runs the whole sequence for the last tree.
///
/// [`retry`]: PreviewRunner::retry
pub struct PreviewRunner<S: Sandbox> {
    sandbox: Arc<S>,
    startup_timeout: Duration,
    state: PreviewState,
    last_tree: Option<FileTree>,
    server: Option<Box<dyn ServerHandle>>,
}

impl<S: Sandbox + 'static> PreviewRunner<S> {
    pub fn new(sandbox: Arc<S>) -> Self {
        Self {
            sandbox,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            state: PreviewState::Idle,
            last_tree: None,
            server: None,
        }
    }

    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn url(&self) -> Option<&str> {
        match &self.state {
            PreviewState::Ready { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Mounts `tree`, installs dependencies and starts the dev server.
    ///
    /// Resolves once the server reports ready and returns its URL.
    pub async fn start(&mut self, tree: &FileTree) -> Result<String, PreviewError> {
        self.last_tree = Some(tree.clone());
        self.stop();

        match self.run_sequence(tree).await {
            Ok((port, url)) => {
                tracing::info!(%url, "preview ready");
                self.state = PreviewState::Ready {
                    port,
                    url: url.clone(),
                };
                Ok(url)
            }
            Err(error) => {
                tracing::warn!(%error, "preview failed");
                self.stop();
                self.state = PreviewState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    /// Re-runs the full sequence for the most recently started tree.
    pub async fn retry(&mut self) -> Result<String, PreviewError> {
        let Some(tree) = self.last_tree.clone() else {
            return Err(PreviewError::NotStarted);
        };
        self.start(&tree).await
    }

    /// Stops the running dev server, if any.
    pub fn stop(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop();
        }
        if matches!(self.state, PreviewState::Ready { .. }) {
            self.state = PreviewState::Idle;
        }
    }

    async fn run_sequence(&mut self, tree: &FileTree) -> Result<(u16, String), PreviewError> {
        if !tree.find("package.json").is_some_and(|node| node.is_file()) {
            return Err(PreviewError::MissingManifest);
        }

        self.state = PreviewState::Mounting;
        self.sandbox.mount(&MountTree::from_file_tree(tree)).await?;

        self.state = PreviewState::Installing;
        let install = SandboxCommand::npm_install();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (code, ()) = tokio::join!(self.sandbox.run(&install, tx), log_events(rx));
        let code = code?;
        if code != Some(0) {
            return Err(PreviewError::InstallFailed { code });
        }

        self.state = PreviewState::Starting;
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let server = self
            .sandbox
            .spawn_server(&SandboxCommand::npm_run_dev(), tx)
            .await?;
        self.server = Some(server);

        let ready = tokio::time::timeout(self.startup_timeout, async {
            while let Some(event) = rx.recv().await {
                match event {
                    SandboxEvent::ServerReady { port, url } => return Ok((port, url)),
                    SandboxEvent::Exit(code) => return Err(PreviewError::DevServerExited { code }),
                    SandboxEvent::Output(line) => tracing::debug!(target: "preview", "{line}"),
                }
            }
            Err(PreviewError::DevServerExited { code: None })
        })
        .await;

        match ready {
            Ok(Ok(ready)) => {
                tokio::spawn(log_events(rx));
                Ok(ready)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(PreviewError::StartupTimeout {
                seconds: self.startup_timeout.as_secs(),
            }),
        }
    }
}

impl<S: Sandbox> Drop for PreviewRunner<S> {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop();
        }
    }
}

async fn log_events(mut rx: mpsc::Receiver<SandboxEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SandboxEvent::Output(line) => tracing::debug!(target: "preview", "{line}"),
            SandboxEvent::Exit(code) => tracing::debug!(target: "preview", ?code, "process exited"),
            SandboxEvent::ServerReady { url, .. } => {
                tracing::debug!(target: "preview", %url, "server ready")
            }
        }
    }
}
