use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use crate::error::SandboxError;
use crate::events::SandboxEvent;
use crate::mount::{MountEntry, MountTree};
use crate::sandbox::{Sandbox, SandboxCommand, ServerHandle};

/// Sandbox that mounts into a directory on disk and runs real processes.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(SandboxError::UnsafePath(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }

    fn spawn(&self, command: &SandboxCommand) -> Result<Child, SandboxError> {
        Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                command: command.to_string(),
                source,
            })
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError> {
        tokio::fs::create_dir_all(&self.root).await?;

        for (path, entry) in tree.walk() {
            let target = self.resolve(&path)?;
            match entry {
                MountEntry::Directory(_) => tokio::fs::create_dir_all(&target).await?,
                MountEntry::File { contents } => {
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&target, contents).await?;
                }
            }
        }

        tracing::debug!(root = %self.root.display(), "mounted project");
        Ok(())
    }

    async fn run(
        &self,
        command: &SandboxCommand,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<Option<i32>, SandboxError> {
        tracing::info!(%command, "running");
        let mut child = self.spawn(command)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            forward_lines(stdout, events.clone(), None),
            forward_lines(stderr, events.clone(), None),
        );

        let code = child.wait().await?.code();
        let _ = events.send(SandboxEvent::Exit(code)).await;
        Ok(code)
    }

    async fn spawn_server(
        &self,
        command: &SandboxCommand,
        events: mpsc::Sender<SandboxEvent>,
    ) -> Result<Box<dyn ServerHandle>, SandboxError> {
        tracing::info!(%command, "starting server");
        let mut child = self.spawn(command)?;
        let announced = Arc::new(AtomicBool::new(false));

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let readers = tokio::spawn({
            let events = events.clone();
            let announced = Arc::clone(&announced);
            async move {
                tokio::join!(
                    forward_lines(stdout, events.clone(), Some(Arc::clone(&announced))),
                    forward_lines(stderr, events, Some(announced)),
                );
            }
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.ok(),
                _ = stop_rx => {
                    let _ = child.kill().await;
                    child.wait().await.ok()
                }
            };
            let _ = readers.await;
            let _ = events
                .send(SandboxEvent::Exit(status.and_then(|status| status.code())))
                .await;
        });

        Ok(Box::new(LocalServerHandle {
            stop: Mutex::new(Some(stop_tx)),
        }))
    }
}

struct LocalServerHandle {
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl ServerHandle for LocalServerHandle {
    fn stop(&self) {
        let sender = match self.stop.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

async fn forward_lines<R>(
    reader: Option<R>,
    events: mpsc::Sender<SandboxEvent>,
    announced: Option<Arc<AtomicBool>>,
) where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let ready = announced
            .as_ref()
            .and_then(|flag| detect_server_url(&line).map(|found| (flag, found)));
        if events.send(SandboxEvent::Output(line)).await.is_err() {
            return;
        }

        if let Some((flag, (port, url))) = ready {
            if !flag.swap(true, Ordering::AcqRel) {
                let _ = events.send(SandboxEvent::ServerReady { port, url }).await;
            }
        }
    }
}

/// Finds the first `http(s)://host:port` URL in a line of server output.
///
/// ANSI color sequences are ignored.
pub fn detect_server_url(line: &str) -> Option<(u16, String)> {
    let plain = ansi_regex().replace_all(line, "");
    let captures = url_regex().captures(&plain)?;
    let port = captures.get(1)?.as_str().parse::<u16>().ok()?;
    let url = captures.get(0)?.as_str().to_string();
    Some((port, url))
}

fn ansi_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi regex must compile"))
}

fn url_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"https?://(?:\[[0-9A-Fa-f:]+\]|[A-Za-z0-9.-]+):(\d{2,5})")
            .expect("url regex must compile")
    })
}
