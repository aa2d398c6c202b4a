/// Lifecycle event reported by a sandbox while a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    /// A server started listening and is reachable at `url`.
    ServerReady { port: u16, url: String },
    /// One line of stdout or stderr.
    Output(String),
    /// The process exited. `None` when it was killed by a signal.
    Exit(Option<i32>),
}
