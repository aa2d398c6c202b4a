use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a sandbox implementation.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to mount path outside the sandbox root: {0}")]
    UnsafePath(PathBuf),
}

/// Distinct, user-visible reasons a preview failed to come up.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("project has no package.json at its root")]
    MissingManifest,
    #[error("dependency install failed ({})", describe_exit(.code))]
    InstallFailed { code: Option<i32> },
    #[error("dev server did not report ready within {seconds}s")]
    StartupTimeout { seconds: u64 },
    #[error("dev server exited before becoming ready ({})", describe_exit(.code))]
    DevServerExited { code: Option<i32> },
    #[error("nothing to retry: no preview has been started")]
    NotStarted,
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preview_failure_has_a_distinct_message() {
        let messages = [
            PreviewError::MissingManifest.to_string(),
            PreviewError::InstallFailed { code: Some(1) }.to_string(),
            PreviewError::StartupTimeout { seconds: 30 }.to_string(),
            PreviewError::DevServerExited { code: None }.to_string(),
            PreviewError::NotStarted.to_string(),
        ];

        for (index, message) in messages.iter().enumerate() {
            assert!(messages[index + 1..].iter().all(|other| other != message));
        }
        assert_eq!(messages[1], "dependency install failed (exit code 1)");
        assert_eq!(
            messages[3],
            "dev server exited before becoming ready (terminated by signal)"
        );
    }
}
