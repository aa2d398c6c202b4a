use std::collections::HashSet;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

use build_agent::config::EnvConfig;
use build_agent::logging::init_logging;
use build_agent::providers;
use build_agent::runtime::SessionRuntime;
use build_agent::session::{Phase, SessionNotice, SessionSnapshot};
use preview_sandbox::{LocalSandbox, MountTree, PreviewRunner, Sandbox};
use site_builder::{language_for_path, StepId};

const TURN_TIMEOUT: Duration = Duration::from_secs(600);

fn main() -> io::Result<()> {
    if let Err(error) = init_logging() {
        eprintln!("{error}");
    }

    let config = EnvConfig::from_env();
    let provider = providers::provider_from_config(&config).map_err(io::Error::other)?;
    let profile = provider.profile();
    tracing::info!(provider = %profile.provider_id, target = %profile.target, "provider ready");

    let mut printer = ProgressPrinter::default();
    let runtime = SessionRuntime::new(provider).with_observer(move |notice| printer.on_notice(notice));

    let executor = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let sandbox = Arc::new(LocalSandbox::new(config.output_dir.clone()));
    let mut preview = config.preview.then(|| {
        PreviewRunner::new(Arc::clone(&sandbox)).with_startup_timeout(config.preview_timeout)
    });

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let mut prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        println!("Describe the site to build:");
        prompt = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };
    }

    match runtime.start_session(&prompt) {
        Ok(()) => finish_turn(&runtime, &executor, &sandbox, preview.as_mut())?,
        Err(error) => eprintln!("error: {error}"),
    }

    println!("Follow-up instructions, one per line (/quit to exit):");
    for line in lines {
        let line = line?;
        let text = line.trim();
        match text {
            "" => continue,
            "/quit" => break,
            _ => {}
        }

        match runtime.continue_session(text) {
            Ok(()) => finish_turn(&runtime, &executor, &sandbox, preview.as_mut())?,
            Err(error) => eprintln!("error: {error}"),
        }
    }

    if let Some(preview) = preview.as_mut() {
        preview.stop();
    }
    Ok(())
}

fn finish_turn(
    runtime: &SessionRuntime,
    executor: &tokio::runtime::Runtime,
    sandbox: &Arc<LocalSandbox>,
    preview: Option<&mut PreviewRunner<LocalSandbox>>,
) -> io::Result<()> {
    match runtime.wait_until_settled(TURN_TIMEOUT) {
        Phase::Idle => {}
        Phase::Error(_) => return Ok(()),
        Phase::TemplateRequested { .. } | Phase::Streaming { .. } => {
            runtime.cancel();
            eprintln!("error: build did not finish within {}s", TURN_TIMEOUT.as_secs());
            return Ok(());
        }
    }

    let tree = runtime.snapshot().tree;
    if tree.is_empty() {
        return Ok(());
    }

    match preview {
        Some(preview) => match executor.block_on(preview.start(&tree)) {
            Ok(url) => println!("Preview running at {url}"),
            Err(error) => eprintln!("preview failed: {error}"),
        },
        None => {
            executor
                .block_on(sandbox.mount(&MountTree::from_file_tree(&tree)))
                .map_err(io::Error::other)?;
            println!(
                "Wrote {} files to {}",
                tree.file_count(),
                sandbox.root().display()
            );
        }
    }

    Ok(())
}

/// Prints completed steps and the file being generated as they appear.
#[derive(Default)]
struct ProgressPrinter {
    printed: HashSet<StepId>,
    writing: Option<String>,
}

impl ProgressPrinter {
    fn on_notice(&mut self, notice: &SessionNotice) {
        match notice {
            SessionNotice::StepsPublished(snapshot) => self.on_snapshot(snapshot),
            SessionNotice::Failed(message) => eprintln!("error: {message}"),
            SessionNotice::PhaseChanged(phase) => tracing::debug!(?phase, "phase changed"),
            SessionNotice::TranscriptAppended(message) => {
                tracing::debug!(role = message.role.as_str(), "transcript appended")
            }
        }
    }

    fn on_snapshot(&mut self, snapshot: &SessionSnapshot) {
        // Rolled-back steps may come back under the same id.
        let completed: HashSet<StepId> = snapshot
            .steps
            .iter()
            .filter(|step| step.is_completed())
            .map(|step| step.id)
            .collect();
        self.printed.retain(|id| completed.contains(id));

        for step in snapshot.steps.iter().filter(|step| step.is_completed()) {
            if self.printed.insert(step.id) {
                println!("  [done] {}", step.title);
            }
        }

        let writing = snapshot.preview.as_ref().map(|preview| preview.path.clone());
        if writing != self.writing {
            if let Some(path) = &writing {
                println!("  [....] writing {path} ({})", language_for_path(path));
            }
            self.writing = writing;
        }
    }
}
