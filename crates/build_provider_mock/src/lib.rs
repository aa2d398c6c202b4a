//! Deterministic scripted implementation of the shared `build_provider`
//! contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use build_provider::{
    BuildProvider, CancelSignal, ProviderProfile, RunEvent, RunRequest, TemplateError,
    TemplateKind, TemplateSelection,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Scripted response for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunScript {
    pub chunks: Vec<String>,
    /// When set, the run fails with this message after all chunks are sent.
    pub failure: Option<String>,
}

impl RunScript {
    #[must_use]
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    #[must_use]
    pub fn failing_with(mut self, error: impl Into<String>) -> Self {
        self.failure = Some(error.into());
        self
    }
}

/// Scripted provider used by `build_agent` tests and offline runs.
///
/// Runs consume queued [`RunScript`]s in order; once the queue is empty every
/// run replays the default script.
#[derive(Debug)]
pub struct MockProvider {
    classifier_answer: String,
    selection: TemplateSelection,
    default_script: RunScript,
    queued: Mutex<VecDeque<RunScript>>,
    requests: Mutex<Vec<RunRequest>>,
    run_delay: Duration,
    token_delay: Duration,
}

impl MockProvider {
    /// Creates a provider that answers `react`, seeds nothing, and streams
    /// `chunks` without delays.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            classifier_answer: TemplateKind::React.as_str().to_string(),
            selection: TemplateSelection::default(),
            default_script: RunScript {
                chunks,
                failure: None,
            },
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            run_delay: Duration::ZERO,
            token_delay: Duration::ZERO,
        }
    }

    /// Overrides the raw classifier answer. Anything other than an exact
    /// template name is rejected.
    #[must_use]
    pub fn with_classifier_answer(mut self, answer: impl Into<String>) -> Self {
        self.classifier_answer = answer.into();
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: TemplateSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Queues scripts consumed by subsequent runs, in order.
    #[must_use]
    pub fn with_run_scripts(self, scripts: Vec<RunScript>) -> Self {
        lock_unpoisoned(&self.queued).extend(scripts);
        self
    }

    #[must_use]
    pub fn with_delays(mut self, run_delay: Duration, token_delay: Duration) -> Self {
        self.run_delay = run_delay;
        self.token_delay = token_delay;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RunRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn next_script(&self) -> RunScript {
        lock_unpoisoned(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone())
    }

    fn pause(duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    const RUN_DELAY_MS: u64 = 200;
    const TOKEN_DELAY_MS: u64 = 15;
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(demo_response())
            .with_selection(TemplateSelection {
                prompts: vec![
                    "Use React with Vite and TypeScript. Keep every file self-contained."
                        .to_string(),
                    format!(
                        "Here is the project as it exists so far:\n\n{}",
                        DEMO_BASE_TEMPLATE
                    ),
                ],
                ui_prompts: vec![DEMO_BASE_TEMPLATE.to_string()],
            })
            .with_delays(
                Duration::from_millis(Self::RUN_DELAY_MS),
                Duration::from_millis(Self::TOKEN_DELAY_MS),
            )
    }
}

impl BuildProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            target: "scripted".to_string(),
        }
    }

    fn select_template(
        &self,
        _prompt: &str,
        cancel: CancelSignal,
    ) -> Result<TemplateSelection, TemplateError> {
        Self::pause(self.run_delay);
        if cancel.load(Ordering::SeqCst) {
            return Err(TemplateError::Cancelled);
        }

        match TemplateKind::from_classifier_output(&self.classifier_answer) {
            Some(_) => Ok(self.selection.clone()),
            None => Err(TemplateError::Rejected {
                answer: Some(self.classifier_answer.clone()),
            }),
        }
    }

    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;
        lock_unpoisoned(&self.requests).push(req);
        let script = self.next_script();

        emit(RunEvent::Started { run_id });
        Self::pause(self.run_delay);

        for chunk in &script.chunks {
            let mut pending_token = String::new();
            for ch in chunk.chars() {
                pending_token.push(ch);

                if matches!(ch, ' ' | '\n') {
                    if cancel.load(Ordering::SeqCst) {
                        emit(RunEvent::Cancelled { run_id });
                        return Ok(());
                    }
                    emit(RunEvent::Chunk {
                        run_id,
                        text: std::mem::take(&mut pending_token),
                    });
                    Self::pause(self.token_delay);
                }
            }

            if !pending_token.is_empty() {
                if cancel.load(Ordering::SeqCst) {
                    emit(RunEvent::Cancelled { run_id });
                    return Ok(());
                }

                emit(RunEvent::Chunk {
                    run_id,
                    text: pending_token,
                });
                Self::pause(self.token_delay);
            }
        }

        if cancel.load(Ordering::SeqCst) {
            emit(RunEvent::Cancelled { run_id });
        } else if let Some(error) = script.failure {
            emit(RunEvent::Failed { run_id, error });
        } else {
            emit(RunEvent::Finished { run_id });
        }

        Ok(())
    }
}

const DEMO_BASE_TEMPLATE: &str = r#"<boltArtifact id="project-import" title="Project Files">
<boltAction type="file" filePath="package.json">
{
  "name": "vite-react-typescript-starter",
  "private": true,
  "version": "0.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "vite build"
  },
  "dependencies": {
    "react": "^18.3.1",
    "react-dom": "^18.3.1"
  },
  "devDependencies": {
    "@vitejs/plugin-react": "^4.3.1",
    "typescript": "^5.5.3",
    "vite": "^5.4.2"
  }
}
</boltAction>
<boltAction type="file" filePath="index.html">
<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>Vite + React + TS</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
</boltAction>
<boltAction type="file" filePath="vite.config.ts">
import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
});
</boltAction>
<boltAction type="file" filePath="src/main.tsx">
import { StrictMode } from 'react';
import { createRoot } from 'react-dom/client';
import App from './App';

createRoot(document.getElementById('root')!).render(
  <StrictMode>
    <App />
  </StrictMode>
);
</boltAction>
</boltArtifact>"#;

fn demo_response() -> Vec<String> {
    [
        "I'll build a small todo list on top of the starter.\n\n",
        "<boltArtifact id=\"todo-app\" title=\"Todo App\">\n",
        "<boltAction type=\"file\" filePath=\"src/App.tsx\">\n",
        "import { useState } from 'react';\n",
        "import TodoList from './components/TodoList';\n",
        "\n",
        "export default function App() {\n",
        "  const [items, setItems] = useState<string[]>([]);\n",
        "  const [draft, setDraft] = useState('');\n",
        "  return (\n",
        "    <main>\n",
        "      <h1>Todos</h1>\n",
        "      <input value={draft} onChange={(e) => setDraft(e.target.value)} />\n",
        "      <button onClick={() => { setItems([...items, draft]); setDraft(''); }}>Add</button>\n",
        "      <TodoList items={items} />\n",
        "    </main>\n",
        "  );\n",
        "}\n",
        "</boltAction>\n",
        "<boltAction type=\"file\" filePath=\"src/components/TodoList.tsx\">\n",
        "```tsx\n",
        "export default function TodoList({ items }: { items: string[] }) {\n",
        "  return <ul>{items.map((item, i) => <li key={i}>{item}</li>)}</ul>;\n",
        "}\n",
        "```\n",
        "</boltAction>\n",
        "<boltAction type=\"shell\">\nnpm install && npm run dev\n</boltAction>\n",
        "</boltArtifact>\n",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use build_provider::ChatMessage;

    use super::*;

    fn collect_events(provider: &MockProvider, cancel: CancelSignal) -> Vec<RunEvent> {
        let mut events = Vec::new();
        provider
            .run(
                RunRequest {
                    run_id: 7,
                    messages: vec![ChatMessage::user("test")],
                },
                cancel,
                &mut |event| events.push(event),
            )
            .expect("mock run should succeed");
        events
    }

    fn chunk_texts(events: &[RunEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Chunk { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn profile_exposes_explicit_mock_provider_identity() {
        let profile = MockProvider::new(Vec::new()).profile();
        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
    }

    #[test]
    fn run_emits_started_chunks_and_finished() {
        let provider = MockProvider::new(vec!["one two".to_string()]);
        let cancel = Arc::new(AtomicBool::new(false));

        let events = collect_events(&provider, cancel);

        assert!(matches!(
            events.first(),
            Some(RunEvent::Started { run_id: 7 })
        ));
        assert!(matches!(
            events.last(),
            Some(RunEvent::Finished { run_id: 7 })
        ));
        assert_eq!(chunk_texts(&events), vec!["one ", "two"]);
    }

    #[test]
    fn run_emits_cancelled_when_cancel_is_set() {
        let provider = MockProvider::new(vec!["ignored".to_string()]);
        let cancel = Arc::new(AtomicBool::new(true));

        let events = collect_events(&provider, cancel);

        assert!(matches!(
            events.first(),
            Some(RunEvent::Started { run_id: 7 })
        ));
        assert!(matches!(
            events.last(),
            Some(RunEvent::Cancelled { run_id: 7 })
        ));
        assert!(chunk_texts(&events).is_empty());
    }

    #[test]
    fn queued_scripts_run_before_the_default() {
        let provider = MockProvider::new(vec!["default".to_string()]).with_run_scripts(vec![
            RunScript::chunks(["a ", "b"]).failing_with("upstream closed"),
        ]);

        let first = collect_events(&provider, CancelSignal::default());
        assert_eq!(chunk_texts(&first), vec!["a ", "b"]);
        assert_eq!(
            first.last(),
            Some(&RunEvent::Failed {
                run_id: 7,
                error: "upstream closed".to_string(),
            })
        );

        let second = collect_events(&provider, CancelSignal::default());
        assert_eq!(chunk_texts(&second), vec!["default"]);
        assert_eq!(provider.requests().len(), 2);
    }

    #[test]
    fn unsupported_classifier_answer_is_rejected() {
        let provider = MockProvider::new(Vec::new()).with_classifier_answer("React");
        let error = provider
            .select_template("build a blog", CancelSignal::default())
            .expect_err("capitalized answer is not a template");

        assert_eq!(
            error,
            TemplateError::Rejected {
                answer: Some("React".to_string()),
            }
        );
    }

    #[test]
    fn default_provider_seeds_a_base_template() {
        let selection = MockProvider::default()
            .with_delays(Duration::ZERO, Duration::ZERO)
            .select_template("todo app", CancelSignal::default())
            .expect("default answer is a supported template");

        assert_eq!(selection.ui_prompts.len(), 1);
        assert!(selection.ui_prompts[0].contains("package.json"));
        assert_eq!(selection.prompts.len(), 2);
    }
}
