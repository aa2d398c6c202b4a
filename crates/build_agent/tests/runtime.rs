use std::sync::{Arc, Mutex};
use std::time::Duration;

use build_agent::runtime::SessionRuntime;
use build_agent::session::{Phase, SessionError, SessionNotice};
use build_provider::{ChatMessage, Role, TemplateSelection};
use build_provider_mock::{MockProvider, RunScript};

const SETTLE: Duration = Duration::from_secs(5);

const ARTIFACT: &str = concat!(
    r#"<boltArtifact id="landing" title="Landing">"#,
    r#"<boltAction type="file" filePath="index.html"><h1>Hi</h1></boltAction>"#,
    r#"<boltAction type="shell">npm run dev</boltAction>"#,
    "</boltArtifact>",
);

fn selection() -> TemplateSelection {
    TemplateSelection {
        prompts: vec!["seed".to_string()],
        ui_prompts: vec![concat!(
            r#"<boltArtifact id="base" title="Base">"#,
            r#"<boltAction type="file" filePath="package.json">{}</boltAction>"#,
            "</boltArtifact>",
        )
        .to_string()],
    }
}

#[test]
fn mock_provider_run_builds_the_tree_end_to_end() {
    let provider = Arc::new(MockProvider::new(vec![ARTIFACT.to_string()]).with_selection(selection()));
    let notices = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    let runtime = SessionRuntime::new(provider.clone())
        .with_observer(move |notice| sink.lock().expect("notices lock").push(notice.clone()));

    runtime.start_session("landing page").expect("start");
    assert_eq!(runtime.wait_until_settled(SETTLE), Phase::Idle);

    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.tree.file_content("package.json"), Some("{}"));
    assert_eq!(snapshot.tree.file_content("index.html"), Some("<h1>Hi</h1>"));
    assert_eq!(snapshot.steps.len(), 3);
    assert!(snapshot.steps.iter().all(|step| step.is_completed()));

    let transcript = runtime.transcript();
    assert_eq!(
        transcript,
        vec![
            ChatMessage::user("seed"),
            ChatMessage::user("landing page"),
            ChatMessage::assistant(ARTIFACT),
        ]
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages, transcript[..2].to_vec());

    let phases: Vec<Phase> = notices
        .lock()
        .expect("notices lock")
        .iter()
        .filter_map(|notice| match notice {
            SessionNotice::PhaseChanged(phase) => Some(phase.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(phases.first(), Some(&Phase::TemplateRequested { request_id: 1 }));
    assert_eq!(phases.get(1), Some(&Phase::Streaming { run_id: 2 }));
    assert_eq!(phases.last(), Some(&Phase::Idle));
}

#[test]
fn failed_run_rolls_back_and_the_next_turn_succeeds() {
    let provider = Arc::new(
        MockProvider::new(vec![ARTIFACT.to_string()])
            .with_selection(selection())
            .with_run_scripts(vec![
                RunScript::chunks([
                    r#"<boltArtifact id="x" title="X">"#,
                    r#"<boltAction type="file" filePath="broken.ts">x</boltAction>"#,
                ])
                .failing_with("upstream overloaded"),
            ]),
    );
    let runtime = SessionRuntime::new(provider);

    runtime.start_session("landing page").expect("start");
    assert_eq!(
        runtime.wait_until_settled(SETTLE),
        Phase::Error("upstream overloaded".to_string())
    );

    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.tree.file_count(), 1);
    assert_eq!(snapshot.tree.file_content("broken.ts"), None);
    assert!(runtime
        .transcript()
        .iter()
        .all(|message| message.role == Role::User));

    runtime.continue_session("try again").expect("continue after error");
    assert_eq!(runtime.wait_until_settled(SETTLE), Phase::Idle);
    assert_eq!(
        runtime.snapshot().tree.file_content("index.html"),
        Some("<h1>Hi</h1>")
    );
}

#[test]
fn rejected_classification_ends_in_error_without_streaming() {
    let provider = Arc::new(MockProvider::new(Vec::new()).with_classifier_answer("vue"));
    let runtime = SessionRuntime::new(provider.clone());

    runtime.start_session("a vue app").expect("start");
    let Phase::Error(message) = runtime.wait_until_settled(SETTLE) else {
        panic!("expected rejection");
    };

    assert!(message.starts_with("access denied"));
    assert!(provider.requests().is_empty());
}

#[test]
fn continue_while_streaming_is_rejected() {
    let provider = Arc::new(
        MockProvider::new(vec![ARTIFACT.to_string()])
            .with_delays(Duration::from_millis(50), Duration::from_millis(5)),
    );
    let runtime = SessionRuntime::new(provider);

    runtime.start_session("landing page").expect("start");
    assert_eq!(
        runtime.continue_session("more"),
        Err(SessionError::Busy)
    );

    assert_eq!(runtime.wait_until_settled(SETTLE), Phase::Idle);
    assert!(runtime.session_id().is_some());
}

#[test]
fn cancel_stops_the_stream_and_ignores_late_events() {
    let provider = Arc::new(
        MockProvider::new(vec![ARTIFACT.to_string()])
            .with_delays(Duration::from_millis(200), Duration::from_millis(5)),
    );
    let runtime = SessionRuntime::new(provider);

    runtime.start_session("landing page").expect("start");
    while !matches!(runtime.phase(), Phase::Streaming { .. }) {
        runtime.wait_and_flush(Duration::from_millis(50));
    }

    assert!(runtime.cancel());
    assert_eq!(runtime.phase(), Phase::Idle);

    // Drain whatever the worker still emits.
    runtime.wait_and_flush(Duration::from_millis(400));
    runtime.flush_pending_events();

    assert_eq!(runtime.phase(), Phase::Idle);
    assert!(runtime.snapshot().tree.is_empty());
    assert_eq!(runtime.transcript().len(), 1);
}
