mod support;

use build_agent::session::{BuildSession, Phase};
use build_provider::ChatMessage;

use support::{file_action, react_selection, HostSpy, ARTIFACT_OPEN};

#[test]
fn stale_run_callbacks_are_ignored_while_different_run_is_active() {
    let stale_run = 10;

    let mut session = BuildSession::new();
    let mut host = HostSpy::default();
    session.start_session("active prompt", &mut host).expect("start");
    session.on_template_selected(1, Ok(react_selection()), &mut host);
    let active_run = host.last_id();

    session.on_stream_started(active_run);
    session.on_stream_chunk(
        active_run,
        &format!("{ARTIFACT_OPEN}{}", file_action("live.ts", "live")),
        &mut host,
    );

    let snapshot_phase = session.phase().clone();
    let snapshot_transcript = session.transcript().to_vec();
    let snapshot_tree = session.tree().clone();

    session.on_stream_started(stale_run);
    session.on_stream_chunk(stale_run, &file_action("stale.ts", "stale"), &mut host);
    session.on_stream_finished(stale_run, &mut host);
    session.on_stream_failed(stale_run, "stale error", &mut host);
    session.on_stream_cancelled(stale_run, &mut host);

    assert_eq!(session.phase(), &snapshot_phase);
    assert_eq!(session.transcript(), snapshot_transcript.as_slice());
    assert_eq!(session.tree(), &snapshot_tree);

    session.on_stream_chunk(active_run, "</boltArtifact>", &mut host);
    session.on_stream_finished(active_run, &mut host);
    assert_eq!(session.phase(), &Phase::Idle);
    assert_eq!(session.tree().file_content("live.ts"), Some("live"));
    assert_eq!(session.tree().file_content("stale.ts"), None);
    assert_eq!(
        session.transcript().last(),
        Some(&ChatMessage::assistant(format!(
            "{ARTIFACT_OPEN}{}</boltArtifact>",
            file_action("live.ts", "live")
        )))
    );
}
