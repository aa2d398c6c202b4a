//! Build session state machine.
//!
//! A [`BuildSession`] owns the transcript, the published steps and the
//! projected file tree for one top-level prompt. It never talks to a provider
//! directly: requests go out through a [`SessionHost`] and results come back
//! through the `on_*` handlers, tagged with the id the host handed out.
//! Handlers for ids that are not the active request are ignored.

use build_provider::{ChatMessage, RunId, TemplateError, TemplateSelection};
use site_builder::{
    apply_pending_steps, mark_completed, parse_actions, pending_steps, streaming_file_preview,
    FilePreview, FileTree, Step, StepId, StepStatus,
};
use thiserror::Error;
use uuid::Uuid;

/// Identifier for a template request. Drawn from the same counter as run ids.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TemplateRequested { request_id: RequestId },
    Streaming { run_id: RunId },
    Error(String),
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::TemplateRequested { .. } | Self::Streaming { .. })
    }
}

/// Consistent view of the session's steps and tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub steps: Vec<Step>,
    pub tree: FileTree,
    /// File currently being generated, while a stream is inside one.
    pub preview: Option<FilePreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    PhaseChanged(Phase),
    StepsPublished(SessionSnapshot),
    TranscriptAppended(ChatMessage),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a build is already in progress")]
    Busy,
    #[error("no session has been started")]
    NoSession,
    #[error("failed to start request: {0}")]
    Host(String),
}

/// Side effects the session asks its owner to perform.
pub trait SessionHost {
    /// Starts template selection for `prompt` and returns the request id.
    fn request_template(&mut self, prompt: String) -> Result<RequestId, String>;
    /// Opens one chat stream over `messages` and returns its run id.
    fn start_stream(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String>;
    /// Cancels an outstanding template request or run. Unknown ids are ignored.
    fn cancel(&mut self, id: u64);
    fn notify(&mut self, notice: SessionNotice);
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnCheckpoint {
    base_id: StepId,
    steps: Vec<Step>,
    tree: FileTree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSession {
    session_id: Option<String>,
    phase: Phase,
    prompt: String,
    transcript: Vec<ChatMessage>,
    steps: Vec<Step>,
    tree: FileTree,
    buffer: String,
    next_step_id: StepId,
    turn: Option<TurnCheckpoint>,
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSession {
    pub fn new() -> Self {
        Self {
            session_id: None,
            phase: Phase::Idle,
            prompt: String::new(),
            transcript: Vec::new(),
            steps: Vec::new(),
            tree: FileTree::new(),
            buffer: String::new(),
            next_step_id: 0,
            turn: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    /// Raw text received so far in the active turn.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            steps: self.steps.clone(),
            tree: self.tree.clone(),
            preview: streaming_file_preview(&self.buffer),
        }
    }

    /// Starts a fresh session for `prompt`, superseding any in-flight work.
    pub fn start_session(
        &mut self,
        prompt: &str,
        host: &mut dyn SessionHost,
    ) -> Result<(), SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        match self.phase {
            Phase::TemplateRequested { request_id: id } | Phase::Streaming { run_id: id } => {
                tracing::info!(superseded = id, "new prompt supersedes in-flight request");
                host.cancel(id);
            }
            Phase::Idle | Phase::Error(_) => {}
        }

        let session_id = Uuid::new_v4().to_string();
        tracing::info!(%session_id, "starting build session");
        *self = Self {
            session_id: Some(session_id),
            prompt: prompt.to_string(),
            ..Self::new()
        };
        host.notify(SessionNotice::StepsPublished(self.snapshot()));

        match host.request_template(prompt.to_string()) {
            Ok(request_id) => {
                self.set_phase(Phase::TemplateRequested { request_id }, host);
                Ok(())
            }
            Err(error) => {
                self.fail(error.clone(), host);
                Err(SessionError::Host(error))
            }
        }
    }

    pub fn on_template_selected(
        &mut self,
        request_id: RequestId,
        result: Result<TemplateSelection, TemplateError>,
        host: &mut dyn SessionHost,
    ) {
        if self.phase != (Phase::TemplateRequested { request_id }) {
            tracing::warn!(request_id, "ignoring stale template result");
            return;
        }

        let selection = match result {
            Ok(selection) => selection,
            Err(error) => {
                tracing::warn!(%error, "template selection failed");
                self.fail(error.to_string(), host);
                return;
            }
        };

        if let Some(document) = selection.ui_prompts.first() {
            let actions = parse_actions(document);
            let count = actions.len() as StepId;
            let mut steps = pending_steps(self.next_step_id, actions);
            let projection = apply_pending_steps(std::mem::take(&mut self.tree), &steps);
            mark_completed(&mut steps, &projection.completed);
            self.steps = steps;
            self.tree = projection.tree;
            self.next_step_id += count;
            tracing::debug!(steps = self.steps.len(), "seeded template steps");
            host.notify(SessionNotice::StepsPublished(self.snapshot()));
        }

        let prompt = std::mem::take(&mut self.prompt);
        for seed in selection.prompts {
            self.append_message(ChatMessage::user(seed), host);
        }
        self.append_message(ChatMessage::user(prompt), host);

        self.begin_turn(host);
    }

    /// Sends a follow-up message in the current session.
    pub fn continue_session(
        &mut self,
        text: &str,
        host: &mut dyn SessionHost,
    ) -> Result<(), SessionError> {
        if self.phase.is_busy() {
            return Err(SessionError::Busy);
        }
        if self.session_id.is_none() {
            return Err(SessionError::NoSession);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        self.append_message(ChatMessage::user(text), host);
        if self.begin_turn(host) {
            Ok(())
        } else {
            Err(SessionError::Host(self.error_message()))
        }
    }

    pub fn on_stream_started(&mut self, run_id: RunId) {
        if self.is_active_run(run_id) {
            tracing::debug!(run_id, "stream started");
        }
    }

    pub fn on_stream_chunk(&mut self, run_id: RunId, delta: &str, host: &mut dyn SessionHost) {
        if !self.is_active_run(run_id) {
            tracing::debug!(run_id, "ignoring stale chunk");
            return;
        }

        self.buffer.push_str(delta);
        self.project_turn(host);
    }

    pub fn on_stream_finished(&mut self, run_id: RunId, host: &mut dyn SessionHost) {
        if !self.is_active_run(run_id) {
            tracing::warn!(run_id, "ignoring stale finish");
            return;
        }

        self.project_turn(host);
        if let Some(turn) = self.turn.take() {
            let turn_steps = self.steps.len() - turn.steps.len();
            self.next_step_id = turn.base_id + turn_steps as StepId;
        }

        let response = std::mem::take(&mut self.buffer);
        self.append_message(ChatMessage::assistant(response), host);
        tracing::info!(run_id, steps = self.steps.len(), "turn completed");
        self.set_phase(Phase::Idle, host);
    }

    /// Aborts the active turn: its partial steps are discarded and the tree
    /// returns to the turn-start checkpoint. The user message stays.
    pub fn on_stream_failed(&mut self, run_id: RunId, error: &str, host: &mut dyn SessionHost) {
        if !self.is_active_run(run_id) {
            tracing::warn!(run_id, "ignoring stale failure");
            return;
        }

        tracing::warn!(run_id, error, "stream failed; rolling back turn");
        self.rollback_turn(host);
        self.fail(error.to_string(), host);
    }

    /// Provider-side cancellation of the active run.
    pub fn on_stream_cancelled(&mut self, run_id: RunId, host: &mut dyn SessionHost) {
        if !self.is_active_run(run_id) {
            tracing::debug!(run_id, "ignoring stale cancellation");
            return;
        }

        self.rollback_turn(host);
        self.set_phase(Phase::Idle, host);
    }

    /// Cancels the in-flight template request or stream.
    ///
    /// Returns `false` when nothing was in flight.
    pub fn cancel(&mut self, host: &mut dyn SessionHost) -> bool {
        match self.phase {
            Phase::Streaming { run_id } => {
                tracing::info!(run_id, "cancelling stream");
                host.cancel(run_id);
                self.rollback_turn(host);
            }
            Phase::TemplateRequested { request_id } => {
                tracing::info!(request_id, "cancelling template request");
                host.cancel(request_id);
            }
            Phase::Idle | Phase::Error(_) => return false,
        }

        self.set_phase(Phase::Idle, host);
        true
    }

    fn begin_turn(&mut self, host: &mut dyn SessionHost) -> bool {
        self.buffer.clear();
        self.turn = Some(TurnCheckpoint {
            base_id: self.next_step_id,
            steps: self.steps.clone(),
            tree: self.tree.clone(),
        });

        match host.start_stream(self.transcript.clone()) {
            Ok(run_id) => {
                tracing::info!(run_id, messages = self.transcript.len(), "stream requested");
                self.set_phase(Phase::Streaming { run_id }, host);
                true
            }
            Err(error) => {
                self.turn = None;
                self.fail(error, host);
                false
            }
        }
    }

    /// Re-parses the whole buffer and folds the turn's new steps.
    fn project_turn(&mut self, host: &mut dyn SessionHost) {
        let Some(turn) = self.turn.as_ref() else {
            return;
        };

        let mut steps = turn.steps.clone();
        let turn_start = steps.len();
        steps.extend(pending_steps(turn.base_id, parse_actions(&self.buffer)));

        // Closed actions never change, so a step folded on an earlier chunk
        // keeps its completed status instead of being applied again.
        for step in &mut steps[turn_start..] {
            let folded = self
                .steps
                .iter()
                .any(|previous| previous.id == step.id && previous.is_completed());
            if folded {
                step.status = StepStatus::Completed;
            }
        }

        let projection = apply_pending_steps(std::mem::take(&mut self.tree), &steps);
        mark_completed(&mut steps, &projection.completed);
        self.steps = steps;
        self.tree = projection.tree;

        host.notify(SessionNotice::StepsPublished(self.snapshot()));
    }

    fn rollback_turn(&mut self, host: &mut dyn SessionHost) {
        self.buffer.clear();
        if let Some(turn) = self.turn.take() {
            self.steps = turn.steps;
            self.tree = turn.tree;
            host.notify(SessionNotice::StepsPublished(self.snapshot()));
        }
    }

    fn append_message(&mut self, message: ChatMessage, host: &mut dyn SessionHost) {
        self.transcript.push(message.clone());
        host.notify(SessionNotice::TranscriptAppended(message));
    }

    fn fail(&mut self, message: String, host: &mut dyn SessionHost) {
        host.notify(SessionNotice::Failed(message.clone()));
        self.set_phase(Phase::Error(message), host);
    }

    fn set_phase(&mut self, phase: Phase, host: &mut dyn SessionHost) {
        if self.phase == phase {
            return;
        }
        self.phase = phase.clone();
        host.notify(SessionNotice::PhaseChanged(phase));
    }

    fn error_message(&self) -> String {
        match &self.phase {
            Phase::Error(message) => message.clone(),
            _ => String::new(),
        }
    }

    fn is_active_run(&self, run_id: RunId) -> bool {
        matches!(self.phase, Phase::Streaming { run_id: active } if active == run_id)
    }
}
