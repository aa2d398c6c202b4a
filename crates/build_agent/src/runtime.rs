use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use build_provider::{
    BuildProvider, CancelSignal, ChatMessage, ProviderProfile, RunEvent, RunId, RunRequest,
    TemplateError, TemplateSelection,
};

use crate::session::{
    BuildSession, Phase, RequestId, SessionError, SessionHost, SessionNotice, SessionSnapshot,
};

/// Worker result queued for the owner thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Template {
        request_id: RequestId,
        result: Result<TemplateSelection, TemplateError>,
    },
    Run(RunEvent),
}

type Observer = Box<dyn FnMut(&SessionNotice) + Send>;

#[derive(Default)]
struct EventQueue {
    events: Mutex<VecDeque<RuntimeEvent>>,
    ready: Condvar,
}

impl EventQueue {
    fn push(&self, event: RuntimeEvent) {
        lock_unpoisoned(&self.events).push_back(event);
        self.ready.notify_all();
    }

    fn pop(&self) -> Option<RuntimeEvent> {
        lock_unpoisoned(&self.events).pop_front()
    }

    fn wait(&self, timeout: Duration) {
        let events = lock_unpoisoned(&self.events);
        if !events.is_empty() {
            return;
        }
        let _ = self
            .ready
            .wait_timeout_while(events, timeout, |events| events.is_empty());
    }
}

struct ActiveWork {
    cancel: CancelSignal,
    join_handle: Option<JoinHandle<()>>,
}

/// Runs provider work on worker threads and applies the results to one
/// [`BuildSession`].
///
/// Workers only enqueue events. Session state changes happen on the thread
/// that calls [`flush_pending_events`] or [`wait_and_flush`], so the observer
/// sees notices in a single, consistent order. The observer runs while the
/// session is locked and must not call back into the runtime.
///
/// [`flush_pending_events`]: SessionRuntime::flush_pending_events
/// [`wait_and_flush`]: SessionRuntime::wait_and_flush
pub struct SessionRuntime {
    session: Mutex<BuildSession>,
    provider: Arc<dyn BuildProvider>,
    queue: Arc<EventQueue>,
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, ActiveWork>>,
    observer: Mutex<Option<Observer>>,
}

impl SessionRuntime {
    pub fn new(provider: Arc<dyn BuildProvider>) -> Self {
        Self {
            session: Mutex::new(BuildSession::new()),
            provider,
            queue: Arc::new(EventQueue::default()),
            next_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_observer(self, observer: impl FnMut(&SessionNotice) + Send + 'static) -> Self {
        *lock_unpoisoned(&self.observer) = Some(Box::new(observer));
        self
    }

    pub fn provider_profile(&self) -> ProviderProfile {
        self.provider.profile()
    }

    pub fn start_session(&self, prompt: &str) -> Result<(), SessionError> {
        self.with_session(|session, host| session.start_session(prompt, host))
    }

    pub fn continue_session(&self, text: &str) -> Result<(), SessionError> {
        self.with_session(|session, host| session.continue_session(text, host))
    }

    pub fn cancel(&self) -> bool {
        self.with_session(|session, host| session.cancel(host))
    }

    pub fn phase(&self) -> Phase {
        lock_unpoisoned(&self.session).phase().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock_unpoisoned(&self.session).snapshot()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock_unpoisoned(&self.session).transcript().to_vec()
    }

    pub fn session_id(&self) -> Option<String> {
        lock_unpoisoned(&self.session).session_id().map(str::to_string)
    }

    /// Applies every queued worker event to the session.
    ///
    /// Returns the number of events applied.
    pub fn flush_pending_events(&self) -> usize {
        let mut drained = 0usize;
        while let Some(event) = self.queue.pop() {
            self.apply_event(event);
            drained += 1;
        }
        drained
    }

    /// Blocks up to `timeout` for at least one event, then flushes.
    pub fn wait_and_flush(&self, timeout: Duration) -> usize {
        self.queue.wait(timeout);
        self.flush_pending_events()
    }

    /// Pumps events until the session leaves its busy phases or `timeout`
    /// elapses. Returns the phase at that point.
    pub fn wait_until_settled(&self, timeout: Duration) -> Phase {
        let deadline = Instant::now() + timeout;
        loop {
            self.flush_pending_events();
            let phase = self.phase();
            let now = Instant::now();
            if !phase.is_busy() || now >= deadline {
                return phase;
            }
            self.wait_and_flush(deadline - now);
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut BuildSession, &mut RuntimeHost<'_>) -> R) -> R {
        let mut session = lock_unpoisoned(&self.session);
        let mut host = RuntimeHost { runtime: self };
        f(&mut session, &mut host)
    }

    fn apply_event(&self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::Template { request_id, result } => {
                self.with_session(|session, host| {
                    session.on_template_selected(request_id, result, host)
                });
                self.finish_work(request_id);
            }
            RuntimeEvent::Run(event) => {
                let run_id = event.run_id();
                let terminal = event.is_terminal();
                self.with_session(|session, host| match event {
                    RunEvent::Started { run_id } => session.on_stream_started(run_id),
                    RunEvent::Chunk { run_id, text } => session.on_stream_chunk(run_id, &text, host),
                    RunEvent::Finished { run_id } => session.on_stream_finished(run_id, host),
                    RunEvent::Failed { run_id, error } => {
                        session.on_stream_failed(run_id, &error, host)
                    }
                    RunEvent::Cancelled { run_id } => session.on_stream_cancelled(run_id, host),
                });
                if terminal {
                    self.finish_work(run_id);
                }
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn spawn_template_worker(&self, prompt: String) -> Result<RequestId, String> {
        let request_id = self.next_id();
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        let provider = Arc::clone(&self.provider);
        let queue = Arc::clone(&self.queue);
        let worker_cancel = Arc::clone(&cancel);

        let join_handle = thread::Builder::new()
            .name(format!("build-agent-template-{request_id}"))
            .spawn(move || {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| provider.select_template(&prompt, worker_cancel)));
                let result = outcome.unwrap_or_else(|_| {
                    Err(TemplateError::Transport("provider panicked".to_string()))
                });
                queue.push(RuntimeEvent::Template { request_id, result });
            })
            .map_err(|error| format!("failed to spawn template worker: {error}"))?;

        self.track_work(request_id, cancel, join_handle);
        Ok(request_id)
    }

    fn spawn_run_worker(&self, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        let run_id = self.next_id();
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        let provider = Arc::clone(&self.provider);
        let queue = Arc::clone(&self.queue);
        let worker_cancel = Arc::clone(&cancel);
        let request = RunRequest { run_id, messages };

        let join_handle = thread::Builder::new()
            .name(format!("build-agent-run-{run_id}"))
            .spawn(move || run_worker(provider.as_ref(), request, worker_cancel, &queue))
            .map_err(|error| format!("failed to spawn run worker: {error}"))?;

        self.track_work(run_id, cancel, join_handle);
        Ok(run_id)
    }

    fn track_work(&self, id: u64, cancel: CancelSignal, join_handle: JoinHandle<()>) {
        lock_unpoisoned(&self.active).insert(
            id,
            ActiveWork {
                cancel,
                join_handle: Some(join_handle),
            },
        );
    }

    fn cancel_work(&self, id: u64) {
        if let Some(work) = lock_unpoisoned(&self.active).get(&id) {
            work.cancel.store(true, Ordering::SeqCst);
        }
    }

    fn finish_work(&self, id: u64) {
        let Some(mut work) = lock_unpoisoned(&self.active).remove(&id) else {
            return;
        };

        if let Some(join_handle) = work.join_handle.take() {
            if join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(observer) = lock_unpoisoned(&self.observer).as_mut() {
            observer(&notice);
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        for work in lock_unpoisoned(&self.active).values() {
            work.cancel.store(true, Ordering::SeqCst);
        }
    }
}

fn run_worker(
    provider: &dyn BuildProvider,
    request: RunRequest,
    cancel: CancelSignal,
    queue: &EventQueue,
) {
    let run_id = request.run_id;
    let mut terminal_emitted = false;
    let mut emit = |event: RunEvent| {
        if event.is_terminal() {
            terminal_emitted = true;
        }
        queue.push(RuntimeEvent::Run(event));
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| provider.run(request, cancel, &mut emit)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(error)) => emit(RunEvent::Failed { run_id, error }),
        Err(_) => emit(RunEvent::Failed {
            run_id,
            error: "provider panicked".to_string(),
        }),
    }

    if !terminal_emitted {
        queue.push(RuntimeEvent::Run(RunEvent::Failed {
            run_id,
            error: "provider exited without terminal event".to_string(),
        }));
    }
}

struct RuntimeHost<'a> {
    runtime: &'a SessionRuntime,
}

impl SessionHost for RuntimeHost<'_> {
    fn request_template(&mut self, prompt: String) -> Result<RequestId, String> {
        self.runtime.spawn_template_worker(prompt)
    }

    fn start_stream(&mut self, messages: Vec<ChatMessage>) -> Result<RunId, String> {
        self.runtime.spawn_run_worker(messages)
    }

    fn cancel(&mut self, id: u64) {
        self.runtime.cancel_work(id);
    }

    fn notify(&mut self, notice: SessionNotice) {
        self.runtime.notify(notice);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
