//! Timer driver task
//!
//! One tokio task owns a [`TimerEngine`] and everything that touches it.
//! Ticks, user commands and server answers arrive on channels and are
//! handled one at a time, so no state is shared and nothing needs a lock.
//! Server requests run in their own tasks and report back through the
//! outcome channel; the countdown never waits on the network.

use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    engine::{CompletionTrigger, TimerAction, TimerEngine, TimerPhase},
    view::TimerView,
};
use crate::{
    api::responses::{PauseResponse, ResumeResponse, StartSessionRequest, StartSessionResponse},
    client::{CompletionAck, SessionApi},
    error::ApiError,
    platform::{CompletionChime, WakeLock, WakeLockCapability},
    session::{Clock, TimerSession},
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(15);

/// How the zero crossing turns into a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Complete as soon as the countdown reaches zero (screen-time rewards)
    Automatic,
    /// Ask for confirmation first; the prompt closes itself after `auto_close` (timed tasks)
    Confirm { auto_close: Duration },
}

/// Timer settings
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Nominal duration, replaced by the server's value on start
    pub total_seconds: u64,
    /// Existing server session to pick up instead of starting a new one
    pub resume: Option<(Uuid, TimerSession)>,
    pub tick_interval: Duration,
    pub save_interval: Duration,
    pub mode: CompletionMode,
}

impl TimerConfig {
    /// A timer that waits for [`TimerHandle::start`]
    pub fn new(total_seconds: u64) -> Self {
        Self {
            total_seconds,
            resume: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
            mode: CompletionMode::Automatic,
        }
    }

    /// A timer remounted onto an existing session
    ///
    /// `session.recorded_elapsed_seconds`, `paused_seconds` and `paused_at`
    /// carry the initial elapsed, paused and pause-start values.
    pub fn resuming(session_id: Uuid, session: TimerSession) -> Self {
        let total_seconds = session.total_seconds;
        Self {
            resume: Some((session_id, session)),
            ..Self::new(total_seconds)
        }
    }

    pub fn with_tick_interval(mut self, every: Duration) -> Self {
        self.tick_interval = every;
        self
    }

    pub fn with_save_interval(mut self, every: Duration) -> Self {
        self.save_interval = every;
        self
    }

    pub fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }
}

pub type CompletionCallback = Box<dyn FnOnce(CompletionAck) + Send>;

/// Collaborators injected into a timer
pub struct TimerDeps {
    pub api: Arc<dyn SessionApi>,
    pub clock: Arc<dyn Clock>,
    pub wake_lock: WakeLockCapability,
    pub chime: CompletionChime,
    pub on_complete: Option<CompletionCallback>,
}

impl TimerDeps {
    pub fn new(api: Arc<dyn SessionApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            wake_lock: WakeLockCapability::Unavailable,
            chime: CompletionChime::silent(),
            on_complete: None,
        }
    }

    pub fn with_wake_lock(mut self, capability: WakeLockCapability) -> Self {
        self.wake_lock = capability;
        self
    }

    pub fn with_chime(mut self, chime: CompletionChime) -> Self {
        self.chime = chime;
        self
    }

    /// Called once, after the server confirmed completion
    pub fn on_complete(mut self, callback: impl FnOnce(CompletionAck) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

/// User-facing, dismissable failure notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub action: TimerAction,
    pub message: String,
}

/// Things a timer display reacts to once
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Started { session_id: Uuid },
    Paused { remaining_seconds: u64 },
    Resumed { remaining_seconds: u64 },
    ConfirmationRequested { auto_close: Duration },
    Completed { ack: CompletionAck },
    Notice(Notice),
}

#[derive(Debug)]
pub enum TimerCommand {
    Start(StartSessionRequest),
    Pause,
    Resume,
    VisibilityChanged(bool),
    ConfirmCompletion,
    Teardown,
}

/// Server answers routed back into the timer task
#[derive(Debug)]
enum Outcome {
    Started(Result<StartSessionResponse, ApiError>),
    Paused(Result<PauseResponse, ApiError>),
    Resumed(Result<ResumeResponse, ApiError>),
    Completed(Result<CompletionAck, ApiError>),
}

/// Cloneable command side of a timer, for prompts and input handlers
#[derive(Debug, Clone)]
pub struct TimerControl {
    commands: mpsc::UnboundedSender<TimerCommand>,
}

impl TimerControl {
    fn send(&self, command: TimerCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                debug!("Timer task is gone, dropping {:?}", e.0);
                false
            }
        }
    }

    pub fn start(&self, request: StartSessionRequest) -> bool {
        self.send(TimerCommand::Start(request))
    }

    pub fn pause(&self) -> bool {
        self.send(TimerCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(TimerCommand::Resume)
    }

    /// Report the host going to the background (`false`) or back (`true`)
    pub fn visibility_changed(&self, visible: bool) -> bool {
        self.send(TimerCommand::VisibilityChanged(visible))
    }

    /// Explicitly confirm completion; also retries a failed completion
    pub fn confirm_completion(&self) -> bool {
        self.send(TimerCommand::ConfirmCompletion)
    }
}

/// Handle to a running timer task
#[derive(Debug)]
pub struct TimerHandle {
    control: TimerControl,
    view: watch::Receiver<TimerView>,
    events: broadcast::Sender<TimerEvent>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn control(&self) -> TimerControl {
        self.control.clone()
    }

    pub fn start(&self, request: StartSessionRequest) -> bool {
        self.control.start(request)
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn visibility_changed(&self, visible: bool) -> bool {
        self.control.visibility_changed(visible)
    }

    pub fn confirm_completion(&self) -> bool {
        self.control.confirm_completion()
    }

    /// Latest view
    pub fn view(&self) -> TimerView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerView> {
        self.view.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Stop the timer, save progress and release the wake lock
    pub async fn teardown(self) {
        self.control.send(TimerCommand::Teardown);
        if let Err(e) = self.task.await {
            warn!("Timer task ended abnormally: {}", e);
        }
    }
}

/// Spawn a timer task
///
/// The returned receiver is subscribed before the task starts, so it sees
/// a completion that happens on the very first reconciliation.
pub fn spawn_timer(config: TimerConfig, deps: TimerDeps) -> (TimerHandle, broadcast::Receiver<TimerEvent>) {
    let engine = match config.resume {
        Some((session_id, session)) => TimerEngine::restore(session_id, session),
        None => TimerEngine::idle(config.total_seconds),
    };

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(TimerView::from_engine(&engine, deps.clock.now(), false));
    let (events_tx, events_rx) = broadcast::channel(64);

    let task = TimerTask {
        engine,
        tick_interval: config.tick_interval,
        save_interval: config.save_interval,
        mode: config.mode,
        api: deps.api,
        clock: deps.clock,
        wake_lock: WakeLock::new(deps.wake_lock),
        chime: deps.chime,
        on_complete: deps.on_complete,
        view_tx,
        events_tx: events_tx.clone(),
        outcome_tx,
        awaiting_confirmation: false,
    };
    let join = tokio::spawn(task.run(command_rx, outcome_rx));

    let handle = TimerHandle {
        control: TimerControl { commands: command_tx },
        view: view_rx,
        events: events_tx,
        task: join,
    };
    (handle, events_rx)
}

struct TimerTask {
    engine: TimerEngine,
    tick_interval: Duration,
    save_interval: Duration,
    mode: CompletionMode,
    api: Arc<dyn SessionApi>,
    clock: Arc<dyn Clock>,
    wake_lock: WakeLock,
    chime: CompletionChime,
    on_complete: Option<CompletionCallback>,
    view_tx: watch::Sender<TimerView>,
    events_tx: broadcast::Sender<TimerEvent>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    awaiting_confirmation: bool,
}

impl TimerTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<TimerCommand>,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
    ) {
        info!(
            "Timer task started: phase={}, session={:?}, total={}s",
            self.engine.phase(),
            self.engine.session_id(),
            self.engine.total_seconds()
        );

        if self.engine.phase() == TimerPhase::Running {
            self.wake_lock.acquire();
        }
        self.reconcile(CompletionTrigger::Mount);
        self.publish();

        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut saver = interval_at(Instant::now() + self.save_interval, self.save_interval);
        saver.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.reconcile(CompletionTrigger::Tick),
                _ = saver.tick() => self.save_progress("interval"),
                command = commands.recv() => match command {
                    Some(TimerCommand::Teardown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(outcome) = outcomes.recv() => self.apply_outcome(outcome),
            }
            self.publish();
        }

        self.save_progress("teardown");
        self.wake_lock.release();
        info!("Timer task stopped in phase {}", self.engine.phase());
    }

    fn handle_command(&mut self, command: TimerCommand) {
        debug!("Timer command: {:?}", command);
        match command {
            TimerCommand::Start(request) => self.start(request),
            TimerCommand::Pause => {
                self.reconcile(CompletionTrigger::Recheck);
                self.pause();
            }
            TimerCommand::Resume => self.resume(),
            TimerCommand::VisibilityChanged(visible) => self.visibility_changed(visible),
            TimerCommand::ConfirmCompletion => self.request_completion(CompletionTrigger::Confirmation),
            TimerCommand::Teardown => {}
        }
    }

    /// Re-derive remaining time and react to the zero crossing
    fn reconcile(&mut self, trigger: CompletionTrigger) {
        let now = self.clock.now();
        if !self.engine.needs_completion(now) {
            return;
        }

        match self.mode {
            CompletionMode::Automatic => self.request_completion(trigger),
            CompletionMode::Confirm { auto_close } => {
                if !self.awaiting_confirmation {
                    info!("Countdown reached zero, waiting for confirmation");
                    self.awaiting_confirmation = true;
                    self.emit(TimerEvent::ConfirmationRequested { auto_close });
                }
            }
        }
    }

    fn start(&mut self, request: StartSessionRequest) {
        if let Err(e) = self.engine.begin(TimerAction::Start) {
            debug!("Start ignored: {}", e);
            return;
        }
        info!("Starting {} session for {}", request.kind, request.context_id);
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { api.start_session(&request).await }, Outcome::Started);
    }

    fn pause(&mut self) {
        if let Err(e) = self.engine.begin(TimerAction::Pause) {
            debug!("Pause ignored: {}", e);
            return;
        }
        self.save_progress("pause");
        if let Some(id) = self.engine.session_id() {
            let api = Arc::clone(&self.api);
            self.spawn_request(async move { api.pause_session(id).await }, Outcome::Paused);
        }
    }

    fn resume(&mut self) {
        if let Err(e) = self.engine.begin(TimerAction::Resume) {
            debug!("Resume ignored: {}", e);
            return;
        }
        if let Some(id) = self.engine.session_id() {
            let api = Arc::clone(&self.api);
            self.spawn_request(async move { api.resume_session(id).await }, Outcome::Resumed);
        }
    }

    fn request_completion(&mut self, trigger: CompletionTrigger) {
        let Some(id) = self.engine.session_id() else {
            return;
        };
        if let Err(e) = self.engine.claim_completion(trigger, self.clock.now()) {
            debug!("Completion not requested ({:?}): {}", trigger, e);
            return;
        }

        info!("Confirming completion of session {} ({:?})", id, trigger);
        let api = Arc::clone(&self.api);
        self.spawn_request(async move { api.complete_session(id).await }, Outcome::Completed);
    }

    fn visibility_changed(&mut self, visible: bool) {
        if visible {
            debug!("Timer visible again, rechecking");
            if self.engine.phase() == TimerPhase::Running {
                self.wake_lock.acquire();
            }
            self.reconcile(CompletionTrigger::Visibility);
        } else {
            self.save_progress("hidden");
        }
    }

    /// Fire-and-forget progress save; failures wait for the next interval
    fn save_progress(&self, reason: &'static str) {
        if self.engine.phase() != TimerPhase::Running {
            return;
        }
        let Some(id) = self.engine.session_id() else {
            return;
        };

        let elapsed = self.engine.elapsed_seconds(self.clock.now());
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.save_progress(id, elapsed).await {
                Ok(()) => debug!("Saved {}s of progress for {} ({})", elapsed, id, reason),
                Err(e) => warn!("Failed to save progress for {} ({}), retrying next interval: {}", id, reason, e),
            }
        });
    }

    fn spawn_request<F, T>(&self, request: F, wrap: fn(Result<T, ApiError>) -> Outcome)
    where
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let outcomes = self.outcome_tx.clone();
        tokio::spawn(async move {
            // the timer may have been torn down meanwhile
            let _ = outcomes.send(wrap(request.await));
        });
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        let now = self.clock.now();
        match outcome {
            Outcome::Started(Ok(response)) => {
                if self.engine.apply_started(response.session_id, response.started_at, response.total_seconds) {
                    info!("Session {} running", response.session_id);
                    self.wake_lock.acquire();
                    self.emit(TimerEvent::Started {
                        session_id: response.session_id,
                    });
                    self.reconcile(CompletionTrigger::Recheck);
                }
            }
            Outcome::Paused(Ok(response)) => {
                if self.engine.apply_paused(response.paused_at) {
                    self.wake_lock.release();
                    self.emit(TimerEvent::Paused {
                        remaining_seconds: self.engine.remaining_seconds(now),
                    });
                }
            }
            Outcome::Resumed(Ok(response)) => {
                if self.engine.apply_resumed(response.paused_seconds) {
                    self.wake_lock.acquire();
                    self.emit(TimerEvent::Resumed {
                        remaining_seconds: self.engine.remaining_seconds(now),
                    });
                    self.reconcile(CompletionTrigger::Recheck);
                }
            }
            Outcome::Completed(Ok(ack)) => self.finish(ack),
            Outcome::Started(Err(e)) => self.fail(TimerAction::Start, e),
            Outcome::Paused(Err(e)) => self.fail(TimerAction::Pause, e),
            Outcome::Resumed(Err(e)) => self.fail(TimerAction::Resume, e),
            Outcome::Completed(Err(e)) => self.fail(TimerAction::Complete, e),
        }
    }

    fn finish(&mut self, ack: CompletionAck) {
        if !self.engine.apply_completed() {
            return;
        }
        if ack == CompletionAck::AlreadyInactive {
            info!("Session was already closed on the server, treating as completed");
        }
        info!("Timer completed");

        self.awaiting_confirmation = false;
        self.wake_lock.release();
        self.chime.play();
        if let Some(callback) = self.on_complete.take() {
            callback(ack);
        }
        self.emit(TimerEvent::Completed { ack });
    }

    fn fail(&mut self, action: TimerAction, error: ApiError) {
        warn!("{} request failed: {}", action, error);
        self.engine.abort(action);
        if action == TimerAction::Complete {
            // the prompt already closed; a retry is an explicit confirmation now
            self.awaiting_confirmation = false;
        }
        self.emit(TimerEvent::Notice(Notice {
            action,
            message: format!("Could not {} the timer, please try again", action),
        }));
    }

    fn emit(&self, event: TimerEvent) {
        // no subscribers is fine
        let _ = self.events_tx.send(event);
    }

    fn publish(&self) {
        let view = TimerView::from_engine(&self.engine, self.clock.now(), self.awaiting_confirmation);
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        api::responses::SessionResponse,
        timer::engine::CompletionState,
        client::LocalSessionApi,
        platform::wake_lock::testing::fake_capability,
        session::{ManualClock, SessionKind},
        state::{AppState, SessionStatus},
    };

    /// Local API that counts calls and can be told to fail
    #[derive(Debug)]
    struct CountingApi {
        inner: LocalSessionApi,
        completes: AtomicUsize,
        saves: Mutex<Vec<u64>>,
        fail_pause: AtomicBool,
        fail_complete: AtomicBool,
    }

    impl CountingApi {
        fn completes(&self) -> usize {
            self.completes.load(Ordering::SeqCst)
        }

        fn unavailable() -> ApiError {
            ApiError::Server {
                status: 503,
                code: "unavailable".to_string(),
                message: "try later".to_string(),
            }
        }
    }

    #[async_trait]
    impl SessionApi for CountingApi {
        async fn start_session(&self, request: &StartSessionRequest) -> Result<StartSessionResponse, ApiError> {
            self.inner.start_session(request).await
        }

        async fn pause_session(&self, id: Uuid) -> Result<PauseResponse, ApiError> {
            if self.fail_pause.load(Ordering::SeqCst) {
                return Err(Self::unavailable());
            }
            self.inner.pause_session(id).await
        }

        async fn resume_session(&self, id: Uuid) -> Result<ResumeResponse, ApiError> {
            self.inner.resume_session(id).await
        }

        async fn save_progress(&self, id: Uuid, elapsed_seconds: u64) -> Result<(), ApiError> {
            self.saves.lock().unwrap().push(elapsed_seconds);
            self.inner.save_progress(id, elapsed_seconds).await
        }

        async fn complete_session(&self, id: Uuid) -> Result<CompletionAck, ApiError> {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if self.fail_complete.load(Ordering::SeqCst) {
                return Err(Self::unavailable());
            }
            self.inner.complete_session(id).await
        }

        async fn abandon_session(&self, id: Uuid) -> Result<(), ApiError> {
            self.inner.abandon_session(id).await
        }

        async fn fetch_session(&self, id: Uuid) -> Result<SessionResponse, ApiError> {
            self.inner.fetch_session(id).await
        }
    }

    struct Fixture {
        api: Arc<CountingApi>,
        state: Arc<AppState>,
        clock: ManualClock,
        session_id: Uuid,
    }

    impl Fixture {
        fn new(minutes: u64) -> Self {
            let clock = ManualClock::new(Utc::now());
            let state = Arc::new(AppState::with_clock(0, "test".to_string(), 30, Arc::new(clock.clone())));
            let session_id = state
                .start_session(StartSessionRequest {
                    kind: SessionKind::Reward,
                    context_id: "console".to_string(),
                    duration_minutes: minutes,
                })
                .unwrap()
                .session_id;
            let api = Arc::new(CountingApi {
                inner: LocalSessionApi::new(Arc::clone(&state)),
                completes: AtomicUsize::new(0),
                saves: Mutex::new(Vec::new()),
                fail_pause: AtomicBool::new(false),
                fail_complete: AtomicBool::new(false),
            });
            Self {
                api,
                state,
                clock,
                session_id,
            }
        }

        fn config(&self) -> TimerConfig {
            let session = self.state.get_session(self.session_id).unwrap().timer;
            TimerConfig::resuming(self.session_id, session)
        }

        fn deps(&self) -> TimerDeps {
            TimerDeps::new(self.api.clone(), Arc::new(self.clock.clone()))
        }

        fn status(&self) -> SessionStatus {
            self.state.get_session(self.session_id).unwrap().status
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<TimerView>, pred: impl Fn(&TimerView) -> bool) -> TimerView {
        tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                if pred(&rx.borrow_and_update()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("timer view never matched")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn expired_on_mount_completes_without_a_tick() {
        let fx = Fixture::new(10);
        fx.clock.advance_secs(600);
        let (done_tx, done_rx) = oneshot::channel();

        let config = fx.config().with_tick_interval(Duration::from_secs(3600));
        let deps = fx.deps().on_complete(move |ack| {
            let _ = done_tx.send(ack);
        });
        let began = Instant::now();
        let (handle, _events) = spawn_timer(config, deps);

        assert_eq!(done_rx.await.unwrap(), CompletionAck::Completed);
        assert!(began.elapsed() < Duration::from_secs(3600));
        assert_eq!(fx.api.completes(), 1);
        assert_eq!(fx.status(), SessionStatus::Completed);

        let mut views = handle.subscribe();
        let view = wait_for(&mut views, |v| v.is_completed()).await;
        assert_eq!(view.remaining_seconds, 0);
        assert_eq!(view.progress, 1.0);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn racing_triggers_complete_once() {
        let fx = Fixture::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deps = fx.deps().on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (handle, _events) = spawn_timer(fx.config(), deps);
        let mut views = handle.subscribe();

        // suspended well past the end, then woken by every path at once
        fx.clock.advance_secs(3_600);
        handle.visibility_changed(true);
        handle.confirm_completion();
        handle.visibility_changed(true);

        wait_for(&mut views, |v| v.is_completed()).await;
        settle().await;
        handle.confirm_completion();
        settle().await;

        assert_eq!(fx.api.completes(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn already_inactive_is_success() {
        let fx = Fixture::new(1);
        fx.clock.advance_secs(120);
        // another tab (or the sweep) closed it first
        fx.state.complete_session(fx.session_id).unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        let deps = fx.deps().on_complete(move |ack| {
            let _ = done_tx.send(ack);
        });
        let (handle, mut events) = spawn_timer(fx.config(), deps);

        assert_eq!(done_rx.await.unwrap(), CompletionAck::AlreadyInactive);
        loop {
            match events.recv().await.unwrap() {
                TimerEvent::Completed { ack } => {
                    assert_eq!(ack, CompletionAck::AlreadyInactive);
                    break;
                }
                TimerEvent::Notice(notice) => panic!("unexpected notice: {:?}", notice),
                _ => {}
            }
        }
        assert!(handle.view().is_completed());
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_follow_the_server() {
        let fx = Fixture::new(10);
        let (handle, _events) = spawn_timer(fx.config(), fx.deps());
        let mut views = handle.subscribe();

        fx.clock.advance_secs(100);
        handle.pause();
        let view = wait_for(&mut views, |v| v.phase == TimerPhase::Paused).await;
        assert_eq!(view.remaining_seconds, 500);

        fx.clock.advance_secs(300);
        settle().await;
        assert_eq!(handle.view().remaining_seconds, 500);

        handle.resume();
        wait_for(&mut views, |v| v.phase == TimerPhase::Running).await;
        fx.clock.advance_secs(50);
        settle().await;
        assert_eq!(handle.view().remaining_seconds, 450);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pause_raises_notice_and_keeps_running() {
        let fx = Fixture::new(10);
        fx.api.fail_pause.store(true, Ordering::SeqCst);
        let (handle, mut events) = spawn_timer(fx.config(), fx.deps());

        handle.pause();
        let notice = loop {
            if let TimerEvent::Notice(notice) = events.recv().await.unwrap() {
                break notice;
            }
        };
        assert_eq!(notice.action, TimerAction::Pause);

        settle().await;
        let view = handle.view();
        assert_eq!(view.phase, TimerPhase::Running);
        assert!(!view.busy);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_completion_waits_for_explicit_retry() {
        let fx = Fixture::new(1);
        fx.api.fail_complete.store(true, Ordering::SeqCst);
        fx.clock.advance_secs(60);
        let (handle, mut events) = spawn_timer(fx.config(), fx.deps());

        loop {
            if let TimerEvent::Notice(notice) = events.recv().await.unwrap() {
                assert_eq!(notice.action, TimerAction::Complete);
                break;
            }
        }
        settle().await;
        assert_eq!(fx.api.completes(), 1);
        assert_eq!(handle.view().phase, TimerPhase::Running);

        fx.api.fail_complete.store(false, Ordering::SeqCst);
        handle.confirm_completion();
        let mut views = handle.subscribe();
        wait_for(&mut views, |v| v.is_completed()).await;
        assert_eq!(fx.api.completes(), 2);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn progress_saved_on_interval_and_teardown() {
        let fx = Fixture::new(10);
        let config = fx.config().with_save_interval(Duration::from_secs(5));
        let (handle, _events) = spawn_timer(config, fx.deps());

        fx.clock.advance_secs(30);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(fx.api.saves.lock().unwrap().contains(&30));

        fx.clock.advance_secs(12);
        handle.teardown().await;
        settle().await;
        assert_eq!(fx.api.saves.lock().unwrap().last(), Some(&42));
        assert_eq!(fx.state.get_session(fx.session_id).unwrap().timer.recorded_elapsed_seconds, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn hiding_the_timer_saves_progress() {
        let fx = Fixture::new(10);
        let config = fx.config().with_save_interval(Duration::from_secs(3600));
        let (handle, _events) = spawn_timer(config, fx.deps());

        fx.clock.advance_secs(75);
        handle.visibility_changed(false);
        settle().await;

        assert_eq!(*fx.api.saves.lock().unwrap(), vec![75]);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn wake_lock_follows_running_state() {
        let fx = Fixture::new(1);
        let (capability, fake) = fake_capability();
        let (handle, _events) = spawn_timer(fx.config(), fx.deps().with_wake_lock(capability));
        let mut views = handle.subscribe();
        settle().await;
        assert_eq!(fake.granted(), 1);

        handle.pause();
        wait_for(&mut views, |v| v.phase == TimerPhase::Paused).await;
        assert_eq!(fake.released(), 1);

        handle.resume();
        wait_for(&mut views, |v| v.phase == TimerPhase::Running).await;
        assert_eq!(fake.granted(), 2);

        // the OS dropped it while we were in the background
        fake.revoke();
        handle.visibility_changed(true);
        settle().await;
        assert_eq!(fake.granted(), 3);

        fx.clock.advance_secs(120);
        wait_for(&mut views, |v| v.is_completed()).await;
        assert_eq!(fake.released(), 2);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_mode_waits_for_the_user() {
        let fx = Fixture::new(1);
        let mode = CompletionMode::Confirm {
            auto_close: Duration::from_secs(10),
        };
        let (handle, mut events) = spawn_timer(fx.config().with_mode(mode), fx.deps());
        let mut views = handle.subscribe();

        fx.clock.advance_secs(60);
        loop {
            if let TimerEvent::ConfirmationRequested { auto_close } = events.recv().await.unwrap() {
                assert_eq!(auto_close, Duration::from_secs(10));
                break;
            }
        }
        settle().await;
        assert_eq!(fx.api.completes(), 0);
        assert!(handle.view().awaiting_confirmation);

        handle.confirm_completion();
        let view = wait_for(&mut views, |v| v.is_completed()).await;
        assert!(!view.awaiting_confirmation);
        assert_eq!(fx.api.completes(), 1);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_mode_failure_can_be_retried() {
        let fx = Fixture::new(1);
        fx.api.fail_complete.store(true, Ordering::SeqCst);
        let mode = CompletionMode::Confirm {
            auto_close: Duration::from_secs(10),
        };
        let (handle, mut events) = spawn_timer(fx.config().with_mode(mode), fx.deps());
        let mut views = handle.subscribe();

        fx.clock.advance_secs(60);
        wait_for(&mut views, |v| v.awaiting_confirmation).await;
        handle.confirm_completion();
        loop {
            if let TimerEvent::Notice(notice) = events.recv().await.unwrap() {
                assert_eq!(notice.action, TimerAction::Complete);
                break;
            }
        }

        let view = wait_for(&mut views, |v| v.completion == CompletionState::Failed).await;
        assert!(!view.awaiting_confirmation);
        assert_eq!(view.phase, TimerPhase::Running);

        // no second prompt and no automatic retry
        settle().await;
        assert!(!handle.view().awaiting_confirmation);
        assert_eq!(fx.api.completes(), 1);
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        fx.api.fail_complete.store(false, Ordering::SeqCst);
        handle.confirm_completion();
        wait_for(&mut views, |v| v.is_completed()).await;
        assert_eq!(fx.api.completes(), 2);
        assert_eq!(fx.status(), SessionStatus::Completed);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_starts_on_the_server() {
        let fx = Fixture::new(1);
        let (handle, mut events) = spawn_timer(TimerConfig::new(300), fx.deps());
        assert_eq!(handle.view().phase, TimerPhase::Idle);

        handle.start(StartSessionRequest {
            kind: SessionKind::Task,
            context_id: "homework".to_string(),
            duration_minutes: 5,
        });
        let session_id = loop {
            if let TimerEvent::Started { session_id } = events.recv().await.unwrap() {
                break session_id;
            }
        };

        let mut views = handle.subscribe();
        let view = wait_for(&mut views, |v| v.phase == TimerPhase::Running).await;
        assert_eq!(view.remaining_seconds, 300);
        assert_ne!(session_id, fx.session_id);
        handle.teardown().await;
    }
}
