use super::config::SessionConfig;
use super::state::{SessionState, TranscriptSegment};
use crate::agent::{ConversationClient, SessionEvent};
use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Internal flags behind the observable `SessionState`
#[derive(Debug, Default)]
struct Flags {
    connected: bool,
    processing: bool,
    agent_speaking: bool,
    user_speaking: bool,
    error: Option<String>,
    session_id: Option<String>,
    started_at: Option<chrono::DateTime<Utc>>,
    remaining_secs: Option<u64>,
    elapsed_secs: u64,
}

/// Voice session lifecycle controller
///
/// Owns the conversation handle and the safety timer exclusively; UI-facing
/// callers only ever see `SessionState` snapshots. All failures are caught
/// at this boundary and converted into observable state - the contract is
/// "the controller always returns to idle", not "the remote session
/// definitely closed cleanly".
pub struct VoiceSession {
    config: SessionConfig,
    client: Arc<dyn ConversationClient>,

    flags: Arc<Mutex<Flags>>,

    /// True from a successful start() guard until the session leaves
    /// Connecting/Connected; gates re-entrant start() calls
    active: Arc<AtomicBool>,

    /// Teardown guard; shutdown() runs its cleanup exactly once
    closed: AtomicBool,

    /// Accumulated transcript segments for the current session
    transcript: Arc<Mutex<Vec<TranscriptSegment>>>,

    /// Handle for the event-consuming task
    event_task: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Handle for the safety-timer task
    timer_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl VoiceSession {
    pub fn new(config: SessionConfig, client: Arc<dyn ConversationClient>) -> Self {
        Self {
            config,
            client,
            flags: Arc::new(Mutex::new(Flags::default())),
            active: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            transcript: Arc::new(Mutex::new(Vec::new())),
            event_task: Arc::new(Mutex::new(None)),
            timer_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Validate that the required configuration is present
    pub fn test_connection(&self) -> Result<()> {
        if self.config.agent_id.trim().is_empty() {
            bail!("agent id is required");
        }
        Ok(())
    }

    /// Start a conversation session.
    ///
    /// A start while already Connecting/Connected is a logged no-op; the
    /// live session is never disturbed. On failure the error lands in the
    /// observable state, `processing` resets, and any partially established
    /// session is torn down best-effort.
    pub async fn start(&self) -> Result<()> {
        if let Err(e) = self.test_connection() {
            let mut flags = self.flags.lock().await;
            flags.error = Some(e.to_string());
            return Err(e);
        }

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("voice session already starting or connected; ignoring start");
            return Ok(());
        }

        info!("starting voice session for agent {}", self.config.agent_id);

        {
            let mut flags = self.flags.lock().await;
            *flags = Flags::default();
            flags.processing = true;
        }
        self.transcript.lock().await.clear();
        self.cancel_timer().await;

        let events = match self.client.connect(&self.config.agent_id).await {
            Ok(rx) => rx,
            Err(e) => {
                error!("failed to start voice session: {:#}", e);
                self.active.store(false, Ordering::SeqCst);
                {
                    let mut flags = self.flags.lock().await;
                    flags.processing = false;
                    flags.error = Some(e.to_string());
                }
                // Tear down anything the failed handshake left behind
                if let Err(e) = self.client.disconnect().await {
                    warn!("post-failure disconnect failed: {:#}", e);
                }
                return Err(e);
            }
        };

        let task = tokio::spawn(Self::run_events(
            events,
            Arc::clone(&self.flags),
            Arc::clone(&self.transcript),
            Arc::clone(&self.active),
            Arc::clone(&self.client),
            Arc::clone(&self.timer_task),
            self.config.clone(),
        ));
        {
            let mut guard = self.event_task.lock().await;
            if let Some(prev) = guard.take() {
                prev.abort();
            }
            *guard = Some(task);
        }

        Ok(())
    }

    /// Gracefully stop the session.
    ///
    /// Idempotent: a second stop on an idle controller only clears a
    /// lingering error message. Local state resets even when the remote
    /// termination fails.
    pub async fn stop(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            // Manual reset affordance from the Error state
            let mut flags = self.flags.lock().await;
            if flags.error.take().is_some() {
                debug!("cleared error on stop of idle session");
            } else {
                debug!("voice session already idle; ignoring stop");
            }
            return Ok(());
        }

        info!("stopping voice session");

        if let Err(e) = self.client.disconnect().await {
            warn!("graceful disconnect failed: {:#}", e);
        }

        self.reset_to_idle().await;
        self.cancel_event_task().await;

        Ok(())
    }

    /// Stop with a hard bound: observable state resets immediately and the
    /// remote termination is raced against `stop_timeout`. A too-slow close
    /// is discarded, not reported.
    pub async fn force_stop(&self) -> Result<()> {
        info!("force-stopping voice session");

        self.active.store(false, Ordering::SeqCst);
        self.reset_to_idle().await;
        self.cancel_event_task().await;

        match tokio::time::timeout(self.config.stop_timeout, self.client.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("disconnect failed during force stop: {:#}", e),
            Err(_) => warn!(
                "disconnect did not finish within {:?}; abandoning it",
                self.config.stop_timeout
            ),
        }

        Ok(())
    }

    /// Teardown cleanup; runs the termination path exactly once no matter
    /// how teardown was triggered.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.active.load(Ordering::SeqCst) {
            let _ = self.force_stop().await;
        }
    }

    /// Current observable state
    pub async fn state(&self) -> SessionState {
        let flags = self.flags.lock().await;
        SessionState {
            connected: flags.connected,
            listening: flags.connected && !flags.agent_speaking && !flags.user_speaking,
            speaking: flags.agent_speaking,
            processing: flags.processing,
            error: flags.error.clone(),
            session_id: flags.session_id.clone(),
            started_at: flags.started_at,
            remaining_secs: flags.remaining_secs,
            elapsed_secs: flags.elapsed_secs,
        }
    }

    /// Transcript accumulated by the current (or last) session
    pub async fn transcript(&self) -> Vec<TranscriptSegment> {
        self.transcript.lock().await.clone()
    }

    async fn reset_to_idle(&self) {
        {
            let mut flags = self.flags.lock().await;
            *flags = Flags::default();
        }
        self.cancel_timer().await;
    }

    async fn cancel_timer(&self) {
        let mut guard = self.timer_task.lock().await;
        if let Some(task) = guard.take() {
            task.abort();
        }
    }

    async fn cancel_event_task(&self) {
        let mut guard = self.event_task.lock().await;
        if let Some(task) = guard.take() {
            task.abort();
        }
    }

    /// Consume session events until the session ends or fails
    async fn run_events(
        mut events: tokio::sync::mpsc::Receiver<SessionEvent>,
        flags: Arc<Mutex<Flags>>,
        transcript: Arc<Mutex<Vec<TranscriptSegment>>>,
        active: Arc<AtomicBool>,
        client: Arc<dyn ConversationClient>,
        timer_task: Arc<Mutex<Option<JoinHandle<()>>>>,
        config: SessionConfig,
    ) {
        while let Some(event) = events.recv().await {
            if !active.load(Ordering::SeqCst) {
                break;
            }

            match event {
                SessionEvent::Connected { session_id } => {
                    info!("connected to agent session {}", session_id);
                    {
                        let mut f = flags.lock().await;
                        f.connected = true;
                        f.processing = false;
                        f.error = None;
                        f.session_id = Some(session_id);
                        f.started_at = Some(Utc::now());
                        f.remaining_secs = config.budget_secs;
                        f.elapsed_secs = 0;
                    }

                    let timer = tokio::spawn(Self::run_timer(
                        Arc::clone(&flags),
                        Arc::clone(&active),
                        Arc::clone(&client),
                        config.clone(),
                    ));
                    let mut guard = timer_task.lock().await;
                    if let Some(prev) = guard.take() {
                        prev.abort();
                    }
                    *guard = Some(timer);
                }
                SessionEvent::AgentStartedSpeaking => {
                    flags.lock().await.agent_speaking = true;
                }
                SessionEvent::AgentStoppedSpeaking => {
                    flags.lock().await.agent_speaking = false;
                }
                SessionEvent::UserStartedSpeaking => {
                    flags.lock().await.user_speaking = true;
                }
                SessionEvent::UserStoppedSpeaking => {
                    flags.lock().await.user_speaking = false;
                }
                SessionEvent::Transcript(segment) => {
                    debug!(
                        "transcript segment (partial={}): {}",
                        segment.partial, segment.text
                    );
                    transcript.lock().await.push(segment);
                }
                SessionEvent::Error(message) => {
                    error!("voice session error: {}", message);
                    active.store(false, Ordering::SeqCst);
                    {
                        let mut f = flags.lock().await;
                        *f = Flags {
                            error: Some(message),
                            ..Flags::default()
                        };
                    }
                    {
                        let mut guard = timer_task.lock().await;
                        if let Some(task) = guard.take() {
                            task.abort();
                        }
                    }
                    // Best-effort termination; errors are logged, not surfaced
                    let client = Arc::clone(&client);
                    tokio::spawn(async move {
                        if let Err(e) = client.disconnect().await {
                            warn!("disconnect after error failed: {:#}", e);
                        }
                    });
                    break;
                }
                SessionEvent::Disconnected => {
                    info!("voice session disconnected");
                    active.store(false, Ordering::SeqCst);
                    {
                        let mut f = flags.lock().await;
                        *f = Flags::default();
                    }
                    let mut guard = timer_task.lock().await;
                    if let Some(task) = guard.take() {
                        task.abort();
                    }
                    break;
                }
            }
        }

        debug!("session event task finished");
    }

    /// Safety timer: one strictly serialized periodic tick.
    ///
    /// Countdown variant decrements once per tick, never below zero, and
    /// forces the stop transition at zero. Count-up variant only advances
    /// the elapsed display.
    async fn run_timer(
        flags: Arc<Mutex<Flags>>,
        active: Arc<AtomicBool>,
        client: Arc<dyn ConversationClient>,
        config: SessionConfig,
    ) {
        let mut interval = tokio::time::interval(config.timer_tick);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            if !active.load(Ordering::SeqCst) {
                break;
            }

            let expired = {
                let mut f = flags.lock().await;
                if !f.connected {
                    false
                } else {
                    f.elapsed_secs += 1;
                    match f.remaining_secs {
                        Some(remaining) => {
                            let remaining = remaining.saturating_sub(1);
                            f.remaining_secs = Some(remaining);
                            remaining == 0
                        }
                        None => false,
                    }
                }
            };

            if expired {
                info!("session budget exhausted; forcing stop");
                active.store(false, Ordering::SeqCst);
                {
                    let mut f = flags.lock().await;
                    *f = Flags::default();
                }
                match tokio::time::timeout(config.stop_timeout, client.disconnect()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("disconnect after budget expiry failed: {:#}", e),
                    Err(_) => warn!("disconnect after budget expiry timed out"),
                }
                break;
            }
        }
    }
}
