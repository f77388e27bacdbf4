use super::messages::{ClientMessage, ConnectionStatus, ServerMessage, Transcription};
use super::{ReadyState, Transport, TransportEvent};
use anyhow::{bail, Result};
use rand::Rng;
use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Scripted lines replayed as partial/final transcription pairs
const MOCK_TRANSCRIPT: &[&str] = &[
    "Hello! I'm the site owner's AI assistant. How can I help you today?",
    "I see you're interested in learning more about my background.",
    "I have experience in full-stack development and distributed systems.",
    "Would you like to hear about my recent projects?",
    "I'm passionate about building intuitive user experiences.",
    "Feel free to ask anything about my technical skills or experience.",
    "I've worked on web applications, developer tools, and audio pipelines.",
    "My toolbox includes Rust, TypeScript, and cloud infrastructure.",
    "I'm always happy to talk about new technologies and approaches.",
    "Thanks for your interest! Anything specific you'd like to know?",
];

/// Timing ranges for the simulated socket, in milliseconds.
/// Tests shrink these so the full script plays out quickly.
#[derive(Debug, Clone)]
pub struct MockTiming {
    /// Delay before the handshake "completes"
    pub open_delay_ms: Range<u64>,
    /// Gap between scripted lines
    pub cadence_ms: Range<u64>,
    /// Gap between a partial and its final line
    pub finalize_delay_ms: Range<u64>,
    /// Simulated processing delay on `send`
    pub send_delay_ms: Range<u64>,
    /// CLOSING -> CLOSED delay
    pub close_delay_ms: u64,
}

impl Default for MockTiming {
    fn default() -> Self {
        Self {
            open_delay_ms: 100..600,
            cadence_ms: 3000..8000,
            finalize_delay_ms: 500..1500,
            send_delay_ms: 100..300,
            close_delay_ms: 100,
        }
    }
}

/// Development stand-in for the provider socket
///
/// Opens after a short randomized delay, announces a fresh session id, then
/// replays `MOCK_TRANSCRIPT` on a randomized cadence: each line first as a
/// ~70% prefix partial, then as the final full line. Stops once the script
/// is exhausted.
pub struct MockTransport {
    timing: MockTiming,
    session_id: String,
    ready_state: Arc<AtomicU8>,
    events_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    script_task: Mutex<Option<JoinHandle<()>>>,
}

impl MockTransport {
    pub fn new(timing: MockTiming) -> Self {
        Self {
            timing,
            session_id: format!("mock-session-{}", uuid::Uuid::new_v4()),
            ready_state: Arc::new(AtomicU8::new(ReadyState::Connecting.code())),
            events_tx: Mutex::new(None),
            script_task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn transcription(text: String, confidence: f32, is_final: bool) -> ServerMessage {
        ServerMessage::Transcription {
            transcription: Transcription {
                text,
                confidence,
                is_final,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// ~70% prefix of a line, on a char boundary
    fn partial_text(line: &str) -> String {
        let chars = line.chars().count();
        line.chars().take(chars * 7 / 10).collect()
    }

    async fn run_script(
        timing: MockTiming,
        session_id: String,
        ready_state: Arc<AtomicU8>,
        tx: mpsc::Sender<TransportEvent>,
    ) {
        tokio::time::sleep(jitter(&timing.open_delay_ms)).await;

        ready_state.store(ReadyState::Open.code(), Ordering::SeqCst);
        info!("mock transport: connection established");

        if tx.send(TransportEvent::Opened).await.is_err() {
            return;
        }

        let hello = ServerMessage::Connection {
            status: ConnectionStatus::Connected,
            session_id: session_id.clone(),
        };
        if tx.send(TransportEvent::Message(hello)).await.is_err() {
            return;
        }

        for line in MOCK_TRANSCRIPT {
            tokio::time::sleep(jitter(&timing.cadence_ms)).await;
            if ReadyState::from_code(ready_state.load(Ordering::SeqCst)) != ReadyState::Open {
                break;
            }

            let partial = Self::transcription(Self::partial_text(line), 0.85, false);
            if tx.send(TransportEvent::Message(partial)).await.is_err() {
                break;
            }

            tokio::time::sleep(jitter(&timing.finalize_delay_ms)).await;
            if ReadyState::from_code(ready_state.load(Ordering::SeqCst)) != ReadyState::Open {
                break;
            }

            let full = Self::transcription(line.to_string(), 0.95, true);
            if tx.send(TransportEvent::Message(full)).await.is_err() {
                break;
            }
        }

        debug!("mock transport: script exhausted");
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(64);

        info!("mock transport: opening simulated connection");

        {
            let mut guard = self.events_tx.lock().await;
            *guard = Some(tx.clone());
        }

        let task = tokio::spawn(Self::run_script(
            self.timing.clone(),
            self.session_id.clone(),
            Arc::clone(&self.ready_state),
            tx,
        ));

        {
            let mut guard = self.script_task.lock().await;
            *guard = Some(task);
        }

        Ok(rx)
    }

    async fn send(&self, message: ClientMessage) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            bail!("mock transport is not open");
        }

        debug!("mock transport: received {:?}", message);

        let tx = {
            let guard = self.events_tx.lock().await;
            guard.clone()
        };
        let Some(tx) = tx else {
            bail!("mock transport has no event channel");
        };

        let delay = jitter(&self.timing.send_delay_ms);
        let session_id = self.session_id.clone();
        let ready_state = Arc::clone(&self.ready_state);

        // Reply off the caller's path, like a real socket would
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if ReadyState::from_code(ready_state.load(Ordering::SeqCst)) != ReadyState::Open {
                return;
            }
            match message {
                ClientMessage::ConversationInitiation { .. } => {
                    let reply = ServerMessage::Connection {
                        status: ConnectionStatus::Connected,
                        session_id,
                    };
                    if tx.send(TransportEvent::Message(reply)).await.is_err() {
                        warn!("mock transport: consumer dropped before reply");
                    }
                }
            }
        });

        Ok(())
    }

    async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        let code = code.unwrap_or(1000);
        let reason = reason.unwrap_or("mock connection closed").to_string();

        info!("mock transport: closing (code={}, reason={})", code, reason);

        self.ready_state
            .store(ReadyState::Closing.code(), Ordering::SeqCst);

        {
            let mut guard = self.script_task.lock().await;
            if let Some(task) = guard.take() {
                task.abort();
            }
        }

        tokio::time::sleep(Duration::from_millis(self.timing.close_delay_ms)).await;

        self.ready_state
            .store(ReadyState::Closed.code(), Ordering::SeqCst);

        let tx = {
            let mut guard = self.events_tx.lock().await;
            guard.take()
        };
        if let Some(tx) = tx {
            let _ = tx
                .send(TransportEvent::Closed {
                    code,
                    reason,
                    clean: true,
                })
                .await;
        }

        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_code(self.ready_state.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Random duration inside a millisecond range. The rng never lives across
/// an await point.
fn jitter(range: &Range<u64>) -> Duration {
    if range.is_empty() {
        return Duration::from_millis(range.start);
    }
    Duration::from_millis(rand::thread_rng().gen_range(range.clone()))
}
