use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use voice_orb::agent::{ConversationClient, SessionEvent};
use voice_orb::session::{SessionConfig, TranscriptSegment, VoiceSession};

/// Scripted conversation client: the test pushes events through the sender
/// the controller received from `connect`.
struct FakeClient {
    sender: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    hang_disconnect: bool,
}

impl FakeClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(None),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            hang_disconnect: false,
        })
    }

    fn hung() -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(None),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            hang_disconnect: true,
        })
    }

    async fn emit(&self, event: SessionEvent) {
        let guard = self.sender.lock().await;
        guard
            .as_ref()
            .expect("connect was not called")
            .send(event)
            .await
            .expect("controller dropped its event stream");
    }
}

#[async_trait::async_trait]
impl ConversationClient for FakeClient {
    async fn connect(&self, _agent_id: &str) -> Result<mpsc::Receiver<SessionEvent>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().await = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.hang_disconnect {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn test_config() -> SessionConfig {
    SessionConfig {
        agent_id: "agent-1".to_string(),
        stop_timeout: Duration::from_millis(200),
        timer_tick: Duration::from_millis(25),
        ..SessionConfig::default()
    }
}

/// Let the controller's event task drain what we just emitted
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn segment(text: &str, partial: bool) -> TranscriptSegment {
    TranscriptSegment {
        text: text.to_string(),
        timestamp: chrono::Utc::now(),
        confidence: Some(0.95),
        partial,
    }
}

#[tokio::test]
async fn test_full_round_trip_returns_to_idle() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    let state = session.state().await;
    assert!(state.processing);
    assert!(!state.connected);

    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    settle().await;

    let state = session.state().await;
    assert!(state.connected);
    assert!(state.listening);
    assert!(!state.processing);
    assert_eq!(state.session_id.as_deref(), Some("s-1"));
    assert_eq!(state.remaining_secs, Some(180));

    client.emit(SessionEvent::AgentStartedSpeaking).await;
    settle().await;
    let state = session.state().await;
    assert!(state.speaking);
    assert!(!state.listening);

    client
        .emit(SessionEvent::Transcript(segment("Hello there", false)))
        .await;
    client.emit(SessionEvent::AgentStoppedSpeaking).await;
    settle().await;
    let state = session.state().await;
    assert!(!state.speaking);
    assert!(state.listening);
    assert_eq!(session.transcript().await.len(), 1);

    session.stop().await.unwrap();

    let state = session.state().await;
    assert!(!state.connected);
    assert!(!state.listening);
    assert!(!state.speaking);
    assert!(!state.processing);
    assert!(state.error.is_none());
    assert_eq!(state.remaining_secs, None);
    assert_eq!(state.elapsed_secs, 0);
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_user_speaking_suppresses_listening() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    client.emit(SessionEvent::UserStartedSpeaking).await;
    settle().await;

    let state = session.state().await;
    assert!(state.connected);
    assert!(!state.listening);
    assert!(!state.speaking);

    client.emit(SessionEvent::UserStoppedSpeaking).await;
    settle().await;
    assert!(session.state().await.listening);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_while_active_is_a_noop() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    settle().await;

    // Second start must not disturb the live session
    session.start().await.unwrap();
    settle().await;

    assert_eq!(client.connects.load(Ordering::SeqCst), 1);
    assert!(session.state().await.connected);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_twice_is_idempotent() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.stop().await.unwrap();
    session.stop().await.unwrap();

    let state = session.state().await;
    assert!(!state.is_active());
    assert!(state.error.is_none());
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_force_stop_bounded_by_timeout_against_hung_disconnect() {
    let client = FakeClient::hung();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    settle().await;
    assert!(session.state().await.connected);

    let started = Instant::now();
    session.force_stop().await.unwrap();
    let took = started.elapsed();

    // stop_timeout is 200ms; the hung disconnect must not block past it
    assert!(took < Duration::from_secs(2), "force_stop took {:?}", took);
    assert!(!session.state().await.is_active());
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_countdown_forces_stop_at_zero() {
    let client = FakeClient::new();
    let config = SessionConfig {
        budget_secs: Some(3),
        ..test_config()
    };
    let session = VoiceSession::new(config, client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    settle().await;
    assert_eq!(session.state().await.remaining_secs, Some(3));

    // 3 ticks at 25ms plus slack
    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = session.state().await;
    assert!(!state.is_active(), "budget expiry must return to idle");
    assert_eq!(state.remaining_secs, None);
    assert!(client.disconnects.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_elapsed_counter_without_budget() {
    let client = FakeClient::new();
    let config = SessionConfig {
        budget_secs: None,
        ..test_config()
    };
    let session = VoiceSession::new(config, client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = session.state().await;
    assert!(state.connected, "no budget means no forced stop");
    assert!(state.elapsed_secs >= 2, "elapsed ticks should accumulate");
    assert_eq!(state.remaining_secs, None);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_error_event_records_message_and_idles() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    client
        .emit(SessionEvent::Error("connection lost".to_string()))
        .await;
    settle().await;

    let state = session.state().await;
    assert_eq!(state.error.as_deref(), Some("connection lost"));
    assert!(!state.connected);
    assert!(!state.processing);
    assert!(!state.speaking);

    // The stop affordance clears the lingering error
    session.stop().await.unwrap();
    assert!(session.state().await.error.is_none());
}

#[tokio::test]
async fn test_disconnect_event_resets_state() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    client.emit(SessionEvent::Disconnected).await;
    settle().await;

    let state = session.state().await;
    assert!(!state.is_active());
    assert!(state.error.is_none());
    assert_eq!(state.session_id, None);
}

#[tokio::test]
async fn test_missing_agent_id_fails_before_connecting() {
    let client = FakeClient::new();
    let config = SessionConfig {
        agent_id: String::new(),
        ..test_config()
    };
    let session = VoiceSession::new(config, client.clone());

    assert!(session.test_connection().is_err());
    assert!(session.start().await.is_err());

    let state = session.state().await;
    assert!(state.error.is_some());
    assert!(!state.processing);
    assert_eq!(client.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_runs_cleanup_exactly_once() {
    let client = FakeClient::new();
    let session = VoiceSession::new(test_config(), client.clone());

    session.start().await.unwrap();
    client
        .emit(SessionEvent::Connected {
            session_id: "s-1".to_string(),
        })
        .await;
    settle().await;

    session.shutdown().await;
    session.shutdown().await;

    assert!(!session.state().await.is_active());
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
}
