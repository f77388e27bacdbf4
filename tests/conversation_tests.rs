use std::sync::Arc;
use std::time::Duration;
use voice_orb::agent::Conversation;
use voice_orb::config::TransportConfig;
use voice_orb::session::{SessionConfig, VoiceSession};

fn mock_transport_config() -> TransportConfig {
    TransportConfig {
        url: "wss://api.provider.example/v1/convai/conversation".to_string(),
        use_mock: true,
        override_path: "/nonexistent/.use-mock-transport".to_string(),
    }
}

/// End to end through the real Conversation client and the mock transport:
/// start, wait for the simulated handshake, stop, land back on idle.
#[tokio::test]
async fn test_session_connects_through_mock_transport() {
    let client = Arc::new(Conversation::new(mock_transport_config(), None));
    let config = SessionConfig {
        agent_id: "agent-1".to_string(),
        ..SessionConfig::default()
    };
    let session = VoiceSession::new(config, client);

    session.start().await.unwrap();
    assert!(session.state().await.processing);

    // The mock opens after 100-600ms and announces a session id
    let mut connected = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = session.state().await;
        if state.connected {
            assert!(state.session_id.is_some());
            assert!(!state.processing);
            connected = true;
            break;
        }
    }
    assert!(connected, "mock handshake never completed");

    session.stop().await.unwrap();

    let state = session.state().await;
    assert!(!state.is_active());
    assert!(state.error.is_none());
}
