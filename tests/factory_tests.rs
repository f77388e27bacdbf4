use voice_orb::config::TransportConfig;
use voice_orb::transport::{create_transport, mock_override, Transport};

fn transport_config(use_mock: bool, override_path: &str) -> TransportConfig {
    TransportConfig {
        url: "wss://api.provider.example/v1/convai/conversation".to_string(),
        use_mock,
        override_path: override_path.to_string(),
    }
}

#[test]
fn test_config_flag_selects_mock() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("override");
    let cfg = transport_config(true, marker.to_str().unwrap());

    let transport = create_transport(&cfg);
    assert_eq!(transport.name(), "mock");
}

#[test]
fn test_default_selects_real_socket() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("override");
    let cfg = transport_config(false, marker.to_str().unwrap());

    let transport = create_transport(&cfg);
    assert_eq!(transport.name(), "websocket");
}

#[test]
fn test_persisted_override_selects_mock() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("override");
    let cfg = transport_config(false, marker.to_str().unwrap());

    mock_override::enable(&marker).unwrap();
    assert!(mock_override::is_enabled(&marker));
    assert_eq!(create_transport(&cfg).name(), "mock");

    mock_override::disable(&marker).unwrap();
    assert!(!mock_override::is_enabled(&marker));
    assert_eq!(create_transport(&cfg).name(), "websocket");
}

#[test]
fn test_disable_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("override");

    mock_override::disable(&marker).unwrap();
    mock_override::disable(&marker).unwrap();
    assert!(!mock_override::is_enabled(&marker));
}
