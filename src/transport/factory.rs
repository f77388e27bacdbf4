use super::{MockTiming, MockTransport, Transport, WsTransport};
use crate::config::TransportConfig;
use tracing::info;

/// Environment variable that selects the mock transport
pub const MOCK_ENV_VAR: &str = "VOICE_ORB_USE_MOCK";

/// Create the transport for one connection attempt.
///
/// The mock is selected when the config flag is set, the `VOICE_ORB_USE_MOCK`
/// environment variable is truthy, or the persisted override marker exists.
/// The choice is made once per attempt and is invisible to the caller.
pub fn create_transport(config: &TransportConfig) -> Box<dyn Transport> {
    if mock_selected(config) {
        info!("using mock transport");
        Box::new(MockTransport::new(MockTiming::default()))
    } else {
        info!("using real provider socket");
        Box::new(WsTransport::new(&config.url))
    }
}

fn mock_selected(config: &TransportConfig) -> bool {
    config.use_mock
        || env_flag()
        || mock_override::is_enabled(&config.override_path)
}

fn env_flag() -> bool {
    std::env::var(MOCK_ENV_VAR)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Persisted local override: a marker file toggling the mock transport on
/// this machine without touching config or environment.
pub mod mock_override {
    use anyhow::{Context, Result};
    use std::path::Path;

    pub fn enable(path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(&path, "1")
            .with_context(|| format!("failed to write override marker {:?}", path.as_ref()))?;
        tracing::info!("mock transport override enabled");
        Ok(())
    }

    pub fn disable(path: impl AsRef<Path>) -> Result<()> {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("mock transport override disabled");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove override marker {:?}", path.as_ref())
            }),
        }
    }

    pub fn is_enabled(path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }
}
