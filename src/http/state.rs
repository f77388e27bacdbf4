use crate::session::VoiceSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one voice-session controller behind the widget
    pub session: Arc<VoiceSession>,
}

impl AppState {
    pub fn new(session: Arc<VoiceSession>) -> Self {
        Self { session }
    }
}
