use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable snapshot of a voice session, recomputed on every event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Remote handshake has completed
    pub connected: bool,

    /// Connected and neither party is producing audio
    pub listening: bool,

    /// The agent's synthesized speech is playing
    pub speaking: bool,

    /// Connect handshake in flight (cleared on connect, error or timeout)
    pub processing: bool,

    /// Last failure, shown in place of normal status
    pub error: Option<String>,

    /// Provider session id, once connected
    pub session_id: Option<String>,

    /// When the session connected
    pub started_at: Option<DateTime<Utc>>,

    /// Countdown seconds left before the forced stop (countdown variant)
    pub remaining_secs: Option<u64>,

    /// Seconds since connect (count-up variant and display)
    pub elapsed_secs: u64,
}

impl SessionState {
    /// Anything but fully idle
    pub fn is_active(&self) -> bool {
        self.connected || self.listening || self.speaking || self.processing
    }

    /// The state a freshly constructed or fully stopped session reports
    pub fn idle() -> Self {
        Self {
            connected: false,
            listening: false,
            speaking: false,
            processing: false,
            error: None,
            session_id: None,
            started_at: None,
            remaining_secs: None,
            elapsed_secs: 0,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::idle()
    }
}

/// A single transcript segment from the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Transcribed text
    pub text: String,

    /// When this segment was received
    pub timestamp: DateTime<Utc>,

    /// Confidence score (0.0 to 1.0), if available
    pub confidence: Option<f32>,

    /// Whether this is a partial (interim) result
    pub partial: bool,
}
