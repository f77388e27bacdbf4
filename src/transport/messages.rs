use serde::{Deserialize, Serialize};

/// Message received from the provider socket (real or mock)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Transcription { transcription: Transcription },
    Connection { status: ConnectionStatus, session_id: String },
    Audio { audio_data: String, sample_rate: u32 },
}

/// A single speech-to-text result. Partial results carry a prefix of the
/// final text and `is_final = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Message sent to the provider socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConversationInitiation {
        agent_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
}
