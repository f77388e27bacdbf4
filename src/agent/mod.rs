//! Conversational-AI session boundary
//!
//! The provider's session primitive is opaque: speech recognition, language
//! reasoning and voice synthesis all happen on its side. This module owns
//! only the seam - a `ConversationClient` the controller connects through,
//! and the `SessionEvent` stream it observes.

mod conversation;

pub use conversation::Conversation;

use crate::session::TranscriptSegment;
use anyhow::Result;
use tokio::sync::mpsc;

/// Event emitted by a live conversation session.
///
/// One variant per provider callback, delivered in provider order; the
/// controller overwrites state on each event and never reorders or buffers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Handshake complete; the remote session is live
    Connected { session_id: String },
    /// The remote session ended
    Disconnected,
    /// A speech-to-text result (partial or final)
    Transcript(TranscriptSegment),
    /// The agent's synthesized speech started playing
    AgentStartedSpeaking,
    AgentStoppedSpeaking,
    /// The user's microphone is producing speech
    UserStartedSpeaking,
    UserStoppedSpeaking,
    /// The session failed; no further events follow
    Error(String),
}

/// Connect/disconnect primitive for a conversation session.
///
/// The controller holds exactly one client and never hands it to anything
/// else. Tests substitute a scripted implementation.
#[async_trait::async_trait]
pub trait ConversationClient: Send + Sync {
    /// Open a session with the given agent and return its event stream
    async fn connect(&self, agent_id: &str) -> Result<mpsc::Receiver<SessionEvent>>;

    /// Request graceful termination of the current session
    async fn disconnect(&self) -> Result<()>;
}
