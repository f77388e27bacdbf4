pub mod agent;
pub mod config;
pub mod http;
pub mod session;
pub mod transport;

pub use agent::{Conversation, ConversationClient, SessionEvent};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{SessionConfig, SessionState, TranscriptSegment, VoiceSession};
pub use transport::{
    create_transport, ClientMessage, MockTiming, MockTransport, ReadyState, ServerMessage,
    Transport, TransportEvent, WsTransport,
};
