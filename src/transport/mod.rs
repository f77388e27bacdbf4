//! Transport boundary to the conversational-AI provider
//!
//! One `Transport` trait with two implementations:
//! - `MockTransport` - scripted development stand-in (no credentials needed)
//! - `WsTransport` - the real provider socket
//!
//! The factory picks one per connection attempt; callers never know which.

mod factory;
mod messages;
mod mock;
mod ws;

pub use factory::{create_transport, mock_override};
pub use messages::{ClientMessage, ConnectionStatus, ServerMessage, Transcription};
pub use mock::{MockTiming, MockTransport};
pub use ws::WsTransport;

use anyhow::Result;
use tokio::sync::mpsc;

/// Standard four-value socket lifecycle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Event delivered by a transport to its consumer
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket finished its handshake and is OPEN
    Opened,
    /// A decoded provider message arrived
    Message(ServerMessage),
    /// The socket closed
    Closed { code: u16, reason: String, clean: bool },
    /// The socket failed (connection error, decode error on a fatal frame)
    Failed(String),
}

/// Bidirectional socket to the provider
///
/// Implementations:
/// - Mock: scripted transcript replay for offline development
/// - WebSocket: the provider's real endpoint
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Begin the handshake
    ///
    /// Returns a channel receiver that will receive transport events,
    /// starting with `Opened` once the handshake completes.
    async fn open(&mut self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Send a message; errors unless the socket is OPEN
    async fn send(&self, message: ClientMessage) -> Result<()>;

    /// Close the socket with an optional code and reason
    async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()>;

    /// Current lifecycle state
    fn ready_state(&self) -> ReadyState;

    /// Transport name for logging
    fn name(&self) -> &str;
}
