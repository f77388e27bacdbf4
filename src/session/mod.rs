//! Voice session management
//!
//! This module provides the `VoiceSession` lifecycle controller that manages:
//! - Connection lifecycle (start / stop / force-stop)
//! - Speaking and listening state derivation
//! - The safety timer (countdown with forced stop, or elapsed display)
//! - Error capture and cleanup on every exit path

mod config;
mod controller;
mod state;

pub use config::SessionConfig;
pub use controller::VoiceSession;
pub use state::{SessionState, TranscriptSegment};
