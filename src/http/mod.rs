//! HTTP API for the front end
//!
//! This module provides the control surface the page's voice widget talks to:
//! - POST /voice/start - Start the voice session
//! - POST /voice/stop - Gracefully stop it
//! - POST /voice/force-stop - Reset immediately, bounded disconnect
//! - GET /voice/status - Observable session state
//! - GET /voice/transcript - Accumulated transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
