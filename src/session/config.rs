use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Provider agent identifier (required; varies by locale)
    pub agent_id: String,

    /// Optional API credential; public agents connect without one
    pub api_key: Option<String>,

    /// Countdown budget in seconds. `Some(b)` forces a stop when the
    /// countdown reaches zero; `None` runs a display-only elapsed counter.
    pub budget_secs: Option<u64>,

    /// Bound for the force-stop race against a hung disconnect
    pub stop_timeout: Duration,

    /// Safety-timer tick period (one second; tests shrink it)
    pub timer_tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            api_key: None,
            budget_secs: Some(180),
            stop_timeout: Duration::from_secs(5),
            timer_tick: Duration::from_secs(1),
        }
    }
}
