use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub agent: AgentConfig,
    pub session: SessionBudgetConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Provider-side agent settings. The API key is optional: public agents
/// connect without one.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionBudgetConfig {
    /// Countdown budget in seconds. Omit to run an elapsed-time counter
    /// with no forced stop.
    pub budget_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Provider socket URL (payload contract belongs to the provider).
    pub url: String,

    /// Select the mock transport unconditionally.
    pub use_mock: bool,

    /// Marker file checked at connection time; its presence also selects
    /// the mock transport (persisted local override).
    pub override_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
