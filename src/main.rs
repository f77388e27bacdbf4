use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voice_orb::agent::Conversation;
use voice_orb::{create_router, AppState, Config, SessionConfig, VoiceSession};

#[derive(Parser)]
#[command(name = "voice-orb", version, about = "Voice session controller service")]
struct Cli {
    /// Config file path (extension resolved by the config crate)
    #[arg(long, default_value = "config/voice-orb")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control surface for the front end
    Serve,
    /// Drive one mock-backed conversation in the terminal
    Demo,
    /// Validate the configuration without connecting
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("voice-orb v{}", env!("CARGO_PKG_VERSION"));
    info!("loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Demo => demo(cfg).await,
        Command::Check => check(cfg),
    }
}

fn build_session(cfg: &Config, force_mock: bool) -> Arc<VoiceSession> {
    let mut transport_config = cfg.transport.clone();
    if force_mock {
        transport_config.use_mock = true;
    }

    let session_config = SessionConfig {
        agent_id: cfg.agent.agent_id.clone(),
        api_key: cfg.agent.api_key.clone(),
        budget_secs: cfg.session.budget_secs,
        ..SessionConfig::default()
    };

    let client = Arc::new(Conversation::new(
        transport_config,
        cfg.agent.api_key.clone(),
    ));

    Arc::new(VoiceSession::new(session_config, client))
}

async fn serve(cfg: Config) -> Result<()> {
    let session = build_session(&cfg, false);
    let state = AppState::new(Arc::clone(&session));
    let router = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            session.shutdown().await;
        })
        .await?;

    Ok(())
}

async fn demo(cfg: Config) -> Result<()> {
    let session = build_session(&cfg, true);

    info!("starting demo conversation (mock transport)");
    session.start().await?;

    let mut printed = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }

        let transcript = session.transcript().await;
        for segment in &transcript[printed..] {
            if segment.partial {
                print!("\r{}", segment.text);
                std::io::Write::flush(&mut std::io::stdout()).ok();
            } else {
                println!("\r{}", segment.text);
            }
        }
        printed = transcript.len();

        let state = session.state().await;
        if let Some(error) = &state.error {
            println!("\nsession error: {}", error);
            break;
        }
        if !state.is_active() {
            break;
        }
    }

    println!();
    session.shutdown().await;
    info!("demo finished");

    Ok(())
}

fn check(cfg: Config) -> Result<()> {
    let session = build_session(&cfg, false);
    session.test_connection()?;

    info!("agent id present: {}", cfg.agent.agent_id);
    info!(
        "api key: {}",
        if cfg.agent.api_key.is_some() {
            "configured"
        } else {
            "not set (public agent)"
        }
    );
    info!(
        "session budget: {}",
        match cfg.session.budget_secs {
            Some(b) => format!("{}s countdown", b),
            None => "elapsed-time only".to_string(),
        }
    );

    Ok(())
}
