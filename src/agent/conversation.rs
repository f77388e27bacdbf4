use super::{ConversationClient, SessionEvent};
use crate::config::TransportConfig;
use crate::session::TranscriptSegment;
use crate::transport::{
    create_transport, ClientMessage, ConnectionStatus, ServerMessage, Transport, TransportEvent,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Production `ConversationClient`: builds a transport per connection
/// attempt, performs the initiation handshake, and translates transport
/// events into session events in a background task.
pub struct Conversation {
    transport_config: TransportConfig,
    api_key: Option<String>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    translator_task: Mutex<Option<JoinHandle<()>>>,
}

impl Conversation {
    pub fn new(transport_config: TransportConfig, api_key: Option<String>) -> Self {
        Self {
            transport_config,
            api_key,
            transport: Mutex::new(None),
            translator_task: Mutex::new(None),
        }
    }

    /// Translate transport events into session events until the socket
    /// closes or fails.
    ///
    /// The wire protocol carries no explicit speaking markers, so agent
    /// speech is derived from the transcription stream: a partial result
    /// means the agent is audible, the final result ends the utterance.
    async fn run_translator(
        mut transport_events: mpsc::Receiver<TransportEvent>,
        transport: Arc<dyn Transport>,
        initiation: ClientMessage,
        tx: mpsc::Sender<SessionEvent>,
    ) {
        let mut agent_speaking = false;

        while let Some(event) = transport_events.recv().await {
            match event {
                TransportEvent::Opened => {
                    debug!("transport open; sending conversation initiation");
                    if let Err(e) = transport.send(initiation.clone()).await {
                        warn!("initiation message not sent: {:#}", e);
                    }
                }
                TransportEvent::Message(message) => match message {
                    ServerMessage::Connection { status, session_id } => {
                        let event = match status {
                            ConnectionStatus::Connected => SessionEvent::Connected { session_id },
                            ConnectionStatus::Disconnected => SessionEvent::Disconnected,
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    ServerMessage::Transcription { transcription } => {
                        if !transcription.is_final && !agent_speaking {
                            agent_speaking = true;
                            if tx.send(SessionEvent::AgentStartedSpeaking).await.is_err() {
                                break;
                            }
                        }

                        let segment = TranscriptSegment {
                            text: transcription.text,
                            timestamp: chrono::Utc::now(),
                            confidence: Some(transcription.confidence),
                            partial: !transcription.is_final,
                        };
                        if tx.send(SessionEvent::Transcript(segment)).await.is_err() {
                            break;
                        }

                        if transcription.is_final && agent_speaking {
                            agent_speaking = false;
                            if tx.send(SessionEvent::AgentStoppedSpeaking).await.is_err() {
                                break;
                            }
                        }
                    }
                    ServerMessage::Audio { .. } => {
                        if !agent_speaking {
                            agent_speaking = true;
                            if tx.send(SessionEvent::AgentStartedSpeaking).await.is_err() {
                                break;
                            }
                        }
                    }
                },
                TransportEvent::Closed { code, reason, .. } => {
                    info!("transport closed (code={}, reason={})", code, reason);
                    let _ = tx.send(SessionEvent::Disconnected).await;
                    break;
                }
                TransportEvent::Failed(message) => {
                    let _ = tx.send(SessionEvent::Error(message)).await;
                    break;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ConversationClient for Conversation {
    async fn connect(&self, agent_id: &str) -> Result<mpsc::Receiver<SessionEvent>> {
        let mut transport = create_transport(&self.transport_config);

        let transport_events = transport
            .open()
            .await
            .context("failed to open provider transport")?;

        let transport: Arc<dyn Transport> = Arc::from(transport);
        {
            let mut guard = self.transport.lock().await;
            *guard = Some(Arc::clone(&transport));
        }

        let initiation = ClientMessage::ConversationInitiation {
            agent_id: agent_id.to_string(),
            api_key: self.api_key.clone(),
        };

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(Self::run_translator(
            transport_events,
            transport,
            initiation,
            tx,
        ));
        {
            let mut guard = self.translator_task.lock().await;
            if let Some(prev) = guard.take() {
                prev.abort();
            }
            *guard = Some(task);
        }

        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        let transport = {
            let mut guard = self.transport.lock().await;
            guard.take()
        };

        let Some(transport) = transport else {
            debug!("disconnect with no live transport");
            return Ok(());
        };

        transport
            .close(None, Some("client disconnect"))
            .await
            .context("failed to close provider transport")?;

        // The close event lets the translator emit Disconnected and finish
        if let Some(task) = self.translator_task.lock().await.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("translator task panicked: {}", e);
                }
            }
        }

        Ok(())
    }
}
