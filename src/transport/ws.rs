use super::messages::{ClientMessage, ServerMessage};
use super::{ReadyState, Transport, TransportEvent};
use anyhow::{bail, Context, Result};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Real provider socket. Text frames carry JSON; the payload shape is the
/// provider's contract and is decoded into `ServerMessage` at this boundary.
pub struct WsTransport {
    url: String,
    ready_state: Arc<AtomicU8>,
    writer: Mutex<Option<WsSink>>,
    events_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ready_state: Arc::new(AtomicU8::new(ReadyState::Connecting.code())),
            writer: Mutex::new(None),
            events_tx: Mutex::new(None),
            reader_task: Mutex::new(None),
        }
    }

    async fn run_reader(
        mut read: futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
        ready_state: Arc<AtomicU8>,
        tx: mpsc::Sender<TransportEvent>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        if tx.send(TransportEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("undecodable provider frame: {}", e),
                },
                Ok(Message::Close(frame)) => {
                    ready_state.store(ReadyState::Closed.code(), Ordering::SeqCst);
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((1005, String::new()));
                    let _ = tx
                        .send(TransportEvent::Closed {
                            code,
                            reason,
                            clean: true,
                        })
                        .await;
                    break;
                }
                // Pings and pongs are answered by the library
                Ok(_) => {}
                Err(e) => {
                    ready_state.store(ReadyState::Closed.code(), Ordering::SeqCst);
                    let _ = tx.send(TransportEvent::Failed(e.to_string())).await;
                    break;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn open(&mut self) -> Result<mpsc::Receiver<TransportEvent>> {
        info!("connecting to provider socket at {}", self.url);

        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .context("failed to connect to provider socket")?;

        self.ready_state
            .store(ReadyState::Open.code(), Ordering::SeqCst);

        let (write, read) = stream.split();
        let (tx, rx) = mpsc::channel(64);

        tx.send(TransportEvent::Opened)
            .await
            .context("event channel closed before open")?;

        {
            let mut guard = self.writer.lock().await;
            *guard = Some(write);
        }
        {
            let mut guard = self.events_tx.lock().await;
            *guard = Some(tx.clone());
        }

        let task = tokio::spawn(Self::run_reader(
            read,
            Arc::clone(&self.ready_state),
            tx,
        ));
        {
            let mut guard = self.reader_task.lock().await;
            *guard = Some(task);
        }

        Ok(rx)
    }

    async fn send(&self, message: ClientMessage) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            bail!("provider socket is not open");
        }

        let payload = serde_json::to_string(&message)?;

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            bail!("provider socket has no writer");
        };

        writer
            .send(Message::Text(payload))
            .await
            .context("failed to send on provider socket")?;

        Ok(())
    }

    async fn close(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        let code = code.unwrap_or(1000);
        let reason = reason.unwrap_or("client disconnect").to_string();

        info!("closing provider socket (code={}, reason={})", code, reason);

        self.ready_state
            .store(ReadyState::Closing.code(), Ordering::SeqCst);

        {
            let mut guard = self.writer.lock().await;
            if let Some(mut writer) = guard.take() {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: Cow::Owned(reason.clone()),
                };
                if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                    warn!("close frame not delivered: {}", e);
                }
                let _ = writer.close().await;
            }
        }

        {
            let mut guard = self.reader_task.lock().await;
            if let Some(task) = guard.take() {
                task.abort();
            }
        }

        self.ready_state
            .store(ReadyState::Closed.code(), Ordering::SeqCst);

        let tx = {
            let mut guard = self.events_tx.lock().await;
            guard.take()
        };
        if let Some(tx) = tx {
            let _ = tx
                .send(TransportEvent::Closed {
                    code,
                    reason,
                    clean: true,
                })
                .await;
        }

        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_code(self.ready_state.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
