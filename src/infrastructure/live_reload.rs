use crate::core::{interfaces::ReloadSink, models::ReloadKind};
use crate::utils::{Logger, Result, SluiceError};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

/// Message pushed to browsers over the reload socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReloadMessage {
    Connected,
    Reload,
    Css { path: String },
}

impl ReloadMessage {
    /// JSON text frame sent to the browser
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SluiceError::Server(format!("cannot encode reload message: {}", e)))
    }
}

impl From<ReloadKind> for ReloadMessage {
    fn from(kind: ReloadKind) -> Self {
        match kind {
            ReloadKind::Full => ReloadMessage::Reload,
            ReloadKind::Css { path } => ReloadMessage::Css { path },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReloadClient {
    pub id: String,
    pub connected_at: SystemTime,
}

/// WebSocket hub that fans reload messages out to every connected browser
#[derive(Clone)]
pub struct LiveReloadHub {
    clients: Arc<DashMap<String, ReloadClient>>,
    sender: broadcast::Sender<ReloadMessage>,
}

impl LiveReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);

        Self {
            clients: Arc::new(DashMap::new()),
            sender,
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the message
    pub fn broadcast(&self, message: ReloadMessage) -> usize {
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            // Nobody is listening
            Err(_) => 0,
        }
    }

    pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
        let addr = format!("{}:{}", host, port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| SluiceError::Server(format!("live reload bind {} failed: {}", addr, e)))
    }

    /// Accept WebSocket clients until the listener fails
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            Logger::info(&format!("🔄 Live reload listening on ws://{}", addr));
        }

        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| SluiceError::Server(format!("live reload accept failed: {}", e)))?;

            let hub = self.clone();
            tokio::spawn(async move {
                if let Err(e) = hub.handle_client(stream).await {
                    Logger::warn(&format!("Live reload client error {}: {}", addr, e));
                }
            });
        }
    }

    async fn handle_client(&self, stream: TcpStream) -> Result<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| SluiceError::Server(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut updates = self.sender.subscribe();
        let client_id = Uuid::new_v4().to_string();

        self.clients.insert(
            client_id.clone(),
            ReloadClient {
                id: client_id.clone(),
                connected_at: SystemTime::now(),
            },
        );
        Logger::debug(&format!("🔌 Live reload client connected: {}", client_id));

        let result = async {
            Self::send(&mut ws_sender, &ReloadMessage::Connected).await?;

            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Ok(message) => Self::send(&mut ws_sender, &message).await?,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    incoming = ws_receiver.next() => match incoming {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }

            Ok::<(), SluiceError>(())
        }
        .await;

        if let Some((_, client)) = self.clients.remove(&client_id) {
            let connected_for = client.connected_at.elapsed().unwrap_or_default();
            Logger::debug(&format!(
                "🔌 Live reload client disconnected: {} after {:.1}s",
                client.id,
                connected_for.as_secs_f64()
            ));
        }

        result
    }

    async fn send<S>(sink: &mut S, message: &ReloadMessage) -> Result<()>
    where
        S: futures::Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let text = message.encode()?;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| SluiceError::Server(format!("WebSocket send failed: {}", e)))
    }
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSink for LiveReloadHub {
    fn reload(&self, kind: ReloadKind) {
        let message = ReloadMessage::from(kind);
        let receivers = self.broadcast(message.clone());
        Logger::debug(&format!("🔄 Reload {:?} sent to {} client(s)", message, receivers));
    }
}
