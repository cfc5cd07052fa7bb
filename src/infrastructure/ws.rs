//! WebSocket transport adapter.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{ConnectionError, Result};
use crate::port::{StreamTransport, TransportEvent, TransportFactory};

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`StreamTransport`] over tokio-tungstenite.
pub struct WsTransport {
    url: String,
    socket: Option<WsSocket>,
}

impl WsTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: None,
        }
    }

    fn socket_mut(&mut self) -> Result<&mut WsSocket> {
        self.socket.as_mut().ok_or_else(|| {
            ConnectionError::NotConnected {
                url: self.url.clone(),
            }
            .into()
        })
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&mut self) -> Result<()> {
        let (socket, _response) = connect_async(&self.url).await.map_err(|e| {
            ConnectionError::ConnectFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(url = %self.url, "WebSocket connected");
        self.socket = Some(socket);
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let message = Message::Text(text.to_string());
        self.socket_mut()?.send(message).await?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.socket_mut()?.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let socket = self.socket.as_mut()?;
        loop {
            match socket.next().await? {
                Ok(Message::Text(text)) => return Some(TransportEvent::Text(text)),
                Ok(Message::Pong(_)) => return Some(TransportEvent::Pong),
                Ok(Message::Ping(payload)) => {
                    // Server-initiated keepalive; answer and keep reading.
                    if socket.send(Message::Pong(payload)).await.is_err() {
                        return Some(TransportEvent::Closed {
                            reason: "pong send failed".to_string(),
                        });
                    }
                }
                Ok(Message::Close(frame)) => {
                    return Some(TransportEvent::Closed {
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                Ok(_) => {}
                Err(error) => {
                    return Some(TransportEvent::Closed {
                        reason: error.to_string(),
                    });
                }
            }
        }
    }
}

/// Factory producing real WebSocket transports for the connection pool.
#[must_use]
pub fn ws_transport_factory() -> TransportFactory {
    Arc::new(|url| Box::new(WsTransport::new(url)))
}
