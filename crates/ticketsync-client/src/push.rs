//! Push channel transport
//!
//! A push channel delivers raw text frames until it closes or errors. The
//! session treats `None` from [`PushChannel::recv`] as a close and `Some(Err)`
//! as a transport error; both end the channel.

use async_trait::async_trait;
use futures::StreamExt;
use ticketsync_core::{Error, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

/// An open push channel
#[async_trait]
pub trait PushChannel: Send {
    /// Next inbound text frame; `None` once the channel has closed
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the channel
    async fn close(&mut self);
}

/// Opens push channels
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushChannel>>;
}

/// Push connector speaking WebSocket
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushChannel>> {
        let (ws, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::channel_init(e.to_string()))?;

        debug!("Push channel opened to {} ({})", url, response.status());
        Ok(Box::new(WebSocketChannel { ws }))
    }
}

/// WebSocket-backed push channel
pub struct WebSocketChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("Dropping non-UTF-8 binary push frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!("Push channel closed by peer: {:?}", frame);
                    return None;
                }
                Ok(other) => trace!("Ignoring control frame: {:?}", other),
                Err(e) => return Some(Err(Error::channel_dropped(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("Error closing push channel: {}", e);
        }
    }
}
