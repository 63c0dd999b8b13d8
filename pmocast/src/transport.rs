//! Message transports used by the command channel.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::trace;
use url::Url;

use crate::errors::{CastError, Result};

/// Opens text-message connections to a cast target.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>>;
}

/// One open connection. `recv` returns `None` once the peer closed it.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, text: String) -> Result<()>;
    async fn recv(&mut self) -> Option<Result<String>>;
    async fn close(&mut self);
}

/// Production transport over `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>> {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "websocket closed by peer");
                    return None;
                }
                // Pings are answered by tungstenite on the next write.
                Ok(_) => continue,
                Err(e) => return Some(Err(CastError::from(e))),
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
