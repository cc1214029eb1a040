//! WebSocket 推送通道（tokio-tungstenite）

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{PushConnector, PushStream, RawFrame};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// WebSocket 连接工厂
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: ClientConfig,
}

impl WsConnector {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn open(&self, user_id: &str) -> Result<Box<dyn PushStream>, TransportError> {
        let url = self
            .config
            .push_url_for(user_id)
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Some(token) = &self.config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TransportError::Connect(format!("invalid access token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(url = %url, status = response.status().as_u16(), "WebSocket connected");

        Ok(Box::new(WsStream { socket }))
    }
}

struct WsStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<RawFrame, TransportError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(RawFrame::text(text))),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map(RawFrame::text)
                            .map_err(|e| TransportError::Codec(format!("binary frame is not utf-8: {}", e))),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket close frame received");
                    return None;
                }
                // Ping/Pong 由 tungstenite 自动处理
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Closed(e.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}
