//! SSE 推送通道（reqwest 字节流）
//!
//! SSE 是单向通道，不支持心跳发送；断线检测依赖 TCP 关闭和空闲读超时
//! （两个心跳周期内没有任何字节，包括服务端的注释保活行）。

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::info;

use super::{PushConnector, PushStream, RawFrame};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// SSE 连接工厂
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: Client,
    config: ClientConfig,
}

impl SseConnector {
    /// 推送连接是长连接，不设置整体请求超时
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl PushConnector for SseConnector {
    fn name(&self) -> &str {
        "sse"
    }

    async fn open(&self, user_id: &str) -> Result<Box<dyn PushStream>, TransportError> {
        let url = self
            .config
            .push_url_for(user_id)
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut request = self.client.get(url.clone()).header(ACCEPT, "text/event-stream");
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Connect(format!("server responded {}", status.as_u16())));
        }
        info!(url = %url, "SSE stream opened");

        let body = response.bytes_stream().map(|chunk| chunk.map(|bytes| bytes.to_vec()));
        Ok(Box::new(SseStream::new(Box::pin(body), idle_timeout(self.config.heartbeat_interval))))
    }
}

/// 空闲超时为两个心跳周期；心跳关闭时不检测
fn idle_timeout(heartbeat: Duration) -> Option<Duration> {
    (!heartbeat.is_zero()).then(|| heartbeat * 2)
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

struct SseStream {
    body: ByteStream,
    parser: SseParser,
    ready: VecDeque<RawFrame>,
    idle_timeout: Option<Duration>,
}

impl SseStream {
    fn new(body: ByteStream, idle_timeout: Option<Duration>) -> Self {
        Self {
            body,
            parser: SseParser::default(),
            ready: VecDeque::new(),
            idle_timeout,
        }
    }
}

#[async_trait]
impl PushStream for SseStream {
    async fn next_frame(&mut self) -> Option<Result<RawFrame, TransportError>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            let chunk = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.body.next()).await {
                    Ok(chunk) => chunk?,
                    Err(_) => {
                        return Some(Err(TransportError::Closed(format!(
                            "no data for {}s",
                            limit.as_secs_f32()
                        ))))
                    }
                },
                None => self.body.next().await?,
            };
            match chunk {
                Ok(chunk) => self.ready.extend(self.parser.feed(&chunk)),
                Err(e) => return Some(Err(TransportError::Closed(e.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("client-to-server send"))
    }

    fn supports_heartbeat(&self) -> bool {
        false
    }

    async fn close(&mut self) {
        self.ready.clear();
    }
}

/// 增量 SSE 解析器
///
/// 按 `text/event-stream` 格式处理 `event:` / `data:` / 注释行，
/// 空行分发事件。输入可以在任意字节处被切开。
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一段字节，返回已完整的事件
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry 不参与解码
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawFrame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_stream_is_closed_after_timeout() {
        let body: ByteStream = Box::pin(futures::stream::pending::<Result<Vec<u8>, reqwest::Error>>());
        let mut stream = SseStream::new(body, Some(Duration::from_millis(20)));

        let frame = stream.next_frame().await;
        assert!(matches!(frame, Some(Err(TransportError::Closed(_)))));
    }

    #[tokio::test]
    async fn test_keepalive_comments_skipped_before_data() {
        let chunks: Vec<Result<Vec<u8>, reqwest::Error>> = vec![
            Ok(b": keepalive\n\n".to_vec()),
            Ok(b"data: {\"type\":\"PONG\"}\n\n".to_vec()),
        ];
        let body: ByteStream = Box::pin(futures::stream::iter(chunks));
        let mut stream = SseStream::new(body, Some(Duration::from_millis(200)));

        let frame = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, RawFrame::text(r#"{"type":"PONG"}"#));
        assert!(stream.next_frame().await.is_none());
    }

    #[test]
    fn test_idle_timeout_follows_heartbeat() {
        assert_eq!(idle_timeout(Duration::from_secs(30)), Some(Duration::from_secs(60)));
        assert_eq!(idle_timeout(Duration::ZERO), None);
    }

    #[test]
    fn test_parse_named_event() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: notificacionLeida\ndata: {\"id\":\"n1\"}\n\n");
        assert_eq!(frames, vec![RawFrame::named("notificacionLeida", r#"{"id":"n1"}"#)]);
    }

    #[test]
    fn test_parse_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: nuevaNoti").is_empty());
        assert!(parser.feed(b"ficacion\r\ndata: {\"a\":").is_empty());
        let frames = parser.feed(b"1}\r\n\r\n");
        assert_eq!(frames, vec![RawFrame::named("nuevaNotificacion", r#"{"a":1}"#)]);
    }

    #[test]
    fn test_parse_multiline_data_and_comments() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b": keepalive\n\ndata: line1\ndata: line2\nid: 7\n\n");
        assert_eq!(frames, vec![RawFrame::text("line1\nline2")]);
    }

    #[test]
    fn test_event_name_resets_between_events() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: conectado\ndata: {}\n\ndata: {\"type\":\"PONG\"}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("conectado"));
        assert_eq!(frames[1].event, None);
    }

    #[test]
    fn test_event_without_data_is_ignored() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: ping\n\n").is_empty());
    }
}
