//! 推送通道层
//!
//! # 设计目标
//! 1. 统一接口：WebSocket 和 SSE 都实现 `PushConnector` / `PushStream`
//! 2. 每个用户会话只维护一条连接，由 `TransportAdapter` 负责重连和心跳
//! 3. 原始帧在适配器里解码为类型化事件，坏帧记录日志后丢弃
//!
//! # 使用示例
//! ```ignore
//! use rental_notify::transport::{TransportAdapter, WsConnector};
//!
//! let connector = Arc::new(WsConnector::new(&config));
//! let (adapter, mut events) = TransportAdapter::new(connector, config.reconnect, config.heartbeat_interval);
//! adapter.connect("u1");
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod adapter;
pub mod backoff;
pub mod codec;
pub mod sse;
pub mod ws;

use async_trait::async_trait;

use crate::error::TransportError;

pub use adapter::{TransportAdapter, TransportEvent, TransportEvents};
pub use backoff::ReconnectPolicy;
pub use codec::PushEvent;
pub use sse::SseConnector;
pub use ws::WsConnector;

/// 通道上收到的一帧原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// SSE 事件名；WebSocket 帧为 None
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// 已建立的推送连接
#[async_trait]
pub trait PushStream: Send {
    /// 读取下一帧；`None` 表示连接已关闭
    ///
    /// 返回 `TransportError::Codec` 的帧会被丢弃，其它错误视为断线。
    async fn next_frame(&mut self) -> Option<Result<RawFrame, TransportError>>;

    /// 发送文本帧（心跳）
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// 是否支持客户端 → 服务端发送（SSE 为单向通道）
    fn supports_heartbeat(&self) -> bool {
        true
    }

    /// 主动关闭
    async fn close(&mut self);
}

/// 推送连接工厂
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// 通道名称（用于日志）
    fn name(&self) -> &str;

    /// 为指定用户建立连接
    async fn open(&self, user_id: &str) -> Result<Box<dyn PushStream>, TransportError>;
}
