//! 连接状态机

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ClientError;
use crate::notification::Notification;

/// 同步会话状态
///
/// ```text
/// Idle → Connecting → Live ⇄ Reconnecting → Disconnected
///                                   ↑              │ retry()
///                                   └── Connecting ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Connecting,
    Live,
    Reconnecting { attempt: u32 },
    /// 重连次数用尽
    Disconnected,
}

impl SyncState {
    pub fn is_live(&self) -> bool {
        matches!(self, SyncState::Live)
    }

    /// UI 连接指示器文案
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Connecting => "connecting",
            SyncState::Live => "live",
            SyncState::Reconnecting { .. } => "reconnecting",
            SyncState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            other => f.write_str(other.label()),
        }
    }
}

/// 可关闭的错误横幅
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBanner {
    pub error: ClientError,
    pub at: DateTime<Utc>,
}

impl ErrorBanner {
    pub fn new(error: ClientError) -> Self {
        Self { error, at: Utc::now() }
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// 控制器广播给视图的变更
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    StateChanged(SyncState),
    /// 新的未读通知到达（用于 Toast）
    Arrived(Notification),
    /// 列表或未读数发生变化
    StoreChanged { unread: usize, total: usize },
    Error(ErrorBanner),
}
