//! 错误分类
//!
//! - `TransportError`: 推送通道错误（断线、解析失败），驱动重连
//! - `SyncError`: REST 调用失败，以可关闭的横幅展示给 UI
//! - `ClientError::Conflict`: 乐观更新被服务端拒绝，通过回滚 + 重新拉取解决
//!
//! 本子系统中没有致命错误，最坏情况是显示"已断开"并提供重试入口。

use thiserror::Error;

/// 推送通道错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("channel closed: {0}")]
    Closed(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("malformed push frame: {0}")]
    Codec(String),

    #[error("server reported: {0}")]
    Server(String),

    #[error("reconnect gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),
}

/// REST 同步错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("{operation}: request failed: {message}")]
    Request { operation: &'static str, message: String },

    #[error("{operation}: server responded {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("{operation}: invalid response body: {message}")]
    Decode { operation: &'static str, message: String },
}

impl SyncError {
    /// HTTP 状态码（仅 `Status` 变体）
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 该状态码是否表示记录已不存在或状态冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self.status(), Some(404) | Some(409) | Some(410))
    }
}

/// 客户端对外暴露的统一错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{operation} on {id} rejected by server: {reason}")]
    Conflict {
        operation: &'static str,
        id: String,
        reason: String,
    },

    #[error("notification {id} belongs to user {owner}, not {user_id}")]
    ForeignRecord {
        id: String,
        owner: String,
        user_id: String,
    },

    #[error("session for {user_id} has been unmounted")]
    Unmounted { user_id: String },
}

impl ClientError {
    /// 是否可恢复（本子系统内恒为 true，保留给调用方做展示判断）
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ClientError::Unmounted { .. })
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
