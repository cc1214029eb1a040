//! Rental Notify - 租车平台通知同步客户端
//!
//! 模块划分：
//! - `notification`: 数据模型、通知存储、筛选、快照缓存
//! - `api`: REST 接口
//! - `transport`: WebSocket / SSE 推送通道、重连与心跳
//! - `sync`: 同步控制器与会话中心
//! - `view`: 铃铛、下拉框、面板、详情、Toast 的视图模型

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod notification;
pub mod sync;
pub mod transport;
pub mod view;

pub use api::{HttpNotificationApi, NotificationApi};
pub use config::{ClientConfig, TransportKind};
pub use error::{ClientError, ClientResult, SyncError, TransportError};
pub use notification::{
    MergePolicy, Notification, NotificationFilter, NotificationKind, NotificationStore, Priority, SnapshotCache,
};
pub use sync::{NotificationHub, SessionHandle, SyncController, SyncState, SyncUpdate};
pub use transport::{ReconnectPolicy, TransportAdapter, TransportEvent};
pub use view::{BellBadge, DropdownView, PanelView, ToastQueue, ViewBinder};
