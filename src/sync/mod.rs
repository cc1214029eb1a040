//! 同步层
//!
//! - `SyncController`: 单用户状态机，协调推送、REST 和存储
//! - `NotificationHub`: 按用户共享控制器，引用计数管理连接生命周期

pub mod controller;
pub mod hub;
pub mod state;

pub use controller::{ControllerOptions, FetchOutcome, MarkAllReport, SyncController, SyncSnapshot};
pub use hub::{NotificationHub, SessionHandle};
pub use state::{ErrorBanner, SyncState, SyncUpdate};
