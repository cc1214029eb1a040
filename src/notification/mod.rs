//! 通知核心 - 数据模型、过滤、存储
//!
//! # 组成
//! 1. `Notification` / `NotificationKind`：记录与类型，兼容后端西语字段
//! 2. `Priority`：显式或按类型推导的优先级
//! 3. `NotificationStore`：单用户内存列表，维护未读计数
//! 4. `SnapshotCache`：最近一次基线的本地 JSONL 快照
//!
//! # 使用示例
//! ```ignore
//! use rental_notify::notification::{NotificationStore, MergePolicy};
//!
//! let mut store = NotificationStore::with_policy(MergePolicy::KeepPosition);
//! store.replace_all(records);
//! store.mark_read("n1");
//! assert_eq!(store.unread_count(), store.recount());
//! ```

pub mod cache;
pub mod filter;
pub mod model;
pub mod priority;
pub mod store;

pub use cache::SnapshotCache;
pub use filter::{NotificationFilter, DEFAULT_PAGE_SIZE};
pub use model::{Notification, NotificationKind};
pub use priority::{priority_for, Priority};
pub use store::{MergePolicy, NotificationStore, UpsertOutcome};
