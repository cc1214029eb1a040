//! REST 接口抽象
//!
//! 同步控制器只依赖 `NotificationApi` trait，生产环境使用 `HttpNotificationApi`，
//! 测试使用内存实现。

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::notification::{Notification, NotificationFilter};

pub use http::HttpNotificationApi;

/// 全量拉取时最多翻的页数
pub const MAX_SNAPSHOT_PAGES: usize = 50;

/// 面板分页结果 `GET /notifications/panel/{userId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelPage {
    #[serde(default, alias = "notificaciones")]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub limit: usize,
}

/// 下拉框结果 `GET /notifications/dropdown/{userId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownPage {
    #[serde(default, alias = "notificaciones")]
    pub notifications: Vec<Notification>,
    #[serde(default, alias = "totalNoLeidas")]
    pub total_unread: usize,
    #[serde(default)]
    pub has_more: bool,
}

/// 未读数 `GET /notifications/unread-count/{userId}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: usize,
}

/// 通知 REST 接口
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// 分页 + 过滤查询
    async fn fetch_panel(&self, user_id: &str, filter: &NotificationFilter) -> Result<PanelPage, SyncError>;

    /// 单条详情
    async fn fetch_detail(&self, user_id: &str, id: &str) -> Result<Notification, SyncError>;

    /// 标记已读，服务端可能返回更新后的记录
    async fn mark_read(&self, user_id: &str, id: &str) -> Result<Option<Notification>, SyncError>;

    /// 删除
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), SyncError>;

    /// 服务端未读数
    async fn unread_count(&self, user_id: &str) -> Result<usize, SyncError>;

    /// 下拉框前 N 条
    async fn fetch_dropdown(&self, user_id: &str) -> Result<DropdownPage, SyncError>;

    /// 逐页拉取完整快照
    async fn fetch_all(&self, user_id: &str, page_size: usize) -> Result<Vec<Notification>, SyncError> {
        let page_size = page_size.max(1);
        let mut records: Vec<Notification> = Vec::new();

        for page in 1..=MAX_SNAPSHOT_PAGES {
            let filter = NotificationFilter::new().page(page, page_size);
            let result = self.fetch_panel(user_id, &filter).await?;
            let received = result.notifications.len();
            records.extend(result.notifications);

            let reached_total = result.total > 0 && records.len() >= result.total;
            if received == 0 || received < page_size || reached_total {
                break;
            }
        }
        Ok(records)
    }
}
