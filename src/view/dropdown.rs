//! 铃铛下拉框 - 最近 N 条

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::card::NotificationCard;
use super::image::VehicleImageResolver;
use crate::notification::NotificationStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownView {
    pub items: Vec<NotificationCard>,
    pub total_unread: usize,
    /// 列表中还有更多记录（显示“查看全部”）
    pub has_more: bool,
}

impl DropdownView {
    pub fn build(
        store: &NotificationStore,
        size: usize,
        images: &VehicleImageResolver,
        now: DateTime<Utc>,
    ) -> Self {
        let items = store
            .iter()
            .take(size)
            .map(|n| NotificationCard::build(n, images, now))
            .collect();
        Self {
            items,
            total_unread: store.unread_count(),
            has_more: store.len() > size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
