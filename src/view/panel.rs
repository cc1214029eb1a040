//! 通知面板 - 筛选 + 分页

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::card::NotificationCard;
use super::image::VehicleImageResolver;
use crate::notification::{NotificationFilter, NotificationStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub items: Vec<NotificationCard>,
    /// 筛选后的总数
    pub total: usize,
    pub page: usize,
    pub pages: usize,
    pub unread: usize,
}

impl PanelView {
    pub fn build(
        store: &NotificationStore,
        filter: &NotificationFilter,
        images: &VehicleImageResolver,
        now: DateTime<Utc>,
    ) -> Self {
        let (page_items, total) = filter.apply(store.iter());
        let size = filter.page_size();
        Self {
            items: page_items
                .into_iter()
                .map(|n| NotificationCard::build(n, images, now))
                .collect(),
            total,
            page: filter.page_number(),
            pages: total.div_ceil(size).max(1),
            unread: store.unread_count(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
