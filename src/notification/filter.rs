//! 通知过滤条件 - 既用作面板查询参数，也用于本地过滤

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{Notification, NotificationKind};
use super::priority::Priority;

/// 面板默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// 通知过滤条件
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// 页码（从 1 开始）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl NotificationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只看未读
    pub fn unread_only(mut self) -> Self {
        self.read = Some(false);
        self
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn page(mut self, page: usize, limit: usize) -> Self {
        self.page = Some(page.max(1));
        self.limit = Some(limit.max(1));
        self
    }

    /// 修改任意筛选条件时回到第一页
    pub fn reset_page(&mut self) {
        self.page = Some(1);
    }

    /// 当前页码（从 1 开始）
    pub fn page_number(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// 记录是否满足筛选条件（忽略分页）
    pub fn matches(&self, n: &Notification) -> bool {
        if let Some(kind) = self.kind {
            if n.kind != kind {
                return false;
            }
        }
        if let Some(read) = self.read {
            if n.read != read {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if n.effective_priority() != priority {
                return false;
            }
        }
        if let Some(entity_type) = &self.entity_type {
            let matches_type = n
                .related_entity_type
                .as_deref()
                .map(|t| t.eq_ignore_ascii_case(entity_type))
                .unwrap_or(false);
            if !matches_type {
                return false;
            }
        }
        if let Some(from) = self.from {
            if n.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if n.created_at > to {
                return false;
            }
        }
        true
    }

    /// 筛选并分页，返回 (当前页, 筛选后总数)
    pub fn apply<'a, I>(&self, items: I) -> (Vec<&'a Notification>, usize)
    where
        I: IntoIterator<Item = &'a Notification>,
    {
        let matched: Vec<&Notification> = items.into_iter().filter(|n| self.matches(n)).collect();
        let total = matched.len();
        let size = self.page_size();
        let start = (self.page_number() - 1).saturating_mul(size);
        let page = matched.into_iter().skip(start).take(size).collect();
        (page, total)
    }
}
