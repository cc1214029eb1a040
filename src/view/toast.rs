//! Toast 队列
//!
//! 新到达的未读通知入队，显示 `duration` 后自动消失；同一 id 只弹一次。

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::format::truncate;
use crate::notification::Notification;

/// 队列中最多保留的 Toast
const MAX_VISIBLE: usize = 3;
/// 已弹过的 id 最多记住多少个
const SEEN_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: String,
    pub title: String,
    pub body: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ToastQueue {
    duration: Duration,
    visible: VecDeque<Toast>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl ToastQueue {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            visible: VecDeque::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// 入队；重复 id 或已读记录返回 None
    pub fn push(&mut self, n: &Notification, now: DateTime<Utc>) -> Option<&Toast> {
        if n.read || self.seen.contains(&n.id) {
            return None;
        }
        self.remember(&n.id);

        let ttl = chrono::Duration::from_std(self.duration).unwrap_or_else(|_| chrono::Duration::seconds(3));
        if self.visible.len() >= MAX_VISIBLE {
            self.visible.pop_front();
        }
        self.visible.push_back(Toast {
            id: n.id.clone(),
            title: n.title.clone(),
            body: truncate(&n.message, 120),
            expires_at: now + ttl,
        });
        self.visible.back()
    }

    /// 移除已过期的 Toast，返回被移除的条目
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Toast> {
        let (expired, alive): (Vec<Toast>, Vec<Toast>) =
            self.visible.drain(..).partition(|t| t.expires_at <= now);
        self.visible = alive.into();
        expired
    }

    /// 手动关闭
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.visible.len();
        self.visible.retain(|t| t.id != id);
        self.visible.len() != before
    }

    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.visible.iter()
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// 下一个到期时间（用于调度定时器）
    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.visible.iter().map(|t| t.expires_at).min()
    }

    fn remember(&mut self, id: &str) {
        self.seen.insert(id.to_string());
        self.seen_order.push_back(id.to_string());
        while self.seen_order.len() > SEEN_LIMIT {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use chrono::TimeZone;

    fn note(id: &str) -> Notification {
        Notification::new(id, "u1", NotificationKind::ReservationConfirmed, Utc::now())
            .with_title("Reserva confirmada")
            .with_message("Tu reserva fue confirmada")
    }

    #[test]
    fn test_toast_auto_dismisses_after_duration() {
        let mut queue = ToastQueue::new(Duration::from_millis(3000));
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        queue.push(&note("n1"), t0).unwrap();

        assert!(queue.expire(t0 + chrono::Duration::milliseconds(2999)).is_empty());
        let expired = queue.expire(t0 + chrono::Duration::milliseconds(3000));
        assert_eq!(expired.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_toast_dedup_and_read_skip() {
        let mut queue = ToastQueue::new(Duration::from_secs(3));
        let now = Utc::now();
        assert!(queue.push(&note("n1"), now).is_some());
        assert!(queue.push(&note("n1"), now).is_none());
        assert!(queue.push(&note("n2").mark_read_at(now), now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_toast_queue_bounded() {
        let mut queue = ToastQueue::new(Duration::from_secs(3));
        let now = Utc::now();
        for i in 0..5 {
            queue.push(&note(&format!("n{}", i)), now);
        }
        let ids: Vec<&str> = queue.visible().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n3", "n4"]);
        assert!(queue.dismiss("n3"));
        assert!(!queue.dismiss("n3"));
    }
}
