//! 列表项视图模型（下拉框、面板、Toast 共用）

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::format::{format_relative, kind_label, truncate};
use super::icon::{icon_for, Icon};
use super::image::VehicleImageResolver;
use crate::notification::{Notification, NotificationKind, Priority};

/// 预览文字最大长度
pub const PREVIEW_CHARS: usize = 90;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCard {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub kind: NotificationKind,
    pub kind_label: &'static str,
    pub icon: Icon,
    pub priority: Priority,
    pub image_url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub age: String,
}

impl NotificationCard {
    pub fn build(n: &Notification, images: &VehicleImageResolver, now: DateTime<Utc>) -> Self {
        let title = if n.title.trim().is_empty() {
            kind_label(n.kind).to_string()
        } else {
            n.title.clone()
        };
        Self {
            id: n.id.clone(),
            title,
            preview: truncate(&n.message, PREVIEW_CHARS),
            kind: n.kind,
            kind_label: kind_label(n.kind),
            icon: icon_for(n.kind),
            priority: n.effective_priority(),
            image_url: images.resolve(n),
            read: n.read,
            created_at: n.created_at,
            age: format_relative(n.created_at, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_card_falls_back_to_kind_label() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let n = Notification::new("n1", "u1", NotificationKind::ReservationCancelled, now)
            .with_message("Honda Civic: reserva cancelada por el propietario");
        let card = NotificationCard::build(&n, &VehicleImageResolver::new(), now);

        assert_eq!(card.title, "Reserva cancelada");
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.icon.color, "red");
        assert_eq!(card.image_url.as_deref(), Some("https://i.imgur.com/yFSuVQY.png"));
        assert_eq!(card.age, "just now");
    }
}
