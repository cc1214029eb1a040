//! 通知详情

use serde::Serialize;

use super::format::{format_timestamp, kind_label};
use super::icon::{icon_for, Icon};
use super::image::VehicleImageResolver;
use crate::notification::{Notification, Priority};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailView {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind_label: &'static str,
    pub icon: Icon,
    pub priority: Priority,
    pub image_url: Option<String>,
    pub read: bool,
    pub created: String,
    pub read_at: Option<String>,
    /// 例如 `("RESERVA", "r-19")`
    pub related: Option<(String, String)>,
}

impl DetailView {
    pub fn build(n: &Notification, images: &VehicleImageResolver) -> Self {
        let related = match (&n.related_entity_type, &n.related_entity_id) {
            (Some(kind), Some(id)) => Some((kind.clone(), id.clone())),
            (None, Some(id)) => Some(("-".to_string(), id.clone())),
            _ => None,
        };
        Self {
            id: n.id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            kind_label: kind_label(n.kind),
            icon: icon_for(n.kind),
            priority: n.effective_priority(),
            image_url: images.resolve(n),
            read: n.read,
            created: format_timestamp(n.created_at),
            read_at: n.read_at.map(format_timestamp),
            related,
        }
    }

    /// 多行文本渲染
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("{} {}", self.icon.glyph, self.title),
            format!("{} · {} · {}", self.kind_label, self.priority, self.created),
            String::new(),
            self.message.clone(),
        ];
        if let Some((kind, id)) = &self.related {
            lines.push(String::new());
            lines.push(format!("{}: {}", kind, id));
        }
        if let Some(url) = &self.image_url {
            lines.push(format!("image: {}", url));
        }
        match &self.read_at {
            Some(at) => lines.push(format!("read {}", at)),
            None if self.read => lines.push("read".to_string()),
            None => lines.push("unread".to_string()),
        }
        lines.join("\n")
    }
}
