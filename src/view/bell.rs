//! 铃铛角标

use serde::Serialize;

use crate::sync::SyncState;

/// 角标最多显示的数字
pub const BADGE_MAX: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BellBadge {
    pub unread: usize,
    /// 为 None 时不显示角标
    pub label: Option<String>,
    /// 连接指示器
    pub connection: &'static str,
}

impl BellBadge {
    pub fn new(unread: usize, state: SyncState) -> Self {
        let label = match unread {
            0 => None,
            n if n > BADGE_MAX => Some(format!("{}+", BADGE_MAX)),
            n => Some(n.to_string()),
        };
        Self {
            unread,
            label,
            connection: state.label(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.label.is_some()
    }

    /// 终端一行渲染
    pub fn render(&self) -> String {
        match &self.label {
            Some(label) => format!("🔔 {} [{}]", label, self.connection),
            None => format!("🔔 [{}]", self.connection),
        }
    }
}
