//! 通知类型 → 图标 / 颜色

use serde::Serialize;

use crate::notification::NotificationKind;

/// 图标描述（图标名沿用前端 lucide 图标集的命名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Icon {
    pub name: &'static str,
    pub color: &'static str,
    /// 终端下的单字符替代
    pub glyph: &'static str,
}

/// 根据通知类型选择图标
pub fn icon_for(kind: NotificationKind) -> Icon {
    match kind {
        NotificationKind::RentalEnded => Icon {
            name: "ClipboardCheck",
            color: "emerald",
            glyph: "✔",
        },
        NotificationKind::ReservationCancelled => Icon {
            name: "XCircle",
            color: "red",
            glyph: "✖",
        },
        NotificationKind::ReservationModified => Icon {
            name: "Edit",
            color: "yellow",
            glyph: "✎",
        },
        NotificationKind::VehicleRated => Icon {
            name: "Star",
            color: "amber",
            glyph: "★",
        },
        NotificationKind::ReservationConfirmed => Icon {
            name: "CheckCircle",
            color: "green",
            glyph: "✓",
        },
        NotificationKind::DepositConfirmed => Icon {
            name: "DollarSign",
            color: "green",
            glyph: "$",
        },
        NotificationKind::DepositReceived => Icon {
            name: "CreditCard",
            color: "indigo",
            glyph: "¤",
        },
        NotificationKind::Unspecified => Icon {
            name: "CheckCircle",
            color: "gray",
            glyph: "•",
        },
    }
}

/// 终端 ANSI 颜色码
pub fn ansi_color(color: &str) -> &'static str {
    match color {
        "red" => "\x1b[31m",
        "green" | "emerald" => "\x1b[32m",
        "yellow" | "amber" => "\x1b[33m",
        "indigo" => "\x1b[34m",
        _ => "\x1b[90m",
    }
}
