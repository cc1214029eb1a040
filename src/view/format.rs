//! 文本格式化工具

use chrono::{DateTime, Local, Utc};

use crate::notification::NotificationKind;

/// `dd/mm/yyyy HH:MM`（本地时区）
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

/// 相对时间（"just now"、"5m ago"、"3h ago"、"2d ago"），一周以上显示日期
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    format_timestamp(at)
}

/// 类型的展示名
pub fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::RentalEnded => "Alquiler finalizado",
        NotificationKind::ReservationCancelled => "Reserva cancelada",
        NotificationKind::ReservationModified => "Reserva modificada",
        NotificationKind::ReservationConfirmed => "Reserva confirmada",
        NotificationKind::VehicleRated => "Vehículo calificado",
        NotificationKind::DepositConfirmed => "Depósito confirmado",
        NotificationKind::DepositReceived => "Depósito recibido",
        NotificationKind::Unspecified => "No especificado",
    }
}

/// 按字符截断，超出部分用 `...` 表示
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}
