//! Output formatting for CLI commands

use serde::Serialize;

use crate::view::icon::ansi_color;
use crate::view::NotificationCard;

const RESET: &str = "\x1b[0m";

/// Pretty JSON, falling back to `{}` on serialization errors
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// One line per card: `● ✖ Reserva cancelada · 5m ago [n1]`
pub fn format_card(card: &NotificationCard, color: bool) -> String {
    let marker = if card.read { " " } else { "●" };
    let glyph = if color {
        format!("{}{}{}", ansi_color(card.icon.color), card.icon.glyph, RESET)
    } else {
        card.icon.glyph.to_string()
    };
    let mut line = format!("{} {} {} · {} [{}]", marker, glyph, card.title, card.age, card.id);
    if !card.preview.is_empty() {
        line.push_str("\n     ");
        line.push_str(&card.preview);
    }
    line
}

pub fn format_cards(cards: &[NotificationCard], color: bool) -> String {
    cards
        .iter()
        .map(|c| format_card(c, color))
        .collect::<Vec<_>>()
        .join("\n")
}
