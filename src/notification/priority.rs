//! Priority classification for notifications
//!
//! The backend may tag a notification with an explicit priority
//! (`ALTA` / `MEDIA` / `BAJA`). When it doesn't, the priority is derived
//! from the notification type:
//! - HIGH: something went wrong with a booking (cancellation)
//! - MEDIUM: booking or money state changed (modified, confirmed, deposits)
//! - LOW: informational (rental ended, vehicle rated, unspecified)

use super::model::NotificationKind;

/// Priority level for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    #[serde(rename = "BAJA", alias = "LOW", alias = "low", alias = "baja")]
    Low,
    #[serde(rename = "MEDIA", alias = "MEDIUM", alias = "medium", alias = "media")]
    Medium,
    #[serde(rename = "ALTA", alias = "HIGH", alias = "high", alias = "alta")]
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "ALTA",
            Priority::Medium => "MEDIA",
            Priority::Low => "BAJA",
        }
    }

    /// Parse a CLI / query value, accepting Spanish and English names
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "alta" | "high" => Some(Priority::High),
            "media" | "medium" => Some(Priority::Medium),
            "baja" | "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// Default priority for a notification type
pub fn priority_for(kind: NotificationKind) -> Priority {
    match kind {
        // A cancelled reservation blocks the driver's plans
        NotificationKind::ReservationCancelled => Priority::High,
        NotificationKind::ReservationModified
        | NotificationKind::ReservationConfirmed
        | NotificationKind::DepositConfirmed
        | NotificationKind::DepositReceived => Priority::Medium,
        NotificationKind::RentalEnded
        | NotificationKind::VehicleRated
        | NotificationKind::Unspecified => Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_for_kind() {
        assert_eq!(priority_for(NotificationKind::ReservationCancelled), Priority::High);
        assert_eq!(priority_for(NotificationKind::DepositReceived), Priority::Medium);
        assert_eq!(priority_for(NotificationKind::VehicleRated), Priority::Low);
        assert_eq!(priority_for(NotificationKind::Unspecified), Priority::Low);
    }

    #[test]
    fn test_priority_wire_names() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"ALTA\"");
        let p: Priority = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(p, Priority::Medium);
        let p: Priority = serde_json::from_str("\"BAJA\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn test_priority_parse_case_insensitive() {
        assert_eq!(Priority::parse("Alta"), Some(Priority::High));
        assert_eq!(Priority::parse("low"), Some(Priority::Low));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }
}
