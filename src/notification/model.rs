//! 通知数据模型
//!
//! 同时兼容英文 camelCase 字段和后端的西班牙语字段（`titulo`、`leido`、`creadoEn` 等）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// 通知类型（封闭集合 + 兜底变体）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    RentalEnded,
    ReservationCancelled,
    ReservationModified,
    ReservationConfirmed,
    VehicleRated,
    DepositConfirmed,
    DepositReceived,
    #[default]
    Unspecified,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 8] = [
        NotificationKind::RentalEnded,
        NotificationKind::ReservationCancelled,
        NotificationKind::ReservationModified,
        NotificationKind::ReservationConfirmed,
        NotificationKind::VehicleRated,
        NotificationKind::DepositConfirmed,
        NotificationKind::DepositReceived,
        NotificationKind::Unspecified,
    ];

    /// 后端使用的类型码
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::RentalEnded => "ALQUILER_FINALIZADO",
            NotificationKind::ReservationCancelled => "RESERVA_CANCELADA",
            NotificationKind::ReservationModified => "RESERVA_MODIFICADA",
            NotificationKind::ReservationConfirmed => "RESERVA_CONFIRMADA",
            NotificationKind::VehicleRated => "VEHICULO_CALIFICADO",
            NotificationKind::DepositConfirmed => "DEPOSITO_CONFIRMADO",
            NotificationKind::DepositReceived => "DEPOSITO_RECIBIDO",
            NotificationKind::Unspecified => "NO_ESPECIFICADO",
        }
    }

    /// 解析类型码（大小写不敏感，兼容 `-`/空格分隔），未知值归为 `Unspecified`
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "ALQUILER_FINALIZADO" | "RENTAL_ENDED" => NotificationKind::RentalEnded,
            "RESERVA_CANCELADA" | "RESERVATION_CANCELLED" => NotificationKind::ReservationCancelled,
            "RESERVA_MODIFICADA" | "RESERVATION_MODIFIED" => NotificationKind::ReservationModified,
            "RESERVA_CONFIRMADA" | "RESERVATION_CONFIRMED" => NotificationKind::ReservationConfirmed,
            "VEHICULO_CALIFICADO" | "VEHICLE_RATED" => NotificationKind::VehicleRated,
            "DEPOSITO_CONFIRMADO" | "DEPOSIT_CONFIRMED" => NotificationKind::DepositConfirmed,
            "DEPOSITO_RECIBIDO" | "DEPOSIT_RECEIVED" => NotificationKind::DepositReceived,
            _ => NotificationKind::Unspecified,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(raw: String) -> Self {
        NotificationKind::parse(&raw)
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 通知记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// 唯一 ID，REST 与推送两种表示中保持一致
    pub id: String,
    /// 所属用户
    #[serde(default, alias = "usuarioId")]
    pub user_id: String,
    #[serde(default, alias = "titulo")]
    pub title: String,
    #[serde(default, alias = "mensaje", alias = "descripcion")]
    pub message: String,
    #[serde(rename = "type", default, alias = "tipo")]
    pub kind: NotificationKind,
    /// 显式优先级，缺省时按类型推导
    #[serde(default, alias = "prioridad", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// 关联的业务对象（租赁、车辆），只用于查找
    #[serde(default, alias = "entidadId", skip_serializing_if = "Option::is_none")]
    pub related_entity_id: Option<String>,
    #[serde(default, alias = "tipoEntidad", skip_serializing_if = "Option::is_none")]
    pub related_entity_type: Option<String>,
    #[serde(default, alias = "imagenURL", alias = "imagenUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, alias = "leido", alias = "leida")]
    pub read: bool,
    #[serde(default, alias = "leidoEn", skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(alias = "creadoEn")]
    pub created_at: DateTime<Utc>,
    /// 附加数据
    #[serde(default, alias = "datos", skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Notification {
    /// 创建未读通知
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: NotificationKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: String::new(),
            message: String::new(),
            kind,
            priority: None,
            related_entity_id: None,
            related_entity_type: None,
            image_url: None,
            read: false,
            read_at: None,
            created_at,
            data: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_related(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.related_entity_type = Some(entity_type.into());
        self.related_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 标记为已读
    pub fn mark_read_at(mut self, at: DateTime<Utc>) -> Self {
        self.read = true;
        self.read_at = Some(at);
        self
    }

    /// 生效的优先级
    pub fn effective_priority(&self) -> Priority {
        self.priority
            .unwrap_or_else(|| super::priority::priority_for(self.kind))
    }

    /// 判断 `self` 是否比 `other`（同一 id）更新
    ///
    /// 已读优先于未读；同为已读时比较 `read_at`；否则比较 `created_at`。
    pub fn supersedes(&self, other: &Notification) -> bool {
        match (self.read, other.read) {
            (true, false) => true,
            (false, true) => false,
            (true, true) if self.read_at != other.read_at => self.read_at > other.read_at,
            _ => self.created_at >= other.created_at,
        }
    }
}
