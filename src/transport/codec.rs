//! 推送帧编解码
//!
//! 支持两种帧格式：
//! ```text
//! {"type":"NEW","record":{...}}            {"type":"READ","id":"n1"}
//! {"type":"DELETED","id":"n1"}             {"type":"CONNECTED","clientId":"c1"}
//! {"evento":"NUEVA_NOTIFICACION","data":{...},"usuarioId":"u1"}   (旧格式)
//! ```
//! SSE 通道额外用 `event:` 行携带事件名（`nuevaNotificacion`、`notificacionLeida` 等）。

use serde_json::{json, Value};

use crate::error::TransportError;
use crate::notification::Notification;

/// 服务端推送事件
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// 服务端确认连接
    Connected { client_id: Option<String> },
    /// 新通知
    Created(Notification),
    /// 其它客户端或服务端已标记已读
    Read(String),
    /// 已删除
    Deleted(String),
    /// 心跳回应
    Pong,
    /// 服务端报告的错误
    ServerError(String),
}

/// 心跳帧 `{"type":"PING","userId":...}`
pub fn encode_ping(user_id: &str) -> String {
    json!({ "type": "PING", "userId": user_id }).to_string()
}

/// 解析 WebSocket 文本帧（或 SSE 默认 `message` 事件的 data）
///
/// 返回 `Ok(None)` 表示可识别但无需处理的帧。
pub fn decode_frame(text: &str) -> Result<Option<PushEvent>, TransportError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TransportError::Codec(format!("invalid json: {}", e)))?;

    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        return decode_typed(kind, &value);
    }
    if let Some(evento) = value.get("evento").and_then(Value::as_str) {
        return decode_legacy(evento, &value);
    }
    Err(TransportError::Codec("frame has no event type".to_string()))
}

/// 解析一个 SSE 事件
pub fn decode_sse(event: Option<&str>, data: &str) -> Result<Option<PushEvent>, TransportError> {
    let name = match event {
        None | Some("message") | Some("") => return decode_frame(data),
        Some(name) => name,
    };

    let value: Value = serde_json::from_str(data)
        .map_err(|e| TransportError::Codec(format!("invalid json in '{}' event: {}", name, e)))?;

    match name {
        "nuevaNotificacion" | "new" | "NEW" => record_from(&value).map(|n| Some(PushEvent::Created(n))),
        "notificacionLeida" | "read" | "READ" => id_from(&value, name).map(|id| Some(PushEvent::Read(id))),
        "notificacionEliminada" | "deleted" | "DELETED" => {
            id_from(&value, name).map(|id| Some(PushEvent::Deleted(id)))
        }
        "conectado" | "connected" | "CONNECTED" => Ok(Some(PushEvent::Connected {
            client_id: extract_id(&value).or_else(|| extract_string(&value, "clientId")),
        })),
        _ => Ok(None),
    }
}

fn decode_typed(kind: &str, value: &Value) -> Result<Option<PushEvent>, TransportError> {
    match kind.to_uppercase().as_str() {
        "NEW" | "NOTIFICATION_CREATED" => {
            let body = value
                .get("record")
                .or_else(|| value.get("notification"))
                .or_else(|| value.get("data"))
                .ok_or_else(|| TransportError::Codec("NEW frame without record".to_string()))?;
            record_from(body).map(|n| Some(PushEvent::Created(n)))
        }
        "READ" | "NOTIFICATION_READ" => id_from(value, "READ").map(|id| Some(PushEvent::Read(id))),
        "DELETED" | "NOTIFICATION_DELETED" => id_from(value, "DELETED").map(|id| Some(PushEvent::Deleted(id))),
        "CONNECTED" => Ok(Some(PushEvent::Connected {
            client_id: extract_string(value, "clientId"),
        })),
        "PONG" => Ok(Some(PushEvent::Pong)),
        "ERROR" => Ok(Some(PushEvent::ServerError(
            extract_string(value, "message").unwrap_or_else(|| "unknown server error".to_string()),
        ))),
        _ => Ok(None),
    }
}

fn decode_legacy(evento: &str, value: &Value) -> Result<Option<PushEvent>, TransportError> {
    let data = value.get("data").unwrap_or(&Value::Null);
    match evento {
        "NUEVA_NOTIFICACION" => record_from(data).map(|n| Some(PushEvent::Created(n))),
        "NOTIFICACION_LEIDA" => id_from(data, evento).map(|id| Some(PushEvent::Read(id))),
        "NOTIFICACION_ELIMINADA" => id_from(data, evento).map(|id| Some(PushEvent::Deleted(id))),
        "CONEXION_EXITOSA" => Ok(Some(PushEvent::Connected { client_id: None })),
        "PONG" => Ok(Some(PushEvent::Pong)),
        "ERROR" => Ok(Some(PushEvent::ServerError(
            extract_string(value, "mensaje").unwrap_or_else(|| "error del servidor".to_string()),
        ))),
        // 列表加载、计数、详情都走 REST
        _ => Ok(None),
    }
}

fn record_from(value: &Value) -> Result<Notification, TransportError> {
    serde_json::from_value(value.clone())
        .map_err(|e| TransportError::Codec(format!("invalid notification record: {}", e)))
}

fn id_from(value: &Value, event: &str) -> Result<String, TransportError> {
    extract_id(value)
        .or_else(|| value.get("record").and_then(extract_id))
        .or_else(|| value.get("data").and_then(extract_id))
        .ok_or_else(|| TransportError::Codec(format!("{} frame without id", event)))
}

fn extract_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;

    const RECORD: &str = r#"{"id":"n1","userId":"u1","title":"t","message":"m","type":"RESERVA_MODIFICADA","read":false,"createdAt":"2026-05-01T10:00:00Z"}"#;

    #[test]
    fn test_decode_typed_new() {
        let frame = format!(r#"{{"type":"NEW","record":{}}}"#, RECORD);
        match decode_frame(&frame).unwrap() {
            Some(PushEvent::Created(n)) => {
                assert_eq!(n.id, "n1");
                assert_eq!(n.kind, NotificationKind::ReservationModified);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_typed_read_deleted_connected() {
        assert_eq!(
            decode_frame(r#"{"type":"READ","id":"n2"}"#).unwrap(),
            Some(PushEvent::Read("n2".into()))
        );
        assert_eq!(
            decode_frame(r#"{"type":"DELETED","id":7}"#).unwrap(),
            Some(PushEvent::Deleted("7".into()))
        );
        assert_eq!(
            decode_frame(r#"{"type":"CONNECTED","clientId":"c-1"}"#).unwrap(),
            Some(PushEvent::Connected { client_id: Some("c-1".into()) })
        );
        assert_eq!(decode_frame(r#"{"type":"PONG"}"#).unwrap(), Some(PushEvent::Pong));
    }

    #[test]
    fn test_decode_legacy_envelope() {
        let frame = format!(
            r#"{{"evento":"NUEVA_NOTIFICACION","data":{},"usuarioId":"u1"}}"#,
            RECORD
        );
        assert!(matches!(decode_frame(&frame).unwrap(), Some(PushEvent::Created(_))));

        let read = format!(r#"{{"evento":"NOTIFICACION_LEIDA","data":{}}}"#, RECORD);
        assert_eq!(decode_frame(&read).unwrap(), Some(PushEvent::Read("n1".into())));

        assert_eq!(
            decode_frame(r#"{"evento":"NOTIFICACION_ELIMINADA","data":{"id":"n3"}}"#).unwrap(),
            Some(PushEvent::Deleted("n3".into()))
        );
        assert_eq!(
            decode_frame(r#"{"evento":"ERROR","mensaje":"sin permiso"}"#).unwrap(),
            Some(PushEvent::ServerError("sin permiso".into()))
        );
        assert_eq!(decode_frame(r#"{"evento":"CONTAR_NO_LEIDAS","data":{"count":3}}"#).unwrap(), None);
    }

    #[test]
    fn test_decode_malformed_frames() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"hello":"world"}"#).is_err());
        assert!(decode_frame(r#"{"type":"READ"}"#).is_err());
        assert!(decode_frame(r#"{"type":"NEW","record":{"id":"x"}}"#).is_err());
        assert_eq!(decode_frame(r#"{"type":"SOMETHING_ELSE"}"#).unwrap(), None);
    }

    #[test]
    fn test_decode_sse_named_events() {
        assert!(matches!(
            decode_sse(Some("nuevaNotificacion"), RECORD).unwrap(),
            Some(PushEvent::Created(_))
        ));
        assert_eq!(
            decode_sse(Some("notificacionLeida"), r#"{"id":"n1"}"#).unwrap(),
            Some(PushEvent::Read("n1".into()))
        );
        assert_eq!(
            decode_sse(Some("notificacionEliminada"), r#"{"id":"n1"}"#).unwrap(),
            Some(PushEvent::Deleted("n1".into()))
        );
        assert_eq!(
            decode_sse(Some("conectado"), r#"{"id":"client-9"}"#).unwrap(),
            Some(PushEvent::Connected { client_id: Some("client-9".into()) })
        );
        assert_eq!(
            decode_sse(None, r#"{"type":"READ","id":"n5"}"#).unwrap(),
            Some(PushEvent::Read("n5".into()))
        );
        assert_eq!(decode_sse(Some("keepalive"), "{}").unwrap(), None);
        assert!(decode_sse(Some("notificacionLeida"), "oops").is_err());
    }

    #[test]
    fn test_encode_ping() {
        let ping: Value = serde_json::from_str(&encode_ping("u1")).unwrap();
        assert_eq!(ping["type"], "PING");
        assert_eq!(ping["userId"], "u1");
    }
}
