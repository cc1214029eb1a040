//! reqwest 实现的通知 REST 客户端

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{DropdownPage, NotificationApi, PanelPage, UnreadCount};
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::notification::{Notification, NotificationFilter};

/// 变更请求体 `{ userId }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserBody<'a> {
    user_id: &'a str,
}

/// 通知 REST 客户端
#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpNotificationApi {
    /// 创建客户端
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| SyncError::Request {
            operation: "configure",
            message: format!("invalid api url {}: {}", config.api_base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Request {
                operation: "configure",
                message: format!("api url cannot be a base: {}", config.api_base_url),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Request {
                operation: "configure",
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 拼接路径段（自动转义）
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> Result<Response, SyncError> {
        let response = builder.send().await.map_err(|e| SyncError::Request {
            operation,
            message: e.to_string(),
        })?;

        let status = response.status();
        debug!(operation, status = status.as_u16(), "REST response");
        if !status.is_success() {
            return Err(SyncError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, SyncError> {
        let response = self.send(operation, builder).await?;
        response.json::<T>().await.map_err(|e| SyncError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_panel(&self, user_id: &str, filter: &NotificationFilter) -> Result<PanelPage, SyncError> {
        let url = self.endpoint(&["notifications", "panel", user_id]);
        let builder = self.request(Method::GET, url).query(filter);
        self.send_json("fetch_panel", builder).await
    }

    async fn fetch_detail(&self, user_id: &str, id: &str) -> Result<Notification, SyncError> {
        let url = self.endpoint(&["notifications", "detail", id]);
        let builder = self.request(Method::GET, url).query(&[("userId", user_id)]);
        self.send_json("fetch_detail", builder).await
    }

    async fn mark_read(&self, user_id: &str, id: &str) -> Result<Option<Notification>, SyncError> {
        let url = self.endpoint(&["notifications", id, "read"]);
        let builder = self.request(Method::PUT, url).json(&UserBody { user_id });
        let response = self.send("mark_read", builder).await?;

        // 有的后端只返回 ack，不返回记录
        let body = response.text().await.map_err(|e| SyncError::Decode {
            operation: "mark_read",
            message: e.to_string(),
        })?;
        Ok(serde_json::from_str::<Notification>(&body).ok())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), SyncError> {
        let url = self.endpoint(&["notifications", id]);
        let builder = self.request(Method::DELETE, url).json(&UserBody { user_id });
        self.send("delete", builder).await?;
        Ok(())
    }

    async fn unread_count(&self, user_id: &str) -> Result<usize, SyncError> {
        let url = self.endpoint(&["notifications", "unread-count", user_id]);
        let count: UnreadCount = self.send_json("unread_count", self.request(Method::GET, url)).await?;
        Ok(count.count)
    }

    async fn fetch_dropdown(&self, user_id: &str) -> Result<DropdownPage, SyncError> {
        let url = self.endpoint(&["notifications", "dropdown", user_id]);
        self.send_json("fetch_dropdown", self.request(Method::GET, url)).await
    }
}
