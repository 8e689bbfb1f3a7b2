//! REST client for the notification endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use notisync_core::config::api::ApiConfig;
use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;
use notisync_core::types::{InboxId, NotificationId};
use notisync_entity::NotificationRecord;
use notisync_service::NotificationApi;

/// Unread-count payload; the backend answers either a bare integer or an
/// object with a `count` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountBody {
    Bare(u64),
    Wrapped { count: u64 },
}

impl CountBody {
    fn value(self) -> u64 {
        match self {
            Self::Bare(n) | Self::Wrapped { count: n } => n,
        }
    }
}

/// `reqwest`-backed [`NotificationApi`].
#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpNotificationApi {
    /// Build a client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Full URL for an API path starting with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, method: Method, path: &str) -> AppResult<Response> {
        debug!(method = %method, path = %path, "Notification API request");
        let response = self
            .request(method, path)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response, path).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::with_source(ErrorKind::Timeout, "Notification API request timed out", e)
    } else if e.is_decode() {
        AppError::with_source(ErrorKind::Decode, "Malformed notification API response", e)
    } else {
        AppError::with_source(
            ErrorKind::ExternalService,
            "Notification API request failed",
            e,
        )
    }
}

async fn check_status(response: Response, path: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{path} answered HTTP {status}: {}", body.trim());
    Err(match status {
        StatusCode::NOT_FOUND => AppError::not_found(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AppError::timeout(message),
        _ => AppError::external_service(message),
    })
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn unread(&self, inbox: InboxId) -> AppResult<Vec<NotificationRecord>> {
        let path = format!("{}/unread", inbox.rest_path());
        self.send(Method::GET, &path)
            .await?
            .json::<Vec<NotificationRecord>>()
            .await
            .map_err(map_reqwest_error)
    }

    async fn unread_count(&self, inbox: InboxId) -> AppResult<u64> {
        let path = format!("{}/unread-count", inbox.rest_path());
        let body = self
            .send(Method::GET, &path)
            .await?
            .json::<CountBody>()
            .await
            .map_err(map_reqwest_error)?;
        Ok(body.value())
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        self.send(Method::PATCH, &format!("/notifications/{id}/read"))
            .await
            .map(|_| ())
    }

    async fn mark_all_read(&self, inbox: InboxId) -> AppResult<()> {
        let path = format!("{}/read-all", inbox.rest_path());
        self.send(Method::PATCH, &path).await.map(|_| ())
    }

    async fn delete(&self, id: NotificationId) -> AppResult<()> {
        self.send(Method::DELETE, &format!("/notifications/{id}"))
            .await
            .map(|_| ())
    }
}
