//! HTTP implementation of [`RemoteService`] against a PostgREST-style RPC API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::remote::{FetchFilter, RemoteError, RemoteResult, RemoteService};
use crate::config::SyncConfig;
use crate::models::{
    Achievement, AchievementId, DeviceId, DeviceStats, PlatformMetadata, VisitLog, VisitLogId,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct HttpRemoteService {
    rest_url: String,
    api_key: String,
    client: Client,
}

impl std::fmt::Debug for HttpRemoteService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteService")
            .field("rest_url", &self.rest_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteService {
    pub fn new(url: impl AsRef<str>, api_key: impl Into<String>) -> RemoteResult<Self> {
        Self::with_client(url, api_key, Client::builder().build()?)
    }

    /// Build from a configured [`SyncConfig`], applying its request timeout
    pub fn from_config(config: &SyncConfig) -> RemoteResult<Self> {
        let (Some(url), Some(api_key)) = (
            normalize_text_option(config.remote_url.clone()),
            normalize_text_option(config.api_key.clone()),
        ) else {
            return Err(RemoteError::InvalidConfiguration(
                "remote URL and API key are both required".to_string(),
            ));
        };
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Self::with_client(url, api_key, client)
    }

    fn with_client(
        url: impl AsRef<str>,
        api_key: impl Into<String>,
        client: Client,
    ) -> RemoteResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            api_key,
            client,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    async fn call(&self, function: &str, params: &Value) -> RemoteResult<reqwest::Response> {
        let request = self.authorized(
            self.client
                .post(format!("{}/rpc/{function}", self.rest_url))
                .json(params),
        );
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(function, status = status.as_u16(), "Remote call rejected");
            return Err(rejection_error(status, &body));
        }
        Ok(response)
    }

    async fn call_json<T: DeserializeOwned>(&self, function: &str, params: &Value) -> RemoteResult<T> {
        let response = self.call(function, params).await?;
        let body = response.text().await?;
        decode_rpc_result(function, &body)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn check_connectivity(&self) -> bool {
        let request = self.authorized(self.client.get(format!("{}/", self.rest_url)));
        match request.send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {}", error);
                false
            }
        }
    }

    async fn register_device(
        &self,
        device_id: DeviceId,
        metadata: &PlatformMetadata,
    ) -> RemoteResult<DeviceId> {
        self.call_json(
            "register_device",
            &json!({
                "p_device_id": device_id,
                "p_platform": metadata.platform,
                "p_app_version": metadata.app_version,
                "p_os_version": metadata.os_version,
            }),
        )
        .await
    }

    async fn fetch_visit_logs(
        &self,
        device_id: DeviceId,
        filter: &FetchFilter,
    ) -> RemoteResult<Vec<VisitLog>> {
        self.call_json("get_visit_logs", &filter_params(device_id, filter))
            .await
    }

    async fn create_visit_log(
        &self,
        device_id: DeviceId,
        log: &VisitLog,
    ) -> RemoteResult<VisitLog> {
        self.call_json(
            "create_visit_log",
            &json!({ "p_device_id": device_id, "p_log": log }),
        )
        .await
    }

    async fn update_visit_log(
        &self,
        device_id: DeviceId,
        log: &VisitLog,
    ) -> RemoteResult<VisitLog> {
        self.call_json(
            "update_visit_log",
            &json!({ "p_device_id": device_id, "p_log": log }),
        )
        .await
    }

    async fn delete_visit_log(&self, device_id: DeviceId, id: VisitLogId) -> RemoteResult<()> {
        self.call(
            "delete_visit_log",
            &json!({ "p_device_id": device_id, "p_log_id": id }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_achievements(
        &self,
        device_id: DeviceId,
        filter: &FetchFilter,
    ) -> RemoteResult<Vec<Achievement>> {
        self.call_json("get_achievements", &filter_params(device_id, filter))
            .await
    }

    async fn create_achievement(
        &self,
        device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement> {
        self.call_json(
            "unlock_achievement",
            &json!({ "p_device_id": device_id, "p_achievement": achievement }),
        )
        .await
    }

    async fn update_achievement(
        &self,
        device_id: DeviceId,
        achievement: &Achievement,
    ) -> RemoteResult<Achievement> {
        self.call_json(
            "update_achievement",
            &json!({ "p_device_id": device_id, "p_achievement": achievement }),
        )
        .await
    }

    async fn delete_achievement(
        &self,
        device_id: DeviceId,
        id: AchievementId,
    ) -> RemoteResult<()> {
        self.call(
            "delete_achievement",
            &json!({ "p_device_id": device_id, "p_achievement_id": id }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_device_stats(&self, device_id: DeviceId) -> RemoteResult<Option<DeviceStats>> {
        self.call_json("get_device_stats", &json!({ "p_device_id": device_id }))
            .await
    }

    async fn upsert_device_stats(
        &self,
        device_id: DeviceId,
        stats: &DeviceStats,
    ) -> RemoteResult<DeviceStats> {
        self.call_json(
            "upsert_device_stats",
            &json!({ "p_device_id": device_id, "p_stats": stats }),
        )
        .await
    }
}

/// Validate the base URL and point it at the REST root
fn normalize_rest_url(url: &str) -> RemoteResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "remote URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "remote URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

fn filter_params(device_id: DeviceId, filter: &FetchFilter) -> Value {
    let mut params = json!({ "p_device_id": device_id, "p_offset": filter.offset });
    if let Some(since) = filter.updated_since {
        params["p_updated_since"] = json!(since);
    }
    if let Some(limit) = filter.limit {
        params["p_limit"] = json!(limit);
    }
    params
}

/// Decode an RPC body. Empty bodies decode as JSON `null` so functions that
/// return nothing map onto `Option` results.
fn decode_rpc_result<T: DeserializeOwned>(function: &str, body: &str) -> RemoteResult<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|error| {
        RemoteError::InvalidPayload(format!(
            "{function}: {error} in '{}'",
            compact_text(body)
        ))
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

/// Server-side failures are transient; anything else is the API refusing the call
fn rejection_error(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(status, body);
    if status.is_server_error() {
        RemoteError::Unavailable(message)
    } else {
        RemoteError::Api(message)
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.details)
            .or(payload.hint)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
