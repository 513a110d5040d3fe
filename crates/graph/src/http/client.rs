//! Low-level Graph API client
//!
//! Wraps `reqwest` with the envelope shape the rest of the crate consumes:
//! every request resolves to a [`GraphResponse`] whose status is either a
//! real HTTP code or [`GraphStatus::Exception`] for transport failures.
//! Authentication is delegated to a [`TokenSource`]; managed sources get a
//! single forced refresh and replay when the service answers 401.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use workbridge_common::SharedCache;

use crate::auth::TokenManager;
use crate::config::SettingsProvider;
use crate::error::{transport_detail, GraphError, Result};

/// Where a request gets its bearer token from.
#[derive(Clone)]
pub enum TokenSource {
    /// Fixed token supplied by the caller. Never refreshed, never retried.
    Static(String),
    /// Managed token with automatic refresh on expiry and on 401.
    Managed(Arc<TokenManager>),
}

impl TokenSource {
    async fn bearer(&self) -> Option<String> {
        match self {
            Self::Static(token) => Some(token.clone()),
            Self::Managed(manager) => manager.token().await,
        }
    }

    async fn force_refresh(&self) -> Option<String> {
        match self {
            Self::Static(_) => None,
            Self::Managed(manager) => manager.force_refresh().await,
        }
    }

    fn can_refresh(&self) -> bool {
        matches!(self, Self::Managed(_))
    }
}

/// Outcome classification for a Graph request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    /// HTTP status code returned by the service.
    Code(u16),
    /// The request never produced an HTTP response.
    Exception,
}

/// Response envelope returned by every [`GraphClient`] call.
///
/// Transport failures are folded into the envelope rather than surfaced as
/// errors so call sites handle one shape. The body carries either the
/// response payload or, for [`GraphStatus::Exception`], a short failure
/// description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphResponse {
    pub status: GraphStatus,
    pub body: String,
}

impl GraphResponse {
    fn exception(detail: String) -> Self {
        Self {
            status: GraphStatus::Exception,
            body: detail,
        }
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, GraphStatus::Code(code) if (200..300).contains(&code))
    }

    /// True when the service rejected the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == GraphStatus::Code(401)
    }

    /// The HTTP status code, if one was received.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self.status {
            GraphStatus::Code(code) => Some(code),
            GraphStatus::Exception => None,
        }
    }

    /// Deserializes the body, returning `None` when it does not parse.
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Authenticated HTTP client for the Graph API.
pub struct GraphClient {
    http: reqwest::Client,
    source: TokenSource,
    base_url: String,
}

impl GraphClient {
    /// Builds a client against `base_url` with the given token source.
    pub fn new(source: TokenSource, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds a managed client from a settings provider, wiring up a fresh
    /// [`TokenManager`] over the given cache.
    pub fn from_settings(
        provider: &dyn SettingsProvider,
        cache: Arc<dyn SharedCache>,
    ) -> Result<Self> {
        let manager = TokenManager::from_provider(provider, cache)?;
        Self::from_token_manager(Arc::new(manager))
    }

    /// Builds a client whose base URL and timeout come from the manager's
    /// settings.
    pub fn from_token_manager(manager: Arc<TokenManager>) -> Result<Self> {
        let settings = manager.settings();
        let base_url = settings.graph_base_url.clone();
        let timeout = Duration::from_secs(settings.http_timeout_seconds);
        Self::new(TokenSource::Managed(manager), &base_url, timeout)
    }

    /// Issues a GET request.
    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> GraphResponse {
        self.request::<Value>(Method::GET, path, None, headers).await
    }

    /// Issues a POST request with a JSON body.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> GraphResponse {
        self.request(Method::POST, path, Some(body), headers).await
    }

    /// Issues a DELETE request.
    pub async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> GraphResponse {
        self.request::<Value>(Method::DELETE, path, None, headers)
            .await
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &[(&str, &str)],
    ) -> GraphResponse {
        let url = self.join(path);
        let token = self.source.bearer().await;
        debug!(%method, url = %url, "sending graph request");

        let first = self
            .send_once(&method, &url, body, headers, token.as_deref())
            .await;
        if !(first.is_unauthorized() && self.source.can_refresh()) {
            return first;
        }

        warn!(url = %url, "401 from graph, refreshing token and retrying once");
        let Some(fresh) = self.source.force_refresh().await else {
            self.log_denied(&method, &url, 401, &first.body);
            return first;
        };

        let second = self
            .send_once(&method, &url, body, headers, Some(&fresh))
            .await;
        if let GraphStatus::Code(code @ (401 | 403)) = second.status {
            self.log_denied(&method, &url, code, &second.body);
        }
        second
    }

    async fn send_once<B: Serialize + ?Sized>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
        headers: &[(&str, &str)],
        token: Option<&str>,
    ) -> GraphResponse {
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(build_headers(token, headers));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let detail = transport_detail(&e);
                warn!(%method, url, error = %detail, "graph request failed in transport");
                return GraphResponse::exception(detail);
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => GraphResponse {
                status: GraphStatus::Code(status),
                body,
            },
            Err(e) => {
                let detail = transport_detail(&e);
                warn!(%method, url, error = %detail, "graph response body unreadable");
                GraphResponse::exception(detail)
            }
        }
    }

    fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn log_denied(&self, method: &Method, url: &str, code: u16, body: &str) {
        let reason = if code == 401 {
            "token rejected after refresh"
        } else {
            "permission denied for the granted scopes"
        };
        let summary = summarize_graph_error(body);
        if summary.is_empty() {
            error!(%method, url, status = code, "graph request denied: {}", reason);
        } else {
            error!(
                %method,
                url,
                status = code,
                "graph request denied: {} ({})",
                reason,
                summary
            );
        }
    }
}

/// Merges the default headers with caller-supplied ones. Caller values win.
fn build_headers(token: Option<&str>, extra: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    if let Some(token) = token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            map.insert(AUTHORIZATION, value);
        }
    }
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in extra {
        match (
            HeaderName::try_from(*name),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = name, "skipping malformed request header"),
        }
    }
    map
}

/// Condenses a Graph error body into a single diagnostic line.
///
/// Pulls `error.code`, `error.message` and the request correlation fields
/// from `error.innerError`, tolerating both the documented `request-id` key
/// and the `requestId` variant some endpoints emit. Returns an empty string
/// when the body is not a Graph error document.
fn summarize_graph_error(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };
    let error = &value["error"];
    let inner = &error["innerError"];

    let mut parts = Vec::new();
    if let Some(code) = error["code"].as_str() {
        parts.push(format!("code={}", code));
    }
    if let Some(message) = error["message"].as_str() {
        parts.push(format!("message={:?}", message));
    }
    if let Some(request_id) = inner["request-id"].as_str().or(inner["requestId"].as_str()) {
        parts.push(format!("request-id={}", request_id));
    }
    if let Some(date) = inner["date"].as_str() {
        parts.push(format!("date={}", date));
    }
    parts.join(" ")
}
