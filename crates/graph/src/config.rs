//! Integration configuration
//!
//! Settings are read once at construction time through a
//! [`SettingsProvider`]; missing or blank credentials fail construction with
//! [`GraphError::Config`] instead of surfacing later as silent empty values.
//!
//! ## Environment Variables
//! [`EnvSettings`] reads:
//! - `WORKBRIDGE_TENANT_ID`: Entra tenant id (required)
//! - `WORKBRIDGE_CLIENT_ID`: application (client) id (required)
//! - `WORKBRIDGE_CLIENT_SECRET`: client secret (required)
//! - `WORKBRIDGE_GRAPH_SCOPE`: OAuth scope override
//! - `WORKBRIDGE_SITE_URL`: default SharePoint site base URL
//! - `WORKBRIDGE_TOKEN_REFRESH_SKEW`: proactive refresh window in seconds
//! - `WORKBRIDGE_HTTP_TIMEOUT`: request timeout in seconds

use std::str::FromStr;

use crate::error::{GraphError, Result};

/// Scope requested when none is configured
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Identity platform base URL
pub const DEFAULT_AUTHORITY_BASE_URL: &str = "https://login.microsoftonline.com";

/// Graph API base URL
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Tokens are refreshed once this close to expiry (seconds)
pub const DEFAULT_REFRESH_SKEW_SECONDS: i64 = 60;

/// Request timeout applied to every outbound call (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Connection settings for the identity platform and the Graph API
#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Entra tenant id
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret for the credentials grant
    pub client_secret: String,
    /// OAuth scope sent with every token request
    pub scope: String,
    /// Remaining lifetime at or below which a token is refreshed
    pub refresh_skew_seconds: i64,
    /// Identity platform base URL (overridable for tests)
    pub authority_base_url: String,
    /// Graph API base URL (overridable for tests)
    pub graph_base_url: String,
    /// Default SharePoint site base for embed URL reconstruction
    pub site_base_url: Option<String>,
    /// Timeout applied to token and Graph requests
    pub http_timeout_seconds: u64,
}

impl GraphSettings {
    /// Create settings with the standard endpoints and defaults
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: DEFAULT_SCOPE.to_string(),
            refresh_skew_seconds: DEFAULT_REFRESH_SKEW_SECONDS,
            authority_base_url: DEFAULT_AUTHORITY_BASE_URL.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            site_base_url: None,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
        }
    }

    /// Check that every required credential is present
    ///
    /// # Errors
    /// Returns [`GraphError::Config`] naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        require(&self.tenant_id, "tenant_id")?;
        require(&self.client_id, "client_id")?;
        require(&self.client_secret, "client_secret")?;
        Ok(())
    }

    /// Token endpoint for this tenant
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_base_url.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::Config(format!("{} must not be blank", name)));
    }
    Ok(())
}

/// Source of validated [`GraphSettings`]
///
/// Components that build their own token manager take a provider instead of
/// reading ambient configuration directly.
pub trait SettingsProvider: Send + Sync {
    /// Produce validated settings
    ///
    /// # Errors
    /// Returns [`GraphError::Config`] when required values are missing or
    /// blank.
    fn graph_settings(&self) -> Result<GraphSettings>;
}

impl SettingsProvider for GraphSettings {
    fn graph_settings(&self) -> Result<GraphSettings> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Reads settings from `WORKBRIDGE_*` environment variables
///
/// See the module documentation for the variable list.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl SettingsProvider for EnvSettings {
    fn graph_settings(&self) -> Result<GraphSettings> {
        let tenant_id = env_var("WORKBRIDGE_TENANT_ID")?;
        let client_id = env_var("WORKBRIDGE_CLIENT_ID")?;
        let client_secret = env_var("WORKBRIDGE_CLIENT_SECRET")?;

        let mut settings = GraphSettings::new(tenant_id, client_id, client_secret);
        if let Ok(scope) = std::env::var("WORKBRIDGE_GRAPH_SCOPE") {
            settings.scope = scope;
        }
        settings.site_base_url = std::env::var("WORKBRIDGE_SITE_URL").ok();
        if let Some(skew) = env_parse::<i64>("WORKBRIDGE_TOKEN_REFRESH_SKEW")? {
            settings.refresh_skew_seconds = skew;
        }
        if let Some(timeout) = env_parse::<u64>("WORKBRIDGE_HTTP_TIMEOUT")? {
            settings.http_timeout_seconds = timeout;
        }

        settings.validate()?;
        tracing::debug!(
            tenant_id = %settings.tenant_id,
            "graph settings loaded from environment"
        );
        Ok(settings)
    }
}

/// Get required environment variable
///
/// # Errors
/// Returns [`GraphError::Config`] if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| GraphError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional numeric environment variable
///
/// Absent variables are `Ok(None)`; present but unparseable values are a
/// configuration error rather than a silent fallback.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| GraphError::Config(format!("Invalid value for {}: {}", key, e))),
    }
}
