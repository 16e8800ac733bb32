//! Client configuration

use crate::error::{ClientError, Result};
use std::time::Duration;
use url::Url;

/// Configuration shared by the session manager and the request gateway.
///
/// Use [`from_env()`](ClientConfig::from_env) for convention-based setup,
/// or [`new()`](ClientConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_url: Url,
    auth_prefix: String,
    resource_prefix: String,
    landing_path: String,
    login_path: String,
    trusted_origins: Vec<String>,
    oauth_redirect_uri: String,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Create config for a backend reachable at `api_url`.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            auth_prefix: "/api/auth".into(),
            resource_prefix: "/api/v1".into(),
            landing_path: "/".into(),
            login_path: "/auth/login".into(),
            trusted_origins: vec!["http://localhost:3000".into()],
            oauth_redirect_uri: "http://localhost:3000/auth/callback".into(),
            request_timeout: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `COSTANZA_API_URL`: backend base URL (default `http://localhost:8000`)
    /// - `COSTANZA_APP_ORIGIN`: origin of this application, trusted for credential messages
    /// - `COSTANZA_TRUSTED_ORIGINS`: comma-separated list replacing the trusted origins
    /// - `COSTANZA_OAUTH_REDIRECT_URI`: redirect URI sent with OAuth code exchanges
    /// - `COSTANZA_REQUEST_TIMEOUT_SECS`: per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = var("COSTANZA_API_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let api_url: Url = api_url
            .parse()
            .map_err(|e| ClientError::Configuration(format!("COSTANZA_API_URL: {e}")))?;

        let mut config = Self::new(api_url);

        if let Some(origin) = var("COSTANZA_APP_ORIGIN") {
            let origin = parse_origin(&origin, "COSTANZA_APP_ORIGIN")?;
            config.oauth_redirect_uri = format!("{origin}/auth/callback");
            config.trusted_origins = vec![origin];
        }
        if let Some(origins) = var("COSTANZA_TRUSTED_ORIGINS") {
            config.trusted_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_origin(s, "COSTANZA_TRUSTED_ORIGINS"))
                .collect::<Result<_>>()?;
        }
        if let Some(uri) = var("COSTANZA_OAUTH_REDIRECT_URI") {
            Url::parse(&uri)
                .map_err(|e| ClientError::Configuration(format!("COSTANZA_OAUTH_REDIRECT_URI: {e}")))?;
            config.oauth_redirect_uri = uri;
        }
        if let Some(secs) = var("COSTANZA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                ClientError::Configuration(format!("COSTANZA_REQUEST_TIMEOUT_SECS: {e}"))
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the auth endpoint prefix (default: `/api/auth`).
    #[must_use]
    pub fn with_auth_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.auth_prefix = prefix.into();
        self
    }

    /// Override the resource endpoint prefix (default: `/api/v1`).
    #[must_use]
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = prefix.into();
        self
    }

    /// Location visited after login (default: `/`).
    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Login entry point (default: `/auth/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Origins allowed to deliver credential events. An empty list accepts any origin.
    #[must_use]
    pub fn with_trusted_origins(mut self, origins: Vec<String>) -> Self {
        self.trusted_origins = origins;
        self
    }

    #[must_use]
    pub fn with_oauth_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.oauth_redirect_uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn trusted_origins(&self) -> &[String] {
        &self.trusted_origins
    }

    pub fn oauth_redirect_uri(&self) -> &str {
        &self.oauth_redirect_uri
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn is_trusted_origin(&self, origin: Option<&str>) -> bool {
        if self.trusted_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|o| {
            let o = o.trim_end_matches('/');
            self.trusted_origins.iter().any(|t| t == o)
        })
    }

    /// URL of an auth endpoint, e.g. `auth_url("jwt/create/")`.
    pub fn auth_url(&self, path: &str) -> Result<Url> {
        self.join(&self.auth_prefix, path)
    }

    /// URL of a resource endpoint, e.g. `resource_url("/trilhas/")`.
    pub fn resource_url(&self, path: &str) -> Result<Url> {
        self.join(&self.resource_prefix, path)
    }

    /// Build the shared HTTP client.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn join(&self, prefix: &str, path: &str) -> Result<Url> {
        let full = format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.api_url
            .join(&full)
            .map_err(|e| ClientError::Configuration(format!("invalid endpoint {full}: {e}")))
    }
}

fn parse_origin(raw: &str, var: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::Configuration(format!("{var}: {e}")))?;
    Ok(url.origin().ascii_serialization())
}
