//! Backend auth endpoints: registration, token create, identity, renewal and OAuth exchange

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::*;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

/// Macro to check HTTP response status and return the body as an API error if not successful
macro_rules! check_response {
    ($response:expr) => {
        if !$response.status().is_success() {
            let status = $response.status();
            let text = $response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            return Err(ClientError::Api { status, body });
        }
    };
}

/// Client for the auth endpoints consumed by the session
#[derive(Clone)]
pub struct AuthApi {
    config: ClientConfig,
    http_client: Client,
}

impl AuthApi {
    pub fn new(config: ClientConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Exchange email + password for a token pair (`POST jwt/create/`)
    ///
    /// # Errors
    ///
    /// [`ClientError::Api`] carries the backend's field or `detail` messages on rejection.
    pub async fn create_token(&self, email: &str, password: &str) -> Result<TokenPairResponse> {
        let url = self.config.auth_url("jwt/create/")?;
        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        Self::token_pair(response).await
    }

    /// Create an account (`POST users/`)
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let url = self.config.auth_url("users/")?;
        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        check_response!(response);
        Ok(())
    }

    /// "Who am I" for the given access token (`GET users/me/`)
    pub async fn fetch_me(&self, access_token: &str) -> Result<UserIdentity> {
        let url = self.config.auth_url("users/me/")?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        check_response!(response);
        Ok(response.json().await?)
    }

    /// Renew the access token (`POST jwt/refresh/`)
    ///
    /// Any non-success status is unrecoverable for the session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPairResponse> {
        let url = self.config.auth_url("jwt/refresh/")?;
        let response = self
            .http_client
            .post(url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::SessionExpired(format!(
                "Token refresh failed with status {status}: {text}"
            )));
        }

        let pair: TokenPairResponse = response.json().await?;
        debug!(rotated = pair.refresh.is_some(), "Refresh endpoint issued new access token");
        Ok(pair)
    }

    /// Exchange an OAuth authorization code for a token pair (`POST o/{provider}/`)
    pub async fn exchange_oauth_code(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenPairResponse> {
        let url = self.config.auth_url(&format!("o/{provider}/"))?;
        let response = self
            .http_client
            .post(url)
            .json(&OAuthCodeRequest { code, redirect_uri })
            .send()
            .await?;

        Self::token_pair(response).await
    }

    async fn token_pair(response: Response) -> Result<TokenPairResponse> {
        check_response!(response);
        let pair: TokenPairResponse = response.json().await?;
        if pair.access.is_empty() {
            return Err(ClientError::InvalidResponse(
                "token response without access token".to_string(),
            ));
        }
        Ok(pair)
    }
}
