//! Credential events delivered from outside the session (OAuth popup completion)
//!
//! The popup that finishes the provider handshake posts one of two messages to
//! its opener:
//!
//! ```json
//! {"type": "AUTH_SUCCESS", "tokens": {"access": "...", "refresh": "..."}}
//! {"type": "AUTH_FAILED", "error": ...}
//! ```
//!
//! The transport is a plain channel here; browser `postMessage`, deep links or
//! native IPC only need to feed a [`CredentialSender`].

use crate::auth_client::AuthApi;
use crate::error::ClientError;
use crate::types::{TokenPairResponse, UserIdentity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Message shape exchanged between the popup and its opener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthMessage {
    #[serde(rename = "AUTH_SUCCESS")]
    Success { tokens: TokenPairResponse },

    #[serde(rename = "AUTH_FAILED")]
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
}

impl AuthMessage {
    /// Parse a raw message payload; anything that is not one of the two shapes is `None`
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }

    fn failed(error: impl Into<Value>) -> Self {
        AuthMessage::Failed {
            error: Some(error.into()),
        }
    }
}

/// One message received on the credential channel, with its sender origin if known
#[derive(Debug, Clone)]
pub struct CredentialEvent {
    pub origin: Option<String>,
    pub payload: Value,
}

/// What the session did with a credential event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Unknown shape or untrusted origin
    Ignored,
    /// Tokens accepted and the identity fetched; the session is authenticated
    Authenticated(UserIdentity),
    /// Tokens received but the identity fetch failed; the session was logged out
    Rejected,
    /// The popup reported a provider failure
    ProviderFailed,
}

/// Writing half of the credential channel
#[derive(Debug, Clone)]
pub struct CredentialSender {
    tx: mpsc::Sender<CredentialEvent>,
}

pub type CredentialReceiver = mpsc::Receiver<CredentialEvent>;

/// Create a bounded credential channel
pub fn credential_channel(capacity: usize) -> (CredentialSender, CredentialReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (CredentialSender { tx }, rx)
}

impl CredentialSender {
    /// Post a raw payload. Returns false once the listening session is gone.
    pub async fn post(&self, origin: Option<&str>, payload: Value) -> bool {
        let event = CredentialEvent {
            origin: origin.map(str::to_string),
            payload,
        };
        self.tx.send(event).await.is_ok()
    }

    pub async fn post_message(&self, origin: Option<&str>, message: &AuthMessage) -> bool {
        match serde_json::to_value(message) {
            Ok(payload) => self.post(origin, payload).await,
            Err(_) => false,
        }
    }
}

/// Popup side of the OAuth flow: turns the provider's authorization code into
/// the message posted back to the opener.
pub struct OAuthCallback {
    api: AuthApi,
}

impl OAuthCallback {
    pub fn new(api: AuthApi) -> Self {
        Self { api }
    }

    /// Complete the handshake for `provider` with the `code` found in the callback URL.
    pub async fn complete(&self, provider: &str, code: Option<&str>) -> AuthMessage {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            warn!(provider = %provider, "OAuth callback without authorization code");
            return AuthMessage::Failed { error: None };
        };

        let redirect_uri = self.api.config().oauth_redirect_uri().to_string();
        match self
            .api
            .exchange_oauth_code(provider, code, &redirect_uri)
            .await
        {
            Ok(tokens) => {
                info!(provider = %provider, "OAuth code exchanged for tokens");
                AuthMessage::Success { tokens }
            }
            Err(ClientError::Api { status, body }) => {
                warn!(provider = %provider, status = %status, "OAuth code exchange rejected");
                AuthMessage::failed(body)
            }
            Err(e) if e.is_connectivity() => {
                warn!(provider = %provider, error = %e, "OAuth code exchange unreachable");
                AuthMessage::failed("Network Error")
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "OAuth code exchange failed");
                AuthMessage::failed(e.to_string())
            }
        }
    }
}

/// Tokens and identity passed as query parameters by the social-login redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialCallback {
    Success {
        access: String,
        refresh: String,
        user: UserIdentity,
    },
    Failed(String),
}

impl SocialCallback {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.is_empty());

        if let Some(error) = get("error") {
            return SocialCallback::Failed(error.to_string());
        }

        let (Some(access), Some(user_id), Some(email)) =
            (get("access"), get("user_id"), get("user_email"))
        else {
            return SocialCallback::Failed("missing authentication data".to_string());
        };

        let Ok(id) = user_id.parse::<i64>() else {
            return SocialCallback::Failed(format!("invalid user id: {user_id}"));
        };

        SocialCallback::Success {
            access: access.to_string(),
            refresh: get("refresh").unwrap_or_default().to_string(),
            user: UserIdentity {
                id,
                username: get("user_username").unwrap_or(email).to_string(),
                email: email.to_string(),
            },
        }
    }
}
