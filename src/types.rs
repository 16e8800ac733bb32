//! Type definitions for authentication

use serde::{Deserialize, Serialize};

/// Access + refresh credential pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    /// May be empty when the grant did not issue one (some social logins)
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Minimal identity snapshot cached next to the credentials.
///
/// The full profile lives in the backend and is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Lifecycle of the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// In-memory record of the current user and credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<UserIdentity>,
    pub credentials: Option<CredentialPair>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
            && self
                .credentials
                .as_ref()
                .is_some_and(|c| !c.access_token.is_empty())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }
}

/// What subscribers observe on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub session: Session,
}

impl SessionSnapshot {
    pub(crate) fn uninitialized() -> Self {
        Self {
            status: AuthStatus::Uninitialized,
            session: Session::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// True until startup hydration has settled
    pub fn is_loading(&self) -> bool {
        matches!(self.status, AuthStatus::Uninitialized | AuthStatus::Loading)
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.session.user.as_ref()
    }
}

/// Body of `POST jwt/create/` and `POST users/`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST jwt/refresh/`
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Body of `POST o/{provider}/`
#[derive(Debug, Clone, Serialize)]
pub struct OAuthCodeRequest<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
}

/// Token grant as returned by create, refresh and OAuth exchange.
///
/// `refresh` is optional: rotation on renewal depends on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}
