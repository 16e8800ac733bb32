//! Session manager: who is logged in, with which credentials

use crate::auth_client::AuthApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::navigator::Navigator;
use crate::oauth::{AuthMessage, CredentialEvent, CredentialReceiver, EventOutcome, SocialCallback};
use crate::storage::DurableStorage;
use crate::token_store::TokenStore;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shortest password accepted by [`SessionManager::register`]
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Single source of truth for the authenticated user and credential pair.
///
/// The only writer of session slots in durable storage. Transitions are
/// broadcast to [`subscribe`](SessionManager::subscribe) receivers:
///
/// `Uninitialized -> Loading -> {Authenticated | Anonymous}`, then
/// `Authenticated <-> Anonymous` via login, logout, credential events and renewal.
pub struct SessionManager {
    config: ClientConfig,
    api: AuthApi,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    /// Create a session manager over `storage`.
    ///
    /// The session starts `Uninitialized`; call [`hydrate`](Self::hydrate) once at startup.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn DurableStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Arc<Self>> {
        let http_client = config.http_client()?;
        Ok(Self::with_http_client(config, storage, navigator, http_client))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(
        config: ClientConfig,
        storage: Arc<dyn DurableStorage>,
        navigator: Arc<dyn Navigator>,
        http_client: reqwest::Client,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::uninitialized());
        Arc::new(Self {
            api: AuthApi::new(config.clone(), http_client),
            config,
            tokens: TokenStore::new(storage),
            navigator,
            state,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth_api(&self) -> &AuthApi {
        &self.api
    }

    pub(crate) fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub(crate) fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn current(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.state.borrow().session.user.clone()
    }

    /// User snapshot persisted by the last session, available before hydration settles
    pub fn cached_user(&self) -> Option<UserIdentity> {
        self.tokens.user()
    }

    /// Resolves once startup hydration has settled.
    pub async fn wait_ready(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let ready = rx.wait_for(|s| !s.is_loading()).await.map(|s| s.clone());
        // The sender lives in `self`, so an error only happens during teardown
        ready.unwrap_or_else(|_| self.current())
    }

    /// Restore the persisted session, validating the stored access token first.
    ///
    /// Runs once; later calls return immediately. Exactly one of "adopt the
    /// stored session" or [`logout`](Self::logout) happens when both a token and a
    /// cached user exist.
    pub async fn hydrate(&self) {
        let started = self.state.send_if_modified(|s| {
            if s.status == AuthStatus::Uninitialized {
                s.status = AuthStatus::Loading;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("Session already hydrated");
            return;
        }

        let (Some(access_token), Some(_cached)) = (self.tokens.access_token(), self.tokens.user())
        else {
            debug!("No stored session");
            self.set_anonymous();
            return;
        };

        let user = self.fetch_user_data(&access_token).await;

        // A login or credential event during the identity fetch wins
        if self.state.borrow().status != AuthStatus::Loading {
            debug!("Session settled during hydration, discarding stored session");
            return;
        }

        match user {
            Some(user) => {
                self.persist("user", self.tokens.store_user(&user));
                let refresh_token = self.tokens.refresh_token().unwrap_or_default();
                info!(user_id = %user.id, "Restored stored session");
                self.state.send_replace(SessionSnapshot {
                    status: AuthStatus::Authenticated,
                    session: Session {
                        user: Some(user),
                        credentials: Some(CredentialPair::new(access_token, refresh_token)),
                    },
                });
            }
            None => {
                info!("Stored session is no longer valid");
                self.logout();
            }
        }
    }

    /// Overwrite the session with an already validated credential pair and user,
    /// persist it and navigate to the landing location.
    pub fn login(&self, access_token: &str, refresh_token: &str, user: UserIdentity) {
        let mut credentials = CredentialPair::new(access_token, refresh_token);
        self.persist("credentials", self.tokens.store_credentials(&credentials));
        self.persist("user", self.tokens.store_user(&user));
        if credentials.refresh_token.is_empty() {
            credentials.refresh_token = self.tokens.refresh_token().unwrap_or_default();
        }

        info!(user_id = %user.id, "User logged in");
        self.state.send_replace(SessionSnapshot {
            status: AuthStatus::Authenticated,
            session: Session {
                user: Some(user),
                credentials: Some(credentials),
            },
        });

        self.navigator.push(self.config.landing_path());
    }

    /// Clear the session and storage, then navigate to the login entry point.
    pub fn logout(&self) {
        self.persist("session", self.tokens.clear());
        if self.is_authenticated() {
            info!("User logged out");
        }
        self.set_anonymous();
        self.navigator.push(self.config.login_path());
    }

    /// Replace the cached user snapshot without touching credentials.
    pub fn update_user(&self, user: UserIdentity) {
        self.persist("user", self.tokens.store_user(&user));
        self.state.send_modify(|s| s.session.user = Some(user));
    }

    /// Identity behind `access_token`, or `None` if the backend does not accept it.
    ///
    /// Never fails: network errors and rejections both read as `None`.
    pub async fn fetch_user_data(&self, access_token: &str) -> Option<UserIdentity> {
        match self.api.fetch_me(access_token).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to fetch user data");
                None
            }
        }
    }

    /// Create an account (`POST users/`). The session is left untouched.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for a password shorter than
    /// [`MIN_PASSWORD_LENGTH`] (no request is sent), otherwise
    /// [`ClientError::Api`] with the backend's `email`/`password`/`detail` messages.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ClientError::Validation {
                field: "password".to_string(),
                message: format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            });
        }
        self.api.register(email, password).await?;
        info!("Account registered");
        Ok(())
    }

    /// Email/password login: token grant, identity fetch, then [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Rejected credentials surface as [`ClientError::Api`] with the backend's
    /// messages; the session is left untouched on every error path.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let tokens = self.api.create_token(email, password).await?;
        let Some(user) = self.fetch_user_data(&tokens.access).await else {
            return Err(ClientError::Authentication(
                "failed to fetch user data".to_string(),
            ));
        };
        self.login(
            &tokens.access,
            tokens.refresh.as_deref().unwrap_or_default(),
            user.clone(),
        );
        Ok(user)
    }

    /// Log in from the query parameters of the social-login redirect.
    pub fn login_from_callback(&self, params: &HashMap<String, String>) -> Result<UserIdentity> {
        match SocialCallback::from_query(params) {
            SocialCallback::Success {
                access,
                refresh,
                user,
            } => {
                self.login(&access, &refresh, user.clone());
                Ok(user)
            }
            SocialCallback::Failed(reason) => {
                warn!(reason = %reason, "Social login callback failed");
                Err(ClientError::Authentication(reason))
            }
        }
    }

    /// Apply one message from the credential channel.
    pub async fn handle_credential_event(&self, event: CredentialEvent) -> EventOutcome {
        if !self.config.is_trusted_origin(event.origin.as_deref()) {
            warn!(origin = ?event.origin, "Ignoring credential event from untrusted origin");
            return EventOutcome::Ignored;
        }

        match AuthMessage::parse(&event.payload) {
            Some(AuthMessage::Success { tokens }) if !tokens.access.is_empty() => {
                info!("Received credentials from OAuth popup");
                match self.fetch_user_data(&tokens.access).await {
                    Some(user) => {
                        let refresh = tokens.refresh.as_deref().unwrap_or_default();
                        self.login(&tokens.access, refresh, user.clone());
                        EventOutcome::Authenticated(user)
                    }
                    None => {
                        warn!("Failed to fetch user data after OAuth login");
                        self.logout();
                        EventOutcome::Rejected
                    }
                }
            }
            Some(AuthMessage::Failed { .. }) => {
                warn!("OAuth popup reported a failed login");
                EventOutcome::ProviderFailed
            }
            _ => EventOutcome::Ignored,
        }
    }

    /// Consume credential events for as long as the channel stays open.
    pub fn listen(self: &Arc<Self>, mut events: CredentialReceiver) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let outcome = session.handle_credential_event(event).await;
                debug!(outcome = ?outcome, "Credential event handled");
            }
            debug!("Credential channel closed");
        })
    }

    /// Exchange `refresh_token` for a new access token and persist it.
    ///
    /// On failure both tokens are purged and the session becomes anonymous;
    /// navigation is left to the caller. If the session was replaced while the
    /// call was in flight, the renewed token is discarded: a logout yields
    /// [`ClientError::SessionExpired`], a new login yields its access token.
    pub(crate) async fn renew(&self, refresh_token: &str) -> Result<String> {
        match self.api.refresh(refresh_token).await {
            Ok(_) if self.tokens.refresh_token().as_deref() != Some(refresh_token) => {
                match self.tokens.access_token() {
                    Some(current) => {
                        info!("Session replaced during token renewal, discarding renewed token");
                        Ok(current)
                    }
                    None => {
                        info!("Session ended during token renewal, discarding renewed token");
                        Err(ClientError::SessionExpired(
                            "session ended during token renewal".to_string(),
                        ))
                    }
                }
            }
            Ok(pair) => {
                self.persist("access token", self.tokens.store_access_token(&pair.access));
                if let Some(rotated) = pair.refresh.as_deref().filter(|r| !r.is_empty()) {
                    self.persist("refresh token", self.tokens.store_refresh_token(rotated));
                }
                self.state.send_modify(|s| {
                    if let Some(credentials) = s.session.credentials.as_mut() {
                        credentials.access_token = pair.access.clone();
                        if let Some(rotated) = pair.refresh.as_ref().filter(|r| !r.is_empty()) {
                            credentials.refresh_token = rotated.clone();
                        }
                    }
                });
                info!(rotated = pair.refresh.is_some(), "Access token renewed");
                Ok(pair.access)
            }
            Err(e) => {
                warn!(error = %e, "Token renewal failed, purging session");
                self.persist("tokens", self.tokens.clear_tokens());
                self.set_anonymous();
                Err(e)
            }
        }
    }

    fn set_anonymous(&self) {
        let anonymous = SessionSnapshot {
            status: AuthStatus::Anonymous,
            session: Session::default(),
        };
        // Repeated logouts must not wake subscribers
        self.state.send_if_modified(|s| {
            if *s == anonymous {
                return false;
            }
            *s = anonymous;
            true
        });
    }

    fn persist(&self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(slot = %what, error = %e, "Failed to write session storage");
        }
    }
}
