//! Provider scope for UI bindings
//!
//! Code running inside [`provide`] can reach the session through
//! [`use_session`]. Calling it anywhere else is a programming error and panics.

use crate::session::SessionManager;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static SESSION: Arc<SessionManager>;
}

/// Run `fut` with `session` available to [`use_session`].
pub async fn provide<F: Future>(session: Arc<SessionManager>, fut: F) -> F::Output {
    SESSION.scope(session, fut).await
}

/// The session of the enclosing [`provide`] scope.
///
/// # Panics
///
/// Panics when called outside a [`provide`] scope.
pub fn use_session() -> Arc<SessionManager> {
    try_use_session().unwrap_or_else(|| panic!("use_session must be used within a session provider"))
}

/// Like [`use_session`], but `None` outside a provider scope.
pub fn try_use_session() -> Option<Arc<SessionManager>> {
    SESSION.try_with(Arc::clone).ok()
}
