//! Navigation port used by the session manager and the gateway

use tracing::debug;

/// Moves the application to another location.
pub trait Navigator: Send + Sync + 'static {
    /// Client-side route change
    fn push(&self, path: &str);

    /// Full reload of the target location, discarding in-memory state
    fn hard_redirect(&self, path: &str);
}

/// Navigator for headless use: only logs the requested location
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn push(&self, path: &str) {
        debug!(path = %path, "Navigation requested");
    }

    fn hard_redirect(&self, path: &str) {
        debug!(path = %path, "Hard redirect requested");
    }
}
