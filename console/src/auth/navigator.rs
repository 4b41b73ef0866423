//! Navigation seam for invalid-session outcomes.

use tracing::warn;

/// Destination of every invalid-session redirect.
///
/// The guard and the gateway both funnel their deny path through this
/// trait so tests can observe the redirect without tearing anything down.
pub trait Navigator: Send + Sync {
    /// Performs the full navigation to the login view at `login_path`.
    fn redirect_to_login(&self, login_path: &str);
}

/// Production navigator: abandons the current workflow and tells the
/// operator to sign in again.
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect_to_login(&self, login_path: &str) {
        warn!("session no longer valid, redirecting to {}", login_path);
        println!("Sesión expirada. Inicie sesión nuevamente con `console login`.");
    }
}
