//! Session guard for protected workflows.
//!
//! The guard runs one validation at mount and then re-validates on a
//! fixed interval for as long as the workflow stays open. The first
//! failed check is terminal: the store is purged, the navigator fires,
//! and the state lands on `Redirecting` for good.

use crate::auth::navigator::Navigator;
use crate::auth::store::SessionStore;
use crate::auth::validator::TokenValidator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

/// Lifecycle of a guarded workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Initial validation still running; nothing rendered yet.
    Loading,
    /// Session valid; the protected workflow is live.
    Authenticated,
    /// Session invalid; the workflow is being torn down. Terminal.
    Redirecting,
}

struct GuardInner {
    validator: TokenValidator,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    state_tx: watch::Sender<GuardState>,
    check_in_flight: AtomicBool,
}

impl GuardInner {
    /// Runs one validation pass and applies the transition. Returns the
    /// state after the pass. Concurrent callers (the interval tick and
    /// an on-demand refresh check) never overlap: whoever loses the
    /// in-flight race just reports the current state.
    async fn run_check(&self) -> GuardState {
        if *self.state_tx.borrow() == GuardState::Redirecting {
            return GuardState::Redirecting;
        }
        if self.check_in_flight.swap(true, Ordering::SeqCst) {
            debug!("validation already in flight, skipping");
            return *self.state_tx.borrow();
        }

        let valid = self.validator.validate().await;
        self.check_in_flight.store(false, Ordering::SeqCst);

        if valid {
            self.state_tx.send_replace(GuardState::Authenticated);
            GuardState::Authenticated
        } else {
            self.deny().await;
            GuardState::Redirecting
        }
    }

    async fn deny(&self) {
        if let Err(e) = self.store.purge().await {
            error!("failed to purge session store: {}", e);
        }
        self.navigator.redirect_to_login(&self.login_path);
        self.state_tx.send_replace(GuardState::Redirecting);
    }
}

/// Guards a workflow for its lifetime; dropping it cancels the
/// recurring check.
pub struct SessionGuard {
    inner: Arc<GuardInner>,
    state_rx: watch::Receiver<GuardState>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionGuard {
    /// Mounts the guard: runs the initial validation and, when it
    /// admits, schedules the periodic re-check every `period`.
    pub async fn mount(
        validator: TokenValidator,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
        period: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(GuardState::Loading);
        let inner = Arc::new(GuardInner {
            validator,
            store,
            navigator,
            login_path: login_path.into(),
            state_tx,
            check_in_flight: AtomicBool::new(false),
        });

        let mut ticker = None;
        if inner.run_check().await == GuardState::Authenticated {
            let tick_inner = inner.clone();
            ticker = Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick completes immediately and the initial
                // check already ran, so consume it.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if tick_inner.run_check().await == GuardState::Redirecting {
                        break;
                    }
                }
            }));
        }

        Self {
            inner,
            state_rx,
            ticker,
        }
    }

    pub fn state(&self) -> GuardState {
        *self.state_rx.borrow()
    }

    /// True while the guard admits the protected workflow.
    pub fn is_authenticated(&self) -> bool {
        self.state() == GuardState::Authenticated
    }

    /// Runs an on-demand re-validation, used by refresh loops that
    /// check the session between scheduled ticks.
    pub async fn revalidate_now(&self) -> GuardState {
        self.inner.run_check().await
    }

    /// A receiver for observing state transitions, e.g. to stop a
    /// refresh loop the moment the guard starts redirecting.
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state_rx.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::{AuthoritySession, IdentityProvider};
    use crate::auth::navigator::testing::RecordingNavigator;
    use crate::errors::SessionError;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Echoes back whatever credential the store currently holds, so
    /// tests drive validity purely through the store.
    struct EchoProvider {
        store: SessionStore,
    }

    #[async_trait]
    impl IdentityProvider for EchoProvider {
        async fn current_identity(&self) -> Option<String> {
            Some("ana".to_string())
        }

        async fn fetch_session(&self) -> Result<AuthoritySession, SessionError> {
            let token = self
                .store
                .credential()
                .await
                .ok_or(SessionError::NoIdentity)?;
            Ok(AuthoritySession {
                id_token: token,
                expires_at: Utc::now() + chrono::Duration::minutes(5),
            })
        }

        async fn authenticate(
            &self,
            _username: &str,
            _password: &str,
        ) -> Result<AuthoritySession, SessionError> {
            unimplemented!("not used by the guard")
        }

        async fn sign_out(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    async fn setup(
        with_credential: bool,
    ) -> (
        tempfile::TempDir,
        SessionStore,
        TokenValidator,
        Arc<RecordingNavigator>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        if with_credential {
            store.set_credential("tok").await.unwrap();
        }
        let provider = Arc::new(EchoProvider {
            store: store.clone(),
        });
        let validator =
            TokenValidator::new(provider, store.clone(), Duration::from_millis(100));
        let navigator = Arc::new(RecordingNavigator::default());
        (dir, store, validator, navigator)
    }

    #[tokio::test]
    async fn test_mount_with_valid_session_authenticates() {
        let (_dir, store, validator, navigator) = setup(true).await;

        let guard = SessionGuard::mount(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            Duration::from_secs(60),
        )
        .await;

        assert_eq!(guard.state(), GuardState::Authenticated);
        assert!(guard.is_authenticated());
        assert!(navigator.redirects().is_empty());
        assert_eq!(store.credential().await, Some("tok".to_string()));
    }

    #[tokio::test]
    async fn test_mount_with_invalid_session_redirects() {
        let (_dir, store, validator, navigator) = setup(false).await;

        let guard = SessionGuard::mount(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            Duration::from_secs(60),
        )
        .await;

        assert_eq!(guard.state(), GuardState::Redirecting);
        assert_eq!(navigator.redirects(), vec!["/login".to_string()]);
        assert_eq!(store.credential().await, None);
    }

    #[tokio::test]
    async fn test_periodic_check_catches_invalidation() {
        let (_dir, store, validator, navigator) = setup(true).await;

        let guard = SessionGuard::mount(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            Duration::from_millis(40),
        )
        .await;
        assert_eq!(guard.state(), GuardState::Authenticated);

        // Invalidate out of band; a later tick must notice.
        store.remove(crate::auth::store::ID_TOKEN_KEY).await.unwrap();

        let mut rx = guard.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while *rx.borrow_and_update() != GuardState::Redirecting {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("guard never noticed the invalidation");

        assert_eq!(navigator.redirects(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_revalidate_now_reports_invalidation() {
        let (_dir, store, validator, navigator) = setup(true).await;

        let guard = SessionGuard::mount(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            Duration::from_secs(60),
        )
        .await;

        store.remove(crate::auth::store::ID_TOKEN_KEY).await.unwrap();
        assert_eq!(guard.revalidate_now().await, GuardState::Redirecting);
        assert_eq!(navigator.redirects(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_redirecting_is_terminal() {
        let (_dir, store, validator, navigator) = setup(false).await;

        let guard = SessionGuard::mount(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            Duration::from_secs(60),
        )
        .await;
        assert_eq!(guard.state(), GuardState::Redirecting);

        // Restoring a credential afterwards must not resurrect the guard.
        store.set_credential("tok").await.unwrap();
        assert_eq!(guard.revalidate_now().await, GuardState::Redirecting);
        assert_eq!(guard.state(), GuardState::Redirecting);
        // The one mount-time redirect is the only one fired.
        assert_eq!(navigator.redirects().len(), 1);
    }
}
