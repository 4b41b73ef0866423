//! Session validation.
//!
//! One boolean answer to "is the persisted session still good?". The
//! check never mutates anything itself and never errors: every failure
//! mode, including a hung authority call, collapses to `false`.

use crate::auth::identity::IdentityProvider;
use crate::auth::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Read-only session check shared by the guard and the gateway.
#[derive(Clone)]
pub struct TokenValidator {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
    authority_timeout: Duration,
}

impl TokenValidator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: SessionStore,
        authority_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            authority_timeout,
        }
    }

    /// Validates the current session.
    ///
    /// The session is valid only when an identity handle exists, a
    /// credential is persisted, the authority reports a live session,
    /// and the authority's credential matches the persisted one exactly.
    /// The comparison reads the store after the fetch, since a refresh
    /// performed while serving it also rewrites the persisted credential.
    pub async fn validate(&self) -> bool {
        if self.provider.current_identity().await.is_none() {
            debug!("no identity handle established");
            return false;
        }
        if self.store.credential().await.is_none() {
            debug!("no credential persisted");
            return false;
        }

        let session = match timeout(self.authority_timeout, self.provider.fetch_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                debug!("session fetch failed: {}", e);
                return false;
            }
            Err(_) => {
                warn!(
                    "session fetch timed out after {:?}",
                    self.authority_timeout
                );
                return false;
            }
        };

        if !session.is_valid() {
            debug!("authority session is expired");
            return false;
        }

        match self.store.credential().await {
            Some(stored) if stored == session.id_token => true,
            Some(_) => {
                debug!("credential does not match authority session");
                false
            }
            None => false,
        }
    }
}
