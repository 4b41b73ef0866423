//! Authenticated request gateway.
//!
//! Every outbound call to the remote API goes through here: the session
//! is re-validated first, and only then is the request forwarded with
//! the credential injected. An invalid session purges the store, fires
//! the login redirect, and fails fast with [`ApiError::InvalidToken`]
//! before the transport is ever touched.

use crate::auth::navigator::Navigator;
use crate::auth::store::SessionStore;
use crate::auth::validator::TokenValidator;
use crate::errors::{ApiError, ApiResult};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct RequestGateway {
    validator: TokenValidator,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    client: Client,
}

impl RequestGateway {
    pub fn new(
        validator: TokenValidator,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
        timeout_seconds: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            validator,
            store,
            navigator,
            login_path: login_path.into(),
            client,
        }
    }

    /// Validates the session and returns a request builder carrying the
    /// credential and content-type headers. The credential is re-read
    /// from the store after validation, since validation may have
    /// refreshed it.
    pub async fn authorized_request(
        &self,
        method: Method,
        url: &str,
    ) -> ApiResult<RequestBuilder> {
        if !self.validator.validate().await {
            self.deny().await;
            return Err(ApiError::InvalidToken);
        }

        let Some(token) = self.store.credential().await else {
            // Validation passed but the credential vanished underneath us.
            warn!("credential missing after successful validation");
            self.deny().await;
            return Err(ApiError::InvalidToken);
        };

        debug!("forwarding {} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header("auth", token)
            .header("Content-Type", "application/json"))
    }

    /// Validates, injects the credential, and sends the request.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<Response> {
        let builder = self.authorized_request(method, url).await?;
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        Ok(builder.send().await?)
    }

    pub async fn get(&self, url: &str) -> ApiResult<Response> {
        self.request(Method::GET, url, None).await
    }

    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> ApiResult<Response> {
        self.request(Method::POST, url, Some(body)).await
    }

    async fn deny(&self) {
        if let Err(e) = self.store.purge().await {
            error!("failed to purge session store: {}", e);
        }
        self.navigator.redirect_to_login(&self.login_path);
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
            unimplemented!("not used by the gateway")
        }

        async fn sign_out(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    async fn gateway_with(
        credential: Option<&str>,
    ) -> (
        tempfile::TempDir,
        SessionStore,
        Arc<RecordingNavigator>,
        RequestGateway,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path()).await.unwrap();
        if let Some(token) = credential {
            store.set_credential(token).await.unwrap();
        }
        let provider = Arc::new(EchoProvider {
            store: store.clone(),
        });
        let validator =
            TokenValidator::new(provider, store.clone(), Duration::from_millis(100));
        let navigator = Arc::new(RecordingNavigator::default());
        let gateway = RequestGateway::new(
            validator,
            store.clone(),
            navigator.clone(),
            "/login",
            1,
        );
        (dir, store, navigator, gateway)
    }

    #[tokio::test]
    async fn test_invalid_session_fails_fast_without_transport() {
        let (_dir, store, navigator, gateway) = gateway_with(None).await;

        // The URL is unreachable; an attempted send would be a Network
        // error, so InvalidToken proves the transport was never touched.
        let err = gateway
            .request(Method::GET, "http://127.0.0.1:1/get_facturas", None)
            .await
            .unwrap_err();

        assert!(err.is_invalid_token());
        assert_eq!(navigator.redirects(), vec!["/login".to_string()]);
        assert_eq!(store.credential().await, None);
    }

    #[tokio::test]
    async fn test_valid_session_injects_credential_headers() {
        let (_dir, _store, navigator, gateway) = gateway_with(Some("tok-55")).await;

        let request = gateway
            .authorized_request(Method::POST, "http://example.invalid/agenda")
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.headers().get("auth").unwrap(), "tok-55");
        assert_eq!(
            request.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_session_purges_authority_keys_too() {
        let (_dir, store, _navigator, gateway) = gateway_with(None).await;
        store
            .set("CognitoIdentityServiceProvider.c.ana.idToken", "tok")
            .await
            .unwrap();

        let _ = gateway
            .request(Method::GET, "http://127.0.0.1:1/agenda", None)
            .await;

        assert_eq!(
            store
                .get("CognitoIdentityServiceProvider.c.ana.idToken")
                .await,
            None
        );
    }
}
