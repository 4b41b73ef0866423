//! Identity-authority client.
//!
//! [`UserPoolProvider`] speaks the user-pool HTTP wire protocol: password
//! login, session retrieval with transparent refresh, and local sign-out.
//! Like the vendor SDKs it mirrors, it keeps its own bookkeeping in the
//! session store under authority-prefixed keys (`<prefix>.<client>.<user>.*`),
//! separate from the console's bearer credential entry.

use crate::auth::store::{AUTHORITY_KEY_PREFIX, SessionStore};
use crate::errors::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

/// A session as reported by the identity authority.
#[derive(Debug, Clone)]
pub struct AuthoritySession {
    /// Bearer credential carried by the session.
    pub id_token: String,
    /// Expiry instant decoded from the credential.
    pub expires_at: DateTime<Utc>,
}

impl AuthoritySession {
    /// Whether the authority still considers the session usable.
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Seam over the identity authority, mockable in tests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Username of the locally established identity handle, if any.
    async fn current_identity(&self) -> Option<String>;

    /// Returns the authority's current session for the local identity,
    /// refreshing the credential when the cached one has expired. A
    /// refresh persists the new credential before returning.
    async fn fetch_session(&self) -> Result<AuthoritySession, SessionError>;

    /// Password login. On success the authority bookkeeping is persisted;
    /// the caller decides whether to persist the bearer credential.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthoritySession, SessionError>;

    /// Discards the local identity handle and its authority bookkeeping.
    async fn sign_out(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

/// Reads the expiry claim without verifying the signature. Verification
/// is the authority's job; the console only needs the timestamp.
fn decode_expiry(token: &str) -> Result<DateTime<Utc>, SessionError> {
    let header =
        decode_header(token).map_err(|e| SessionError::CredentialDecode(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| SessionError::CredentialDecode(e.to_string()))?;

    DateTime::from_timestamp(data.claims.exp, 0)
        .ok_or_else(|| SessionError::CredentialDecode("exp claim out of range".to_string()))
}

#[derive(Debug, Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
    #[serde(rename = "ChallengeName")]
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "IdToken")]
    id_token: Option<String>,
    #[serde(rename = "RefreshToken")]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorityErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    message: Option<String>,
}

/// Identity provider backed by a user-pool HTTP endpoint.
pub struct UserPoolProvider {
    auth_url: String,
    client_id: String,
    store: SessionStore,
    client: Client,
}

impl UserPoolProvider {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        store: SessionStore,
        timeout_seconds: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            store,
            client,
        }
    }

    fn last_user_key(&self) -> String {
        format!("{}.{}.LastAuthUser", AUTHORITY_KEY_PREFIX, self.client_id)
    }

    fn authority_key(&self, username: &str, leaf: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            AUTHORITY_KEY_PREFIX, self.client_id, username, leaf
        )
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: serde_json::Value,
    ) -> Result<InitiateAuthResponse, SessionError> {
        let payload = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });

        let response = self
            .client
            .post(&self.auth_url)
            .header("Content-Type", AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SessionError::Timeout
                } else {
                    SessionError::Authority(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Authority(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<AuthorityErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error_type))
                .unwrap_or_else(|| format!("status {status}"));
            return Err(SessionError::Authority(detail));
        }

        serde_json::from_str(&body).map_err(|e| SessionError::Authority(e.to_string()))
    }

    /// Extracts the credential from an auth response, rejecting challenge
    /// flows the console does not drive.
    fn credential_from(
        &self,
        response: InitiateAuthResponse,
    ) -> Result<(String, Option<String>), SessionError> {
        if response.challenge_name.is_some() {
            return Err(SessionError::Authority(
                "Se requiere cambiar la contraseña. Por favor contacte al administrador."
                    .to_string(),
            ));
        }

        let result = response
            .authentication_result
            .ok_or_else(|| SessionError::Authority("empty authentication result".to_string()))?;
        let id_token = result
            .id_token
            .ok_or_else(|| SessionError::Authority("missing credential in result".to_string()))?;

        Ok((id_token, result.refresh_token))
    }
}

#[async_trait]
impl IdentityProvider for UserPoolProvider {
    async fn current_identity(&self) -> Option<String> {
        self.store.get(&self.last_user_key()).await
    }

    async fn fetch_session(&self) -> Result<AuthoritySession, SessionError> {
        let username = self
            .current_identity()
            .await
            .ok_or(SessionError::NoIdentity)?;

        // Cached credential still inside its validity window: no round trip.
        if let Some(token) = self.store.get(&self.authority_key(&username, "idToken")).await {
            let expires_at = decode_expiry(&token)?;
            if Utc::now() < expires_at {
                return Ok(AuthoritySession {
                    id_token: token,
                    expires_at,
                });
            }
        }

        let refresh_token = self
            .store
            .get(&self.authority_key(&username, "refreshToken"))
            .await
            .ok_or_else(|| {
                SessionError::Authority("session expired and no refresh token".to_string())
            })?;

        debug!("credential expired, refreshing session for {}", username);
        let response = self
            .initiate_auth("REFRESH_TOKEN_AUTH", json!({ "REFRESH_TOKEN": refresh_token }))
            .await?;
        let (id_token, rotated_refresh) = self.credential_from(response)?;
        let expires_at = decode_expiry(&id_token)?;

        self.store
            .set(&self.authority_key(&username, "idToken"), &id_token)
            .await?;
        if let Some(rotated) = rotated_refresh {
            self.store
                .set(&self.authority_key(&username, "refreshToken"), &rotated)
                .await?;
        }
        // The refreshed credential becomes the persisted one, so the
        // validator's comparison sees the same value on both sides.
        self.store.set_credential(&id_token).await?;

        Ok(AuthoritySession {
            id_token,
            expires_at,
        })
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthoritySession, SessionError> {
        let response = self
            .initiate_auth(
                "USER_PASSWORD_AUTH",
                json!({ "USERNAME": username, "PASSWORD": password }),
            )
            .await?;
        let (id_token, refresh_token) = self.credential_from(response)?;
        let expires_at = decode_expiry(&id_token)?;

        self.store.set(&self.last_user_key(), username).await?;
        self.store
            .set(&self.authority_key(username, "idToken"), &id_token)
            .await?;
        if let Some(refresh) = refresh_token {
            self.store
                .set(&self.authority_key(username, "refreshToken"), &refresh)
                .await?;
        }

        info!("authenticated {}", username);
        Ok(AuthoritySession {
            id_token,
            expires_at,
        })
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        let Some(username) = self.current_identity().await else {
            return Ok(());
        };

        self.store
            .remove(&self.authority_key(&username, "idToken"))
            .await?;
        self.store
            .remove(&self.authority_key(&username, "refreshToken"))
            .await?;
        self.store.remove(&self.last_user_key()).await?;
        info!("signed out {}", username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        exp: i64,
    }

    fn make_token(exp: i64) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &TestClaims { exp },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        (Utc::now() + chrono::Duration::hours(1)).timestamp()
    }

    async fn provider(dir: &std::path::Path) -> (UserPoolProvider, SessionStore) {
        let store = SessionStore::open(dir).await.unwrap();
        let provider = UserPoolProvider::new(
            "http://127.0.0.1:1/auth",
            "client-abc",
            store.clone(),
            1,
        );
        (provider, store)
    }

    #[test]
    fn test_decode_expiry_reads_exp_claim() {
        let token = make_token(4102444800); // 2100-01-01
        let expires_at = decode_expiry(&token).unwrap();
        assert_eq!(expires_at.timestamp(), 4102444800);
    }

    #[test]
    fn test_decode_expiry_accepts_expired_tokens() {
        // Expiry extraction must work on stale credentials too.
        let token = make_token(1000);
        assert_eq!(decode_expiry(&token).unwrap().timestamp(), 1000);
    }

    #[test]
    fn test_decode_expiry_rejects_garbage() {
        let err = decode_expiry("not-a-jwt").unwrap_err();
        assert!(matches!(err, SessionError::CredentialDecode(_)));
    }

    #[test]
    fn test_session_validity_window() {
        let live = AuthoritySession {
            id_token: "t".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        };
        assert!(live.is_valid());

        let stale = AuthoritySession {
            id_token: "t".to_string(),
            expires_at: Utc::now() - chrono::Duration::minutes(5),
        };
        assert!(!stale.is_valid());
    }

    #[tokio::test]
    async fn test_authority_key_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _) = provider(dir.path()).await;

        assert_eq!(
            provider.authority_key("ana", "idToken"),
            "CognitoIdentityServiceProvider.client-abc.ana.idToken"
        );
        assert_eq!(
            provider.last_user_key(),
            "CognitoIdentityServiceProvider.client-abc.LastAuthUser"
        );
    }

    #[tokio::test]
    async fn test_fetch_session_without_identity() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _) = provider(dir.path()).await;

        let err = provider.fetch_session().await.unwrap_err();
        assert!(matches!(err, SessionError::NoIdentity));
    }

    #[tokio::test]
    async fn test_fetch_session_returns_cached_valid_credential() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, store) = provider(dir.path()).await;

        let token = make_token(future_exp());
        store
            .set("CognitoIdentityServiceProvider.client-abc.LastAuthUser", "ana")
            .await
            .unwrap();
        store
            .set(
                "CognitoIdentityServiceProvider.client-abc.ana.idToken",
                &token,
            )
            .await
            .unwrap();

        // Resolves from the store alone; the auth endpoint is unreachable.
        let session = provider.fetch_session().await.unwrap();
        assert_eq!(session.id_token, token);
        assert!(session.is_valid());
    }

    #[tokio::test]
    async fn test_fetch_session_expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, store) = provider(dir.path()).await;

        store
            .set("CognitoIdentityServiceProvider.client-abc.LastAuthUser", "ana")
            .await
            .unwrap();
        store
            .set(
                "CognitoIdentityServiceProvider.client-abc.ana.idToken",
                &make_token(1000),
            )
            .await
            .unwrap();

        let err = provider.fetch_session().await.unwrap_err();
        assert!(matches!(err, SessionError::Authority(_)));
    }

    #[tokio::test]
    async fn test_sign_out_clears_authority_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, store) = provider(dir.path()).await;

        store
            .set("CognitoIdentityServiceProvider.client-abc.LastAuthUser", "ana")
            .await
            .unwrap();
        store
            .set(
                "CognitoIdentityServiceProvider.client-abc.ana.idToken",
                "tok",
            )
            .await
            .unwrap();
        store
            .set(
                "CognitoIdentityServiceProvider.client-abc.ana.refreshToken",
                "refresh",
            )
            .await
            .unwrap();

        provider.sign_out().await.unwrap();

        assert_eq!(provider.current_identity().await, None);
        assert_eq!(
            store
                .get("CognitoIdentityServiceProvider.client-abc.ana.idToken")
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_sign_out_without_identity_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _) = provider(dir.path()).await;
        provider.sign_out().await.unwrap();
    }
}
