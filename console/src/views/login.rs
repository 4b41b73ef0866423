//! Login and logout workflows.

use crate::auth::{IdentityProvider, SessionStore};
use crate::errors::SessionError;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::info;

pub struct LoginView {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
}

impl LoginView {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: SessionStore) -> Self {
        Self { provider, store }
    }

    /// Authenticates against the identity authority and persists the
    /// bearer credential. Missing inputs are prompted for.
    pub async fn login(
        &self,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<(), SessionError> {
        let username = match username {
            Some(u) => u,
            None => prompt("Usuario: ")?,
        };
        let password = match password {
            Some(p) => p,
            None => prompt("Contraseña: ")?,
        };

        let session = self.provider.authenticate(&username, &password).await?;
        self.store.set_credential(&session.id_token).await?;

        info!("login completed for {}", username);
        println!("Sesión iniciada como {username}.");
        Ok(())
    }

    /// Signs out and clears every persisted session entry.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.provider.sign_out().await?;
        self.store.purge().await?;
        println!("Sesión cerrada.");
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String, SessionError> {
    print!("{label}");
    io::stdout()
        .flush()
        .map_err(|e| SessionError::Store(e.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| SessionError::Store(e.to_string()))?;
    Ok(line.trim().to_string())
}
