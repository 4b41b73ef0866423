//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the remote API endpoints, the identity-authority endpoint, and the local
//! state directory holding the persisted credential.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the documents API (get_facturas, url_put, procesar_documentos).
    pub facturas_api_url: String,
    /// Base URL of the agenda/management API (agenda CRUD, document edit/delete).
    pub agenda_api_url: String,
    /// Identity-authority endpoint (user-pool HTTP API).
    pub auth_url: String,
    /// App-client id registered with the user pool.
    pub client_id: String,
    /// Directory holding the credential state file.
    pub state_dir: PathBuf,
    /// Login path the console navigates to on any invalid-session outcome.
    pub login_path: String,
    pub http_timeout_seconds: u64,
    /// Interval between the route guard's periodic re-validations.
    pub guard_interval_seconds: u64,
    /// Interval between list refreshes in watch mode.
    pub watch_interval_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let facturas_api_url =
            env::var("REMESA_FACTURAS_API_URL").context("REMESA_FACTURAS_API_URL not set")?;

        let agenda_api_url =
            env::var("REMESA_AGENDA_API_URL").context("REMESA_AGENDA_API_URL not set")?;

        let auth_url = env::var("REMESA_AUTH_URL").context("REMESA_AUTH_URL not set")?;

        let client_id = env::var("REMESA_CLIENT_ID").context("REMESA_CLIENT_ID not set")?;

        let state_dir = env::var("REMESA_STATE_DIR").unwrap_or_else(|_| "~/.remesa".to_string());
        let state_dir = expanduser::expanduser(&state_dir)
            .context("REMESA_STATE_DIR could not be expanded")?;

        let login_path = env::var("REMESA_LOGIN_PATH").unwrap_or_else(|_| "/login".to_string());

        let http_timeout_seconds = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("HTTP_TIMEOUT_SECS must be a valid number")?;

        let guard_interval_seconds = env::var("GUARD_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("GUARD_INTERVAL_SECS must be a valid number")?;

        let watch_interval_seconds = env::var("WATCH_INTERVAL_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("WATCH_INTERVAL_SECS must be a valid number")?;

        Ok(Config {
            facturas_api_url,
            agenda_api_url,
            auth_url,
            client_id,
            state_dir,
            login_path,
            http_timeout_seconds,
            guard_interval_seconds,
            watch_interval_seconds,
        })
    }
}
