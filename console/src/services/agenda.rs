//! Agenda contact operations.
//!
//! Contacts are stored as flat rows under composite sort keys; creating
//! a contact writes a parent row and, best-effort, one child row per
//! provided address. Duplicate detection relies on the API's nested 409,
//! surfaced as [`ApiError::Conflict`]. Child creation failures during a
//! contact create are logged and swallowed: the contact itself exists,
//! so the operation is reported as a success.

use crate::auth::RequestGateway;
use crate::errors::{ApiError, ApiResult};
use crate::records::{Contacto, group_contactos};
use crate::services::common;
use crate::utils::{cliente_sk, format_phone, is_valid_phone, mail_sk, numero_sk};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const PHONE_FORMAT_MESSAGE: &str =
    "El número debe comenzar con + seguido solo de números, sin espacios ni guiones";

pub struct AgendaService {
    gateway: Arc<RequestGateway>,
    agenda_url: String,
}

impl AgendaService {
    pub fn new(gateway: Arc<RequestGateway>, agenda_url: impl Into<String>) -> Self {
        Self {
            gateway,
            agenda_url: agenda_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/agenda", self.agenda_url)
    }

    /// Lists all contacts, grouped from the flat row list.
    pub async fn list(&self) -> ApiResult<Vec<Contacto>> {
        let response = self.gateway.get(&self.endpoint()).await?;
        let envelope = common::read_envelope(response).await?;
        let body = envelope.decode_body()?;

        let contactos = match body.as_array() {
            Some(items) => group_contactos(items),
            None => {
                warn!("agenda body is not a list, treating as empty");
                Vec::new()
            }
        };

        info!("listed {} contacts", contactos.len());
        Ok(contactos)
    }

    /// Creates a contact, optionally with one mail and one phone.
    ///
    /// The parent row must succeed; a duplicate surfaces as a conflict.
    /// Child rows are best-effort.
    pub async fn create_contacto(
        &self,
        nombre: &str,
        mail: Option<&str>,
        celular: Option<&str>,
    ) -> ApiResult<String> {
        if nombre.is_empty() {
            return Err(ApiError::invalid_input(
                "El nombre del cliente es obligatorio",
            ));
        }

        let celular = celular.map(normalized_phone).transpose()?;

        let sk = cliente_sk();
        self.post_row(&json!({
            "sk": sk,
            "pkgsi1": "cliente",
            "skgsi1": nombre,
        }))
        .await?;
        info!("created contact {}", sk);

        if let Some(mail) = mail {
            if let Err(e) = self.post_child(&mail_sk(&sk), "mail", mail).await {
                warn!("mail entry failed for new contact {}: {}", sk, e);
            }
        }
        if let Some(celular) = celular {
            if let Err(e) = self.post_child(&numero_sk(&sk), "numero", &celular).await {
                warn!("phone entry failed for new contact {}: {}", sk, e);
            }
        }

        Ok(sk)
    }

    /// Renames a contact in place.
    pub async fn rename_contacto(&self, sk: &str, nombre: &str) -> ApiResult<()> {
        if sk.is_empty() || nombre.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del contacto y el nuevo nombre",
            ));
        }

        self.post_row(&json!({ "sk": sk, "skgsi1": nombre })).await?;
        info!("renamed contact {}", sk);
        Ok(())
    }

    /// Adds a mail entry to an existing contact. Unlike during create,
    /// failures here surface to the caller.
    pub async fn add_mail(&self, contacto_sk: &str, mail: &str) -> ApiResult<()> {
        if contacto_sk.is_empty() || mail.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del contacto y el email",
            ));
        }

        self.post_child(&mail_sk(contacto_sk), "mail", mail).await?;
        info!("added mail to contact {}", contacto_sk);
        Ok(())
    }

    /// Adds a phone entry to an existing contact.
    pub async fn add_celular(&self, contacto_sk: &str, celular: &str) -> ApiResult<()> {
        if contacto_sk.is_empty() || celular.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del contacto y el celular",
            ));
        }
        let formatted = normalized_phone(celular)?;

        self.post_child(&numero_sk(contacto_sk), "numero", &formatted)
            .await?;
        info!("added phone to contact {}", contacto_sk);
        Ok(())
    }

    /// Rewrites an existing mail entry, addressed by its own sort key.
    pub async fn edit_mail(&self, entry_sk: &str, mail: &str) -> ApiResult<()> {
        if entry_sk.is_empty() || mail.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del email y el nuevo valor",
            ));
        }

        self.post_row(&json!({ "sk": entry_sk, "skgsi1": mail })).await?;
        info!("updated mail entry {}", entry_sk);
        Ok(())
    }

    /// Rewrites an existing phone entry, addressed by its own sort key.
    pub async fn edit_celular(&self, entry_sk: &str, celular: &str) -> ApiResult<()> {
        if entry_sk.is_empty() || celular.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del celular y el nuevo valor",
            ));
        }
        let formatted = normalized_phone(celular)?;

        self.post_row(&json!({ "sk": entry_sk, "skgsi1": formatted }))
            .await?;
        info!("updated phone entry {}", entry_sk);
        Ok(())
    }

    /// Deletes one row: a contact, a mail entry, or a phone entry.
    pub async fn delete_element(&self, sk: &str) -> ApiResult<()> {
        if sk.is_empty() {
            return Err(ApiError::invalid_input(
                "Se requiere el identificador del elemento",
            ));
        }

        let url = format!("{}/agenda/eliminar_contactos", self.agenda_url);
        let response = self.gateway.post_json(&url, &json!({ "sk": sk })).await?;
        common::ensure_status(response).await?;
        info!("deleted agenda element {}", sk);
        Ok(())
    }

    async fn post_row(&self, body: &serde_json::Value) -> ApiResult<()> {
        let response = self.gateway.post_json(&self.endpoint(), body).await?;
        common::check_agenda_write(response).await
    }

    async fn post_child(&self, sk: &str, pkgsi1: &str, skgsi1: &str) -> ApiResult<()> {
        self.post_row(&json!({
            "sk": sk,
            "pkgsi1": pkgsi1,
            "skgsi1": skgsi1,
        }))
        .await
    }
}

/// Cleans a phone number and enforces the storable form before any row
/// is written.
fn normalized_phone(raw: &str) -> ApiResult<String> {
    let formatted = format_phone(raw);
    if !is_valid_phone(&formatted) {
        return Err(ApiError::invalid_input(PHONE_FORMAT_MESSAGE));
    }
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_phone_cleans_tolerated_separators() {
        assert_eq!(
            normalized_phone("+54 9 11 1234-5678").unwrap(),
            "+5491112345678"
        );
        assert_eq!(normalized_phone("54 11 4321 9876").unwrap(), "+541143219876");
    }

    #[test]
    fn test_normalized_phone_rejects_non_numeric_input() {
        let err = normalized_phone("sin numero").unwrap_err();
        match err {
            ApiError::InvalidInput { message } => {
                assert_eq!(message, PHONE_FORMAT_MESSAGE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
