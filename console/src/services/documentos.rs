//! Remittance document operations.
//!
//! Listing lives on the documents API; editing and deletion live on the
//! management API under `documentos/`. Every call goes through the
//! request gateway, so an invalid session never reaches the network.

use crate::auth::RequestGateway;
use crate::errors::{ApiError, ApiResult};
use crate::records::Documento;
use crate::services::common;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct DocumentosService {
    gateway: Arc<RequestGateway>,
    facturas_url: String,
    gestion_url: String,
}

impl DocumentosService {
    pub fn new(
        gateway: Arc<RequestGateway>,
        facturas_url: impl Into<String>,
        gestion_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            facturas_url: facturas_url.into(),
            gestion_url: gestion_url.into(),
        }
    }

    /// Lists documents, optionally server-filtered to a date range.
    /// The range only applies when both ends are given.
    pub async fn list(
        &self,
        desde: Option<&str>,
        hasta: Option<&str>,
    ) -> ApiResult<Vec<Documento>> {
        let mut url = format!("{}/get_facturas", self.facturas_url);
        if let (Some(desde), Some(hasta)) = (desde, hasta) {
            url = format!("{url}?startDate={desde}&endDate={hasta}");
        }

        let response = self.gateway.get(&url).await?;
        let envelope = common::read_envelope(response).await?;
        let documentos = envelope
            .records()?
            .iter()
            .map(Documento::from_wire)
            .collect::<Vec<_>>();

        info!("listed {} documents", documentos.len());
        Ok(documentos)
    }

    /// Saves the full editable field set of one document.
    pub async fn update(&self, documento: &Documento) -> ApiResult<()> {
        if documento.sk.is_empty() {
            return Err(ApiError::invalid_input(
                "El documento no tiene un identificador (sk)",
            ));
        }

        let body = json!({
            "sk": documento.sk,
            "cliente": documento.cliente,
            "fechaCarga": documento.fecha_carga,
            "fechaComprobante": documento.fecha_comprobante,
            "importe": documento.importe,
            "numeroTransaccion": documento.numero_transaccion,
            "banco": documento.banco,
            "destinatario": documento.destinatario,
            "tipo": documento.tipo,
            "enviadoPor": documento.enviado_por,
        });

        let url = format!("{}/documentos/editar_documentos", self.gestion_url);
        let response = self.gateway.post_json(&url, &body).await?;
        common::ensure_status(response).await?;
        info!("updated document {}", documento.sk);
        Ok(())
    }

    /// Deletes one document by its sort key.
    pub async fn delete(&self, sk: &str) -> ApiResult<()> {
        if sk.is_empty() {
            return Err(ApiError::invalid_input(
                "El documento no tiene un identificador (sk)",
            ));
        }

        let url = format!("{}/documentos/eliminar_archivos", self.gestion_url);
        let response = self.gateway.post_json(&url, &json!({ "sk": sk })).await?;
        common::ensure_status(response).await?;
        info!("deleted document {}", sk);
        Ok(())
    }
}
