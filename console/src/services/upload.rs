//! Receipt upload flow.
//!
//! Three steps against the documents API: ask for a presigned upload
//! URL, PUT the file bytes straight to it, then notify the processor.
//! The presigned PUT goes through a bare client on purpose: the storage
//! host rejects requests carrying the console's auth header.

use crate::auth::RequestGateway;
use crate::errors::{ApiError, ApiResult};
use crate::services::common;
use crate::wire::WireError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PresignedUpload {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(default)]
    pub key: Option<String>,
    pub ulid: String,
}

pub struct UploadService {
    gateway: Arc<RequestGateway>,
    storage_client: Client,
    facturas_url: String,
}

impl UploadService {
    pub fn new(
        gateway: Arc<RequestGateway>,
        facturas_url: impl Into<String>,
        timeout_seconds: u64,
    ) -> Self {
        let storage_client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            gateway,
            storage_client,
            facturas_url: facturas_url.into(),
        }
    }

    /// Uploads one receipt file and queues it for processing. Returns
    /// the tracking id assigned by the API.
    pub async fn subir_archivo(&self, path: &Path) -> ApiResult<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::invalid_input("Nombre de archivo inválido"))?;
        let content_type = content_type_for(path);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::file(format!("{}: {e}", path.display())))?;

        let presigned = self.request_upload_url(file_name, content_type).await?;
        info!("obtained presigned upload for {}", file_name);

        let put = self
            .storage_client
            .put(&presigned.upload_url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        if !put.status().is_success() {
            return Err(ApiError::unexpected_status(
                put.status().as_u16(),
                "presigned upload rejected",
            ));
        }

        self.notify_uploaded(file_name, &presigned.ulid).await?;
        info!("queued {} for processing as {}", file_name, presigned.ulid);
        Ok(presigned.ulid)
    }

    async fn request_upload_url(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> ApiResult<PresignedUpload> {
        let url = format!("{}/url_put", self.facturas_url);
        let body = json!({ "fileName": file_name, "fileType": content_type });

        let response = self.gateway.post_json(&url, &body).await?;
        let envelope = common::read_envelope(response).await?;
        let decoded = envelope.decode_body()?;
        serde_json::from_value(decoded).map_err(|e| {
            ApiError::Wire(WireError::UnexpectedBody(format!(
                "presigned upload response: {e}"
            )))
        })
    }

    async fn notify_uploaded(&self, file_name: &str, ulid: &str) -> ApiResult<()> {
        let url = format!("{}/procesar_documentos", self.facturas_url);
        let body = json!({
            "fileName": file_name,
            "ulid": ulid,
            "enviadoPor": "manual",
        });

        let response = self.gateway.post_json(&url, &body).await?;
        common::ensure_status(response).await
    }
}

/// Content type inferred from the file extension; receipts are PDFs or
/// photos.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("recibo.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("FOTO.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("scan.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("datos.bin")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(Path::new("sin_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_presigned_upload_parses_wire_names() {
        let raw = serde_json::json!({
            "uploadURL": "https://bucket.example/put?sig=abc",
            "key": "uploads/recibo.pdf",
            "ulid": "01HV3ZK9"
        });
        let presigned: PresignedUpload = serde_json::from_value(raw).unwrap();
        assert_eq!(presigned.upload_url, "https://bucket.example/put?sig=abc");
        assert_eq!(presigned.ulid, "01HV3ZK9");
    }

    #[test]
    fn test_presigned_upload_key_is_optional() {
        let raw = serde_json::json!({
            "uploadURL": "https://bucket.example/put",
            "ulid": "01HV3ZKA"
        });
        let presigned: PresignedUpload = serde_json::from_value(raw).unwrap();
        assert_eq!(presigned.key, None);
    }
}
