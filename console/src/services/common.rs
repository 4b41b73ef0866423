//! Shared response handling for the domain services.

use crate::errors::{ApiError, ApiResult};
use crate::wire::ApiEnvelope;
use reqwest::Response;

/// Fails on any non-success status; the body text feeds the error.
pub(crate) async fn ensure_status(response: Response) -> ApiResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::unexpected_status(status.as_u16(), body))
}

/// Reads a record-carrying envelope, checking the outer status first.
pub(crate) async fn read_envelope(response: Response) -> ApiResult<ApiEnvelope> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::unexpected_status(status.as_u16(), body));
    }
    Ok(ApiEnvelope::parse(&body)?)
}

/// Checks an agenda write response.
///
/// The API reports duplicates through a nested 409 in the envelope even
/// when the outer status is 200, so that is inspected first; a bare
/// outer 409 counts as a conflict too.
pub(crate) async fn check_agenda_write(response: Response) -> ApiResult<()> {
    let status = response.status();
    let body = response.text().await?;

    if let Ok(envelope) = ApiEnvelope::parse(&body) {
        if envelope.is_conflict() {
            let detail = envelope
                .error_message()
                .unwrap_or_else(|| "duplicate entry".to_string());
            return Err(ApiError::conflict(detail));
        }
    }
    if status.as_u16() == 409 {
        return Err(ApiError::conflict("duplicate entry"));
    }
    if !status.is_success() {
        return Err(ApiError::unexpected_status(status.as_u16(), body));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> Response {
        http::Response::builder()
            .status(status)
            .body(body.to_string())
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_ensure_status_passes_success() {
        assert!(ensure_status(response(200, "")).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_status_reports_failure_body() {
        let err = ensure_status(response(500, "boom")).await.unwrap_err();
        match err {
            ApiError::UnexpectedStatus { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_envelope_decodes_records() {
        let body = r#"{"body-json": {"statusCode": 200, "body": "[{\"sk\": {\"S\": \"doc#1\"}}]"}}"#;
        let envelope = read_envelope(response(200, body)).await.unwrap();
        assert_eq!(envelope.records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_envelope_prefers_outer_status() {
        let err = read_envelope(response(502, "bad gateway")).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_agenda_write_detects_nested_conflict_under_outer_200() {
        let body = r#"{"body-json": {"statusCode": 409, "body": "{\"error\": \"duplicate key\"}"}}"#;
        let err = check_agenda_write(response(200, body)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_agenda_write_detects_outer_conflict() {
        let err = check_agenda_write(response(409, "{}")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_agenda_write_passes_clean_response() {
        let body = r#"{"body-json": {"statusCode": 200, "body": "{}"}}"#;
        assert!(check_agenda_write(response(200, body)).await.is_ok());
    }

    #[tokio::test]
    async fn test_agenda_write_reports_other_failures() {
        let err = check_agenda_write(response(500, "oops")).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { status: 500, .. }));
    }
}
