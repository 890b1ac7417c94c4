use crate::error::ImportError;
use crate::models::{ClientImportSummary, CommitReport, ImportSummary};
use crate::service::ImportService;
use axum::{
    extract::{Json, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Upload form: one `file` part plus an `owner_id` part.
struct UploadRequest {
    owner_id: i64,
    filename: String,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadRequest, ImportError> {
    let mut owner_id: Option<i64> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ImportError::Parse(format!("bad multipart body: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("owner_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ImportError::Parse(format!("bad owner_id field: {e}")))?;
                owner_id = text.trim().parse().ok();
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ImportError::Parse(format!("bad file field: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let owner_id = owner_id.ok_or(ImportError::MissingField("owner_id"))?;
    let (filename, bytes) = file.ok_or(ImportError::MissingField("file"))?;
    Ok(UploadRequest {
        owner_id,
        filename,
        bytes,
    })
}

/// Invoice import response body.
#[derive(Debug, Serialize)]
pub struct InvoiceImportResponse {
    pub success: bool,
    pub message: String,
    pub summary: Option<ImportSummary>,
    pub report: Option<CommitReport>,
}

/// Client import response body.
#[derive(Debug, Serialize)]
pub struct ClientImportResponse {
    pub success: bool,
    pub message: String,
    pub summary: Option<ClientImportSummary>,
    pub report: Option<CommitReport>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub owner_id: i64,
}

fn error_status(err: &ImportError) -> StatusCode {
    match err {
        ImportError::Commit(_) | ImportError::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Health check.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Parse and reconcile an invoice file; no database writes.
pub async fn preview_invoices(
    State(service): State<Arc<ImportService>>,
    multipart: Multipart,
) -> Response {
    let result = async {
        let upload = read_upload(multipart).await?;
        service
            .preview_invoices(upload.owner_id, &upload.filename, &upload.bytes)
            .await
    }
    .await;

    match result {
        Ok(summary) => {
            let response = InvoiceImportResponse {
                success: true,
                message: format!(
                    "{} invoices ready, {} duplicates skipped",
                    summary.unique_invoices, summary.duplicates_skipped
                ),
                summary: Some(summary),
                report: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => invoice_error(e),
    }
}

/// Reconcile and commit an invoice file in one call.
pub async fn import_invoices(
    State(service): State<Arc<ImportService>>,
    multipart: Multipart,
) -> Response {
    let result = async {
        let upload = read_upload(multipart).await?;
        service
            .import_invoices(upload.owner_id, &upload.filename, &upload.bytes)
            .await
    }
    .await;

    match result {
        Ok((summary, report)) => {
            let response = InvoiceImportResponse {
                success: true,
                message: format!(
                    "Imported {} invoices, {} new customers, {} duplicates skipped",
                    report.invoices_created, report.clients_created, summary.duplicates_skipped
                ),
                summary: Some(summary),
                report: Some(report),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => invoice_error(e),
    }
}

/// Parse and reconcile a client file; no database writes.
pub async fn preview_clients(
    State(service): State<Arc<ImportService>>,
    multipart: Multipart,
) -> Response {
    let result = async {
        let upload = read_upload(multipart).await?;
        service
            .preview_clients(upload.owner_id, &upload.filename, &upload.bytes)
            .await
    }
    .await;

    match result {
        Ok(summary) => {
            let response = ClientImportResponse {
                success: true,
                message: format!(
                    "{} new clients, {} to update, {} rows skipped",
                    summary.new_clients.len(),
                    summary.clients_to_update.len(),
                    summary.rows_skipped
                ),
                summary: Some(summary),
                report: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => client_error(e),
    }
}

/// Reconcile and commit a client file in one call.
pub async fn import_clients(
    State(service): State<Arc<ImportService>>,
    multipart: Multipart,
) -> Response {
    let result = async {
        let upload = read_upload(multipart).await?;
        service
            .import_clients(upload.owner_id, &upload.filename, &upload.bytes)
            .await
    }
    .await;

    match result {
        Ok((summary, report)) => {
            let response = ClientImportResponse {
                success: true,
                message: format!(
                    "Imported {} clients, updated {}",
                    report.clients_created, report.clients_updated
                ),
                summary: Some(summary),
                report: Some(report),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => client_error(e),
    }
}

/// CSV export of all invoices for one owner, round-trip compatible with the
/// import column set.
pub async fn export_invoices(
    State(service): State<Arc<ImportService>>,
    Query(params): Query<ExportParams>,
) -> Response {
    match service.export_invoices(params.owner_id).await {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"invoices.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!("Export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
        }
    }
}

fn invoice_error(e: ImportError) -> Response {
    error!("Invoice import failed: {}", e);
    let response = InvoiceImportResponse {
        success: false,
        message: format!("Error: {e}"),
        summary: None,
        report: None,
    };
    (error_status(&e), Json(response)).into_response()
}

fn client_error(e: ImportError) -> Response {
    error!("Client import failed: {}", e);
    let response = ClientImportResponse {
        success: false,
        message: format!("Error: {e}"),
        summary: None,
        report: None,
    };
    (error_status(&e), Json(response)).into_response()
}
