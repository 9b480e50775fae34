//! Axum route handlers for the export API.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::export::controller::{ExportOutcome, ExportStage};
use crate::export::notice::Notice;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ExportStatusResponse {
    pub stage: ExportStage,
    pub busy: bool,
    pub last_notice: Option<Notice>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cv/export
///
/// Runs one export and streams the PDF back as an attachment.
/// Returns 409 while another export is running.
pub async fn handle_export(State(state): State<AppState>) -> Result<Response, AppError> {
    match state.exporter.export().await {
        ExportOutcome::Completed(artifact) => Ok((
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.filename),
                ),
            ],
            artifact.bytes,
        )
            .into_response()),
        ExportOutcome::Rejected => Err(AppError::Conflict(
            "An export is already in progress".to_string(),
        )),
        ExportOutcome::Failed { message } => Err(AppError::ExportFailed(message)),
    }
}

/// GET /api/v1/cv/export/status
pub async fn handle_export_status(State(state): State<AppState>) -> Json<ExportStatusResponse> {
    let stage = state.exporter.stage();
    Json(ExportStatusResponse {
        stage,
        busy: stage.is_busy(),
        last_notice: state.notices.latest(),
    })
}
