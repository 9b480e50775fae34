//! Axum route handlers for the CV content API.

use axum::{extract::State, Json};

use crate::content::source::Fetch;
use crate::errors::AppError;
use crate::export::snapshot::{assemble, SnapshotError};
use crate::models::cv::CvSnapshot;
use crate::state::AppState;

/// GET /api/v1/cv
///
/// Returns the sanitized, ordered CV snapshot the public CV page renders.
/// 503 while any content family is still unavailable.
pub async fn handle_get_cv(State(state): State<AppState>) -> Result<Json<CvSnapshot>, AppError> {
    match assemble(state.content.as_ref()).await {
        Ok(Fetch::Ready(snapshot)) => Ok(Json(snapshot)),
        Ok(Fetch::Pending) => Err(AppError::ServiceUnavailable(
            "CV content is not available yet".to_string(),
        )),
        Err(e @ SnapshotError::InvalidPeriod { .. }) => Err(AppError::UnprocessableEntity(e.to_string())),
        Err(SnapshotError::Content(e)) => Err(AppError::Internal(e.into())),
    }
}
