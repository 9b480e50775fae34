use std::sync::Arc;

use crate::content::source::ContentSource;
use crate::export::controller::ExportController;
use crate::export::notice::NoticeBoard;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read side of the CV content store. Supabase or a JSON file, per `CV_CONTENT_FILE`.
    pub content: Arc<dyn ContentSource>,
    pub exporter: Arc<ExportController>,
    /// Same board the exporter notifies; read by the status endpoint.
    pub notices: Arc<NoticeBoard>,
}
