pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::content::handlers as content;
use crate::export::handlers as export;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // CV view
        .route("/api/v1/cv", get(content::handle_get_cv))
        // PDF export
        .route("/api/v1/cv/export", post(export::handle_export))
        .route("/api/v1/cv/export/status", get(export::handle_export_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::content::source::{ContentSource, StaticContent};
    use crate::export::assets::tests::SolidLoader;
    use crate::export::controller::{ExportController, ExportSettings};
    use crate::export::gate::GateConfig;
    use crate::export::glyphs::BoxGlyphs;
    use crate::export::host::{HostConfig, RenderHost, Stage};
    use crate::export::notice::NoticeBoard;
    use crate::export::paginate::PageFormat;
    use crate::export::raster::SoftwareRasterizer;
    use crate::export::snapshot::tests::sample_snapshot;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use image::Rgb;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let export = ExportConfig {
            page_width_px: 794.0,
            scale: 1.0,
            ready_timeout: Duration::from_millis(500),
            grace: Duration::from_millis(10),
            image_timeout: Duration::from_millis(100),
            jpeg_quality: 95,
            background: Rgb([255, 255, 255]),
        };
        let content: Arc<dyn ContentSource> =
            Arc::new(StaticContent::new(sample_snapshot("José Ñúñez", None)));
        let host = RenderHost::new(
            Arc::new(Stage::new()),
            Arc::clone(&content),
            Arc::new(SolidLoader { broken: vec![] }),
            HostConfig {
                width: export.page_width_px,
                content_poll_interval: Duration::from_millis(10),
                image_timeout: export.image_timeout,
            },
        );
        let notices = Arc::new(NoticeBoard::new());
        let exporter = Arc::new(ExportController::new(
            host,
            Arc::new(SoftwareRasterizer::new(Arc::new(BoxGlyphs))),
            notices.clone(),
            ExportSettings {
                page: PageFormat::A4,
                scale: export.scale,
                background: export.background,
                jpeg_quality: export.jpeg_quality,
                use_remote_images: true,
                gate: GateConfig {
                    max_wait: export.ready_timeout,
                    grace: export.grace,
                },
            },
        ));
        build_router(AppState {
            content,
            exporter,
            notices,
        })
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["service"], "cvsite-api");
    }

    #[tokio::test]
    async fn test_get_cv_returns_ordered_snapshot() {
        let response = app()
            .oneshot(Request::get("/api/v1/cv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["experiences"][0]["company"], r#"Hotel "Plaza""#);
        assert_eq!(body["experiences"][1]["company"], r#"Hotel "Fiesta""#);
    }

    #[tokio::test]
    async fn test_export_downloads_pdf_attachment() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::post("/api/v1/cv/export").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"CV_Jose_Nunez.pdf\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let status = app
            .oneshot(Request::get("/api/v1/cv/export/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json(status).await;
        assert_eq!(body["stage"], "idle");
        assert_eq!(body["busy"], false);
        assert_eq!(body["last_notice"]["level"], "success");
    }
}
