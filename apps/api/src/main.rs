mod config;
mod content;
mod errors;
mod export;
mod models;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, ContentBackend};
use crate::content::source::{ContentSource, StaticContent, SupabaseContent};
use crate::export::assets::HttpAssetLoader;
use crate::export::controller::{ExportController, ExportSettings};
use crate::export::gate::GateConfig;
use crate::export::glyphs::FontdueGlyphs;
use crate::export::host::{HostConfig, RenderHost, Stage};
use crate::export::notice::NoticeBoard;
use crate::export::paginate::PageFormat;
use crate::export::raster::SoftwareRasterizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::StoreClient;

/// Delay between content reads while the store reports data as pending.
const CONTENT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV site API v{}", env!("CARGO_PKG_VERSION"));

    // Content source
    let content: Arc<dyn ContentSource> = match &config.content {
        ContentBackend::Supabase { url, anon_key } => {
            let store = StoreClient::new(url, anon_key.clone())?;
            info!(url = %url, "Content store client initialized");
            Arc::new(SupabaseContent::new(store))
        }
        ContentBackend::File(path) => Arc::new(StaticContent::from_json_file(path)?),
    };

    // Rasterizer font
    let glyphs = Arc::new(
        FontdueGlyphs::load(&config.font_path).context("Failed to load the export font")?,
    );

    // Export pipeline
    let assets = Arc::new(HttpAssetLoader::new(
        reqwest::Client::builder()
            .build()
            .context("Failed to build the image HTTP client")?,
    ));
    let host = RenderHost::new(
        Arc::new(Stage::new()),
        Arc::clone(&content),
        assets,
        HostConfig {
            width: config.export.page_width_px,
            content_poll_interval: CONTENT_POLL_INTERVAL,
            image_timeout: config.export.image_timeout,
        },
    );
    let notices = Arc::new(NoticeBoard::new());
    let settings = ExportSettings {
        page: PageFormat::A4,
        scale: config.export.scale,
        background: config.export.background,
        jpeg_quality: config.export.jpeg_quality,
        use_remote_images: true,
        gate: GateConfig {
            max_wait: config.export.ready_timeout,
            grace: config.export.grace,
        },
    };
    info!(
        width = config.export.page_width_px,
        scale = config.export.scale,
        quality = config.export.jpeg_quality,
        "Export pipeline initialized"
    );
    let exporter = Arc::new(ExportController::new(
        host,
        Arc::new(SoftwareRasterizer::new(glyphs)),
        notices.clone(),
        settings,
    ));

    // Build app state
    let state = AppState {
        content,
        exporter,
        notices,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
