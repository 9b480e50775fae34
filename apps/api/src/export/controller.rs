//! Export pipeline controller.
//!
//! One export at a time: mount → wait → rasterize → paginate → assemble.
//! Every run ends with the surface unmounted, exactly one notice, and the
//! stage back at `Idle`, even when the run fails, panics or is cancelled.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::FutureExt;
use image::Rgb;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use super::filename::export_filename;
use super::gate::{wait_until_ready, GateConfig, GateOutcome};
use super::host::{MountHandle, RenderHost, Stage};
use super::notice::{Notice, Notifier};
use super::paginate::{render_pages, PageFormat, PaginateError};
use super::pdf::{self, PdfError};
use super::raster::{RasterError, RasterOptions, Rasterizer};

/// Shown to the user for any fatal failure. Details go to the log only.
pub const FAILURE_MESSAGE: &str = "Could not generate the PDF. Please try again.";

const DOCUMENT_TITLE: &str = "Curriculum Vitae";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Idle,
    Preparing,
    LoadingAssets,
    Rendering,
    Generating,
    Complete,
    Error,
}

impl ExportStage {
    pub fn is_busy(&self) -> bool {
        !matches!(self, ExportStage::Idle)
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub page: PageFormat,
    pub scale: f32,
    pub background: Rgb<u8>,
    pub jpeg_quality: u8,
    pub use_remote_images: bool,
    pub gate: GateConfig,
}

#[derive(Debug, Clone)]
pub struct PdfArtifact {
    pub filename: String,
    pub bytes: Bytes,
    pub pages: usize,
}

#[derive(Debug)]
pub enum ExportOutcome {
    Completed(PdfArtifact),
    /// Another export was already running.
    Rejected,
    Failed { message: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Paginate(#[from] PaginateError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct ExportController {
    host: RenderHost,
    rasterizer: Arc<dyn Rasterizer>,
    notifier: Arc<dyn Notifier>,
    settings: ExportSettings,
    slot: Semaphore,
    stage_tx: watch::Sender<ExportStage>,
}

impl ExportController {
    pub fn new(
        host: RenderHost,
        rasterizer: Arc<dyn Rasterizer>,
        notifier: Arc<dyn Notifier>,
        settings: ExportSettings,
    ) -> Self {
        let (stage_tx, _) = watch::channel(ExportStage::Idle);
        Self {
            host,
            rasterizer,
            notifier,
            settings,
            slot: Semaphore::new(1),
            stage_tx,
        }
    }

    pub fn stage(&self) -> ExportStage {
        *self.stage_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExportStage> {
        self.stage_tx.subscribe()
    }

    pub fn mounts(&self) -> &Arc<Stage> {
        self.host.stage()
    }

    pub async fn export(&self) -> ExportOutcome {
        let Ok(_permit) = self.slot.try_acquire() else {
            warn!(stage = ?self.stage(), "Export already in progress, rejecting");
            return ExportOutcome::Rejected;
        };
        // Declared after the permit and before the mount: on drop the surface goes
        // first, then the stage resets, then the slot frees.
        let mut run = RunGuard::new(self);

        self.set_stage(ExportStage::Preparing);
        let mut handle = self.host.mount();

        let result = AssertUnwindSafe(self.run(&handle))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExportError::Internal(panic_message(panic.as_ref()))));

        handle.unmount();

        let outcome = match result {
            Ok(artifact) => {
                self.set_stage(ExportStage::Complete);
                info!(
                    filename = %artifact.filename,
                    pages = artifact.pages,
                    bytes = artifact.bytes.len(),
                    elapsed_ms = run.elapsed_ms(),
                    "Export complete"
                );
                self.notifier
                    .notify(Notice::success(format!("Downloaded {}", artifact.filename)));
                ExportOutcome::Completed(artifact)
            }
            Err(e) => {
                self.set_stage(ExportStage::Error);
                error!(error = %e, elapsed_ms = run.elapsed_ms(), "Export failed");
                self.notifier.notify(Notice::error(FAILURE_MESSAGE));
                ExportOutcome::Failed {
                    message: FAILURE_MESSAGE.to_string(),
                }
            }
        };

        run.settled = true;
        outcome
    }

    async fn run(&self, handle: &MountHandle) -> Result<PdfArtifact, ExportError> {
        self.set_stage(ExportStage::LoadingAssets);
        match wait_until_ready(handle.signals(), &self.settings.gate).await {
            GateOutcome::Ready => debug!(mount = %handle.id(), "Surface ready"),
            GateOutcome::TimedOut => {}
            GateOutcome::ContentFailed(reason) => {
                warn!(mount = %handle.id(), reason = %reason, "Rendering without content")
            }
        }

        self.set_stage(ExportStage::Rendering);
        let tree = handle.capture();
        let options = RasterOptions {
            scale: self.settings.scale,
            background: self.settings.background,
            use_remote_images: self.settings.use_remote_images,
        };
        let bitmap = self.rasterizer.rasterize(&tree, &options).await?;

        self.set_stage(ExportStage::Generating);
        let full_name = tree
            .snapshot
            .as_ref()
            .and_then(|s| s.profile.as_ref())
            .map(|p| p.full_name.clone())
            .filter(|n| !n.is_empty());
        let filename = export_filename(full_name.as_deref());
        let title = full_name.unwrap_or_else(|| DOCUMENT_TITLE.to_string());
        let settings = self.settings.clone();

        let (bytes, pages) = tokio::task::spawn_blocking(move || -> Result<_, ExportError> {
            let pages = render_pages(&bitmap, &settings.page, settings.background, settings.jpeg_quality)?;
            let bytes = pdf::assemble(&pages, &settings.page, &title)?;
            Ok((bytes, pages.len()))
        })
        .await
        .map_err(|e| ExportError::Internal(e.to_string()))??;

        Ok(PdfArtifact {
            filename,
            bytes: Bytes::from(bytes),
            pages,
        })
    }

    fn set_stage(&self, stage: ExportStage) {
        debug!(stage = ?stage, "Export stage");
        self.stage_tx.send_replace(stage);
    }
}

/// Returns the controller to `Idle` when a run ends. If the run future is dropped
/// before it settles (the request was cancelled), it also publishes the failure notice
/// the run never got to send.
struct RunGuard<'a> {
    controller: &'a ExportController,
    started: Instant,
    settled: bool,
}

impl<'a> RunGuard<'a> {
    fn new(controller: &'a ExportController) -> Self {
        Self {
            controller,
            started: Instant::now(),
            settled: false,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                stage = ?self.controller.stage(),
                elapsed_ms = self.elapsed_ms(),
                "Export cancelled before completion"
            );
            self.controller.set_stage(ExportStage::Error);
            self.controller.notifier.notify(Notice::error(FAILURE_MESSAGE));
        }
        self.controller.set_stage(ExportStage::Idle);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
