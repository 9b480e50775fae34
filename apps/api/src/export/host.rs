//! Off-screen render host.
//!
//! Mounting registers a print surface on the `Stage`, spawns a hydration task
//! that pulls content until it is complete, builds the print document and
//! preloads its images. Progress is published on two watch channels so the
//! readiness gate can wait on events instead of polling.
//!
//! The `MountHandle` owns the surface: dropping it (or calling `unmount`) stops
//! hydration and removes the surface from the stage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::assets::{preload, AssetLoader};
use super::document::{build_print_document, PrintDocument};
use super::snapshot::assemble;
use crate::content::source::{ContentSource, Fetch};
use crate::models::cv::CvSnapshot;

// ────────────────────────────────────────────────────────────────────────────
// Stage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(Uuid);

impl std::fmt::Display for MountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a surface sits relative to the visible area. Surfaces are always
/// laid out at full size, just never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    OffScreen,
}

#[derive(Debug, Clone)]
pub struct MountRecord {
    pub width: f32,
    pub placement: Placement,
    pub mounted_at: DateTime<Utc>,
}

/// Registry of mounted print surfaces.
#[derive(Debug, Default)]
pub struct Stage {
    mounts: Mutex<HashMap<MountId, MountRecord>>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, id: MountId, record: MountRecord) {
        self.lock().insert(id, record);
    }

    fn detach(&self, id: MountId) -> Option<MountRecord> {
        self.lock().remove(&id)
    }

    pub fn contains(&self, id: MountId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of surfaces currently mounted.
    pub fn mounted(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MountId, MountRecord>> {
        self.mounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Readiness signals
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagesState {
    Pending,
    /// Every image either loaded or gave up.
    Settled,
}

/// Receivers for the two facts the readiness gate cares about.
#[derive(Debug, Clone)]
pub struct ReadinessSignals {
    pub content: watch::Receiver<ContentState>,
    pub images: watch::Receiver<ImagesState>,
}

// ────────────────────────────────────────────────────────────────────────────
// Host
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Logical width of the print surface in CSS-equivalent pixels.
    pub width: f32,
    /// Delay between content reads while any family is still pending.
    pub content_poll_interval: Duration,
    pub image_timeout: Duration,
}

/// What the rasterizer sees of a mounted surface.
#[derive(Debug, Clone)]
pub struct RenderTree {
    pub width: f32,
    /// The main content region. `None` until content has fully loaded.
    pub main: Option<Arc<PrintDocument>>,
    pub snapshot: Option<Arc<CvSnapshot>>,
    pub images: HashMap<String, Arc<RgbaImage>>,
}

#[derive(Default)]
struct Surface {
    snapshot: Option<Arc<CvSnapshot>>,
    document: Option<Arc<PrintDocument>>,
    images: HashMap<String, Arc<RgbaImage>>,
}

pub struct RenderHost {
    stage: Arc<Stage>,
    content: Arc<dyn ContentSource>,
    assets: Arc<dyn AssetLoader>,
    config: HostConfig,
}

impl RenderHost {
    pub fn new(
        stage: Arc<Stage>,
        content: Arc<dyn ContentSource>,
        assets: Arc<dyn AssetLoader>,
        config: HostConfig,
    ) -> Self {
        Self {
            stage,
            content,
            assets,
            config,
        }
    }

    pub fn stage(&self) -> &Arc<Stage> {
        &self.stage
    }

    /// Mounts a fresh print surface off-screen and starts hydrating it.
    pub fn mount(&self) -> MountHandle {
        let id = MountId(Uuid::new_v4());
        self.stage.attach(
            id,
            MountRecord {
                width: self.config.width,
                placement: Placement::OffScreen,
                mounted_at: Utc::now(),
            },
        );

        let (content_tx, content_rx) = watch::channel(ContentState::Loading);
        let (images_tx, images_rx) = watch::channel(ImagesState::Pending);
        let surface = Arc::new(Mutex::new(Surface::default()));

        let task = tokio::spawn(hydrate(
            id,
            Arc::clone(&self.content),
            Arc::clone(&self.assets),
            self.config.clone(),
            Arc::clone(&surface),
            content_tx,
            images_tx,
        ));

        info!(mount = %id, width = self.config.width, "Mounted print surface");

        MountHandle {
            id,
            width: self.config.width,
            stage: Arc::clone(&self.stage),
            surface,
            signals: ReadinessSignals {
                content: content_rx,
                images: images_rx,
            },
            task: Some(task),
        }
    }
}

async fn hydrate(
    id: MountId,
    content: Arc<dyn ContentSource>,
    assets: Arc<dyn AssetLoader>,
    config: HostConfig,
    surface: Arc<Mutex<Surface>>,
    content_tx: watch::Sender<ContentState>,
    images_tx: watch::Sender<ImagesState>,
) {
    let snapshot = loop {
        match assemble(content.as_ref()).await {
            Ok(Fetch::Ready(snapshot)) => break snapshot,
            Ok(Fetch::Pending) => {
                debug!(mount = %id, "Content pending, retrying");
                tokio::time::sleep(config.content_poll_interval).await;
            }
            Err(e) => {
                error!(mount = %id, error = %e, "Content failed to load");
                content_tx.send_replace(ContentState::Failed(e.to_string()));
                return;
            }
        }
    };

    let document = Arc::new(build_print_document(&snapshot, Utc::now().date_naive()));
    let sources = document.image_sources();
    {
        let mut surface = surface.lock().unwrap_or_else(PoisonError::into_inner);
        surface.snapshot = Some(Arc::new(snapshot));
        surface.document = Some(document);
    }
    content_tx.send_replace(ContentState::Loaded);
    debug!(mount = %id, images = sources.len(), "Content loaded");

    let images = preload(assets.as_ref(), &sources, config.image_timeout).await;
    let loaded = images.len();
    surface
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .images = images;
    images_tx.send_replace(ImagesState::Settled);
    debug!(mount = %id, loaded, requested = sources.len(), "Images settled");
}

/// Exclusive owner of one mounted surface.
pub struct MountHandle {
    id: MountId,
    width: f32,
    stage: Arc<Stage>,
    surface: Arc<Mutex<Surface>>,
    signals: ReadinessSignals,
    task: Option<JoinHandle<()>>,
}

impl MountHandle {
    pub fn id(&self) -> MountId {
        self.id
    }

    pub fn signals(&self) -> ReadinessSignals {
        self.signals.clone()
    }

    /// Current state of the surface, whatever has loaded so far.
    pub fn capture(&self) -> RenderTree {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        RenderTree {
            width: self.width,
            main: surface.document.clone(),
            snapshot: surface.snapshot.clone(),
            images: surface.images.clone(),
        }
    }

    /// Stops hydration and removes the surface from the stage. Idempotent.
    pub fn unmount(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        if let Some(record) = self.stage.detach(self.id) {
            info!(
                mount = %self.id,
                width = record.width,
                placement = ?record.placement,
                mounted_ms = (Utc::now() - record.mounted_at).num_milliseconds(),
                "Unmounted print surface"
            );
        }
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}
