//! Remote image loading for the print document.
//!
//! Every image gets its own deadline; a failed or slow image is logged and
//! dropped so it can never hold up an export.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {src}")]
    Status { src: String, status: u16 },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image decode task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, src: &str) -> Result<RgbaImage, AssetError>;
}

/// Fetches images over HTTP(S) and decodes them off the async runtime.
pub struct HttpAssetLoader {
    client: reqwest::Client,
}

impl HttpAssetLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn load(&self, src: &str) -> Result<RgbaImage, AssetError> {
        let response = self.client.get(src).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                src: src.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        debug!(src, bytes = bytes.len(), "Fetched image");
        decode(bytes.to_vec()).await
    }
}

async fn decode(bytes: Vec<u8>) -> Result<RgbaImage, AssetError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgba8()))
        .await
        .map_err(|e| AssetError::Task(e.to_string()))?
        .map_err(AssetError::from)
}

/// Loads all `sources` concurrently. The result holds only the images that
/// arrived in time.
pub async fn preload(
    loader: &dyn AssetLoader,
    sources: &[String],
    per_image_timeout: Duration,
) -> HashMap<String, Arc<RgbaImage>> {
    let loads = sources.iter().map(|src| async move {
        match tokio::time::timeout(per_image_timeout, loader.load(src)).await {
            Ok(Ok(image)) => Some((src.clone(), Arc::new(image))),
            Ok(Err(e)) => {
                warn!(src = %src, error = %e, "Image failed to load, continuing without it");
                None
            }
            Err(_) => {
                warn!(
                    src = %src,
                    timeout_ms = per_image_timeout.as_millis() as u64,
                    "Image load timed out, continuing without it"
                );
                None
            }
        }
    });

    join_all(loads).await.into_iter().flatten().collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    /// Serves a solid 4x4 image for any source not listed in `broken`.
    pub(crate) struct SolidLoader {
        pub broken: Vec<String>,
    }

    #[async_trait]
    impl AssetLoader for SolidLoader {
        async fn load(&self, src: &str) -> Result<RgbaImage, AssetError> {
            if self.broken.iter().any(|b| b == src) {
                return Err(AssetError::Status {
                    src: src.to_string(),
                    status: 404,
                });
            }
            Ok(RgbaImage::from_pixel(4, 4, Rgba([200, 30, 30, 255])))
        }
    }

    /// Never finishes a load.
    pub(crate) struct StalledLoader;

    #[async_trait]
    impl AssetLoader for StalledLoader {
        async fn load(&self, _src: &str) -> Result<RgbaImage, AssetError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_preload_skips_failed_images() {
        let loader = SolidLoader {
            broken: vec!["https://cdn.example.com/missing.png".to_string()],
        };
        let sources = vec![
            "https://cdn.example.com/me.png".to_string(),
            "https://cdn.example.com/missing.png".to_string(),
        ];
        let loaded = preload(&loader, &sources, Duration::from_secs(1)).await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("https://cdn.example.com/me.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_gives_up_on_stalled_images() {
        let sources = vec!["https://cdn.example.com/slow.png".to_string()];
        let started = tokio::time::Instant::now();
        let loaded = preload(&StalledLoader, &sources, Duration::from_millis(4000)).await;
        assert!(loaded.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(4000));
        assert!(started.elapsed() < Duration::from_millis(4100));
    }

    #[tokio::test]
    async fn test_decode_png_bytes() {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let image = decode(bytes).await.unwrap();
        assert_eq!(image.dimensions(), (3, 2));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode(b"definitely not an image".to_vec()).await,
            Err(AssetError::Decode(_))
        ));
    }
}
