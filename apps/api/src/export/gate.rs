//! Readiness gate: waits until the mounted surface has content and settled
//! images, then a short grace period for layout to finish. Never waits past
//! `max_wait`.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::host::{ContentState, ImagesState, ReadinessSignals};

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub max_wait: Duration,
    pub grace: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    /// `max_wait` elapsed first. Rendering proceeds with whatever is there.
    TimedOut,
    /// Content reported a hard failure; waiting longer cannot help.
    ContentFailed(String),
}

pub async fn wait_until_ready(signals: ReadinessSignals, config: &GateConfig) -> GateOutcome {
    let ReadinessSignals {
        mut content,
        mut images,
    } = signals;

    let ready = async {
        let state = match content
            .wait_for(|s| !matches!(s, ContentState::Loading))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => return GateOutcome::ContentFailed("render host stopped".to_string()),
        };
        if let ContentState::Failed(reason) = state {
            return GateOutcome::ContentFailed(reason);
        }
        if images.wait_for(|s| *s == ImagesState::Settled).await.is_err() {
            return GateOutcome::ContentFailed("render host stopped".to_string());
        }
        GateOutcome::Ready
    };

    match timeout(config.max_wait, ready).await {
        Ok(GateOutcome::Ready) => {
            debug!(grace_ms = config.grace.as_millis() as u64, "Surface ready, waiting grace period");
            sleep(config.grace).await;
            GateOutcome::Ready
        }
        Ok(other) => other,
        Err(_) => {
            warn!(
                max_wait_ms = config.max_wait.as_millis() as u64,
                "Surface not ready in time, rendering anyway"
            );
            GateOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;
    use tokio::time::Instant;

    fn config() -> GateConfig {
        GateConfig {
            max_wait: Duration::from_millis(5000),
            grace: Duration::from_millis(500),
        }
    }

    fn channels() -> (
        watch::Sender<ContentState>,
        watch::Sender<ImagesState>,
        ReadinessSignals,
    ) {
        let (content_tx, content) = watch::channel(ContentState::Loading);
        let (images_tx, images) = watch::channel(ImagesState::Pending);
        (content_tx, images_tx, ReadinessSignals { content, images })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_surface_resolves_after_grace() {
        let (content_tx, images_tx, signals) = channels();
        content_tx.send_replace(ContentState::Loaded);
        images_tx.send_replace(ImagesState::Settled);

        let started = Instant::now();
        assert_eq!(wait_until_ready(signals, &config()).await, GateOutcome::Ready);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_resolves_at_max_wait() {
        let (_content_tx, _images_tx, signals) = channels();
        let started = Instant::now();
        assert_eq!(wait_until_ready(signals, &config()).await, GateOutcome::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_content_with_pending_images_times_out() {
        let (content_tx, _images_tx, signals) = channels();
        content_tx.send_replace(ContentState::Loaded);
        assert_eq!(wait_until_ready(signals, &config()).await, GateOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_late_in_window_still_counts() {
        let (content_tx, images_tx, signals) = channels();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1200)).await;
            content_tx.send_replace(ContentState::Loaded);
            sleep(Duration::from_millis(800)).await;
            images_tx.send_replace(ImagesState::Settled);
        });

        let started = Instant::now();
        assert_eq!(wait_until_ready(signals, &config()).await, GateOutcome::Ready);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_millis(2600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_failure_returns_immediately() {
        let (content_tx, _images_tx, signals) = channels();
        content_tx.send_replace(ContentState::Failed("store down".to_string()));
        let started = Instant::now();
        assert_eq!(
            wait_until_ready(signals, &config()).await,
            GateOutcome::ContentFailed("store down".to_string())
        );
        assert!(started.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_host_is_content_failure() {
        let (content_tx, _images_tx, signals) = channels();
        drop(content_tx);
        assert!(matches!(
            wait_until_ready(signals, &config()).await,
            GateOutcome::ContentFailed(_)
        ));
    }
}
