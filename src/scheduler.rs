//! Refresh scheduler for periodic display updates.
//!
//! Renders the configured source and refreshes the panel at a fixed interval.

use crate::display::{DisplayController, Panel, Refresh, Status};
use crate::render::ImageRenderer;
use std::time::Duration;
use tokio::sync::broadcast;

/// Scheduler for periodic display refresh
pub struct Scheduler<P> {
    display: DisplayController<P>,
    renderer: Option<ImageRenderer>,
    interval: Duration,
}

impl<P: Panel> Scheduler<P> {
    pub fn new(
        display: DisplayController<P>,
        renderer: Option<ImageRenderer>,
        interval: Duration,
    ) -> Self {
        Self {
            display,
            renderer,
            interval,
        }
    }

    /// Run the scheduler loop
    ///
    /// Refreshes immediately, then once per interval until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Scheduler started, interval {:?}", self.interval);

        loop {
            self.refresh_display().await;

            tracing::debug!("Next refresh in {:?}", self.interval);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Perform one display refresh
    ///
    /// Errors are logged; the next tick is the retry.
    pub async fn refresh_display(&self) -> Option<Refresh> {
        let Some(renderer) = &self.renderer else {
            tracing::debug!("No image configured, skipping refresh");
            return None;
        };

        if let Err(e) = self.display.init().await {
            tracing::error!("Display setup failed: {}", e);
            return None;
        }

        let profile = self.display.profile();
        let img = match renderer.prepare(profile.width, profile.height) {
            Ok(img) => img,
            Err(e) => {
                tracing::error!("Render failed: {}", e);
                return None;
            }
        };

        let result = match self.display.update(|buffer| renderer.draw(&img, buffer)).await {
            Ok(refresh) => refresh,
            Err(e) => {
                tracing::error!("Scheduled refresh failed: {}", e);
                return None;
            }
        };

        match self.display.status().await {
            Status::Nominal => tracing::info!("Refresh {:?}, status nominal", result),
            Status::Degraded => tracing::warn!("Refresh {:?}, status degraded", result),
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DeviceProfile, DisplayError, FrameBuffer, Model};
    use crate::render::RenderOptions;
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Panel that records the rendered frames instead of driving hardware
    struct FakePanel {
        buffer: FrameBuffer,
        initialized: bool,
        refreshes: Arc<AtomicUsize>,
        last_black: Arc<AtomicUsize>,
    }

    impl FakePanel {
        fn new(refreshes: Arc<AtomicUsize>, last_black: Arc<AtomicUsize>) -> Self {
            let profile = Model::Epd1in54.profile();
            Self {
                buffer: FrameBuffer::new(profile.width, profile.height),
                initialized: false,
                refreshes,
                last_black,
            }
        }
    }

    impl Panel for FakePanel {
        fn profile(&self) -> &'static DeviceProfile {
            Model::Epd1in54.profile()
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn status(&self) -> Status {
            Status::Nominal
        }

        fn setup(&mut self) -> Result<(), DisplayError> {
            self.initialized = true;
            Ok(())
        }

        fn update<F>(&mut self, render: F) -> Result<Refresh, DisplayError>
        where
            F: FnOnce(&mut FrameBuffer),
        {
            if !self.initialized {
                return Err(DisplayError::NotInitialized);
            }
            render(&mut self.buffer);
            let black = self
                .buffer
                .as_bytes()
                .iter()
                .map(|b| (!b).count_ones() as usize)
                .sum();
            self.last_black.store(black, Ordering::SeqCst);
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(Refresh::Completed)
        }
    }

    fn black_image(dir: &tempfile::TempDir) -> ImageRenderer {
        let path = dir.path().join("black.png");
        GrayImage::from_pixel(20, 20, Luma([0])).save(&path).unwrap();
        ImageRenderer::new(path, RenderOptions::default())
    }

    #[tokio::test]
    async fn no_renderer_skips_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let panel = FakePanel::new(refreshes.clone(), Arc::new(AtomicUsize::new(0)));
        let scheduler = Scheduler::new(DisplayController::new(panel), None, Duration::from_secs(1));

        assert_eq!(scheduler.refresh_display().await, None);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_renders_image() {
        let dir = tempfile::tempdir().unwrap();
        let refreshes = Arc::new(AtomicUsize::new(0));
        let last_black = Arc::new(AtomicUsize::new(0));
        let panel = FakePanel::new(refreshes.clone(), last_black.clone());
        let scheduler = Scheduler::new(
            DisplayController::new(panel),
            Some(black_image(&dir)),
            Duration::from_secs(1),
        );

        assert_eq!(scheduler.refresh_display().await, Some(Refresh::Completed));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        // Square source fills the square panel
        assert_eq!(last_black.load(Ordering::SeqCst), 200 * 200);
    }

    #[tokio::test]
    async fn missing_image_does_not_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let panel = FakePanel::new(refreshes.clone(), Arc::new(AtomicUsize::new(0)));
        let renderer = ImageRenderer::new("/nonexistent/black.png", RenderOptions::default());
        let scheduler = Scheduler::new(
            DisplayController::new(panel),
            Some(renderer),
            Duration::from_secs(1),
        );

        assert_eq!(scheduler.refresh_display().await, None);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_refreshes_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let refreshes = Arc::new(AtomicUsize::new(0));
        let panel = FakePanel::new(refreshes.clone(), Arc::new(AtomicUsize::new(0)));
        let scheduler = Scheduler::new(
            DisplayController::new(panel),
            Some(black_image(&dir)),
            Duration::from_millis(20),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(70)).await;
            shutdown_tx.send(()).unwrap();
        };

        tokio::join!(scheduler.run(shutdown_rx), stop);

        assert!(refreshes.load(Ordering::SeqCst) >= 2);
    }
}
