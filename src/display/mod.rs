//! Display module for Waveshare e-paper panels.
//!
//! The driver ([`Epd`]) is generic over embedded-hal SPI, GPIO and delay
//! implementations; [`rpi`] wires it to the Raspberry Pi peripherals.

pub mod command;
pub mod epd;
pub mod framebuffer;
pub mod gpio;
pub mod lut;
pub mod profile;
pub mod refresh;
pub mod rpi;
pub mod spi;

#[cfg(test)]
mod mock;

// Re-export main types
pub use epd::{DisplayError, Epd, Refresh, Status};
pub use framebuffer::{Color, FrameBuffer};
pub use profile::{DeviceProfile, Model};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A panel that can be set up and refreshed from a render callback
pub trait Panel {
    fn profile(&self) -> &'static DeviceProfile;

    fn is_initialized(&self) -> bool;

    fn status(&self) -> Status;

    fn setup(&mut self) -> Result<(), DisplayError>;

    fn update<F>(&mut self, render: F) -> Result<Refresh, DisplayError>
    where
        F: FnOnce(&mut FrameBuffer);
}

impl<SPI, DC, RST, BSY, DELAY> Panel for Epd<SPI, DC, RST, BSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    fn profile(&self) -> &'static DeviceProfile {
        Epd::profile(self)
    }

    fn is_initialized(&self) -> bool {
        Epd::is_initialized(self)
    }

    fn status(&self) -> Status {
        Epd::status(self)
    }

    fn setup(&mut self) -> Result<(), DisplayError> {
        Epd::setup(self)
    }

    fn update<F>(&mut self, render: F) -> Result<Refresh, DisplayError>
    where
        F: FnOnce(&mut FrameBuffer),
    {
        Epd::update(self, render)
    }
}

/// Shareable display handle; the lock keeps bus transactions from interleaving
pub struct DisplayController<P> {
    panel: Arc<Mutex<P>>,
    profile: &'static DeviceProfile,
}

impl<P: Panel> DisplayController<P> {
    pub fn new(panel: P) -> Self {
        let profile = panel.profile();
        Self {
            panel: Arc::new(Mutex::new(panel)),
            profile,
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    /// Run panel setup once
    pub async fn init(&self) -> Result<(), DisplayError> {
        let mut panel = self.panel.lock().await;

        if panel.is_initialized() {
            tracing::debug!("Display already initialized");
            return Ok(());
        }

        panel.setup()
    }

    /// Render into the framebuffer and refresh the panel
    pub async fn update<F>(&self, render: F) -> Result<Refresh, DisplayError>
    where
        F: FnOnce(&mut FrameBuffer),
    {
        let mut panel = self.panel.lock().await;
        panel.update(render)
    }

    /// Clear display to white, initializing it if needed
    pub async fn clear(&self) -> Result<Refresh, DisplayError> {
        self.init().await?;
        tracing::info!("Clearing display");
        self.update(|buffer| buffer.fill(Color::White)).await
    }

    /// Show test pattern, initializing the display if needed
    pub async fn test_pattern(&self) -> Result<Refresh, DisplayError> {
        self.init().await?;
        tracing::info!("Displaying test pattern");
        self.update(crate::render::test_pattern).await
    }

    pub async fn status(&self) -> Status {
        self.panel.lock().await.status()
    }
}

impl<P> Clone for DisplayController<P> {
    fn clone(&self) -> Self {
        Self {
            panel: Arc::clone(&self.panel),
            profile: self.profile,
        }
    }
}
