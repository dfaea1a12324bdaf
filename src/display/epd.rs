//! Generic Waveshare e-paper driver.
//!
//! One driver serves every supported panel. Model differences are carried by
//! the [`DeviceProfile`] selected at construction: its init script and setup
//! LUTs are replayed verbatim, and its [`RefreshStrategy`] decides how the
//! framebuffer reaches the panel on each refresh.
//!
//! A busy line that does not clear in time degrades the driver status and
//! skips the rest of the refresh; the next scheduled update retries.

use super::command::{type_a, type_b};
use super::framebuffer::{expand_tone, Color, FrameBuffer};
use super::gpio::{ControlPins, GpioError};
use super::profile::{DeviceProfile, InitStep, RefreshStrategy};
use super::refresh::{RefreshState, Waveform};
use super::spi::{CommandChannel, InterfaceError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use thiserror::Error;

/// Settle time around the two data planes of dual-plane controllers
const PLANE_SETTLE_MS: u32 = 2;

/// Display driver errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("Bus error: {0}")]
    Interface(#[from] InterfaceError),

    #[error("Display not initialized")]
    NotInitialized,
}

/// Health flag surfaced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Nominal,
    /// The last busy wait timed out
    Degraded,
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Completed,
    /// The panel stayed busy; nothing more was sent this cycle
    Skipped,
}

/// E-paper driver over any embedded-hal SPI device and pins
pub struct Epd<SPI, DC, RST, BSY, DELAY> {
    channel: CommandChannel<SPI, DC>,
    pins: ControlPins<RST, BSY>,
    delay: DELAY,
    profile: &'static DeviceProfile,
    buffer: FrameBuffer,
    refresh: RefreshState,
    status: Status,
    initialized: bool,
}

impl<SPI, DC, RST, BSY, DELAY> Epd<SPI, DC, RST, BSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
    DELAY: DelayNs,
{
    /// Create a driver for one panel.
    ///
    /// `full_update_every` only applies to LUT-switching controllers; values
    /// below 2 keep the built-in waveform.
    pub fn new(
        profile: &'static DeviceProfile,
        channel: CommandChannel<SPI, DC>,
        pins: ControlPins<RST, BSY>,
        delay: DELAY,
        full_update_every: u32,
    ) -> Self {
        Self {
            channel,
            pins,
            delay,
            profile,
            buffer: FrameBuffer::new(profile.width, profile.height),
            refresh: RefreshState::new(full_update_every),
            status: Status::Nominal,
            initialized: false,
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    /// Reset the panel and program it for this model
    pub fn setup(&mut self) -> Result<(), DisplayError> {
        let profile = self.profile;
        tracing::info!(
            "Initializing {} e-paper display ({}x{})",
            profile.model,
            profile.width,
            profile.height
        );

        self.pins.reset(&mut self.delay)?;
        self.run_script(profile.init_script)?;

        if !profile.luts.is_empty() {
            for lut in profile.luts {
                self.channel.send_command_data(lut.register, lut.table)?;
            }
            tracing::debug!("Programmed {} waveform tables", profile.luts.len());
        }

        self.initialized = true;
        self.log_config();
        Ok(())
    }

    /// Render into the framebuffer, then push it to the panel
    pub fn update<F>(&mut self, render: F) -> Result<Refresh, DisplayError>
    where
        F: FnOnce(&mut FrameBuffer),
    {
        render(&mut self.buffer);
        self.display()
    }

    /// Fill the panel with one color
    pub fn clear(&mut self, color: Color) -> Result<Refresh, DisplayError> {
        tracing::info!("Clearing display to {:?}", color);
        self.update(|buffer| buffer.fill(color))
    }

    /// Push the framebuffer to the panel and trigger a refresh
    pub fn display(&mut self) -> Result<Refresh, DisplayError> {
        if !self.initialized {
            return Err(DisplayError::NotInitialized);
        }

        let refresh = match self.profile.strategy {
            RefreshStrategy::LutSwitching { full, partial } => {
                self.display_lut_switching(full, partial)?
            }
            RefreshStrategy::DualPlane { preamble } => self.display_dual_plane(preamble)?,
            RefreshStrategy::ToneExpanded => self.display_tone_expanded()?,
        };

        if refresh == Refresh::Completed {
            self.status = Status::Nominal;
            tracing::debug!("Display refresh triggered");
        }
        Ok(refresh)
    }

    fn display_lut_switching(
        &mut self,
        full: &'static [u8],
        partial: &'static [u8],
    ) -> Result<Refresh, DisplayError> {
        if !self.wait_idle_or_degrade()? {
            return Ok(Refresh::Skipped);
        }

        let full_due = self.refresh.full_update_due();
        if let Some(waveform) = self.refresh.advance() {
            tracing::debug!("Switching to {:?} update waveform", waveform);
            let table = match waveform {
                Waveform::Full => full,
                Waveform::Partial => partial,
            };
            self.channel.send_command_data(type_a::WRITE_LUT_REGISTER, table)?;
        }

        // Address the whole panel: X in bytes, Y in rows
        let x_end = ((self.profile.width - 1) >> 3) as u8;
        let y_end = (self.profile.height - 1) as u16;
        let [y_end_lo, y_end_hi] = y_end.to_le_bytes();

        self.channel
            .send_command_data(type_a::SET_RAM_X_ADDRESS_START_END_POSITION, &[0x00, x_end])?;
        self.channel.send_command_data(
            type_a::SET_RAM_Y_ADDRESS_START_END_POSITION,
            &[0x00, 0x00, y_end_lo, y_end_hi],
        )?;
        self.channel
            .send_command_data(type_a::SET_RAM_X_ADDRESS_COUNTER, &[0x00])?;
        self.channel
            .send_command_data(type_a::SET_RAM_Y_ADDRESS_COUNTER, &[0x00, 0x00])?;

        if !self.wait_idle_or_degrade()? {
            return Ok(Refresh::Skipped);
        }

        self.channel
            .send_command_data(type_a::WRITE_RAM, self.buffer.as_bytes())?;

        self.channel
            .send_command_data(type_a::DISPLAY_UPDATE_CONTROL_2, &[type_a::UPDATE_SEQUENCE])?;
        self.channel.send_command(type_a::MASTER_ACTIVATION)?;
        self.channel.send_command(type_a::TERMINATE_FRAME_READ_WRITE)?;

        tracing::debug!("{} update sent", if full_due { "Full" } else { "Partial" });
        Ok(Refresh::Completed)
    }

    /// Both planes receive the same framebuffer, so every refresh is a full one
    fn display_dual_plane(&mut self, preamble: &'static [InitStep]) -> Result<Refresh, DisplayError> {
        if !self.wait_idle_or_degrade()? {
            return Ok(Refresh::Skipped);
        }

        self.run_script(preamble)?;

        self.channel.send_command(type_b::DATA_START_TRANSMISSION_1)?;
        self.delay.delay_ms(PLANE_SETTLE_MS);
        self.channel.send_data(self.buffer.as_bytes())?;
        self.delay.delay_ms(PLANE_SETTLE_MS);

        self.channel.send_command(type_b::DATA_START_TRANSMISSION_2)?;
        self.delay.delay_ms(PLANE_SETTLE_MS);
        self.channel.send_data(self.buffer.as_bytes())?;

        self.channel.send_command(type_b::DISPLAY_REFRESH)?;
        Ok(Refresh::Completed)
    }

    fn display_tone_expanded(&mut self) -> Result<Refresh, DisplayError> {
        if !self.wait_idle_or_degrade()? {
            return Ok(Refresh::Skipped);
        }

        self.channel.send_command(type_b::DATA_START_TRANSMISSION_1)?;
        let tones = self.buffer.as_bytes().iter().flat_map(|&b| expand_tone(b));
        self.channel.send_data_iter(tones)?;

        self.channel.send_command(type_b::DISPLAY_REFRESH)?;
        Ok(Refresh::Completed)
    }

    /// Replay a script of commands, busy waits and delays.
    ///
    /// A busy timeout inside a script degrades status but does not stop it.
    fn run_script(&mut self, script: &'static [InitStep]) -> Result<(), DisplayError> {
        for step in script {
            match *step {
                InitStep::Command(cmd, data) => self.channel.send_command_data(cmd, data)?,
                InitStep::WaitIdle => {
                    self.wait_idle_or_degrade()?;
                }
                InitStep::DelayMs(ms) => self.delay.delay_ms(ms),
            }
        }
        Ok(())
    }

    /// Wait for the busy line; `false` (and degraded status) on timeout
    fn wait_idle_or_degrade(&mut self) -> Result<bool, DisplayError> {
        match self.pins.wait_idle(&mut self.delay) {
            Ok(()) => Ok(true),
            Err(GpioError::BusyTimeout(ms)) => {
                tracing::warn!("Display still busy after {}ms, skipping", ms);
                self.status = Status::Degraded;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn log_config(&self) {
        tracing::info!(
            "Display ready: model={}, {}x{}, buffer={} bytes, reset={}, busy={}",
            self.profile.model,
            self.profile.width,
            self.profile.height,
            self.buffer.len(),
            self.pins.has_reset(),
            self.pins.has_busy()
        );
        if self.profile.switches_lut() {
            if self.refresh.switching_enabled() {
                tracing::info!(
                    "Full update every {} refreshes",
                    self.refresh.full_update_every()
                );
            } else {
                tracing::info!("Waveform switching disabled, using built-in LUT");
            }
        }
    }
}
