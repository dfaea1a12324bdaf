//! Raspberry Pi backend.
//!
//! Opens the SPI bus and GPIO pins named in the configuration and builds an
//! [`Epd`] on top of them. The kernel spidev driver toggles chip select
//! around every transfer, so each write is one framed transaction.

use super::gpio::ControlPins;
use super::spi::CommandChannel;
use super::{DisplayController, DisplayError, Epd};
use crate::config::{Config, SpiConfig};
use embedded_hal::spi::{self, Operation, SpiDevice};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::hal::Delay;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub type RpiEpd = Epd<SpidevDevice, OutputPin, OutputPin, InputPin, Delay>;
pub type RpiDisplayController = DisplayController<RpiEpd>;

/// Hardware setup errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("GPIO initialization failed: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI initialization failed: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Unsupported SPI bus {0}")]
    InvalidBus(u8),

    #[error("Unsupported SPI slave select {0}")]
    InvalidSlaveSelect(u8),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

/// SPI write failure reported through embedded-hal
#[derive(Error, Debug)]
#[error("SPI transfer failed: {0}")]
pub struct SpidevError(#[from] rppal::spi::Error);

impl spi::Error for SpidevError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// spidev-backed [`SpiDevice`] with hardware chip select
pub struct SpidevDevice {
    spi: Spi,
}

impl SpidevDevice {
    /// Open the bus in mode 0 (CPOL=0, CPHA=0), MSB first
    pub fn open(config: &SpiConfig) -> Result<Self, BackendError> {
        let spi = Spi::new(
            bus(config.bus)?,
            slave_select(config.slave_select)?,
            config.clock_speed_hz,
            Mode::Mode0,
        )?;

        tracing::debug!(
            "SPI initialized: Bus=SPI{}, SS=CE{}, Speed={}Hz, Mode=0",
            config.bus,
            config.slave_select,
            config.clock_speed_hz
        );

        Ok(Self { spi })
    }
}

impl spi::ErrorType for SpidevDevice {
    type Error = SpidevError;
}

impl SpiDevice for SpidevDevice {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(data) => {
                    self.spi.write(data)?;
                }
                Operation::Read(buf) => {
                    self.spi.read(buf)?;
                }
                Operation::Transfer(read, write) => {
                    self.spi.transfer(read, write)?;
                }
                Operation::TransferInPlace(buf) => {
                    let write = buf.to_vec();
                    self.spi.transfer(buf, &write)?;
                }
                Operation::DelayNs(ns) => thread::sleep(Duration::from_nanos(u64::from(*ns))),
            }
        }
        Ok(())
    }
}

fn bus(index: u8) -> Result<Bus, BackendError> {
    Ok(match index {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        other => return Err(BackendError::InvalidBus(other)),
    })
}

fn slave_select(index: u8) -> Result<SlaveSelect, BackendError> {
    Ok(match index {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        other => return Err(BackendError::InvalidSlaveSelect(other)),
    })
}

/// Open the configured SPI bus and pins and build the driver
pub fn open(config: &Config) -> Result<RpiEpd, BackendError> {
    let gpio = Gpio::new()?;
    let pins = &config.pins;

    let dc = gpio.get(pins.dc)?.into_output_low();
    let reset = pins
        .reset
        .map(|pin| gpio.get(pin).map(|p| p.into_output_high()))
        .transpose()?;
    let busy = pins
        .busy
        .map(|pin| gpio.get(pin).map(|p| p.into_input_pulldown()))
        .transpose()?;

    tracing::debug!(
        "GPIO initialized: DC={}, RST={:?}, BUSY={:?}",
        pins.dc,
        pins.reset,
        pins.busy
    );

    let channel = CommandChannel::new(SpidevDevice::open(&config.spi)?, dc)
        .map_err(DisplayError::from)?;
    let control = ControlPins::new(reset, busy, pins.busy_active_low).map_err(DisplayError::from)?;

    Ok(Epd::new(
        config.model.profile(),
        channel,
        control,
        Delay::new(),
        config.full_update_every,
    ))
}
