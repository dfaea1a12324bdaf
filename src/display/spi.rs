//! Command/data framing for the panel controller bus.
//!
//! Every write is a single `SpiDevice` transaction, so chip select is
//! asserted and released around it by the device. The DC line is driven
//! low for command bytes and high for data bytes before each write.
//! SPI mode 0 transmits MSB first, which is what every supported
//! controller expects.

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, SpiDevice};
use thiserror::Error;

/// Largest payload written in one bus transaction
pub const CHUNK_SIZE: usize = 4096;

/// Bus framing errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("SPI write failed: {0:?}")]
    Spi(spi::ErrorKind),

    #[error("DC pin write failed: {0:?}")]
    DataCommand(digital::ErrorKind),
}

/// Command/data channel to the panel controller
pub struct CommandChannel<SPI, DC> {
    spi: SPI,
    dc: DC,
}

impl<SPI, DC> CommandChannel<SPI, DC>
where
    SPI: SpiDevice,
    DC: OutputPin,
{
    /// Wrap an SPI device and the DC pin.
    ///
    /// The DC line idles low (command mode).
    pub fn new(spi: SPI, mut dc: DC) -> Result<Self, InterfaceError> {
        dc.set_low().map_err(pin_error)?;
        Ok(Self { spi, dc })
    }

    /// Send a command byte (DC low)
    pub fn send_command(&mut self, cmd: u8) -> Result<(), InterfaceError> {
        self.dc.set_low().map_err(pin_error)?;
        self.spi.write(&[cmd]).map_err(spi_error)
    }

    /// Send data bytes (DC high), chunked to bound transaction size
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), InterfaceError> {
        if data.is_empty() {
            return Ok(());
        }

        self.dc.set_high().map_err(pin_error)?;
        for chunk in data.chunks(CHUNK_SIZE) {
            self.spi.write(chunk).map_err(spi_error)?;
        }
        Ok(())
    }

    /// Stream a generated payload without materializing it in full
    pub fn send_data_iter<I>(&mut self, data: I) -> Result<(), InterfaceError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut filled = 0;

        self.dc.set_high().map_err(pin_error)?;
        for byte in data {
            chunk[filled] = byte;
            filled += 1;
            if filled == CHUNK_SIZE {
                self.spi.write(&chunk).map_err(spi_error)?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.spi.write(&chunk[..filled]).map_err(spi_error)?;
        }
        Ok(())
    }

    /// Send a command followed by its data bytes
    pub fn send_command_data(&mut self, cmd: u8, data: &[u8]) -> Result<(), InterfaceError> {
        self.send_command(cmd)?;
        self.send_data(data)
    }
}

fn spi_error<E: spi::Error>(e: E) -> InterfaceError {
    InterfaceError::Spi(e.kind())
}

fn pin_error<E: digital::Error>(e: E) -> InterfaceError {
    InterfaceError::DataCommand(e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::{Event, MockBus};

    #[test]
    fn command_then_data_framing() {
        let bus = MockBus::new();
        let mut channel = CommandChannel::new(bus.spi(), bus.dc()).unwrap();

        channel.send_command_data(0x22, &[0xC4]).unwrap();
        channel.send_command(0x20).unwrap();

        assert_eq!(
            bus.bus_events(),
            vec![Event::Command(0x22), Event::Data(0xC4), Event::Command(0x20)]
        );
        assert_eq!(bus.transactions(), 3);
    }

    #[test]
    fn empty_payload_sends_nothing() {
        let bus = MockBus::new();
        let mut channel = CommandChannel::new(bus.spi(), bus.dc()).unwrap();

        channel.send_data(&[]).unwrap();
        assert!(bus.bus_events().is_empty());
        assert_eq!(bus.transactions(), 0);
    }

    #[test]
    fn large_payload_is_chunked_in_order() {
        let bus = MockBus::new();
        let mut channel = CommandChannel::new(bus.spi(), bus.dc()).unwrap();

        let payload: Vec<u8> = (0..(CHUNK_SIZE * 2 + 10)).map(|i| i as u8).collect();
        channel.send_data(&payload).unwrap();

        assert_eq!(bus.transactions(), 3);
        assert_eq!(bus.data_bytes(), payload);
    }

    #[test]
    fn streamed_payload_matches_input() {
        let bus = MockBus::new();
        let mut channel = CommandChannel::new(bus.spi(), bus.dc()).unwrap();

        channel.send_data_iter((0..CHUNK_SIZE + 1).map(|i| (i % 251) as u8)).unwrap();

        assert_eq!(bus.transactions(), 2);
        let expected: Vec<u8> = (0..CHUNK_SIZE + 1).map(|i| (i % 251) as u8).collect();
        assert_eq!(bus.data_bytes(), expected);
    }
}
