//! Reset and busy control lines.
//!
//! Both lines are optional. Without a reset pin the panel is never
//! hardware-reset; without a busy pin the panel is assumed always ready.
//! The DC line lives with the bus framing in [`super::spi`].

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use thiserror::Error;

/// Reset pulse timing
pub mod timing {
    /// Time the reset line is held low
    pub const RESET_HOLD_MS: u32 = 200;
    /// Settle time after releasing reset
    pub const RESET_SETTLE_MS: u32 = 200;
    /// Busy pin poll interval
    pub const BUSY_POLL_MS: u32 = 10;
    /// Default bound for a busy wait
    pub const BUSY_TIMEOUT_MS: u32 = 1000;
}

/// GPIO-related errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    #[error("Busy timeout: display did not respond within {0}ms")]
    BusyTimeout(u32),

    #[error("GPIO access failed: {0:?}")]
    Pin(digital::ErrorKind),
}

/// Optional reset and busy lines of one panel
pub struct ControlPins<RST, BSY> {
    reset: Option<RST>,
    busy: Option<BSY>,
    busy_active_low: bool,
}

impl<RST, BSY> ControlPins<RST, BSY>
where
    RST: OutputPin,
    BSY: InputPin,
{
    /// Take ownership of the control lines.
    ///
    /// The reset line idles high. `busy_active_low` inverts the busy level
    /// for boards that pull the line low while the controller works.
    pub fn new(
        mut reset: Option<RST>,
        busy: Option<BSY>,
        busy_active_low: bool,
    ) -> Result<Self, GpioError> {
        if let Some(rst) = reset.as_mut() {
            rst.set_high().map_err(pin_error)?;
        }

        tracing::debug!(
            "Control pins: reset={}, busy={}{}",
            reset.is_some(),
            busy.is_some(),
            if busy_active_low { " (active low)" } else { "" }
        );

        Ok(Self {
            reset,
            busy,
            busy_active_low,
        })
    }

    pub fn has_reset(&self) -> bool {
        self.reset.is_some()
    }

    pub fn has_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Perform the hardware reset pulse, if a reset pin is wired
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), GpioError> {
        let Some(rst) = self.reset.as_mut() else {
            return Ok(());
        };

        tracing::debug!("Performing hardware reset");

        rst.set_low().map_err(pin_error)?;
        delay.delay_ms(timing::RESET_HOLD_MS);

        rst.set_high().map_err(pin_error)?;
        delay.delay_ms(timing::RESET_SETTLE_MS);

        Ok(())
    }

    /// Check if the controller currently reports busy
    pub fn is_busy(&mut self) -> Result<bool, GpioError> {
        let active_low = self.busy_active_low;
        match self.busy.as_mut() {
            Some(pin) => {
                let high = pin.is_high().map_err(pin_error)?;
                Ok(high != active_low)
            }
            None => Ok(false),
        }
    }

    /// Wait for the controller to become idle with the default bound
    pub fn wait_idle(&mut self, delay: &mut impl DelayNs) -> Result<(), GpioError> {
        self.wait_idle_timeout(delay, timing::BUSY_TIMEOUT_MS)
    }

    /// Wait for the controller with a custom timeout.
    ///
    /// Elapsed time is the sum of poll intervals spent in `delay`, so the
    /// bound follows whatever clock the delay provider implements.
    pub fn wait_idle_timeout(
        &mut self,
        delay: &mut impl DelayNs,
        timeout_ms: u32,
    ) -> Result<(), GpioError> {
        if self.busy.is_none() {
            return Ok(());
        }

        let mut elapsed_ms: u32 = 0;
        while self.is_busy()? {
            if elapsed_ms > timeout_ms {
                tracing::error!("Timeout while waiting for display ({}ms)", timeout_ms);
                return Err(GpioError::BusyTimeout(timeout_ms));
            }
            delay.delay_ms(timing::BUSY_POLL_MS);
            elapsed_ms = elapsed_ms.saturating_add(timing::BUSY_POLL_MS);
        }

        if elapsed_ms > 100 {
            tracing::debug!("BUSY wait completed after {}ms", elapsed_ms);
        }

        Ok(())
    }
}

fn pin_error<E: digital::Error>(e: E) -> GpioError {
    GpioError::Pin(e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::{Event, MockBus, MockBusy, MockPin};

    fn pins(bus: &MockBus, reset: bool, busy: bool) -> ControlPins<MockPin, MockBusy> {
        ControlPins::new(
            reset.then(|| bus.reset()),
            busy.then(|| bus.busy()),
            false,
        )
        .unwrap()
    }

    #[test]
    fn reset_pulse_holds_low_then_settles() {
        let bus = MockBus::new();
        let mut pins = pins(&bus, true, false);
        let mut delay = bus.delay();

        pins.reset(&mut delay).unwrap();

        assert_eq!(
            bus.events(),
            vec![
                Event::Reset(true),
                Event::Reset(false),
                Event::DelayMs(200),
                Event::Reset(true),
                Event::DelayMs(200),
            ]
        );
    }

    #[test]
    fn reset_without_pin_is_noop() {
        let bus = MockBus::new();
        let mut pins = pins(&bus, false, false);
        let mut delay = bus.delay();

        pins.reset(&mut delay).unwrap();
        assert!(bus.events().is_empty());
        assert!(!pins.has_reset());
    }

    #[test]
    fn no_busy_pin_is_always_ready() {
        let bus = MockBus::new();
        bus.hold_busy();
        let mut pins = pins(&bus, false, false);
        let mut delay = bus.delay();

        assert_eq!(pins.wait_idle(&mut delay), Ok(()));
        assert_eq!(bus.clock_ms(), 0);
        assert_eq!(bus.busy_reads(), 0);
    }

    #[test]
    fn stuck_busy_times_out_after_bound() {
        let bus = MockBus::new();
        bus.hold_busy();
        let mut pins = pins(&bus, false, true);
        let mut delay = bus.delay();

        assert_eq!(pins.wait_idle(&mut delay), Err(GpioError::BusyTimeout(1000)));
        assert!(bus.clock_ms() > 1000);
        assert!(bus.clock_ms() <= 1000 + u64::from(timing::BUSY_POLL_MS));
    }

    #[test]
    fn busy_clears_within_bound() {
        let bus = MockBus::new();
        bus.busy_for_ms(45);
        let mut pins = pins(&bus, false, true);
        let mut delay = bus.delay();

        assert_eq!(pins.wait_idle(&mut delay), Ok(()));
        assert_eq!(bus.clock_ms(), 50);
        assert!(bus.events().iter().all(|e| *e == Event::DelayMs(10)));
    }

    #[test]
    fn active_low_busy_is_inverted() {
        let bus = MockBus::new();
        bus.busy_active_low();
        let mut pins = ControlPins::<MockPin, _>::new(None, Some(bus.busy()), true).unwrap();

        assert!(!pins.is_busy().unwrap());
        bus.hold_busy();
        assert!(pins.is_busy().unwrap());
    }
}
