//! Recording HAL doubles for driver tests.
//!
//! All handles share one state: bus bytes are logged as command or data
//! according to the DC level at write time, and delays advance a simulated
//! clock that the busy pin reads, so timeouts complete instantly.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

const NANOS_PER_MILLI: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Command(u8),
    Data(u8),
    /// Reset line level (`true` = high)
    Reset(bool),
    DelayMs(u32),
}

#[derive(Debug, Clone, Copy)]
enum Busy {
    Idle,
    Stuck,
    UntilNs(u64),
    /// Asserted from the read after this many reads
    AfterReads(usize),
}

#[derive(Debug)]
struct State {
    events: Vec<Event>,
    dc_high: bool,
    transactions: usize,
    clock_ns: u64,
    busy: Busy,
    busy_active_low: bool,
    busy_reads: usize,
}

#[derive(Clone)]
pub struct MockBus {
    state: Rc<RefCell<State>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                events: Vec::new(),
                dc_high: false,
                transactions: 0,
                clock_ns: 0,
                busy: Busy::Idle,
                busy_active_low: false,
                busy_reads: 0,
            })),
        }
    }

    pub fn spi(&self) -> MockSpi {
        MockSpi { state: Rc::clone(&self.state) }
    }

    pub fn dc(&self) -> MockPin {
        MockPin { state: Rc::clone(&self.state), role: PinRole::DataCommand }
    }

    pub fn reset(&self) -> MockPin {
        MockPin { state: Rc::clone(&self.state), role: PinRole::Reset }
    }

    pub fn busy(&self) -> MockBusy {
        MockBusy { state: Rc::clone(&self.state) }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { state: Rc::clone(&self.state) }
    }

    /// Busy pin stays asserted forever
    pub fn hold_busy(&self) {
        self.state.borrow_mut().busy = Busy::Stuck;
    }

    /// Busy pin asserted for the next `ms` of simulated time
    pub fn busy_for_ms(&self, ms: u64) {
        let mut state = self.state.borrow_mut();
        state.busy = Busy::UntilNs(state.clock_ns + ms * NANOS_PER_MILLI);
    }

    /// Busy pin reads idle `reads` times, then stays asserted
    pub fn busy_after_reads(&self, reads: usize) {
        let mut state = self.state.borrow_mut();
        state.busy = Busy::AfterReads(state.busy_reads + reads);
    }

    pub fn release_busy(&self) {
        self.state.borrow_mut().busy = Busy::Idle;
    }

    /// Wire the busy pin electrically inverted (low = busy)
    pub fn busy_active_low(&self) {
        self.state.borrow_mut().busy_active_low = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Command and data bytes only
    pub fn bus_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Command(_) | Event::Data(_)))
            .collect()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Data(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Data bytes sent after each occurrence of `cmd`, up to the next command
    pub fn payloads_of(&self, cmd: u8) -> Vec<Vec<u8>> {
        let mut payloads = Vec::new();
        let mut current: Option<Vec<u8>> = None;
        for event in self.events() {
            match event {
                Event::Command(c) => {
                    if let Some(done) = current.take() {
                        payloads.push(done);
                    }
                    if c == cmd {
                        current = Some(Vec::new());
                    }
                }
                Event::Data(d) => {
                    if let Some(payload) = current.as_mut() {
                        payload.push(d);
                    }
                }
                _ => {}
            }
        }
        if let Some(done) = current {
            payloads.push(done);
        }
        payloads
    }

    pub fn transactions(&self) -> usize {
        self.state.borrow().transactions
    }

    pub fn busy_reads(&self) -> usize {
        self.state.borrow().busy_reads
    }

    pub fn clock_ms(&self) -> u64 {
        self.state.borrow().clock_ns / NANOS_PER_MILLI
    }

    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.transactions = 0;
        state.busy_reads = 0;
    }
}

pub struct MockSpi {
    state: Rc<RefCell<State>>,
}

impl spi::ErrorType for MockSpi {
    type Error = Infallible;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.transactions += 1;
        for op in operations.iter() {
            match op {
                Operation::Write(bytes) => {
                    let dc_high = state.dc_high;
                    state.events.extend(bytes.iter().map(|&b| {
                        if dc_high {
                            Event::Data(b)
                        } else {
                            Event::Command(b)
                        }
                    }));
                }
                Operation::DelayNs(ns) => state.clock_ns += u64::from(*ns),
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PinRole {
    DataCommand,
    Reset,
}

pub struct MockPin {
    state: Rc<RefCell<State>>,
    role: PinRole,
}

impl MockPin {
    fn set(&mut self, high: bool) {
        let mut state = self.state.borrow_mut();
        match self.role {
            PinRole::DataCommand => state.dc_high = high,
            PinRole::Reset => state.events.push(Event::Reset(high)),
        }
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub struct MockBusy {
    state: Rc<RefCell<State>>,
}

impl digital::ErrorType for MockBusy {
    type Error = Infallible;
}

impl InputPin for MockBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.busy_reads += 1;
        let busy = match state.busy {
            Busy::Idle => false,
            Busy::Stuck => true,
            Busy::UntilNs(until) => state.clock_ns < until,
            Busy::AfterReads(reads) => state.busy_reads > reads,
        };
        Ok(busy != state.busy_active_low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

pub struct MockDelay {
    state: Rc<RefCell<State>>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.state.borrow_mut().clock_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::DelayMs(ms));
        state.clock_ns += u64::from(ms) * NANOS_PER_MILLI;
    }
}
