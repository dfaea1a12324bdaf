//! Full/partial refresh cadence for LUT-switching controllers.

/// Waveform programmed into the LUT register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Full,
    Partial,
}

/// Position in the full/partial refresh cycle.
///
/// `mode_counter` runs `0..full_update_every`. Counter `0` means a full
/// update is due, `1` marks the first partial update after it. A cadence
/// below 2 disables switching and the panel keeps its built-in waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshState {
    mode_counter: u32,
    full_update_every: u32,
}

impl RefreshState {
    pub fn new(full_update_every: u32) -> Self {
        Self {
            mode_counter: 0,
            full_update_every,
        }
    }

    pub fn mode_counter(&self) -> u32 {
        self.mode_counter
    }

    pub fn full_update_every(&self) -> u32 {
        self.full_update_every
    }

    pub fn switching_enabled(&self) -> bool {
        self.full_update_every >= 2
    }

    /// Whether the next refresh is a full one
    pub fn full_update_due(&self) -> bool {
        !self.switching_enabled() || self.mode_counter == 0
    }

    /// Step to the next refresh.
    ///
    /// Returns the waveform to program when this refresh changes mode: the
    /// full table at counter 0 and the partial table at counter 1.
    pub fn advance(&mut self) -> Option<Waveform> {
        if !self.switching_enabled() {
            return None;
        }

        let full = self.mode_counter == 0;
        let prev_full = self.mode_counter == 1;
        self.mode_counter = (self.mode_counter + 1) % self.full_update_every;

        if full == prev_full {
            None
        } else if full {
            Some(Waveform::Full)
        } else {
            Some(Waveform::Partial)
        }
    }
}
