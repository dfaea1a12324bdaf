//! Per-model panel descriptions.
//!
//! Every supported panel is one immutable [`DeviceProfile`] record: geometry,
//! the init script run once at setup, waveform tables programmed at setup and
//! the refresh strategy its controller family needs. Selecting a model is a
//! table lookup; the driver never branches on the model itself.

use super::command::{type_a, type_b};
use super::lut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported Waveshare panel models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "1.54in", alias = "1.54")]
    Epd1in54,
    #[serde(rename = "2.13in", alias = "2.13")]
    Epd2in13,
    #[serde(rename = "2.90in", alias = "2.90", alias = "2.9in", alias = "2.9")]
    Epd2in9,
    #[serde(rename = "2.70in", alias = "2.70", alias = "2.7in", alias = "2.7")]
    Epd2in7,
    #[serde(rename = "4.20in", alias = "4.20", alias = "4.2in", alias = "4.2")]
    Epd4in2,
    #[serde(rename = "7.50in", alias = "7.50", alias = "7.5in", alias = "7.5")]
    Epd7in5,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::Epd1in54,
        Model::Epd2in13,
        Model::Epd2in9,
        Model::Epd2in7,
        Model::Epd4in2,
        Model::Epd7in5,
    ];

    /// Identifier used in configuration files and on the command line
    pub fn id(self) -> &'static str {
        match self {
            Model::Epd1in54 => "1.54in",
            Model::Epd2in13 => "2.13in",
            Model::Epd2in9 => "2.90in",
            Model::Epd2in7 => "2.70in",
            Model::Epd4in2 => "4.20in",
            Model::Epd7in5 => "7.50in",
        }
    }

    pub fn profile(self) -> &'static DeviceProfile {
        DeviceProfile::for_model(self)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown panel model '{0}' (expected one of 1.54in, 2.13in, 2.90in, 2.70in, 4.20in, 7.50in)")]
pub struct UnknownModel(pub String);

impl FromStr for Model {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix("in").unwrap_or(trimmed);
        let parsed: Option<f32> = number.parse().ok();

        Model::ALL
            .into_iter()
            .find(|model| {
                let id = model.id();
                let id_number: Option<f32> = id.trim_end_matches("in").parse().ok();
                id == trimmed || (parsed.is_some() && parsed == id_number)
            })
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

/// One step of a setup or refresh script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Command byte followed by its data bytes
    Command(u8, &'static [u8]),
    /// Block until the busy line clears
    WaitIdle,
    DelayMs(u32),
}

/// A waveform table and the register it is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lut {
    pub register: u8,
    pub table: &'static [u8],
}

/// How a controller family turns the framebuffer into a visible image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Single RAM plane; the LUT register alternates between the full and
    /// partial waveforms on a configurable cadence.
    LutSwitching {
        full: &'static [u8],
        partial: &'static [u8],
    },
    /// The framebuffer is written to both data planes, after an optional
    /// per-refresh preamble.
    DualPlane { preamble: &'static [InitStep] },
    /// Single plane, four bits per pixel: each source bit is expanded to a
    /// two-bit tone code.
    ToneExpanded,
}

/// Immutable description of one panel model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: Model,
    pub width: u32,
    pub height: u32,
    pub init_script: &'static [InitStep],
    /// Tables programmed once at setup
    pub luts: &'static [Lut],
    pub strategy: RefreshStrategy,
}

impl DeviceProfile {
    pub fn for_model(model: Model) -> &'static DeviceProfile {
        match model {
            Model::Epd1in54 => &PROFILES[0],
            Model::Epd2in13 => &PROFILES[1],
            Model::Epd2in9 => &PROFILES[2],
            Model::Epd2in7 => &PROFILES[3],
            Model::Epd4in2 => &PROFILES[4],
            Model::Epd7in5 => &PROFILES[5],
        }
    }

    /// Framebuffer length in bytes
    pub fn buffer_len(&self) -> usize {
        (self.width as usize * self.height as usize) / 8
    }

    /// Whether the full/partial cadence applies to this model
    pub fn switches_lut(&self) -> bool {
        matches!(self.strategy, RefreshStrategy::LutSwitching { .. })
    }
}

/// Family A init script; DRIVER_OUTPUT_CONTROL takes `height - 1`, low byte first
macro_rules! type_a_init {
    ($gate_lo:expr, $gate_hi:expr) => {
        [
            InitStep::Command(type_a::DRIVER_OUTPUT_CONTROL, &[$gate_lo, $gate_hi, 0x00]),
            InitStep::Command(type_a::BOOSTER_SOFT_START_CONTROL, &[0xD7, 0xD6, 0x9D]),
            InitStep::Command(type_a::WRITE_VCOM_REGISTER, &[0xA8]),
            InitStep::Command(type_a::SET_DUMMY_LINE_PERIOD, &[0x1A]),
            // 2us per row
            InitStep::Command(type_a::SET_GATE_TIME, &[0x08]),
            // top left to bottom right
            InitStep::Command(type_a::DATA_ENTRY_MODE_SETTING, &[0x03]),
        ]
    };
}

static INIT_1IN54: [InitStep; 6] = type_a_init!(0xC7, 0x00);
static INIT_2IN13: [InitStep; 6] = type_a_init!(0xF9, 0x00);
static INIT_2IN9: [InitStep; 6] = type_a_init!(0x27, 0x01);

const TYPE_A_REFRESH: RefreshStrategy = RefreshStrategy::LutSwitching {
    full: &lut::FULL_UPDATE,
    partial: &lut::PARTIAL_UPDATE,
};

static INIT_2IN7: [InitStep; 17] = [
    // VDS_EN VDG_EN, VCOM_HV VGHL_LV, VDH, VDL, VDHR
    InitStep::Command(type_b::POWER_SETTING, &[0x03, 0x00, 0x2B, 0x2B, 0x09]),
    InitStep::Command(type_b::BOOSTER_SOFT_START, &[0x07, 0x07, 0x17]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0x60, 0xA5]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0x89, 0xA5]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0x90, 0x00]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0x93, 0x2A]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0xA0, 0xA5]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0xA1, 0x00]),
    InitStep::Command(type_b::POWER_OPTIMIZATION, &[0x73, 0x41]),
    InitStep::Command(type_b::PARTIAL_DISPLAY_REFRESH, &[0x00]),
    InitStep::Command(type_b::POWER_ON, &[]),
    InitStep::WaitIdle,
    InitStep::DelayMs(10),
    // KW-BF KWR-AF BWROTP-0F
    InitStep::Command(type_b::PANEL_SETTING, &[0xAF]),
    // 100 Hz
    InitStep::Command(type_b::PLL_CONTROL, &[0x3A]),
    InitStep::Command(type_b::VCM_DC_SETTING_REGISTER, &[0x12]),
    InitStep::DelayMs(2),
];

static LUTS_2IN7: [Lut; 5] = [
    Lut { register: type_b::LUT_FOR_VCOM, table: &lut::VCOM_DC_2IN7 },
    Lut { register: type_b::LUT_WHITE_TO_WHITE, table: &lut::WHITE_TO_WHITE_2IN7 },
    Lut { register: type_b::LUT_BLACK_TO_WHITE, table: &lut::BLACK_TO_WHITE_2IN7 },
    Lut { register: type_b::LUT_WHITE_TO_BLACK, table: &lut::WHITE_TO_BLACK_2IN7 },
    Lut { register: type_b::LUT_BLACK_TO_BLACK, table: &lut::BLACK_TO_BLACK_2IN7 },
];

static INIT_4IN2: [InitStep; 8] = [
    InitStep::Command(type_b::POWER_SETTING, &[0x03, 0x00, 0x2B, 0x2B, 0xFF]),
    InitStep::Command(type_b::BOOSTER_SOFT_START, &[0x17, 0x17, 0x17]),
    InitStep::Command(type_b::POWER_ON, &[]),
    InitStep::WaitIdle,
    InitStep::DelayMs(10),
    InitStep::Command(type_b::PANEL_SETTING, &[0xBF, 0x0B]),
    InitStep::Command(type_b::PLL_CONTROL, &[0x3C]),
    InitStep::DelayMs(2),
];

static LUTS_4IN2: [Lut; 5] = [
    Lut { register: type_b::LUT_FOR_VCOM, table: &lut::VCOM_DC_4IN2 },
    Lut { register: type_b::LUT_WHITE_TO_WHITE, table: &lut::WHITE_TO_WHITE_4IN2 },
    Lut { register: type_b::LUT_BLACK_TO_WHITE, table: &lut::BLACK_TO_WHITE_4IN2 },
    Lut { register: type_b::LUT_WHITE_TO_BLACK, table: &lut::WHITE_TO_BLACK_4IN2 },
    Lut { register: type_b::LUT_BLACK_TO_BLACK, table: &lut::BLACK_TO_BLACK_4IN2 },
];

// 400 x 300
static PREAMBLE_4IN2: [InitStep; 3] = [
    InitStep::Command(type_b::RESOLUTION_SETTING, &[0x01, 0x90, 0x01, 0x2C]),
    InitStep::Command(type_b::VCM_DC_SETTING_REGISTER, &[0x12]),
    InitStep::Command(type_b::VCOM_AND_DATA_INTERVAL_SETTING, &[0x97]),
];

static INIT_7IN5: [InitStep; 13] = [
    InitStep::Command(type_b::POWER_SETTING, &[0x37, 0x00]),
    InitStep::Command(type_b::PANEL_SETTING, &[0xCF, 0x0B]),
    InitStep::Command(type_b::BOOSTER_SOFT_START, &[0xC7, 0xCC, 0x28]),
    InitStep::Command(type_b::POWER_ON, &[]),
    InitStep::WaitIdle,
    InitStep::DelayMs(10),
    InitStep::Command(type_b::PLL_CONTROL, &[0x3C]),
    InitStep::Command(type_b::TEMPERATURE_SENSOR_CALIBRATION, &[0x00]),
    InitStep::Command(type_b::VCOM_AND_DATA_INTERVAL_SETTING, &[0x77]),
    InitStep::Command(type_b::TCON_SETTING, &[0x22]),
    // 640 x 384
    InitStep::Command(type_b::RESOLUTION_SETTING, &[0x02, 0x80, 0x01, 0x80]),
    InitStep::Command(type_b::VCM_DC_SETTING_REGISTER, &[0x1E]),
    InitStep::Command(type_b::FLASH_MODE, &[0x03]),
];

static PROFILES: [DeviceProfile; 6] = [
    DeviceProfile {
        model: Model::Epd1in54,
        width: 200,
        height: 200,
        init_script: &INIT_1IN54,
        luts: &[],
        strategy: TYPE_A_REFRESH,
    },
    DeviceProfile {
        model: Model::Epd2in13,
        width: 128,
        height: 250,
        init_script: &INIT_2IN13,
        luts: &[],
        strategy: TYPE_A_REFRESH,
    },
    DeviceProfile {
        model: Model::Epd2in9,
        width: 128,
        height: 296,
        init_script: &INIT_2IN9,
        luts: &[],
        strategy: TYPE_A_REFRESH,
    },
    DeviceProfile {
        model: Model::Epd2in7,
        width: 176,
        height: 264,
        init_script: &INIT_2IN7,
        luts: &LUTS_2IN7,
        strategy: RefreshStrategy::DualPlane { preamble: &[] },
    },
    DeviceProfile {
        model: Model::Epd4in2,
        width: 400,
        height: 300,
        init_script: &INIT_4IN2,
        luts: &LUTS_4IN2,
        strategy: RefreshStrategy::DualPlane {
            preamble: &PREAMBLE_4IN2,
        },
    },
    DeviceProfile {
        model: Model::Epd7in5,
        width: 640,
        height: 384,
        init_script: &INIT_7IN5,
        luts: &[],
        strategy: RefreshStrategy::ToneExpanded,
    },
];
