//! Controller command bytes.

/// Family A controllers (1.54", 2.13", 2.9")
pub mod type_a {
    pub const DRIVER_OUTPUT_CONTROL: u8 = 0x01;
    pub const BOOSTER_SOFT_START_CONTROL: u8 = 0x0C;
    pub const DATA_ENTRY_MODE_SETTING: u8 = 0x11;
    pub const MASTER_ACTIVATION: u8 = 0x20;
    pub const DISPLAY_UPDATE_CONTROL_2: u8 = 0x22;
    pub const WRITE_RAM: u8 = 0x24;
    pub const WRITE_VCOM_REGISTER: u8 = 0x2C;
    pub const WRITE_LUT_REGISTER: u8 = 0x32;
    pub const SET_DUMMY_LINE_PERIOD: u8 = 0x3A;
    pub const SET_GATE_TIME: u8 = 0x3B;
    pub const SET_RAM_X_ADDRESS_START_END_POSITION: u8 = 0x44;
    pub const SET_RAM_Y_ADDRESS_START_END_POSITION: u8 = 0x45;
    pub const SET_RAM_X_ADDRESS_COUNTER: u8 = 0x4E;
    pub const SET_RAM_Y_ADDRESS_COUNTER: u8 = 0x4F;
    pub const TERMINATE_FRAME_READ_WRITE: u8 = 0xFF;

    /// DISPLAY_UPDATE_CONTROL_2 sequence: clock, analog, display pattern
    pub const UPDATE_SEQUENCE: u8 = 0xC4;
}

/// Family B controllers (2.7", 4.2", 7.5")
pub mod type_b {
    pub const PANEL_SETTING: u8 = 0x00;
    pub const POWER_SETTING: u8 = 0x01;
    pub const POWER_ON: u8 = 0x04;
    pub const BOOSTER_SOFT_START: u8 = 0x06;
    pub const DATA_START_TRANSMISSION_1: u8 = 0x10;
    pub const DISPLAY_REFRESH: u8 = 0x12;
    pub const DATA_START_TRANSMISSION_2: u8 = 0x13;
    pub const PARTIAL_DISPLAY_REFRESH: u8 = 0x16;
    pub const LUT_FOR_VCOM: u8 = 0x20;
    pub const LUT_WHITE_TO_WHITE: u8 = 0x21;
    pub const LUT_BLACK_TO_WHITE: u8 = 0x22;
    pub const LUT_WHITE_TO_BLACK: u8 = 0x23;
    pub const LUT_BLACK_TO_BLACK: u8 = 0x24;
    pub const PLL_CONTROL: u8 = 0x30;
    pub const TEMPERATURE_SENSOR_CALIBRATION: u8 = 0x41;
    pub const VCOM_AND_DATA_INTERVAL_SETTING: u8 = 0x50;
    pub const TCON_SETTING: u8 = 0x60;
    pub const RESOLUTION_SETTING: u8 = 0x61;
    pub const VCM_DC_SETTING_REGISTER: u8 = 0x82;
    pub const FLASH_MODE: u8 = 0xE5;
    pub const POWER_OPTIMIZATION: u8 = 0xF8;
}
