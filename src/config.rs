//! Configuration management for the e-paper driver service.
//!
//! Handles loading, saving, and validating configuration from JSON files.

use crate::display::Model;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/opt/epaper-driver/config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// GPIO pin assignments (BCM numbering)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PinConfig {
    /// Data/Command select, required
    #[serde(default = "default_dc_pin")]
    pub dc: u8,

    /// Reset line, active low
    #[serde(default = "default_reset_pin")]
    pub reset: Option<u8>,

    /// Busy line, high while the controller works
    #[serde(default = "default_busy_pin")]
    pub busy: Option<u8>,

    /// Treat a low busy line as busy
    #[serde(default)]
    pub busy_active_low: bool,
}

fn default_dc_pin() -> u8 {
    25
}

fn default_reset_pin() -> Option<u8> {
    Some(17)
}

fn default_busy_pin() -> Option<u8> {
    Some(24)
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            dc: default_dc_pin(),
            reset: default_reset_pin(),
            busy: default_busy_pin(),
            busy_active_low: false,
        }
    }
}

/// SPI bus settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpiConfig {
    #[serde(default)]
    pub bus: u8,

    /// Chip enable line (CE0, CE1, CE2)
    #[serde(default)]
    pub slave_select: u8,

    #[serde(default = "default_clock_speed")]
    pub clock_speed_hz: u32,
}

fn default_clock_speed() -> u32 {
    4_000_000
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            slave_select: 0,
            clock_speed_hz: default_clock_speed(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Panel model, e.g. "2.90in"
    #[serde(default = "default_model")]
    pub model: Model,

    /// Seconds between display updates
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Full refresh cadence for LUT-switching panels; below 2 disables partial updates
    #[serde(default = "default_full_update_every")]
    pub full_update_every: u32,

    #[serde(default)]
    pub pins: PinConfig,

    #[serde(default)]
    pub spi: SpiConfig,

    /// Image rendered on every update
    #[serde(default)]
    pub image_path: String,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: u16,

    /// Horizontal mirror
    #[serde(default)]
    pub mirror_h: bool,

    /// Vertical mirror
    #[serde(default)]
    pub mirror_v: bool,

    /// Scale image to fit display
    #[serde(default = "default_true")]
    pub scale_to_fit: bool,

    /// Apply rotation before mirroring (true) or mirror before rotating (false)
    #[serde(default = "default_true")]
    pub rotate_first: bool,

    /// Error-diffusion dithering (true) or plain threshold (false)
    #[serde(default = "default_true")]
    pub dither: bool,

    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_model() -> Model {
    Model::Epd2in9
}

fn default_update_interval() -> u64 {
    60
}

fn default_full_update_every() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            update_interval_secs: default_update_interval(),
            full_update_every: default_full_update_every(),
            pins: PinConfig::default(),
            spi: SpiConfig::default(),
            image_path: String::new(),
            rotation: 0,
            mirror_h: false,
            mirror_v: false,
            scale_to_fit: true,
            rotate_first: true,
            dither: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, `None` if the file does not exist
    ///
    /// A file that exists but cannot be read, parsed or validated is an
    /// error; the caller must not guess a panel model.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::ReadError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Save configuration to a JSON file atomically
    ///
    /// Writes to a temporary file and renames it over the target, so a
    /// power loss never leaves a half-written config behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ConfigError::ReadError(e)
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "update_interval_secs must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::ValidationError(
                "rotation must be 0, 90, 180, or 270".to_string(),
            ));
        }

        if self.spi.bus > 6 {
            return Err(ConfigError::ValidationError(format!(
                "spi.bus {} must be between 0 and 6",
                self.spi.bus
            )));
        }

        if self.spi.slave_select > 2 {
            return Err(ConfigError::ValidationError(format!(
                "spi.slave_select {} must be between 0 and 2",
                self.spi.slave_select
            )));
        }

        if !(1_000..=32_000_000).contains(&self.spi.clock_speed_hz) {
            return Err(ConfigError::ValidationError(
                "spi.clock_speed_hz must be between 1 kHz and 32 MHz".to_string(),
            ));
        }

        let mut used = HashSet::new();
        for pin in [Some(self.pins.dc), self.pins.reset, self.pins.busy]
            .into_iter()
            .flatten()
        {
            if pin > 27 {
                return Err(ConfigError::ValidationError(format!(
                    "GPIO {} is not a valid BCM pin",
                    pin
                )));
            }
            if !used.insert(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "GPIO {} is assigned more than once",
                    pin
                )));
            }
        }

        Ok(())
    }

    /// Check if an image is configured
    pub fn has_image(&self) -> bool {
        !self.image_path.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, Model::Epd2in9);
        assert_eq!(config.pins, PinConfig::default());
        assert!(!config.has_image());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.update_interval_secs, 60);
        assert_eq!(config.full_update_every, 30);
        assert_eq!(config.spi, SpiConfig::default());
        assert!(config.dither);
    }

    #[test]
    fn optional_pins_can_be_null() {
        let config: Config = serde_json::from_str(
            r#"{"model": "7.50in", "pins": {"dc": 22, "reset": null, "busy": null}}"#,
        )
        .unwrap();
        assert_eq!(config.model, Model::Epd7in5);
        assert_eq!(config.pins.dc, 22);
        assert_eq!(config.pins.reset, None);
        assert_eq!(config.pins.busy, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_model_fails_to_parse() {
        let result: Result<Config, _> = serde_json::from_str(r#"{"model": "9.7in"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.update_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rotation = 45;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.spi.slave_select = 3;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.spi.clock_speed_hz = 100_000_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pins.busy = Some(config.pins.dc);
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.model = Model::Epd4in2;
        config.full_update_every = 0;
        config.image_path = "/srv/panel.png".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.model, Model::Epd4in2);
        assert_eq!(loaded.full_update_every, 0);
        assert!(loaded.has_image());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_optional_only_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(Config::load_optional(&path).unwrap().is_none());

        std::fs::write(&path, r#"{"model": "7.5 in"}"#).unwrap();
        assert!(matches!(
            Config::load_optional(&path),
            Err(ConfigError::ParseError(_))
        ));

        std::fs::write(&path, r#"{"rotation": 45}"#).unwrap();
        assert!(matches!(
            Config::load_optional(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, r#"{"model": "4.20in"}"#).unwrap();
        let config = Config::load_optional(&path).unwrap().unwrap();
        assert_eq!(config.model, Model::Epd4in2);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"rotation": 30}"#).unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(ConfigError::ReadError(_))
        ));
    }
}
