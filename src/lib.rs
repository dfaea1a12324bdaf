//! Waveshare e-paper panel driver for Raspberry Pi
//!
//! - Drives 1.54", 2.13", 2.9", 2.7", 4.2" and 7.5" monochrome panels over SPI
//! - Full/partial waveform switching on panels that support it
//! - Renders local images to the panel on a fixed interval

pub mod config;
pub mod display;
pub mod render;
pub mod scheduler;
