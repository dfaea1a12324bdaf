//! Render sources for the framebuffer.
//!
//! Loads a local image, fits it to the panel and quantizes it to one bit
//! per pixel. Also provides the checkerboard used by `--test`.

pub mod dither;
pub mod transform;

pub use dither::{dither_into, threshold_into};
pub use transform::{transform_image, Rotation, TransformOptions};

use crate::config::Config;
use crate::display::{Color, FrameBuffer};
use image::GrayImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Checkerboard cell size in pixels
const CHECKER_CELL: u32 = 8;

/// Render errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to open image {0}: {1}")]
    Open(String, #[source] image::ImageError),
}

/// How an image is turned into panel pixels
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub transform: TransformOptions,
    /// Error diffusion (true) or plain threshold (false)
    pub dither: bool,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transform: TransformOptions {
                rotation: Rotation::from(config.rotation),
                mirror_h: config.mirror_h,
                mirror_v: config.mirror_v,
                scale_to_fit: config.scale_to_fit,
                rotate_first: config.rotate_first,
            },
            dither: config.dither,
        }
    }
}

/// Renders an image file into the framebuffer
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    path: PathBuf,
    options: RenderOptions,
}

impl ImageRenderer {
    pub fn new(path: impl Into<PathBuf>, options: RenderOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Renderer for the configured image, if any
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.has_image() {
            return None;
        }
        Some(Self::new(
            config.image_path.trim(),
            RenderOptions::from_config(config),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the image and fit it to `width` x `height`
    ///
    /// The file is read on every call, so a replaced image shows up on the
    /// next refresh.
    pub fn prepare(&self, width: u32, height: u32) -> Result<GrayImage, RenderError> {
        let img = image::open(&self.path)
            .map_err(|e| RenderError::Open(self.path.display().to_string(), e))?;

        tracing::debug!(
            "Loaded {} ({}x{})",
            self.path.display(),
            img.width(),
            img.height()
        );

        Ok(transform_image(img, &self.options.transform, width, height))
    }

    /// Quantize a prepared image into the framebuffer
    pub fn draw(&self, img: &GrayImage, buffer: &mut FrameBuffer) {
        if self.options.dither {
            dither_into(img, buffer);
        } else {
            threshold_into(img, buffer);
        }
    }
}

/// Fill the framebuffer with a checkerboard of 8x8 cells, black at the origin
pub fn test_pattern(buffer: &mut FrameBuffer) {
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            let color = if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
                Color::Black
            } else {
                Color::White
            };
            buffer.set_pixel(x as i32, y as i32, color);
        }
    }
}
