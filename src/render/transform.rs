//! Image transformation operations.
//!
//! Rotates, mirrors and scales a source image to the panel geometry and
//! reduces it to luma.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};

/// Rotation angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl From<u16> for Rotation {
    fn from(degrees: u16) -> Self {
        match degrees {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }
}

/// Image transformation options
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub rotation: Rotation,
    pub mirror_h: bool,
    pub mirror_v: bool,
    /// Letterbox inside the panel (true) or crop to fill it (false)
    pub scale_to_fit: bool,
    /// Apply rotation before mirroring (true) or mirror before rotating (false)
    pub rotate_first: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            mirror_h: false,
            mirror_v: false,
            scale_to_fit: true,
            rotate_first: true,
        }
    }
}

/// Transform an image to exactly `width` x `height` grayscale pixels
pub fn transform_image(
    img: DynamicImage,
    options: &TransformOptions,
    width: u32,
    height: u32,
) -> GrayImage {
    let img = if options.rotate_first {
        let img = apply_rotation(img, options.rotation);
        apply_mirroring(img, options.mirror_h, options.mirror_v)
    } else {
        let img = apply_mirroring(img, options.mirror_h, options.mirror_v);
        apply_rotation(img, options.rotation)
    };

    if options.scale_to_fit {
        scale_to_fit(&img, width, height)
    } else {
        scale_to_fill(&img, width, height)
    }
}

fn apply_rotation(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Rotate90 => img.rotate90(),
        Rotation::Rotate180 => img.rotate180(),
        Rotation::Rotate270 => img.rotate270(),
    }
}

fn apply_mirroring(mut img: DynamicImage, mirror_h: bool, mirror_v: bool) -> DynamicImage {
    if mirror_h {
        img = img.fliph();
    }
    if mirror_v {
        img = img.flipv();
    }
    img
}

/// Scale within bounds and center on a white canvas
fn scale_to_fit(img: &DynamicImage, max_width: u32, max_height: u32) -> GrayImage {
    let (src_width, src_height) = img.dimensions();

    let scale_w = max_width as f32 / src_width as f32;
    let scale_h = max_height as f32 / src_height as f32;
    let scale = scale_w.min(scale_h);

    let new_width = ((src_width as f32 * scale) as u32).clamp(1, max_width);
    let new_height = ((src_height as f32 * scale) as u32).clamp(1, max_height);

    tracing::debug!(
        "Scaling {}x{} -> {}x{} (fit into {}x{})",
        src_width,
        src_height,
        new_width,
        new_height,
        max_width,
        max_height
    );

    let resized = img
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_luma8();

    let mut canvas = GrayImage::from_pixel(max_width, max_height, Luma([255]));
    let offset_x = (max_width - new_width) / 2;
    let offset_y = (max_height - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    canvas
}

/// Scale to cover the bounds, then center crop
fn scale_to_fill(img: &DynamicImage, target_width: u32, target_height: u32) -> GrayImage {
    let (src_width, src_height) = img.dimensions();

    let scale_w = target_width as f32 / src_width as f32;
    let scale_h = target_height as f32 / src_height as f32;
    let scale = scale_w.max(scale_h);

    // Round up so float error never leaves the result short of the target
    let new_width = ((src_width as f32 * scale).ceil() as u32).max(target_width);
    let new_height = ((src_height as f32 * scale).ceil() as u32).max(target_height);

    tracing::debug!(
        "Scaling {}x{} -> {}x{} (fill {}x{})",
        src_width,
        src_height,
        new_width,
        new_height,
        target_width,
        target_height
    );

    let resized = img.resize_exact(new_width, new_height, FilterType::Triangle);

    let crop_x = (new_width - target_width) / 2;
    let crop_y = (new_height - target_height) / 2;

    resized
        .crop_imm(crop_x, crop_y, target_width, target_height)
        .to_luma8()
}
