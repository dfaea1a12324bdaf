//! One-bit quantization into the panel framebuffer.
//!
//! Floyd-Steinberg error diffusion keeps only two rows of error terms in
//! memory, which matters on the Pi Zero W's limited RAM.

use crate::display::{Color, FrameBuffer};
use image::GrayImage;

/// Luma at or above this value maps to white
const THRESHOLD: i16 = 128;

#[inline]
fn quantize(value: i16) -> (Color, i16) {
    if value >= THRESHOLD {
        (Color::White, 255)
    } else {
        (Color::Black, 0)
    }
}

/// Dither a grayscale image into the framebuffer.
///
/// Only the overlapping area is written; the image is expected to match
/// the framebuffer geometry.
pub fn dither_into(img: &GrayImage, buffer: &mut FrameBuffer) {
    let width = img.width().min(buffer.width()) as usize;
    let height = img.height().min(buffer.height()) as usize;

    tracing::debug!("Applying Floyd-Steinberg dithering ({}x{})", width, height);

    let mut curr_row: Vec<i16> = vec![0; width];
    let mut next_row: Vec<i16> = vec![0; width];

    for y in 0..height {
        for (x, err) in curr_row.iter_mut().enumerate() {
            *err += i16::from(img.get_pixel(x as u32, y as u32)[0]);
        }

        for x in 0..width {
            let value = curr_row[x].clamp(0, 255);
            let (color, level) = quantize(value);
            let err = value - level;

            // Right: 7/16
            if x + 1 < width {
                curr_row[x + 1] += err * 7 / 16;
            }

            if y + 1 < height {
                // Bottom-left: 3/16
                if x > 0 {
                    next_row[x - 1] += err * 3 / 16;
                }
                // Bottom: 5/16
                next_row[x] += err * 5 / 16;
                // Bottom-right: 1/16
                if x + 1 < width {
                    next_row[x + 1] += err / 16;
                }
            }

            buffer.set_pixel(x as i32, y as i32, color);
        }

        std::mem::swap(&mut curr_row, &mut next_row);
        next_row.iter_mut().for_each(|e| *e = 0);
    }
}

/// Map each pixel to black or white at the 50% level
pub fn threshold_into(img: &GrayImage, buffer: &mut FrameBuffer) {
    let width = img.width().min(buffer.width());
    let height = img.height().min(buffer.height());

    for y in 0..height {
        for x in 0..width {
            let (color, _) = quantize(i16::from(img.get_pixel(x, y)[0]));
            buffer.set_pixel(x as i32, y as i32, color);
        }
    }
}
