//! One-bit-per-pixel framebuffer.
//!
//! Pixels are packed MSB-first, row-major. The panels use an inverted
//! convention: a black pixel is a cleared bit, a white pixel a set bit.

/// Pixel colors supported by the monochrome panels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// Byte value with every pixel in this color
    pub const fn fill_byte(self) -> u8 {
        match self {
            Color::Black => 0x00,
            Color::White => 0xFF,
        }
    }
}

/// Bit-packed pixel store sized for one panel
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a white framebuffer of `ceil(width * height / 8)` bytes.
    ///
    /// Panel geometries are byte aligned per row, so for them the length is
    /// exactly `width * height / 8`.
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize * height as usize).div_ceil(8);
        Self {
            width,
            height,
            data: vec![Color::White.fill_byte(); len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Buffer length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw packed pixel data, in the order the controller expects it
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Set every pixel to one color
    pub fn fill(&mut self, color: Color) {
        self.data.fill(color.fill_byte());
    }

    /// Set a single pixel. Coordinates outside the panel are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let Some((pos, mask)) = self.locate(x, y) else {
            return;
        };

        match color {
            Color::White => self.data[pos] |= mask,
            Color::Black => self.data[pos] &= !mask,
        }
    }

    /// Read a pixel back, `None` outside the panel
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let (pos, mask) = self.locate(x, y)?;
        if self.data[pos] & mask != 0 {
            Some(Color::White)
        } else {
            Some(Color::Black)
        }
    }

    /// Byte index and bit mask of an in-bounds pixel
    fn locate(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }

        let (x, y) = (x as usize, y as usize);
        let pos = (x + y * self.width as usize) / 8;
        Some((pos, 0x80 >> (x & 0x07)))
    }
}

/// Expand one packed byte into the 4-bit-per-pixel format of the 7.5" panel.
///
/// Each source bit becomes the tone code `0b11` (set) or `0b00` (clear);
/// two consecutive bits share one output byte, first bit in the high nibble.
pub fn expand_tone(byte: u8) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let pair = byte << (i * 2);
        let high = if pair & 0x80 != 0 { 0x30 } else { 0x00 };
        let low = if pair & 0x40 != 0 { 0x03 } else { 0x00 };
        *slot = high | low;
    }
    out
}
