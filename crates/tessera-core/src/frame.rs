use crate::color::Color;
use crate::error::{TesseraError, TesseraResult};

/// A CPU-side image as a row-major buffer of premultiplied RGBA pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Pixel data, `width * height` entries.
    pub pixels: Vec<Color>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self::solid(width, height, Color::TRANSPARENT)
    }

    /// Create a frame buffer filled with a single color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            pixels: vec![color; count],
            width,
            height,
        }
    }

    /// Build a frame buffer from 8-bit RGBA bytes.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8]) -> TesseraResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(TesseraError::InvalidArgument(format!(
                "expected {} bytes for a {}x{} frame, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        let pixels = data
            .chunks_exact(4)
            .map(|p| Color::from_rgba8([p[0], p[1], p[2], p[3]]))
            .collect();
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Get the pixel at a coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get((y as usize) * (self.width as usize) + (x as usize))
            .copied()
    }

    /// Set the pixel at a coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = (y as usize) * (self.width as usize) + (x as usize);
        self.pixels[index] = color;
    }

    /// Pack into 8-bit RGBA bytes (e.g. for PNG export or GPU upload).
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| c.to_rgba8()).collect()
    }

    /// Pack into straight-alpha 8-bit RGBA bytes, the layout image files use.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|c| c.unpremultiplied().to_rgba8())
            .collect()
    }

    pub fn same_size(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }
}
