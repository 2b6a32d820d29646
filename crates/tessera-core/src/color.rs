use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TesseraError, TesseraResult};

/// RGBA color with f32 components, nominally in the [0.0, 1.0] range.
///
/// Colors flowing through the compositing graph are premultiplied by alpha.
/// Use [`Color::premultiplied`] to convert a straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new RGBA color.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 1.0).
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from a hex string (e.g., "#FF0000" or "#FF000080").
    pub fn from_hex(hex: &str) -> TesseraResult<Self> {
        let digits = hex.trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| TesseraError::InvalidArgument(format!("invalid hex color '{}'", hex)))
        };
        match digits.len() {
            6 => Ok(Self::from_rgba8([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255])),
            8 => Ok(Self::from_rgba8([
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            ])),
            _ => Err(TesseraError::InvalidArgument(format!(
                "invalid hex color '{}'",
                hex
            ))),
        }
    }

    /// Convert from RGBA u8 components.
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self {
            r: rgba[0] as f32 / 255.0,
            g: rgba[1] as f32 / 255.0,
            b: rgba[2] as f32 / 255.0,
            a: rgba[3] as f32 / 255.0,
        }
    }

    /// Convert to RGBA u8 components, clamping out-of-range values.
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.g * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.b * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Multiply the color channels by alpha.
    pub fn premultiplied(&self) -> Color {
        Color {
            r: self.r * self.a,
            g: self.g * self.a,
            b: self.b * self.a,
            a: self.a,
        }
    }

    /// Divide the color channels by alpha. Fully transparent colors become
    /// transparent black.
    pub fn unpremultiplied(&self) -> Color {
        if self.a <= 0.0 {
            return Color::TRANSPARENT;
        }
        Color {
            r: self.r / self.a,
            g: self.g / self.a,
            b: self.b / self.a,
            a: self.a,
        }
    }

    /// Components as an array in RGBA order.
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_array(c: [f32; 4]) -> Self {
        Self::rgba(c[0], c[1], c[2], c[3])
    }

    /// Component-wise comparison within `epsilon`.
    pub fn approx_eq(&self, other: &Color, epsilon: f32) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    // --- Named constants ---

    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
}

impl Default for Color {
    fn default() -> Self {
        Color::TRANSPARENT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
    }
}
