//! Content hashing for deterministic output verification.
//!
//! Produces a SHA-256 hash of frame buffer data or of generated kernel
//! text, so identical inputs can be checked for bit-exact identical output.

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn finish(hasher: Sha256) -> ContentHash {
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    ContentHash::from_bytes(bytes)
}

/// Compute the content hash of a frame buffer, bit-exact on the f32 pixels.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    // Dimensions are part of the hash so differently shaped buffers with the
    // same pixel sequence do not collide.
    hasher.update(frame.width.to_le_bytes());
    hasher.update(frame.height.to_le_bytes());
    for pixel in &frame.pixels {
        for channel in pixel.to_array() {
            hasher.update(channel.to_bits().to_le_bytes());
        }
    }
    finish(hasher)
}

/// Compute the content hash of a sequence of length-prefixed text parts.
pub fn hash_text(parts: &[&str]) -> ContentHash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    finish(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_hash_deterministic() {
        let frame1 = FrameBuffer::solid(10, 10, Color::RED);
        let frame2 = FrameBuffer::solid(10, 10, Color::RED);
        assert_eq!(hash_frame(&frame1), hash_frame(&frame2));
    }

    #[test]
    fn test_hash_includes_dimensions() {
        let wide = FrameBuffer::solid(4, 1, Color::RED);
        let tall = FrameBuffer::solid(1, 4, Color::RED);
        assert_ne!(hash_frame(&wide), hash_frame(&tall));
    }

    #[test]
    fn test_hash_text_is_length_prefixed() {
        assert_ne!(hash_text(&["ab", "c"]), hash_text(&["a", "bc"]));
        assert_eq!(hash_text(&["x"]).to_hex().len(), 64);
    }
}
