//! Display-ready frame: RGBA8 pixel buffer at fixed dimensions
//!
//! **Why**: Decoded/transformed frames need one uniform representation the
//! display sink can consume without further conversion, plus byte accounting
//! for cache eviction.
//!
//! **Used by**: Pipeline (transform output), Animation (cached frames),
//! PlaybackScheduler (presentation), BoundedCache (size estimation)

use image::RgbaImage;

/// Single display-ready frame. Immutable after creation.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>, // RGBA, row-major, width * height * 4 bytes
}

impl DisplayFrame {
    /// Wrap a decoded RGBA buffer as a presentable frame.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// Build from raw parts. `pixels.len()` must be `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions as tuple
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA bytes for the display sink
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory size in bytes (buffer only; header overhead is noise next to pixels)
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }
}
