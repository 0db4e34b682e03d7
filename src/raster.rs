//! In-memory RGBA raster for building screenshot fixtures.
//!
//! Provides a small drawing API for creating baseline and capture images
//! without a browser:
//! - `fill()` - Fill the entire raster with a color
//! - `draw_rect()` - Draw a filled rectangle
//! - `get_pixel()` / `set_pixel()` - Direct pixel access

use image::{Rgba, RgbaImage};

use crate::diff::{decode_image, encode_png};
use crate::error::VisregResult;

/// An RGBA pixel buffer with simple drawing operations
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    /// Create a new raster with the given dimensions, initialized to transparent black
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Create a raster initialized to a specific color
    pub fn with_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
        }
    }

    /// Wrap an existing image
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Load a raster from encoded image bytes
    pub fn from_png_bytes(data: &[u8]) -> VisregResult<Self> {
        Ok(Self::from_image(decode_image(data)?))
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Fill the entire raster with a color
    pub fn fill(&mut self, color: [u8; 4]) {
        for px in self.image.pixels_mut() {
            *px = Rgba(color);
        }
    }

    /// Draw a filled rectangle, clipped to the raster
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 4]) {
        let x_end = x.saturating_add(w).min(self.width());
        let y_end = y.saturating_add(h).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.image.put_pixel(px, py, Rgba(color));
            }
        }
    }

    /// Get the color of a pixel; out-of-bounds reads are transparent black
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width() || y >= self.height() {
            return [0, 0, 0, 0];
        }
        self.image.get_pixel(x, y).0
    }

    /// Set the color of a pixel; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        self.image.put_pixel(x, y, Rgba(color));
    }

    /// Borrow the underlying image
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take the underlying image
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode the raster as PNG bytes
    pub fn to_png(&self) -> VisregResult<Vec<u8>> {
        encode_png(&self.image)
    }
}
