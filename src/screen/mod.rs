//! Screen stream pipeline
//!
//! Frames pushed by the device are decoded into a terminal-friendly glyph
//! grid plus a full-resolution image, then handed to the presentation layer
//! through a bounded queue that never blocks the device callback.
//!
//! - [`ScreenFrame`] - Raw monochrome bitmap in the device's page layout
//! - [`ScreenDecoder`] - Pure frame → [`DecodedScreen`] conversion
//! - [`ScreenSink`] / [`ScreenReceiver`] - Non-blocking hand-off with a drop policy
//! - [`export`] - PNG screenshots of decoded frames

pub mod decoder;
pub mod delivery;
pub mod export;

pub use decoder::{DecodedScreen, GlyphGrid, ScreenDecoder, FULL_BLOCK, LOWER_HALF, UPPER_HALF};
pub use delivery::{screen_channel, screen_callback, DropPolicy, ScreenReceiver, ScreenSink};
pub use export::ScreenshotExporter;

use crate::error::{LinkError, Result};

/// Display width of the reference device in pixels
pub const SCREEN_WIDTH: usize = 128;

/// Display height of the reference device in pixels
pub const SCREEN_HEIGHT: usize = 64;

/// One pushed snapshot of the device display
///
/// Pixels are packed in vertical pages: byte `(y / 8) * width + x` holds
/// column `x` of rows `8 * (y / 8) ..`, least significant bit on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl ScreenFrame {
    /// Wrap a packed buffer, checking it against the geometry
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = packed_len(width, height)?;
        if data.len() != expected {
            return Err(LinkError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame with the reference device's dimensions
    pub fn from_device(data: Vec<u8>) -> Result<Self> {
        Self::new(SCREEN_WIDTH, SCREEN_HEIGHT, data)
    }

    /// All-clear frame
    pub fn blank(width: usize, height: usize) -> Result<Self> {
        Ok(Self {
            width,
            height,
            data: vec![0; packed_len(width, height)?],
        })
    }

    /// Build a frame from a row-major predicate
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> bool,
    ) -> Result<Self> {
        let mut frame = Self::blank(width, height)?;
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    frame.data[(y / 8) * width + x] |= 1 << (y % 8);
                }
            }
        }
        Ok(frame)
    }

    /// Always fits in a `u32`
    pub fn width(&self) -> usize {
        self.width
    }

    /// Always fits in a `u32`
    pub fn height(&self) -> usize {
        self.height
    }

    /// Packed page data as received from the device
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the pixel at (`x`, `y`) is lit; out-of-range reads as clear
    pub fn is_pixel_set(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[(y / 8) * self.width + x] & (1 << (y % 8)) != 0
    }
}

// Byte length of a packed frame; both sides must fit the raster's u32 axes
fn packed_len(width: usize, height: usize) -> Result<usize> {
    let too_large = || LinkError::InvalidFrame(format!("{}x{} frame is too large", width, height));
    u32::try_from(width).map_err(|_| too_large())?;
    u32::try_from(height).map_err(|_| too_large())?;
    width.checked_mul(height.div_ceil(8)).ok_or_else(too_large)
}
