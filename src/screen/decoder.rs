//! Frame decoding
//!
//! Terminal cells are roughly twice as tall as they are wide, so two pixel
//! rows fold into one row of half-block glyphs:
//!
//! | top | bottom | glyph |
//! |-----|--------|-------|
//! | 0   | 0      | space |
//! | 1   | 0      | `▀`   |
//! | 0   | 1      | `▄`   |
//! | 1   | 1      | `█`   |
//!
//! The image output keeps every pixel, for lossless export.

use super::ScreenFrame;
use crate::error::{LinkError, Result};
use crate::types::Rgb;
use image::RgbImage;

pub const FULL_BLOCK: char = '█';
pub const UPPER_HALF: char = '▀';
pub const LOWER_HALF: char = '▄';

/// Glyph for one column of a pixel row pair
pub fn glyph(top: bool, bottom: bool) -> char {
    match (top, bottom) {
        (true, true) => FULL_BLOCK,
        (true, false) => UPPER_HALF,
        (false, true) => LOWER_HALF,
        (false, false) => ' ',
    }
}

/// Fixed-size grid of half-block glyphs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphGrid {
    columns: usize,
    rows: usize,
    cells: Vec<char>,
}

impl GlyphGrid {
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Glyph at column `x`, row `y`
    pub fn cell(&self, x: usize, y: usize) -> Option<char> {
        (x < self.columns && y < self.rows).then(|| self.cells[y * self.columns + x])
    }

    /// One row of glyphs
    pub fn row(&self, y: usize) -> Option<&[char]> {
        (y < self.rows).then(|| &self.cells[y * self.columns..(y + 1) * self.columns])
    }

    /// Rows as strings, top to bottom
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells.chunks(self.columns.max(1)).map(|row| row.iter().collect())
    }
}

/// Rows joined by `\n`, no trailing newline
impl std::fmt::Display for GlyphGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, line) in self.lines().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&line)?;
        }
        Ok(())
    }
}

/// Both renderings of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedScreen {
    pub grid: GlyphGrid,
    pub image: RgbImage,
}

/// Converts frames using a fixed colour pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDecoder {
    fg: Rgb,
    bg: Rgb,
}

impl ScreenDecoder {
    pub fn new(fg: Rgb, bg: Rgb) -> Self {
        Self { fg, bg }
    }

    /// Decode both renderings
    pub fn decode(&self, frame: &ScreenFrame) -> Result<DecodedScreen> {
        Ok(DecodedScreen {
            grid: self.glyphs(frame)?,
            image: self.image(frame),
        })
    }

    /// Half-block glyph grid; the frame height must be even
    pub fn glyphs(&self, frame: &ScreenFrame) -> Result<GlyphGrid> {
        if frame.height() % 2 != 0 {
            return Err(LinkError::InvalidFrame(format!(
                "height {} is not even",
                frame.height()
            )));
        }
        let columns = frame.width();
        let rows = frame.height() / 2;
        let mut cells = Vec::with_capacity(columns * rows);
        for y in (0..frame.height()).step_by(2) {
            for x in 0..columns {
                cells.push(glyph(frame.is_pixel_set(x, y), frame.is_pixel_set(x, y + 1)));
            }
        }
        Ok(GlyphGrid {
            columns,
            rows,
            cells,
        })
    }

    /// Two-colour raster at device resolution
    ///
    /// [`ScreenFrame`] guarantees both sides fit in a `u32`.
    pub fn image(&self, frame: &ScreenFrame) -> RgbImage {
        let fg = image::Rgb(self.fg.to_array());
        let bg = image::Rgb(self.bg.to_array());
        RgbImage::from_fn(frame.width() as u32, frame.height() as u32, |x, y| {
            if frame.is_pixel_set(x as usize, y as usize) {
                fg
            } else {
                bg
            }
        })
    }
}

impl Default for ScreenDecoder {
    fn default() -> Self {
        Self::new(Rgb::new(0x00, 0x00, 0x00), Rgb::new(0xFF, 0x8C, 0x00))
    }
}
