//! PNG screenshots of decoded frames

use crate::error::{LinkError, Result};
use crate::types::ScreenshotResolution;
use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Default file name prefix for screenshots
pub const DEFAULT_PREFIX: &str = "fzlink";

/// Writes scaled screenshots into a directory
#[derive(Debug, Clone)]
pub struct ScreenshotExporter {
    dir: PathBuf,
    prefix: String,
    resolution: ScreenshotResolution,
}

impl ScreenshotExporter {
    pub fn new(dir: impl Into<PathBuf>, resolution: ScreenshotResolution) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            resolution,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// File name for a screenshot taken at `at`
    pub fn file_name(&self, at: DateTime<Local>) -> String {
        format!("{}_{}.png", self.prefix, at.format("%Y%m%d%H%M%S"))
    }

    /// Scale `img` to the configured resolution
    ///
    /// Nearest-neighbour keeps the pixel edges hard.
    pub fn scale(&self, img: &RgbImage) -> RgbImage {
        imageops::resize(
            img,
            self.resolution.width,
            self.resolution.height,
            FilterType::Nearest,
        )
    }

    /// Save a screenshot stamped with the current local time
    pub fn save(&self, img: &RgbImage) -> Result<PathBuf> {
        self.save_at(img, Local::now())
    }

    /// Save a screenshot stamped with `at`
    pub fn save_at(&self, img: &RgbImage, at: DateTime<Local>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LinkError::Image(image::ImageError::IoError(e)))?;
        let path = self.dir.join(self.file_name(at));
        write_png(&self.scale(img), &path)?;
        tracing::info!("Saved screenshot to {}", path.display());
        Ok(path)
    }
}

fn write_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{ScreenDecoder, ScreenFrame};
    use chrono::TimeZone;

    #[test]
    fn test_file_name_format() {
        let exporter = ScreenshotExporter::new(".", ScreenshotResolution::default());
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(exporter.file_name(at), "fzlink_20240309070501.png");
        let exporter = exporter.with_prefix("flipper");
        assert_eq!(exporter.file_name(at), "flipper_20240309070501.png");
    }

    #[test]
    fn test_scale_keeps_hard_edges() {
        let frame = ScreenFrame::from_fn(4, 2, |x, _| x < 2).unwrap();
        let img = ScreenDecoder::default().image(&frame);
        let res = ScreenshotResolution {
            width: 8,
            height: 4,
        };
        let scaled = ScreenshotExporter::new(".", res).scale(&img);
        assert_eq!(scaled.dimensions(), (8, 4));
        assert_eq!(scaled.get_pixel(3, 3), img.get_pixel(1, 1));
        assert_eq!(scaled.get_pixel(4, 0), img.get_pixel(2, 0));
    }

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let frame = ScreenFrame::from_fn(128, 64, |x, y| (x ^ y) & 1 == 0).unwrap();
        let img = ScreenDecoder::default().image(&frame);
        let exporter = ScreenshotExporter::new(dir.path().join("shots"), ScreenshotResolution::default());

        let path = exporter.save(&img).unwrap();
        assert!(path.starts_with(dir.path()));
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (1024, 512));
    }
}
