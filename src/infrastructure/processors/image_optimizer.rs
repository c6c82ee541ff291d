use crate::core::{interfaces::ImageOptimizer, models::ImageOptions};
use crate::utils::{Logger, Result, SluiceError};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::ImageFormat;
use std::path::Path;

/// Kind of image, by extension
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "svg" => Some(ImageKind::Svg),
            _ => None,
        }
    }
}

/// Lossless PNG recompression; other formats pass through untouched
pub struct PngRecompressor {
    options: ImageOptions,
}

impl PngRecompressor {
    pub fn new(options: ImageOptions) -> Self {
        Self { options }
    }

    fn recompress_png(content: &[u8], path: &Path) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory_with_format(content, ImageFormat::Png)
            .map_err(|e| SluiceError::image(format!("{}: {}", path.display(), e)))?;

        let mut encoded = Vec::with_capacity(content.len());
        let encoder =
            PngEncoder::new_with_quality(&mut encoded, CompressionType::Best, FilterType::Adaptive);
        decoded
            .write_with_encoder(encoder)
            .map_err(|e| SluiceError::image(format!("{}: {}", path.display(), e)))?;

        Ok(encoded)
    }
}

impl ImageOptimizer for PngRecompressor {
    fn optimize(&self, content: &[u8], path: &Path) -> Result<Vec<u8>> {
        if !self.options.optimize || ImageKind::from_path(path) != Some(ImageKind::Png) {
            return Ok(content.to_vec());
        }

        let recompressed = Self::recompress_png(content, path)?;
        if recompressed.len() < content.len() {
            Logger::debug(&format!(
                "🖼️  {}: {} → {} bytes",
                path.display(),
                content.len(),
                recompressed.len()
            ));
            Ok(recompressed)
        } else {
            Ok(content.to_vec())
        }
    }
}
