//! Per-format save parameters.
//!
//! Callers fill in only what they care about; every `None` falls back to the
//! [`Settings`] default when the parameters are resolved.

use std::path::Path;

use serde::Deserialize;

use super::settings::Settings;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Bmp,
}

impl OutputFormat {
    /// Guess the output format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "jpe" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "gif" => Some(OutputFormat::Gif),
            "bmp" => Some(OutputFormat::Bmp),
            _ => None,
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Webp => image::ImageFormat::WebP,
            OutputFormat::Tiff => image::ImageFormat::Tiff,
            OutputFormat::Gif => image::ImageFormat::Gif,
            OutputFormat::Bmp => image::ImageFormat::Bmp,
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            image::ImageFormat::Png => Some(OutputFormat::Png),
            image::ImageFormat::WebP => Some(OutputFormat::Webp),
            image::ImageFormat::Tiff => Some(OutputFormat::Tiff),
            image::ImageFormat::Gif => Some(OutputFormat::Gif),
            image::ImageFormat::Bmp => Some(OutputFormat::Bmp),
            _ => None,
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngFilter {
    None,
    Sub,
    Up,
    Avg,
    Paeth,
    #[default]
    Adaptive,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JpegSaveParams {
    /// 1..=100
    pub quality: Option<u8>,
    pub background: Option<[u8; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PngSaveParams {
    /// 0 (fastest) ..= 9 (smallest)
    pub compression: Option<u8>,
    pub filter: Option<PngFilter>,
}

/// Save parameters, one variant per output format.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveParams {
    Jpeg(JpegSaveParams),
    Png(PngSaveParams),
    /// Lossless only.
    Webp,
    Tiff,
    Gif,
    Bmp,
}

impl SaveParams {
    /// All-default parameters for `format`.
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Jpeg => SaveParams::Jpeg(JpegSaveParams::default()),
            OutputFormat::Png => SaveParams::Png(PngSaveParams::default()),
            OutputFormat::Webp => SaveParams::Webp,
            OutputFormat::Tiff => SaveParams::Tiff,
            OutputFormat::Gif => SaveParams::Gif,
            OutputFormat::Bmp => SaveParams::Bmp,
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            SaveParams::Jpeg(_) => OutputFormat::Jpeg,
            SaveParams::Png(_) => OutputFormat::Png,
            SaveParams::Webp => OutputFormat::Webp,
            SaveParams::Tiff => OutputFormat::Tiff,
            SaveParams::Gif => OutputFormat::Gif,
            SaveParams::Bmp => OutputFormat::Bmp,
        }
    }

    /// Fill unset fields from `settings` and validate ranges.
    pub fn resolve(&self, settings: &Settings) -> Result<ResolvedSave> {
        match self {
            SaveParams::Jpeg(p) => {
                let quality = p.quality.unwrap_or(settings.jpeg_quality);
                if !(1..=100).contains(&quality) {
                    return Err(BridgeError::config(format!(
                        "JPEG quality must be within 1..=100, got {quality}"
                    )));
                }
                Ok(ResolvedSave::Jpeg {
                    quality,
                    background: p.background.unwrap_or(settings.background),
                })
            }
            SaveParams::Png(p) => {
                let compression = p.compression.unwrap_or(settings.png_compression);
                if compression > 9 {
                    return Err(BridgeError::config(format!(
                        "PNG compression must be within 0..=9, got {compression}"
                    )));
                }
                Ok(ResolvedSave::Png {
                    compression,
                    filter: p.filter.unwrap_or(settings.png_filter),
                })
            }
            SaveParams::Webp => Ok(ResolvedSave::Webp),
            SaveParams::Tiff => Ok(ResolvedSave::Tiff),
            SaveParams::Gif => Ok(ResolvedSave::Gif),
            SaveParams::Bmp => Ok(ResolvedSave::Bmp),
        }
    }
}

/// Save parameters with every default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSave {
    Jpeg { quality: u8, background: [u8; 3] },
    Png { compression: u8, filter: PngFilter },
    Webp,
    Tiff,
    Gif,
    Bmp,
}

impl ResolvedSave {
    pub fn format(&self) -> OutputFormat {
        match self {
            ResolvedSave::Jpeg { .. } => OutputFormat::Jpeg,
            ResolvedSave::Png { .. } => OutputFormat::Png,
            ResolvedSave::Webp => OutputFormat::Webp,
            ResolvedSave::Tiff => OutputFormat::Tiff,
            ResolvedSave::Gif => OutputFormat::Gif,
            ResolvedSave::Bmp => OutputFormat::Bmp,
        }
    }

    /// Defaults from [`Settings::default`] for `format`.
    pub fn default_for(format: OutputFormat) -> Self {
        let settings = Settings::default();
        match format {
            OutputFormat::Jpeg => ResolvedSave::Jpeg {
                quality: settings.jpeg_quality,
                background: settings.background,
            },
            OutputFormat::Png => ResolvedSave::Png {
                compression: settings.png_compression,
                filter: settings.png_filter,
            },
            OutputFormat::Webp => ResolvedSave::Webp,
            OutputFormat::Tiff => ResolvedSave::Tiff,
            OutputFormat::Gif => ResolvedSave::Gif,
            OutputFormat::Bmp => ResolvedSave::Bmp,
        }
    }
}
