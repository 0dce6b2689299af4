use std::path::Path;

use serde::Deserialize;

use super::save::PngFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub jpeg_quality: u8,
    pub png_compression: u8,
    pub png_filter: PngFilter,
    /// RGB used to flatten alpha when the output format has none.
    pub background: [u8; 3],
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_alloc: Option<u64>,
    /// Apply metadata orientation when decoding.
    pub autorotate: bool,
    pub parallel_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            jpeg_quality: 90,
            png_compression: 6,
            png_filter: PngFilter::Adaptive,
            background: [0, 0, 0],
            max_width: None,
            max_height: None,
            max_alloc: Some(512 * 1024 * 1024),
            autorotate: false,
            parallel_workers: 0,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::BridgeError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Decoder limits derived from these settings.
    pub fn limits(&self) -> image::Limits {
        let mut limits = image::Limits::no_limits();
        limits.max_image_width = self.max_width;
        limits.max_image_height = self.max_height;
        limits.max_alloc = self.max_alloc;
        limits
    }
}
