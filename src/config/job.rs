use serde::Deserialize;

use super::save::OutputFormat;
use crate::ops::{
    Angle, Colorspace, Embed, Extend, ExtractArea, FlipDirection, Gaussblur, Kernel, Operation,
    Resize, Sharpen, Thumbnail,
};

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    pub output: String,
    pub format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub compression: Option<u8>,
    pub background: Option<[u8; 3]>,
    pub resize: Option<ResizeSpec>,
    #[serde(default, deserialize_with = "deserialize_rotation")]
    pub rotate: Option<Angle>,
    pub flip: Option<FlipDirection>,
    pub grayscale: Option<bool>,
    pub crop: Option<ExtractArea>,
    pub thumbnail: Option<ThumbnailSpec>,
    pub embed: Option<EmbedSpec>,
    /// ガウスぼかしのシグマ
    pub blur: Option<f32>,
    pub sharpen: Option<SharpenSpec>,
    pub invert: Option<bool>,
    /// 未指定ならsettingsの値を使用する
    pub autorotate: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub kernel: Option<Kernel>,
    #[serde(default)]
    pub exact: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: Option<u32>,
    #[serde(default)]
    pub crop: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedSpec {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub extend: Extend,
    /// RGBA。`extend: background` のときに使用する
    #[serde(default = "default_embed_background")]
    pub background: [u8; 4],
}

fn default_embed_background() -> [u8; 4] {
    [0, 0, 0, 255]
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharpenSpec {
    pub sigma: f32,
    #[serde(default)]
    pub threshold: i32,
}

impl Job {
    /// Transform chain in application order: crop, resize, thumbnail,
    /// rotate, flip, embed, blur, sharpen, invert, colorspace.
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        if let Some(area) = self.crop {
            ops.push(Operation::ExtractArea(area));
        }
        if let Some(r) = &self.resize {
            ops.push(Operation::Resize(Resize {
                width: r.width,
                height: r.height,
                kernel: r.kernel.unwrap_or_default(),
                exact: r.exact,
            }));
        }
        if let Some(t) = &self.thumbnail {
            ops.push(Operation::Thumbnail(Thumbnail {
                width: t.width,
                height: t.height,
                crop: t.crop,
            }));
        }
        if let Some(angle) = self.rotate {
            ops.push(Operation::Rotate(angle));
        }
        if let Some(dir) = self.flip {
            ops.push(Operation::Flip(dir));
        }
        if let Some(e) = &self.embed {
            ops.push(Operation::Embed(Embed {
                x: e.x,
                y: e.y,
                width: e.width,
                height: e.height,
                extend: e.extend,
                background: e.background,
            }));
        }
        if let Some(sigma) = self.blur {
            ops.push(Operation::Gaussblur(Gaussblur { sigma }));
        }
        if let Some(s) = &self.sharpen {
            ops.push(Operation::Sharpen(Sharpen {
                sigma: s.sigma,
                threshold: s.threshold,
            }));
        }
        if self.invert == Some(true) {
            ops.push(Operation::Invert);
        }
        if self.grayscale == Some(true) {
            ops.push(Operation::Colorspace(Colorspace::Grayscale));
        }
        ops
    }
}

/// 回転角（度）を [`Angle`] に変換する。
///
/// 0 は回転なし（`None`）。負の角度や 360 以上は正規化する。
/// 90 の倍数以外はエラー。
pub fn parse_rotation(degrees: i32) -> crate::error::Result<Option<Angle>> {
    match degrees.rem_euclid(360) {
        0 => Ok(None),
        90 => Ok(Some(Angle::D90)),
        180 => Ok(Some(Angle::D180)),
        270 => Ok(Some(Angle::D270)),
        _ => Err(crate::error::BridgeError::config(format!(
            "Rotation must be a multiple of 90 degrees, got {degrees}"
        ))),
    }
}

/// serdeのdeserialize_withで使用する回転角デシリアライザ
fn deserialize_rotation<'de, D>(deserializer: D) -> Result<Option<Angle>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<i32>::deserialize(deserializer)? {
        Some(deg) => parse_rotation(deg).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
