//! Typed image transforms.
//!
//! Each operation is a plain configuration value forwarded to the image
//! engine; the resampling and pixel work happens in `image::imageops`.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage, Rgba, RgbaImage};
use serde::Deserialize;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Nearest,
    Linear,
    Cubic,
    Gaussian,
    #[default]
    Lanczos3,
}

impl Kernel {
    fn filter(self) -> FilterType {
        match self {
            Kernel::Nearest => FilterType::Nearest,
            Kernel::Linear => FilterType::Triangle,
            Kernel::Cubic => FilterType::CatmullRom,
            Kernel::Gaussian => FilterType::Gaussian,
            Kernel::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Resize to a bounding box. A missing side is derived from the aspect
/// ratio; with `exact` both sides are used as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resize {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub kernel: Kernel,
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Angle {
    D90,
    D180,
    D270,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Both,
}

/// Composite the image over a solid background, dropping alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flatten {
    pub background: [u8; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Srgb,
    Grayscale,
}

/// Rectangle cut out of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExtractArea {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// How [`Embed`] fills the canvas outside the placed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extend {
    /// Black, or transparent for images with alpha.
    #[default]
    Black,
    White,
    /// Repeat the nearest edge pixel.
    Copy,
    Repeat,
    Mirror,
    /// The `background` color of the [`Embed`].
    Background,
}

/// Place the image at (`x`, `y`) on a `width` x `height` canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embed {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub extend: Extend,
    pub background: [u8; 4],
}

/// Gaussian blur with standard deviation `sigma`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussblur {
    pub sigma: f32,
}

/// Unsharp mask. Differences below `threshold` are left alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpen {
    pub sigma: f32,
    pub threshold: i32,
}

/// Shrink or enlarge to `width`. With a `height` the image fits inside the
/// box, or fills it exactly and is center-cropped when `crop` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: Option<u32>,
    pub crop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Resize(Resize),
    Thumbnail(Thumbnail),
    ExtractArea(ExtractArea),
    Embed(Embed),
    Rotate(Angle),
    Flip(FlipDirection),
    Gaussblur(Gaussblur),
    Sharpen(Sharpen),
    Invert,
    Flatten(Flatten),
    Colorspace(Colorspace),
}

impl Operation {
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        match *self {
            Operation::Resize(r) => resize(image, r),
            Operation::Thumbnail(t) => thumbnail(image, t),
            Operation::ExtractArea(a) => extract_area(image, a),
            Operation::Embed(e) => embed(image, e),
            Operation::Rotate(angle) => Ok(match angle {
                Angle::D90 => image.rotate90(),
                Angle::D180 => image.rotate180(),
                Angle::D270 => image.rotate270(),
            }),
            Operation::Flip(dir) => Ok(match dir {
                FlipDirection::Horizontal => image.fliph(),
                FlipDirection::Vertical => image.flipv(),
                FlipDirection::Both => image.rotate180(),
            }),
            Operation::Gaussblur(g) => {
                check_sigma("gaussblur", g.sigma)?;
                Ok(image.blur(g.sigma))
            }
            Operation::Sharpen(sh) => {
                check_sigma("sharpen", sh.sigma)?;
                Ok(image.unsharpen(sh.sigma, sh.threshold))
            }
            Operation::Invert => {
                let mut out = image.clone();
                out.invert();
                Ok(out)
            }
            Operation::Flatten(f) => Ok(flatten(image, f.background)),
            Operation::Colorspace(c) => Ok(to_colorspace(image, c)),
        }
    }
}

/// Apply `ops` left to right.
pub fn apply_all(image: DynamicImage, ops: &[Operation]) -> Result<DynamicImage> {
    ops.iter().try_fold(image, |img, op| op.apply(&img))
}

fn resize(image: &DynamicImage, r: Resize) -> Result<DynamicImage> {
    let (w, h) = image.dimensions();
    let (tw, th) = match (r.width, r.height) {
        (Some(tw), Some(th)) => (tw, th),
        (Some(tw), None) => (tw, scale_side(h, tw, w)),
        (None, Some(th)) => (scale_side(w, th, h), th),
        (None, None) => {
            return Err(BridgeError::operation("resize needs a width or a height"));
        }
    };
    if tw == 0 || th == 0 {
        return Err(BridgeError::operation(format!(
            "resize target {tw}x{th} has a zero side"
        )));
    }
    let filter = r.kernel.filter();
    Ok(if r.exact || r.width.is_none() || r.height.is_none() {
        image.resize_exact(tw, th, filter)
    } else {
        image.resize(tw, th, filter)
    })
}

fn thumbnail(image: &DynamicImage, t: Thumbnail) -> Result<DynamicImage> {
    let (w, h) = image.dimensions();
    if t.width == 0 || t.height == Some(0) {
        return Err(BridgeError::operation("thumbnail size has a zero side"));
    }
    Ok(match t.height {
        None => image.resize_exact(t.width, scale_side(h, t.width, w), FilterType::Lanczos3),
        Some(th) if t.crop => image.resize_to_fill(t.width, th, FilterType::Lanczos3),
        Some(th) => image.resize(t.width, th, FilterType::Lanczos3),
    })
}

fn extract_area(image: &DynamicImage, a: ExtractArea) -> Result<DynamicImage> {
    let (w, h) = image.dimensions();
    let fits = u64::from(a.left) + u64::from(a.width) <= u64::from(w)
        && u64::from(a.top) + u64::from(a.height) <= u64::from(h);
    if a.width == 0 || a.height == 0 || !fits {
        return Err(BridgeError::operation(format!(
            "extract area {}x{}+{}+{} is outside the {w}x{h} image",
            a.width, a.height, a.left, a.top
        )));
    }
    Ok(image.crop_imm(a.left, a.top, a.width, a.height))
}

fn embed(image: &DynamicImage, e: Embed) -> Result<DynamicImage> {
    if e.width == 0 || e.height == 0 {
        return Err(BridgeError::operation("embed canvas has a zero side"));
    }
    let alpha = image.color().has_alpha();
    let src = image.to_rgba8();
    let (w, h) = (i64::from(src.width()), i64::from(src.height()));
    let fill = match e.extend {
        Extend::Black if alpha => Rgba([0, 0, 0, 0]),
        Extend::Black => Rgba([0, 0, 0, 255]),
        Extend::White => Rgba([255, 255, 255, 255]),
        Extend::Background => Rgba(e.background),
        Extend::Copy | Extend::Repeat | Extend::Mirror => Rgba([0, 0, 0, 0]),
    };
    let canvas = RgbaImage::from_fn(e.width, e.height, |ox, oy| {
        let sx = i64::from(ox) - e.x;
        let sy = i64::from(oy) - e.y;
        if (0..w).contains(&sx) && (0..h).contains(&sy) {
            return *src.get_pixel(sx as u32, sy as u32);
        }
        if w == 0 || h == 0 {
            return fill;
        }
        let (x, y) = match e.extend {
            Extend::Copy => (sx.clamp(0, w - 1), sy.clamp(0, h - 1)),
            Extend::Repeat => (sx.rem_euclid(w), sy.rem_euclid(h)),
            Extend::Mirror => (mirror(sx, w), mirror(sy, h)),
            Extend::Black | Extend::White | Extend::Background => return fill,
        };
        *src.get_pixel(x as u32, y as u32)
    });

    let opaque_fill = !matches!(e.extend, Extend::Black | Extend::Background) || fill.0[3] == 255;
    Ok(if !alpha && opaque_fill {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    } else {
        DynamicImage::ImageRgba8(canvas)
    })
}

/// Reflect `v` into `0..len`, repeating the edge pixel at each turn.
fn mirror(v: i64, len: i64) -> i64 {
    let m = v.rem_euclid(2 * len);
    if m < len { m } else { 2 * len - 1 - m }
}

fn check_sigma(op: &str, sigma: f32) -> Result<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(BridgeError::operation(format!("{op} sigma must be positive, got {sigma}")))
    }
}

/// `other * target / reference`, rounded, at least 1.
fn scale_side(other: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 0;
    }
    let scaled = (u64::from(other) * u64::from(target) + u64::from(reference) / 2)
        / u64::from(reference);
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// Alpha-composite over `background`. Images without alpha are converted
/// to RGB unchanged.
pub fn flatten(image: &DynamicImage, background: [u8; 3]) -> DynamicImage {
    if !image.color().has_alpha() {
        return DynamicImage::ImageRgb8(image.to_rgb8());
    }
    let rgba = image.to_rgba8();
    let out = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        image::Rgb([
            blend(r, background[0], a),
            blend(g, background[1], a),
            blend(b, background[2], a),
        ])
    });
    DynamicImage::ImageRgb8(out)
}

fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    ((u32::from(fg) * a + u32::from(bg) * (255 - a) + 127) / 255) as u8
}

fn to_colorspace(image: &DynamicImage, c: Colorspace) -> DynamicImage {
    let alpha = image.color().has_alpha();
    match (c, alpha) {
        (Colorspace::Grayscale, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (Colorspace::Grayscale, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (Colorspace::Srgb, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (Colorspace::Srgb, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}
