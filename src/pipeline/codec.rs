// Decode from a pull stream / encode into a push stream.

use std::borrow::Cow;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::error::{LimitError, LimitErrorKind};
use image::{ColorType, DynamicImage, ImageDecoder, ImageError, ImageFormat, ImageReader, Limits};

use crate::config::save::{PngFilter, ResolvedSave};
use crate::config::settings::Settings;
use crate::error::{BridgeError, Result};
use crate::ops;
use crate::stream::CallbackCode;
use crate::stream::source::NativeSource;
use crate::stream::target::NativeTarget;

/// Encoder-side write batching. Chunks at least this large go straight
/// through to the target.
const WRITE_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Skip header sniffing and decode as this format.
    pub format: Option<ImageFormat>,
    pub limits: Limits,
    /// Apply the orientation recorded in the file's metadata after decoding.
    pub autorotate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl LoadOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        LoadOptions {
            format: None,
            limits: settings.limits(),
            autorotate: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Decode one image from `source`.
///
/// Seekability is probed first. A source that answers the probe with
/// [`CallbackCode::Unsupported`] is drained into memory and decoded from
/// there, up to `limits.max_alloc` bytes; any other probe failure aborts.
/// When a callback fails during decoding, the callback's error is reported
/// rather than the decoder's.
pub fn decode(source: &mut NativeSource, options: &LoadOptions) -> Result<Decoded> {
    let seekable = match source.seek(SeekFrom::Current(0)) {
        Ok(_) => true,
        Err(_) if source.failure() == Some(CallbackCode::Unsupported) => {
            source.take_failure();
            false
        }
        Err(e) => return Err(source.take_error().unwrap_or(BridgeError::IoError(e))),
    };

    let outcome = if seekable {
        decode_reader(ImageReader::new(BufReader::new(&mut *source)), options)
    } else {
        match drain(source, options.limits.max_alloc) {
            Ok(bytes) => decode_reader(ImageReader::new(Cursor::new(bytes)), options),
            Err(e) => Err(e),
        }
    };

    outcome.map_err(|e| source.take_error().unwrap_or(e))
}

/// Read a non-seekable source to its end, failing once more than `cap`
/// bytes have arrived.
fn drain(source: &mut NativeSource, cap: Option<u64>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match cap {
        Some(cap) => {
            Read::take(&mut *source, cap.saturating_add(1)).read_to_end(&mut bytes)?;
            if bytes.len() as u64 > cap {
                return Err(ImageError::Limits(LimitError::from_kind(
                    LimitErrorKind::InsufficientMemory,
                ))
                .into());
            }
        }
        None => {
            source.read_to_end(&mut bytes)?;
        }
    }
    Ok(bytes)
}

fn decode_reader<R: BufRead + Seek>(reader: ImageReader<R>, options: &LoadOptions) -> Result<Decoded> {
    let mut reader = match options.format {
        Some(format) => {
            let mut reader = reader;
            reader.set_format(format);
            reader
        }
        None => reader.with_guessed_format()?,
    };
    let format = reader.format().ok_or_else(|| {
        BridgeError::unsupported_format("could not determine image format from header")
    })?;
    reader.limits(options.limits.clone());
    let image = if options.autorotate {
        let mut decoder = reader.into_decoder()?;
        let orientation = decoder.orientation()?;
        let mut image = DynamicImage::from_decoder(decoder)?;
        image.apply_orientation(orientation);
        image
    } else {
        reader.decode()?
    };
    Ok(Decoded { image, format })
}

/// Encode `image` into `target` and signal end of stream.
///
/// Returns the number of bytes the host accepted.
pub fn encode(image: &DynamicImage, target: &mut NativeTarget, save: &ResolvedSave) -> Result<u64> {
    write_encoded(image, target, save)
        .and_then(|()| target.finish())
        .map_err(|e| target.take_error().unwrap_or(e))?;
    Ok(target.bytes_written())
}

fn write_encoded(image: &DynamicImage, target: &mut NativeTarget, save: &ResolvedSave) -> Result<()> {
    match *save {
        ResolvedSave::Jpeg {
            quality,
            background,
        } => {
            let prepared = jpeg_compatible(image, background);
            let mut out = BufWriter::with_capacity(WRITE_CHUNK, &mut *target);
            prepared.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
            out.flush()?;
        }
        ResolvedSave::Png {
            compression,
            filter,
        } => {
            let prepared = png_compatible(image);
            let mut out = BufWriter::with_capacity(WRITE_CHUNK, &mut *target);
            let encoder = PngEncoder::new_with_quality(
                &mut out,
                png_compression(compression),
                png_filter(filter),
            );
            prepared.write_with_encoder(encoder)?;
            out.flush()?;
        }
        ResolvedSave::Webp => {
            let prepared = rgb_or_rgba(image);
            let mut out = BufWriter::with_capacity(WRITE_CHUNK, &mut *target);
            prepared.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
            out.flush()?;
        }
        ResolvedSave::Tiff | ResolvedSave::Gif | ResolvedSave::Bmp => {
            // These encoders seek backwards, which a push stream cannot do.
            let prepared = match save {
                ResolvedSave::Gif => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
                _ => rgb_or_rgba(image),
            };
            let mut buf = Cursor::new(Vec::new());
            prepared.write_to(&mut buf, save.format().image_format())?;
            target.write_all(buf.get_ref())?;
        }
    }
    Ok(())
}

fn jpeg_compatible(image: &DynamicImage, background: [u8; 3]) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
        ColorType::L16 => Cow::Owned(DynamicImage::ImageLuma8(image.to_luma8())),
        c if c.has_alpha() => Cow::Owned(ops::flatten(image, background)),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

/// PNG stores 8 and 16 bit integer samples only; float images keep their
/// precision as 16 bit.
fn png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => Cow::Borrowed(image),
        ColorType::Rgb32F => Cow::Owned(DynamicImage::ImageRgb16(image.to_rgb16())),
        ColorType::Rgba32F => Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16())),
        c if c.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

fn rgb_or_rgba(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(image),
        c if c.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn png_filter(filter: PngFilter) -> PngFilterType {
    match filter {
        PngFilter::None => PngFilterType::NoFilter,
        PngFilter::Sub => PngFilterType::Sub,
        PngFilter::Up => PngFilterType::Up,
        PngFilter::Avg => PngFilterType::Avg,
        PngFilter::Paeth => PngFilterType::Paeth,
        PngFilter::Adaptive => PngFilterType::Adaptive,
    }
}
