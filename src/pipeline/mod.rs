pub mod codec;
pub mod job_runner;
pub mod orchestrator;

use image::{DynamicImage, ImageFormat};

pub use codec::{Decoded, LoadOptions, decode, encode};

use crate::config::save::ResolvedSave;
use crate::error::Result;
use crate::log::Logger;
use crate::ops::{self, Operation};
use crate::stream::Handle;
use crate::stream::host::{HostSource, HostTarget, SeekSource, VecTarget};
use crate::stream::lifecycle::{StreamGuard, with_source, with_target};

/// Decode one image from a host source through a fresh source adapter.
pub fn load(
    source: impl HostSource + 'static,
    options: &LoadOptions,
    logger: &Logger,
) -> Result<Decoded> {
    let decoded = with_source(source, logger, |native| decode(native, options))?;
    logger.info(&format!(
        "decoded {:?} image {}x{}",
        decoded.format,
        decoded.image.width(),
        decoded.image.height()
    ));
    Ok(decoded)
}

/// Decode an in-memory buffer through the same adapter path as [`load`].
pub fn load_buffer(bytes: &[u8], options: &LoadOptions, logger: &Logger) -> Result<Decoded> {
    load(SeekSource::from_bytes(bytes.to_vec()), options, logger)
}

/// Encode `image` into a host target through a fresh target adapter.
pub fn save(
    image: &DynamicImage,
    target: impl HostTarget + 'static,
    params: &ResolvedSave,
    logger: &Logger,
) -> Result<u64> {
    let written = with_target(target, logger, |native| encode(image, native, params))?;
    logger.info(&format!("encoded {:?}: {written} bytes", params.format()));
    Ok(written)
}

/// Encode `image` into a new buffer.
pub fn save_buffer(image: &DynamicImage, params: &ResolvedSave, logger: &Logger) -> Result<Vec<u8>> {
    let sink = VecTarget::new();
    save(image, sink.clone(), params, logger)?;
    Ok(sink.take_bytes())
}

/// Outcome of a load, transform, save round.
#[derive(Debug, Clone)]
pub struct TranscodeReport {
    pub input_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes_written: u64,
}

/// Decode from `source`, apply `operations`, encode into `target`.
///
/// The source adapter is released before the target adapter is created.
pub fn transcode(
    source: impl HostSource + 'static,
    target: impl HostTarget + 'static,
    operations: &[Operation],
    options: &LoadOptions,
    params: &ResolvedSave,
    logger: &Logger,
) -> Result<TranscodeReport> {
    let decoded = load(source, options, logger)?;
    let image = ops::apply_all(decoded.image, operations)?;
    let bytes_written = save(&image, target, params, logger)?;
    Ok(TranscodeReport {
        input_format: decoded.format,
        width: image.width(),
        height: image.height(),
        bytes_written,
    })
}

/// Like [`transcode`], for handles registered by a host beforehand.
///
/// Both handles are owned by this call and released on every exit path,
/// including when the source fails before the target is ever touched.
pub fn transcode_handles(
    source: Handle,
    target: Handle,
    operations: &[Operation],
    options: &LoadOptions,
    params: &ResolvedSave,
    logger: &Logger,
) -> Result<TranscodeReport> {
    let mut source_guard = StreamGuard::adopt(source);
    let mut target_guard = StreamGuard::adopt(target);

    let decoded = decode(&mut source_guard.native_source(), options);
    source_guard.release();
    let decoded = decoded?;

    let image = ops::apply_all(decoded.image, operations)?;
    let bytes_written = encode(&image, &mut target_guard.native_target(), params)?;
    target_guard.release();

    logger.info(&format!(
        "transcoded {source} -> {target}: {:?} to {:?}, {bytes_written} bytes",
        decoded.format,
        params.format()
    ));
    Ok(TranscodeReport {
        input_format: decoded.format,
        width: image.width(),
        height: image.height(),
        bytes_written,
    })
}
