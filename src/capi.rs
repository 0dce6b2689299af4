//! Flat C function surface.
//!
//! A host language registers its own I/O objects as callback sets, gets a
//! handle back for each, and passes the handles to an operation. All
//! entry points are panic-free at the boundary and report failure through
//! return codes plus [`ib_last_error`].
#![allow(clippy::missing_safety_doc)]

use std::cell::RefCell;
use std::ffi::CString;
use std::io::{self, SeekFrom};
use std::panic::{self, AssertUnwindSafe};

use libc::{c_char, c_int, c_void};

use crate::config::save::{JpegSaveParams, OutputFormat, PngSaveParams, SaveParams};
use crate::config::settings::Settings;
use crate::error::{BridgeError, Result};
use crate::log::{LogHandler, LogLevel, Logger};
use crate::pipeline::{self, LoadOptions};
use crate::stream::host::{HostSource, HostTarget};
use crate::stream::{CallbackCode, Handle, Whence, registry};

/// Host read: `(host, buffer, max_len) -> bytes read, 0 at EOF, <0 on error`.
pub type IbReadFn = unsafe extern "C" fn(host: *mut c_void, buffer: *mut u8, length: i64) -> i64;
/// Host seek: `(host, offset, whence) -> new position, <0 on error`.
pub type IbSeekFn = unsafe extern "C" fn(host: *mut c_void, offset: i64, whence: c_int) -> i64;
/// Host write: `(host, buffer, len) -> bytes written, <0 on error`.
pub type IbWriteFn =
    unsafe extern "C" fn(host: *mut c_void, buffer: *const u8, length: i64) -> i64;
/// Host release notification, called once when the handle is released.
pub type IbCloseFn = unsafe extern "C" fn(host: *mut c_void);
/// Host log sink: `(user, domain, level, message)`. Strings are NUL
/// terminated and only valid for the duration of the call.
pub type IbLogFn = unsafe extern "C" fn(
    user: *mut c_void,
    domain: *const c_char,
    level: c_int,
    message: *const c_char,
);

pub const IB_LOG_ERROR: c_int = 0;
pub const IB_LOG_CRITICAL: c_int = 1;
pub const IB_LOG_WARNING: c_int = 2;
pub const IB_LOG_MESSAGE: c_int = 3;
pub const IB_LOG_INFO: c_int = 4;
pub const IB_LOG_DEBUG: c_int = 5;

pub const IB_FORMAT_JPEG: c_int = 0;
pub const IB_FORMAT_PNG: c_int = 1;
pub const IB_FORMAT_WEBP: c_int = 2;
pub const IB_FORMAT_TIFF: c_int = 3;
pub const IB_FORMAT_GIF: c_int = 4;
pub const IB_FORMAT_BMP: c_int = 5;

/// Save options. Integer fields use `-1` for "not set".
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IbSaveOptions {
    pub format: c_int,
    pub quality: c_int,
    pub compression: c_int,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(err: &BridgeError) {
    let msg = CString::new(err.to_string().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn host_result(rc: i64, what: &str) -> io::Result<u64> {
    u64::try_from(rc).map_err(|_| {
        let kind = match CallbackCode::from_raw(rc) {
            Some(CallbackCode::Unsupported) => io::ErrorKind::Unsupported,
            Some(CallbackCode::InvalidArgument) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, format!("host {what} callback returned {rc}"))
    })
}

/// Log handler that forwards records to a host callback.
struct ForeignLog {
    log: IbLogFn,
    user: *mut c_void,
}

// SAFETY: the host registers a sink that accepts calls from any thread
// running an operation.
unsafe impl Send for ForeignLog {}
unsafe impl Sync for ForeignLog {}

impl LogHandler for ForeignLog {
    fn log(&self, domain: &str, level: LogLevel, message: &str) {
        let level = match level {
            LogLevel::Error => IB_LOG_ERROR,
            LogLevel::Critical => IB_LOG_CRITICAL,
            LogLevel::Warning => IB_LOG_WARNING,
            LogLevel::Message => IB_LOG_MESSAGE,
            LogLevel::Info => IB_LOG_INFO,
            LogLevel::Debug => IB_LOG_DEBUG,
        };
        let (Ok(domain), Ok(message)) = (
            CString::new(domain),
            CString::new(message.replace('\0', " ")),
        ) else {
            return;
        };
        // SAFETY: both strings outlive the call.
        unsafe { (self.log)(self.user, domain.as_ptr(), level, message.as_ptr()) };
    }
}

/// Logger for a C caller: its callback if given, `tracing` otherwise.
fn host_logger(log: Option<IbLogFn>, user: *mut c_void) -> Logger {
    match log {
        Some(log) => Logger::new(ForeignLog { log, user }),
        None => Logger::default(),
    }
}

/// Source backed by host callbacks.
struct ForeignSource {
    host: *mut c_void,
    read: IbReadFn,
    seek: Option<IbSeekFn>,
    close: Option<IbCloseFn>,
}

// SAFETY: the host promises its object may be used from the thread that
// runs the operation; the registry serialises all calls on one handle.
unsafe impl Send for ForeignSource {}

impl HostSource for ForeignSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(i64::MAX as usize) as i64;
        // SAFETY: `buf` is valid for `len` writes; `host` is the host's own token.
        let rc = unsafe { (self.read)(self.host, buf.as_mut_ptr(), len) };
        host_result(rc, "read").map(|n| n as usize)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let Some(seek) = self.seek else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "host source has no seek callback",
            ));
        };
        let (offset, whence) = Whence::split(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek offset too large"))?;
        // SAFETY: no pointers besides the host's own token.
        let rc = unsafe { seek(self.host, offset, whence as c_int) };
        host_result(rc, "seek")
    }

    fn close(&mut self) {
        if let Some(close) = self.close.take() {
            // SAFETY: called exactly once, at release.
            unsafe { close(self.host) };
        }
    }
}

/// Target backed by host callbacks.
struct ForeignTarget {
    host: *mut c_void,
    write: IbWriteFn,
    close: Option<IbCloseFn>,
}

// SAFETY: see `ForeignSource`.
unsafe impl Send for ForeignTarget {}

impl HostTarget for ForeignTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(i64::MAX as usize) as i64;
        // SAFETY: `buf` is valid for `len` reads.
        let rc = unsafe { (self.write)(self.host, buf.as_ptr(), len) };
        host_result(rc, "write").map(|n| n as usize)
    }

    fn close(&mut self) {
        if let Some(close) = self.close.take() {
            // SAFETY: called exactly once, at release.
            unsafe { close(self.host) };
        }
    }
}

/// Register a host source. Returns `0` if `read` is null.
#[unsafe(no_mangle)]
pub extern "C" fn ib_source_new(
    host: *mut c_void,
    read: Option<IbReadFn>,
    seek: Option<IbSeekFn>,
    close: Option<IbCloseFn>,
) -> u64 {
    ib_source_new_with_log(host, read, seek, close, None, std::ptr::null_mut())
}

/// [`ib_source_new`] with a log sink for every request on this handle.
#[unsafe(no_mangle)]
pub extern "C" fn ib_source_new_with_log(
    host: *mut c_void,
    read: Option<IbReadFn>,
    seek: Option<IbSeekFn>,
    close: Option<IbCloseFn>,
    log: Option<IbLogFn>,
    log_user: *mut c_void,
) -> u64 {
    let Some(read) = read else {
        set_last_error(&BridgeError::protocol("ib_source_new: read callback is null"));
        return 0;
    };
    let source = ForeignSource {
        host,
        read,
        seek,
        close,
    };
    registry::register_source(Box::new(source), &host_logger(log, log_user)).raw()
}

/// Register a host target. Returns `0` if `write` is null.
#[unsafe(no_mangle)]
pub extern "C" fn ib_target_new(
    host: *mut c_void,
    write: Option<IbWriteFn>,
    close: Option<IbCloseFn>,
) -> u64 {
    ib_target_new_with_log(host, write, close, None, std::ptr::null_mut())
}

/// [`ib_target_new`] with a log sink for every request on this handle.
#[unsafe(no_mangle)]
pub extern "C" fn ib_target_new_with_log(
    host: *mut c_void,
    write: Option<IbWriteFn>,
    close: Option<IbCloseFn>,
    log: Option<IbLogFn>,
    log_user: *mut c_void,
) -> u64 {
    let Some(write) = write else {
        set_last_error(&BridgeError::protocol("ib_target_new: write callback is null"));
        return 0;
    };
    let target = ForeignTarget { host, write, close };
    registry::register_target(Box::new(target), &host_logger(log, log_user)).raw()
}

/// Release a handle. Releasing an unknown or already released handle is a
/// no-op.
#[unsafe(no_mangle)]
pub extern "C" fn ib_release(handle: u64) {
    let _ = panic::catch_unwind(|| registry::release(Handle::from_raw(handle)));
}

fn save_params(options: &IbSaveOptions) -> Result<SaveParams> {
    let optional_u8 = |v: c_int, what: &str| -> Result<Option<u8>> {
        match v {
            -1 => Ok(None),
            v => u8::try_from(v)
                .map(Some)
                .map_err(|_| BridgeError::config(format!("{what} out of range: {v}"))),
        }
    };
    let format = match options.format {
        IB_FORMAT_JPEG => OutputFormat::Jpeg,
        IB_FORMAT_PNG => OutputFormat::Png,
        IB_FORMAT_WEBP => OutputFormat::Webp,
        IB_FORMAT_TIFF => OutputFormat::Tiff,
        IB_FORMAT_GIF => OutputFormat::Gif,
        IB_FORMAT_BMP => OutputFormat::Bmp,
        other => {
            return Err(BridgeError::unsupported_format(format!(
                "unknown output format code {other}"
            )));
        }
    };
    Ok(match format {
        OutputFormat::Jpeg => SaveParams::Jpeg(JpegSaveParams {
            quality: optional_u8(options.quality, "quality")?,
            background: None,
        }),
        OutputFormat::Png => SaveParams::Png(PngSaveParams {
            compression: optional_u8(options.compression, "compression")?,
            filter: None,
        }),
        other => SaveParams::for_format(other),
    })
}

/// Decode from `source` and encode into `target`.
///
/// Takes ownership of both handles: they are released before this returns,
/// whatever the outcome. Returns `0` on success and `-1` on failure.
///
/// # Safety
/// `options` must be null or point to a valid [`IbSaveOptions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ib_transcode(
    source: u64,
    target: u64,
    options: *const IbSaveOptions,
) -> c_int {
    // SAFETY: same contract as this function.
    unsafe { ib_transcode_with_log(source, target, options, None, std::ptr::null_mut()) }
}

/// [`ib_transcode`] reporting operation-level records to `log`.
///
/// # Safety
/// `options` must be null or point to a valid [`IbSaveOptions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ib_transcode_with_log(
    source: u64,
    target: u64,
    options: *const IbSaveOptions,
    log: Option<IbLogFn>,
    log_user: *mut c_void,
) -> c_int {
    let logger = host_logger(log, log_user);
    let options = if options.is_null() {
        IbSaveOptions {
            format: IB_FORMAT_JPEG,
            quality: -1,
            compression: -1,
        }
    } else {
        // SAFETY: non-null and valid per the caller contract.
        unsafe { *options }
    };

    let run = || -> Result<()> {
        let source = Handle::from_raw(source);
        let target = Handle::from_raw(target);
        let settings = Settings::default();
        let params = match save_params(&options).and_then(|p| p.resolve(&settings)) {
            Ok(p) => p,
            Err(e) => {
                registry::release(source);
                registry::release(target);
                return Err(e);
            }
        };
        pipeline::transcode_handles(
            source,
            target,
            &[],
            &LoadOptions::from_settings(&settings),
            &params,
            &logger,
        )?;
        Ok(())
    };

    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => {
            clear_last_error();
            0
        }
        Ok(Err(e)) => {
            logger.error(&format!("ib_transcode: {e}"));
            set_last_error(&e);
            -1
        }
        Err(_) => {
            set_last_error(&BridgeError::operation("ib_transcode panicked"));
            -1
        }
    }
}

/// Copy the calling thread's last error message into `buf` (NUL
/// terminated, truncated to `len`). Returns the full message length, or `0`
/// when there is no error.
///
/// # Safety
/// `buf` must be null or valid for writes of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ib_last_error(buf: *mut c_char, len: usize) -> usize {
    LAST_ERROR.with(|slot| {
        let slot = slot.borrow();
        let Some(msg) = slot.as_ref() else {
            return 0;
        };
        let bytes = msg.as_bytes();
        if !buf.is_null() && len > 0 {
            let n = bytes.len().min(len - 1);
            // SAFETY: `buf` is valid for `len` bytes and `n < len`.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, n);
                *buf.add(n) = 0;
            }
        }
        bytes.len()
    })
}
