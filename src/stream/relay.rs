//! C-ABI relays between the codec-side callbacks and registered host objects.
//!
//! These are the functions installed in [`SourceCallbacks`] and
//! [`TargetCallbacks`] by default. Each one resolves the handle, forwards a
//! single request to the host object and folds every failure (host error,
//! host panic, bad argument, released handle) into a negative
//! [`CallbackCode`]. Nothing unwinds out of them.
//!
//! [`SourceCallbacks`]: super::SourceCallbacks
//! [`TargetCallbacks`]: super::TargetCallbacks

use std::io;
use std::panic::{self, AssertUnwindSafe};

use super::registry::{self, Endpoint, Entry};
use super::{CallbackCode, Handle, Whence};

/// Run one host request against `handle`, converting panics and lookup
/// failures into callback codes.
fn dispatch(handle: Handle, op: &str, f: impl FnOnce(&mut Entry) -> i64) -> i64 {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry::with_entry(handle, f)));
    match outcome {
        Ok(Some(code)) => code,
        Ok(None) => {
            tracing::error!(domain = crate::log::DOMAIN, "{op}[{handle}]: stream not found");
            CallbackCode::UnknownHandle.raw()
        }
        Err(_) => {
            tracing::error!(domain = crate::log::DOMAIN, "{op}[{handle}]: host callback panicked");
            CallbackCode::HostIo.raw()
        }
    }
}

fn host_failure(entry: &Entry, op: &str, handle: Handle, err: &io::Error) -> i64 {
    entry
        .logger
        .error(&format!("{op}[{handle}]: Error: {err}"));
    if err.kind() == io::ErrorKind::Unsupported {
        CallbackCode::Unsupported.raw()
    } else {
        CallbackCode::HostIo.raw()
    }
}

fn wrong_endpoint(entry: &Entry, op: &str, handle: Handle) -> i64 {
    entry
        .logger
        .error(&format!("{op}[{handle}]: not supported on this stream"));
    CallbackCode::Unsupported.raw()
}

/// Read up to `length` bytes from the source registered under `handle`.
///
/// Returns the byte count, `0` at end of stream, or a negative
/// [`CallbackCode`].
///
/// # Safety
/// `buffer` must be valid for writes of `length` bytes for the duration of
/// the call.
pub unsafe extern "C" fn relay_read(handle: u64, buffer: *mut u8, length: i64) -> i64 {
    let handle = Handle::from_raw(handle);
    let Ok(len) = usize::try_from(length) else {
        return CallbackCode::InvalidArgument.raw();
    };
    if buffer.is_null() && len > 0 {
        return CallbackCode::InvalidArgument.raw();
    }
    let buf: &mut [u8] = if len == 0 {
        &mut []
    } else {
        // SAFETY: non-null and valid for `len` writes per the caller contract.
        unsafe { std::slice::from_raw_parts_mut(buffer, len) }
    };

    dispatch(handle, "sourceRead", |entry| {
        let result = match &mut entry.endpoint {
            Endpoint::Source(src) => src.read(buf),
            Endpoint::Target(_) => return wrong_endpoint(entry, "sourceRead", handle),
        };
        match result {
            Ok(n) if n <= len => {
                if n == 0 {
                    entry.logger.debug(&format!("sourceRead[{handle}]: EOF"));
                } else {
                    entry
                        .logger
                        .debug(&format!("sourceRead[{handle}]: OK [read {n}]"));
                }
                n as i64
            }
            Ok(n) => {
                entry.logger.error(&format!(
                    "sourceRead[{handle}]: host reported {n} bytes for a {len} byte buffer"
                ));
                CallbackCode::HostIo.raw()
            }
            Err(e) => host_failure(entry, "sourceRead", handle, &e),
        }
    })
}

/// Seek the source registered under `handle`.
///
/// Returns the new absolute position or a negative [`CallbackCode`].
///
/// # Safety
/// Always safe to call; `unsafe` only to share the [`SeekFn`] signature.
///
/// [`SeekFn`]: super::SeekFn
pub unsafe extern "C" fn relay_seek(handle: u64, offset: i64, whence: i32) -> i64 {
    let handle = Handle::from_raw(handle);
    let pos = Whence::from_raw(whence).and_then(|w| w.seek_from(offset));

    dispatch(handle, "sourceSeek", |entry| {
        let Some(pos) = pos else {
            entry.logger.error(&format!(
                "sourceSeek[{handle}]: invalid request [offset {offset} | whence {whence}]"
            ));
            return CallbackCode::InvalidArgument.raw();
        };
        let result = match &mut entry.endpoint {
            Endpoint::Source(src) => src.seek(pos),
            Endpoint::Target(_) => return wrong_endpoint(entry, "sourceSeek", handle),
        };
        match result.map(i64::try_from) {
            Ok(Ok(n)) => {
                entry.logger.debug(&format!(
                    "sourceSeek[{handle}]: OK [seek {n} | whence {whence}]"
                ));
                n
            }
            Ok(Err(_)) => CallbackCode::HostIo.raw(),
            Err(e) => host_failure(entry, "sourceSeek", handle, &e),
        }
    })
}

/// Push `length` bytes to the target registered under `handle`.
///
/// Returns the number of bytes the host accepted or a negative
/// [`CallbackCode`].
///
/// # Safety
/// `buffer` must be valid for reads of `length` bytes for the duration of
/// the call.
pub unsafe extern "C" fn relay_write(handle: u64, buffer: *const u8, length: i64) -> i64 {
    let handle = Handle::from_raw(handle);
    let Ok(len) = usize::try_from(length) else {
        return CallbackCode::InvalidArgument.raw();
    };
    if buffer.is_null() && len > 0 {
        return CallbackCode::InvalidArgument.raw();
    }
    let buf: &[u8] = if len == 0 {
        &[]
    } else {
        // SAFETY: non-null and valid for `len` reads per the caller contract.
        unsafe { std::slice::from_raw_parts(buffer, len) }
    };

    dispatch(handle, "targetWrite", |entry| {
        let result = match &mut entry.endpoint {
            Endpoint::Target(dst) => dst.write(buf),
            Endpoint::Source(_) => return wrong_endpoint(entry, "targetWrite", handle),
        };
        match result {
            Ok(n) => {
                entry
                    .logger
                    .debug(&format!("targetWrite[{handle}]: OK [wrote {n}]"));
                n.min(len) as i64
            }
            Err(e) => host_failure(entry, "targetWrite", handle, &e),
        }
    })
}

/// Tell the target registered under `handle` that the encoder is done.
///
/// # Safety
/// Always safe to call; `unsafe` only to share the [`FinishFn`] signature.
///
/// [`FinishFn`]: super::FinishFn
pub unsafe extern "C" fn relay_finish(handle: u64) -> i64 {
    let handle = Handle::from_raw(handle);
    dispatch(handle, "targetEnd", |entry| {
        let result = match &mut entry.endpoint {
            Endpoint::Target(dst) => dst.finish(),
            Endpoint::Source(_) => return wrong_endpoint(entry, "targetEnd", handle),
        };
        match result {
            Ok(()) => 0,
            Err(e) => host_failure(entry, "targetEnd", handle, &e),
        }
    })
}
