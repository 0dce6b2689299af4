pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod relay;
pub mod source;
pub mod target;

use std::fmt;
use std::io::SeekFrom;

use crate::error::BridgeError;

/// Opaque correlation token between a native adapter and a host I/O object.
///
/// Handles are issued by the registry starting at 1; `0` never names a live
/// adapter and is used as the "no handle" value at the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Seek origin as it crosses the callback boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2,
}

impl Whence {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Whence::Start),
            1 => Some(Whence::Current),
            2 => Some(Whence::End),
            _ => None,
        }
    }

    /// Combine with an offset. A negative offset from `Start` has no meaning
    /// and yields `None`.
    pub fn seek_from(self, offset: i64) -> Option<SeekFrom> {
        match self {
            Whence::Start => u64::try_from(offset).ok().map(SeekFrom::Start),
            Whence::Current => Some(SeekFrom::Current(offset)),
            Whence::End => Some(SeekFrom::End(offset)),
        }
    }

    /// Split a `SeekFrom` into the raw pair passed to a seek callback.
    pub fn split(pos: SeekFrom) -> Option<(i64, Whence)> {
        match pos {
            SeekFrom::Start(n) => i64::try_from(n).ok().map(|n| (n, Whence::Start)),
            SeekFrom::Current(n) => Some((n, Whence::Current)),
            SeekFrom::End(n) => Some((n, Whence::End)),
        }
    }
}

/// Negative return values of the read/seek/write callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum CallbackCode {
    /// The host object reported an I/O failure.
    HostIo = -1,
    /// The handle was never issued or has already been released.
    UnknownHandle = -2,
    /// The request is not supported by the endpoint (e.g. seek on a pipe).
    Unsupported = -3,
    /// Bad whence, null buffer or negative length.
    InvalidArgument = -4,
}

impl CallbackCode {
    pub const fn raw(self) -> i64 {
        self as i64
    }

    /// Classify a negative callback return. Unknown negative values are
    /// treated as host failures.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0.. => None,
            -2 => Some(CallbackCode::UnknownHandle),
            -3 => Some(CallbackCode::Unsupported),
            -4 => Some(CallbackCode::InvalidArgument),
            _ => Some(CallbackCode::HostIo),
        }
    }

    /// Protocol violations are programming errors on one side of the
    /// boundary; everything else is an I/O outcome of the host.
    pub fn is_protocol_violation(self) -> bool {
        !matches!(self, CallbackCode::HostIo)
    }

    pub fn describe(self) -> &'static str {
        match self {
            CallbackCode::HostIo => "host I/O failure",
            CallbackCode::UnknownHandle => "unknown or released handle",
            CallbackCode::Unsupported => "request not supported by endpoint",
            CallbackCode::InvalidArgument => "invalid argument",
        }
    }

    /// Turn a failed `op` on `handle` into the crate error class it belongs to.
    pub fn into_error(self, op: &str, handle: Handle) -> BridgeError {
        let msg = format!("{op} on stream {handle} failed: {}", self.describe());
        if self.is_protocol_violation() {
            BridgeError::protocol(msg)
        } else {
            BridgeError::host_io(msg)
        }
    }
}

/// Decoder-side read callback: `(handle, buffer, max_len) -> bytes | <0`.
pub type ReadFn = unsafe extern "C" fn(handle: u64, buffer: *mut u8, length: i64) -> i64;
/// Decoder-side seek callback: `(handle, offset, whence) -> position | <0`.
pub type SeekFn = unsafe extern "C" fn(handle: u64, offset: i64, whence: i32) -> i64;
/// Encoder-side write callback: `(handle, buffer, len) -> bytes | <0`.
pub type WriteFn = unsafe extern "C" fn(handle: u64, buffer: *const u8, length: i64) -> i64;
/// Encoder-side end-of-stream callback: `(handle) -> 0 | <0`.
pub type FinishFn = unsafe extern "C" fn(handle: u64) -> i64;

/// Callback vtable a decoder pulls through.
#[derive(Debug, Clone, Copy)]
pub struct SourceCallbacks {
    pub read: ReadFn,
    pub seek: SeekFn,
}

impl Default for SourceCallbacks {
    fn default() -> Self {
        SourceCallbacks {
            read: relay::relay_read,
            seek: relay::relay_seek,
        }
    }
}

/// Callback vtable an encoder pushes through.
#[derive(Debug, Clone, Copy)]
pub struct TargetCallbacks {
    pub write: WriteFn,
    pub finish: FinishFn,
}

impl Default for TargetCallbacks {
    fn default() -> Self {
        TargetCallbacks {
            write: relay::relay_write,
            finish: relay::relay_finish,
        }
    }
}
