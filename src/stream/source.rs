// Decoder-side view of a source handle.

use std::io::{self, Read, Seek, SeekFrom};

use super::{CallbackCode, Handle, SourceCallbacks, Whence};
use crate::error::BridgeError;

/// Pull stream handed to a decoder.
///
/// Every `read`/`seek` is forwarded, unbuffered and in order, through the
/// callback vtable. The first negative return is remembered so the
/// enclosing operation can report the callback failure instead of whatever
/// the decoder made of the resulting `io::Error`.
pub struct NativeSource {
    handle: Handle,
    callbacks: SourceCallbacks,
    failure: Option<(&'static str, CallbackCode)>,
}

impl NativeSource {
    /// View `handle` through the registry relays.
    pub fn new(handle: Handle) -> Self {
        Self::with_callbacks(handle, SourceCallbacks::default())
    }

    /// View `handle` through a custom callback vtable.
    pub fn with_callbacks(handle: Handle, callbacks: SourceCallbacks) -> Self {
        NativeSource {
            handle,
            callbacks,
            failure: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The callback failure recorded since the last [`take_failure`](Self::take_failure).
    pub fn failure(&self) -> Option<CallbackCode> {
        self.failure.map(|(_, code)| code)
    }

    pub fn take_failure(&mut self) -> Option<CallbackCode> {
        self.failure.take().map(|(_, code)| code)
    }

    /// Convert the recorded failure into a crate error, if there is one.
    pub fn take_error(&mut self) -> Option<BridgeError> {
        self.failure
            .take()
            .map(|(op, code)| code.into_error(op, self.handle))
    }

    fn fail(&mut self, op: &'static str, raw: i64) -> io::Error {
        let code = CallbackCode::from_raw(raw).unwrap_or(CallbackCode::HostIo);
        if self.failure.is_none() {
            self.failure = Some((op, code));
        }
        let kind = match code {
            CallbackCode::Unsupported => io::ErrorKind::Unsupported,
            CallbackCode::InvalidArgument => io::ErrorKind::InvalidInput,
            CallbackCode::UnknownHandle => io::ErrorKind::NotConnected,
            CallbackCode::HostIo => io::ErrorKind::Other,
        };
        io::Error::new(kind, code.into_error(op, self.handle))
    }
}

impl Read for NativeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(i64::MAX as usize);
        // SAFETY: `buf` is valid for `len` writes for the duration of the call.
        let n = unsafe { (self.callbacks.read)(self.handle.raw(), buf.as_mut_ptr(), len as i64) };
        if n < 0 {
            return Err(self.fail("read", n));
        }
        let n = n as usize;
        if n > len {
            self.failure.get_or_insert(("read", CallbackCode::InvalidArgument));
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                BridgeError::protocol(format!(
                    "read on stream {} returned {n} bytes for a {len} byte request",
                    self.handle
                )),
            ));
        }
        Ok(n)
    }
}

impl Seek for NativeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let Some((offset, whence)) = Whence::split(pos) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek {pos:?} does not fit the callback protocol"),
            ));
        };
        // SAFETY: the seek callback takes no pointers.
        let n = unsafe { (self.callbacks.seek)(self.handle.raw(), offset, whence as i32) };
        if n < 0 {
            return Err(self.fail("seek", n));
        }
        Ok(n as u64)
    }
}
