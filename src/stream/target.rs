// Encoder-side view of a target handle.

use std::io::{self, Write};

use super::{CallbackCode, Handle, TargetCallbacks};
use crate::error::{BridgeError, Result};

/// Push stream handed to an encoder.
///
/// Writes go straight through the callback vtable in the order the encoder
/// issues them. A chunk the host accepts only partially is a failed write;
/// there is no retry at this layer.
pub struct NativeTarget {
    handle: Handle,
    callbacks: TargetCallbacks,
    bytes_written: u64,
    failure: Option<(&'static str, CallbackCode)>,
    finished: bool,
}

impl NativeTarget {
    pub fn new(handle: Handle) -> Self {
        Self::with_callbacks(handle, TargetCallbacks::default())
    }

    pub fn with_callbacks(handle: Handle, callbacks: TargetCallbacks) -> Self {
        NativeTarget {
            handle,
            callbacks,
            bytes_written: 0,
            failure: None,
            finished: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Total bytes the host has accepted.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn failure(&self) -> Option<CallbackCode> {
        self.failure.map(|(_, code)| code)
    }

    pub fn take_error(&mut self) -> Option<BridgeError> {
        self.failure
            .take()
            .map(|(op, code)| code.into_error(op, self.handle))
    }

    /// Signal end of stream to the host. Further writes are rejected.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        // SAFETY: the finish callback takes no pointers.
        let rc = unsafe { (self.callbacks.finish)(self.handle.raw()) };
        if rc < 0 {
            let code = CallbackCode::from_raw(rc).unwrap_or(CallbackCode::HostIo);
            return Err(code.into_error("finish", self.handle));
        }
        self.finished = true;
        Ok(())
    }

    fn record(&mut self, op: &'static str, code: CallbackCode) -> io::Error {
        if self.failure.is_none() {
            self.failure = Some((op, code));
        }
        io::Error::other(code.into_error(op, self.handle))
    }
}

impl Write for NativeTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::other(BridgeError::protocol(format!(
                "write on stream {} after finish",
                self.handle
            ))));
        }
        if let Some((op, code)) = self.failure {
            // The host already failed once; the stream is dead.
            return Err(io::Error::other(code.into_error(op, self.handle)));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(i64::MAX as usize);
        // SAFETY: `buf` is valid for `len` reads for the duration of the call.
        let n = unsafe { (self.callbacks.write)(self.handle.raw(), buf.as_ptr(), len as i64) };
        if n < 0 {
            let code = CallbackCode::from_raw(n).unwrap_or(CallbackCode::HostIo);
            return Err(self.record("write", code));
        }
        if n as usize != len {
            // Partial acceptance counts as a hard failure of the whole chunk.
            return Err(self.record("write", CallbackCode::HostIo));
        }
        self.bytes_written += n as u64;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
