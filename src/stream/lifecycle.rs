//! Binds one handle to one in-flight operation.
//!
//! A [`StreamGuard`] owns a handle from creation until it is dropped or
//! released explicitly, whichever comes first. Release goes through the
//! registry and is idempotent, so a guard dropping after an explicit
//! release (or after the host released the handle itself) is harmless.

use super::host::{HostSource, HostTarget};
use super::registry;
use super::source::NativeSource;
use super::target::NativeTarget;
use super::Handle;
use crate::error::Result;
use crate::log::Logger;

/// RAII owner of a registered handle.
#[derive(Debug)]
pub struct StreamGuard {
    handle: Handle,
    released: bool,
}

impl StreamGuard {
    /// Register `host` as a source and take ownership of the new handle.
    pub fn source(host: impl HostSource + 'static, logger: &Logger) -> Self {
        Self::adopt(registry::register_source(Box::new(host), logger))
    }

    /// Register `host` as a target and take ownership of the new handle.
    pub fn target(host: impl HostTarget + 'static, logger: &Logger) -> Self {
        Self::adopt(registry::register_target(Box::new(host), logger))
    }

    /// Take ownership of a handle registered elsewhere (e.g. by a C host).
    pub fn adopt(handle: Handle) -> Self {
        StreamGuard {
            handle,
            released: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn native_source(&self) -> NativeSource {
        NativeSource::new(self.handle)
    }

    pub fn native_target(&self) -> NativeTarget {
        NativeTarget::new(self.handle)
    }

    /// Release now. Returns `true` if this call tore the mapping down.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        registry::release(self.handle)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `f` with a fresh source adapter over `host`. The handle is released
/// on every exit path, including unwinding.
pub fn with_source<T>(
    host: impl HostSource + 'static,
    logger: &Logger,
    f: impl FnOnce(&mut NativeSource) -> Result<T>,
) -> Result<T> {
    let guard = StreamGuard::source(host, logger);
    let mut native = guard.native_source();
    f(&mut native)
}

/// Run `f` with a fresh target adapter over `host`. The handle is released
/// on every exit path, including unwinding.
pub fn with_target<T>(
    host: impl HostTarget + 'static,
    logger: &Logger,
    f: impl FnOnce(&mut NativeTarget) -> Result<T>,
) -> Result<T> {
    let guard = StreamGuard::target(host, logger);
    let mut native = guard.native_target();
    f(&mut native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::stream::host::{SeekSource, VecTarget};
    use std::io::{Read, Write};

    #[test]
    fn test_guard_releases_on_drop() {
        let handle = {
            let guard = StreamGuard::source(SeekSource::from_bytes(vec![1, 2]), &Logger::discard());
            assert!(registry::is_live(guard.handle()));
            guard.handle()
        };
        assert!(!registry::is_live(handle));
    }

    #[test]
    fn test_explicit_release_then_drop() {
        let mut guard = StreamGuard::target(VecTarget::new(), &Logger::discard());
        let handle = guard.handle();
        assert!(guard.release());
        assert!(!guard.release());
        drop(guard);
        assert!(!registry::is_live(handle));
    }

    #[test]
    fn test_with_source_releases_on_error() {
        let mut seen = None;
        let result: Result<()> = with_source(
            SeekSource::from_bytes(b"hello".to_vec()),
            &Logger::discard(),
            |src| {
                seen = Some(src.handle());
                let mut buf = [0u8; 2];
                src.read_exact(&mut buf)?;
                Err(BridgeError::decode("bail out"))
            },
        );
        assert!(result.is_err());
        assert!(!registry::is_live(seen.unwrap()));
    }

    #[test]
    fn test_with_target_writes_through() {
        let sink = VecTarget::new();
        let written = with_target(sink.clone(), &Logger::discard(), |dst| {
            dst.write_all(b"abc")?;
            dst.finish()?;
            Ok(dst.bytes_written())
        })
        .unwrap();
        assert_eq!(written, 3);
        assert_eq!(sink.contents().bytes, b"abc");
    }

    #[test]
    fn test_adopted_handle_released_by_guard() {
        let handle = registry::register_source(
            Box::new(SeekSource::from_bytes(vec![])),
            &Logger::discard(),
        );
        drop(StreamGuard::adopt(handle));
        assert!(!registry::is_live(handle));
        // A second guard over the same, already released handle is a no-op.
        let mut again = StreamGuard::adopt(handle);
        assert!(!again.release());
    }
}
