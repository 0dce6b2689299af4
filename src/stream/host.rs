//! Host-side I/O objects.
//!
//! A host object is whatever the caller hands in as the real byte source or
//! sink: a file, a socket, an in-memory buffer, or a set of C callbacks.
//! The registry owns it exclusively from registration until release.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

/// A readable, optionally seekable byte source supplied by the host.
pub trait HostSource: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Reposition the source. Sources that cannot seek must fail rather
    /// than report a made-up position.
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "source is not seekable",
        ))
    }

    /// Called exactly once when the handle is released.
    fn close(&mut self) {}
}

/// A writable sink supplied by the host.
pub trait HostTarget: Send {
    /// Accept bytes. Returning fewer than `buf.len()` is reported to the
    /// encoder as a failed write.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// The encoder has produced its last byte.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called exactly once when the handle is released.
    fn close(&mut self) {}
}

/// Non-seekable source over any reader (pipes, sockets, stdin).
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read + Send> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> HostSource for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Bounded, seekable source.
///
/// The length is captured when the source is wrapped. Seeking before the
/// start or past the end is an error; seeking exactly to the end is allowed
/// and the next read reports end of stream.
pub struct SeekSource<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl SeekSource<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        SeekSource {
            inner: Cursor::new(bytes),
            len,
            pos: 0,
        }
    }
}

impl<R: Read + Seek + Send> SeekSource<R> {
    /// Wrap `inner`, keeping its current position as the read position.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(SeekSource { inner, len, pos })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl<R: Read + Seek + Send> HostSource for SeekSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(i128::from(n)),
            SeekFrom::Current(d) => Some(i128::from(self.pos) + i128::from(d)),
            SeekFrom::End(d) => Some(i128::from(self.len) + i128::from(d)),
        }
        .filter(|t| (0..=i128::from(self.len)).contains(t))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek {pos:?} outside 0..={}", self.len),
            )
        })?;

        let target = target as u64;
        self.pos = self.inner.seek(SeekFrom::Start(target))?;
        Ok(self.pos)
    }
}

/// Sink over any writer. Short writes are retried until the whole chunk is
/// accepted or the writer fails.
pub struct WriteTarget<W> {
    inner: W,
}

impl<W: Write + Send> WriteTarget<W> {
    pub fn new(inner: W) -> Self {
        WriteTarget { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> HostTarget for WriteTarget<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// In-memory sink.
///
/// The collected bytes and chunk sizes stay reachable through the shared
/// [`VecTarget::contents`] handle after the target itself has been handed
/// to the registry.
#[derive(Clone, Default)]
pub struct VecTarget {
    shared: Arc<Mutex<Collected>>,
}

#[derive(Debug, Default, Clone)]
pub struct Collected {
    pub bytes: Vec<u8>,
    pub chunks: Vec<usize>,
    pub finished: bool,
}

impl VecTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn contents(&self) -> Collected {
        self.shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn take_bytes(&self) -> Vec<u8> {
        std::mem::take(
            &mut self
                .shared
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .bytes,
        )
    }
}

impl HostTarget for VecTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut c = self
            .shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        c.bytes.extend_from_slice(buf);
        c.chunks.push(buf.len());
        Ok(buf.len())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.shared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .finished = true;
        Ok(())
    }
}
