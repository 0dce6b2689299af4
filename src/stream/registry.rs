//! Process-wide handle table.
//!
//! Maps each live [`Handle`] to the host object it correlates with. The
//! table lock is only held for lookup/insert/remove; host calls happen on
//! the per-entry lock so independent operations never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use super::Handle;
use super::host::{HostSource, HostTarget};
use crate::log::Logger;

pub(crate) enum Endpoint {
    Source(Box<dyn HostSource>),
    Target(Box<dyn HostTarget>),
}

impl Endpoint {
    fn kind(&self) -> &'static str {
        match self {
            Endpoint::Source(_) => "source",
            Endpoint::Target(_) => "target",
        }
    }

    fn close(&mut self) {
        match self {
            Endpoint::Source(s) => s.close(),
            Endpoint::Target(t) => t.close(),
        }
    }
}

pub(crate) struct Entry {
    pub(crate) endpoint: Endpoint,
    pub(crate) logger: Logger,
}

struct Registry {
    next: AtomicU64,
    entries: Mutex<HashMap<Handle, Arc<Mutex<Entry>>>>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| Registry {
    next: AtomicU64::new(1),
    entries: Mutex::new(HashMap::new()),
});

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn insert(endpoint: Endpoint, logger: &Logger) -> Handle {
    let handle = Handle::from_raw(REGISTRY.next.fetch_add(1, Ordering::Relaxed));
    let kind = endpoint.kind();
    let entry = Entry {
        endpoint,
        logger: logger.clone(),
    };
    lock(&REGISTRY.entries).insert(handle, Arc::new(Mutex::new(entry)));
    logger.debug(&format!("created {kind} stream {handle}"));
    handle
}

/// Register a host source and return its new handle.
pub fn register_source(source: Box<dyn HostSource>, logger: &Logger) -> Handle {
    insert(Endpoint::Source(source), logger)
}

/// Register a host target and return its new handle.
pub fn register_target(target: Box<dyn HostTarget>, logger: &Logger) -> Handle {
    insert(Endpoint::Target(target), logger)
}

/// Tear down the mapping for `handle`.
///
/// Returns `true` if this call released the handle and `false` if it was
/// already gone. The host object's `close()` runs exactly once, then the
/// object is dropped.
pub fn release(handle: Handle) -> bool {
    let Some(entry) = lock(&REGISTRY.entries).remove(&handle) else {
        return false;
    };
    let mut entry = lock(&entry);
    entry.endpoint.close();
    entry
        .logger
        .debug(&format!("released {} stream {handle}", entry.endpoint.kind()));
    // Swap the host object out so it drops here rather than with the last
    // in-flight Arc clone.
    let placeholder: Endpoint = match entry.endpoint {
        Endpoint::Source(_) => Endpoint::Source(Box::new(Released)),
        Endpoint::Target(_) => Endpoint::Target(Box::new(Released)),
    };
    drop(std::mem::replace(&mut entry.endpoint, placeholder));
    true
}

/// Whether `handle` currently names a registered adapter.
pub fn is_live(handle: Handle) -> bool {
    lock(&REGISTRY.entries).contains_key(&handle)
}

/// Run `f` against the entry for `handle`, or return `None` if the handle is
/// unknown or released.
pub(crate) fn with_entry<R>(handle: Handle, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
    let entry = lock(&REGISTRY.entries).get(&handle).cloned()?;
    let mut entry = lock(&entry);
    Some(f(&mut entry))
}

/// Stand-in left behind after release for callers still holding the entry.
struct Released;

impl HostSource for Released {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("stream released"))
    }
}

impl HostTarget for Released {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("stream released"))
    }
}
