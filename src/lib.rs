//! Stream adapters that let host-supplied I/O feed an image decoder and
//! receive encoder output, plus the typed load/save/transform operations
//! that run on top of them.

#[cfg(feature = "capi")]
pub mod capi;
pub mod config;
pub mod error;
pub mod log;
pub mod ops;
pub mod pipeline;
pub mod stream;
