// Flat C surface driven the way a foreign host would drive it.
#![cfg(feature = "capi")]

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use image_bridge::capi::{
    IB_FORMAT_PNG, IB_LOG_DEBUG, IB_LOG_ERROR, IB_LOG_INFO, IbSaveOptions, ib_last_error,
    ib_release, ib_source_new, ib_source_new_with_log, ib_target_new, ib_target_new_with_log,
    ib_transcode, ib_transcode_with_log,
};
use image_bridge::stream::{Handle, registry};

/// Host-side state a foreign caller would keep behind its opaque pointer.
struct HostIo {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    closes: usize,
    fail_reads: bool,
}

impl HostIo {
    fn new(input: Vec<u8>) -> Box<Self> {
        Box::new(HostIo {
            input: Cursor::new(input),
            output: Vec::new(),
            closes: 0,
            fail_reads: false,
        })
    }
}

unsafe extern "C" fn host_read(host: *mut c_void, buf: *mut u8, len: i64) -> i64 {
    let io = unsafe { &mut *(host as *mut HostIo) };
    if io.fail_reads {
        return -1;
    }
    let buf = unsafe { std::slice::from_raw_parts_mut(buf, len as usize) };
    io.input.read(buf).map(|n| n as i64).unwrap_or(-1)
}

unsafe extern "C" fn host_seek(host: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let io = unsafe { &mut *(host as *mut HostIo) };
    let pos = match whence {
        0 => SeekFrom::Start(offset as u64),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return -1,
    };
    io.input.seek(pos).map(|p| p as i64).unwrap_or(-1)
}

unsafe extern "C" fn host_write(host: *mut c_void, buf: *const u8, len: i64) -> i64 {
    let io = unsafe { &mut *(host as *mut HostIo) };
    let buf = unsafe { std::slice::from_raw_parts(buf, len as usize) };
    io.output.extend_from_slice(buf);
    len
}

unsafe extern "C" fn host_close(host: *mut c_void) {
    let io = unsafe { &mut *(host as *mut HostIo) };
    io.closes += 1;
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([1, 2, 3])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn last_error() -> String {
    let mut buf = [0 as c_char; 256];
    let n = unsafe { ib_last_error(buf.as_mut_ptr(), buf.len()) };
    if n == 0 {
        return String::new();
    }
    let bytes: Vec<u8> = buf.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[test]
fn test_transcode_through_host_callbacks() {
    let mut src = HostIo::new(png(6, 3));
    let mut dst = HostIo::new(Vec::new());
    let src_ptr = &mut *src as *mut HostIo as *mut c_void;
    let dst_ptr = &mut *dst as *mut HostIo as *mut c_void;

    let s = ib_source_new(src_ptr, Some(host_read), Some(host_seek), Some(host_close));
    let t = ib_target_new(dst_ptr, Some(host_write), Some(host_close));
    assert_ne!(s, 0);
    assert_ne!(t, 0);

    let opts = IbSaveOptions {
        format: IB_FORMAT_PNG,
        quality: -1,
        compression: 9,
    };
    let rc = unsafe { ib_transcode(s, t, &opts) };
    assert_eq!(rc, 0, "{}", last_error());

    // Both handles were consumed; releasing again is a no-op.
    assert!(!registry::is_live(Handle::from_raw(s)));
    assert!(!registry::is_live(Handle::from_raw(t)));
    ib_release(s);
    ib_release(t);
    assert_eq!(src.closes, 1);
    assert_eq!(dst.closes, 1);

    let out = image::load_from_memory(&dst.output).unwrap();
    assert_eq!(out.dimensions(), (6, 3));
}

#[test]
fn test_transcode_failure_sets_last_error_and_releases() {
    let mut src = HostIo::new(png(4, 4));
    src.fail_reads = true;
    let mut dst = HostIo::new(Vec::new());
    let s = ib_source_new(
        &mut *src as *mut HostIo as *mut c_void,
        Some(host_read),
        Some(host_seek),
        Some(host_close),
    );
    let t = ib_target_new(
        &mut *dst as *mut HostIo as *mut c_void,
        Some(host_write),
        Some(host_close),
    );

    let rc = unsafe { ib_transcode(s, t, std::ptr::null()) };
    assert_eq!(rc, -1);
    assert!(last_error().contains("Host I/O error"), "{}", last_error());
    assert_eq!(src.closes, 1);
    assert_eq!(dst.closes, 1);
    assert!(dst.output.is_empty());
}

#[test]
fn test_source_without_seek_is_buffered() {
    let mut src = HostIo::new(png(5, 5));
    let mut dst = HostIo::new(Vec::new());
    let s = ib_source_new(
        &mut *src as *mut HostIo as *mut c_void,
        Some(host_read),
        None,
        None,
    );
    let t = ib_target_new(&mut *dst as *mut HostIo as *mut c_void, Some(host_write), None);

    let opts = IbSaveOptions {
        format: IB_FORMAT_PNG,
        quality: -1,
        compression: -1,
    };
    assert_eq!(unsafe { ib_transcode(s, t, &opts) }, 0, "{}", last_error());
    assert!(!dst.output.is_empty());
}

#[test]
fn test_null_callbacks_rejected() {
    assert_eq!(ib_source_new(std::ptr::null_mut(), None, None, None), 0);
    assert_eq!(ib_target_new(std::ptr::null_mut(), None, None), 0);
    assert!(last_error().contains("null"));
}

#[test]
fn test_bad_options_release_handles() {
    let mut src = HostIo::new(png(2, 2));
    let mut dst = HostIo::new(Vec::new());
    let s = ib_source_new(
        &mut *src as *mut HostIo as *mut c_void,
        Some(host_read),
        Some(host_seek),
        Some(host_close),
    );
    let t = ib_target_new(
        &mut *dst as *mut HostIo as *mut c_void,
        Some(host_write),
        Some(host_close),
    );
    let opts = IbSaveOptions {
        format: 99,
        quality: -1,
        compression: -1,
    };
    assert_eq!(unsafe { ib_transcode(s, t, &opts) }, -1);
    assert_eq!(src.closes, 1);
    assert_eq!(dst.closes, 1);
}

#[test]
fn test_release_unknown_handle_is_noop() {
    ib_release(0);
    ib_release(u64::MAX);
}

// ============================================================
// Host-supplied log sink
// ============================================================

type Records = Mutex<Vec<(String, c_int, String)>>;

unsafe extern "C" fn host_log(
    user: *mut c_void,
    domain: *const c_char,
    level: c_int,
    message: *const c_char,
) {
    let records = unsafe { &*(user as *const Records) };
    let domain = unsafe { CStr::from_ptr(domain) }.to_string_lossy().into_owned();
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
    records.lock().unwrap().push((domain, level, message));
}

#[test]
fn test_log_callback_receives_records() {
    let records: Records = Mutex::new(Vec::new());
    let user = &records as *const Records as *mut c_void;

    let mut src = HostIo::new(png(3, 3));
    let mut dst = HostIo::new(Vec::new());
    let s = ib_source_new_with_log(
        &mut *src as *mut HostIo as *mut c_void,
        Some(host_read),
        Some(host_seek),
        None,
        Some(host_log),
        user,
    );
    let t = ib_target_new_with_log(
        &mut *dst as *mut HostIo as *mut c_void,
        Some(host_write),
        None,
        Some(host_log),
        user,
    );
    let opts = IbSaveOptions {
        format: IB_FORMAT_PNG,
        quality: -1,
        compression: -1,
    };
    let rc = unsafe { ib_transcode_with_log(s, t, &opts, Some(host_log), user) };
    assert_eq!(rc, 0, "{}", last_error());

    let records = records.lock().unwrap();
    assert!(records.iter().all(|(domain, _, _)| domain == "image_bridge"));
    assert!(
        records
            .iter()
            .any(|(_, level, msg)| *level == IB_LOG_DEBUG && msg.contains("sourceRead"))
    );
    assert!(
        records
            .iter()
            .any(|(_, level, msg)| *level == IB_LOG_DEBUG && msg.contains("targetWrite"))
    );
    assert!(
        records
            .iter()
            .any(|(_, level, msg)| *level == IB_LOG_INFO && msg.contains("transcoded"))
    );
}

#[test]
fn test_log_callback_sees_transcode_failure() {
    let records: Records = Mutex::new(Vec::new());
    let user = &records as *const Records as *mut c_void;

    let mut src = HostIo::new(b"garbage".to_vec());
    let mut dst = HostIo::new(Vec::new());
    let s = ib_source_new(
        &mut *src as *mut HostIo as *mut c_void,
        Some(host_read),
        Some(host_seek),
        None,
    );
    let t = ib_target_new(&mut *dst as *mut HostIo as *mut c_void, Some(host_write), None);

    let rc = unsafe { ib_transcode_with_log(s, t, std::ptr::null(), Some(host_log), user) };
    assert_eq!(rc, -1);
    let records = records.lock().unwrap();
    assert!(
        records
            .iter()
            .any(|(_, level, msg)| *level == IB_LOG_ERROR && msg.contains("ib_transcode"))
    );
}
