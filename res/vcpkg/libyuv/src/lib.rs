//! libyuv bindings for YUV 4:2:0 transform primitives
//!
//! This crate provides safe Rust bindings to the subset of Google's libyuv
//! used by yuv-bridge: packed RGB to I420, I420 <-> NV21, and I420
//! rotation, mirroring and scaling.
//!
//! Every function takes its planes as slices with explicit strides, so the
//! caller decides where each plane lives inside its buffer. Slices are
//! checked against the span of their rows before libyuv touches them.
//!
//! # Example
//!
//! ```ignore
//! use libyuv::{i420_mirror, SrcPlane, DstPlane};
//!
//! let (y, rest) = src.split_at(w * h);
//! let (u, v) = rest.split_at(w * h / 4);
//! // ...split dst the same way...
//! i420_mirror(
//!     SrcPlane::new(y, w as i32), SrcPlane::new(u, w as i32 / 2), SrcPlane::new(v, w as i32 / 2),
//!     DstPlane::new(dy, w as i32), DstPlane::new(du, w as i32 / 2), DstPlane::new(dv, w as i32 / 2),
//!     w as i32, h as i32,
//! ).unwrap();
//! ```

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]
#![allow(dead_code)]

use std::fmt;
// Include auto-generated FFI bindings
include!(concat!(env!("OUT_DIR"), "/yuv_ffi.rs"));

// ============================================================================
// Error types
// ============================================================================

/// Error type for libyuv operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvError {
    /// Width or height is not positive
    InvalidDimensions,
    /// A plane slice is shorter than the span of its rows, or a stride is
    /// shorter than a row
    BufferTooSmall,
    /// libyuv function returned an error code
    ConversionFailed(i32),
}

impl YuvError {
    /// Integer code in libyuv's convention (0 ok, negative failure)
    pub fn code(&self) -> i32 {
        match self {
            YuvError::InvalidDimensions | YuvError::BufferTooSmall => -1,
            YuvError::ConversionFailed(code) => *code,
        }
    }
}

impl fmt::Display for YuvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YuvError::InvalidDimensions => write!(f, "Invalid dimensions"),
            YuvError::BufferTooSmall => write!(f, "Plane buffer too small"),
            YuvError::ConversionFailed(code) => write!(f, "Conversion failed with code {}", code),
        }
    }
}

impl std::error::Error for YuvError {}

pub type Result<T> = std::result::Result<T, YuvError>;

/// Macro to call libyuv functions and check return value
macro_rules! call_yuv {
    ($func:expr) => {{
        let ret = unsafe { $func };
        if ret != 0 {
            return Err(YuvError::ConversionFailed(ret));
        }
        Ok(())
    }};
}

// ============================================================================
// Plane views
// ============================================================================

/// Read-only plane handed to libyuv
#[derive(Debug, Clone, Copy)]
pub struct SrcPlane<'a> {
    pub data: &'a [u8],
    pub stride: i32,
}

impl<'a> SrcPlane<'a> {
    pub fn new(data: &'a [u8], stride: i32) -> Self {
        Self { data, stride }
    }
}

/// Writable plane handed to libyuv
#[derive(Debug)]
pub struct DstPlane<'a> {
    pub data: &'a mut [u8],
    pub stride: i32,
}

impl<'a> DstPlane<'a> {
    pub fn new(data: &'a mut [u8], stride: i32) -> Self {
        Self { data, stride }
    }
}

/// Bytes a plane of `rows` rows must span: every row but the last at full
/// stride, the last only `row_bytes` long
#[inline]
fn plane_span(stride: i32, row_bytes: usize, rows: i32) -> Option<usize> {
    if rows <= 0 {
        return Some(0);
    }
    (stride.unsigned_abs() as usize)
        .checked_mul(rows as usize - 1)?
        .checked_add(row_bytes)
}

/// Samples in a subsampled chroma row or column
#[inline]
const fn half(n: i32) -> i32 {
    (n + 1) / 2
}

fn check_dims(width: i32, height: i32) -> Result<()> {
    if width <= 0 || height <= 0 {
        return Err(YuvError::InvalidDimensions);
    }
    Ok(())
}

fn check_plane(len: usize, stride: i32, row_bytes: usize, rows: i32) -> Result<()> {
    if (stride.unsigned_abs() as usize) < row_bytes {
        return Err(YuvError::BufferTooSmall);
    }
    match plane_span(stride, row_bytes, rows) {
        Some(span) if len >= span => Ok(()),
        _ => Err(YuvError::BufferTooSmall),
    }
}

fn check_src(plane: &SrcPlane<'_>, row_bytes: usize, rows: i32) -> Result<()> {
    check_plane(plane.data.len(), plane.stride, row_bytes, rows)
}

fn check_dst(plane: &DstPlane<'_>, row_bytes: usize, rows: i32) -> Result<()> {
    check_plane(plane.data.len(), plane.stride, row_bytes, rows)
}

fn check_src_i420(
    y: &SrcPlane<'_>,
    u: &SrcPlane<'_>,
    v: &SrcPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_src(y, width as usize, height)?;
    check_src(u, half(width) as usize, half(height))?;
    check_src(v, half(width) as usize, half(height))
}

fn check_dst_i420(
    y: &DstPlane<'_>,
    u: &DstPlane<'_>,
    v: &DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dst(y, width as usize, height)?;
    check_dst(u, half(width) as usize, half(height))?;
    check_dst(v, half(width) as usize, half(height))
}

// ============================================================================
// Packed RGB -> I420
// Note: libyuv ABGR = RGBA in memory on little-endian systems
// ============================================================================

/// Convert RGBA (8 bits per channel) to I420
pub fn abgr_to_i420(
    src: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src(&src, width as usize * 4, height)?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, width, height)?;

    call_yuv!(ABGRToI420(
        src.data.as_ptr(),
        src.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
    ))
}

/// Convert 16-bit ARGB4444 to I420
pub fn argb4444_to_i420(
    src: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src(&src, width as usize * 2, height)?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, width, height)?;

    call_yuv!(ARGB4444ToI420(
        src.data.as_ptr(),
        src.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
    ))
}

/// Convert 16-bit RGB565 to I420
pub fn rgb565_to_i420(
    src: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src(&src, width as usize * 2, height)?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, width, height)?;

    call_yuv!(RGB565ToI420(
        src.data.as_ptr(),
        src.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
    ))
}

// ============================================================================
// I420 <-> NV21
// ============================================================================

/// Convert I420 to NV21 (Y plane + interleaved VU plane)
pub fn i420_to_nv21(
    src_y: SrcPlane<'_>,
    src_u: SrcPlane<'_>,
    src_v: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_vu: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src_i420(&src_y, &src_u, &src_v, width, height)?;
    check_dst(&dst_y, width as usize, height)?;
    check_dst(&dst_vu, half(width) as usize * 2, half(height))?;

    call_yuv!(I420ToNV21(
        src_y.data.as_ptr(),
        src_y.stride,
        src_u.data.as_ptr(),
        src_u.stride,
        src_v.data.as_ptr(),
        src_v.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_vu.data.as_mut_ptr(),
        dst_vu.stride,
        width,
        height,
    ))
}

/// Convert NV21 to I420
pub fn nv21_to_i420(
    src_y: SrcPlane<'_>,
    src_vu: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src(&src_y, width as usize, height)?;
    check_src(&src_vu, half(width) as usize * 2, half(height))?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, width, height)?;

    call_yuv!(NV21ToI420(
        src_y.data.as_ptr(),
        src_y.stride,
        src_vu.data.as_ptr(),
        src_vu.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
    ))
}

// ============================================================================
// Rotation / mirroring
// ============================================================================

/// Rotate an I420 frame
///
/// `width`/`height` describe the source. For 90 and 270 degrees the
/// destination planes hold `width` rows of `height` samples. `mode` is passed
/// through unchanged; libyuv rejects values other than 0/90/180/270.
#[allow(clippy::too_many_arguments)]
pub fn i420_rotate(
    src_y: SrcPlane<'_>,
    src_u: SrcPlane<'_>,
    src_v: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
    mode: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src_i420(&src_y, &src_u, &src_v, width, height)?;
    let (dst_width, dst_height) = if mode == 90 || mode == 270 {
        (height, width)
    } else {
        (width, height)
    };
    check_dst_i420(&dst_y, &dst_u, &dst_v, dst_width, dst_height)?;

    call_yuv!(I420Rotate(
        src_y.data.as_ptr(),
        src_y.stride,
        src_u.data.as_ptr(),
        src_u.stride,
        src_v.data.as_ptr(),
        src_v.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
        mode,
    ))
}

/// Mirror an I420 frame horizontally
pub fn i420_mirror(
    src_y: SrcPlane<'_>,
    src_u: SrcPlane<'_>,
    src_v: SrcPlane<'_>,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    width: i32,
    height: i32,
) -> Result<()> {
    check_dims(width, height)?;
    check_src_i420(&src_y, &src_u, &src_v, width, height)?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, width, height)?;

    call_yuv!(I420Mirror(
        src_y.data.as_ptr(),
        src_y.stride,
        src_u.data.as_ptr(),
        src_u.stride,
        src_v.data.as_ptr(),
        src_v.stride,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        width,
        height,
    ))
}

// ============================================================================
// Scaling
// ============================================================================

/// Scale an I420 frame
///
/// `filter` follows libyuv's FilterMode: 0 none, 1 linear, 2 bilinear, 3 box.
#[allow(clippy::too_many_arguments)]
pub fn i420_scale(
    src_y: SrcPlane<'_>,
    src_u: SrcPlane<'_>,
    src_v: SrcPlane<'_>,
    src_width: i32,
    src_height: i32,
    dst_y: DstPlane<'_>,
    dst_u: DstPlane<'_>,
    dst_v: DstPlane<'_>,
    dst_width: i32,
    dst_height: i32,
    filter: i32,
) -> Result<()> {
    check_dims(src_width, src_height)?;
    check_dims(dst_width, dst_height)?;
    check_src_i420(&src_y, &src_u, &src_v, src_width, src_height)?;
    check_dst_i420(&dst_y, &dst_u, &dst_v, dst_width, dst_height)?;

    call_yuv!(I420Scale(
        src_y.data.as_ptr(),
        src_y.stride,
        src_u.data.as_ptr(),
        src_u.stride,
        src_v.data.as_ptr(),
        src_v.stride,
        src_width,
        src_height,
        dst_y.data.as_mut_ptr(),
        dst_y.stride,
        dst_u.data.as_mut_ptr(),
        dst_u.stride,
        dst_v.data.as_mut_ptr(),
        dst_v.stride,
        dst_width,
        dst_height,
        filter,
    ))
}
