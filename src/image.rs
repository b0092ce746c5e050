//! Camera plane packing
//!
//! Camera frames arrive as three independent planes, each with its own row
//! stride and pixel stride (chroma is often an interleaved view with pixel
//! stride 2). These helpers gather a cropped region into one contiguous
//! I420 or NV21 buffer that the dispatcher can address.

use crate::error::{BridgeError, Result};
use crate::layout::{check_dimensions, i420_size, LayoutError, YuvLayout};

/// One strided plane of a camera frame
#[derive(Debug, Clone, Copy)]
pub struct PlaneSource<'a> {
    pub data: &'a [u8],
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive samples in a row
    pub pixel_stride: usize,
}

impl<'a> PlaneSource<'a> {
    pub fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Plane with no padding between samples or rows
    pub fn tight(data: &'a [u8], width: usize) -> Self {
        Self::new(data, width, 1)
    }
}

/// Region of the luma plane to keep, in luma samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    pub fn new(left: usize, top: usize, width: usize, height: usize) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whole frame
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }
}

fn crop_dimensions(crop: &CropRect) -> Result<(usize, usize)> {
    let width = i32::try_from(crop.width).unwrap_or(i32::MAX);
    let height = i32::try_from(crop.height).unwrap_or(i32::MAX);
    Ok(check_dimensions(width, height)?)
}

/// First byte read from `plane` and one past the last, for a `w`x`h` region
/// starting at (`left`, `top`)
fn plane_span(
    plane: &PlaneSource<'_>,
    pixel_stride: usize,
    left: usize,
    top: usize,
    w: usize,
    h: usize,
) -> Option<(usize, usize)> {
    let start = plane
        .row_stride
        .checked_mul(top)?
        .checked_add(pixel_stride.checked_mul(left)?)?;
    let end = plane
        .row_stride
        .checked_mul(h - 1)?
        .checked_add(pixel_stride.checked_mul(w - 1)?)?
        .checked_add(start)?
        .checked_add(1)?;
    Some((start, end))
}

/// Where plane `index` lands in the packed output and the step between samples
fn placement(index: usize, target: YuvLayout, luma_len: usize) -> (usize, usize) {
    match (index, target) {
        (0, _) => (0, 1),
        (1, YuvLayout::Planar420) => (luma_len, 1),
        // NV21 stores V first
        (1, YuvLayout::SemiPlanar420) => (luma_len + 1, 2),
        (_, YuvLayout::Planar420) => (luma_len * 5 / 4, 1),
        (_, YuvLayout::SemiPlanar420) => (luma_len, 2),
    }
}

/// Pack the cropped region of `planes` (Y, U, V) into `dst` as `target`.
///
/// Returns the number of bytes written, `crop.width * crop.height * 3 / 2`.
pub fn pack_planes(
    planes: &[PlaneSource<'_>; 3],
    crop: CropRect,
    target: YuvLayout,
    dst: &mut [u8],
) -> Result<usize> {
    let (width, height) = crop_dimensions(&crop)?;
    let required = i420_size(width, height);
    if dst.len() < required {
        return Err(LayoutError::BufferTooSmall {
            required,
            actual: dst.len(),
        }
        .into());
    }

    for (index, plane) in planes.iter().enumerate() {
        let shift = if index == 0 { 0 } else { 1 };
        let (w, h) = (width >> shift, height >> shift);
        let pixel_stride = plane.pixel_stride.max(1);
        let (start, needed) = plane_span(
            plane,
            pixel_stride,
            crop.left >> shift,
            crop.top >> shift,
            w,
            h,
        )
        .ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "plane {} strides {}/{} overflow the address space",
                index, plane.row_stride, pixel_stride
            ))
        })?;
        if plane.data.len() < needed {
            return Err(LayoutError::BufferTooSmall {
                required: needed,
                actual: plane.data.len(),
            }
            .into());
        }

        let (mut offset, out_stride) = placement(index, target, width * height);
        for row in 0..h {
            let base = start + row * plane.row_stride;
            if pixel_stride == 1 && out_stride == 1 {
                dst[offset..offset + w].copy_from_slice(&plane.data[base..base + w]);
                offset += w;
            } else {
                for col in 0..w {
                    dst[offset] = plane.data[base + col * pixel_stride];
                    offset += out_stride;
                }
            }
        }
    }

    tracing::trace!(
        "Packed {}x{} crop at ({}, {}) as {}",
        width,
        height,
        crop.left,
        crop.top,
        target
    );
    Ok(required)
}

/// Allocating form of [`pack_planes`]
pub fn pack_planes_to_vec(
    planes: &[PlaneSource<'_>; 3],
    crop: CropRect,
    target: YuvLayout,
) -> Result<Vec<u8>> {
    let (width, height) = crop_dimensions(&crop)?;
    let mut out = vec![0u8; i420_size(width, height)];
    pack_planes(planes, crop, target, &mut out)?;
    Ok(out)
}

/// Copy three tight planes back to back into `dst`
pub fn concat_planes(y: &[u8], u: &[u8], v: &[u8], dst: &mut [u8]) -> Result<usize> {
    let total = y.len() + u.len() + v.len();
    if dst.len() < total {
        return Err(LayoutError::BufferTooSmall {
            required: total,
            actual: dst.len(),
        }
        .into());
    }
    let (dst_y, rest) = dst.split_at_mut(y.len());
    let (dst_u, rest) = rest.split_at_mut(u.len());
    dst_y.copy_from_slice(y);
    dst_u.copy_from_slice(u);
    rest[..v.len()].copy_from_slice(v);
    Ok(total)
}
