//! YUV 4:2:0 plane layout
//!
//! Derives where each plane of an I420 (planar) or NV21 (semi-planar) frame
//! lives inside one flat buffer, and splits that buffer into non-overlapping
//! plane views. Nothing here allocates or touches pixel data.
//!
//! Layouts on the wire:
//! - Planar420: `Y(w*h) | U(w*h/4) | V(w*h/4)`
//! - SemiPlanar420: `Y(w*h) | VU(w*h/2)`, V first in each pair

use std::fmt;

use thiserror::Error;

/// Errors raised while deriving a layout
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Odd dimensions {width}x{height} (4:2:0 needs even width and height)")]
    OddDimensions { width: i32, height: i32 },

    #[error("Buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Layout is {actual}, expected {expected}")]
    FormatMismatch { expected: YuvLayout, actual: YuvLayout },
}

/// YUV 4:2:0 storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YuvLayout {
    /// Three planes: Y, U, V (I420)
    Planar420,
    /// Two planes: Y and interleaved VU (NV21)
    SemiPlanar420,
}

impl fmt::Display for YuvLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YuvLayout::Planar420 => write!(f, "I420"),
            YuvLayout::SemiPlanar420 => write!(f, "NV21"),
        }
    }
}

/// Scan direction of the stored rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Rows are `width` samples long
    #[default]
    Upright,
    /// Rows are `height` samples long (90/270 degree rotation target)
    Rotated,
}

impl Orientation {
    /// Orientation of a rotation destination
    pub fn for_rotation(degrees: i32) -> Self {
        match degrees {
            90 | 270 => Orientation::Rotated,
            _ => Orientation::Upright,
        }
    }

    pub fn is_rotated(&self) -> bool {
        matches!(self, Orientation::Rotated)
    }
}

/// Position and shape of one plane inside the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSpec {
    /// Byte offset from the buffer origin
    pub offset: usize,
    /// Byte extent of the plane
    pub len: usize,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    /// Number of stored rows
    pub rows: usize,
}

impl PlaneSpec {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChromaSpec {
    Planar { u: PlaneSpec, v: PlaneSpec },
    SemiPlanar { vu: PlaneSpec },
}

/// Plane geometry of a 4:2:0 frame over a flat buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    format: YuvLayout,
    orientation: Orientation,
    width: usize,
    height: usize,
    y: PlaneSpec,
    chroma: ChromaSpec,
}

/// Bytes needed for an I420 frame (same rule the managed wrapper allocates with)
#[inline]
pub const fn i420_size(width: usize, height: usize) -> usize {
    width * height * 3 / 2
}

/// Bytes needed for an NV21 frame
#[inline]
pub const fn nv21_size(width: usize, height: usize) -> usize {
    width * height * 3 / 2
}

/// Validate frame dimensions for a 4:2:0 layout
pub fn check_dimensions(width: i32, height: i32) -> Result<(usize, usize), LayoutError> {
    if width <= 0 || height <= 0 {
        return Err(LayoutError::InvalidDimensions { width, height });
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(LayoutError::OddDimensions { width, height });
    }
    let (w, h) = (width as usize, height as usize);
    if w.checked_mul(h).and_then(|p| p.checked_mul(3)).is_none() {
        return Err(LayoutError::InvalidDimensions { width, height });
    }
    Ok((w, h))
}

/// Derive the plane layout of a `width`x`height` frame stored in a buffer of
/// `buffer_len` bytes.
///
/// `width`/`height` are always the declared (pre-rotation) pair. With
/// [`Orientation::Rotated`] the luma stride becomes `height` and the plane
/// holds `width` rows; chroma strides follow at half the luma stride.
pub fn compute_layout(
    buffer_len: usize,
    width: i32,
    height: i32,
    format: YuvLayout,
    orientation: Orientation,
) -> Result<PlaneLayout, LayoutError> {
    let (w, h) = check_dimensions(width, height)?;

    let luma_len = w * h;
    let chroma_len = luma_len / 4;
    let (y_stride, y_rows) = match orientation {
        Orientation::Upright => (w, h),
        Orientation::Rotated => (h, w),
    };

    let y = PlaneSpec {
        offset: 0,
        len: luma_len,
        stride: y_stride,
        rows: y_rows,
    };

    let chroma = match format {
        YuvLayout::Planar420 => {
            let u = PlaneSpec {
                offset: y.end(),
                len: chroma_len,
                stride: y_stride / 2,
                rows: y_rows / 2,
            };
            let v = PlaneSpec {
                offset: u.end(),
                len: chroma_len,
                stride: y_stride / 2,
                rows: y_rows / 2,
            };
            ChromaSpec::Planar { u, v }
        }
        YuvLayout::SemiPlanar420 => ChromaSpec::SemiPlanar {
            vu: PlaneSpec {
                offset: y.end(),
                len: chroma_len * 2,
                stride: y_stride,
                rows: y_rows / 2,
            },
        },
    };

    let layout = PlaneLayout {
        format,
        orientation,
        width: w,
        height: h,
        y,
        chroma,
    };

    let required = layout.required_len();
    if buffer_len < required {
        return Err(LayoutError::BufferTooSmall {
            required,
            actual: buffer_len,
        });
    }

    Ok(layout)
}

impl PlaneLayout {
    pub fn format(&self) -> YuvLayout {
        self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Declared (pre-rotation) dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Dimensions of the image as stored (swapped for rotated layouts)
    pub fn stored_dimensions(&self) -> (usize, usize) {
        (self.y.stride, self.y.rows)
    }

    pub fn y(&self) -> PlaneSpec {
        self.y
    }

    pub fn y_stride(&self) -> usize {
        self.y.stride
    }

    /// U plane (planar layouts only)
    pub fn u(&self) -> Option<PlaneSpec> {
        match self.chroma {
            ChromaSpec::Planar { u, .. } => Some(u),
            ChromaSpec::SemiPlanar { .. } => None,
        }
    }

    /// V plane (planar layouts only)
    pub fn v(&self) -> Option<PlaneSpec> {
        match self.chroma {
            ChromaSpec::Planar { v, .. } => Some(v),
            ChromaSpec::SemiPlanar { .. } => None,
        }
    }

    /// Interleaved VU plane (semi-planar layouts only)
    pub fn vu(&self) -> Option<PlaneSpec> {
        match self.chroma {
            ChromaSpec::SemiPlanar { vu } => Some(vu),
            ChromaSpec::Planar { .. } => None,
        }
    }

    /// All planes in storage order
    pub fn planes(&self) -> Vec<PlaneSpec> {
        match self.chroma {
            ChromaSpec::Planar { u, v } => vec![self.y, u, v],
            ChromaSpec::SemiPlanar { vu } => vec![self.y, vu],
        }
    }

    /// Total bytes the planes span
    pub fn required_len(&self) -> usize {
        match self.chroma {
            ChromaSpec::Planar { v, .. } => v.end(),
            ChromaSpec::SemiPlanar { vu } => vu.end(),
        }
    }

    fn mismatch(&self, expected: YuvLayout) -> LayoutError {
        LayoutError::FormatMismatch {
            expected,
            actual: self.format,
        }
    }

    fn check_len(&self, len: usize) -> Result<(), LayoutError> {
        let required = self.required_len();
        if len < required {
            return Err(LayoutError::BufferTooSmall {
                required,
                actual: len,
            });
        }
        Ok(())
    }

    /// Split `buf` into read-only I420 plane views
    pub fn split_planar<'a>(&self, buf: &'a [u8]) -> Result<PlanarRef<'a>, LayoutError> {
        let ChromaSpec::Planar { u, v } = self.chroma else {
            return Err(self.mismatch(YuvLayout::Planar420));
        };
        self.check_len(buf.len())?;
        let (y_data, rest) = buf.split_at(self.y.len);
        let (u_data, rest) = rest.split_at(u.len);
        let v_data = &rest[..v.len];
        Ok(PlanarRef {
            y: Plane::new(y_data, self.y.stride),
            u: Plane::new(u_data, u.stride),
            v: Plane::new(v_data, v.stride),
        })
    }

    /// Split `buf` into writable I420 plane views
    pub fn split_planar_mut<'a>(&self, buf: &'a mut [u8]) -> Result<PlanarMut<'a>, LayoutError> {
        let ChromaSpec::Planar { u, v } = self.chroma else {
            return Err(self.mismatch(YuvLayout::Planar420));
        };
        self.check_len(buf.len())?;
        let (y_data, rest) = buf.split_at_mut(self.y.len);
        let (u_data, rest) = rest.split_at_mut(u.len);
        let v_data = &mut rest[..v.len];
        Ok(PlanarMut {
            y: PlaneMut::new(y_data, self.y.stride),
            u: PlaneMut::new(u_data, u.stride),
            v: PlaneMut::new(v_data, v.stride),
        })
    }

    /// Split `buf` into read-only NV21 plane views
    pub fn split_semi_planar<'a>(&self, buf: &'a [u8]) -> Result<SemiPlanarRef<'a>, LayoutError> {
        let ChromaSpec::SemiPlanar { vu } = self.chroma else {
            return Err(self.mismatch(YuvLayout::SemiPlanar420));
        };
        self.check_len(buf.len())?;
        let (y_data, rest) = buf.split_at(self.y.len);
        Ok(SemiPlanarRef {
            y: Plane::new(y_data, self.y.stride),
            vu: Plane::new(&rest[..vu.len], vu.stride),
        })
    }

    /// Split `buf` into writable NV21 plane views
    pub fn split_semi_planar_mut<'a>(
        &self,
        buf: &'a mut [u8],
    ) -> Result<SemiPlanarMut<'a>, LayoutError> {
        let ChromaSpec::SemiPlanar { vu } = self.chroma else {
            return Err(self.mismatch(YuvLayout::SemiPlanar420));
        };
        self.check_len(buf.len())?;
        let (y_data, rest) = buf.split_at_mut(self.y.len);
        Ok(SemiPlanarMut {
            y: PlaneMut::new(y_data, self.y.stride),
            vu: PlaneMut::new(&mut rest[..vu.len], vu.stride),
        })
    }
}

// ============================================================================
// Plane views
// ============================================================================

/// Read-only view of one plane
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    /// Row `index` trimmed to `width` samples
    pub fn row(&self, index: usize, width: usize) -> &'a [u8] {
        let start = index * self.stride;
        &self.data[start..start + width]
    }
}

/// Writable view of one plane
#[derive(Debug)]
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
}

impl<'a> PlaneMut<'a> {
    pub fn new(data: &'a mut [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    pub fn row_mut(&mut self, index: usize, width: usize) -> &mut [u8] {
        let start = index * self.stride;
        &mut self.data[start..start + width]
    }
}

/// I420 planes of a source buffer
#[derive(Debug, Clone, Copy)]
pub struct PlanarRef<'a> {
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
}

/// I420 planes of a destination buffer
#[derive(Debug)]
pub struct PlanarMut<'a> {
    pub y: PlaneMut<'a>,
    pub u: PlaneMut<'a>,
    pub v: PlaneMut<'a>,
}

/// NV21 planes of a source buffer
#[derive(Debug, Clone, Copy)]
pub struct SemiPlanarRef<'a> {
    pub y: Plane<'a>,
    pub vu: Plane<'a>,
}

/// NV21 planes of a destination buffer
#[derive(Debug)]
pub struct SemiPlanarMut<'a> {
    pub y: PlaneMut<'a>,
    pub vu: PlaneMut<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sizes() {
        assert_eq!(i420_size(1920, 1080), 1920 * 1080 * 3 / 2);
        assert_eq!(nv21_size(4, 2), 12);
    }

    #[test]
    fn test_planar_layout_4x2() {
        let layout = compute_layout(12, 4, 2, YuvLayout::Planar420, Orientation::Upright).unwrap();
        assert_eq!(layout.required_len(), 12);
        assert_eq!(
            layout.y(),
            PlaneSpec {
                offset: 0,
                len: 8,
                stride: 4,
                rows: 2
            }
        );
        let u = layout.u().unwrap();
        let v = layout.v().unwrap();
        assert_eq!((u.offset, u.len, u.stride, u.rows), (8, 2, 2, 1));
        assert_eq!((v.offset, v.len, v.stride, v.rows), (10, 2, 2, 1));
        assert!(layout.vu().is_none());
    }

    #[test]
    fn test_rotated_layout_uses_pre_rotation_height() {
        let layout = compute_layout(12, 4, 2, YuvLayout::Planar420, Orientation::Rotated).unwrap();
        assert_eq!(layout.y_stride(), 2);
        assert_eq!(layout.y().rows, 4);
        assert_eq!(layout.u().unwrap().stride, 1);
        assert_eq!(layout.v().unwrap().stride, 1);
        assert_eq!(layout.dimensions(), (4, 2));
        assert_eq!(layout.stored_dimensions(), (2, 4));
        // Offsets and extents do not depend on orientation
        assert_eq!(layout.u().unwrap().offset, 8);
        assert_eq!(layout.v().unwrap().offset, 10);
    }

    #[test]
    fn test_semi_planar_layout() {
        let layout =
            compute_layout(24, 4, 4, YuvLayout::SemiPlanar420, Orientation::Upright).unwrap();
        let vu = layout.vu().unwrap();
        assert_eq!((vu.offset, vu.len, vu.stride, vu.rows), (16, 8, 4, 2));
        assert_eq!(layout.required_len(), 24);
        assert_eq!(layout.planes().len(), 2);
    }

    #[test]
    fn test_orientation_for_rotation() {
        assert_eq!(Orientation::for_rotation(90), Orientation::Rotated);
        assert_eq!(Orientation::for_rotation(270), Orientation::Rotated);
        assert_eq!(Orientation::for_rotation(0), Orientation::Upright);
        assert_eq!(Orientation::for_rotation(180), Orientation::Upright);
        assert_eq!(Orientation::for_rotation(45), Orientation::Upright);
    }

    #[test]
    fn test_buffer_too_small() {
        let err = compute_layout(11, 4, 2, YuvLayout::Planar420, Orientation::Upright).unwrap_err();
        assert_eq!(
            err,
            LayoutError::BufferTooSmall {
                required: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            compute_layout(100, 0, 2, YuvLayout::Planar420, Orientation::Upright),
            Err(LayoutError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            compute_layout(100, 4, -2, YuvLayout::Planar420, Orientation::Upright),
            Err(LayoutError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            compute_layout(100, 3, 2, YuvLayout::Planar420, Orientation::Upright),
            Err(LayoutError::OddDimensions { .. })
        ));
        assert!(matches!(
            compute_layout(100, 4, 5, YuvLayout::SemiPlanar420, Orientation::Upright),
            Err(LayoutError::OddDimensions { .. })
        ));
    }

    #[test]
    fn test_split_planar_views() {
        let buf: Vec<u8> = (0..12).collect();
        let layout = compute_layout(buf.len(), 4, 2, YuvLayout::Planar420, Orientation::Upright)
            .unwrap();
        let planes = layout.split_planar(&buf).unwrap();
        assert_eq!(planes.y.data, &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(planes.u.data, &[8, 9]);
        assert_eq!(planes.v.data, &[10, 11]);
        assert_eq!(planes.y.row(1, 4), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_split_ignores_trailing_bytes() {
        let mut buf = vec![0u8; 30];
        let layout =
            compute_layout(buf.len(), 4, 4, YuvLayout::SemiPlanar420, Orientation::Upright)
                .unwrap();
        let planes = layout.split_semi_planar_mut(&mut buf).unwrap();
        assert_eq!(planes.y.data.len(), 16);
        assert_eq!(planes.vu.data.len(), 8);
    }

    #[test]
    fn test_split_format_mismatch() {
        let buf = vec![0u8; 12];
        let layout =
            compute_layout(buf.len(), 4, 2, YuvLayout::SemiPlanar420, Orientation::Upright)
                .unwrap();
        assert_eq!(
            layout.split_planar(&buf).unwrap_err(),
            LayoutError::FormatMismatch {
                expected: YuvLayout::Planar420,
                actual: YuvLayout::SemiPlanar420
            }
        );
    }

    #[test]
    fn test_split_rejects_shorter_buffer() {
        let layout = compute_layout(12, 4, 2, YuvLayout::Planar420, Orientation::Upright).unwrap();
        let short = vec![0u8; 6];
        assert!(matches!(
            layout.split_planar(&short),
            Err(LayoutError::BufferTooSmall { .. })
        ));
    }
}
