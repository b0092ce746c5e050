//! Portable software engine
//!
//! Plain Rust kernels following libyuv's conventions: BT.601 limited-range
//! RGB -> YUV coefficients, 2x2 averaged chroma, clockwise rotation, and
//! `-1` for arguments the kernel cannot handle. Slow but dependency-free,
//! which makes it the default when libyuv is not linked.

use super::{EngineError, EngineResult, FilterMode, PackedSource, PixelEngine, RotationMode};
use crate::layout::{Plane, PlaneMut, PlanarMut, PlanarRef, SemiPlanarMut, SemiPlanarRef};

/// libyuv's return value for rejected arguments
const ERR_INVALID: i32 = -1;

/// Pure Rust implementation of the engine primitives
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareEngine;

impl SoftwareEngine {
    pub fn new() -> Self {
        Self
    }
}

fn invalid() -> EngineError {
    EngineError::new(ERR_INVALID)
}

fn dims(width: i32, height: i32) -> Result<(usize, usize), EngineError> {
    if width <= 0 || height <= 0 {
        return Err(invalid());
    }
    Ok((width as usize, height as usize))
}

#[inline]
fn half(n: usize) -> usize {
    (n + 1) / 2
}

/// Ensure `rows` rows of `row_width` bytes fit at `stride` inside `len`
fn check_span(len: usize, stride: usize, row_width: usize, rows: usize) -> EngineResult {
    if rows == 0 || row_width == 0 {
        return Ok(());
    }
    if stride < row_width || len < stride * (rows - 1) + row_width {
        return Err(invalid());
    }
    Ok(())
}

fn check_src(plane: &Plane<'_>, row_width: usize, rows: usize) -> EngineResult {
    check_span(plane.data.len(), plane.stride, row_width, rows)
}

fn check_dst(plane: &PlaneMut<'_>, row_width: usize, rows: usize) -> EngineResult {
    check_span(plane.data.len(), plane.stride, row_width, rows)
}

fn check_src_i420(src: &PlanarRef<'_>, w: usize, h: usize) -> EngineResult {
    check_src(&src.y, w, h)?;
    check_src(&src.u, half(w), half(h))?;
    check_src(&src.v, half(w), half(h))
}

fn check_dst_i420(dst: &PlanarMut<'_>, w: usize, h: usize) -> EngineResult {
    check_dst(&dst.y, w, h)?;
    check_dst(&dst.u, half(w), half(h))?;
    check_dst(&dst.v, half(w), half(h))
}

// ============================================================================
// Packed RGB -> I420
// ============================================================================

#[inline]
fn rgb_to_y(r: i32, g: i32, b: i32) -> u8 {
    ((66 * r + 129 * g + 25 * b + 0x1080) >> 8) as u8
}

#[inline]
fn rgb_to_u(r: i32, g: i32, b: i32) -> u8 {
    ((112 * b - 74 * g - 38 * r + 0x8080) >> 8) as u8
}

#[inline]
fn rgb_to_v(r: i32, g: i32, b: i32) -> u8 {
    ((112 * r - 94 * g - 18 * b + 0x8080) >> 8) as u8
}

fn unpack_rgba8888(px: &[u8]) -> [i32; 3] {
    [px[0] as i32, px[1] as i32, px[2] as i32]
}

fn unpack_rgb565(px: &[u8]) -> [i32; 3] {
    let v = u16::from_le_bytes([px[0], px[1]]) as i32;
    let b = v & 0x1f;
    let g = (v >> 5) & 0x3f;
    let r = (v >> 11) & 0x1f;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

fn unpack_argb4444(px: &[u8]) -> [i32; 3] {
    let v = u16::from_le_bytes([px[0], px[1]]) as i32;
    let b = v & 0xf;
    let g = (v >> 4) & 0xf;
    let r = (v >> 8) & 0xf;
    [r * 17, g * 17, b * 17]
}

fn packed_to_i420(
    src: PackedSource<'_>,
    dst: PlanarMut<'_>,
    width: i32,
    height: i32,
    bytes_per_pixel: usize,
    unpack: fn(&[u8]) -> [i32; 3],
) -> EngineResult {
    let (w, h) = dims(width, height)?;
    check_span(src.data.len(), src.stride, w * bytes_per_pixel, h)?;
    check_dst_i420(&dst, w, h)?;

    let PlanarMut {
        y: mut dst_y,
        u: mut dst_u,
        v: mut dst_v,
    } = dst;
    let pixel = |row: usize, col: usize| {
        let start = row * src.stride + col * bytes_per_pixel;
        unpack(&src.data[start..start + bytes_per_pixel])
    };

    for row in 0..h {
        let out = dst_y.row_mut(row, w);
        for (col, sample) in out.iter_mut().enumerate() {
            let [r, g, b] = pixel(row, col);
            *sample = rgb_to_y(r, g, b);
        }
    }

    for crow in 0..half(h) {
        for ccol in 0..half(w) {
            let mut sum = [0i32; 3];
            let mut count = 0i32;
            for row in (crow * 2)..(crow * 2 + 2).min(h) {
                for col in (ccol * 2)..(ccol * 2 + 2).min(w) {
                    let px = pixel(row, col);
                    sum[0] += px[0];
                    sum[1] += px[1];
                    sum[2] += px[2];
                    count += 1;
                }
            }
            let [r, g, b] = sum.map(|s| (s + count / 2) / count);
            dst_u.row_mut(crow, half(w))[ccol] = rgb_to_u(r, g, b);
            dst_v.row_mut(crow, half(w))[ccol] = rgb_to_v(r, g, b);
        }
    }
    Ok(())
}

// ============================================================================
// Plane kernels
// ============================================================================

fn copy_plane(src: &Plane<'_>, dst: &mut PlaneMut<'_>, w: usize, h: usize) {
    for row in 0..h {
        dst.row_mut(row, w).copy_from_slice(src.row(row, w));
    }
}

fn rotate_plane(src: &Plane<'_>, dst: &mut PlaneMut<'_>, w: usize, h: usize, mode: RotationMode) {
    let (ss, ds) = (src.stride, dst.stride);
    for row in 0..h {
        for col in 0..w {
            let sample = src.data[row * ss + col];
            let target = match mode {
                RotationMode::Rotate0 => row * ds + col,
                RotationMode::Rotate90 => col * ds + (h - 1 - row),
                RotationMode::Rotate180 => (h - 1 - row) * ds + (w - 1 - col),
                RotationMode::Rotate270 => (w - 1 - col) * ds + row,
            };
            dst.data[target] = sample;
        }
    }
}

fn mirror_plane(src: &Plane<'_>, dst: &mut PlaneMut<'_>, w: usize, h: usize) {
    for row in 0..h {
        let input = src.row(row, w);
        let output = dst.row_mut(row, w);
        for (out, sample) in output.iter_mut().zip(input.iter().rev()) {
            *out = *sample;
        }
    }
}

/// Nearest source index for destination index `i`, sampling pixel centers
#[inline]
fn point_coord(i: usize, src_len: usize, dst_len: usize) -> usize {
    let pos = ((2 * i + 1) as u64 * src_len as u64) / (2 * dst_len as u64);
    (pos as usize).min(src_len - 1)
}

/// Neighbouring source indices and 16-bit blend fraction for index `i`
#[inline]
fn linear_coord(i: usize, src_len: usize, dst_len: usize) -> (usize, usize, u32) {
    // Wide frames overflow 64 bits once shifted into 16.16 fixed point
    let numerator = ((2 * i + 1) as i128 * src_len as i128) << 16;
    let scaled = numerator / (2 * dst_len as i128) - 32768;
    let max = ((src_len - 1) as i128) << 16;
    let fixed = scaled.clamp(0, max) as i64;
    let i0 = (fixed >> 16) as usize;
    let i1 = (i0 + 1).min(src_len - 1);
    (i0, i1, (fixed & 0xffff) as u32)
}

#[inline]
fn blend(a: u8, b: u8, frac: u32) -> u8 {
    ((a as u32 * (65536 - frac) + b as u32 * frac + 32768) >> 16) as u8
}

/// Source index range covered by destination index `i`
#[inline]
fn box_range(i: usize, src_len: usize, dst_len: usize) -> (usize, usize) {
    let start = (i as u64 * src_len as u64 / dst_len as u64) as usize;
    let end = ((i as u64 + 1) * src_len as u64 / dst_len as u64) as usize;
    let end = end.max(start + 1).min(src_len);
    (start, end)
}

fn scale_plane(
    src: &Plane<'_>,
    sw: usize,
    sh: usize,
    dst: &mut PlaneMut<'_>,
    dw: usize,
    dh: usize,
    filter: FilterMode,
) {
    let filter = match filter {
        // Box only differs from bilinear when shrinking
        FilterMode::Box if dw >= sw && dh >= sh => FilterMode::Bilinear,
        other => other,
    };

    for row in 0..dh {
        for col in 0..dw {
            let value = match filter {
                FilterMode::None => {
                    src.data[point_coord(row, sh, dh) * src.stride + point_coord(col, sw, dw)]
                }
                FilterMode::Linear => {
                    let line = point_coord(row, sh, dh) * src.stride;
                    let (x0, x1, fx) = linear_coord(col, sw, dw);
                    blend(src.data[line + x0], src.data[line + x1], fx)
                }
                FilterMode::Bilinear => {
                    let (y0, y1, fy) = linear_coord(row, sh, dh);
                    let (x0, x1, fx) = linear_coord(col, sw, dw);
                    let (upper, lower) = (y0 * src.stride, y1 * src.stride);
                    let top = blend(src.data[upper + x0], src.data[upper + x1], fx);
                    let bottom = blend(src.data[lower + x0], src.data[lower + x1], fx);
                    blend(top, bottom, fy)
                }
                FilterMode::Box => {
                    let (y_start, y_end) = box_range(row, sh, dh);
                    let (x_start, x_end) = box_range(col, sw, dw);
                    let mut sum = 0u32;
                    for y in y_start..y_end {
                        for x in x_start..x_end {
                            sum += src.data[y * src.stride + x] as u32;
                        }
                    }
                    let count = ((y_end - y_start) * (x_end - x_start)) as u32;
                    ((sum + count / 2) / count) as u8
                }
            };
            dst.data[row * dst.stride + col] = value;
        }
    }
}

impl PixelEngine for SoftwareEngine {
    fn name(&self) -> &'static str {
        "software"
    }

    fn rgba8888_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        packed_to_i420(src, dst, width, height, 4, unpack_rgba8888)
    }

    fn rgba4444_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        packed_to_i420(src, dst, width, height, 2, unpack_argb4444)
    }

    fn rgb565_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        packed_to_i420(src, dst, width, height, 2, unpack_rgb565)
    }

    fn i420_to_nv21(
        &self,
        src: PlanarRef<'_>,
        dst: SemiPlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        let (w, h) = dims(width, height)?;
        let (cw, ch) = (half(w), half(h));
        check_src_i420(&src, w, h)?;
        check_dst(&dst.y, w, h)?;
        check_dst(&dst.vu, cw * 2, ch)?;

        let SemiPlanarMut { mut y, mut vu } = dst;
        copy_plane(&src.y, &mut y, w, h);
        for row in 0..ch {
            let (u, v) = (src.u.row(row, cw), src.v.row(row, cw));
            let out = vu.row_mut(row, cw * 2);
            for (col, pair) in out.chunks_exact_mut(2).enumerate() {
                pair[0] = v[col];
                pair[1] = u[col];
            }
        }
        Ok(())
    }

    fn nv21_to_i420(
        &self,
        src: SemiPlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        let (w, h) = dims(width, height)?;
        let (cw, ch) = (half(w), half(h));
        check_src(&src.y, w, h)?;
        check_src(&src.vu, cw * 2, ch)?;
        check_dst_i420(&dst, w, h)?;

        let PlanarMut {
            mut y,
            mut u,
            mut v,
        } = dst;
        copy_plane(&src.y, &mut y, w, h);
        for row in 0..ch {
            let input = src.vu.row(row, cw * 2);
            for (col, pair) in input.chunks_exact(2).enumerate() {
                v.row_mut(row, cw)[col] = pair[0];
                u.row_mut(row, cw)[col] = pair[1];
            }
        }
        Ok(())
    }

    fn i420_rotate(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
        degrees: i32,
    ) -> EngineResult {
        let (w, h) = dims(width, height)?;
        let (cw, ch) = (half(w), half(h));
        let mode = RotationMode::from_degrees(degrees).ok_or_else(invalid)?;
        check_src_i420(&src, w, h)?;
        if mode.swaps_dimensions() {
            check_dst_i420(&dst, h, w)?;
        } else {
            check_dst_i420(&dst, w, h)?;
        }

        let PlanarMut {
            mut y,
            mut u,
            mut v,
        } = dst;
        rotate_plane(&src.y, &mut y, w, h, mode);
        rotate_plane(&src.u, &mut u, cw, ch, mode);
        rotate_plane(&src.v, &mut v, cw, ch, mode);
        Ok(())
    }

    fn i420_mirror(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        let (w, h) = dims(width, height)?;
        let (cw, ch) = (half(w), half(h));
        check_src_i420(&src, w, h)?;
        check_dst_i420(&dst, w, h)?;

        let PlanarMut {
            mut y,
            mut u,
            mut v,
        } = dst;
        mirror_plane(&src.y, &mut y, w, h);
        mirror_plane(&src.u, &mut u, cw, ch);
        mirror_plane(&src.v, &mut v, cw, ch);
        Ok(())
    }

    fn i420_scale(
        &self,
        src: PlanarRef<'_>,
        src_width: i32,
        src_height: i32,
        dst: PlanarMut<'_>,
        dst_width: i32,
        dst_height: i32,
        filter: FilterMode,
    ) -> EngineResult {
        let (sw, sh) = dims(src_width, src_height)?;
        let (dw, dh) = dims(dst_width, dst_height)?;
        check_src_i420(&src, sw, sh)?;
        check_dst_i420(&dst, dw, dh)?;

        let PlanarMut {
            mut y,
            mut u,
            mut v,
        } = dst;
        scale_plane(&src.y, sw, sh, &mut y, dw, dh, filter);
        let (scw, sch, dcw, dch) = (half(sw), half(sh), half(dw), half(dh));
        scale_plane(&src.u, scw, sch, &mut u, dcw, dch, filter);
        scale_plane(&src.v, scw, sch, &mut v, dcw, dch, filter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{compute_layout, Orientation, YuvLayout};

    fn planar(buf: &[u8], w: i32, h: i32) -> PlanarRef<'_> {
        compute_layout(buf.len(), w, h, YuvLayout::Planar420, Orientation::Upright)
            .unwrap()
            .split_planar(buf)
            .unwrap()
    }

    fn planar_mut(buf: &mut [u8], w: i32, h: i32, orientation: Orientation) -> PlanarMut<'_> {
        compute_layout(buf.len(), w, h, YuvLayout::Planar420, orientation)
            .unwrap()
            .split_planar_mut(buf)
            .unwrap()
    }

    #[test]
    fn test_rgb_to_yuv_reference_values() {
        // libyuv: black -> (16, 128, 128), white -> (235, 128, 128)
        assert_eq!(rgb_to_y(0, 0, 0), 16);
        assert_eq!(rgb_to_u(0, 0, 0), 128);
        assert_eq!(rgb_to_v(0, 0, 0), 128);
        assert_eq!(rgb_to_y(255, 255, 255), 235);
        assert_eq!(rgb_to_u(255, 255, 255), 128);
        assert_eq!(rgb_to_v(255, 255, 255), 128);
    }

    #[test]
    fn test_unpack_16bit_formats() {
        // Pure red in RGB565 is 0xF800
        assert_eq!(unpack_rgb565(&0xF800u16.to_le_bytes()), [255, 0, 0]);
        assert_eq!(unpack_rgb565(&0x07E0u16.to_le_bytes()), [0, 255, 0]);
        // ARGB4444: 0xAR GB
        assert_eq!(unpack_argb4444(&0xF00Fu16.to_le_bytes()), [0, 0, 255]);
        assert_eq!(unpack_argb4444(&0xFF00u16.to_le_bytes()), [255, 0, 0]);
    }

    #[test]
    fn test_rgba_to_i420_white() {
        let rgba = vec![255u8; 4 * 2 * 4];
        let mut out = vec![0u8; 12];
        let engine = SoftwareEngine::new();
        engine
            .rgba8888_to_i420(
                PackedSource {
                    data: &rgba,
                    stride: 16,
                },
                planar_mut(&mut out, 4, 2, Orientation::Upright),
                4,
                2,
            )
            .unwrap();
        assert_eq!(&out[..8], &[235; 8]);
        assert_eq!(&out[8..], &[128; 4]);
    }

    #[test]
    fn test_rotate_90_moves_samples_clockwise() {
        // 4x2 luma:   0 1 2 3      rotated 90:  4 0
        //             4 5 6 7                   5 1
        //                                       6 2
        //                                       7 3
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0u8; 12];
        SoftwareEngine
            .i420_rotate(
                planar(&src, 4, 2),
                planar_mut(&mut dst, 4, 2, Orientation::Rotated),
                4,
                2,
                90,
            )
            .unwrap();
        assert_eq!(&dst[..8], &[4, 0, 5, 1, 6, 2, 7, 3]);
        // 2x1 chroma planes become 1x2
        assert_eq!(&dst[8..10], &[8, 9]);
        assert_eq!(&dst[10..12], &[10, 11]);
    }

    #[test]
    fn test_rotate_rejects_unknown_degrees() {
        let src = vec![0u8; 12];
        let mut dst = vec![0u8; 12];
        let result = SoftwareEngine.i420_rotate(
            planar(&src, 4, 2),
            planar_mut(&mut dst, 4, 2, Orientation::Upright),
            4,
            2,
            45,
        );
        assert_eq!(result, Err(EngineError::new(-1)));
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mirror_reverses_rows() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0u8; 12];
        SoftwareEngine
            .i420_mirror(
                planar(&src, 4, 2),
                planar_mut(&mut dst, 4, 2, Orientation::Upright),
                4,
                2,
            )
            .unwrap();
        assert_eq!(dst, vec![3, 2, 1, 0, 7, 6, 5, 4, 9, 8, 11, 10]);
    }

    #[test]
    fn test_scale_down_box_averages() {
        // 4x4 luma of two 2x2 blocks per row pair, scaled to 2x2
        let mut src = vec![0u8; 24];
        src[..16].copy_from_slice(&[
            10, 20, 100, 100, //
            30, 40, 100, 100, //
            0, 0, 50, 50, //
            0, 0, 50, 50,
        ]);
        let mut dst = vec![0u8; 6];
        SoftwareEngine
            .i420_scale(
                planar(&src, 4, 4),
                4,
                4,
                planar_mut(&mut dst, 2, 2, Orientation::Upright),
                2,
                2,
                FilterMode::Box,
            )
            .unwrap();
        assert_eq!(&dst[..4], &[25, 100, 0, 50]);
    }

    #[test]
    fn test_scale_up_point_sample() {
        let src: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let mut dst = vec![0u8; 24];
        SoftwareEngine
            .i420_scale(
                planar(&src, 2, 2),
                2,
                2,
                planar_mut(&mut dst, 4, 4, Orientation::Upright),
                4,
                4,
                FilterMode::None,
            )
            .unwrap();
        assert_eq!(&dst[..16], &[1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]);
        assert_eq!(&dst[16..20], &[5, 5, 5, 5]);
        assert_eq!(&dst[20..], &[6, 6, 6, 6]);
    }

    #[test]
    fn test_wide_frame_coordinates() {
        let wide = 1usize << 24;
        assert_eq!(linear_coord(wide - 1, wide, wide), (wide - 1, wide - 1, 0));
        assert_eq!(linear_coord(0, wide, wide / 2), (0, 1, 32768));
        let (x0, x1, frac) = linear_coord(wide / 2 - 1, wide, wide / 2);
        assert_eq!((x0, x1, frac), (wide - 2, wide - 1, 32768));
        assert_eq!(box_range(wide / 16 - 1, wide, wide / 16), (wide - 16, wide));
        assert_eq!(point_coord(wide - 1, wide, wide), wide - 1);
    }

    #[test]
    fn test_short_plane_is_rejected() {
        let src = vec![0u8; 12];
        let mut short = vec![0u8; 4];
        let result = SoftwareEngine.i420_mirror(
            planar(&src, 4, 2),
            PlanarMut {
                y: PlaneMut::new(&mut short, 4),
                u: PlaneMut::new(&mut [], 2),
                v: PlaneMut::new(&mut [], 2),
            },
            4,
            2,
        );
        assert_eq!(result, Err(EngineError::new(-1)));
    }
}
