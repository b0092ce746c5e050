//! Operation dispatcher
//!
//! One entry point per transform. Each call is a single synchronous
//! transaction: validate, pin every buffer, derive layouts, run the engine,
//! release, report. Nothing is retained between calls.

use std::fmt;

use crate::access::{with_buffer, Access, HostBuffer, LayoutRequest, SourceImage};
use crate::config::{BridgeConfig, ConfigError, Limits};
use crate::engine::{
    DefaultEngine, FilterMode, PackedSource, PixelEngine, SelectedEngine, SourceFormat,
};
use crate::error::{BridgeError, Result};
use crate::layout::{check_dimensions, i420_size, nv21_size, LayoutError, YuvLayout};

/// Transform requested by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ConvertSourceToPlanar,
    PlanarToSemiPlanar,
    SemiPlanarToPlanar,
    Rotate(i32),
    Mirror,
    Scale(FilterMode),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ConvertSourceToPlanar => write!(f, "convert_source_to_planar"),
            Operation::PlanarToSemiPlanar => write!(f, "planar_to_semi_planar"),
            Operation::SemiPlanarToPlanar => write!(f, "semi_planar_to_planar"),
            Operation::Rotate(degrees) => write!(f, "rotate({})", degrees),
            Operation::Mirror => write!(f, "mirror"),
            Operation::Scale(filter) => write!(f, "scale({:?})", filter),
        }
    }
}

/// Drives a [`PixelEngine`] over host buffers
#[derive(Debug, Clone, Default)]
pub struct OperationDispatcher<E = DefaultEngine> {
    engine: E,
    limits: Limits,
}

impl OperationDispatcher<SelectedEngine> {
    /// Build a dispatcher for the engine and limits named in `config`
    pub fn from_config(config: &BridgeConfig) -> std::result::Result<Self, ConfigError> {
        let engine = SelectedEngine::from_kind(config.engine).ok_or_else(|| {
            ConfigError::EngineUnavailable(format!("{:?}", config.engine).to_lowercase())
        })?;
        Ok(Self::new(engine).with_limits(config.limits))
    }
}

impl<E: PixelEngine> OperationDispatcher<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            limits: Limits::none(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn validate(&self, width: i32, height: i32) -> Result<()> {
        check_dimensions(width, height)?;
        self.limits.check(width, height)
    }

    fn run<T>(
        &self,
        op: Operation,
        width: i32,
        height: i32,
        call: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = call();
        match &result {
            Ok(_) => tracing::debug!(
                op = %op,
                width,
                height,
                engine = self.engine.name(),
                "Transform complete"
            ),
            Err(e) if e.is_local() => tracing::warn!(
                op = %op,
                width,
                height,
                status = e.status(),
                "Rejected: {}",
                e
            ),
            Err(e) => tracing::warn!(
                op = %op,
                width,
                height,
                engine = self.engine.name(),
                status = e.status(),
                "Engine failed"
            ),
        }
        result
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Convert a packed RGB source image into an I420 destination sized from
    /// the source's own dimensions.
    ///
    /// The source lock is held only while the engine runs and is released on
    /// every path, including an unrecognized format.
    pub fn convert_source_to_planar<S, D>(&self, source: &mut S, dst: &mut D) -> Result<()>
    where
        S: SourceImage + ?Sized,
        D: HostBuffer + ?Sized,
    {
        let info = match source.info() {
            Ok(info) => info,
            Err(e) => return self.run(Operation::ConvertSourceToPlanar, 0, 0, || Err(e)),
        };
        let width = i32::try_from(info.width).unwrap_or(i32::MAX);
        let height = i32::try_from(info.height).unwrap_or(i32::MAX);

        self.run(Operation::ConvertSourceToPlanar, width, height, || {
            self.validate(width, height)?;
            let pixels = source.lock()?;
            let format = SourceFormat::from_code(info.format)
                .ok_or(BridgeError::UnsupportedFormat(info.format))?;
            tracing::trace!("Source format {} stride {}", format, info.stride);

            let overflow = || {
                BridgeError::InvalidArgument(format!(
                    "{}x{} {} source with stride {} overflows the address space",
                    width, height, format, info.stride
                ))
            };
            let row_len = (width as usize)
                .checked_mul(format.bytes_per_pixel())
                .ok_or_else(overflow)?;
            let stride = info.stride as usize;
            if stride < row_len {
                return Err(BridgeError::InvalidArgument(format!(
                    "stride {} shorter than a {} row of {} bytes",
                    stride, format, row_len
                )));
            }
            let required = stride
                .checked_mul(height as usize - 1)
                .and_then(|span| span.checked_add(row_len))
                .ok_or_else(overflow)?;
            if pixels.len() < required {
                return Err(LayoutError::BufferTooSmall {
                    required,
                    actual: pixels.len(),
                }
                .into());
            }

            let request = LayoutRequest::upright(width, height, YuvLayout::Planar420);
            with_buffer(dst, Access::Write, request, |layout, bytes| {
                let planes = layout.split_planar_mut(bytes)?;
                let src = PackedSource {
                    data: &pixels,
                    stride,
                };
                match format {
                    SourceFormat::Rgba8888 => {
                        self.engine.rgba8888_to_i420(src, planes, width, height)?
                    }
                    SourceFormat::Rgba4444 => {
                        self.engine.rgba4444_to_i420(src, planes, width, height)?
                    }
                    SourceFormat::Rgb565 => {
                        self.engine.rgb565_to_i420(src, planes, width, height)?
                    }
                }
                Ok(())
            })
        })
    }

    /// I420 -> NV21, both `width`x`height`
    pub fn planar_to_semi_planar<S, D>(
        &self,
        src: &mut S,
        dst: &mut D,
        width: i32,
        height: i32,
    ) -> Result<()>
    where
        S: HostBuffer + ?Sized,
        D: HostBuffer + ?Sized,
    {
        self.run(Operation::PlanarToSemiPlanar, width, height, || {
            self.validate(width, height)?;
            let src_req = LayoutRequest::upright(width, height, YuvLayout::Planar420);
            let dst_req = LayoutRequest::upright(width, height, YuvLayout::SemiPlanar420);
            with_buffer(src, Access::Read, src_req, |src_layout, src_bytes| {
                let input = src_layout.split_planar(src_bytes)?;
                with_buffer(dst, Access::Write, dst_req, |dst_layout, dst_bytes| {
                    let output = dst_layout.split_semi_planar_mut(dst_bytes)?;
                    Ok(self.engine.i420_to_nv21(input, output, width, height)?)
                })
            })
        })
    }

    /// NV21 -> I420, both `width`x`height`
    pub fn semi_planar_to_planar<S, D>(
        &self,
        src: &mut S,
        dst: &mut D,
        width: i32,
        height: i32,
    ) -> Result<()>
    where
        S: HostBuffer + ?Sized,
        D: HostBuffer + ?Sized,
    {
        self.run(Operation::SemiPlanarToPlanar, width, height, || {
            self.validate(width, height)?;
            let src_req = LayoutRequest::upright(width, height, YuvLayout::SemiPlanar420);
            let dst_req = LayoutRequest::upright(width, height, YuvLayout::Planar420);
            with_buffer(src, Access::Read, src_req, |src_layout, src_bytes| {
                let input = src_layout.split_semi_planar(src_bytes)?;
                with_buffer(dst, Access::Write, dst_req, |dst_layout, dst_bytes| {
                    let output = dst_layout.split_planar_mut(dst_bytes)?;
                    Ok(self.engine.nv21_to_i420(input, output, width, height)?)
                })
            })
        })
    }

    /// Rotate an I420 frame clockwise.
    ///
    /// `width`/`height` describe the source. For 90/270 the destination is
    /// stored `height` samples wide. `degrees` goes to the engine as given.
    pub fn rotate_planar<S, D>(
        &self,
        src: &mut S,
        width: i32,
        height: i32,
        dst: &mut D,
        degrees: i32,
    ) -> Result<()>
    where
        S: HostBuffer + ?Sized,
        D: HostBuffer + ?Sized,
    {
        self.run(Operation::Rotate(degrees), width, height, || {
            self.validate(width, height)?;
            let src_req = LayoutRequest::upright(width, height, YuvLayout::Planar420);
            let dst_req = LayoutRequest::rotated(width, height, YuvLayout::Planar420, degrees);
            with_buffer(src, Access::Read, src_req, |src_layout, src_bytes| {
                let input = src_layout.split_planar(src_bytes)?;
                with_buffer(dst, Access::Write, dst_req, |dst_layout, dst_bytes| {
                    let output = dst_layout.split_planar_mut(dst_bytes)?;
                    Ok(self
                        .engine
                        .i420_rotate(input, output, width, height, degrees)?)
                })
            })
        })
    }

    /// Mirror an I420 frame horizontally
    pub fn mirror_planar<S, D>(
        &self,
        src: &mut S,
        width: i32,
        height: i32,
        dst: &mut D,
    ) -> Result<()>
    where
        S: HostBuffer + ?Sized,
        D: HostBuffer + ?Sized,
    {
        self.run(Operation::Mirror, width, height, || {
            self.validate(width, height)?;
            let req = LayoutRequest::upright(width, height, YuvLayout::Planar420);
            with_buffer(src, Access::Read, req, |src_layout, src_bytes| {
                let input = src_layout.split_planar(src_bytes)?;
                with_buffer(dst, Access::Write, req, |dst_layout, dst_bytes| {
                    let output = dst_layout.split_planar_mut(dst_bytes)?;
                    Ok(self.engine.i420_mirror(input, output, width, height)?)
                })
            })
        })
    }

    /// Resample an I420 frame to `dst_width`x`dst_height`
    #[allow(clippy::too_many_arguments)]
    pub fn scale_planar<S, D>(
        &self,
        src: &mut S,
        src_width: i32,
        src_height: i32,
        dst: &mut D,
        dst_width: i32,
        dst_height: i32,
        filter: FilterMode,
    ) -> Result<()>
    where
        S: HostBuffer + ?Sized,
        D: HostBuffer + ?Sized,
    {
        self.run(Operation::Scale(filter), src_width, src_height, || {
            self.validate(src_width, src_height)?;
            self.validate(dst_width, dst_height)?;
            let src_req = LayoutRequest::upright(src_width, src_height, YuvLayout::Planar420);
            let dst_req = LayoutRequest::upright(dst_width, dst_height, YuvLayout::Planar420);
            with_buffer(src, Access::Read, src_req, |src_layout, src_bytes| {
                let input = src_layout.split_planar(src_bytes)?;
                with_buffer(dst, Access::Write, dst_req, |dst_layout, dst_bytes| {
                    let output = dst_layout.split_planar_mut(dst_bytes)?;
                    Ok(self.engine.i420_scale(
                        input, src_width, src_height, output, dst_width, dst_height, filter,
                    )?)
                })
            })
        })
    }

    // ========================================================================
    // Allocating variants
    // ========================================================================

    /// Validate and allocate a destination of `len(width, height)` bytes
    fn alloc(&self, width: i32, height: i32, len: fn(usize, usize) -> usize) -> Result<Vec<u8>> {
        let (w, h) = check_dimensions(width, height)?;
        self.limits.check(width, height)?;
        Ok(vec![0u8; len(w, h)])
    }

    pub fn convert_source_to_planar_to_vec<S>(&self, source: &mut S) -> Result<Vec<u8>>
    where
        S: SourceImage + ?Sized,
    {
        let info = source.info()?;
        let width = i32::try_from(info.width).unwrap_or(i32::MAX);
        let height = i32::try_from(info.height).unwrap_or(i32::MAX);
        let mut out = self.alloc(width, height, i420_size)?;
        self.convert_source_to_planar(source, &mut out)?;
        Ok(out)
    }

    pub fn planar_to_semi_planar_to_vec<S>(
        &self,
        src: &mut S,
        width: i32,
        height: i32,
    ) -> Result<Vec<u8>>
    where
        S: HostBuffer + ?Sized,
    {
        let mut out = self.alloc(width, height, nv21_size)?;
        self.planar_to_semi_planar(src, &mut out, width, height)?;
        Ok(out)
    }

    pub fn semi_planar_to_planar_to_vec<S>(
        &self,
        src: &mut S,
        width: i32,
        height: i32,
    ) -> Result<Vec<u8>>
    where
        S: HostBuffer + ?Sized,
    {
        let mut out = self.alloc(width, height, i420_size)?;
        self.semi_planar_to_planar(src, &mut out, width, height)?;
        Ok(out)
    }

    pub fn rotate_planar_to_vec<S>(
        &self,
        src: &mut S,
        width: i32,
        height: i32,
        degrees: i32,
    ) -> Result<Vec<u8>>
    where
        S: HostBuffer + ?Sized,
    {
        let mut out = self.alloc(width, height, i420_size)?;
        self.rotate_planar(src, width, height, &mut out, degrees)?;
        Ok(out)
    }

    pub fn mirror_planar_to_vec<S>(&self, src: &mut S, width: i32, height: i32) -> Result<Vec<u8>>
    where
        S: HostBuffer + ?Sized,
    {
        let mut out = self.alloc(width, height, i420_size)?;
        self.mirror_planar(src, width, height, &mut out)?;
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn scale_planar_to_vec<S>(
        &self,
        src: &mut S,
        src_width: i32,
        src_height: i32,
        dst_width: i32,
        dst_height: i32,
        filter: FilterMode,
    ) -> Result<Vec<u8>>
    where
        S: HostBuffer + ?Sized,
    {
        let mut out = self.alloc(dst_width, dst_height, i420_size)?;
        self.scale_planar(
            src, src_width, src_height, &mut out, dst_width, dst_height, filter,
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::access::testing::{CountingBuffer, CountingImage};
    use crate::access::{RawImage, SourceInfo};
    use crate::engine::{EngineError, EngineResult, SoftwareEngine};
    use crate::layout::{PlanarMut, PlanarRef, SemiPlanarMut, SemiPlanarRef};

    /// What the engine saw for one call
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        op: &'static str,
        width: i32,
        height: i32,
        dst_y_stride: usize,
        arg: i32,
    }

    /// Engine that records its inputs and returns a fixed status
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<Call>>,
        status: i32,
    }

    impl RecordingEngine {
        fn failing(status: i32) -> Self {
            Self {
                status,
                ..Default::default()
            }
        }

        fn record(
            &self,
            op: &'static str,
            width: i32,
            height: i32,
            stride: usize,
            arg: i32,
        ) -> EngineResult {
            self.calls.lock().unwrap().push(Call {
                op,
                width,
                height,
                dst_y_stride: stride,
                arg,
            });
            if self.status == 0 {
                Ok(())
            } else {
                Err(EngineError::new(self.status))
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PixelEngine for RecordingEngine {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn rgba8888_to_i420(
            &self,
            _: PackedSource<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("rgba8888", w, h, dst.y.stride, 0)
        }

        fn rgba4444_to_i420(
            &self,
            _: PackedSource<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("rgba4444", w, h, dst.y.stride, 0)
        }

        fn rgb565_to_i420(
            &self,
            _: PackedSource<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("rgb565", w, h, dst.y.stride, 0)
        }

        fn i420_to_nv21(
            &self,
            _: PlanarRef<'_>,
            dst: SemiPlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("i420_to_nv21", w, h, dst.y.stride, 0)
        }

        fn nv21_to_i420(
            &self,
            _: SemiPlanarRef<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("nv21_to_i420", w, h, dst.y.stride, 0)
        }

        fn i420_rotate(
            &self,
            _: PlanarRef<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
            degrees: i32,
        ) -> EngineResult {
            self.record("rotate", w, h, dst.y.stride, degrees)
        }

        fn i420_mirror(
            &self,
            _: PlanarRef<'_>,
            dst: PlanarMut<'_>,
            w: i32,
            h: i32,
        ) -> EngineResult {
            self.record("mirror", w, h, dst.y.stride, 0)
        }

        fn i420_scale(
            &self,
            _: PlanarRef<'_>,
            _: i32,
            _: i32,
            dst: PlanarMut<'_>,
            dw: i32,
            dh: i32,
            filter: FilterMode,
        ) -> EngineResult {
            self.record("scale", dw, dh, dst.y.stride, filter.code())
        }
    }

    fn software() -> OperationDispatcher<SoftwareEngine> {
        OperationDispatcher::new(SoftwareEngine)
    }

    /// Deterministic non-trivial I420 frame
    fn frame(width: usize, height: usize) -> Vec<u8> {
        (0..i420_size(width, height))
            .map(|i| (i * 37 % 251) as u8)
            .collect()
    }

    #[test]
    fn test_planar_semi_planar_round_trip() {
        let d = software();
        let mut original = frame(8, 6);
        let mut nv21 = d.planar_to_semi_planar_to_vec(&mut original, 8, 6).unwrap();
        // V comes first in each chroma pair
        assert_eq!(nv21[48], original[48 + 12]);
        assert_eq!(nv21[49], original[48]);
        let back = d.semi_planar_to_planar_to_vec(&mut nv21, 8, 6).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let d = software();
        let mut original = frame(8, 4);
        let mut once = d.mirror_planar_to_vec(&mut original, 8, 4).unwrap();
        assert_ne!(once, original);
        let twice = d.mirror_planar_to_vec(&mut once, 8, 4).unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn test_rotate_90_then_270_is_identity() {
        let d = software();
        let mut original = frame(8, 4);
        let mut rotated = d.rotate_planar_to_vec(&mut original, 8, 4, 90).unwrap();
        // The rotated frame is stored 4 wide, 8 tall
        let back = d.rotate_planar_to_vec(&mut rotated, 4, 8, 270).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_rotate_180_twice_is_identity() {
        let d = software();
        let mut original = frame(6, 4);
        let mut once = d.rotate_planar_to_vec(&mut original, 6, 4, 180).unwrap();
        let twice = d.rotate_planar_to_vec(&mut once, 6, 4, 180).unwrap();
        assert_eq!(twice, original);
    }

    #[test]
    fn test_scale_same_size_is_identity() {
        let d = software();
        let mut original = frame(8, 6);
        for filter in [
            FilterMode::None,
            FilterMode::Linear,
            FilterMode::Bilinear,
            FilterMode::Box,
        ] {
            let out = d
                .scale_planar_to_vec(&mut original, 8, 6, 8, 6, filter)
                .unwrap();
            assert_eq!(out, original, "filter {:?}", filter);
        }
    }

    #[test]
    fn test_rotate_4x2_destination_stride() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut src = vec![0u8; 12];
        let mut dst = vec![0u8; 12];
        d.rotate_planar(&mut src, 4, 2, &mut dst, 90).unwrap();
        assert_eq!(
            d.engine().calls(),
            vec![Call {
                op: "rotate",
                width: 4,
                height: 2,
                dst_y_stride: 2,
                arg: 90,
            }]
        );

        d.rotate_planar(&mut src, 4, 2, &mut dst, 180).unwrap();
        assert_eq!(d.engine().calls()[1].dst_y_stride, 4);
    }

    #[test]
    fn test_unsupported_degrees_are_forwarded() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut src = vec![0u8; 12];
        let mut dst = vec![0u8; 12];
        d.rotate_planar(&mut src, 4, 2, &mut dst, 45).unwrap();
        assert_eq!(d.engine().calls()[0].arg, 45);

        // The software engine rejects it with its own code
        let err = software()
            .rotate_planar(&mut src, 4, 2, &mut dst, 45)
            .unwrap_err();
        assert_eq!(err.status(), -1);
        assert!(!err.is_local());
    }

    fn rgba_info(format: i32) -> SourceInfo {
        SourceInfo {
            width: 4,
            height: 2,
            stride: 16,
            format,
        }
    }

    #[test]
    fn test_unsupported_format_leaves_destination_untouched() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut image = CountingImage::new(vec![0u8; 32], rgba_info(8));
        let mut dst = CountingBuffer::new(vec![0xAB; 12]);

        let result = d.convert_source_to_planar(&mut image, &mut dst);
        assert_eq!(crate::error::status_of(&result), -3);
        assert!(d.engine().calls().is_empty());
        assert!(dst.data.iter().all(|&b| b == 0xAB));
        assert!(dst.acquisitions().is_empty());
        assert_eq!(image.locks.get(), 1);
        assert_eq!(image.unlocks.get(), 1);
    }

    #[test]
    fn test_source_info_and_lock_failures() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut dst = CountingBuffer::new(vec![0u8; 12]);

        let mut no_info = CountingImage::new(vec![0u8; 32], rgba_info(1));
        no_info.info = None;
        let err = d.convert_source_to_planar(&mut no_info, &mut dst).unwrap_err();
        assert_eq!(err.status(), -1);
        assert_eq!(no_info.locks.get(), 0);

        let mut locked = CountingImage::new(vec![0u8; 32], rgba_info(1));
        locked.fail_lock = true;
        let err = d.convert_source_to_planar(&mut locked, &mut dst).unwrap_err();
        assert_eq!(err.status(), -2);
        assert!(dst.acquisitions().is_empty());
        assert!(d.engine().calls().is_empty());
    }

    #[test]
    fn test_source_formats_pick_distinct_primitives() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        for (code, stride) in [(1, 16), (7, 8), (4, 8)] {
            let info = SourceInfo {
                width: 4,
                height: 2,
                stride,
                format: code,
            };
            let mut image = CountingImage::new(vec![0u8; 32], info);
            let mut dst = CountingBuffer::new(vec![0u8; 12]);
            d.convert_source_to_planar(&mut image, &mut dst).unwrap();
            assert_eq!(image.unlocks.get(), 1);
            assert_eq!(dst.releases.get(), 1);
            assert_eq!(dst.acquisitions(), vec![Access::Write]);
        }
        let ops: Vec<_> = d.engine().calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec!["rgba8888", "rgba4444", "rgb565"]);
    }

    #[test]
    fn test_convert_rgba_with_software_engine() {
        // Opaque black 4x2
        let pixels: Vec<u8> = [0u8, 0, 0, 255].repeat(8);
        let mut image = RawImage::new(&pixels, 4, 2, 16, 1);
        let out = software().convert_source_to_planar_to_vec(&mut image).unwrap();
        assert_eq!(&out[..8], &[16; 8]);
        assert_eq!(&out[8..], &[128; 4]);
    }

    #[test]
    fn test_destination_pin_failure_releases_source_lock() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut image = CountingImage::new(vec![0u8; 32], rgba_info(1));
        let mut dst = CountingBuffer::new(vec![0u8; 12]);
        dst.fail_pin = true;

        let err = d.convert_source_to_planar(&mut image, &mut dst).unwrap_err();
        assert_eq!(err.status(), -2);
        assert_eq!(image.locks.get(), 1);
        assert_eq!(image.unlocks.get(), 1);
        assert!(d.engine().calls().is_empty());
    }

    #[test]
    fn test_convert_16bit_sources_with_software_engine() {
        // Left half white, right half black; both formats encode white as 0xFFFF
        let row: Vec<u8> = [[0xFFu8, 0xFF], [0xFF, 0xFF], [0, 0], [0, 0]].concat();
        let pixels = row.repeat(2);
        for format in [SourceFormat::Rgb565, SourceFormat::Rgba4444] {
            let mut image = RawImage::new(&pixels, 4, 2, 8, format.code());
            let out = software().convert_source_to_planar_to_vec(&mut image).unwrap();
            assert_eq!(&out[..8], &[235, 235, 16, 16, 235, 235, 16, 16], "{}", format);
            assert_eq!(&out[8..], &[128; 4], "{}", format);
        }

        // Alpha nibble does not leak into the color
        let opaque_black: Vec<u8> = [0x00u8, 0xF0].repeat(8);
        let mut image = RawImage::new(&opaque_black, 4, 2, 8, SourceFormat::Rgba4444.code());
        let out = software().convert_source_to_planar_to_vec(&mut image).unwrap();
        assert_eq!(&out[..8], &[16; 8]);
    }

    #[test]
    fn test_padded_source_rows_need_no_trailing_padding() {
        // 20-byte rows, last row only 16 bytes long
        let pixels: Vec<u8> = [0u8, 0, 0, 255].repeat(9);
        let mut image = RawImage::new(&pixels, 4, 2, 20, 1);
        assert_eq!(pixels.len(), 36);
        let out = software().convert_source_to_planar_to_vec(&mut image).unwrap();
        assert_eq!(&out[..8], &[16; 8]);
    }

    #[test]
    fn test_short_source_pixels() {
        let pixels = vec![0u8; 20];
        let mut image = RawImage::new(&pixels, 4, 2, 16, 1);
        let mut dst = vec![0u8; 12];
        let err = software()
            .convert_source_to_planar(&mut image, &mut dst)
            .unwrap_err();
        assert_eq!(err.status(), -4);
    }

    #[test]
    fn test_engine_code_passes_through() {
        let d = OperationDispatcher::new(RecordingEngine::failing(-7));
        let mut src = CountingBuffer::new(vec![0u8; 12]);
        let mut dst = CountingBuffer::new(vec![0u8; 12]);
        let err = d.mirror_planar(&mut src, 4, 2, &mut dst).unwrap_err();
        assert_eq!(err.status(), -7);
        assert_eq!(d.engine().calls().len(), 1);
        assert_eq!(src.releases.get(), 1);
        assert_eq!(dst.releases.get(), 1);
    }

    #[test]
    fn test_write_access_only_for_destination() {
        let d = software();
        let mut src = CountingBuffer::new(frame(4, 2));
        let mut dst = CountingBuffer::new(vec![0u8; 12]);
        d.mirror_planar(&mut src, 4, 2, &mut dst).unwrap();
        assert_eq!(src.acquisitions(), vec![Access::Read]);
        assert_eq!(dst.acquisitions(), vec![Access::Write]);

        let mut nv21 = CountingBuffer::new(vec![0u8; 12]);
        d.planar_to_semi_planar(&mut src, &mut nv21, 4, 2).unwrap();
        assert_eq!(src.acquisitions(), vec![Access::Read, Access::Read]);
        assert_eq!(nv21.acquisitions(), vec![Access::Write]);
    }

    #[test]
    fn test_local_rejections_skip_engine() {
        let d = OperationDispatcher::new(RecordingEngine::default())
            .with_limits(Limits::none().with_max_width(8));
        let mut src = vec![0u8; 64];
        let mut dst = vec![0u8; 64];
        let mut short = vec![0u8; 11];

        assert_eq!(d.mirror_planar(&mut src, 3, 2, &mut dst).unwrap_err().status(), -5);
        assert_eq!(d.mirror_planar(&mut src, 0, 2, &mut dst).unwrap_err().status(), -5);
        assert_eq!(d.mirror_planar(&mut src, 4, 2, &mut short).unwrap_err().status(), -4);
        assert_eq!(d.mirror_planar(&mut short, 4, 2, &mut dst).unwrap_err().status(), -4);
        assert_eq!(d.mirror_planar(&mut src, 10, 2, &mut dst).unwrap_err().status(), -6);
        assert_eq!(
            d.scale_planar(&mut src, 4, 2, &mut dst, 16, 2, FilterMode::Box)
                .unwrap_err()
                .status(),
            -6
        );
        assert!(d.engine().calls().is_empty());
    }

    #[test]
    fn test_scale_uses_destination_geometry() {
        let d = OperationDispatcher::new(RecordingEngine::default());
        let mut src = vec![0u8; 24];
        let mut dst = vec![0u8; 96];
        d.scale_planar(&mut src, 4, 4, &mut dst, 8, 8, FilterMode::Bilinear)
            .unwrap();
        assert_eq!(
            d.engine().calls(),
            vec![Call {
                op: "scale",
                width: 8,
                height: 8,
                dst_y_stride: 8,
                arg: 2,
            }]
        );
    }

    #[test]
    fn test_concurrent_calls_on_disjoint_buffers() {
        let d = software();
        let expected: Vec<Vec<u8>> = (0..4)
            .map(|i| {
                let mut src = frame(8 + i * 2, 4);
                d.mirror_planar_to_vec(&mut src, 8 + i as i32 * 2, 4).unwrap()
            })
            .collect();

        let results: Vec<Vec<u8>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let d = &d;
                    scope.spawn(move || {
                        let mut src = frame(8 + i * 2, 4);
                        let mut dst = vec![0u8; src.len()];
                        for _ in 0..50 {
                            d.mirror_planar(&mut src, 8 + i as i32 * 2, 4, &mut dst)
                                .unwrap();
                        }
                        dst
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results, expected);
    }

    #[test]
    fn test_from_config() {
        let config = BridgeConfig {
            limits: Limits::none().with_max_pixels(16),
            ..Default::default()
        };
        let d = OperationDispatcher::from_config(&config).unwrap();
        let mut src = vec![0u8; 24];
        assert_eq!(
            d.mirror_planar_to_vec(&mut src, 4, 4).unwrap().len(),
            24
        );
        assert_eq!(d.mirror_planar_to_vec(&mut src, 8, 4).unwrap_err().status(), -6);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Rotate(90).to_string(), "rotate(90)");
        assert_eq!(Operation::Scale(FilterMode::Box).to_string(), "scale(Box)");
        assert_eq!(Operation::Mirror.to_string(), "mirror");
    }
}
