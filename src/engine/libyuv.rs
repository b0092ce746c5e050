//! libyuv-backed engine

use ::libyuv::{DstPlane, SrcPlane, YuvError};

use super::{EngineError, EngineResult, FilterMode, PackedSource, PixelEngine};
use crate::layout::{Plane, PlaneMut, PlanarMut, PlanarRef, SemiPlanarMut, SemiPlanarRef};

/// Engine delegating every primitive to libyuv
#[derive(Debug, Clone, Copy, Default)]
pub struct LibyuvEngine;

impl LibyuvEngine {
    pub fn new() -> Self {
        Self
    }
}

impl From<YuvError> for EngineError {
    fn from(e: YuvError) -> Self {
        EngineError::new(e.code())
    }
}

fn src(plane: Plane<'_>) -> SrcPlane<'_> {
    SrcPlane::new(plane.data, plane.stride as i32)
}

fn dst(plane: PlaneMut<'_>) -> DstPlane<'_> {
    DstPlane::new(plane.data, plane.stride as i32)
}

fn packed(source: PackedSource<'_>) -> SrcPlane<'_> {
    SrcPlane::new(source.data, source.stride as i32)
}

impl PixelEngine for LibyuvEngine {
    fn name(&self) -> &'static str {
        "libyuv"
    }

    fn rgba8888_to_i420(
        &self,
        source: PackedSource<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        // libyuv names formats by little-endian word order, so RGBA bytes are "ABGR"
        ::libyuv::abgr_to_i420(
            packed(source),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
        )?;
        Ok(())
    }

    fn rgba4444_to_i420(
        &self,
        source: PackedSource<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        ::libyuv::argb4444_to_i420(
            packed(source),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
        )?;
        Ok(())
    }

    fn rgb565_to_i420(
        &self,
        source: PackedSource<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        ::libyuv::rgb565_to_i420(
            packed(source),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
        )?;
        Ok(())
    }

    fn i420_to_nv21(
        &self,
        input: PlanarRef<'_>,
        out: SemiPlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        ::libyuv::i420_to_nv21(
            src(input.y),
            src(input.u),
            src(input.v),
            dst(out.y),
            dst(out.vu),
            width,
            height,
        )?;
        Ok(())
    }

    fn nv21_to_i420(
        &self,
        input: SemiPlanarRef<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        ::libyuv::nv21_to_i420(
            src(input.y),
            src(input.vu),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
        )?;
        Ok(())
    }

    fn i420_rotate(
        &self,
        input: PlanarRef<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
        degrees: i32,
    ) -> EngineResult {
        ::libyuv::i420_rotate(
            src(input.y),
            src(input.u),
            src(input.v),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
            degrees,
        )?;
        Ok(())
    }

    fn i420_mirror(
        &self,
        input: PlanarRef<'_>,
        out: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        ::libyuv::i420_mirror(
            src(input.y),
            src(input.u),
            src(input.v),
            dst(out.y),
            dst(out.u),
            dst(out.v),
            width,
            height,
        )?;
        Ok(())
    }

    fn i420_scale(
        &self,
        input: PlanarRef<'_>,
        src_width: i32,
        src_height: i32,
        out: PlanarMut<'_>,
        dst_width: i32,
        dst_height: i32,
        filter: FilterMode,
    ) -> EngineResult {
        ::libyuv::i420_scale(
            src(input.y),
            src(input.u),
            src(input.v),
            src_width,
            src_height,
            dst(out.y),
            dst(out.u),
            dst(out.v),
            dst_width,
            dst_height,
            filter.code(),
        )?;
        Ok(())
    }
}
