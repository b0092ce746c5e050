//! Pixel engine seam
//!
//! The dispatcher never does pixel math itself; it hands plane views to a
//! [`PixelEngine`]. Two engines ship with the crate:
//!
//! - [`LibyuvEngine`] (feature `libyuv`): SIMD kernels from libyuv
//! - [`SoftwareEngine`]: portable Rust kernels with libyuv's conventions,
//!   used when libyuv is not linked

#[cfg(feature = "libyuv")]
mod libyuv;
mod software;

#[cfg(feature = "libyuv")]
pub use self::libyuv::LibyuvEngine;
pub use software::SoftwareEngine;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineKind;
use crate::layout::{PlanarMut, PlanarRef, SemiPlanarMut, SemiPlanarRef};

/// Opaque failure code reported by an engine primitive
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("engine returned {code}")]
pub struct EngineError {
    code: i32,
}

impl EngineError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

pub type EngineResult = std::result::Result<(), EngineError>;

/// Packed source pixel formats accepted by `convert_source_to_planar`
///
/// Discriminants are the host bitmap format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SourceFormat {
    /// 8 bits per channel, R G B A byte order
    Rgba8888 = 1,
    /// 16-bit 5:6:5 RGB
    Rgb565 = 4,
    /// 4 bits per channel RGBA
    Rgba4444 = 7,
}

impl SourceFormat {
    /// Map a host format code to a recognized format
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SourceFormat::Rgba8888),
            4 => Some(SourceFormat::Rgb565),
            7 => Some(SourceFormat::Rgba4444),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            SourceFormat::Rgba8888 => 4,
            SourceFormat::Rgb565 | SourceFormat::Rgba4444 => 2,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Rgba8888 => "RGBA_8888",
            SourceFormat::Rgb565 => "RGB_565",
            SourceFormat::Rgba4444 => "RGBA_4444",
        };
        write!(f, "{}", name)
    }
}

/// Resampling policy for scaling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum FilterMode {
    /// Point sample; fastest
    #[default]
    None = 0,
    /// Filter horizontally only
    Linear = 1,
    /// Faster than box, but lower quality scaling down
    Bilinear = 2,
    /// Highest quality
    Box = 3,
}

impl FilterMode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(FilterMode::None),
            1 => Some(FilterMode::Linear),
            2 => Some(FilterMode::Bilinear),
            3 => Some(FilterMode::Box),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Clockwise rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RotationMode {
    Rotate0 = 0,
    Rotate90 = 90,
    Rotate180 = 180,
    Rotate270 = 270,
}

impl RotationMode {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees {
            0 => Some(RotationMode::Rotate0),
            90 => Some(RotationMode::Rotate90),
            180 => Some(RotationMode::Rotate180),
            270 => Some(RotationMode::Rotate270),
            _ => None,
        }
    }

    /// Whether width and height trade places
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, RotationMode::Rotate90 | RotationMode::Rotate270)
    }

    pub fn degrees(&self) -> i32 {
        *self as i32
    }
}

/// Packed source image handed to a conversion primitive
#[derive(Debug, Clone, Copy)]
pub struct PackedSource<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// Conversion, rotation, mirror and scale kernels over 4:2:0 planes
///
/// `width`/`height` are always the source dimensions. Implementations
/// report failure with their own negative codes; the dispatcher forwards
/// them unchanged.
pub trait PixelEngine {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn rgba8888_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    fn rgba4444_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    fn rgb565_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    fn i420_to_nv21(
        &self,
        src: PlanarRef<'_>,
        dst: SemiPlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    fn nv21_to_i420(
        &self,
        src: SemiPlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    /// Rotate clockwise by `degrees`, passed through without local validation
    fn i420_rotate(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
        degrees: i32,
    ) -> EngineResult;

    fn i420_mirror(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult;

    #[allow(clippy::too_many_arguments)]
    fn i420_scale(
        &self,
        src: PlanarRef<'_>,
        src_width: i32,
        src_height: i32,
        dst: PlanarMut<'_>,
        dst_width: i32,
        dst_height: i32,
        filter: FilterMode,
    ) -> EngineResult;
}

/// Engine selected at build time
#[cfg(feature = "libyuv")]
pub type DefaultEngine = LibyuvEngine;
#[cfg(not(feature = "libyuv"))]
pub type DefaultEngine = SoftwareEngine;

/// Engine chosen at runtime from configuration
#[derive(Debug, Clone, Copy)]
pub enum SelectedEngine {
    Software(SoftwareEngine),
    #[cfg(feature = "libyuv")]
    Libyuv(LibyuvEngine),
}

impl SelectedEngine {
    /// `None` when the engine is not compiled in
    pub fn from_kind(kind: EngineKind) -> Option<Self> {
        match kind {
            EngineKind::Software => Some(SelectedEngine::Software(SoftwareEngine)),
            #[cfg(feature = "libyuv")]
            EngineKind::Libyuv => Some(SelectedEngine::Libyuv(LibyuvEngine)),
            #[cfg(not(feature = "libyuv"))]
            EngineKind::Libyuv => None,
        }
    }
}

impl Default for SelectedEngine {
    fn default() -> Self {
        Self::from_kind(EngineKind::default())
            .unwrap_or(SelectedEngine::Software(SoftwareEngine))
    }
}

macro_rules! delegate {
    ($self:ident, $method:ident($($arg:expr),*)) => {
        match $self {
            SelectedEngine::Software(engine) => engine.$method($($arg),*),
            #[cfg(feature = "libyuv")]
            SelectedEngine::Libyuv(engine) => engine.$method($($arg),*),
        }
    };
}

impl PixelEngine for SelectedEngine {
    fn name(&self) -> &'static str {
        delegate!(self, name())
    }

    fn rgba8888_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, rgba8888_to_i420(src, dst, width, height))
    }

    fn rgba4444_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, rgba4444_to_i420(src, dst, width, height))
    }

    fn rgb565_to_i420(
        &self,
        src: PackedSource<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, rgb565_to_i420(src, dst, width, height))
    }

    fn i420_to_nv21(
        &self,
        src: PlanarRef<'_>,
        dst: SemiPlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, i420_to_nv21(src, dst, width, height))
    }

    fn nv21_to_i420(
        &self,
        src: SemiPlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, nv21_to_i420(src, dst, width, height))
    }

    fn i420_rotate(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
        degrees: i32,
    ) -> EngineResult {
        delegate!(self, i420_rotate(src, dst, width, height, degrees))
    }

    fn i420_mirror(
        &self,
        src: PlanarRef<'_>,
        dst: PlanarMut<'_>,
        width: i32,
        height: i32,
    ) -> EngineResult {
        delegate!(self, i420_mirror(src, dst, width, height))
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
        delegate!(
            self,
            i420_scale(src, src_width, src_height, dst, dst_width, dst_height, filter)
        )
    }
}
