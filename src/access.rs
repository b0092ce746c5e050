//! Scoped access to host-owned buffers
//!
//! A host buffer is pinned (or locked) for exactly one native call. The
//! guard returned by [`HostBuffer::acquire`] releases it on drop, so every
//! exit path of [`with_buffer`] (success, `?`, panic) releases exactly once.

use std::ops::{Deref, DerefMut};

use crate::error::{BridgeError, Result};
use crate::layout::{compute_layout, Orientation, PlaneLayout, YuvLayout};

/// What the native side will do with a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read only; the bridge may skip copying the bytes back
    Read,
    /// Written; any snapshot must be copied back on release
    Write,
}

/// A byte buffer owned by the host that can be pinned for native access
pub trait HostBuffer {
    /// Pinned view, released when dropped
    type Guard<'a>: DerefMut<Target = [u8]>
    where
        Self: 'a;

    /// Pin the buffer, failing with [`BridgeError::PinFailed`]
    fn acquire(&mut self, access: Access) -> Result<Self::Guard<'_>>;
}

impl HostBuffer for [u8] {
    type Guard<'a> = &'a mut [u8];

    fn acquire(&mut self, _access: Access) -> Result<Self::Guard<'_>> {
        Ok(self)
    }
}

impl HostBuffer for Vec<u8> {
    type Guard<'a> = &'a mut [u8];

    fn acquire(&mut self, _access: Access) -> Result<Self::Guard<'_>> {
        Ok(self.as_mut_slice())
    }
}

impl<'b> HostBuffer for &'b mut [u8] {
    type Guard<'a> = &'a mut [u8] where Self: 'a;

    fn acquire(&mut self, _access: Access) -> Result<Self::Guard<'_>> {
        Ok(&mut **self)
    }
}

/// Geometry the caller declares for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRequest {
    pub width: i32,
    pub height: i32,
    pub format: YuvLayout,
    pub orientation: Orientation,
}

impl LayoutRequest {
    pub fn upright(width: i32, height: i32, format: YuvLayout) -> Self {
        Self {
            width,
            height,
            format,
            orientation: Orientation::Upright,
        }
    }

    pub fn rotated(width: i32, height: i32, format: YuvLayout, degrees: i32) -> Self {
        Self {
            width,
            height,
            format,
            orientation: Orientation::for_rotation(degrees),
        }
    }
}

/// Pin `host`, derive its plane layout and run `body` over the pinned bytes.
///
/// The buffer is released after `body` returns, whatever it returns. A
/// layout failure releases it before the body runs.
pub fn with_buffer<H, R, F>(
    host: &mut H,
    access: Access,
    request: LayoutRequest,
    body: F,
) -> Result<R>
where
    H: HostBuffer + ?Sized,
    F: FnOnce(&PlaneLayout, &mut [u8]) -> Result<R>,
{
    let mut guard = host.acquire(access)?;
    let layout = compute_layout(
        guard.len(),
        request.width,
        request.height,
        request.format,
        request.orientation,
    )?;
    let result = body(&layout, &mut *guard);
    drop(guard);
    result
}

// ============================================================================
// Packed source images
// ============================================================================

/// Metadata of a packed source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    /// Host pixel format code
    pub format: i32,
}

/// A packed-pixel image the host can describe and lock
pub trait SourceImage {
    /// Locked pixels, unlocked when dropped
    type Pixels<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// Fails with [`BridgeError::SourceInfoUnavailable`]
    fn info(&self) -> Result<SourceInfo>;

    /// Fails with [`BridgeError::PinFailed`]
    fn lock(&mut self) -> Result<Self::Pixels<'_>>;
}

/// Packed image held in native memory
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    pub info: SourceInfo,
    pub pixels: &'a [u8],
}

impl<'a> RawImage<'a> {
    pub fn new(pixels: &'a [u8], width: u32, height: u32, stride: u32, format: i32) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                stride,
                format,
            },
            pixels,
        }
    }
}

impl<'p> SourceImage for RawImage<'p> {
    type Pixels<'a> = &'a [u8] where Self: 'a;

    fn info(&self) -> Result<SourceInfo> {
        if self.info.width == 0 || self.info.height == 0 {
            return Err(BridgeError::SourceInfoUnavailable(format!(
                "empty image {}x{}",
                self.info.width, self.info.height
            )));
        }
        Ok(self.info)
    }

    fn lock(&mut self) -> Result<Self::Pixels<'_>> {
        Ok(self.pixels)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::ops::{Deref, DerefMut};

    use super::*;

    /// Host buffer that records acquisitions and releases
    #[derive(Debug, Default)]
    pub struct CountingBuffer {
        pub data: Vec<u8>,
        pub acquired: RefCell<Vec<Access>>,
        pub releases: Cell<usize>,
        pub fail_pin: bool,
    }

    impl CountingBuffer {
        pub fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                ..Default::default()
            }
        }

        pub fn acquisitions(&self) -> Vec<Access> {
            self.acquired.borrow().clone()
        }
    }

    pub struct CountingGuard<'a> {
        data: &'a mut [u8],
        releases: &'a Cell<usize>,
    }

    impl Deref for CountingGuard<'_> {
        type Target = [u8];

        fn deref(&self) -> &[u8] {
            &*self.data
        }
    }

    impl DerefMut for CountingGuard<'_> {
        fn deref_mut(&mut self) -> &mut [u8] {
            &mut *self.data
        }
    }

    impl Drop for CountingGuard<'_> {
        fn drop(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    impl HostBuffer for CountingBuffer {
        type Guard<'a> = CountingGuard<'a>;

        fn acquire(&mut self, access: Access) -> Result<Self::Guard<'_>> {
            if self.fail_pin {
                return Err(BridgeError::PinFailed("refused".into()));
            }
            self.acquired.borrow_mut().push(access);
            Ok(CountingGuard {
                data: &mut self.data,
                releases: &self.releases,
            })
        }
    }

    /// Source image that records unlocks
    pub struct CountingImage {
        pub info: Option<SourceInfo>,
        pub pixels: Vec<u8>,
        pub locks: Cell<usize>,
        pub unlocks: Cell<usize>,
        pub fail_lock: bool,
    }

    impl CountingImage {
        pub fn new(pixels: Vec<u8>, info: SourceInfo) -> Self {
            Self {
                info: Some(info),
                pixels,
                locks: Cell::new(0),
                unlocks: Cell::new(0),
                fail_lock: false,
            }
        }
    }

    pub struct LockedPixels<'a> {
        data: &'a [u8],
        unlocks: &'a Cell<usize>,
    }

    impl Deref for LockedPixels<'_> {
        type Target = [u8];

        fn deref(&self) -> &[u8] {
            self.data
        }
    }

    impl Drop for LockedPixels<'_> {
        fn drop(&mut self) {
            self.unlocks.set(self.unlocks.get() + 1);
        }
    }

    impl SourceImage for CountingImage {
        type Pixels<'a> = LockedPixels<'a>;

        fn info(&self) -> Result<SourceInfo> {
            self.info
                .ok_or_else(|| BridgeError::SourceInfoUnavailable("no info".into()))
        }

        fn lock(&mut self) -> Result<Self::Pixels<'_>> {
            if self.fail_lock {
                return Err(BridgeError::PinFailed("lock refused".into()));
            }
            self.locks.set(self.locks.get() + 1);
            Ok(LockedPixels {
                data: &self.pixels,
                unlocks: &self.unlocks,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::testing::CountingBuffer;
    use super::*;
    use crate::engine::EngineError;
    use crate::layout::LayoutError;

    fn i420(width: i32, height: i32) -> LayoutRequest {
        LayoutRequest::upright(width, height, YuvLayout::Planar420)
    }

    #[test]
    fn test_release_once_on_success() {
        let mut buf = CountingBuffer::new(vec![0; 12]);
        let len = with_buffer(&mut buf, Access::Write, i420(4, 2), |layout, bytes| {
            bytes[0] = 7;
            Ok(layout.required_len())
        })
        .unwrap();
        assert_eq!(len, 12);
        assert_eq!(buf.releases.get(), 1);
        assert_eq!(buf.data[0], 7);
        assert_eq!(buf.acquisitions(), vec![Access::Write]);
    }

    #[test]
    fn test_release_once_on_layout_error() {
        let mut buf = CountingBuffer::new(vec![0; 11]);
        let mut ran = false;
        let result = with_buffer(&mut buf, Access::Read, i420(4, 2), |_, _| {
            ran = true;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(BridgeError::Layout(LayoutError::BufferTooSmall { .. }))
        ));
        assert!(!ran);
        assert_eq!(buf.releases.get(), 1);
    }

    #[test]
    fn test_release_once_on_body_error() {
        let mut buf = CountingBuffer::new(vec![0; 12]);
        let result: Result<()> = with_buffer(&mut buf, Access::Read, i420(4, 2), |_, _| {
            Err(EngineError::new(-9).into())
        });
        assert_eq!(result.unwrap_err().status(), -9);
        assert_eq!(buf.releases.get(), 1);
    }

    #[test]
    fn test_release_once_on_panic() {
        let mut buf = CountingBuffer::new(vec![0; 12]);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _ = with_buffer(&mut buf, Access::Write, i420(4, 2), |_, _| -> Result<()> {
                panic!("engine blew up")
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(buf.releases.get(), 1);
    }

    #[test]
    fn test_pin_failure_runs_nothing() {
        let mut buf = CountingBuffer::new(vec![0; 12]);
        buf.fail_pin = true;
        let result = with_buffer(&mut buf, Access::Read, i420(4, 2), |_, _| Ok(()));
        assert_eq!(result.unwrap_err().status(), -2);
        assert_eq!(buf.releases.get(), 0);
    }

    #[test]
    fn test_rotated_request_layout() {
        let mut buf = vec![0u8; 12];
        let stride = with_buffer(
            &mut buf,
            Access::Write,
            LayoutRequest::rotated(4, 2, YuvLayout::Planar420, 90),
            |layout, _| Ok(layout.y_stride()),
        )
        .unwrap();
        assert_eq!(stride, 2);
    }

    #[test]
    fn test_native_slice_buffers() {
        let mut backing = vec![0u8; 24];
        let mut slice: &mut [u8] = &mut backing;
        with_buffer(
            &mut slice,
            Access::Write,
            LayoutRequest::upright(4, 4, YuvLayout::SemiPlanar420),
            |layout, bytes| {
                bytes[layout.vu().unwrap().offset] = 1;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(backing[16], 1);
    }

    #[test]
    fn test_raw_image_info() {
        let pixels = vec![0u8; 32];
        let image = RawImage::new(&pixels, 4, 2, 16, 1);
        assert_eq!(image.info().unwrap().stride, 16);
        let empty = RawImage::new(&pixels, 0, 2, 16, 1);
        assert_eq!(empty.info().unwrap_err().status(), -1);
    }
}
