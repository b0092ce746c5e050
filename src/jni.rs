//! JNI entry points for the two `YuvUtil` Java bindings
//!
//! `xyz.rinc.roid.yuv.YuvUtil` declares `native*` methods that return the
//! integer status; `com.libyuv.util.YuvUtil` declares `void` methods with
//! the same arguments. Both pin their Java arrays through [`JavaByteArray`]
//! and run one dispatcher operation. Panics never cross the boundary; they
//! are reported as [`STATUS_INTERNAL`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use ::jni::objects::{AutoElements, JByteArray, JClass, ReleaseMode};
use ::jni::sys::{jbyte, jint};
use ::jni::JNIEnv;

use crate::access::{Access, HostBuffer};
use crate::dispatch::OperationDispatcher;
use crate::engine::{DefaultEngine, FilterMode};
use crate::error::{status_of, BridgeError, Result, STATUS_INTERNAL};

/// Dispatcher shared by every export
fn dispatcher() -> &'static OperationDispatcher<DefaultEngine> {
    static DISPATCHER: OnceLock<OperationDispatcher<DefaultEngine>> = OnceLock::new();
    DISPATCHER.get_or_init(|| {
        init_logging();
        OperationDispatcher::new(DefaultEngine::default())
    })
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yuv_bridge=info"));
    // The host may already have installed a subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false))
        .try_init();
}

/// Run `call`, turning its result (or a panic) into a status code
fn guarded(name: &str, call: impl FnOnce() -> Result<()>) -> jint {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => status_of(&result),
        Err(_) => {
            tracing::error!("{} panicked", name);
            STATUS_INTERNAL
        }
    }
}

fn release_mode(access: Access) -> ReleaseMode {
    match access {
        Access::Read => ReleaseMode::NoCopyBack,
        Access::Write => ReleaseMode::CopyBack,
    }
}

fn require_positive(pairs: &[(i32, i32)]) -> Result<()> {
    for &(width, height) in pairs {
        if width <= 0 || height <= 0 {
            return Err(BridgeError::InvalidArgument(format!(
                "dimensions {}x{}",
                width, height
            )));
        }
    }
    Ok(())
}

// ============================================================================
// byte[] bridge
// ============================================================================

/// A Java `byte[]` pinned with `GetByteArrayElements`
pub struct JavaByteArray<'local, 'a> {
    env: JNIEnv<'local>,
    array: &'a JByteArray<'local>,
}

impl<'local, 'a> JavaByteArray<'local, 'a> {
    /// Wrap `array`, rejecting null references.
    ///
    /// # Safety
    ///
    /// `env` must be the JNI environment of the current thread.
    pub unsafe fn new(env: &JNIEnv<'local>, array: &'a JByteArray<'local>) -> Result<Self> {
        if array.is_null() {
            return Err(BridgeError::InvalidArgument("null byte array".into()));
        }
        Ok(Self {
            env: env.unsafe_clone(),
            array,
        })
    }
}

/// Pinned array elements viewed as bytes; released on drop
pub struct PinnedBytes<'local, 'a>(AutoElements<'local, 'local, 'a, jbyte>);

impl std::ops::Deref for PinnedBytes<'_, '_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        bytemuck::cast_slice::<jbyte, u8>(&self.0)
    }
}

impl std::ops::DerefMut for PinnedBytes<'_, '_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut::<jbyte, u8>(&mut self.0)
    }
}

impl<'local, 'a> HostBuffer for JavaByteArray<'local, 'a> {
    type Guard<'g> = PinnedBytes<'local, 'a> where Self: 'g;

    fn acquire(&mut self, access: Access) -> Result<Self::Guard<'_>> {
        // Safety: the exports check that no two pinned arrays alias
        let elements = unsafe { self.env.get_array_elements(self.array, release_mode(access)) }
            .map_err(|e| BridgeError::PinFailed(e.to_string()))?;
        Ok(PinnedBytes(elements))
    }
}

/// Pin `src` for reading and `dst` for writing, refusing aliased arrays
fn pin_pair<'local, 'a>(
    env: &JNIEnv<'local>,
    src: &'a JByteArray<'local>,
    dst: &'a JByteArray<'local>,
) -> Result<(JavaByteArray<'local, 'a>, JavaByteArray<'local, 'a>)> {
    // Safety: `env` is the environment this export was called with
    let pair = unsafe { (JavaByteArray::new(env, src)?, JavaByteArray::new(env, dst)?) };
    let same = env
        .is_same_object(src, dst)
        .map_err(|e| BridgeError::PinFailed(e.to_string()))?;
    if same {
        return Err(BridgeError::InvalidArgument(
            "source and destination are the same array".into(),
        ));
    }
    Ok(pair)
}

// ============================================================================
// Operations shared by both Java bindings
// ============================================================================

fn i420_to_nv21<'local>(
    env: &JNIEnv<'local>,
    i420: &JByteArray<'local>,
    nv21: &JByteArray<'local>,
    width: jint,
    height: jint,
) -> jint {
    guarded("I420ToNV21", || {
        require_positive(&[(width, height)])?;
        let (mut src, mut dst) = pin_pair(env, i420, nv21)?;
        dispatcher().planar_to_semi_planar(&mut src, &mut dst, width, height)
    })
}

fn nv21_to_i420<'local>(
    env: &JNIEnv<'local>,
    nv21: &JByteArray<'local>,
    i420: &JByteArray<'local>,
    width: jint,
    height: jint,
) -> jint {
    guarded("NV21ToI420", || {
        require_positive(&[(width, height)])?;
        let (mut src, mut dst) = pin_pair(env, nv21, i420)?;
        dispatcher().semi_planar_to_planar(&mut src, &mut dst, width, height)
    })
}

fn rotate_i420<'local>(
    env: &JNIEnv<'local>,
    src: &JByteArray<'local>,
    width: jint,
    height: jint,
    dst: &JByteArray<'local>,
    degree: jint,
) -> jint {
    guarded("rotateI420", || {
        require_positive(&[(width, height)])?;
        let (mut src, mut dst) = pin_pair(env, src, dst)?;
        dispatcher().rotate_planar(&mut src, width, height, &mut dst, degree)
    })
}

fn mirror_i420<'local>(
    env: &JNIEnv<'local>,
    src: &JByteArray<'local>,
    width: jint,
    height: jint,
    dst: &JByteArray<'local>,
) -> jint {
    guarded("mirrorI420", || {
        require_positive(&[(width, height)])?;
        let (mut src, mut dst) = pin_pair(env, src, dst)?;
        dispatcher().mirror_planar(&mut src, width, height, &mut dst)
    })
}

#[allow(clippy::too_many_arguments)]
fn scale_i420<'local>(
    env: &JNIEnv<'local>,
    src: &JByteArray<'local>,
    src_width: jint,
    src_height: jint,
    dst: &JByteArray<'local>,
    dst_width: jint,
    dst_height: jint,
    filter_mode: jint,
) -> jint {
    guarded("scaleI420", || {
        require_positive(&[(src_width, src_height), (dst_width, dst_height)])?;
        let filter = FilterMode::from_code(filter_mode).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("filter mode {}", filter_mode))
        })?;
        let (mut src, mut dst) = pin_pair(env, src, dst)?;
        dispatcher().scale_planar(
            &mut src, src_width, src_height, &mut dst, dst_width, dst_height, filter,
        )
    })
}

// ============================================================================
// xyz.rinc.roid.yuv.YuvUtil: `native*` methods returning the status
// ============================================================================

#[no_mangle]
pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeI420ToNV21<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    i420: JByteArray<'local>,
    nv21: JByteArray<'local>,
    width: jint,
    height: jint,
) -> jint {
    i420_to_nv21(&env, &i420, &nv21, width, height)
}

#[no_mangle]
pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeNV21ToI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    nv21: JByteArray<'local>,
    i420: JByteArray<'local>,
    width: jint,
    height: jint,
) -> jint {
    nv21_to_i420(&env, &nv21, &i420, width, height)
}

#[no_mangle]
pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeRotateI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    width: jint,
    height: jint,
    dst: JByteArray<'local>,
    degree: jint,
) -> jint {
    rotate_i420(&env, &src, width, height, &dst, degree)
}

#[no_mangle]
pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeMirrorI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    width: jint,
    height: jint,
    dst: JByteArray<'local>,
) -> jint {
    mirror_i420(&env, &src, width, height, &dst)
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeScaleI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    src_width: jint,
    src_height: jint,
    dst: JByteArray<'local>,
    dst_width: jint,
    dst_height: jint,
    filter_mode: jint,
) -> jint {
    scale_i420(
        &env,
        &src,
        src_width,
        src_height,
        &dst,
        dst_width,
        dst_height,
        filter_mode,
    )
}

// ============================================================================
// com.libyuv.util.YuvUtil: `void` methods; failures are only logged
// ============================================================================

#[no_mangle]
pub extern "C" fn Java_com_libyuv_util_YuvUtil_I420ToNV21<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    i420: JByteArray<'local>,
    nv21: JByteArray<'local>,
    width: jint,
    height: jint,
) {
    i420_to_nv21(&env, &i420, &nv21, width, height);
}

#[no_mangle]
pub extern "C" fn Java_com_libyuv_util_YuvUtil_NV21ToI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    nv21: JByteArray<'local>,
    i420: JByteArray<'local>,
    width: jint,
    height: jint,
) {
    nv21_to_i420(&env, &nv21, &i420, width, height);
}

#[no_mangle]
pub extern "C" fn Java_com_libyuv_util_YuvUtil_rotateI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    width: jint,
    height: jint,
    dst: JByteArray<'local>,
    degree: jint,
) {
    rotate_i420(&env, &src, width, height, &dst, degree);
}

#[no_mangle]
pub extern "C" fn Java_com_libyuv_util_YuvUtil_mirrorI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    width: jint,
    height: jint,
    dst: JByteArray<'local>,
) {
    mirror_i420(&env, &src, width, height, &dst);
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn Java_com_libyuv_util_YuvUtil_scaleI420<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
    src: JByteArray<'local>,
    src_width: jint,
    src_height: jint,
    dst: JByteArray<'local>,
    dst_width: jint,
    dst_height: jint,
    filter_mode: jint,
) {
    scale_i420(
        &env,
        &src,
        src_width,
        src_height,
        &dst,
        dst_width,
        dst_height,
        filter_mode,
    );
}

// ============================================================================
// android.graphics.Bitmap bridge
// ============================================================================

#[cfg(target_os = "android")]
mod bitmap {
    use std::ffi::c_void;
    use std::os::raw::c_int;

    use ::jni::objects::{JByteArray, JClass, JObject};
    use ::jni::sys::{jint, jobject, JNIEnv as RawEnv};
    use ::jni::JNIEnv;

    use super::{dispatcher, guarded, JavaByteArray};
    use crate::access::{SourceImage, SourceInfo};
    use crate::error::{BridgeError, Result};

    #[repr(C)]
    #[derive(Debug, Default)]
    struct AndroidBitmapInfo {
        width: u32,
        height: u32,
        stride: u32,
        format: i32,
        flags: u32,
    }

    #[link(name = "jnigraphics")]
    extern "C" {
        fn AndroidBitmap_getInfo(
            env: *mut RawEnv,
            jbitmap: jobject,
            info: *mut AndroidBitmapInfo,
        ) -> c_int;
        fn AndroidBitmap_lockPixels(
            env: *mut RawEnv,
            jbitmap: jobject,
            addr_ptr: *mut *mut c_void,
        ) -> c_int;
        fn AndroidBitmap_unlockPixels(env: *mut RawEnv, jbitmap: jobject) -> c_int;
    }

    /// `android.graphics.Bitmap` locked through jnigraphics
    pub struct AndroidBitmap<'local, 'a> {
        env: &'a JNIEnv<'local>,
        bitmap: &'a JObject<'local>,
    }

    /// Locked bitmap pixels; unlocked on drop
    pub struct LockedBitmap<'a> {
        env: *mut RawEnv,
        bitmap: jobject,
        pixels: &'a [u8],
    }

    impl std::ops::Deref for LockedBitmap<'_> {
        type Target = [u8];

        fn deref(&self) -> &[u8] {
            self.pixels
        }
    }

    impl Drop for LockedBitmap<'_> {
        fn drop(&mut self) {
            let rc = unsafe { AndroidBitmap_unlockPixels(self.env, self.bitmap) };
            if rc < 0 {
                tracing::warn!("AndroidBitmap_unlockPixels returned {}", rc);
            }
        }
    }

    impl<'local, 'a> SourceImage for AndroidBitmap<'local, 'a> {
        type Pixels<'p> = LockedBitmap<'p> where Self: 'p;

        fn info(&self) -> Result<SourceInfo> {
            let mut info = AndroidBitmapInfo::default();
            let rc = unsafe {
                AndroidBitmap_getInfo(self.env.get_raw(), self.bitmap.as_raw(), &mut info)
            };
            if rc < 0 {
                return Err(BridgeError::SourceInfoUnavailable(format!(
                    "AndroidBitmap_getInfo returned {}",
                    rc
                )));
            }
            Ok(SourceInfo {
                width: info.width,
                height: info.height,
                stride: info.stride,
                format: info.format,
            })
        }

        fn lock(&mut self) -> Result<Self::Pixels<'_>> {
            let info = self.info()?;
            let (env, bitmap) = (self.env.get_raw(), self.bitmap.as_raw());
            let mut addr: *mut c_void = std::ptr::null_mut();
            let rc = unsafe { AndroidBitmap_lockPixels(env, bitmap, &mut addr) };
            if rc < 0 || addr.is_null() {
                return Err(BridgeError::PinFailed(format!(
                    "AndroidBitmap_lockPixels returned {}",
                    rc
                )));
            }
            let len = info.stride as usize * info.height as usize;
            // Safety: a locked bitmap exposes stride * height bytes until unlocked
            let pixels = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
            Ok(LockedBitmap {
                env,
                bitmap,
                pixels,
            })
        }
    }

    #[no_mangle]
    pub extern "C" fn Java_xyz_rinc_roid_yuv_YuvUtil_nativeBitmapToI420<'local>(
        env: JNIEnv<'local>,
        _class: JClass<'local>,
        bitmap: JObject<'local>,
        i420: JByteArray<'local>,
    ) -> jint {
        guarded("nativeBitmapToI420", || {
            if bitmap.is_null() {
                return Err(BridgeError::InvalidArgument("null bitmap".into()));
            }
            let mut source = AndroidBitmap {
                env: &env,
                bitmap: &bitmap,
            };
            // Safety: `env` is the environment this export was called with
            let mut dst = unsafe { JavaByteArray::new(&env, &i420)? };
            dispatcher().convert_source_to_planar(&mut source, &mut dst)
        })
    }
}
