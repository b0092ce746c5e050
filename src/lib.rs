//! yuv-bridge - YUV 4:2:0 transform layer over libyuv
//!
//! This crate addresses I420/NV21 frames stored in flat host buffers,
//! pins those buffers for the duration of one call, and drives a pixel
//! engine (libyuv or the built-in software kernels) over the planes.

pub mod access;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod image;
#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "jni")]
pub mod jni;
pub mod layout;

pub use dispatch::{Operation, OperationDispatcher};
pub use error::{BridgeError, Result};
