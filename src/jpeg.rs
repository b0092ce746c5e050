//! JPEG export for I420 and NV21 frames
//!
//! The crop region is gathered into a tight I420 buffer with
//! [`pack_planes`] and handed to turbojpeg's YUV encoder, which skips its
//! own color conversion:
//!
//! ```text
//! I420/NV21 --crop--> I420 --turbojpeg--> JPEG
//! ```
//!
//! Note: `turbojpeg::Compressor` is not thread-safe. Use one encoder per
//! thread or wrap it in a Mutex.

use crate::error::{BridgeError, Result};
use crate::image::{pack_planes, CropRect, PlaneSource};
use crate::layout::{compute_layout, i420_size, Orientation, YuvLayout};

/// Quality used when the caller does not pick one
pub const DEFAULT_QUALITY: i32 = 100;

fn check_quality(quality: i32) -> Result<()> {
    if !(1..=100).contains(&quality) {
        return Err(BridgeError::InvalidArgument(format!(
            "JPEG quality {} outside 1..=100",
            quality
        )));
    }
    Ok(())
}

fn check_crop(crop: &CropRect, width: usize, height: usize) -> Result<()> {
    let fits = |start: usize, len: usize, limit: usize| {
        start.checked_add(len).is_some_and(|end| end <= limit)
    };
    if !fits(crop.left, crop.width, width) || !fits(crop.top, crop.height, height) {
        return Err(BridgeError::InvalidArgument(format!(
            "crop {}x{} at ({}, {}) outside {}x{} frame",
            crop.width, crop.height, crop.left, crop.top, width, height
        )));
    }
    Ok(())
}

/// JPEG encoder for 4:2:0 frames
pub struct JpegEncoder {
    compressor: turbojpeg::Compressor,
    quality: i32,
    /// Cropped I420 staging buffer, reused across frames
    i420_buffer: Vec<u8>,
}

impl JpegEncoder {
    /// Create an encoder at `quality` (1-100)
    pub fn new(quality: i32) -> Result<Self> {
        check_quality(quality)?;
        let mut compressor = turbojpeg::Compressor::new().map_err(|e| {
            BridgeError::Encode(format!("Failed to create turbojpeg compressor: {}", e))
        })?;
        compressor
            .set_quality(quality)
            .map_err(|e| BridgeError::Encode(format!("Failed to set JPEG quality: {}", e)))?;

        Ok(Self {
            compressor,
            quality,
            i420_buffer: Vec::new(),
        })
    }

    pub fn quality(&self) -> i32 {
        self.quality
    }

    /// Set JPEG quality (1-100)
    pub fn set_quality(&mut self, quality: i32) -> Result<()> {
        check_quality(quality)?;
        self.compressor
            .set_quality(quality)
            .map_err(|e| BridgeError::Encode(format!("Failed to set JPEG quality: {}", e)))?;
        self.quality = quality;
        Ok(())
    }

    /// Encode the `crop` region (whole frame when `None`) of a
    /// `width`x`height` frame stored as `format`
    pub fn encode(
        &mut self,
        frame: &[u8],
        format: YuvLayout,
        width: i32,
        height: i32,
        crop: Option<CropRect>,
    ) -> Result<Vec<u8>> {
        let layout = compute_layout(frame.len(), width, height, format, Orientation::Upright)?;
        let (w, h) = layout.dimensions();
        let crop = crop.unwrap_or_else(|| CropRect::full(w, h));
        check_crop(&crop, w, h)?;

        let planes = match format {
            YuvLayout::Planar420 => {
                let src = layout.split_planar(frame)?;
                [
                    PlaneSource::new(src.y.data, src.y.stride, 1),
                    PlaneSource::new(src.u.data, src.u.stride, 1),
                    PlaneSource::new(src.v.data, src.v.stride, 1),
                ]
            }
            YuvLayout::SemiPlanar420 => {
                let src = layout.split_semi_planar(frame)?;
                // VU pairs: U is the second byte of each pair
                let u = src.vu.data.get(1..).unwrap_or_default();
                [
                    PlaneSource::new(src.y.data, src.y.stride, 1),
                    PlaneSource::new(u, src.vu.stride, 2),
                    PlaneSource::new(src.vu.data, src.vu.stride, 2),
                ]
            }
        };

        self.i420_buffer.resize(i420_size(crop.width, crop.height), 0);
        pack_planes(&planes, crop, YuvLayout::Planar420, &mut self.i420_buffer)?;

        let yuv_image = turbojpeg::YuvImage {
            pixels: self.i420_buffer.as_slice(),
            width: crop.width,
            height: crop.height,
            align: 1,
            subsamp: turbojpeg::Subsamp::Sub2x2,
        };
        let jpeg = self
            .compressor
            .compress_yuv_to_vec(yuv_image)
            .map_err(|e| BridgeError::Encode(format!("JPEG compression failed: {}", e)))?;

        tracing::debug!(
            width = crop.width,
            height = crop.height,
            quality = self.quality,
            "Encoded {} crop to {} byte JPEG",
            format,
            jpeg.len()
        );
        Ok(jpeg)
    }
}

/// One-shot form of [`JpegEncoder::encode`]
pub fn encode_jpeg(
    frame: &[u8],
    format: YuvLayout,
    width: i32,
    height: i32,
    crop: Option<CropRect>,
    quality: i32,
) -> Result<Vec<u8>> {
    JpegEncoder::new(quality)?.encode(frame, format, width, height, crop)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Luma gradient with neutral chroma
    fn gray_i420(width: usize, height: usize) -> Vec<u8> {
        let mut frame: Vec<u8> = (0..width * height).map(|i| (i % 200 + 16) as u8).collect();
        frame.resize(i420_size(width, height), 128);
        frame
    }

    fn assert_jpeg(jpeg: &[u8], width: usize, height: usize) {
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        let header = turbojpeg::read_header(jpeg).unwrap();
        assert_eq!((header.width, header.height), (width, height));
    }

    #[test]
    fn test_encode_i420_full_frame() {
        let frame = gray_i420(32, 16);
        let jpeg = encode_jpeg(&frame, YuvLayout::Planar420, 32, 16, None, 90).unwrap();
        assert_jpeg(&jpeg, 32, 16);
    }

    #[test]
    fn test_encode_nv21_with_crop() {
        // NV21 with neutral chroma has the same bytes as I420
        let frame = gray_i420(32, 16);
        let mut encoder = JpegEncoder::new(DEFAULT_QUALITY).unwrap();
        let crop = CropRect::new(8, 4, 16, 8);
        let jpeg = encoder
            .encode(&frame, YuvLayout::SemiPlanar420, 32, 16, Some(crop))
            .unwrap();
        assert_jpeg(&jpeg, 16, 8);

        // Encoder is reusable with a different crop and quality
        encoder.set_quality(50).unwrap();
        assert_eq!(encoder.quality(), 50);
        let jpeg = encoder
            .encode(&frame, YuvLayout::SemiPlanar420, 32, 16, None)
            .unwrap();
        assert_jpeg(&jpeg, 32, 16);
    }

    #[test]
    fn test_rejects_bad_quality() {
        assert_eq!(JpegEncoder::new(0).err().map(|e| e.status()), Some(i32::MIN));
        assert_eq!(JpegEncoder::new(101).err().map(|e| e.status()), Some(i32::MIN));
        let mut encoder = JpegEncoder::new(80).unwrap();
        assert!(encoder.set_quality(-1).is_err());
        assert_eq!(encoder.quality(), 80);
    }

    #[test]
    fn test_rejects_bad_frames_and_crops() {
        let frame = gray_i420(32, 16);
        let err = encode_jpeg(&frame[..100], YuvLayout::Planar420, 32, 16, None, 90).unwrap_err();
        assert_eq!(err.status(), -4);

        let outside = CropRect::new(20, 0, 16, 8);
        let err = encode_jpeg(&frame, YuvLayout::Planar420, 32, 16, Some(outside), 90)
            .unwrap_err();
        assert_eq!(err.status(), i32::MIN);

        let odd = CropRect::new(0, 0, 15, 8);
        let err = encode_jpeg(&frame, YuvLayout::Planar420, 32, 16, Some(odd), 90).unwrap_err();
        assert_eq!(err.status(), -5);
    }

    #[test]
    fn test_crop_bounds() {
        assert!(check_crop(&CropRect::full(32, 16), 32, 16).is_ok());
        assert!(check_crop(&CropRect::new(2, 2, 30, 14), 32, 16).is_ok());
        assert!(check_crop(&CropRect::new(usize::MAX, 0, 2, 2), 32, 16).is_err());
        assert!(check_crop(&CropRect::new(0, 10, 2, 8), 32, 16).is_err());
    }
}
