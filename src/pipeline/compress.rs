use image::codecs::png::PngEncoder;
use image::{ImageBuffer, Rgba};

use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{PixelBuffer, PixelFormat};

/// Encode an RGBA frame as PNG, keeping the keyed-out alpha.
pub fn encode_png(frame: &PixelBuffer) -> Result<Vec<u8>> {
    if frame.format != PixelFormat::Rgba {
        return Err(CaptureError::InvalidBuffer(format!(
            "PNG export expects Rgba, got {:?}",
            frame.format
        )));
    }
    if frame.is_empty() {
        return Err(CaptureError::InvalidBuffer(
            "cannot encode an empty frame".to_string(),
        ));
    }
    let img: ImageBuffer<Rgba<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(
            || CaptureError::InvalidBuffer(format!("{}x{} frame is short", frame.width, frame.height)),
        )?;

    let mut buf = Vec::new();
    img.write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(|e| CaptureError::InvalidBuffer(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Largest size that fits inside `max_w`x`max_h` with the frame's aspect
/// ratio. Never upscales, never collapses an axis to zero.
pub fn thumbnail_size(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale = (f64::from(max_w) / f64::from(width))
        .min(f64::from(max_h) / f64::from(height))
        .min(1.0);
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Downscale an RGBA frame for the settings preview and encode it as PNG.
///
/// Uses `fast_image_resize` for SIMD-accelerated resizing.
pub fn compress_thumbnail(frame: &PixelBuffer, max_w: u32, max_h: u32) -> Result<Vec<u8>> {
    use fast_image_resize as fr;
    use fr::images::Image;

    if frame.is_empty() || max_w == 0 || max_h == 0 {
        return Err(CaptureError::InvalidBuffer(
            "cannot thumbnail an empty frame".to_string(),
        ));
    }
    frame.validate()?;

    let (thumb_w, thumb_h) = thumbnail_size(frame.width, frame.height, max_w, max_h);
    if (thumb_w, thumb_h) == (frame.width, frame.height) {
        return encode_png(frame);
    }

    let src_image = Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.data.clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| CaptureError::InvalidBuffer(format!("source image rejected: {e}")))?;
    let mut dst_image = Image::new(thumb_w, thumb_h, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, None)
        .map_err(|e| CaptureError::InvalidBuffer(format!("resize failed: {e}")))?;

    let thumb = PixelBuffer::new(thumb_w, thumb_h, PixelFormat::Rgba, dst_image.into_vec())?;
    encode_png(&thumb)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    /// Synthetic RGBA gradient with a transparent left half.
    fn make_test_rgba(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let alpha = if x < width / 2 { 0 } else { 255 };
                data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 128, alpha]);
            }
        }
        PixelBuffer::new(width, height, PixelFormat::Rgba, data).unwrap()
    }

    fn decode(png: &[u8]) -> image::RgbaImage {
        image::load_from_memory_with_format(png, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn encode_png_produces_png_bytes() {
        let png = encode_png(&make_test_rgba(64, 32)).unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn encode_png_keeps_alpha() {
        let png = encode_png(&make_test_rgba(8, 2)).unwrap();
        let img = decode(&png);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(7, 1)[3], 255);
    }

    #[test]
    fn encode_png_rejects_empty_and_non_rgba() {
        assert!(encode_png(&PixelBuffer::empty(PixelFormat::Rgba)).is_err());
        let bgr = PixelBuffer::new(1, 1, PixelFormat::Bgr, vec![1, 2, 3]).unwrap();
        assert!(encode_png(&bgr).is_err());
    }

    #[test]
    fn thumbnail_size_fits_inside_bounds() {
        assert_eq!(thumbnail_size(1920, 1080, 160, 120), (160, 90));
        assert_eq!(thumbnail_size(1080, 1920, 160, 120), (68, 120));
    }

    #[test]
    fn thumbnail_size_never_upscales() {
        assert_eq!(thumbnail_size(100, 50, 160, 120), (100, 50));
    }

    #[test]
    fn thumbnail_size_keeps_thin_frames_visible() {
        assert_eq!(thumbnail_size(4000, 1, 160, 120), (160, 1));
    }

    #[test]
    fn compress_thumbnail_produces_reduced_resolution() {
        let png = compress_thumbnail(&make_test_rgba(640, 360), 160, 120).unwrap();
        let img = decode(&png);
        assert_eq!(img.dimensions(), (160, 90));
    }

    #[test]
    fn compress_thumbnail_of_empty_frame_fails() {
        let result = compress_thumbnail(&PixelBuffer::empty(PixelFormat::Rgba), 160, 120);
        assert!(result.is_err());
    }
}
