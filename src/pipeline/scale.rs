use fast_image_resize as fr;
use fr::images::Image;

use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{PixelBuffer, PixelFormat};

/// Region of the source (in source pixels) that survives fill-and-crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Work out which part of a `src_w`x`src_h` image covers `dst_w`x`dst_h`.
///
/// Scales to the destination width first; if that leaves the height short,
/// rescales to the destination height instead. The overflowing axis is
/// cropped evenly on both sides. All dimensions must be non-zero.
pub fn fill_crop_box(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> CropBox {
    let (src_w, src_h) = (f64::from(src_w), f64::from(src_h));
    let (dst_w, dst_h) = (f64::from(dst_w), f64::from(dst_h));

    let mut scale = dst_w / src_w;
    if src_h * scale < dst_h {
        scale = dst_h / src_h;
    }

    let width = (dst_w / scale).min(src_w);
    let height = (dst_h / scale).min(src_h);
    CropBox {
        left: (src_w - width) / 2.0,
        top: (src_h - height) / 2.0,
        width,
        height,
    }
}

/// Scale an RGBA frame to exactly `dst_w`x`dst_h`, preserving aspect ratio
/// by cropping overflow (never letterboxing).
///
/// Any zero dimension on either side yields an empty buffer.
pub fn scale_to_fill(src: PixelBuffer, dst_w: u32, dst_h: u32) -> Result<PixelBuffer> {
    if src.format != PixelFormat::Rgba {
        return Err(CaptureError::InvalidBuffer(format!(
            "scaler expects Rgba, got {:?}",
            src.format
        )));
    }
    if dst_w == 0 || dst_h == 0 || src.width == 0 || src.height == 0 {
        return Ok(PixelBuffer::empty(PixelFormat::Rgba));
    }
    src.validate()?;

    if src.width == dst_w && src.height == dst_h {
        return Ok(src);
    }

    let crop = fill_crop_box(src.width, src.height, dst_w, dst_h);

    let src_image = Image::from_vec_u8(src.width, src.height, src.data, fr::PixelType::U8x4)
        .map_err(|e| CaptureError::InvalidBuffer(format!("source image rejected: {e}")))?;
    let mut dst_image = Image::new(dst_w, dst_h, fr::PixelType::U8x4);

    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear))
        .crop(crop.left, crop.top, crop.width, crop.height);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CaptureError::InvalidBuffer(format!("resize failed: {e}")))?;

    Ok(PixelBuffer {
        width: dst_w,
        height: dst_h,
        format: PixelFormat::Rgba,
        data: dst_image.into_vec(),
    })
}
