//! Chroma keying: HSV band to binary alpha.
//!
//! HSV uses the 8-bit OpenCV convention: H in 0..180 (degrees halved),
//! S and V in 0..=255. A configured `h: 70` therefore means 140°.

use serde::{Deserialize, Serialize};

use crate::capture::error::{CaptureError, Result};
use crate::capture::types::{PixelBuffer, PixelFormat};

/// Exclusive upper bound of the hue channel.
pub const HUE_RANGE: u16 = 180;

/// One HSV triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive HSV band keyed out to transparent.
///
/// `lower <= upper` is not required; an inverted channel simply matches
/// nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Whether `hsv` lies inside the band on every channel.
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }
}

/// Convert one 8-bit RGB pixel to HSV.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        ((u32::from(diff) * 255 + u32::from(v) / 2) / u32::from(v)) as u8
    };

    if diff == 0 {
        return Hsv::new(0, s, v);
    }

    let (rf, gf, bf, df) = (f32::from(r), f32::from(g), f32::from(b), f32::from(diff));
    let degrees = if v == r {
        60.0 * (gf - bf) / df
    } else if v == g {
        120.0 + 60.0 * (bf - rf) / df
    } else {
        240.0 + 60.0 * (rf - gf) / df
    };
    let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };
    let h = (degrees / 2.0).round() as u16 % HUE_RANGE;

    Hsv::new(h as u8, s, v)
}

/// Channel offsets of R, G, B within one pixel of `format`.
fn rgb_offsets(format: PixelFormat) -> (usize, usize, usize) {
    match format {
        PixelFormat::Bgr | PixelFormat::Bgra => (2, 1, 0),
        PixelFormat::Rgba => (0, 1, 2),
    }
}

/// Key out every pixel inside `range`.
///
/// Output is RGBA with the source dimensions: alpha 0 inside the band,
/// 255 everywhere else. Any source alpha is discarded.
pub fn apply_chroma_key(src: &PixelBuffer, range: &HsvRange) -> Result<PixelBuffer> {
    src.validate()?;

    let channels = src.format.channels();
    let (ri, gi, bi) = rgb_offsets(src.format);

    let mut rgba = Vec::with_capacity(src.width as usize * src.height as usize * 4);
    for px in src.data.chunks_exact(channels) {
        let (r, g, b) = (px[ri], px[gi], px[bi]);
        let alpha = if range.contains(rgb_to_hsv(r, g, b)) {
            0
        } else {
            255
        };
        rgba.extend_from_slice(&[r, g, b, alpha]);
    }

    if rgba.len() != src.width as usize * src.height as usize * 4 {
        return Err(CaptureError::InvalidBuffer(format!(
            "chroma key produced {} bytes for {}x{}",
            rgba.len(),
            src.width,
            src.height
        )));
    }

    Ok(PixelBuffer {
        width: src.width,
        height: src.height,
        format: PixelFormat::Rgba,
        data: rgba,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN_KEY: HsvRange = HsvRange::new(Hsv::new(50, 100, 100), Hsv::new(70, 255, 255));

    fn solid_bgr(width: u32, height: u32, b: u8, g: u8, r: u8) -> PixelBuffer {
        let data = [b, g, r].repeat((width * height) as usize);
        PixelBuffer::new(width, height, PixelFormat::Bgr, data).unwrap()
    }

    fn alphas(buffer: &PixelBuffer) -> Vec<u8> {
        buffer.data.chunks_exact(4).map(|px| px[3]).collect()
    }

    #[test]
    fn rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), Hsv::new(120, 255, 255));
    }

    #[test]
    fn rgb_to_hsv_secondaries() {
        assert_eq!(rgb_to_hsv(255, 255, 0), Hsv::new(30, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 255), Hsv::new(90, 255, 255));
        assert_eq!(rgb_to_hsv(255, 0, 255), Hsv::new(150, 255, 255));
    }

    #[test]
    fn rgb_to_hsv_greys_have_zero_hue_and_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), Hsv::new(0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), Hsv::new(0, 0, 128));
        assert_eq!(rgb_to_hsv(255, 255, 255), Hsv::new(0, 0, 255));
    }

    #[test]
    fn rgb_to_hsv_hue_near_red_wraps_to_zero() {
        // 359° would round to 180, which wraps back to 0.
        let hsv = rgb_to_hsv(255, 0, 2);
        assert_eq!(hsv.h, 0);
    }

    #[test]
    fn rgb_to_hsv_reaches_configured_green() {
        // RGB(43, 200, 95) is the classic chroma green used by the defaults.
        assert_eq!(rgb_to_hsv(43, 200, 95), Hsv::new(70, 200, 200));
    }

    #[test]
    fn hsv_range_is_inclusive_on_both_ends() {
        assert!(GREEN_KEY.contains(Hsv::new(50, 100, 100)));
        assert!(GREEN_KEY.contains(Hsv::new(70, 255, 255)));
        assert!(!GREEN_KEY.contains(Hsv::new(49, 200, 200)));
        assert!(!GREEN_KEY.contains(Hsv::new(71, 200, 200)));
        assert!(!GREEN_KEY.contains(Hsv::new(60, 99, 200)));
    }

    #[test]
    fn inverted_range_matches_nothing() {
        let inverted = HsvRange::new(Hsv::new(70, 255, 255), Hsv::new(50, 100, 100));
        assert!(!inverted.contains(Hsv::new(60, 200, 200)));
    }

    #[test]
    fn output_is_rgba_with_four_bytes_per_pixel() {
        let src = solid_bgr(7, 5, 10, 20, 30);
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert_eq!(out.format, PixelFormat::Rgba);
        assert_eq!(out.data.len(), 7 * 5 * 4);
        assert_eq!((out.width, out.height), (7, 5));
    }

    #[test]
    fn solid_configured_green_is_fully_transparent() {
        let src = solid_bgr(16, 9, 95, 200, 43);
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert!(alphas(&out).iter().all(|&a| a == 0));
    }

    #[test]
    fn pixels_outside_band_stay_opaque() {
        // Pure red, hue 0.
        let src = solid_bgr(4, 4, 0, 0, 255);
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert!(alphas(&out).iter().all(|&a| a == 255));
    }

    #[test]
    fn alpha_is_strictly_binary() {
        let mut data = Vec::new();
        for i in 0..=255u8 {
            data.extend_from_slice(&[i, 255 - i, i / 2]);
        }
        let src = PixelBuffer::new(256, 1, PixelFormat::Bgr, data).unwrap();
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert!(alphas(&out).iter().all(|&a| a == 0 || a == 255));
        assert!(alphas(&out).contains(&0));
        assert!(alphas(&out).contains(&255));
    }

    #[test]
    fn colour_channels_are_reordered_to_rgba() {
        let src = PixelBuffer::new(1, 1, PixelFormat::Bgra, vec![1, 2, 3, 77]).unwrap();
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert_eq!(out.data, vec![3, 2, 1, 255]);
    }

    #[test]
    fn rgba_input_keeps_channel_order() {
        let src = PixelBuffer::new(1, 1, PixelFormat::Rgba, vec![43, 200, 95, 255]).unwrap();
        let out = apply_chroma_key(&src, &GREEN_KEY).unwrap();
        assert_eq!(out.data, vec![43, 200, 95, 0]);
    }

    #[test]
    fn mismatched_length_is_invalid_buffer() {
        let src = PixelBuffer {
            width: 4,
            height: 4,
            format: PixelFormat::Bgr,
            data: vec![0; 10],
        };
        let result = apply_chroma_key(&src, &GREEN_KEY);
        assert!(matches!(result, Err(CaptureError::InvalidBuffer(_))));
    }

    #[test]
    fn empty_range_keeps_everything_and_full_range_drops_everything() {
        let src = solid_bgr(3, 3, 95, 200, 43);
        let empty = HsvRange::new(Hsv::new(1, 1, 1), Hsv::new(0, 0, 0));
        let full = HsvRange::new(Hsv::new(0, 0, 0), Hsv::new(179, 255, 255));
        assert!(alphas(&apply_chroma_key(&src, &empty).unwrap())
            .iter()
            .all(|&a| a == 255));
        assert!(alphas(&apply_chroma_key(&src, &full).unwrap())
            .iter()
            .all(|&a| a == 0));
    }

    #[test]
    fn hsv_range_deserialises_from_config_shape() {
        let json = r#"{"lower":{"h":50,"s":100,"v":100},"upper":{"h":70,"s":255,"v":255}}"#;
        let range: HsvRange = serde_json::from_str(json).unwrap();
        assert_eq!(range, GREEN_KEY);
    }
}
