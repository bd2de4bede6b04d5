//! Representation builder: raw frame in, binary mask or blurred color field out.

use std::path::Path;

use icon_audit_types::{RgbFrame, SweepConfig};

use crate::pipeline::ops::{blur_plane, gaussian_kernel, grayscale_rgb, threshold_inverse};

/// Fixed border removed from every edge before any processing; strips the
/// platform chrome around store icons.
pub const BORDER_CROP: usize = 18;

/// Edge length of the black placeholder substituted for unreadable images.
pub const PLACEHOLDER_EDGE: u32 = 256;

/// Grayscale, blurred, inverse-thresholded 0/255 representation.
#[derive(Debug, Clone)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl BinaryMask {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Blurred, unthresholded RGB representation used by the color metrics.
#[derive(Debug, Clone)]
pub struct ColorField {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

impl ColorField {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes an image from disk. An unreadable or undecodable file yields a
/// black placeholder frame so the sweep degrades instead of aborting.
pub fn load_frame(path: &Path) -> RgbFrame {
    match image::open(path) {
        Ok(decoded) => {
            let rgb = decoded.to_rgb8();
            let (width, height) = rgb.dimensions();
            match RgbFrame::from_owned(width, height, rgb.into_raw()) {
                Ok(frame) => frame,
                Err(_) => placeholder_frame(),
            }
        }
        Err(_) => placeholder_frame(),
    }
}

pub fn placeholder_frame() -> RgbFrame {
    let edge = PLACEHOLDER_EDGE as usize;
    RgbFrame::from_owned(PLACEHOLDER_EDGE, PLACEHOLDER_EDGE, vec![0u8; edge * edge * 3])
        .expect("placeholder frame dimensions are static")
}

/// Interleaved RGB bytes of the frame with `BORDER_CROP` removed from each
/// edge. A frame too small for the crop collapses to an empty buffer; every
/// metric downstream fails independently on empty input.
fn crop_rgb(frame: &RgbFrame) -> (usize, usize, Vec<u8>) {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    if width <= 2 * BORDER_CROP || height <= 2 * BORDER_CROP {
        return (0, 0, Vec::new());
    }
    let out_w = width - 2 * BORDER_CROP;
    let out_h = height - 2 * BORDER_CROP;
    let data = frame.data();
    let mut cropped = Vec::with_capacity(out_w * out_h * 3);
    for y in 0..out_h {
        let src_row = (y + BORDER_CROP) * width + BORDER_CROP;
        cropped.extend_from_slice(&data[src_row * 3..(src_row + out_w) * 3]);
    }
    (out_w, out_h, cropped)
}

/// Builds the binary representation for one sweep configuration: crop,
/// grayscale, Gaussian blur, inverse binary threshold.
pub fn binary_mask(frame: &RgbFrame, config: SweepConfig) -> BinaryMask {
    let (width, height, rgb) = crop_rgb(frame);
    if width == 0 || height == 0 {
        return BinaryMask {
            width,
            height,
            pixels: Vec::new(),
        };
    }
    let gray = grayscale_rgb(&rgb, width, height);
    let kernel = gaussian_kernel(config.kernel as usize);
    let blurred = blur_plane(&gray, width, height, &kernel);
    let pixels = threshold_inverse(&blurred, config.threshold);
    BinaryMask {
        width,
        height,
        pixels,
    }
}

/// Builds the color representation: crop and per-channel Gaussian blur, no
/// thresholding. The threshold component of the configuration is ignored here.
pub fn color_field(frame: &RgbFrame, config: SweepConfig) -> ColorField {
    let (width, height, rgb) = crop_rgb(frame);
    if width == 0 || height == 0 {
        return ColorField {
            width,
            height,
            rgb: Vec::new(),
        };
    }
    let kernel = gaussian_kernel(config.kernel as usize);
    let mut blurred = vec![0u8; rgb.len()];
    let mut plane = vec![0u8; width * height];
    for channel in 0..3 {
        for (i, value) in plane.iter_mut().enumerate() {
            *value = rgb[i * 3 + channel];
        }
        let smoothed = blur_plane(&plane, width, height, &kernel);
        for (i, &value) in smoothed.iter().enumerate() {
            blurred[i * 3 + channel] = value;
        }
    }
    ColorField {
        width,
        height,
        rgb: blurred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> RgbFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        RgbFrame::from_owned(width, height, data).unwrap()
    }

    fn config(threshold: u8, kernel: u8) -> SweepConfig {
        SweepConfig { threshold, kernel }
    }

    #[test]
    fn crop_removes_the_fixed_border() {
        let frame = solid_frame(100, 60, [10, 20, 30]);
        let mask = binary_mask(&frame, config(120, 3));
        assert_eq!(mask.width, 100 - 2 * BORDER_CROP);
        assert_eq!(mask.height, 60 - 2 * BORDER_CROP);
        assert_eq!(mask.pixels.len(), mask.len());
        let field = color_field(&frame, config(120, 3));
        assert_eq!((field.width, field.height), (mask.width, mask.height));
    }

    #[test]
    fn too_small_frames_collapse_to_empty_representations() {
        let frame = solid_frame(36, 36, [200, 200, 200]);
        assert!(binary_mask(&frame, config(120, 3)).is_empty());
        assert!(color_field(&frame, config(120, 3)).is_empty());
    }

    #[test]
    fn dark_pixels_invert_to_foreground() {
        // Solid red: luma 76, below every sweep threshold, so the whole mask
        // is foreground (255).
        let frame = solid_frame(64, 64, [255, 0, 0]);
        let mask = binary_mask(&frame, config(90, 3));
        assert!(mask.pixels.iter().all(|&v| v == 255));
        // A bright frame thresholds to background.
        let frame = solid_frame(64, 64, [250, 250, 250]);
        let mask = binary_mask(&frame, config(220, 3));
        assert!(mask.pixels.iter().all(|&v| v == 0));
    }

    #[test]
    fn color_field_keeps_solid_colors_intact() {
        let frame = solid_frame(64, 64, [12, 200, 77]);
        let field = color_field(&frame, config(150, 7));
        for px in field.rgb.chunks_exact(3) {
            assert_eq!(px, &[12, 200, 77]);
        }
    }

    #[test]
    fn unreadable_paths_yield_the_placeholder() {
        let frame = load_frame(Path::new("/nonexistent/icon.png"));
        assert_eq!(frame.width(), PLACEHOLDER_EDGE);
        assert_eq!(frame.height(), PLACEHOLDER_EDGE);
        assert!(frame.data().iter().all(|&b| b == 0));
    }
}
