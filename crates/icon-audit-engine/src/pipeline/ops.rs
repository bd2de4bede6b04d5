//! Low-level pixel operations shared by the preprocessing stage.

/// Mirrors an out-of-range index back into `0..len` without repeating the
/// border sample (reflect-101, the convention the original pipeline's blur
/// used at image edges).
pub fn reflect101(index: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let last = len as isize - 1;
    if last == 0 {
        return 0;
    }
    let period = 2 * last;
    let mut i = index.rem_euclid(period);
    if i > last {
        i = period - i;
    }
    i as usize
}

/// Normalized 1-D Gaussian kernel for an odd size `k`, with sigma derived from
/// the kernel size the same way the original pipeline's library derives it:
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(k: usize) -> Vec<f64> {
    assert!(k % 2 == 1, "gaussian kernel size must be odd");
    let sigma = 0.3 * ((k as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (k / 2) as isize;
    let mut kernel = Vec::with_capacity(k);
    let mut total = 0.0;
    for i in 0..k as isize {
        let x = (i - center) as f64;
        let value = (-x * x / (2.0 * sigma * sigma)).exp();
        kernel.push(value);
        total += value;
    }
    for value in kernel.iter_mut() {
        *value /= total;
    }
    kernel
}

/// Separable Gaussian blur of a single 8-bit plane with reflect-101 borders.
pub fn blur_plane(pixels: &[u8], width: usize, height: usize, kernel: &[f64]) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f64; pixels.len()];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut sum = 0.0;
            for (tap, &weight) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + tap as isize - radius, width);
                sum += pixels[row + sx] as f64 * weight;
            }
            horizontal[row + x] = sum;
        }
    }

    let mut output = vec![0u8; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (tap, &weight) in kernel.iter().enumerate() {
                let sy = reflect101(y as isize + tap as isize - radius, height);
                sum += horizontal[sy * width + x] * weight;
            }
            output[y * width + x] = sum.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

/// Luma conversion with the original pipeline's BT.601 weights.
pub fn grayscale_rgb(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    assert_eq!(rgb.len(), width * height * 3);
    let mut gray = Vec::with_capacity(width * height);
    for px in rgb.chunks_exact(3) {
        let value = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
        gray.push(value.round().clamp(0.0, 255.0) as u8);
    }
    gray
}

/// Inverse binary threshold: values above the threshold become 0, the rest 255.
pub fn threshold_inverse(pixels: &[u8], threshold: u8) -> Vec<u8> {
    pixels
        .iter()
        .map(|&v| if v > threshold { 0 } else { 255 })
        .collect()
}
