//! Full-reference similarity and distance metrics over binary masks.
//!
//! Windowed statistics run on integral images so each metric stays linear in
//! the pixel count. Windows whose denominator collapses to zero are skipped
//! rather than poisoning the window mean; a metric with no usable window at
//! all fails with `DegenerateDenominator`.

use icon_audit_types::MetricFailure;

use crate::pipeline::preprocess::BinaryMask;

const SSIM_WINDOW: usize = 11;
const UQI_WINDOW: usize = 8;
const SCC_WINDOW: usize = 8;

const SSIM_C1: f64 = 6.5025; // (0.01 * 255)^2
const SSIM_C2: f64 = 58.5225; // (0.03 * 255)^2

const MSSSIM_WEIGHTS: [f64; 5] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];

const VIF_SIGMA_NSQ: f64 = 2.0;
const VIF_EPS: f64 = 1e-10;

/// Resolution ratio constant of the dimensionless global error.
const ERGAS_RATIO: f64 = 4.0;

#[derive(Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Plane {
    fn from_mask(mask: &BinaryMask) -> Self {
        Self {
            width: mask.width,
            height: mask.height,
            data: mask.pixels.iter().map(|&v| v as f64).collect(),
        }
    }
}

fn check_pair(a: &BinaryMask, b: &BinaryMask) -> Result<(Plane, Plane), MetricFailure> {
    if a.is_empty() || b.is_empty() {
        return Err(MetricFailure::EmptyInput);
    }
    if a.width != b.width || a.height != b.height {
        return Err(MetricFailure::ShapeMismatch);
    }
    Ok((Plane::from_mask(a), Plane::from_mask(b)))
}

/// Summed-area table with a one-cell border of zeros.
struct Integral {
    width: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn new(data: &[f64], width: usize, height: usize) -> Self {
        let w1 = width + 1;
        let mut sums = vec![0.0f64; w1 * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += data[y * width + x];
                sums[(y + 1) * w1 + (x + 1)] = sums[y * w1 + (x + 1)] + row_sum;
            }
        }
        Self { width: w1, sums }
    }

    fn product(a: &[f64], b: &[f64], width: usize, height: usize) -> Self {
        let data: Vec<f64> = a.iter().zip(b).map(|(&x, &y)| x * y).collect();
        Self::new(&data, width, height)
    }

    fn window_sum(&self, x: usize, y: usize, ws: usize) -> f64 {
        let w1 = self.width;
        self.sums[(y + ws) * w1 + (x + ws)] + self.sums[y * w1 + x]
            - self.sums[y * w1 + (x + ws)]
            - self.sums[(y + ws) * w1 + x]
    }
}

struct WindowStats {
    mean_a: f64,
    mean_b: f64,
    var_a: f64,
    var_b: f64,
    cov: f64,
}

struct PairTables {
    width: usize,
    height: usize,
    ia: Integral,
    ib: Integral,
    iaa: Integral,
    ibb: Integral,
    iab: Integral,
}

impl PairTables {
    fn new(a: &Plane, b: &Plane) -> Self {
        Self {
            width: a.width,
            height: a.height,
            ia: Integral::new(&a.data, a.width, a.height),
            ib: Integral::new(&b.data, b.width, b.height),
            iaa: Integral::product(&a.data, &a.data, a.width, a.height),
            ibb: Integral::product(&b.data, &b.data, b.width, b.height),
            iab: Integral::product(&a.data, &b.data, a.width, a.height),
        }
    }

    fn stats(&self, x: usize, y: usize, ws: usize) -> WindowStats {
        let n = (ws * ws) as f64;
        let mean_a = self.ia.window_sum(x, y, ws) / n;
        let mean_b = self.ib.window_sum(x, y, ws) / n;
        let var_a = (self.iaa.window_sum(x, y, ws) / n - mean_a * mean_a).max(0.0);
        let var_b = (self.ibb.window_sum(x, y, ws) / n - mean_b * mean_b).max(0.0);
        let cov = self.iab.window_sum(x, y, ws) / n - mean_a * mean_b;
        WindowStats {
            mean_a,
            mean_b,
            var_a,
            var_b,
            cov,
        }
    }

    /// Applies `f` to every sliding window and averages the `Some` results.
    fn window_mean<F>(&self, ws: usize, f: F) -> Result<f64, MetricFailure>
    where
        F: Fn(&WindowStats) -> Option<f64>,
    {
        if self.width < ws || self.height < ws {
            return Err(MetricFailure::WindowTooLarge);
        }
        let mut total = 0.0;
        let mut count = 0usize;
        for y in 0..=self.height - ws {
            for x in 0..=self.width - ws {
                if let Some(value) = f(&self.stats(x, y, ws)) {
                    total += value;
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Err(MetricFailure::DegenerateDenominator);
        }
        Ok(total / count as f64)
    }
}

fn ssim_window(stats: &WindowStats) -> f64 {
    let luminance = 2.0 * stats.mean_a * stats.mean_b + SSIM_C1;
    let contrast = 2.0 * stats.cov + SSIM_C2;
    let denom_l = stats.mean_a * stats.mean_a + stats.mean_b * stats.mean_b + SSIM_C1;
    let denom_c = stats.var_a + stats.var_b + SSIM_C2;
    (luminance * contrast) / (denom_l * denom_c)
}

/// Structural similarity, mean over 11x11 sliding windows.
pub fn ssim(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let tables = PairTables::new(&pa, &pb);
    tables.window_mean(SSIM_WINDOW, |stats| Some(ssim_window(stats)))
}

/// Universal quality index, mean over 8x8 windows with a usable denominator.
pub fn uqi(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let tables = PairTables::new(&pa, &pb);
    tables.window_mean(UQI_WINDOW, |stats| {
        let denom = (stats.var_a + stats.var_b)
            * (stats.mean_a * stats.mean_a + stats.mean_b * stats.mean_b);
        if denom == 0.0 {
            return None;
        }
        Some(4.0 * stats.cov * stats.mean_a * stats.mean_b / denom)
    })
}

fn downsample_half(plane: &Plane) -> Plane {
    let width = plane.width / 2;
    let height = plane.height / 2;
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let i = 2 * y * plane.width + 2 * x;
            let sum = plane.data[i]
                + plane.data[i + 1]
                + plane.data[i + plane.width]
                + plane.data[i + plane.width + 1];
            data.push(sum / 4.0);
        }
    }
    Plane {
        width,
        height,
        data,
    }
}

fn ssim_and_cs(a: &Plane, b: &Plane) -> Result<(f64, f64), MetricFailure> {
    let tables = PairTables::new(a, b);
    let mean_ssim = tables.window_mean(SSIM_WINDOW, |stats| Some(ssim_window(stats)))?;
    let mean_cs = tables.window_mean(SSIM_WINDOW, |stats| {
        Some((2.0 * stats.cov + SSIM_C2) / (stats.var_a + stats.var_b + SSIM_C2))
    })?;
    Ok((mean_ssim, mean_cs))
}

/// Multi-scale structural similarity over five dyadic scales. The magnitude of
/// each factor is taken before exponentiation, so the result is the absolute
/// multi-scale score.
pub fn msssim(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (mut pa, mut pb) = check_pair(a, b)?;
    let mut value = 1.0;
    for (scale, &weight) in MSSSIM_WEIGHTS.iter().enumerate() {
        let (mean_ssim, mean_cs) = ssim_and_cs(&pa, &pb)?;
        if scale + 1 == MSSSIM_WEIGHTS.len() {
            value *= mean_ssim.abs().powf(weight);
        } else {
            value *= mean_cs.abs().powf(weight);
            pa = downsample_half(&pa);
            pb = downsample_half(&pb);
        }
    }
    Ok(value)
}

fn laplacian(plane: &Plane) -> Plane {
    use crate::pipeline::ops::reflect101;
    let width = plane.width;
    let height = plane.height;
    let mut data = vec![0.0f64; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut neighbors = 0.0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let sy = reflect101(y as isize + dy as isize, height);
                    let sx = reflect101(x as isize + dx as isize, width);
                    neighbors += plane.data[sy * width + sx];
                }
            }
            data[y * width + x] = 8.0 * plane.data[y * width + x] - neighbors;
        }
    }
    Plane {
        width,
        height,
        data,
    }
}

/// Spatial correlation coefficient: windowed Pearson correlation of the
/// high-pass filtered masks.
pub fn scc(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let tables = PairTables::new(&laplacian(&pa), &laplacian(&pb));
    tables.window_mean(SCC_WINDOW, |stats| {
        let denom = stats.var_a * stats.var_b;
        if denom <= 0.0 {
            return None;
        }
        Some(stats.cov / denom.sqrt())
    })
}

/// Root-mean-square error over the full mask.
pub fn rmse(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let total: f64 = pa
        .data
        .iter()
        .zip(&pb.data)
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum();
    Ok((total / pa.data.len() as f64).sqrt())
}

/// Relative dimensionless global error (single band).
pub fn ergas(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let n = pa.data.len() as f64;
    let mean_a: f64 = pa.data.iter().sum::<f64>() / n;
    if mean_a == 0.0 {
        return Err(MetricFailure::DegenerateDenominator);
    }
    let band_rmse = {
        let total: f64 = pa
            .data
            .iter()
            .zip(&pb.data)
            .map(|(&x, &y)| (x - y) * (x - y))
            .sum();
        (total / n).sqrt()
    };
    let ratio = band_rmse / mean_a;
    Ok(100.0 * ERGAS_RATIO * (ratio * ratio).sqrt())
}

/// Spectral angle mapper between the flattened masks.
pub fn sam(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (pa, pb) = check_pair(a, b)?;
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (&x, &y) in pa.data.iter().zip(&pb.data) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(MetricFailure::DegenerateDenominator);
    }
    let cosine = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Ok(cosine.acos())
}

fn gaussian_window(n: usize, sigma: f64) -> Vec<f64> {
    let center = (n / 2) as isize;
    let mut window = Vec::with_capacity(n);
    let mut total = 0.0;
    for i in 0..n as isize {
        let x = (i - center) as f64;
        let value = (-x * x / (2.0 * sigma * sigma)).exp();
        window.push(value);
        total += value;
    }
    for value in window.iter_mut() {
        *value /= total;
    }
    window
}

/// Separable valid-mode convolution with a symmetric 1-D window.
fn filter_valid(plane: &Plane, window: &[f64]) -> Plane {
    let n = window.len();
    let out_w = plane.width + 1 - n;
    let out_h = plane.height + 1 - n;
    let mut horizontal = vec![0.0f64; out_w * plane.height];
    for y in 0..plane.height {
        for x in 0..out_w {
            let mut sum = 0.0;
            for (tap, &weight) in window.iter().enumerate() {
                sum += plane.data[y * plane.width + x + tap] * weight;
            }
            horizontal[y * out_w + x] = sum;
        }
    }
    let mut data = vec![0.0f64; out_w * out_h];
    for y in 0..out_h {
        for x in 0..out_w {
            let mut sum = 0.0;
            for (tap, &weight) in window.iter().enumerate() {
                sum += horizontal[(y + tap) * out_w + x] * weight;
            }
            data[y * out_w + x] = sum;
        }
    }
    Plane {
        width: out_w,
        height: out_h,
        data,
    }
}

fn subsample_half(plane: &Plane) -> Plane {
    let width = plane.width.div_ceil(2);
    let height = plane.height.div_ceil(2);
    let mut data = Vec::with_capacity(width * height);
    for y in (0..plane.height).step_by(2) {
        for x in (0..plane.width).step_by(2) {
            data.push(plane.data[y * plane.width + x]);
        }
    }
    Plane {
        width,
        height,
        data,
    }
}

/// Pixel-domain visual information fidelity over four dyadic scales.
pub fn vifp(a: &BinaryMask, b: &BinaryMask) -> Result<f64, MetricFailure> {
    let (mut pa, mut pb) = check_pair(a, b)?;
    let mut num = 0.0;
    let mut den = 0.0;
    for scale in 1..=4usize {
        let n = (1usize << (4 - scale + 1)) + 1;
        let window = gaussian_window(n, n as f64 / 5.0);
        if scale > 1 {
            if pa.width < n || pa.height < n {
                return Err(MetricFailure::WindowTooLarge);
            }
            pa = subsample_half(&filter_valid(&pa, &window));
            pb = subsample_half(&filter_valid(&pb, &window));
        }
        if pa.width < n || pa.height < n {
            return Err(MetricFailure::WindowTooLarge);
        }
        let mu1 = filter_valid(&pa, &window);
        let mu2 = filter_valid(&pb, &window);
        let aa = Plane {
            width: pa.width,
            height: pa.height,
            data: pa.data.iter().map(|&v| v * v).collect(),
        };
        let bb = Plane {
            width: pb.width,
            height: pb.height,
            data: pb.data.iter().map(|&v| v * v).collect(),
        };
        let ab = Plane {
            width: pa.width,
            height: pa.height,
            data: pa.data.iter().zip(&pb.data).map(|(&x, &y)| x * y).collect(),
        };
        let e_aa = filter_valid(&aa, &window);
        let e_bb = filter_valid(&bb, &window);
        let e_ab = filter_valid(&ab, &window);

        for i in 0..mu1.data.len() {
            let m1 = mu1.data[i];
            let m2 = mu2.data[i];
            let mut sigma1 = (e_aa.data[i] - m1 * m1).max(0.0);
            let sigma2 = (e_bb.data[i] - m2 * m2).max(0.0);
            let sigma12 = e_ab.data[i] - m1 * m2;

            let mut g = sigma12 / (sigma1 + VIF_EPS);
            let mut sv = sigma2 - g * sigma12;
            if sigma1 < VIF_EPS {
                g = 0.0;
                sv = sigma2;
                sigma1 = 0.0;
            }
            if sigma2 < VIF_EPS {
                g = 0.0;
                sv = 0.0;
            }
            if g < 0.0 {
                sv = sigma2;
                g = 0.0;
            }
            if sv < VIF_EPS {
                sv = VIF_EPS;
            }
            num += (1.0 + g * g * sigma1 / (sv + VIF_SIGMA_NSQ)).log10();
            den += (1.0 + sigma1 / VIF_SIGMA_NSQ).log10();
        }
    }
    if den == 0.0 {
        return Err(MetricFailure::DegenerateDenominator);
    }
    Ok(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(width: usize, height: usize, pixels: Vec<u8>) -> BinaryMask {
        assert_eq!(pixels.len(), width * height);
        BinaryMask {
            width,
            height,
            pixels,
        }
    }

    /// Deterministic blocky pattern with enough structure for the windowed
    /// metrics to see variance.
    fn textured_mask(width: usize, height: usize, seed: u64) -> BinaryMask {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut cells = Vec::new();
        let cell = 4usize;
        let cells_w = width.div_ceil(cell);
        let cells_h = height.div_ceil(cell);
        for _ in 0..cells_w * cells_h {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            cells.push(if state >> 62 & 1 == 1 { 255u8 } else { 0u8 });
        }
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(cells[(y / cell) * cells_w + (x / cell)]);
            }
        }
        mask_from(width, height, pixels)
    }

    #[test]
    fn identical_masks_score_perfect_similarity() {
        let mask = textured_mask(64, 64, 7);
        assert!((ssim(&mask, &mask).unwrap() - 1.0).abs() < 1e-9);
        assert!((uqi(&mask, &mask).unwrap() - 1.0).abs() < 1e-9);
        assert!((scc(&mask, &mask).unwrap() - 1.0).abs() < 1e-9);
        let vif = vifp(&mask, &mask).unwrap();
        assert!((vif - 1.0).abs() < 1e-4, "vifp {vif}");
        // Five dyadic scales need at least a 176-pixel edge.
        let large = textured_mask(192, 192, 7);
        assert!((msssim(&large, &large).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn identical_masks_score_zero_distance() {
        let mask = textured_mask(48, 48, 3);
        assert_eq!(rmse(&mask, &mask).unwrap(), 0.0);
        assert_eq!(ergas(&mask, &mask).unwrap(), 0.0);
        assert!(sam(&mask, &mask).unwrap() < 1e-6);
    }

    #[test]
    fn diverging_masks_score_worse_than_identical() {
        let a = textured_mask(64, 64, 7);
        let b = textured_mask(64, 64, 8);
        assert!(ssim(&a, &b).unwrap() < 0.9);
        assert!(rmse(&a, &b).unwrap() > 50.0);
    }

    #[test]
    fn rmse_matches_a_hand_computed_value() {
        let a = mask_from(2, 2, vec![0, 0, 0, 0]);
        let b = mask_from(2, 2, vec![255, 0, 0, 0]);
        let expected = (255.0f64 * 255.0 / 4.0).sqrt();
        assert!((rmse(&a, &b).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn sam_of_disjoint_masks_is_a_right_angle() {
        let a = mask_from(2, 2, vec![255, 0, 255, 0]);
        let b = mask_from(2, 2, vec![0, 255, 0, 255]);
        let angle = sam(&a, &b).unwrap();
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn shape_mismatch_is_a_per_metric_failure() {
        let a = textured_mask(32, 32, 1);
        let b = textured_mask(30, 32, 1);
        assert_eq!(ssim(&a, &b).unwrap_err(), MetricFailure::ShapeMismatch);
        assert_eq!(rmse(&a, &b).unwrap_err(), MetricFailure::ShapeMismatch);
        assert_eq!(vifp(&a, &b).unwrap_err(), MetricFailure::ShapeMismatch);
    }

    #[test]
    fn windowed_metrics_reject_tiny_masks() {
        let a = textured_mask(8, 8, 2);
        assert_eq!(ssim(&a, &a).unwrap_err(), MetricFailure::WindowTooLarge);
        assert_eq!(msssim(&a, &a).unwrap_err(), MetricFailure::WindowTooLarge);
    }

    #[test]
    fn flat_masks_degenerate_where_variance_is_required() {
        let flat = mask_from(64, 64, vec![255u8; 64 * 64]);
        assert_eq!(
            uqi(&flat, &flat).unwrap_err(),
            MetricFailure::DegenerateDenominator
        );
        assert_eq!(
            scc(&flat, &flat).unwrap_err(),
            MetricFailure::DegenerateDenominator
        );
        assert_eq!(
            vifp(&flat, &flat).unwrap_err(),
            MetricFailure::DegenerateDenominator
        );
        // SSIM stays defined through its stabilizing constants.
        assert!((ssim(&flat, &flat).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_masks_fail_every_metric() {
        let empty = mask_from(0, 0, Vec::new());
        let other = textured_mask(32, 32, 5);
        assert_eq!(ssim(&empty, &other).unwrap_err(), MetricFailure::EmptyInput);
        assert_eq!(sam(&empty, &other).unwrap_err(), MetricFailure::EmptyInput);
    }
}
