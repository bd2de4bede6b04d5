//! Joint color-histogram comparison on the blurred color representations.

use icon_audit_types::MetricFailure;

use crate::pipeline::preprocess::ColorField;

const BINS_PER_CHANNEL: usize = 10;
const HIST_LEN: usize = BINS_PER_CHANNEL * BINS_PER_CHANNEL * BINS_PER_CHANNEL;

/// The four histogram comparisons produced in one pass. Correlation and
/// intersection grow with similarity; chi-square and Hellinger grow with
/// difference.
#[derive(Debug, Clone, Copy)]
pub struct ColorComparison {
    pub correlation: f64,
    pub intersection: f64,
    pub chi_square: f64,
    pub hellinger: f64,
}

fn histogram(field: &ColorField) -> [f64; HIST_LEN] {
    let mut hist = [0.0f64; HIST_LEN];
    for px in field.rgb.chunks_exact(3) {
        let r = px[0] as usize * BINS_PER_CHANNEL / 256;
        let g = px[1] as usize * BINS_PER_CHANNEL / 256;
        let b = px[2] as usize * BINS_PER_CHANNEL / 256;
        hist[(r * BINS_PER_CHANNEL + g) * BINS_PER_CHANNEL + b] += 1.0;
    }
    // L2 normalization, matching the original pipeline's histogram scaling.
    let norm = hist.iter().map(|&v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in hist.iter_mut() {
            *value /= norm;
        }
    }
    hist
}

/// Compares the joint 10x10x10 color histograms of two fields. A single
/// failure invalidates the whole comparison; the caller records NaN for all
/// four outputs.
pub fn compare_color(a: &ColorField, b: &ColorField) -> Result<ColorComparison, MetricFailure> {
    if a.is_empty() || b.is_empty() {
        return Err(MetricFailure::EmptyInput);
    }
    let ha = histogram(a);
    let hb = histogram(b);

    let mean_a = ha.iter().sum::<f64>() / HIST_LEN as f64;
    let mean_b = hb.iter().sum::<f64>() / HIST_LEN as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut intersection = 0.0;
    let mut chi_square = 0.0;
    let mut bhattacharyya = 0.0;
    for i in 0..HIST_LEN {
        let da = ha[i] - mean_a;
        let db = hb[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
        intersection += ha[i].min(hb[i]);
        if ha[i] > 0.0 {
            let diff = ha[i] - hb[i];
            chi_square += diff * diff / ha[i];
        }
        bhattacharyya += (ha[i] * hb[i]).sqrt();
    }

    let var_product = var_a * var_b;
    if var_product <= 0.0 {
        return Err(MetricFailure::DegenerateDenominator);
    }
    let correlation = cov / var_product.sqrt();

    let mean_product = mean_a * mean_b;
    if mean_product <= 0.0 {
        return Err(MetricFailure::DegenerateDenominator);
    }
    let scale = (mean_product * (HIST_LEN * HIST_LEN) as f64).sqrt();
    let hellinger = (1.0 - bhattacharyya / scale).max(0.0).sqrt();

    Ok(ColorComparison {
        correlation,
        intersection,
        chi_square,
        hellinger,
    })
}
