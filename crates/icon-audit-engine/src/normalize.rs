//! Study-wide per-column normalization.

use icon_audit_types::{Metric, MetricRow, Polarity};

fn column_max(rows: &[MetricRow], metric: Metric) -> Option<f64> {
    rows.iter()
        .map(|row| row.metrics.get(metric))
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
}

/// Rescales every metric column of the study in place so all values land in
/// the "higher is more similar" unit range.
///
/// Each column divides by its NaN-ignoring maximum; a column whose maximum is
/// missing or zero becomes all NaN instead of dividing by zero. Distance
/// columns are then flipped with `1 - v`.
pub fn normalize_rows(rows: &mut [MetricRow]) {
    for metric in Metric::ALL {
        let max = column_max(rows, metric);
        match max {
            Some(max) if max != 0.0 => {
                for row in rows.iter_mut() {
                    let scaled = row.metrics.get(metric) / max;
                    let value = match metric.polarity() {
                        Polarity::Similarity => scaled,
                        Polarity::Distance => 1.0 - scaled,
                    };
                    row.metrics.set(metric, value);
                }
            }
            _ => {
                for row in rows.iter_mut() {
                    row.metrics.set(metric, f64::NAN);
                }
            }
        }
    }
}
