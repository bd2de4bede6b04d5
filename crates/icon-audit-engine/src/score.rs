//! Final collapse from aggregated metric columns to one scalar per name.

use icon_audit_types::{AggregateRow, Metric, ScoreRow};

/// Averages the metric columns of each aggregated row into a single score,
/// skipping NaN columns. A row with no finite column at all scores NaN.
pub fn collapse_scores(rows: &[AggregateRow]) -> Vec<ScoreRow> {
    rows.iter()
        .map(|row| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for metric in Metric::ALL {
                let value = row.metrics.get(metric);
                if !value.is_nan() {
                    sum += value;
                    count += 1;
                }
            }
            let score = if count == 0 { f64::NAN } else { sum / count as f64 };
            ScoreRow {
                name: row.name.clone(),
                owned: row.owned,
                score,
            }
        })
        .collect()
}
