//! Per-name reduction of normalized study rows.

use std::collections::BTreeMap;

use icon_audit_types::{AggregateRow, Metric, MetricRow, MetricSet, Reducer};

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.filter(|v| !v.is_nan()) {
        sum += v;
        count += 1;
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

fn nan_max(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { acc.max(v) })
}

/// Collapses all rows sharing a query name into one row per name. Columns
/// reduce per the metric's reducer table; cells that are NaN are skipped, and
/// a column with no finite values stays NaN.
pub fn aggregate_rows(rows: &[MetricRow]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<&str, Vec<&MetricRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(&row.name).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(name, group)| {
            let mut metrics = MetricSet::nan();
            for metric in Metric::ALL {
                let values = group.iter().map(|row| row.metrics.get(metric));
                let reduced = match metric.reducer() {
                    Reducer::Mean => nan_mean(values),
                    Reducer::Max => nan_max(values),
                };
                metrics.set(metric, reduced);
            }
            AggregateRow {
                name: name.to_string(),
                owned: nan_mean(group.iter().map(|row| row.owned)),
                metrics,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use icon_audit_types::SweepConfig;
    use std::path::PathBuf;

    fn row(name: &str, match_count: f64, ssim: f64) -> MetricRow {
        let mut metrics = MetricSet::nan();
        metrics.set(Metric::MatchCount, match_count);
        metrics.set(Metric::Ssim, ssim);
        MetricRow {
            name: name.into(),
            path: PathBuf::from("query.png"),
            anchor: "anchor".into(),
            config: SweepConfig {
                threshold: 90,
                kernel: 3,
            },
            owned: f64::NAN,
            metrics,
        }
    }

    #[test]
    fn counts_take_the_maximum_and_the_rest_average() {
        let rows = vec![row("app", 3.0, 0.2), row("app", 7.0, 0.6)];
        let aggregated = aggregate_rows(&rows);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].metrics.get(Metric::MatchCount), 7.0);
        assert!((aggregated[0].metrics.get(Metric::Ssim) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn nan_cells_are_skipped_not_propagated() {
        let rows = vec![row("app", f64::NAN, 0.5), row("app", 2.0, f64::NAN)];
        let aggregated = aggregate_rows(&rows);
        assert_eq!(aggregated[0].metrics.get(Metric::MatchCount), 2.0);
        assert_eq!(aggregated[0].metrics.get(Metric::Ssim), 0.5);
        assert!(aggregated[0].metrics.get(Metric::Rmse).is_nan());
    }

    #[test]
    fn groups_are_keyed_by_name_and_ordered() {
        let rows = vec![row("b", 1.0, 0.1), row("a", 2.0, 0.2), row("b", 3.0, 0.3)];
        let aggregated = aggregate_rows(&rows);
        let names: Vec<&str> = aggregated.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(aggregated[1].metrics.get(Metric::MatchCount), 3.0);
    }

    #[test]
    fn row_order_does_not_change_the_result() {
        let mut rows = vec![row("app", 1.0, 0.25), row("app", 5.0, 0.75)];
        let forward = aggregate_rows(&rows);
        rows.reverse();
        let backward = aggregate_rows(&rows);
        assert_eq!(
            forward[0].metrics.get(Metric::Ssim),
            backward[0].metrics.get(Metric::Ssim)
        );
        assert_eq!(
            forward[0].metrics.get(Metric::MatchCount),
            backward[0].metrics.get(Metric::MatchCount)
        );
    }

    #[test]
    fn empty_input_aggregates_to_nothing() {
        assert!(aggregate_rows(&[]).is_empty());
    }
}
