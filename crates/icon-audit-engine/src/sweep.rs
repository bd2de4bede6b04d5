//! Sweep driver: one query against every anchor under every configuration.

use std::fs;
use std::path::{Path, PathBuf};

use icon_audit_types::{
    Metric, MetricFailure, MetricFault, MetricRow, MetricSet, RgbFrame, Study, StudyError,
    StudyResult, SweepConfig,
};
use rayon::prelude::*;

use crate::metrics::{compare_color, descriptor_matches, reference};
use crate::pipeline::preprocess::{BinaryMask, binary_mask, color_field, load_frame};

pub const THRESHOLD_MIN: u8 = 90;
pub const THRESHOLD_MAX: u8 = 220;
pub const THRESHOLD_STEP: u8 = 10;
pub const KERNELS: [u8; 3] = [3, 5, 7];

/// The full parameter grid: every threshold step crossed with every kernel.
pub fn sweep_grid() -> Vec<SweepConfig> {
    let mut grid = Vec::new();
    let mut threshold = THRESHOLD_MIN;
    while threshold <= THRESHOLD_MAX {
        for kernel in KERNELS {
            grid.push(SweepConfig { threshold, kernel });
        }
        threshold += THRESHOLD_STEP;
    }
    grid
}

/// Exact lowercase suffix; `icon.PNG` is not an anchor and not a valid query.
fn is_png(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("png")
}

fn anchor_paths(dir: &Path) -> StudyResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_png(&path) {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(StudyError::MissingAnchors {
            dir: dir.to_path_buf(),
        });
    }
    paths.sort();
    Ok(paths)
}

fn anchor_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}

type ReferenceMetric = fn(&BinaryMask, &BinaryMask) -> Result<f64, MetricFailure>;

const REFERENCE_SUITE: [(Metric, ReferenceMetric); 8] = [
    (Metric::Ssim, reference::ssim),
    (Metric::Uqi, reference::uqi),
    (Metric::Msssim, reference::msssim),
    (Metric::Scc, reference::scc),
    (Metric::Vifp, reference::vifp),
    (Metric::Rmse, reference::rmse),
    (Metric::Ergas, reference::ergas),
    (Metric::Sam, reference::sam),
];

const COLOR_COLUMNS: [Metric; 4] = [
    Metric::ColorCorrelation,
    Metric::ColorIntersection,
    Metric::ColorChiSquare,
    Metric::ColorHellinger,
];

/// Runs the whole metric battery for one (anchor, config) cell. Failed metrics
/// stay NaN in the set; their reasons come back alongside.
fn compare_pair(
    anchor: &RgbFrame,
    query: &RgbFrame,
    config: SweepConfig,
) -> (MetricSet, Vec<(Metric, MetricFailure)>) {
    let mut metrics = MetricSet::nan();
    let mut failures = Vec::new();

    let anchor_mask = binary_mask(anchor, config);
    let query_mask = binary_mask(query, config);

    let (count, distance) = descriptor_matches(&anchor_mask, &query_mask);
    metrics.set(Metric::MatchCount, count as f64);
    match distance {
        Ok(mean) => metrics.set(Metric::MatchDistance, mean),
        Err(reason) => failures.push((Metric::MatchDistance, reason)),
    }

    for (metric, compute) in REFERENCE_SUITE {
        match compute(&anchor_mask, &query_mask) {
            Ok(value) => metrics.set(metric, value),
            Err(reason) => failures.push((metric, reason)),
        }
    }

    let anchor_field = color_field(anchor, config);
    let query_field = color_field(query, config);
    match compare_color(&anchor_field, &query_field) {
        Ok(cmp) => {
            metrics.set(Metric::ColorCorrelation, cmp.correlation);
            metrics.set(Metric::ColorIntersection, cmp.intersection);
            metrics.set(Metric::ColorChiSquare, cmp.chi_square);
            metrics.set(Metric::ColorHellinger, cmp.hellinger);
        }
        // One histogram failure invalidates all four color columns.
        Err(reason) => failures.extend(COLOR_COLUMNS.map(|metric| (metric, reason))),
    }

    (metrics, failures)
}

/// Sweeps `query_path` against every `.png` anchor under `anchors_dir` across
/// the whole configuration grid. Cells run in parallel; row order stays
/// deterministic (anchors sorted by path, grid order within each anchor).
pub fn create_study(
    anchors_dir: &Path,
    query_path: &Path,
    query_name: &str,
) -> StudyResult<Study> {
    if !is_png(query_path) {
        return Err(StudyError::InvalidQueryFormat {
            path: query_path.to_path_buf(),
        });
    }

    let anchors: Vec<(String, RgbFrame)> = anchor_paths(anchors_dir)?
        .iter()
        .map(|path| (anchor_label(path), load_frame(path)))
        .collect();
    let query = load_frame(query_path);
    let grid = sweep_grid();

    let cells: Vec<(&(String, RgbFrame), SweepConfig)> = anchors
        .iter()
        .flat_map(|anchor| grid.iter().map(move |&config| (anchor, config)))
        .collect();

    let results: Vec<(MetricRow, Vec<MetricFault>)> = cells
        .par_iter()
        .map(|&((anchor_name, anchor_frame), config)| {
            let (metrics, failures) = compare_pair(anchor_frame, &query, config);
            let row = MetricRow {
                name: query_name.to_string(),
                path: query_path.to_path_buf(),
                anchor: anchor_name.clone(),
                config,
                owned: f64::NAN,
                metrics,
            };
            let faults = failures
                .into_iter()
                .map(|(metric, reason)| MetricFault {
                    anchor: anchor_name.clone(),
                    config,
                    metric,
                    reason,
                })
                .collect();
            (row, faults)
        })
        .collect();

    let mut study = Study::default();
    for (row, faults) in results {
        study.rows.push(row);
        study.faults.extend(faults);
    }
    Ok(study)
}
