//! Shared domain models for the icon-audit workspace.
//!
//! This crate centralizes the lightweight data structures exchanged between the
//! study engine and the CLI: raw frames, the sweep configuration grid, the
//! fixed metric schema, study rows, and the error taxonomy. Keep it free of
//! image decoding and other heavy dependencies so every crate can depend on it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub type StudyResult<T> = Result<T, StudyError>;

/// Validated raw image container with interleaved RGB bytes.
#[derive(Clone)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl fmt::Debug for RgbFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RgbFrame {
    pub fn from_owned(width: u32, height: u32, data: Vec<u8>) -> StudyResult<Self> {
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(3))
            .ok_or_else(|| StudyError::InvalidFrame {
                reason: "calculated RGB length overflowed".into(),
            })?;
        if data.len() != required {
            return Err(StudyError::InvalidFrame {
                reason: format!(
                    "RGB buffer holds {} bytes, expected {} for {}x{}",
                    data.len(),
                    required,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One cell of the parameter sweep.
///
/// Invariants: `threshold` stays within the sweep range and `kernel` is odd.
/// Instances are produced by the engine's grid generator; the fields stay
/// public so tests and audit artifacts can read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SweepConfig {
    pub threshold: u8,
    pub kernel: u8,
}

/// Whether larger raw values mean "more alike" or "more different".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Similarity,
    Distance,
}

/// Per-metric reduction applied by the aggregation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Max,
}

/// The closed set of metrics computed by the suite.
///
/// Polarity and reducer live in static tables here instead of being inferred
/// from column-name substrings at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MatchCount,
    MatchDistance,
    Ssim,
    Uqi,
    Msssim,
    Scc,
    Vifp,
    Rmse,
    Ergas,
    Sam,
    ColorCorrelation,
    ColorIntersection,
    ColorChiSquare,
    ColorHellinger,
}

impl Metric {
    pub const COUNT: usize = 14;

    pub const ALL: [Metric; Self::COUNT] = [
        Metric::MatchCount,
        Metric::MatchDistance,
        Metric::Ssim,
        Metric::Uqi,
        Metric::Msssim,
        Metric::Scc,
        Metric::Vifp,
        Metric::Rmse,
        Metric::Ergas,
        Metric::Sam,
        Metric::ColorCorrelation,
        Metric::ColorIntersection,
        Metric::ColorChiSquare,
        Metric::ColorHellinger,
    ];

    /// Stable column name used in audit artifacts and reports.
    pub fn column(self) -> &'static str {
        match self {
            Metric::MatchCount => "match_count",
            Metric::MatchDistance => "match_distance",
            Metric::Ssim => "ssim",
            Metric::Uqi => "uqi",
            Metric::Msssim => "msssim",
            Metric::Scc => "scc",
            Metric::Vifp => "vifp",
            Metric::Rmse => "rmse",
            Metric::Ergas => "ergas",
            Metric::Sam => "sam",
            Metric::ColorCorrelation => "color_correlation",
            Metric::ColorIntersection => "color_intersection",
            Metric::ColorChiSquare => "color_chi_square",
            Metric::ColorHellinger => "color_hellinger",
        }
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Metric::MatchDistance
            | Metric::Rmse
            | Metric::Ergas
            | Metric::Sam
            | Metric::ColorChiSquare
            | Metric::ColorHellinger => Polarity::Distance,
            _ => Polarity::Similarity,
        }
    }

    pub fn reducer(self) -> Reducer {
        match self {
            Metric::MatchCount => Reducer::Max,
            _ => Reducer::Mean,
        }
    }
}

/// Fixed-schema container for the closed metric set.
///
/// Missing or failed metrics are explicit NaN, never absent fields.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricSet {
    pub match_count: f64,
    pub match_distance: f64,
    pub ssim: f64,
    pub uqi: f64,
    pub msssim: f64,
    pub scc: f64,
    pub vifp: f64,
    pub rmse: f64,
    pub ergas: f64,
    pub sam: f64,
    pub color_correlation: f64,
    pub color_intersection: f64,
    pub color_chi_square: f64,
    pub color_hellinger: f64,
}

impl MetricSet {
    pub fn nan() -> Self {
        Self {
            match_count: f64::NAN,
            match_distance: f64::NAN,
            ssim: f64::NAN,
            uqi: f64::NAN,
            msssim: f64::NAN,
            scc: f64::NAN,
            vifp: f64::NAN,
            rmse: f64::NAN,
            ergas: f64::NAN,
            sam: f64::NAN,
            color_correlation: f64::NAN,
            color_intersection: f64::NAN,
            color_chi_square: f64::NAN,
            color_hellinger: f64::NAN,
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::MatchCount => self.match_count,
            Metric::MatchDistance => self.match_distance,
            Metric::Ssim => self.ssim,
            Metric::Uqi => self.uqi,
            Metric::Msssim => self.msssim,
            Metric::Scc => self.scc,
            Metric::Vifp => self.vifp,
            Metric::Rmse => self.rmse,
            Metric::Ergas => self.ergas,
            Metric::Sam => self.sam,
            Metric::ColorCorrelation => self.color_correlation,
            Metric::ColorIntersection => self.color_intersection,
            Metric::ColorChiSquare => self.color_chi_square,
            Metric::ColorHellinger => self.color_hellinger,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::MatchCount => self.match_count = value,
            Metric::MatchDistance => self.match_distance = value,
            Metric::Ssim => self.ssim = value,
            Metric::Uqi => self.uqi = value,
            Metric::Msssim => self.msssim = value,
            Metric::Scc => self.scc = value,
            Metric::Vifp => self.vifp = value,
            Metric::Rmse => self.rmse = value,
            Metric::Ergas => self.ergas = value,
            Metric::Sam => self.sam = value,
            Metric::ColorCorrelation => self.color_correlation = value,
            Metric::ColorIntersection => self.color_intersection = value,
            Metric::ColorChiSquare => self.color_chi_square = value,
            Metric::ColorHellinger => self.color_hellinger = value,
        }
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::nan()
    }
}

/// One raw sweep record: a query compared against one anchor under one
/// configuration.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub name: String,
    pub path: PathBuf,
    pub anchor: String,
    #[serde(flatten)]
    pub config: SweepConfig,
    /// Ownership placeholder, NaN inside the sweep; real validity is resolved
    /// by the caller through the allow-list lookup.
    pub owned: f64,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

/// Reason a single metric computation failed. The metric value itself is
/// recorded as NaN; the reason is kept for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricFailure {
    #[error("empty representation")]
    EmptyInput,
    #[error("representation shapes differ")]
    ShapeMismatch,
    #[error("image smaller than the analysis window")]
    WindowTooLarge,
    #[error("no window with a usable denominator")]
    DegenerateDenominator,
    #[error("no descriptors extracted from one of the masks")]
    NoDescriptors,
    #[error("no matches survived the ratio test")]
    NoMatches,
}

/// A failed metric cell, retained alongside the NaN it produced.
#[derive(Debug, Clone)]
pub struct MetricFault {
    pub anchor: String,
    pub config: SweepConfig,
    pub metric: Metric,
    pub reason: MetricFailure,
}

/// Full sweep output for one (client, store, query image) triple.
#[derive(Debug, Clone, Default)]
pub struct Study {
    pub rows: Vec<MetricRow>,
    pub faults: Vec<MetricFault>,
}

impl Study {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One reduced value per metric column for a single query name.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRow {
    pub name: String,
    pub owned: f64,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

/// Collapsed scalar score for one query name.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRow {
    pub name: String,
    pub owned: f64,
    pub score: f64,
}

/// Final per-candidate record handed to the reporting layer.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRecord {
    pub name: String,
    pub developer: String,
    pub valid: bool,
    /// None when the score lookup found nothing for this query name.
    pub score: Option<f64>,
}

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("no anchor images (.png) found in {}", dir.display())]
    MissingAnchors { dir: PathBuf },

    #[error("query image {} is not a .png", path.display())]
    InvalidQueryFormat { path: PathBuf },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_columns_are_unique() {
        let names: HashSet<&str> = Metric::ALL.iter().map(|m| m.column()).collect();
        assert_eq!(names.len(), Metric::COUNT);
    }

    #[test]
    fn reducer_table_marks_only_the_count_as_max() {
        for metric in Metric::ALL {
            let expected = if metric == Metric::MatchCount {
                Reducer::Max
            } else {
                Reducer::Mean
            };
            assert_eq!(metric.reducer(), expected);
        }
    }

    #[test]
    fn distance_polarity_covers_the_inverted_columns() {
        let distances: Vec<Metric> = Metric::ALL
            .iter()
            .copied()
            .filter(|m| m.polarity() == Polarity::Distance)
            .collect();
        assert_eq!(
            distances,
            vec![
                Metric::MatchDistance,
                Metric::Rmse,
                Metric::Ergas,
                Metric::Sam,
                Metric::ColorChiSquare,
                Metric::ColorHellinger,
            ]
        );
    }

    #[test]
    fn metric_set_round_trips_through_accessors() {
        let mut set = MetricSet::nan();
        for metric in Metric::ALL {
            assert!(set.get(metric).is_nan());
        }
        set.set(Metric::Ssim, 0.5);
        set.set(Metric::ColorHellinger, 0.25);
        assert_eq!(set.get(Metric::Ssim), 0.5);
        assert_eq!(set.get(Metric::ColorHellinger), 0.25);
        assert!(set.get(Metric::Rmse).is_nan());
    }

    #[test]
    fn frame_rejects_short_buffers() {
        let err = RgbFrame::from_owned(4, 4, vec![0u8; 10]).unwrap_err();
        assert!(matches!(err, StudyError::InvalidFrame { .. }));
        let frame = RgbFrame::from_owned(2, 2, vec![0u8; 12]).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.data().len(), 12);
    }
}
