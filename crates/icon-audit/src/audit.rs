use std::path::Path;

use icon_audit_engine::{aggregate_rows, collapse_scores, create_study, normalize_rows};
use icon_audit_types::{MetricRow, ScoreRow, StudyResult};

use crate::candidates::Candidate;

/// Everything the engine produced for one candidate.
#[derive(Debug)]
pub struct CandidateOutcome {
    /// None when the score lookup found nothing for the query name.
    pub score: Option<f64>,
    /// Raw pre-normalization rows, kept only when an audit dump is requested.
    pub raw_rows: Vec<MetricRow>,
    pub fault_count: usize,
}

/// Runs the full study pipeline for one candidate: sweep, normalize,
/// aggregate, collapse, then pick out the candidate's own score row.
pub fn audit_candidate(
    anchors_dir: &Path,
    candidate: &Candidate,
    keep_raw_rows: bool,
) -> StudyResult<CandidateOutcome> {
    let name = candidate.name();
    let mut study = create_study(anchors_dir, &candidate.img_path, &name)?;
    let raw_rows = if keep_raw_rows {
        study.rows.clone()
    } else {
        Vec::new()
    };
    let fault_count = study.faults.len();

    normalize_rows(&mut study.rows);
    let aggregated = aggregate_rows(&study.rows);
    let scored = collapse_scores(&aggregated);
    let score = find_score(&scored, &name);

    Ok(CandidateOutcome {
        score,
        raw_rows,
        fault_count,
    })
}

/// Score lookup for one query name. A name absent from the scored rows is a
/// "no score" outcome, not an error.
fn find_score(scored: &[ScoreRow], name: &str) -> Option<f64> {
    scored
        .iter()
        .find(|row| row.name == name)
        .map(|row| row.score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use icon_audit_types::{Metric, MetricSet, SweepConfig};
    use std::fs;
    use std::path::PathBuf;

    fn save_icon(path: &Path, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(256, 256, image::Rgb(rgb))
            .save(path)
            .unwrap();
    }

    #[test]
    fn a_candidate_gets_a_score_and_optionally_its_raw_rows() {
        let dir = tempfile::tempdir().unwrap();
        let anchors = dir.path().join("anchors");
        fs::create_dir(&anchors).unwrap();
        save_icon(&anchors.join("brand.png"), [200, 40, 40]);
        let query = dir.path().join("candidate.png");
        save_icon(&query, [200, 40, 40]);

        let candidate = Candidate {
            img_path: query,
            developer: "Acme Studios".into(),
        };
        let outcome = audit_candidate(dir.path().join("anchors").as_path(), &candidate, true)
            .unwrap();
        assert!(outcome.score.is_some());
        assert!(!outcome.raw_rows.is_empty());

        let trimmed = audit_candidate(dir.path().join("anchors").as_path(), &candidate, false)
            .unwrap();
        assert!(trimmed.raw_rows.is_empty());
    }

    #[test]
    fn a_score_lookup_miss_reports_no_score() {
        let mut metrics = MetricSet::nan();
        metrics.set(Metric::Ssim, 0.8);
        metrics.set(Metric::Rmse, 0.2);
        let mut rows = vec![MetricRow {
            name: "someone_else".into(),
            path: PathBuf::from("someone_else.png"),
            anchor: "brand".into(),
            config: SweepConfig {
                threshold: 90,
                kernel: 3,
            },
            owned: f64::NAN,
            metrics,
        }];
        normalize_rows(&mut rows);
        let scored = collapse_scores(&aggregate_rows(&rows));
        // The absent name yields no score while the present one still does.
        assert!(find_score(&scored, "missing").is_none());
        assert!(find_score(&scored, "someone_else").is_some());
    }

    #[test]
    fn engine_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = Candidate {
            img_path: PathBuf::from("candidate.png"),
            developer: "Acme Studios".into(),
        };
        assert!(audit_candidate(dir.path(), &candidate, false).is_err());
    }
}
