use std::fs;
use std::path::{Path, PathBuf};

use icon_audit_types::{StudyError, StudyResult};
use serde::Deserialize;

/// One scraped store listing. The scraping collaborator records more fields
/// than we need; everything beyond the image path and developer is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub img_path: PathBuf,
    pub developer: String,
}

impl Candidate {
    /// Query name used throughout the study: the image file stem.
    pub fn name(&self) -> String {
        self.img_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

pub fn load_candidates(path: &Path) -> StudyResult<Vec<Candidate>> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|err| {
        StudyError::configuration(format!(
            "candidate list {} is not valid JSON: {err}",
            path.display()
        ))
    })
}
