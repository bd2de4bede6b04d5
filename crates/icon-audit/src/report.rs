use std::fmt;
use std::path::Path;

use icon_audit_types::{MetricRow, ScoreRecord};
use tokio::fs;

#[derive(Debug)]
pub enum OutputError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::Io(err) => write!(f, "I/O error: {err}"),
            OutputError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io(err) => Some(err),
            OutputError::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for OutputError {
    fn from(value: std::io::Error) -> Self {
        OutputError::Io(value)
    }
}

impl From<serde_json::Error> for OutputError {
    fn from(value: serde_json::Error) -> Self {
        OutputError::Json(value)
    }
}

/// Quotes a CSV field only when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_report(records: &[ScoreRecord]) -> String {
    let mut out = String::from("name,developer,valid,score\n");
    for record in records {
        let score = match record.score {
            Some(score) if !score.is_nan() => score.to_string(),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&record.name),
            csv_field(&record.developer),
            record.valid,
            score
        ));
    }
    out
}

pub async fn write_report(path: &Path, records: &[ScoreRecord]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, render_report(records)).await?;
    Ok(())
}

/// Writes the raw pre-normalization rows as a JSON audit artifact. Non-finite
/// metric values serialize as null.
pub async fn write_study_dump(path: &Path, rows: &[MetricRow]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let encoded = serde_json::to_vec_pretty(rows)?;
    fs::write(path, encoded).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, developer: &str, valid: bool, score: Option<f64>) -> ScoreRecord {
        ScoreRecord {
            name: name.into(),
            developer: developer.into(),
            valid,
            score,
        }
    }

    #[test]
    fn report_rows_render_one_line_per_record() {
        let rendered = render_report(&[
            record("acme_mail", "Acme Studios", true, Some(0.75)),
            record("other", "Someone Else", false, None),
        ]);
        assert_eq!(
            rendered,
            "name,developer,valid,score\n\
             acme_mail,Acme Studios,true,0.75\n\
             other,Someone Else,false,\n"
        );
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let rendered = render_report(&[record("a,b", "Dev \"X\"", true, Some(1.0))]);
        assert!(rendered.contains("\"a,b\",\"Dev \"\"X\"\"\",true,1\n"));
    }

    #[test]
    fn nan_scores_render_as_empty_cells() {
        let rendered = render_report(&[record("x", "d", false, Some(f64::NAN))]);
        assert!(rendered.ends_with("x,d,false,\n"));
    }

    #[tokio::test]
    async fn report_and_dump_create_their_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("reports/play/acme.csv");
        write_report(&report_path, &[record("a", "d", true, Some(0.5))])
            .await
            .unwrap();
        let written = std::fs::read_to_string(&report_path).unwrap();
        assert!(written.starts_with("name,developer,valid,score\n"));

        let dump_path = dir.path().join("data/misc/acme/play_study.json");
        write_study_dump(&dump_path, &[]).await.unwrap();
        let dumped = std::fs::read_to_string(&dump_path).unwrap();
        assert_eq!(dumped.trim(), "[]");
    }
}
