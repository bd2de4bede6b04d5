mod allowlist;
mod audit;
mod candidates;
mod cli;
mod report;
mod settings;

use std::fmt;
use std::time::Duration;

use icon_audit_types::{MetricRow, ScoreRecord, StudyError};
use indicatif::{ProgressBar, ProgressStyle};

use crate::allowlist::AllowList;
use crate::report::OutputError;
use crate::settings::ConfigError;

#[derive(Debug)]
enum RunError {
    Config(ConfigError),
    Study(StudyError),
    Output(OutputError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(err) => write!(f, "{err}"),
            RunError::Study(err) => write!(f, "{err}"),
            RunError::Output(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(err) => Some(err),
            RunError::Study(err) => Some(err),
            RunError::Output(err) => Some(err),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(value: ConfigError) -> Self {
        RunError::Config(value)
    }
}

impl From<StudyError> for RunError {
    fn from(value: StudyError) -> Self {
        RunError::Study(value)
    }
}

impl From<OutputError> for RunError {
    fn from(value: OutputError) -> Self {
        RunError::Output(value)
    }
}

fn audit_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{bar:40.cyan/blue} {percent:>3}% {pos}/{len} candidates [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .expect("invalid audit bar template")
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), RunError> {
    let args = cli::parse_cli();
    let settings = settings::resolve_settings(&args)?;
    let allow = AllowList::load(&settings.allowlist)?;
    let candidates = candidates::load_candidates(&args.candidates)?;
    if candidates.is_empty() {
        println!("no candidates to audit for {}/{}", args.client, args.store);
        return Ok(());
    }

    let progress = ProgressBar::new(candidates.len() as u64);
    progress.set_style(audit_bar_style());
    progress.enable_steady_tick(Duration::from_millis(100));

    let keep_raw_rows = settings.study_dump.is_some();
    let mut records: Vec<ScoreRecord> = Vec::with_capacity(candidates.len());
    let mut dump_rows: Vec<MetricRow> = Vec::new();
    let mut fault_total = 0usize;

    for candidate in candidates {
        progress.set_message(candidate.name());
        let anchors_dir = settings.anchors_dir.clone();
        let task_candidate = candidate.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            audit::audit_candidate(&anchors_dir, &task_candidate, keep_raw_rows)
        })
        .await
        .expect("audit task panicked");

        let score = match outcome {
            Ok(outcome) => {
                fault_total += outcome.fault_count;
                dump_rows.extend(outcome.raw_rows);
                if outcome.score.is_none() {
                    progress.suspend(|| eprintln!("no score for {}", candidate.name()));
                }
                outcome.score
            }
            // A malformed query only loses its own record; the batch goes on.
            Err(err @ StudyError::InvalidQueryFormat { .. }) => {
                progress.suspend(|| eprintln!("skipping {}: {err}", candidate.name()));
                None
            }
            Err(err) => {
                progress.abandon_with_message("audit failed");
                return Err(err.into());
            }
        };

        records.push(ScoreRecord {
            name: candidate.name(),
            developer: candidate.developer.clone(),
            valid: allow.permits(&args.client, &args.store, &candidate.developer),
            score,
        });
        progress.inc(1);
    }

    progress.finish_with_message(format!(
        "scored {} candidates ({fault_total} metric faults)",
        records.len()
    ));

    if let Some(dump_path) = settings.study_dump.as_deref() {
        report::write_study_dump(dump_path, &dump_rows).await?;
        println!("study audit written to {}", dump_path.display());
    }
    report::write_report(&settings.report, &records).await?;
    println!("report written to {}", settings.report.display());
    Ok(())
}
