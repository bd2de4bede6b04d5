use std::path::PathBuf;

use clap::Parser;

pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}

#[derive(Debug, Parser)]
#[command(
    name = "icon-audit",
    about = "Score candidate app icons against curated brand anchors",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Client whose anchor set the candidates are audited against
    #[arg(long = "client")]
    pub client: String,

    /// Store the candidate listings were collected from
    #[arg(long = "store")]
    pub store: String,

    /// JSON file holding the candidate listings
    #[arg(long = "candidates", value_name = "FILE")]
    pub candidates: PathBuf,

    /// Override the anchor image directory
    #[arg(long = "anchors-dir")]
    pub anchors_dir: Option<PathBuf>,

    /// Override the developer allow-list path
    #[arg(long = "allowlist")]
    pub allowlist: Option<PathBuf>,

    /// Override the CSV report path
    #[arg(long = "report", value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Keep the raw study rows as a JSON audit artifact
    #[arg(long = "save-study", value_parser = clap::value_parser!(bool))]
    pub save_study: Option<bool>,

    /// Override the study artifact path (implies --save-study)
    #[arg(long = "study-dump", value_name = "FILE")]
    pub study_dump: Option<PathBuf>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn argument_definitions_are_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn overrides_parse_alongside_the_required_triple() {
        let args = CliArgs::parse_from([
            "icon-audit",
            "--client",
            "acme",
            "--store",
            "play",
            "--candidates",
            "candidates.json",
            "--save-study",
            "true",
            "--anchors-dir",
            "/tmp/anchors",
        ]);
        assert_eq!(args.client, "acme");
        assert_eq!(args.store, "play");
        assert_eq!(args.save_study, Some(true));
        assert_eq!(args.anchors_dir.as_deref(), Some(Path::new("/tmp/anchors")));
    }
}
