use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

use crate::cli::CliArgs;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    anchors_dir: Option<String>,
    allowlist: Option<String>,
    report: Option<String>,
    study_dump: Option<String>,
    save_study: Option<bool>,
}

/// Fully resolved run configuration: CLI flags win over the config file, the
/// config file wins over the client/store derived defaults.
#[derive(Debug)]
pub struct EffectiveSettings {
    pub anchors_dir: PathBuf,
    pub allowlist: PathBuf,
    pub report: PathBuf,
    /// Present when the raw study rows should be written out.
    pub study_dump: Option<PathBuf>,
}

const DEFAULT_ALLOWLIST: &str = "data/allow_list.json";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    NotFound {
        path: PathBuf,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(cli: &CliArgs) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    Ok(merge(cli, file, config_path))
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = read_config(&path)?;
        return Ok((config, Some(path)));
    }

    if let Some(project_path) = project_config_path() {
        if project_path.exists() {
            let config = read_config(&project_path)?;
            return Ok((config, Some(project_path)));
        }
    }

    let Some(default_path) = default_config_path() else {
        return Ok((FileConfig::default(), None));
    };
    if !default_path.exists() {
        return Ok((FileConfig::default(), None));
    }
    let config = read_config(&default_path)?;
    Ok((config, Some(default_path)))
}

fn merge(cli: &CliArgs, file: FileConfig, config_path: Option<PathBuf>) -> EffectiveSettings {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

    let anchors_dir = cli
        .anchors_dir
        .clone()
        .map(expand_pathbuf)
        .or_else(|| {
            normalize_string(file.anchors_dir)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
        })
        .unwrap_or_else(|| {
            PathBuf::from(format!("data/anchors/{}/{}", cli.client, cli.store))
        });

    let allowlist = cli
        .allowlist
        .clone()
        .map(expand_pathbuf)
        .or_else(|| {
            normalize_string(file.allowlist)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ALLOWLIST));

    let report = cli
        .report
        .clone()
        .map(expand_pathbuf)
        .or_else(|| {
            normalize_string(file.report)
                .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
        })
        .unwrap_or_else(|| PathBuf::from(format!("reports/{}/{}.csv", cli.store, cli.client)));

    // An explicit dump path implies saving even without the flag.
    let save_study = cli
        .save_study
        .or(file.save_study)
        .unwrap_or(false)
        || cli.study_dump.is_some();
    let study_dump = save_study.then(|| {
        cli.study_dump
            .clone()
            .map(expand_pathbuf)
            .or_else(|| {
                normalize_string(file.study_dump)
                    .and_then(|value| resolve_path_from_config(value, config_dir.as_deref()))
            })
            .unwrap_or_else(|| {
                PathBuf::from(format!("data/misc/{}/{}_study.json", cli.client, cli.store))
            })
    });

    EffectiveSettings {
        anchors_dir,
        allowlist,
        report,
        study_dump,
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "icon-audit", "icon-audit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join("icon-audit.toml"))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    if expanded.is_absolute() || base.is_none() {
        Some(expanded)
    } else {
        Some(base.unwrap().join(expanded))
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> CliArgs {
        use clap::Parser;
        let mut argv = vec![
            "icon-audit",
            "--client",
            "acme",
            "--store",
            "play",
            "--candidates",
            "candidates.json",
        ];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_derive_from_the_client_store_pair() {
        let settings = merge(&args(&[]), FileConfig::default(), None);
        assert_eq!(settings.anchors_dir, PathBuf::from("data/anchors/acme/play"));
        assert_eq!(settings.allowlist, PathBuf::from(DEFAULT_ALLOWLIST));
        assert_eq!(settings.report, PathBuf::from("reports/play/acme.csv"));
        assert!(settings.study_dump.is_none());
    }

    #[test]
    fn file_paths_resolve_relative_to_the_config_file() {
        let file = FileConfig {
            anchors_dir: Some("anchors".into()),
            report: Some("/abs/report.csv".into()),
            ..FileConfig::default()
        };
        let settings = merge(&args(&[]), file, Some(PathBuf::from("/etc/icon-audit/config.toml")));
        assert_eq!(
            settings.anchors_dir,
            PathBuf::from("/etc/icon-audit/anchors")
        );
        assert_eq!(settings.report, PathBuf::from("/abs/report.csv"));
    }

    #[test]
    fn cli_overrides_beat_the_config_file() {
        let file = FileConfig {
            anchors_dir: Some("/from/file".into()),
            save_study: Some(false),
            ..FileConfig::default()
        };
        let settings = merge(
            &args(&["--anchors-dir", "/from/cli", "--save-study", "true"]),
            file,
            None,
        );
        assert_eq!(settings.anchors_dir, PathBuf::from("/from/cli"));
        assert_eq!(
            settings.study_dump,
            Some(PathBuf::from("data/misc/acme/play_study.json"))
        );
    }

    #[test]
    fn a_dump_path_implies_saving_the_study() {
        let settings = merge(
            &args(&["--study-dump", "/tmp/study.json"]),
            FileConfig::default(),
            None,
        );
        assert_eq!(settings.study_dump, Some(PathBuf::from("/tmp/study.json")));
    }

    #[test]
    fn explicit_config_paths_must_exist() {
        let err = resolve_settings(&args(&["--config", "/nonexistent/icon-audit.toml"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn config_files_parse_the_settings_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "anchors_dir = \"/srv/anchors\"\nsave_study = true\n"
        )
        .unwrap();
        let settings = resolve_settings(&args(&[
            "--config",
            file.path().to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(settings.anchors_dir, PathBuf::from("/srv/anchors"));
        assert!(settings.study_dump.is_some());
    }
}
