//! Project settings: `stackcfg.toml` at the project root, merged with the
//! experiments given on the command line.

use std::io;
use std::path::{Path, PathBuf};

use stackcfg_core::ParseOptions;

/// Settings file looked up at the project root when `--config` is absent.
pub(crate) const SETTINGS_FILE: &str = "stackcfg.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("could not resolve '{}': {source}", path.display())]
    Resolve { path: PathBuf, source: io::Error },

    #[error("could not read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid settings in '{}': {source}", path.display())]
    Settings {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub(crate) fn canonical(path: &Path) -> Result<PathBuf, CliError> {
    std::fs::canonicalize(path).map_err(|source| CliError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

/// Load parse options. An explicit `config` must exist; the default
/// `<root>/stackcfg.toml` is optional.
pub(crate) fn load_options(
    root: &Path,
    config: Option<&Path>,
    experiments: &[String],
) -> Result<ParseOptions, CliError> {
    let mut options = match config {
        Some(path) => read_settings(path)?,
        None => {
            let path = root.join(SETTINGS_FILE);
            if path.is_file() {
                read_settings(&path)?
            } else {
                ParseOptions::default()
            }
        }
    };
    options.experiments.extend(experiments.iter().cloned());
    Ok(options)
}

fn read_settings(path: &Path) -> Result<ParseOptions, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(file = %path.display(), "loading settings");
    toml::from_str(&content).map_err(|source| CliError::Settings {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_settings_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let opts = load_options(dir.path(), None, &[]).unwrap();
        assert!(opts.experiments.is_empty());
    }

    #[test]
    fn settings_and_flags_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "experiments = [\"scripts\"]\n").unwrap();
        let opts = load_options(dir.path(), None, &["outputs-sharing".to_string()]).unwrap();
        let names: Vec<_> = opts.experiments.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["outputs-sharing", "scripts"]);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_options(dir.path(), Some(&missing), &[]).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "experimentz = []\n").unwrap();
        let err = load_options(dir.path(), None, &[]).unwrap_err();
        assert!(err.to_string().starts_with("invalid settings in"));
    }
}
