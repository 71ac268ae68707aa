//! User configuration, read from a TOML file.
//!
//! ```toml
//! [solver]
//! search_min = -100.0
//! search_max = 100.0
//! search_limit = 1e12
//! scan_steps = 20000
//! tolerance = 1e-9
//! max_iterations = 100
//!
//! [plot]
//! policy = "strict" # or "skip-invalid"
//! ```
//!
//! Every key is optional.

use crate::{
    plot::PlotSettings,
    solve::{SolveError, SolverSettings},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub solver: SolverSettings,
    pub plot: PlotSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to parse the config file")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] SolveError),
}

impl Config {
    pub fn from_toml_str(src: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(src)?;
        config.solver.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let src = fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let config = Config::from_toml_str(&src)?;
        tracing::debug!(path = %path.display(), "Loaded the config file");

        Ok(config)
    }

    /// Load the config file at [`Config::default_path()`], falling back to
    /// the defaults when there isn't one.
    pub fn load_or_default() -> Result<Config, ConfigError> {
        match Config::default_path() {
            Some(path) if path.is_file() => Config::load(&path),
            _ => Ok(Config::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/comparator/config.toml`, or the platform
    /// equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("comparator").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::SamplePolicy;

    #[test]
    fn empty_file_uses_defaults() {
        let got = Config::from_toml_str("").unwrap();

        assert_eq!(got, Config::default());
        assert_eq!(got.solver.scan_steps, 20_000);
        assert_eq!(got.plot.policy, SamplePolicy::Strict);
    }

    #[test]
    fn override_some_keys() {
        let src = r#"
            [solver]
            search_min = -5.0
            tolerance = 1e-6

            [plot]
            policy = "skip-invalid"
        "#;

        let got = Config::from_toml_str(src).unwrap();

        assert_eq!(got.solver.search_min, -5.0);
        assert_eq!(got.solver.search_max, 100.0);
        assert_eq!(got.solver.tolerance, 1e-6);
        assert_eq!(got.plot.policy, SamplePolicy::SkipInvalid);
    }

    #[test]
    fn search_limit_must_cover_the_interval() {
        let src = "[solver]\nsearch_max = 500.0\nsearch_limit = 200.0\n";

        let got = Config::from_toml_str(src);

        assert!(matches!(
            got,
            Err(ConfigError::Invalid(SolveError::InvalidSettings))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let got = Config::from_toml_str("[solver]\nsteps = 10\n");

        assert!(matches!(got, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let src = "[solver]\nsearch_min = 10.0\nsearch_max = -10.0\n";

        let got = Config::from_toml_str(src);

        assert!(matches!(
            got,
            Err(ConfigError::Invalid(SolveError::InvalidSettings))
        ));
    }

    #[test]
    fn missing_files_are_reported() {
        let got = Config::load(Path::new("/definitely/not/a/config.toml"));

        assert!(matches!(got, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn default_path_is_namespaced() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("comparator/config.toml"));
        }
    }
}
