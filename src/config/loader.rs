//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::MeshConfig;
use crate::config::validation::{validate_config, ValidationError};

/// File name looked up by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = "framework.toml";

/// Directories searched, in order, by [`discover_config`].
pub const SEARCH_DIRS: [&str; 4] = ["./", "./conf/", "../conf/", "../../conf/"];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error("framework.toml not found in any of {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<MeshConfig, ConfigError> {
    let config: MeshConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MeshConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Find [`CONFIG_FILE_NAME`] in the usual directories relative to `base` and
/// load the first one present.
pub fn discover_config(base: &Path) -> Result<(PathBuf, MeshConfig), ConfigError> {
    let mut searched = Vec::with_capacity(SEARCH_DIRS.len());
    for dir in SEARCH_DIRS {
        let candidate = base.join(dir).join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            let config = load_config(&candidate)?;
            tracing::info!(path = %candidate.display(), "Configuration file loaded");
            return Ok((candidate, config));
        }
        searched.push(candidate);
    }
    Err(ConfigError::NotFound { searched })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mesh-runtime-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parse_rejects_invalid_values() {
        let err = parse_config("[http]\ndefault_max_qps = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
    }

    #[test]
    fn parse_rejects_bad_toml() {
        assert!(matches!(parse_config("[http"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn discover_prefers_conf_directory_order() {
        let base = scratch_dir("discover");
        fs::create_dir_all(base.join("conf")).unwrap();
        fs::write(
            base.join("conf").join(CONFIG_FILE_NAME),
            "[service]\nname = \"billing\"\n",
        )
        .unwrap();

        let (path, config) = discover_config(&base).unwrap();
        assert!(path.ends_with(Path::new("conf").join(CONFIG_FILE_NAME)));
        assert_eq!(config.service.name, "billing");

        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn discover_reports_searched_paths() {
        let base = scratch_dir("missing").join("deep").join("deeper");
        fs::create_dir_all(&base).unwrap();
        match discover_config(&base) {
            Err(ConfigError::NotFound { searched }) => assert_eq!(searched.len(), SEARCH_DIRS.len()),
            other => panic!("unexpected: {:?}", other.map(|(p, _)| p)),
        }
    }
}
