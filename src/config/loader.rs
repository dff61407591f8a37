use crate::config::schema::{PatchConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = |path: &Option<PathBuf>| match path {
            Some(path) => format!(" {}", path.display()),
            None => String::new(),
        };
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read patch file {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => {
                write!(f, "patch file{} is not valid TOML: {}", origin(path), source)
            }
            ConfigError::Validation { path, source } => {
                write!(f, "patch file{} is invalid: {}", origin(path), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// Parse and validate a patch file held in memory.
pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, None)
}

/// Load a patch file; `insert.path` entries resolve against its directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse(&contents, Some(path))?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    Ok(config)
}

fn parse(input: &str, origin: Option<&Path>) -> Result<PatchConfig, ConfigError> {
    let path = origin.map(Path::to_path_buf);
    let config: PatchConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: path.clone(),
        source,
    })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path, source })?;
    Ok(config)
}
