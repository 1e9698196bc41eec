//! Configuration loading pipeline:
//! 1. Read the YAML file
//! 2. Parse to [`MatchConfig`]
//! 3. Resolve humantime fields into typed [`MatchSettings`]
//! 4. Validate against the stage table
//! 5. Freeze with `Arc`

use std::path::Path;
use std::sync::Arc;

use crate::config::schema::{MatchConfig, MatchSettings};
use crate::config::validation;
use crate::error::{ConfigError, ValidationIssue};
use crate::stage::StageTable;

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated settings.
    pub settings: Arc<MatchSettings>,
    /// Warnings encountered during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Loads and validates a match configuration file.
///
/// # Errors
///
/// - [`ConfigError::MissingFile`] when the file does not exist
/// - [`ConfigError::ParseError`] for unreadable or malformed YAML
/// - [`ConfigError::InvalidValue`] for unparseable durations
/// - [`ConfigError::ValidationError`] when validation finds errors
pub fn load_file(path: &Path, table: &StageTable) -> Result<LoadResult, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    })?;

    let config: MatchConfig =
        serde_yaml::from_str(&raw).map_err(|err| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    let settings = config.resolve()?;

    let issues = validation::validate(&settings, table);
    if validation::has_errors(&issues) {
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors: issues,
        });
    }

    Ok(LoadResult {
        settings: Arc::new(settings),
        warnings: issues,
    })
}
