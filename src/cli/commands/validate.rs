//! `ringmaster validate` — checks configuration files without running the
//! engine.

use std::path::Path;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config;
use crate::error::{ConfigError, RingmasterError, Severity, ValidationIssue};
use crate::stage::StageTable;

/// Validates each file and reports issues; fails if any file has errors
/// (or warnings, under `--strict`).
///
/// # Errors
///
/// Returns the first [`ConfigError`] encountered so the process exits with
/// the configuration error code.
pub fn run(args: &ValidateArgs) -> Result<(), RingmasterError> {
    let table = StageTable::standard();
    let mut first_failure: Option<ConfigError> = None;

    for path in &args.files {
        match check_file(path, &table, args.strict) {
            Ok(warnings) => {
                report(path, &warnings, args.format);
                if args.format == OutputFormat::Human {
                    println!("{}: ok", path.display());
                }
            }
            Err(err) => {
                if let ConfigError::ValidationError { errors, .. } = &err {
                    report(path, errors, args.format);
                }
                if args.format == OutputFormat::Human {
                    println!("{}: failed", path.display());
                }
                first_failure.get_or_insert(err);
            }
        }
    }

    first_failure.map_or(Ok(()), |err| Err(err.into()))
}

fn check_file(
    path: &Path,
    table: &StageTable,
    strict: bool,
) -> Result<Vec<ValidationIssue>, ConfigError> {
    let result = config::load_file(path, table)?;
    if strict && !result.warnings.is_empty() {
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors: result.warnings,
        });
    }
    Ok(result.warnings)
}

fn report(path: &Path, issues: &[ValidationIssue], format: OutputFormat) {
    match format {
        OutputFormat::Human => {
            for issue in issues {
                println!("{}: {issue}", path.display());
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "file": path.display().to_string(),
                "issues": issues
                    .iter()
                    .map(|issue| {
                        serde_json::json!({
                            "path": issue.path,
                            "message": issue.message,
                            "severity": match issue.severity {
                                Severity::Error => "error",
                                Severity::Warning => "warning",
                            },
                        })
                    })
                    .collect::<Vec<_>>(),
            });
            println!("{value}");
        }
    }
}
