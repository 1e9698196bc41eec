//! Configuration validation.
//!
//! Checks parsed settings against a stage table and returns a list of
//! [`ValidationIssue`]s. Errors block loading; warnings are surfaced but
//! tolerated.

use crate::config::schema::MatchSettings;
use crate::error::{Severity, ValidationIssue};
use crate::stage::{StageLength, StageTable};

/// Validates settings against the stage table they will drive.
#[must_use]
pub fn validate(settings: &MatchSettings, table: &StageTable) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for id in settings.intervals.keys() {
        match table.by_id(id) {
            None => issues.push(error(format!("intervals.{id}"), "unknown stage id")),
            Some(def) if def.terminal => issues.push(warning(
                format!("intervals.{id}"),
                "the terminal stage is open-ended; its length cannot be overridden",
            )),
            Some(_) => {}
        }
    }

    for (id, diameter) in &settings.boundaries {
        if !table.contains(id) {
            issues.push(error(format!("boundaries.{id}"), "unknown stage id"));
        } else if *diameter <= 0.0 {
            issues.push(error(
                format!("boundaries.{id}"),
                "boundary diameter must be positive",
            ));
        }
    }

    if all_timed_stages_disabled(settings, table) {
        issues.push(warning(
            "intervals",
            "every timed stage is disabled; a session would start directly in the terminal stage",
        ));
    }

    issues.extend(growing_boundaries(settings, table));

    issues
}

/// Whether the list contains any error-severity issue.
#[must_use]
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

fn all_timed_stages_disabled(settings: &MatchSettings, table: &StageTable) -> bool {
    let mut timed = 0usize;
    let mut disabled = 0usize;
    for ordinal in 0..table.len() {
        let Some(def) = table.get(ordinal) else {
            continue;
        };
        let StageLength::Timed(default) = def.length else {
            continue;
        };
        timed += 1;
        let resolved = settings.intervals.get(&def.id).copied().unwrap_or(default);
        if resolved.is_zero() {
            disabled += 1;
        }
    }
    timed > 0 && timed == disabled
}

/// The boundary normally only shrinks before the showdown; a growing target
/// between timed stages is almost always a typo.
fn growing_boundaries(settings: &MatchSettings, table: &StageTable) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut prev: Option<(String, f64)> = None;
    for ordinal in 0..table.len() {
        let Some(def) = table.get(ordinal) else {
            continue;
        };
        if def.terminal {
            break;
        }
        let resolved = settings
            .boundaries
            .get(&def.id)
            .copied()
            .unwrap_or(def.boundary);
        if let Some((prev_id, prev_diameter)) = &prev {
            if resolved > *prev_diameter {
                issues.push(warning(
                    format!("boundaries.{}", def.id),
                    format!("larger than the preceding stage '{prev_id}'"),
                ));
            }
        }
        prev = Some((def.id.clone(), resolved));
    }
    issues
}

fn error(path: impl Into<String>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        path: path.into(),
        message: message.into(),
        severity: Severity::Error,
    }
}

fn warning(path: impl Into<String>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        path: path.into(),
        message: message.into(),
        severity: Severity::Warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MatchConfig;

    fn settings_from(yaml: &str) -> MatchSettings {
        let config: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        config.resolve().unwrap()
    }

    #[test]
    fn clean_settings_have_no_issues() {
        let settings = settings_from("intervals:\n  boundary_hold: 30m\n");
        let issues = validate(&settings, &StageTable::standard());
        assert!(issues.is_empty(), "unexpected: {issues:?}");
    }

    #[test]
    fn unknown_interval_id_is_an_error() {
        let settings = settings_from("intervals:\n  warmup: 5m\n");
        let issues = validate(&settings, &StageTable::standard());
        assert!(has_errors(&issues));
        assert!(issues[0].path.contains("warmup"));
    }

    #[test]
    fn terminal_interval_override_is_a_warning() {
        let settings = settings_from("intervals:\n  showdown: 5m\n");
        let issues = validate(&settings, &StageTable::standard());
        assert!(!has_errors(&issues));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn non_positive_boundary_is_an_error() {
        let settings = settings_from("boundaries:\n  respite: 0.0\n");
        let issues = validate(&settings, &StageTable::standard());
        assert!(has_errors(&issues));
    }

    #[test]
    fn all_stages_disabled_warns() {
        let settings = settings_from(
            "intervals:\n  boundary_hold: 0s\n  first_collapse: 0s\n  respite: 0s\n  second_collapse: 0s\n  final_approach: 0s\n",
        );
        let issues = validate(&settings, &StageTable::standard());
        assert!(!has_errors(&issues));
        assert!(issues.iter().any(|i| i.path == "intervals"));
    }

    #[test]
    fn growing_boundary_warns() {
        let settings = settings_from("boundaries:\n  first_collapse: 2000.0\n");
        let issues = validate(&settings, &StageTable::standard());
        assert!(!has_errors(&issues));
        assert!(issues.iter().any(|i| i.path.contains("first_collapse")));
    }
}
