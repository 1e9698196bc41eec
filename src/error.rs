//! Error types for `ringmaster`.
//!
//! One `thiserror` hierarchy rooted at [`RingmasterError`], with process
//! exit-code mapping for the CLI. Precondition failures are deliberately
//! *not* errors — they are returned as values from the session controller
//! so a caller can decide how much of the list to show.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `ringmaster` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Session engine error (failed transition, scheduler misuse)
    pub const SESSION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `ringmaster` operations.
///
/// Aggregates all domain-specific errors and provides a unified interface
/// for error handling and exit code mapping.
#[derive(Debug, Error)]
pub enum RingmasterError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session engine error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Timed-event scheduler error
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RingmasterError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Session(_) | Self::Schedule(_) => ExitCode::SESSION_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., `"intervals.respite"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Scheduler Errors
// ============================================================================

/// Timed-event scheduler errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// An event with the same `(trigger time, identity)` key is already
    /// scheduled. Registration identities are unique, so hitting this means
    /// a handle was re-inserted instead of being cancelled first.
    #[error("an event with this identity is already scheduled at {at_ms}ms")]
    DuplicateEvent {
        /// Trigger time of the colliding event, relative to scheduler start
        at_ms: u128,
    },
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors raised by collaborator hooks during session procedures.
#[derive(Debug, Error)]
pub enum HookError {
    /// The playfield collaborator rejected a request
    #[error("playfield error: {0}")]
    Playfield(String),

    /// Participant placement failed
    #[error("placement error: {0}")]
    Placement(String),
}

/// Session engine errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation requires a running session
    #[error("no session is running")]
    NotStarted,

    /// Every stage is disabled in settings; there is nothing to start
    #[error("no active stage to start in")]
    NoActiveStages,

    /// A collaborator hook failed during a session procedure
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The driver task is gone and the command could not be delivered
    #[error("engine is shut down")]
    EngineGone,
}

/// A start/end procedure failed partway and the stage snapshot was restored.
///
/// Carried inside [`StartOutcome`](crate::session::StartOutcome) /
/// [`EndOutcome`](crate::session::EndOutcome) rather than returned as `Err`:
/// the session is back in its pre-attempt stage and a retry is possible.
#[derive(Debug, Error)]
#[error("{operation} procedure failed ({source}); session rolled back")]
pub struct TransitionFailure {
    /// Which procedure failed
    pub operation: SessionOp,
    /// The underlying failure
    #[source]
    pub source: SessionError,
}

/// The two transactional session procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// `start` procedure
    Start,
    /// `end` procedure
    End,
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

// ============================================================================
// Timed-Event Action Errors
// ============================================================================

/// Failure raised by a timed-event action during drain.
///
/// Logged and skipped by the driver; never aborts the drain of subsequent
/// due events.
#[derive(Debug, Error)]
#[error("timed event '{label}' failed: {message}")]
pub struct EventError {
    /// Label the event was registered under
    pub label: String,
    /// What went wrong
    pub message: String,
}

impl EventError {
    /// Creates a new event error.
    #[must_use]
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `ringmaster` operations.
pub type Result<T> = std::result::Result<T, RingmasterError>;

// ============================================================================
// Tests
// ============================================================================
