//! CLI argument definitions.
//!
//! All Clap derive structs for `ringmaster` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Timed multi-stage elimination match engine.
#[derive(Parser, Debug)]
#[command(name = "ringmaster", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "RINGMASTER_COLOR")]
    pub color: ColorChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine against the in-memory simulators with an admin
    /// console on stdin.
    Run(RunArgs),

    /// Validate configuration files without running the engine.
    Validate(ValidateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a YAML match configuration file.
    #[arg(short, long, env = "RINGMASTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the JSONL event stream to this file.
    #[arg(long, env = "RINGMASTER_EVENTS")]
    pub events: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_config() {
        let cli = Cli::try_parse_from(["ringmaster", "run", "--config", "match.yaml"]);
        assert!(cli.is_ok(), "Failed to parse: {cli:?}");
    }

    #[test]
    fn test_run_without_config() {
        let cli = Cli::try_parse_from(["ringmaster", "run"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_help_output() {
        let result = Cli::try_parse_from(["ringmaster", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_output() {
        let result = Cli::try_parse_from(["ringmaster", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_validate_requires_files() {
        let result = Cli::try_parse_from(["ringmaster", "validate"]);
        assert!(result.is_err(), "Expected error for missing files");
    }

    #[test]
    fn test_color_choices_parse() {
        for variant in ["auto", "always", "never"] {
            let cli = Cli::try_parse_from(["ringmaster", "--color", variant, "run"]);
            assert!(cli.is_ok(), "Failed to parse color={variant}");
        }
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::try_parse_from(["ringmaster", "-vvv", "run"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::try_parse_from(["ringmaster", "--quiet", "run"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_validate_strict_and_format() {
        let cli = Cli::try_parse_from([
            "ringmaster",
            "validate",
            "--strict",
            "--format",
            "json",
            "a.yaml",
            "b.yaml",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("Expected ValidateArgs");
        };
        assert!(args.strict);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.files.len(), 2);
    }
}
