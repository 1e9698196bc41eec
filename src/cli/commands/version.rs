//! `ringmaster version` — version information.

use crate::cli::args::{OutputFormat, VersionArgs};

/// Prints version information in the requested format.
pub fn run(args: &VersionArgs) {
    match args.format {
        OutputFormat::Human => {
            println!("ringmaster {}", env!("CARGO_PKG_VERSION"));
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            });
            println!("{value}");
        }
    }
}
