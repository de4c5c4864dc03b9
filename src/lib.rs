//! Core library entry for the `caselink` reconciliation engine.
//!
//! Submissions filed through the portal are linked to their case sites once
//! the hub has provisioned them, responses are filed into the same sites, and
//! requests whose team was never assigned are reported in a digest. Every
//! external system sits behind a port in [`ports`], so each pass runs the same
//! against live services, local files or in-memory test doubles.

pub mod access;
pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod drift;
pub mod error;
pub mod intake;
pub mod linking;
pub mod model;
pub mod notify;
pub mod placement;
pub mod ports;
pub mod responses;
pub mod scheduler;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_executes_plan_files() {
        let result = run(["caselink", "plan-files", "a.txt", "a.txt"]);
        assert!(result.is_ok());
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["caselink", "unknown"]);
        assert!(result.is_err());
    }
}
