//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::access::StaffRole;
use crate::config::MAX_WINDOW_DAYS;

/// Top-level CLI parser for `caselink`.
#[derive(Debug, Parser)]
#[command(name = "caselink", version, about = "Link case submissions to their case sites")]
pub struct Cli {
    /// YAML configuration file; `CASELINK_*` variables override it.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Link submissions whose case sites have been provisioned.
    Link,
    /// File pending responses onto their case sites.
    Responses,
    /// Report recent requests whose team was never assigned.
    Drift {
        /// Trailing window in days; defaults to the configured window.
        #[arg(
            long,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS))
        )]
        days: Option<u32>,
        /// Print the report without sending the digest.
        #[arg(long)]
        no_digest: bool,
    },
    /// Run every pass on its timer until interrupted.
    Schedule,
    /// Run every pass once.
    RunOnce,
    /// File a new submission.
    Submit {
        /// Case reference, with or without its prefix.
        #[arg(long)]
        reference: String,
        /// Portal unique id.
        #[arg(long)]
        unique_id: String,
        /// Document map as JSON, keyed by category.
        #[arg(long)]
        documents: String,
        /// Original request payload as JSON.
        #[arg(long)]
        request: Option<String>,
    },
    /// File a response against an existing submission.
    Respond {
        /// Unique id of the submission.
        #[arg(long)]
        unique_id: String,
        /// Document list as JSON.
        #[arg(long)]
        documents: String,
        /// File as a withdrawal instead of an information response.
        #[arg(long)]
        withdrawal: bool,
    },
    /// Manage staff role membership and case access.
    Access {
        /// Access operation.
        #[command(subcommand)]
        action: AccessCommand,
    },
    /// Print the upload names planned for the given file names.
    PlanFiles {
        /// Declared file names, in submission order.
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Role and access operations.
#[derive(Debug, Subcommand)]
pub enum AccessCommand {
    /// Add a user to a role group.
    Grant {
        /// Role: admin, lead or team.
        role: StaffRole,
        /// User email address.
        email: String,
    },
    /// Remove a user from a role group.
    Revoke {
        /// Role: admin, lead or team.
        role: StaffRole,
        /// Directory user id.
        user_id: String,
    },
    /// List a role group's members.
    List {
        /// Role: admin, lead or team.
        role: StaffRole,
    },
    /// Check whether a user can access a case.
    Check {
        /// Directory user id.
        user_id: String,
        /// Unique id of the submission.
        unique_id: String,
    },
    /// Print the external mailbox address of a case.
    Mailbox {
        /// Unique id of the submission.
        unique_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{AccessCommand, Cli, Command};
    use crate::access::StaffRole;
    use clap::Parser;

    #[test]
    fn parses_link_with_global_config() {
        let cli = Cli::parse_from(["caselink", "link", "--config", "caselink.yaml"]);
        assert!(matches!(cli.command, Command::Link));
        assert_eq!(cli.config.unwrap().to_str(), Some("caselink.yaml"));
    }

    #[test]
    fn parses_drift_days() {
        let cli = Cli::parse_from(["caselink", "drift", "--days", "3"]);
        assert!(matches!(cli.command, Command::Drift { days: Some(3), no_digest: false }));
    }

    #[test]
    fn drift_days_out_of_range_are_rejected() {
        assert!(Cli::try_parse_from(["caselink", "drift", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["caselink", "drift", "--days", "4294967295"]).is_err());
        assert!(Cli::try_parse_from(["caselink", "drift", "--days", "3650"]).is_ok());
    }

    #[test]
    fn parses_access_mailbox() {
        let cli = Cli::parse_from(["caselink", "access", "mailbox", "u-17"]);
        let Command::Access { action: AccessCommand::Mailbox { unique_id } } = cli.command else {
            panic!("expected access mailbox");
        };
        assert_eq!(unique_id, "u-17");
    }

    #[test]
    fn parses_access_grant_role() {
        let cli = Cli::parse_from(["caselink", "access", "grant", "lead", "ann@x.org"]);
        let Command::Access { action: AccessCommand::Grant { role, email } } = cli.command else {
            panic!("expected access grant");
        };
        assert_eq!(role, StaffRole::Lead);
        assert_eq!(email, "ann@x.org");
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Cli::try_parse_from(["caselink", "access", "list", "owner"]).is_err());
    }

    #[test]
    fn plan_files_requires_names() {
        assert!(Cli::try_parse_from(["caselink", "plan-files"]).is_err());
    }
}
