//! CLI argument definitions for orgscope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lookup` | Find organizations by name, URL or profile URL |
//! | `firmographics` | Firmographics for organization ids or names |
//! | `profile` | Firmographics record of a single organization |
//! | `fundings` | Funding rounds raised by an organization |
//! | `investments` | Investments made by an organization |
//! | `portfolio-exits` | Exits from an organization's portfolio |
//! | `business-relationships` | Partners, customers and suppliers |
//! | `management-and-board` | Executives and board members |
//! | `outlook` | Commercial maturity, exit probability and Mosaic score |
//! | `scouting-report` | Analyst scouting report |
//! | `chat` | Ask ChatCBI a question |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON config file (also `ORGSCOPE_CONFIG`) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | `warn` | Log verbosity (also `ORGSCOPE_LOG`) |
//! | `--log-format` | `human` | Log format (also `ORGSCOPE_LOG_FORMAT`) |
//!
//! # Examples
//!
//! ```bash
//! orgscope lookup --name "Acme Robotics" --limit 5
//! orgscope outlook 42 --part mosaic-score --pretty
//! orgscope chat --message "Who are Acme's competitors?" --stream
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::logging::{LogFormat, LogLevel};

#[derive(Debug, Parser)]
#[command(
    name = "orgscope",
    author,
    version,
    about = "Authenticated, resilient client for the organization intelligence API"
)]
pub struct Cli {
    /// JSON config file; environment variables override its values.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find organizations by name, URL or profile URL.
    Lookup(LookupArgs),
    /// Firmographics for organization ids or names.
    Firmographics(FirmographicsArgs),
    /// Firmographics record of a single organization.
    Profile(OrganizationArgs),
    /// Funding rounds raised by an organization.
    Fundings(TransactionsArgs),
    /// Investments made by an organization.
    Investments(TransactionsArgs),
    /// Exits from an organization's portfolio.
    PortfolioExits(OrganizationArgs),
    /// Partners, customers and suppliers of an organization.
    BusinessRelationships(OrganizationArgs),
    /// Executives and board members of an organization.
    ManagementAndBoard(ManagementArgs),
    /// Outlook of an organization, or one part of it.
    Outlook(OutlookArgs),
    /// Analyst scouting report.
    ScoutingReport(ScoutingReportArgs),
    /// Ask ChatCBI a question.
    Chat(ChatArgs),
}

#[derive(Debug, Clone, Args)]
pub struct OrganizationArgs {
    /// Numeric organization identifier.
    #[arg(value_name = "ORG_ID", allow_negative_numbers = true)]
    pub organization_id: i64,
}

#[derive(Debug, Clone, Args)]
pub struct LookupArgs {
    /// Organization name to match (repeatable).
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Organization website to match (repeatable).
    #[arg(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    #[arg(long)]
    pub profile_url: Option<String>,

    #[arg(long)]
    pub next_page_token: Option<String>,

    /// Maximum number of results (1-100).
    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long, requires = "sort_direction")]
    pub sort_field: Option<String>,

    #[arg(long, requires = "sort_field")]
    pub sort_direction: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FirmographicsArgs {
    /// Organization identifier (repeatable).
    #[arg(long = "org-id", value_name = "ORG_ID", allow_negative_numbers = true)]
    pub org_ids: Vec<i64>,

    /// Organization name (repeatable).
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TransactionsArgs {
    #[command(flatten)]
    pub organization: OrganizationArgs,

    /// Maximum number of transactions (1-100).
    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ManagementArgs {
    #[command(flatten)]
    pub organization: OrganizationArgs,

    /// Restrict to a title id (repeatable).
    #[arg(long = "title-id", value_name = "TITLE_ID", allow_negative_numbers = true)]
    pub title_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutlookPart {
    CommercialMaturity,
    ExitProbability,
    MosaicScore,
}

#[derive(Debug, Clone, Args)]
pub struct OutlookArgs {
    #[command(flatten)]
    pub organization: OrganizationArgs,

    /// Return only one part of the outlook.
    #[arg(long, value_enum)]
    pub part: Option<OutlookPart>,
}

#[derive(Debug, Clone, Args)]
pub struct ScoutingReportArgs {
    #[command(flatten)]
    pub organization: OrganizationArgs,

    /// Pipe the raw report stream to stdout.
    #[arg(long, default_value_t = false)]
    pub stream: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {
    #[arg(long)]
    pub message: String,

    /// Continue an existing conversation.
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Pipe the raw chunked answer to stdout.
    #[arg(long, default_value_t = false)]
    pub stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_organization_ids_reach_validation() {
        let cli = Cli::try_parse_from(["orgscope", "fundings", "-1"]).expect("parses");

        match cli.command {
            Command::Fundings(args) => assert_eq!(args.organization.organization_id, -1),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn outlook_part_uses_kebab_case() {
        let cli = Cli::try_parse_from(["orgscope", "outlook", "7", "--part", "mosaic-score"])
            .expect("parses");

        match cli.command {
            Command::Outlook(args) => assert_eq!(args.part, Some(OutlookPart::MosaicScore)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn sort_field_requires_direction() {
        let result = Cli::try_parse_from(["orgscope", "lookup", "--name", "Acme", "--sort-field", "name"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "orgscope",
            "chat",
            "--message",
            "hi",
            "--pretty",
            "--log-format",
            "json",
        ])
        .expect("parses");

        assert!(cli.pretty);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}
