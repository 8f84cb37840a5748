// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use printcatch_core::types::{ReportType, TransportKind};

#[derive(Debug, Parser)]
#[command(name = "printcatch")]
#[command(about = "Printer directory with a dual safety catch for spooling reports.")]
pub struct CommandLine {
    /// Printer directory database
    #[arg(long, global = true, env = "PRINTCATCH_DB")]
    pub db: Option<PathBuf>,
    /// Process configuration file (JSON)
    #[arg(long, global = true, env = "PRINTCATCH_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory holding pre-rendered reports
    #[arg(long, global = true, env = "PRINTCATCH_REPORTS")]
    pub reports: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List printers, strategies and defaults
    #[command(alias = "ls")]
    Printers,
    /// Add a printer
    AddPrinter {
        name: String,
        #[arg(long)]
        barcode: Option<String>,
        /// Strategy id or name
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        queue: Option<String>,
        /// pdf, html or cpcl
        #[arg(long, default_value = "pdf", value_parser = parse_report_type)]
        report_type: ReportType,
        /// Cleared from user defaults on logout
        #[arg(long)]
        ephemeral: bool,
        /// Group to place the printer in (id, barcode or name)
        #[arg(long)]
        group: Option<String>,
        /// Make this printer a group other printers can join
        #[arg(long)]
        is_group: bool,
    },
    /// Add a print strategy
    AddStrategy {
        name: String,
        /// lpr, lpd or raw
        #[arg(long, default_value = "lpr", value_parser = parse_transport)]
        transport: TransportKind,
        /// Enable the strategy half of the safety catch
        #[arg(long)]
        safety_catch: bool,
        /// Extra configuration key that must also be true
        #[arg(long)]
        safety_option: Option<String>,
        /// Use for printers without a strategy
        #[arg(long)]
        default: bool,
    },
    /// Set or clear a user's default printer; a grouped printer becomes the
    /// default within its group
    SetUserDefault {
        user: String,
        /// Printer id, barcode or name; omit to clear
        printer: Option<String>,
    },
    /// Set or clear the system default printer
    SetSystemDefault {
        /// Printer id, barcode or name; omit to clear
        printer: Option<String>,
    },
    /// Find a printer by barcode
    Find { barcode: String },
    /// Clear a user's default if it points at an ephemeral printer
    Logout { user: String },
    /// Spool a pre-rendered report
    #[command(alias = "p")]
    Spool {
        /// Report name, served from the reports directory
        report: String,
        /// Record ids the report is for
        #[arg(long, value_delimiter = ',')]
        records: Vec<i64>,
        /// Printer id, barcode or name; defaults are used when omitted
        #[arg(long)]
        printer: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        copies: Option<u32>,
    },
    /// Print the test page
    TestPage {
        #[arg(long)]
        printer: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_report_type(s: &str) -> Result<ReportType, String> {
    ReportType::from_keyword(s).ok_or_else(|| format!("unknown report type {s:?}"))
}

fn parse_transport(s: &str) -> Result<TransportKind, String> {
    TransportKind::from_keyword(s).ok_or_else(|| format!("unknown transport {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        CommandLine::command().debug_assert();
    }

    #[test]
    fn parses_spool_with_records() {
        let cli = CommandLine::try_parse_from([
            "printcatch",
            "--db",
            "/tmp/p.db",
            "spool",
            "sale.order",
            "--records",
            "4,9",
            "--printer",
            "PRNLAB02",
        ])
        .expect("parse");
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/p.db")));
        match cli.command {
            Commands::Spool {
                report,
                records,
                printer,
                ..
            } => {
                assert_eq!(report, "sale.order");
                assert_eq!(records, vec![4, 9]);
                assert_eq!(printer.as_deref(), Some("PRNLAB02"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_transport() {
        let result =
            CommandLine::try_parse_from(["printcatch", "add-strategy", "s", "--transport", "ipp"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_group_membership() {
        let cli = CommandLine::try_parse_from([
            "printcatch",
            "add-printer",
            "Laser",
            "--group",
            "Downstairs",
        ])
        .expect("parse");
        match cli.command {
            Commands::AddPrinter {
                group, is_group, ..
            } => {
                assert_eq!(group.as_deref(), Some("Downstairs"));
                assert!(!is_group);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_strategy_flags() {
        let cli = CommandLine::try_parse_from([
            "printcatch",
            "add-strategy",
            "Labels",
            "--transport",
            "raw",
            "--safety-catch",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Commands::AddStrategy {
                transport: TransportKind::RawTcp,
                safety_catch: true,
                default: false,
                ..
            }
        ));
    }
}
