// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printcatch — printer directory with a dual safety catch
//
// Entry point. Initialises logging, opens the directory and configuration,
// and runs one command.

mod cli;
mod commands;
mod services;

use std::process::ExitCode;

use cli::CommandLine;
use services::app_services::AppServices;
use services::data_dir;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CommandLine::parse_args();
    let db = args.db.unwrap_or_else(data_dir::default_db_path);
    let config = args.config.unwrap_or_else(data_dir::default_config_path);
    let reports = args.reports.unwrap_or_else(data_dir::default_reports_dir);

    let svc = match AppServices::init(&db, &config, &reports) {
        Ok(svc) => svc,
        Err(e) => {
            tracing::error!(error = %e, "cannot start");
            return ExitCode::FAILURE;
        }
    };

    match commands::run(&svc, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("printcatch: {e}");
            ExitCode::FAILURE
        }
    }
}
