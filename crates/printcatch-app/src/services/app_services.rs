// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the printer directory, loads the process
// configuration and builds the dispatcher the command handlers use.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use printcatch_core::ProcessConfig;
use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{Printer, PrinterId, Strategy, StrategyId};
use printcatch_print::{
    Dispatcher, FileReporter, PrinterDirectory, SqliteDirectory, SystemTransport,
};
use tracing::info;

/// Shared services for one command invocation.
#[derive(Clone)]
pub struct AppServices {
    directory: Arc<dyn PrinterDirectory>,
    dispatcher: Dispatcher,
}

impl AppServices {
    /// Open the directory database and load configuration from disk.
    ///
    /// A missing configuration file leaves the process half of the safety
    /// catch off, so nothing prints until it is written.
    pub fn init(db_path: &Path, config_path: &Path, reports_dir: &Path) -> Result<Self> {
        info!(db = %db_path.display(), config = %config_path.display(), "initialising services");
        let directory: Arc<dyn PrinterDirectory> = Arc::new(SqliteDirectory::open(db_path)?);
        let config = ProcessConfig::load_or_default(config_path)?;
        Ok(Self::with_directory(directory, config, reports_dir))
    }

    pub fn with_directory(
        directory: Arc<dyn PrinterDirectory>,
        config: ProcessConfig,
        reports_dir: &Path,
    ) -> Self {
        let settings = config.spooler();
        info!(
            lpr = %settings.lpr_command,
            timeout = ?Duration::from_secs(settings.transport_timeout_secs),
            "spooler settings"
        );
        let dispatcher = Dispatcher::new(
            directory.clone(),
            Arc::new(FileReporter::new(reports_dir)),
            Arc::new(SystemTransport::new(settings.clone())),
            Arc::new(config),
        )
        .with_settings(settings);
        Self {
            directory,
            dispatcher,
        }
    }

    pub fn directory(&self) -> &dyn PrinterDirectory {
        self.directory.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Find a printer by id, barcode or exact name, in that order.
    pub fn lookup_printer(&self, key: &str) -> Result<Printer> {
        if let Ok(id) = key.parse::<PrinterId>() {
            if let Some(printer) = self.directory.get(&id)? {
                return Ok(printer);
            }
            return Err(PrintcatchError::UnknownPrinter(id));
        }
        if let Some(printer) = self.directory.find_by_barcode(key)? {
            return Ok(printer);
        }
        self.directory
            .list()?
            .into_iter()
            .find(|p| p.name == key)
            .ok_or_else(|| PrintcatchError::Config(format!("no printer named or coded {key:?}")))
    }

    /// Find a strategy by id or exact name.
    pub fn lookup_strategy(&self, key: &str) -> Result<Strategy> {
        if let Ok(id) = key.parse::<StrategyId>() {
            return self
                .directory
                .get_strategy(&id)?
                .ok_or(PrintcatchError::UnknownStrategy(id));
        }
        self.directory
            .list_strategies()?
            .into_iter()
            .find(|s| s.name == key)
            .ok_or_else(|| PrintcatchError::Config(format!("no strategy named {key:?}")))
    }
}
