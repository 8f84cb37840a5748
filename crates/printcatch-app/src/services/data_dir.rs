// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution for the directory database and configuration.

use std::path::PathBuf;

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = base_dir().join("printcatch");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), "cannot create data directory: {e}");
    }
    dir
}

/// Default path of the printer directory database.
pub fn default_db_path() -> PathBuf {
    data_dir().join("printers.db")
}

/// Default path of the process configuration file.
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Default directory the file reporter serves reports from.
pub fn default_reports_dir() -> PathBuf {
    data_dir().join("reports")
}

fn base_dir() -> PathBuf {
    // XDG data dir, then home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}
