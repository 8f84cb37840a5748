// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printcatch.
//
// Policy outcomes (safety catch disengaged, no printer resolvable) are never
// errors; they are reported as `SpoolOutcome` values by the dispatcher.

use thiserror::Error;

use crate::types::{PrinterId, StrategyId};

/// Top-level error type for all Printcatch operations.
#[derive(Debug, Error)]
pub enum PrintcatchError {
    // -- Collaborator failures --
    #[error("report rendering failed: {0}")]
    Render(String),

    #[error("print transport failed: {0}")]
    Transport(String),

    // -- Directory --
    #[error("barcode {0:?} is already assigned to another printer")]
    DuplicateBarcode(String),

    #[error("unknown printer {0}")]
    UnknownPrinter(PrinterId),

    #[error("unknown print strategy {0}")]
    UnknownStrategy(StrategyId),

    #[error("{0} is not a printer group")]
    NotAGroup(String),

    #[error("printer {0} cannot be placed inside its own group")]
    GroupCycle(String),

    // -- Storage / configuration --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintcatchError>;
