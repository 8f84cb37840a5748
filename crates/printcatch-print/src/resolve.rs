// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default printer resolution: explicit printer, then the user's default,
// then the system default. First match wins. A group found this way is then
// narrowed to one of its members.

use tracing::{debug, warn};

use printcatch_core::error::Result;
use printcatch_core::types::{Printer, UserId};

use crate::directory::{MAX_GROUP_DEPTH, PrinterDirectory};

/// Determine the printer a job should use.
///
/// Returns `Ok(None)` when nothing is configured; only storage failures are
/// errors. Later sources are not consulted once an earlier one matches, and a
/// group that has no default member resolves to nothing.
pub fn resolve_printer(
    directory: &dyn PrinterDirectory,
    explicit: Option<&Printer>,
    user: Option<&UserId>,
) -> Result<Option<Printer>> {
    let chosen = match explicit {
        Some(printer) => {
            debug!(printer = %printer.name, "using explicit printer");
            Some(printer.clone())
        }
        None => default_printer(directory, user)?,
    };
    match chosen {
        Some(printer) => reduce_group(directory, printer, user),
        None => {
            debug!("no printer resolvable");
            Ok(None)
        }
    }
}

fn default_printer(
    directory: &dyn PrinterDirectory,
    user: Option<&UserId>,
) -> Result<Option<Printer>> {
    if let Some(user) = user {
        if let Some(printer) = directory.user_default(user)? {
            debug!(printer = %printer.name, user = %user, "using user default printer");
            return Ok(Some(printer));
        }
    }
    let system = directory.system_default()?;
    if let Some(printer) = &system {
        debug!(printer = %printer.name, "using system default printer");
    }
    Ok(system)
}

/// Replace a group by the user's default member, else the group's system
/// default member, until a plain printer remains.
fn reduce_group(
    directory: &dyn PrinterDirectory,
    mut printer: Printer,
    user: Option<&UserId>,
) -> Result<Option<Printer>> {
    for _ in 0..=MAX_GROUP_DEPTH {
        if !printer.is_group {
            return Ok(Some(printer));
        }
        let member = match user {
            Some(user) => directory.group_user_default(user, &printer.id)?,
            None => None,
        };
        let member = match member {
            Some(member) => Some(member),
            None => directory.group_default(&printer.id)?,
        };
        match member {
            Some(member) => {
                debug!(group = %printer.name, printer = %member.name, "using group member");
                printer = member;
            }
            None => {
                debug!(group = %printer.name, "group has no default member");
                return Ok(None);
            }
        }
    }
    warn!(group = %printer.name, "printer groups nested too deeply");
    Ok(None)
}
