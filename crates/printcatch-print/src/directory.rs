// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer directory: printers, strategies, and the default-printer
// associations that point into them.
//
// User defaults are weak references. Deleting a printer clears them; a lookup
// through a reference that no longer resolves yields `None`.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{Printer, PrinterId, Strategy, StrategyId, UserId};

/// Repository of printer records and default-printer preferences.
///
/// Printers may be arranged in groups: a group is itself a printer with
/// `is_group` set, and its members point at it through `group_id`. User and
/// system defaults are scoped by group; each scope (the top level, or one
/// group) holds at most one default per user and one system default.
///
/// Implementations must tolerate concurrent readers; writes are
/// last-writer-wins.
pub trait PrinterDirectory: Send + Sync {
    // -- Printers --

    fn get(&self, id: &PrinterId) -> Result<Option<Printer>>;

    /// Insert or replace a printer.
    ///
    /// Blank barcode, host and queue values are stored as absent. Fails with
    /// `DuplicateBarcode` when another printer already carries the barcode,
    /// `UnknownStrategy` when the strategy is not in the directory,
    /// `UnknownPrinter` / `NotAGroup` when `group_id` does not name a group,
    /// `NotAGroup` when a printer with members loses `is_group`, and
    /// `GroupCycle` when the printer would end up inside itself.
    fn save(&self, printer: &Printer) -> Result<()>;

    /// Remove a printer, every printer in it if it is a group, and every
    /// default association pointing at them. Deleting an unknown printer is
    /// not an error.
    fn delete(&self, id: &PrinterId) -> Result<()>;

    /// All printers, ordered by name.
    fn list(&self) -> Result<Vec<Printer>>;

    /// Exact, case-sensitive barcode lookup.
    fn find_by_barcode(&self, code: &str) -> Result<Option<Printer>>;

    // -- Strategies --

    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>>;

    fn save_strategy(&self, strategy: &Strategy) -> Result<()>;

    fn list_strategies(&self) -> Result<Vec<Strategy>>;

    // -- Defaults --

    /// Every default printer of `user`, across all scopes, ordered by name.
    fn user_defaults(&self, user: &UserId) -> Result<Vec<Printer>>;

    /// Make `printer` the user's default within its group scope, replacing
    /// any previous default in that scope. Idempotent.
    fn set_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()>;

    /// Drop `printer` from the user's defaults, if present.
    fn remove_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()>;

    /// Every printer flagged as a system default, across all scopes.
    fn system_defaults(&self) -> Result<Vec<Printer>>;

    /// Make `printer` the system default within its group scope, replacing
    /// any previous default in that scope.
    fn set_system_default(&self, printer: &PrinterId) -> Result<()>;

    /// Drop the system default flag from `printer`, if set.
    fn remove_system_default(&self, printer: &PrinterId) -> Result<()>;

    /// Strategy applied to printers that have none of their own.
    fn default_strategy(&self) -> Result<Option<Strategy>>;

    fn set_default_strategy(&self, strategy: &StrategyId) -> Result<()>;

    fn clear_default_strategy(&self) -> Result<()>;

    // -- Provided --

    /// The user's default printer outside any group.
    fn user_default(&self, user: &UserId) -> Result<Option<Printer>> {
        Ok(in_scope(self.user_defaults(user)?, None))
    }

    /// The user's default member of `group`.
    fn group_user_default(&self, user: &UserId, group: &PrinterId) -> Result<Option<Printer>> {
        Ok(in_scope(self.user_defaults(user)?, Some(group)))
    }

    /// Clear the user's default printer outside any group.
    fn clear_user_default(&self, user: &UserId) -> Result<()> {
        if let Some(printer) = self.user_default(user)? {
            self.remove_user_default(user, &printer.id)?;
        }
        Ok(())
    }

    /// The system default printer outside any group.
    fn system_default(&self) -> Result<Option<Printer>> {
        Ok(in_scope(self.system_defaults()?, None))
    }

    /// The system default member of `group`.
    fn group_default(&self, group: &PrinterId) -> Result<Option<Printer>> {
        Ok(in_scope(self.system_defaults()?, Some(group)))
    }

    /// Clear the system default printer outside any group.
    fn clear_system_default(&self) -> Result<()> {
        if let Some(printer) = self.system_default()? {
            self.remove_system_default(&printer.id)?;
        }
        Ok(())
    }

    /// Printers directly inside `group`, ordered by name.
    fn members(&self, group: &PrinterId) -> Result<Vec<Printer>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.group_id.as_ref() == Some(group))
            .collect())
    }

    /// Name prefixed by the names of the enclosing groups, outermost first:
    /// `Upstairs / Downstairs / Dot matrix`.
    fn full_name(&self, printer: &Printer) -> Result<String> {
        let mut names = vec![printer.name.clone()];
        let mut seen = vec![printer.id];
        let mut parent = printer.group_id;
        while let Some(id) = parent {
            if seen.contains(&id) {
                break;
            }
            let Some(group) = self.get(&id)? else { break };
            names.push(group.name);
            seen.push(id);
            parent = group.group_id;
        }
        names.reverse();
        Ok(names.join(" / "))
    }

    /// Drop every default printer of the user that is marked clear-on-logout.
    ///
    /// Returns whether anything was cleared.
    fn clear_ephemeral(&self, user: &UserId) -> Result<bool> {
        let mut cleared = false;
        for printer in self.user_defaults(user)? {
            if printer.is_ephemeral {
                self.remove_user_default(user, &printer.id)?;
                info!(user = %user, printer = %printer.name, "cleared ephemeral default printer");
                cleared = true;
            }
        }
        Ok(cleared)
    }
}

/// First printer of `printers` belonging to the `group` scope.
fn in_scope(printers: Vec<Printer>, group: Option<&PrinterId>) -> Option<Printer> {
    printers.into_iter().find(|p| p.group_id.as_ref() == group)
}

/// Group-membership checks shared by directory implementations.
///
/// `lookup` fetches a stored printer; `has_members` tells whether any stored
/// printer sits in the given group.
pub(crate) fn check_grouping(
    printer: &Printer,
    lookup: impl Fn(&PrinterId) -> Result<Option<Printer>>,
    has_members: impl Fn(&PrinterId) -> Result<bool>,
) -> Result<()> {
    if !printer.is_group && has_members(&printer.id)? {
        return Err(PrintcatchError::NotAGroup(printer.name.clone()));
    }
    let Some(group_id) = printer.group_id else {
        return Ok(());
    };
    let group = lookup(&group_id)?.ok_or(PrintcatchError::UnknownPrinter(group_id))?;
    if !group.is_group {
        return Err(PrintcatchError::NotAGroup(group.name));
    }

    let mut ancestor = Some(group);
    let mut depth = 0usize;
    while let Some(current) = ancestor {
        if current.id == printer.id {
            return Err(PrintcatchError::GroupCycle(printer.name.clone()));
        }
        depth += 1;
        if depth > MAX_GROUP_DEPTH {
            return Err(PrintcatchError::GroupCycle(printer.name.clone()));
        }
        ancestor = match current.group_id {
            Some(id) => lookup(&id)?,
            None => None,
        };
    }
    Ok(())
}

/// Nesting limit for printer groups.
pub(crate) const MAX_GROUP_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// In-memory directory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct State {
    printers: HashMap<PrinterId, Printer>,
    strategies: HashMap<StrategyId, Strategy>,
    user_defaults: HashMap<UserId, HashSet<PrinterId>>,
    system_defaults: HashSet<PrinterId>,
    default_strategy: Option<StrategyId>,
}

impl State {
    fn require_printer(&self, id: &PrinterId) -> Result<&Printer> {
        self.printers
            .get(id)
            .ok_or(PrintcatchError::UnknownPrinter(*id))
    }

    fn group_of(&self, id: &PrinterId) -> Option<PrinterId> {
        self.printers.get(id).and_then(|p| p.group_id)
    }

    fn sorted(&self, ids: impl Iterator<Item = PrinterId>) -> Vec<Printer> {
        let mut printers: Vec<Printer> = ids.filter_map(|id| self.printers.get(&id).cloned()).collect();
        printers.sort_by(|a, b| a.name.cmp(&b.name));
        printers
    }

    /// `id` and every printer nested inside it.
    fn subtree(&self, id: &PrinterId) -> Vec<PrinterId> {
        let mut found = vec![*id];
        let mut next = 0;
        while next < found.len() {
            let current = found[next];
            let members: Vec<PrinterId> = self
                .printers
                .values()
                .filter(|p| p.group_id == Some(current) && !found.contains(&p.id))
                .map(|p| p.id)
                .collect();
            found.extend(members);
            next += 1;
        }
        found
    }
}

/// Directory held entirely in memory behind a `RwLock`.
///
/// Useful for embedding and tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| PrintcatchError::Database("directory lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| PrintcatchError::Database("directory lock poisoned".into()))
    }
}

impl PrinterDirectory for MemoryDirectory {
    fn get(&self, id: &PrinterId) -> Result<Option<Printer>> {
        Ok(self.read()?.printers.get(id).cloned())
    }

    fn save(&self, printer: &Printer) -> Result<()> {
        let printer = printer.normalized();
        let mut state = self.write()?;

        if let Some(code) = printer.barcode.as_deref() {
            let taken = state
                .printers
                .values()
                .any(|p| p.id != printer.id && p.barcode.as_deref() == Some(code));
            if taken {
                return Err(PrintcatchError::DuplicateBarcode(code.to_owned()));
            }
        }
        if let Some(strategy) = printer.strategy_id {
            if !state.strategies.contains_key(&strategy) {
                return Err(PrintcatchError::UnknownStrategy(strategy));
            }
        }
        check_grouping(
            &printer,
            |id| Ok(state.printers.get(id).cloned()),
            |id| Ok(state.printers.values().any(|p| p.group_id.as_ref() == Some(id))),
        )?;

        debug!(printer = %printer.name, id = %printer.id, "printer saved");
        state.printers.insert(printer.id, printer);
        Ok(())
    }

    fn delete(&self, id: &PrinterId) -> Result<()> {
        let mut state = self.write()?;
        if !state.printers.contains_key(id) {
            return Ok(());
        }
        let removed = state.subtree(id);
        for printer in &removed {
            state.printers.remove(printer);
            state.system_defaults.remove(printer);
        }
        for defaults in state.user_defaults.values_mut() {
            defaults.retain(|printer| !removed.contains(printer));
        }
        info!(id = %id, removed = removed.len(), "printer deleted");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Printer>> {
        let state = self.read()?;
        Ok(state.sorted(state.printers.keys().copied()))
    }

    fn find_by_barcode(&self, code: &str) -> Result<Option<Printer>> {
        Ok(self
            .read()?
            .printers
            .values()
            .find(|p| p.barcode.as_deref() == Some(code))
            .cloned())
    }

    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>> {
        Ok(self.read()?.strategies.get(id).cloned())
    }

    fn save_strategy(&self, strategy: &Strategy) -> Result<()> {
        self.write()?.strategies.insert(strategy.id, strategy.clone());
        debug!(strategy = %strategy.name, id = %strategy.id, "strategy saved");
        Ok(())
    }

    fn list_strategies(&self) -> Result<Vec<Strategy>> {
        let mut strategies: Vec<Strategy> = self.read()?.strategies.values().cloned().collect();
        strategies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(strategies)
    }

    fn user_defaults(&self, user: &UserId) -> Result<Vec<Printer>> {
        let state = self.read()?;
        Ok(match state.user_defaults.get(user) {
            Some(ids) => state.sorted(ids.iter().copied()),
            None => Vec::new(),
        })
    }

    fn set_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()> {
        let mut state = self.write()?;
        let scope = state.require_printer(printer)?.group_id;
        let others: HashSet<PrinterId> = state
            .printers
            .values()
            .filter(|p| p.group_id == scope && p.id != *printer)
            .map(|p| p.id)
            .collect();
        let defaults = state.user_defaults.entry(user.clone()).or_default();
        defaults.retain(|id| !others.contains(id));
        defaults.insert(*printer);
        debug!(user = %user, printer = %printer, "user default printer set");
        Ok(())
    }

    fn remove_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()> {
        if let Some(defaults) = self.write()?.user_defaults.get_mut(user) {
            defaults.remove(printer);
        }
        Ok(())
    }

    fn system_defaults(&self) -> Result<Vec<Printer>> {
        let state = self.read()?;
        Ok(state.sorted(state.system_defaults.iter().copied()))
    }

    fn set_system_default(&self, printer: &PrinterId) -> Result<()> {
        let mut state = self.write()?;
        let scope = state.require_printer(printer)?.group_id;
        let replaced: Vec<PrinterId> = state
            .system_defaults
            .iter()
            .copied()
            .filter(|id| state.group_of(id) == scope)
            .collect();
        for id in replaced {
            state.system_defaults.remove(&id);
        }
        state.system_defaults.insert(*printer);
        info!(printer = %printer, "system default printer set");
        Ok(())
    }

    fn remove_system_default(&self, printer: &PrinterId) -> Result<()> {
        self.write()?.system_defaults.remove(printer);
        Ok(())
    }

    fn default_strategy(&self) -> Result<Option<Strategy>> {
        let state = self.read()?;
        Ok(state
            .default_strategy
            .and_then(|id| state.strategies.get(&id))
            .cloned())
    }

    fn set_default_strategy(&self, strategy: &StrategyId) -> Result<()> {
        let mut state = self.write()?;
        if !state.strategies.contains_key(strategy) {
            return Err(PrintcatchError::UnknownStrategy(*strategy));
        }
        state.default_strategy = Some(*strategy);
        info!(strategy = %strategy, "system default strategy set");
        Ok(())
    }

    fn clear_default_strategy(&self) -> Result<()> {
        self.write()?.default_strategy = None;
        Ok(())
    }
}
