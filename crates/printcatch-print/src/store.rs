// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent printer directory backed by SQLite.
//
// Printers and strategies are plain rows. Group membership is a self
// reference on `printers` with `ON DELETE CASCADE`, so deleting a group takes
// its members with it. User and system defaults are link rows that cascade
// the same way; their group scope is the `group_id` of the printer they point
// at. The default strategy is a singleton row in `settings`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{
    Printer, PrinterId, ReportType, Strategy, StrategyId, TransportKind, TransportParams, UserId,
};

use crate::directory::{PrinterDirectory, check_grouping};

/// SQLite schema for the directory.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS strategies (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        safety_catch_enabled INTEGER NOT NULL DEFAULT 0,
        transport TEXT NOT NULL,
        safety_option TEXT
    );
    CREATE TABLE IF NOT EXISTS printers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        barcode TEXT UNIQUE,
        strategy_id TEXT REFERENCES strategies(id) ON DELETE SET NULL,
        host TEXT,
        port INTEGER,
        queue TEXT,
        report_type TEXT NOT NULL DEFAULT 'pdf',
        is_ephemeral INTEGER NOT NULL DEFAULT 0,
        is_group INTEGER NOT NULL DEFAULT 0,
        group_id TEXT REFERENCES printers(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS printers_name ON printers(name);
    CREATE INDEX IF NOT EXISTS printers_group ON printers(group_id);
    CREATE TABLE IF NOT EXISTS user_defaults (
        user_id TEXT NOT NULL,
        printer_id TEXT NOT NULL REFERENCES printers(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, printer_id)
    );
    CREATE TABLE IF NOT EXISTS system_defaults (
        printer_id TEXT PRIMARY KEY REFERENCES printers(id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const PRINTER_COLUMNS: &str = "p.id, p.name, p.barcode, p.strategy_id, p.host, p.port, p.queue,
     p.report_type, p.is_ephemeral, p.is_group, p.group_id, p.created_at, p.updated_at";

const STRATEGY_COLUMNS: &str = "id, name, safety_catch_enabled, transport, safety_option";

const SYSTEM_DEFAULT_STRATEGY: &str = "system_default_strategy";

fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> PrintcatchError + '_ {
    move |e| PrintcatchError::Database(format!("{context}: {e}"))
}

/// Printer directory stored in a SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`; the connection sits behind
/// a `Mutex` so the directory can be shared between request handlers.
pub struct SqliteDirectory {
    conn: Mutex<Connection>,
}

impl SqliteDirectory {
    /// Open (or create) the directory database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;

        // Concurrent readers while an administrator edits records.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;

        let directory = Self::init(conn)?;
        info!("printer directory database opened");
        Ok(directory)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        let directory = Self::init(conn)?;
        debug!("in-memory printer directory opened");
        Ok(directory)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err("foreign_keys pragma"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PrintcatchError::Database("connection lock poisoned".into()))
    }

    fn query_printer(
        conn: &Connection,
        sql: &str,
        param: &str,
        context: &str,
    ) -> Result<Option<Printer>> {
        conn.query_row(sql, params![param], row_to_printer)
            .optional()
            .map_err(db_err(context))
    }

    fn query_printers(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
        context: &str,
    ) -> Result<Vec<Printer>> {
        let mut stmt = conn.prepare(sql).map_err(db_err(context))?;
        let printers = stmt
            .query_map(params, row_to_printer)
            .map_err(db_err(context))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect rows"))?;
        Ok(printers)
    }

    fn printer_by_id(conn: &Connection, id: &PrinterId) -> Result<Option<Printer>> {
        Self::query_printer(
            conn,
            &format!("SELECT {PRINTER_COLUMNS} FROM printers p WHERE p.id = ?1"),
            &id.to_string(),
            "get printer",
        )
    }

    /// Group scope of a stored printer: `Some(None)` for the top level.
    fn scope_of(conn: &Connection, id: &PrinterId) -> Result<Option<Option<String>>> {
        conn.query_row(
            "SELECT group_id FROM printers WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err("printer scope"))
    }

    fn setting(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err("read setting"))
    }

    fn put_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(db_err("write setting"))?;
        Ok(())
    }

    fn delete_setting(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])
            .map_err(db_err("delete setting"))?;
        Ok(())
    }

    fn has_members(conn: &Connection, id: &PrinterId) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM printers WHERE group_id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err("group members"))
    }

    fn strategy_exists(conn: &Connection, id: &StrategyId) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM strategies WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(db_err("strategy exists"))
    }
}

impl PrinterDirectory for SqliteDirectory {
    #[instrument(skip(self), fields(printer = %id))]
    fn get(&self, id: &PrinterId) -> Result<Option<Printer>> {
        let conn = self.conn()?;
        Self::printer_by_id(&conn, id)
    }

    #[instrument(skip(self, printer), fields(printer = %printer.id))]
    fn save(&self, printer: &Printer) -> Result<()> {
        let printer = printer.normalized();
        let conn = self.conn()?;

        if let Some(code) = printer.barcode.as_deref() {
            let owner: Option<String> = conn
                .query_row(
                    "SELECT id FROM printers WHERE barcode = ?1 AND id != ?2",
                    params![code, printer.id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err("check barcode"))?;
            if owner.is_some() {
                return Err(PrintcatchError::DuplicateBarcode(code.to_owned()));
            }
        }
        if let Some(strategy) = printer.strategy_id {
            if !Self::strategy_exists(&conn, &strategy)? {
                return Err(PrintcatchError::UnknownStrategy(strategy));
            }
        }
        check_grouping(
            &printer,
            |id| Self::printer_by_id(&conn, id),
            |id| Self::has_members(&conn, id),
        )?;

        conn.execute(
            "INSERT INTO printers (id, name, barcode, strategy_id, host, port, queue,
             report_type, is_ephemeral, is_group, group_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                barcode = excluded.barcode,
                strategy_id = excluded.strategy_id,
                host = excluded.host,
                port = excluded.port,
                queue = excluded.queue,
                report_type = excluded.report_type,
                is_ephemeral = excluded.is_ephemeral,
                is_group = excluded.is_group,
                group_id = excluded.group_id,
                updated_at = excluded.updated_at",
            params![
                printer.id.to_string(),
                printer.name,
                printer.barcode,
                printer.strategy_id.map(|s| s.to_string()),
                printer.transport.host,
                printer.transport.port,
                printer.transport.queue,
                printer.report_type.keyword(),
                printer.is_ephemeral,
                printer.is_group,
                printer.group_id.map(|g| g.to_string()),
                printer.created_at.to_rfc3339(),
                printer.updated_at.to_rfc3339(),
            ],
        )
        .map_err(db_err("save printer"))?;

        debug!(printer = %printer.name, "printer saved");
        Ok(())
    }

    #[instrument(skip(self), fields(printer = %id))]
    fn delete(&self, id: &PrinterId) -> Result<()> {
        let conn = self.conn()?;
        // Members and default links go with it through ON DELETE CASCADE.
        let rows = conn
            .execute("DELETE FROM printers WHERE id = ?1", params![id.to_string()])
            .map_err(db_err("delete printer"))?;

        if rows > 0 {
            info!("printer deleted");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<Printer>> {
        let conn = self.conn()?;
        let printers = Self::query_printers(
            &conn,
            &format!("SELECT {PRINTER_COLUMNS} FROM printers p ORDER BY p.name ASC"),
            params![],
            "list printers",
        )?;
        debug!(count = printers.len(), "listed printers");
        Ok(printers)
    }

    #[instrument(skip(self))]
    fn find_by_barcode(&self, code: &str) -> Result<Option<Printer>> {
        let conn = self.conn()?;
        Self::query_printer(
            &conn,
            &format!("SELECT {PRINTER_COLUMNS} FROM printers p WHERE p.barcode = ?1"),
            code,
            "find by barcode",
        )
    }

    fn get_strategy(&self, id: &StrategyId) -> Result<Option<Strategy>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ?1"),
            params![id.to_string()],
            row_to_strategy,
        )
        .optional()
        .map_err(db_err("get strategy"))
    }

    #[instrument(skip(self, strategy), fields(strategy = %strategy.id))]
    fn save_strategy(&self, strategy: &Strategy) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO strategies (id, name, safety_catch_enabled, transport, safety_option)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                safety_catch_enabled = excluded.safety_catch_enabled,
                transport = excluded.transport,
                safety_option = excluded.safety_option",
            params![
                strategy.id.to_string(),
                strategy.name,
                strategy.safety_catch_enabled,
                strategy.transport.keyword(),
                strategy.safety_option,
            ],
        )
        .map_err(db_err("save strategy"))?;

        debug!(strategy = %strategy.name, "strategy saved");
        Ok(())
    }

    fn list_strategies(&self) -> Result<Vec<Strategy>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STRATEGY_COLUMNS} FROM strategies ORDER BY name ASC"
            ))
            .map_err(db_err("prepare list strategies"))?;
        let strategies = stmt
            .query_map([], row_to_strategy)
            .map_err(db_err("query list strategies"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect rows"))?;
        Ok(strategies)
    }

    #[instrument(skip(self), fields(user = %user))]
    fn user_defaults(&self, user: &UserId) -> Result<Vec<Printer>> {
        let conn = self.conn()?;
        Self::query_printers(
            &conn,
            &format!(
                "SELECT {PRINTER_COLUMNS} FROM user_defaults u
                 JOIN printers p ON p.id = u.printer_id
                 WHERE u.user_id = ?1
                 ORDER BY p.name ASC"
            ),
            params![user.0],
            "user defaults",
        )
    }

    #[instrument(skip(self), fields(user = %user, printer = %printer))]
    fn set_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()> {
        let mut conn = self.conn()?;
        let scope = Self::scope_of(&conn, printer)?.ok_or(PrintcatchError::UnknownPrinter(*printer))?;
        let id = printer.to_string();

        let tx = conn.transaction().map_err(db_err("begin"))?;
        tx.execute(
            "DELETE FROM user_defaults
             WHERE user_id = ?1 AND printer_id IN (
                 SELECT id FROM printers WHERE group_id IS ?2 AND id != ?3
             )",
            params![user.0, scope, id],
        )
        .map_err(db_err("replace user default"))?;
        tx.execute(
            "INSERT OR IGNORE INTO user_defaults (user_id, printer_id) VALUES (?1, ?2)",
            params![user.0, id],
        )
        .map_err(db_err("set user default"))?;
        tx.commit().map_err(db_err("commit"))?;

        debug!("user default printer set");
        Ok(())
    }

    fn remove_user_default(&self, user: &UserId, printer: &PrinterId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM user_defaults WHERE user_id = ?1 AND printer_id = ?2",
            params![user.0, printer.to_string()],
        )
        .map_err(db_err("remove user default"))?;
        Ok(())
    }

    fn system_defaults(&self) -> Result<Vec<Printer>> {
        let conn = self.conn()?;
        Self::query_printers(
            &conn,
            &format!(
                "SELECT {PRINTER_COLUMNS} FROM system_defaults s
                 JOIN printers p ON p.id = s.printer_id
                 ORDER BY p.name ASC"
            ),
            params![],
            "system defaults",
        )
    }

    #[instrument(skip(self), fields(printer = %printer))]
    fn set_system_default(&self, printer: &PrinterId) -> Result<()> {
        let mut conn = self.conn()?;
        let scope = Self::scope_of(&conn, printer)?.ok_or(PrintcatchError::UnknownPrinter(*printer))?;
        let id = printer.to_string();

        let tx = conn.transaction().map_err(db_err("begin"))?;
        tx.execute(
            "DELETE FROM system_defaults WHERE printer_id IN (
                 SELECT id FROM printers WHERE group_id IS ?1 AND id != ?2
             )",
            params![scope, id],
        )
        .map_err(db_err("replace system default"))?;
        tx.execute(
            "INSERT OR IGNORE INTO system_defaults (printer_id) VALUES (?1)",
            params![id],
        )
        .map_err(db_err("set system default"))?;
        tx.commit().map_err(db_err("commit"))?;

        info!("system default printer set");
        Ok(())
    }

    fn remove_system_default(&self, printer: &PrinterId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM system_defaults WHERE printer_id = ?1",
            params![printer.to_string()],
        )
        .map_err(db_err("remove system default"))?;
        Ok(())
    }

    fn default_strategy(&self) -> Result<Option<Strategy>> {
        let conn = self.conn()?;
        match Self::setting(&conn, SYSTEM_DEFAULT_STRATEGY)? {
            Some(id) => conn
                .query_row(
                    &format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ?1"),
                    params![id],
                    row_to_strategy,
                )
                .optional()
                .map_err(db_err("default strategy")),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(strategy = %strategy))]
    fn set_default_strategy(&self, strategy: &StrategyId) -> Result<()> {
        let conn = self.conn()?;
        if !Self::strategy_exists(&conn, strategy)? {
            return Err(PrintcatchError::UnknownStrategy(*strategy));
        }
        Self::put_setting(&conn, SYSTEM_DEFAULT_STRATEGY, &strategy.to_string())?;
        info!("system default strategy set");
        Ok(())
    }

    fn clear_default_strategy(&self) -> Result<()> {
        let conn = self.conn()?;
        Self::delete_setting(&conn, SYSTEM_DEFAULT_STRATEGY)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

#[derive(Debug)]
struct UnknownKeyword(String);

impl std::fmt::Display for UnknownKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown keyword {:?}", self.0)
    }
}

impl std::error::Error for UnknownKeyword {}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn parse_printer_id(column: usize, value: String) -> rusqlite::Result<PrinterId> {
    value
        .parse::<PrinterId>()
        .map_err(|e| conversion_error(column, e))
}

/// Map a SQLite row to a `Printer`.
///
/// Column indices must match `PRINTER_COLUMNS`.
fn row_to_printer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Printer> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let barcode: Option<String> = row.get(2)?;
    let strategy_str: Option<String> = row.get(3)?;
    let host: Option<String> = row.get(4)?;
    let port: Option<u16> = row.get(5)?;
    let queue: Option<String> = row.get(6)?;
    let report_type_str: String = row.get(7)?;
    let is_ephemeral: bool = row.get(8)?;
    let is_group: bool = row.get(9)?;
    let group_str: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let strategy_id = strategy_str
        .map(|s| s.parse::<StrategyId>())
        .transpose()
        .map_err(|e| conversion_error(3, e))?;
    let report_type = ReportType::from_keyword(&report_type_str)
        .ok_or_else(|| conversion_error(7, UnknownKeyword(report_type_str)))?;

    Ok(Printer {
        id: parse_printer_id(0, id_str)?,
        name,
        barcode,
        strategy_id,
        transport: TransportParams { host, port, queue },
        report_type,
        is_ephemeral,
        is_group,
        group_id: group_str.map(|g| parse_printer_id(10, g)).transpose()?,
        created_at: parse_timestamp(11, &created_at_str)?,
        updated_at: parse_timestamp(12, &updated_at_str)?,
    })
}

fn row_to_strategy(row: &rusqlite::Row<'_>) -> rusqlite::Result<Strategy> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let safety_catch_enabled: bool = row.get(2)?;
    let transport_str: String = row.get(3)?;
    let safety_option: Option<String> = row.get(4)?;

    let id = id_str
        .parse::<StrategyId>()
        .map_err(|e| conversion_error(0, e))?;
    let transport = TransportKind::from_keyword(&transport_str)
        .ok_or_else(|| conversion_error(3, UnknownKeyword(transport_str)))?;

    Ok(Strategy {
        id,
        name,
        safety_catch_enabled,
        transport,
        safety_option,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> SqliteDirectory {
        SqliteDirectory::open_in_memory().expect("open in-memory db")
    }

    #[test]
    fn save_and_get_printer() {
        let directory = directory();
        let strategy = Strategy::new("warehouse", TransportKind::Lpd).with_safety_catch(true);
        directory.save_strategy(&strategy).expect("save strategy");

        let printer = Printer::new("Dock 3")
            .with_barcode("PRNDOCK03")
            .with_strategy(strategy.id)
            .with_host("10.0.4.17", Some(515))
            .with_queue("labels")
            .with_report_type(ReportType::Cpcl);
        directory.save(&printer).expect("save printer");

        let stored = directory.get(&printer.id).expect("get").expect("present");
        assert_eq!(stored, printer);

        let stored_strategy = directory
            .get_strategy(&strategy.id)
            .expect("get strategy")
            .expect("present");
        assert_eq!(stored_strategy, strategy);
    }

    #[test]
    fn find_by_barcode_is_exact() {
        let directory = directory();
        let printer = Printer::new("Lab 2").with_barcode("PRNLAB02");
        directory.save(&printer).expect("save");

        let found = directory.find_by_barcode("PRNLAB02").expect("lookup");
        assert_eq!(found.map(|p| p.id), Some(printer.id));
        assert!(directory.find_by_barcode("NONEXISTENT").expect("lookup").is_none());
        assert!(directory.find_by_barcode("prnlab02").expect("lookup").is_none());
    }

    #[test]
    fn duplicate_barcode_is_rejected() {
        let directory = directory();
        directory
            .save(&Printer::new("Lab 1").with_barcode("PRNLAB01"))
            .expect("save");
        let result = directory.save(&Printer::new("Lab 1b").with_barcode("PRNLAB01"));
        assert!(matches!(result, Err(PrintcatchError::DuplicateBarcode(_))));
    }

    #[test]
    fn blank_barcode_is_stored_as_absent() {
        let directory = directory();
        let mut first = Printer::new("Lab 1");
        first.barcode = Some(String::new());
        let mut second = Printer::new("Lab 2");
        second.barcode = Some("  ".into());
        directory.save(&first).expect("first");
        directory.save(&second).expect("second");

        let stored = directory.get(&first.id).expect("get").expect("present");
        assert_eq!(stored.barcode, None);
        assert!(directory.find_by_barcode("").expect("lookup").is_none());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let directory = directory();
        let result = directory.save(&Printer::new("Orphan").with_strategy(StrategyId::new()));
        assert!(matches!(result, Err(PrintcatchError::UnknownStrategy(_))));
    }

    #[test]
    fn update_in_place() {
        let directory = directory();
        let mut printer = Printer::new("Front desk");
        directory.save(&printer).expect("save");
        printer.transport.queue = Some("desk".into());
        printer.updated_at = Utc::now();
        directory.save(&printer).expect("update");

        assert_eq!(directory.list().expect("list").len(), 1);
        let stored = directory.get(&printer.id).expect("get").expect("present");
        assert_eq!(stored.transport.queue.as_deref(), Some("desk"));
    }

    #[test]
    fn user_default_round_trip_and_idempotence() {
        let directory = directory();
        let printer = Printer::new("Lab 1");
        directory.save(&printer).expect("save");
        let user = UserId::new("alice");

        assert!(directory.user_default(&user).expect("lookup").is_none());
        directory.set_user_default(&user, &printer.id).expect("set");
        directory.set_user_default(&user, &printer.id).expect("set again");
        assert_eq!(
            directory.user_default(&user).expect("lookup").map(|p| p.id),
            Some(printer.id)
        );
        assert_eq!(directory.user_defaults(&user).expect("all").len(), 1);

        directory.clear_user_default(&user).expect("clear");
        assert!(directory.user_default(&user).expect("lookup").is_none());
    }

    #[test]
    fn deleting_printer_degrades_defaults() {
        let directory = directory();
        let printer = Printer::new("Doomed");
        directory.save(&printer).expect("save");
        let user = UserId::new("alice");
        directory.set_user_default(&user, &printer.id).expect("user default");
        directory.set_system_default(&printer.id).expect("system default");

        directory.delete(&printer.id).expect("delete");

        assert!(directory.user_default(&user).expect("lookup").is_none());
        assert!(directory.system_default().expect("lookup").is_none());
    }

    #[test]
    fn system_default_is_single() {
        let directory = directory();
        let a = Printer::new("A");
        let b = Printer::new("B");
        directory.save(&a).expect("save");
        directory.save(&b).expect("save");

        directory.set_system_default(&a.id).expect("a");
        directory.set_system_default(&b.id).expect("b");
        assert_eq!(
            directory.system_default().expect("lookup").map(|p| p.id),
            Some(b.id)
        );
        assert!(matches!(
            directory.set_system_default(&PrinterId::new()),
            Err(PrintcatchError::UnknownPrinter(_))
        ));
    }

    #[test]
    fn grouped_defaults_are_scoped() {
        let directory = directory();
        let office = Printer::new("Office");
        let upstairs = Printer::new("Upstairs").group();
        let dot_matrix = Printer::new("Dot matrix").in_group(upstairs.id);
        let plotter = Printer::new("Plotter").in_group(upstairs.id);
        for printer in [&office, &upstairs, &dot_matrix, &plotter] {
            directory.save(printer).expect("save");
        }
        let user = UserId::new("bob");

        directory.set_system_default(&office.id).expect("top level");
        directory.set_system_default(&dot_matrix.id).expect("upstairs");
        directory.set_system_default(&plotter.id).expect("replace upstairs");
        assert_eq!(
            directory.system_default().expect("top").map(|p| p.id),
            Some(office.id)
        );
        assert_eq!(
            directory.group_default(&upstairs.id).expect("group").map(|p| p.id),
            Some(plotter.id)
        );

        directory.set_user_default(&user, &upstairs.id).expect("top level");
        directory.set_user_default(&user, &dot_matrix.id).expect("member");
        let names: Vec<String> = directory
            .user_defaults(&user)
            .expect("all")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Dot matrix", "Upstairs"]);
        assert_eq!(
            directory
                .group_user_default(&user, &upstairs.id)
                .expect("member")
                .map(|p| p.id),
            Some(dot_matrix.id)
        );
    }

    #[test]
    fn deleting_group_cascades_to_members() {
        let directory = directory();
        let upstairs = Printer::new("Upstairs").group();
        let dot_matrix = Printer::new("Dot matrix").in_group(upstairs.id);
        directory.save(&upstairs).expect("group");
        directory.save(&dot_matrix).expect("member");
        let user = UserId::new("bob");
        directory.set_user_default(&user, &dot_matrix.id).expect("user");
        directory.set_system_default(&dot_matrix.id).expect("system");

        directory.delete(&upstairs.id).expect("delete");

        assert!(directory.get(&dot_matrix.id).expect("get").is_none());
        assert!(directory.user_defaults(&user).expect("user").is_empty());
        assert!(directory.system_defaults().expect("system").is_empty());
    }

    #[test]
    fn grouping_rules_are_enforced() {
        let directory = directory();
        let upstairs = Printer::new("Upstairs").group();
        let downstairs = Printer::new("Downstairs").group().in_group(upstairs.id);
        let laser = Printer::new("Laser").in_group(downstairs.id);
        directory.save(&upstairs).expect("upstairs");
        directory.save(&downstairs).expect("downstairs");
        directory.save(&laser).expect("laser");

        let inside_laser = Printer::new("Inkjet").in_group(laser.id);
        assert!(matches!(
            directory.save(&inside_laser),
            Err(PrintcatchError::NotAGroup(_))
        ));
        assert!(matches!(
            directory.save(&Printer::new("Stray").in_group(PrinterId::new())),
            Err(PrintcatchError::UnknownPrinter(_))
        ));
        assert!(matches!(
            directory.save(&upstairs.clone().in_group(downstairs.id)),
            Err(PrintcatchError::GroupCycle(_))
        ));
        let mut demoted = downstairs.clone();
        demoted.is_group = false;
        assert!(matches!(
            directory.save(&demoted),
            Err(PrintcatchError::NotAGroup(_))
        ));

        let stored = directory.get(&laser.id).expect("get").expect("present");
        assert_eq!(stored.group_id, Some(downstairs.id));
        assert_eq!(
            directory.full_name(&stored).expect("name"),
            "Upstairs / Downstairs / Laser"
        );
    }

    #[test]
    fn default_strategy_round_trip() {
        let directory = directory();
        assert!(directory.default_strategy().expect("lookup").is_none());

        let strategy = Strategy::new("fallback", TransportKind::RawTcp)
            .with_safety_catch(true)
            .with_safety_option("fallback.enabled");
        directory.save_strategy(&strategy).expect("save");
        directory.set_default_strategy(&strategy.id).expect("set");
        assert_eq!(directory.default_strategy().expect("lookup"), Some(strategy));

        directory.clear_default_strategy().expect("clear");
        assert!(directory.default_strategy().expect("lookup").is_none());
    }

    #[test]
    fn clear_ephemeral_on_logout() {
        let directory = directory();
        let kiosk = Printer::new("Kiosk").ephemeral();
        directory.save(&kiosk).expect("save");
        let user = UserId::new("kiosk-user");
        directory.set_user_default(&user, &kiosk.id).expect("set");

        assert!(directory.clear_ephemeral(&user).expect("logout"));
        assert!(directory.user_default(&user).expect("lookup").is_none());
        assert!(!directory.clear_ephemeral(&user).expect("logout again"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("printers.db");
        let printer = Printer::new("Persistent").with_barcode("PRNP01");

        {
            let directory = SqliteDirectory::open(&path).expect("open");
            directory.save(&printer).expect("save");
            directory.set_system_default(&printer.id).expect("default");
        }

        let directory = SqliteDirectory::open(&path).expect("reopen");
        assert_eq!(
            directory.system_default().expect("lookup").map(|p| p.id),
            Some(printer.id)
        );
    }
}
