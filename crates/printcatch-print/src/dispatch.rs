// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report spooling.
//
// A spool call resolves the destination printer, renders the report in the
// printer's report type, consults the safety catch and, only if allowed,
// hands the bytes to the transport. "No printer" and "catch engaged" are
// ordinary outcomes; render and transport failures propagate unchanged.
//
// Nothing is retained between calls: retrying a failed job renders and
// sends again.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use printcatch_core::config::{ConfigSource, SpoolerSettings};
use printcatch_core::error::Result;
use printcatch_core::types::{
    JobTicket, Printer, PrinterId, RenderedDocument, ReportType, Strategy, UserId,
};

use crate::directory::PrinterDirectory;
use crate::gate::SafetyCatch;
use crate::report::{RenderOptions, Reporter, TEST_PAGE_REPORT};
use crate::resolve::resolve_printer;
use crate::transport::{SpoolTarget, Transport};

/// A request to print a report for a set of records.
#[derive(Debug, Clone, PartialEq)]
pub struct SpoolRequest {
    pub report: String,
    pub records: Vec<i64>,
    /// Job title; defaults to the report name followed by the record ids.
    pub title: Option<String>,
    /// Copy count; defaults to the spooler setting.
    pub copies: Option<u32>,
    /// Extra data handed to the report engine.
    pub data: Option<Value>,
}

impl SpoolRequest {
    pub fn new(report: impl Into<String>, records: Vec<i64>) -> Self {
        Self {
            report: report.into(),
            records,
            title: None,
            copies: None,
            data: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = Some(copies);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Title used for the job.
    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("{} {:?}", self.report, self.records))
    }
}

/// What a spool call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolOutcome {
    /// The transport accepted the job.
    Sent {
        printer: PrinterId,
        /// SHA-256 of the bytes handed to the transport.
        document_hash: String,
        bytes: usize,
    },
    /// The safety catch is engaged for this printer; nothing was sent.
    Disabled { printer: PrinterId },
    /// No explicit, user or system default printer.
    NoPrinter,
}

impl SpoolOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// SHA-256 of `data` as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Spools reports to printers.
///
/// Collaborators are injected at construction; the dispatcher itself holds no
/// mutable state and can be shared freely between callers.
#[derive(Clone)]
pub struct Dispatcher {
    directory: Arc<dyn PrinterDirectory>,
    reporter: Arc<dyn Reporter>,
    transport: Arc<dyn Transport>,
    safety: SafetyCatch,
    settings: SpoolerSettings,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn PrinterDirectory>,
        reporter: Arc<dyn Reporter>,
        transport: Arc<dyn Transport>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            directory,
            reporter,
            transport,
            safety: SafetyCatch::new(config),
            settings: SpoolerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SpoolerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn directory(&self) -> &Arc<dyn PrinterDirectory> {
        &self.directory
    }

    pub fn safety_catch(&self) -> &SafetyCatch {
        &self.safety
    }

    /// Render `request` and send it to the resolved printer.
    ///
    /// `printer` targets a specific printer; `None` resolves the user's
    /// default, then the system default.
    #[instrument(skip_all, fields(report = %request.report, user = ?user))]
    pub async fn spool_report(
        &self,
        request: &SpoolRequest,
        printer: Option<&Printer>,
        user: Option<&UserId>,
    ) -> Result<SpoolOutcome> {
        let Some(printer) = resolve_printer(self.directory.as_ref(), printer, user)? else {
            info!("no printer resolvable, nothing printed");
            return Ok(SpoolOutcome::NoPrinter);
        };
        self.render_and_deliver(&printer, request).await
    }

    /// Send an already rendered document through the same resolve, safety
    /// catch and transport path as `spool_report`.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn spool_document(
        &self,
        document: RenderedDocument,
        title: &str,
        copies: Option<u32>,
        printer: Option<&Printer>,
        user: Option<&UserId>,
    ) -> Result<SpoolOutcome> {
        let Some(printer) = resolve_printer(self.directory.as_ref(), printer, user)? else {
            info!("no printer resolvable, nothing printed");
            return Ok(SpoolOutcome::NoPrinter);
        };
        let ticket = JobTicket {
            title: title.to_owned(),
            copies: copies.unwrap_or(self.settings.default_copies),
        };
        self.deliver(&printer, document, &ticket).await
    }

    /// Print the built-in test page on the resolved printer.
    ///
    /// The page is rendered for the printer it goes to: its id and full name
    /// are passed as report data.
    #[instrument(skip_all, fields(user = ?user))]
    pub async fn spool_test_page(
        &self,
        printer: Option<&Printer>,
        user: Option<&UserId>,
    ) -> Result<SpoolOutcome> {
        let Some(printer) = resolve_printer(self.directory.as_ref(), printer, user)? else {
            info!("no printer resolvable, no test page printed");
            return Ok(SpoolOutcome::NoPrinter);
        };
        let request = SpoolRequest::new(TEST_PAGE_REPORT, Vec::new())
            .with_title("Test page")
            .with_copies(1)
            .with_data(json!({
                "printer_id": printer.id.to_string(),
                "printer_name": self.directory.full_name(&printer)?,
            }));
        self.render_and_deliver(&printer, &request).await
    }

    /// The printer's own strategy, else the system default strategy.
    ///
    /// A printer pointing at a strategy that no longer exists gets none.
    pub fn effective_strategy(&self, printer: &Printer) -> Result<Option<Strategy>> {
        match printer.strategy_id {
            Some(id) => self.directory.get_strategy(&id),
            None => self.directory.default_strategy(),
        }
    }

    async fn render_and_deliver(
        &self,
        printer: &Printer,
        request: &SpoolRequest,
    ) -> Result<SpoolOutcome> {
        let copies = request.copies.unwrap_or(self.settings.default_copies);
        let options = RenderOptions {
            copies,
            data: render_data(printer.report_type, copies, request.data.as_ref()),
            printer: Some(printer.id),
        };
        let document = self
            .reporter
            .render(&request.report, &request.records, printer.report_type, &options)
            .await?;

        let ticket = JobTicket {
            title: request.title(),
            copies,
        };
        self.deliver(printer, document, &ticket).await
    }

    async fn deliver(
        &self,
        printer: &Printer,
        document: RenderedDocument,
        ticket: &JobTicket,
    ) -> Result<SpoolOutcome> {
        let strategy = self.effective_strategy(printer)?;
        if strategy.is_none() {
            info!(printer = %printer.name, "printer has no strategy and no default strategy is set");
        }
        let Some(strategy) = strategy.filter(|s| self.safety.is_printing_allowed(Some(s))) else {
            info!(printer = %printer.name, bytes = document.len(), "safety catch engaged, document discarded");
            return Ok(SpoolOutcome::Disabled { printer: printer.id });
        };

        let target = SpoolTarget {
            kind: strategy.transport,
            printer: printer.name.clone(),
            params: printer.transport.clone(),
        };
        self.transport.send(&target, &document, ticket).await?;

        let document_hash = hash_bytes(&document.bytes);
        info!(
            printer = %printer.name,
            strategy = %strategy.name,
            hash = %document_hash,
            bytes = document.len(),
            "report spooled"
        );
        Ok(SpoolOutcome::Sent {
            printer: printer.id,
            document_hash,
            bytes: document.len(),
        })
    }
}

/// Report data for one rendition. CPCL templates print their own copies, so
/// they get the copy count merged under `copies`; request data wins on clash.
fn render_data(report_type: ReportType, copies: u32, data: Option<&Value>) -> Option<Value> {
    if report_type != ReportType::Cpcl {
        return data.cloned();
    }
    let mut merged = Map::new();
    merged.insert("copies".into(), Value::from(copies));
    match data {
        Some(Value::Object(extra)) => merged.extend(extra.clone()),
        Some(other) => {
            merged.insert("data".into(), other.clone());
        }
        None => {}
    }
    Some(Value::Object(merged))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn default_title_names_report_and_records() {
        let request = SpoolRequest::new("stock.picking", vec![4, 9]);
        assert_eq!(request.title(), "stock.picking [4, 9]");
        assert_eq!(request.with_title("Picking").title(), "Picking");
    }

    #[test]
    fn cpcl_data_carries_copies() {
        let data = render_data(ReportType::Cpcl, 3, Some(&json!({"lot": "A7"})));
        assert_eq!(data, Some(json!({"copies": 3, "lot": "A7"})));

        let overridden = render_data(ReportType::Cpcl, 3, Some(&json!({"copies": 5})));
        assert_eq!(overridden, Some(json!({"copies": 5})));
    }

    #[test]
    fn other_renditions_get_request_data_unchanged() {
        assert_eq!(render_data(ReportType::Pdf, 3, None), None);
        let data = json!({"lot": "A7"});
        assert_eq!(render_data(ReportType::Html, 2, Some(&data)), Some(data));
    }

    #[test]
    fn only_sent_is_sent() {
        assert!(!SpoolOutcome::NoPrinter.is_sent());
        assert!(
            SpoolOutcome::Sent {
                printer: PrinterId::new(),
                document_hash: EMPTY_SHA256.into(),
                bytes: 0,
            }
            .is_sent()
        );
    }
}
