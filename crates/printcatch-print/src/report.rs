// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reporting collaborator.
//
// Rendering belongs to the host application's report engine. The dispatcher
// only needs "report + records in, bytes + content type out".

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{PrinterId, RenderedDocument, ReportType};

/// Identifier of the built-in printer test page report.
pub const TEST_PAGE_REPORT: &str = "print.report_test_page";

/// Context handed to the report engine alongside the records.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Copies requested for the job. CPCL label reports print this many
    /// labels themselves, so the engine needs it at render time.
    pub copies: u32,
    /// Free-form data the report template can read.
    pub data: Option<Value>,
    /// Printer the document is being rendered for.
    pub printer: Option<PrinterId>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            copies: 1,
            data: None,
            printer: None,
        }
    }
}

/// Renders a report against a set of records.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Render `report` for `records` in the requested rendition.
    ///
    /// Failures are reported as `PrintcatchError::Render`.
    async fn render(
        &self,
        report: &str,
        records: &[i64],
        report_type: ReportType,
        options: &RenderOptions,
    ) -> Result<RenderedDocument>;
}

/// Reporter that serves pre-rendered files from a directory.
///
/// `report` maps to `<root>/<report>.<ext>`, where the extension follows the
/// report type (`pdf`, `html`, `xml`). Record ids and render options are
/// ignored. Used by the command-line tool when no report engine is attached.
#[derive(Debug, Clone)]
pub struct FileReporter {
    root: PathBuf,
}

impl FileReporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, report: &str, report_type: ReportType) -> Result<PathBuf> {
        if report.is_empty() || report.contains(['/', '\\']) || report.starts_with('.') {
            return Err(PrintcatchError::Render(format!(
                "invalid report name {report:?}"
            )));
        }
        let ext = match report_type {
            ReportType::Pdf => "pdf",
            ReportType::Html => "html",
            ReportType::Cpcl => "xml",
        };
        Ok(self.root.join(format!("{report}.{ext}")))
    }
}

#[async_trait]
impl Reporter for FileReporter {
    async fn render(
        &self,
        report: &str,
        records: &[i64],
        report_type: ReportType,
        _options: &RenderOptions,
    ) -> Result<RenderedDocument> {
        let path = self.path_for(report, report_type)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            PrintcatchError::Render(format!("report {report} ({}): {e}", path.display()))
        })?;
        debug!(report, records = records.len(), bytes = bytes.len(), "report loaded from file");
        Ok(RenderedDocument::new(bytes, report_type.mime_type()))
    }
}
