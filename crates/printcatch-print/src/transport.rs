// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport collaborator: moves rendered bytes to a printer.
//
// The strategy picks the transport class, the printer supplies the address.
// `SystemTransport` routes each job to the matching client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use printcatch_core::config::SpoolerSettings;
use printcatch_core::error::{PrintcatchError, Result};
use printcatch_core::types::{JobTicket, RenderedDocument, TransportKind, TransportParams};

/// Resolved destination of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolTarget {
    pub kind: TransportKind,
    /// Printer name, for logs and error messages.
    pub printer: String,
    pub params: TransportParams,
}

impl SpoolTarget {
    /// Host and effective port for socket transports.
    pub fn socket_address(&self) -> Result<(&str, u16)> {
        let host = self.params.host.as_deref().ok_or_else(|| {
            PrintcatchError::Transport(format!(
                "printer {} has no host configured for {}",
                self.printer,
                self.kind.display_name()
            ))
        })?;
        let port = self
            .params
            .port
            .or(self.kind.default_port())
            .ok_or_else(|| {
                PrintcatchError::Transport(format!(
                    "{} needs a port for printer {}",
                    self.kind.display_name(),
                    self.printer
                ))
            })?;
        Ok((host, port))
    }
}

/// Delivers a document to a printer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one job. Failures are reported as `PrintcatchError::Transport`.
    async fn send(
        &self,
        target: &SpoolTarget,
        document: &RenderedDocument,
        ticket: &JobTicket,
    ) -> Result<()>;
}

/// Transport backed by the operating system: the `lpr` command, LPD sockets
/// and raw JetDirect sockets.
#[derive(Debug, Clone)]
pub struct SystemTransport {
    settings: SpoolerSettings,
}

impl SystemTransport {
    pub fn new(settings: SpoolerSettings) -> Self {
        Self { settings }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.transport_timeout_secs)
    }
}

#[async_trait]
impl Transport for SystemTransport {
    async fn send(
        &self,
        target: &SpoolTarget,
        document: &RenderedDocument,
        ticket: &JobTicket,
    ) -> Result<()> {
        info!(
            printer = %target.printer,
            transport = target.kind.display_name(),
            bytes = document.len(),
            copies = ticket.copies,
            "sending job"
        );
        match target.kind {
            TransportKind::LprCommand => {
                crate::lpr_command::send_lpr_command(
                    &self.settings.lpr_command,
                    target.params.queue.as_deref(),
                    &document.bytes,
                    ticket,
                    self.timeout(),
                )
                .await
            }
            TransportKind::Lpd => {
                let (host, port) = target.socket_address()?;
                crate::lpr_client::send_lpr(
                    host,
                    port,
                    target.params.queue.as_deref(),
                    &document.bytes,
                    ticket,
                    self.timeout(),
                )
                .await
            }
            TransportKind::RawTcp => {
                let (host, port) = target.socket_address()?;
                crate::raw_client::send_raw(host, port, &document.bytes, ticket.copies, self.timeout())
                    .await
            }
        }
    }
}
